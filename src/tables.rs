//! Fixed lookup tables used when decoding teletext packets.
//!
//! - [`hamming_8_4()`](fn.hamming_8_4.html) recovers the data nibble from a _Hamming 8/4_ coded
//!   byte, as found in page-number and control fields of the page header.
//! - [`Charset`](type.Charset.html) maps the 96 printable character codes `0x20`-`0x7f` of a row
//!   to UTF-8 text, with national variants substituted into a fixed set of positions per
//!   _ETS 300 706, section 15.2_.

/// Text for each character code `0x20`-`0x7f`; index `0` is code `0x20`.
pub type Charset = [&'static str; 96];

/// Value of the 3-bit national option selected by header control bits C12-C14 which selects the
/// Portuguese / Spanish G0 national option sub-set.
pub const CHARSET_PORTUGUESE_SPANISH: u8 = 0b101;

const HAMMING_8_4: [u8; 256] = build_hamming_8_4();

// Only the data bits are taken; protection bits are not checked, so a corrupted byte still
// yields some nibble.
const fn build_hamming_8_4() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let v = i as u8;
        table[i] = ((v >> 6) & 1)
            | (((v >> 4) & 1) << 1)
            | (((v >> 2) & 1) << 2)
            | ((v & 1) << 3);
        i += 1;
    }
    table
}

/// Extract the 4-bit data value from a _Hamming 8/4_ coded byte.
///
/// Bit `k` of the result is bit `6 - 2k` of the input.
pub fn hamming_8_4(coded: u8) -> u8 {
    HAMMING_8_4[coded as usize]
}

/// G0 Latin primary set.
pub const G0_LATIN: Charset = [
    " ", "!", "\"", "£", "$", "%", "&", "'", "(", ")", "*", "+", ",", "-", ".", "/",
    "0", "1", "2", "3", "4", "5", "6", "7", "8", "9", ":", ";", "<", "=", ">", "?",
    "@", "A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K", "L", "M", "N", "O",
    "P", "Q", "R", "S", "T", "U", "V", "W", "X", "Y", "Z", "«", "½", "»", "^", "#",
    "-", "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m", "n", "o",
    "p", "q", "r", "s", "t", "u", "v", "w", "x", "y", "z", "¼", "¦", "¾", "÷", "\u{7f}",
];

/// Positions within a [`Charset`](type.Charset.html) that a G0 national option sub-set replaces.
pub const NATIONAL_CHAR_INDEX_G0: [usize; 13] = [
    0x23 - 0x20,
    0x24 - 0x20,
    0x40 - 0x20,
    0x5b - 0x20,
    0x5c - 0x20,
    0x5d - 0x20,
    0x5e - 0x20,
    0x5f - 0x20,
    0x60 - 0x20,
    0x7b - 0x20,
    0x7c - 0x20,
    0x7d - 0x20,
    0x7e - 0x20,
];

/// Portuguese / Spanish national option sub-set, in the order of
/// [`NATIONAL_CHAR_INDEX_G0`](constant.NATIONAL_CHAR_INDEX_G0.html).
pub const PORTUGUESE_SPANISH: [&str; 13] = [
    "ç", "$", "¡", "á", "é", "í", "ó", "ú", "¿", "ü", "ñ", "è", "à",
];

/// Builds the character table in effect for the given national option code.
///
/// Codes without a known national sub-set get the unmodified [`G0_LATIN`](constant.G0_LATIN.html)
/// table.
pub fn charset(charset_code: u8) -> Charset {
    let mut table = G0_LATIN;
    if charset_code == CHARSET_PORTUGUESE_SPANISH {
        for (&position, &replacement) in NATIONAL_CHAR_INDEX_G0.iter().zip(&PORTUGUESE_SPANISH) {
            table[position] = replacement;
        }
    }
    table
}
