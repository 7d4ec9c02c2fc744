//! Parser for subtitles carried as
//! [EBU Teletext](https://www.etsi.org/deliver/etsi_en/300400_300499/300472/01.04.01_60/en_300472v010401p.pdf)
//! data units within an MPEG Transport Stream elementary stream.
//!
//! Intended to be used in conjunction with the
//! [mpeg2ts-reader](https://crates.io/crates/mpeg2ts-reader) crate's facilities for processing
//! the Transport Stream structures within which teletext data is usually embedded (see the
//! [`pes`](pes/index.html) module), though the [`TeletextParser`](struct.TeletextParser.html) can
//! equally be handed PES payloads from some other demultiplexer.
//!
//! Each teletext page is decoded to plain text, one line per row received, and is handed to a
//! [`TeletextProcessor`](trait.TeletextProcessor.html) as a timed
//! [`TextSample`](sample/struct.TextSample.html) once the page's header is transmitted again (or
//! the stream ends), since that is the point at which the page's display is replaced.
//!
//! ## Example
//!
//! ```
//! # use hex_literal::*;
//! use teletext_reader::sample::{TextSample, TextStreamInfo};
//! use teletext_reader::{TeletextParser, TeletextProcessor};
//!
//! pub struct DumpProcessor;
//! impl TeletextProcessor for DumpProcessor {
//!     fn new_stream_info(&mut self, info: TextStreamInfo) {
//!         println!("{:?}", info);
//!     }
//!     fn emit_sample(&mut self, sample: TextSample) {
//!         println!("{:?}", sample);
//!     }
//! }
//!
//! // 'eng' subtitles on page 888
//! let descriptor = hex!("5605 656e67 10 88");
//! let data = hex!(
//!     "10"
//!     "032ce8e4 0000 0101 1515151515 00 0404040404040404040404040404040404040404040404040404040404040404"
//!     "032ce8e4 0100 040412a63636f60464043ceef64e36267c0404040404040404040404040404040404040404040404"
//! );
//! let mut parser = TeletextParser::new(0x44, DumpProcessor, &descriptor[..]);
//! parser.parse(&data[..], 90_000, 90_000).unwrap();
//! parser.flush();
//! ```
//!
//! Output:
//!
//! ```plain
//! TextStreamInfo { stream_id: 68, time_scale: 90000, sub_streams: {888: "eng"} }
//! TextSample { start_time: 90000, end_time: 90000, sub_stream_index: 888, body: Text("Hello &amp; &lt;world>") }
//! ```

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms, future_incompatible)]

pub mod descriptor;
pub mod pes;
pub mod sample;
pub mod tables;

use crate::descriptor::{page_key, LanguageMap};
use crate::sample::{TextFragment, TextSample, TextStreamInfo, MPEG2_TIMESCALE};
use crate::tables::Charset;
use hex_slice::AsHex;
use std::collections::BTreeMap;
use std::fmt;

/// `data_unit_id` of _EBU Teletext subtitle data_, per _EN 300 472, section 4.4_.
pub const EBU_TELETEXT_WITH_SUBTITLING: u8 = 0x03;
/// Every teletext `data_unit_length` is this many bytes.
pub const DATA_UNIT_LENGTH: u8 = 44;
const DATA_BLOCK_LENGTH: usize = 40;
/// Page number of a header packet which is not the start of a displayable page (both page number
/// digits `0xF`).
pub const FILLER_PAGE: u8 = 0xff;

/// Receives the output of a [`TeletextParser`](struct.TeletextParser.html).
///
/// Methods are called synchronously from within `TeletextParser::parse()` and
/// `TeletextParser::flush()`, in the order the events occur.
pub trait TeletextProcessor {
    /// Called once, before any sample, describing the pages the stream is expected to carry.
    fn new_stream_info(&mut self, info: TextStreamInfo);
    /// Called for each completed page.
    fn emit_sample(&mut self, sample: TextSample);
}

#[derive(Debug, PartialEq, Eq, serde_derive::Serialize)]
pub enum TeletextErr {
    /// The named field extends beyond the end of the available data.
    NotEnoughData {
        field_name: &'static str,
        expected: usize,
        actual: usize,
    },
    /// The `descriptor_length` of a descriptor is greater than the bytes that follow it.
    DescriptorTooLong { declared: usize, available: usize },
}
impl fmt::Display for TeletextErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TeletextErr::NotEnoughData {
                field_name,
                expected,
                actual,
            } => write!(
                f,
                "not enough data for {}: {} bytes needed, {} available",
                field_name, expected, actual
            ),
            TeletextErr::DescriptorTooLong { declared, available } => write!(
                f,
                "descriptor_length {} exceeds the {} bytes available",
                declared, available
            ),
        }
    }
}
impl std::error::Error for TeletextErr {}

pub(crate) trait ErrorFieldNamed<T> {
    fn named(self, field_name: &'static str) -> Result<T, TeletextErr>;
}
impl<T> ErrorFieldNamed<T> for Result<T, bitreader::BitReaderError> {
    fn named(self, field_name: &'static str) -> Result<T, TeletextErr> {
        match self {
            Err(bitreader::BitReaderError::NotEnoughData {
                position,
                length,
                requested,
            }) => Err(TeletextErr::NotEnoughData {
                field_name,
                expected: ((requested + 7) / 8) as usize,
                actual: ((length - position) / 8) as usize,
            }),
            Err(e) => {
                panic!("teletext-reader bug: {:?}", e)
            }
            Ok(v) => Ok(v),
        }
    }
}

fn bit(value: u16, bit_pos: u32) -> u8 {
    ((value >> bit_pos) & 1) as u8
}

/// The magazine number from the 16-bit magazine-and-packet-address field of a data unit.
///
/// The three magazine bits are interleaved with protection bits at bit positions 14, 12 and 10
/// (least significant first).  Magazine `0` is reported as `8`.
pub fn magazine(address: u16) -> u8 {
    let magazine = bit(address, 14) + 2 * bit(address, 12) + 4 * bit(address, 10);
    if magazine == 0 {
        8
    } else {
        magazine
    }
}

/// The packet (row) number from the 16-bit magazine-and-packet-address field of a data unit.
///
/// The five packet number bits sit at bit positions 8, 6, 4, 2 and 0 (least significant first).
pub fn packet_number(address: u16) -> u8 {
    bit(address, 8)
        + 2 * bit(address, 6)
        + 4 * bit(address, 4)
        + 8 * bit(address, 2)
        + 16 * bit(address, 0)
}

fn read_hamming(
    r: &mut bitreader::BitReader<'_>,
    field_name: &'static str,
) -> Result<u8, TeletextErr> {
    Ok(tables::hamming_8_4(r.read_u8(8).named(field_name)?))
}

/// Decode the 40 character bytes of a row packet to text.
///
/// Bytes are transmitted least-significant-bit first, with odd parity in the (received) top bit,
/// which is discarded.  Control codes display as spaces.  Leading and trailing spaces are removed,
/// and `&` and `<` are escaped so that the result may be embedded in HTML / XML.
pub fn build_text(data_block: &[u8], charset: &Charset) -> String {
    let mut text = String::with_capacity(data_block.len() * 2);
    for &b in data_block {
        let mut c = b.reverse_bits() & 0x7f;
        if c < 0x20 {
            c = 0x20;
        }
        if text.is_empty() && c == 0x20 {
            continue;
        }
        match c {
            b'&' => text.push_str("&amp;"),
            b'<' => text.push_str("&lt;"),
            _ => text.push_str(charset[usize::from(c - 0x20)]),
        }
    }
    let trimmed_len = text.trim_end_matches(' ').len();
    text.truncate(trimmed_len);
    text
}

struct PageState {
    lines: Vec<String>,
    /// timestamp of the first row received for the page
    pts: i64,
}

/// Decodes the teletext data units of successive PES packets of a single elementary stream.
pub struct TeletextParser<P>
where
    P: TeletextProcessor,
{
    stream_id: u32,
    processor: P,
    languages: LanguageMap,
    sent_info: bool,
    magazine: u8,
    page_number: u8,
    charset_code: u8,
    charset: Charset,
    last_pts: i64,
    page_state: BTreeMap<u16, PageState>,
}
impl<P> TeletextParser<P>
where
    P: TeletextProcessor,
{
    /// Create a parser for the stream with the given id (usually the PID), taking page languages
    /// from the given _teletext_descriptor()_ bytes.
    ///
    /// A descriptor that can't be decoded is logged and otherwise ignored; pages will still be
    /// produced, just without any language.
    pub fn new(stream_id: u32, processor: P, descriptor: &[u8]) -> TeletextParser<P> {
        let languages = descriptor::language_map(descriptor).unwrap_or_else(|e| {
            log::error!("Teletext: unable to parse teletext_descriptor: {}", e);
            LanguageMap::new()
        });
        TeletextParser {
            stream_id,
            processor,
            languages,
            sent_info: false,
            magazine: 0,
            page_number: 0,
            charset_code: 0,
            charset: tables::charset(0),
            last_pts: 0,
            page_state: BTreeMap::new(),
        }
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }

    pub fn processor_mut(&mut self) -> &mut P {
        &mut self.processor
    }

    /// Page key to language mapping taken from the descriptor.
    pub fn languages(&self) -> &LanguageMap {
        &self.languages
    }

    /// Process the payload of one PES packet, having the given timestamps.
    ///
    /// An `Err` means the payload was truncated part-way through a data unit.  Rows decoded from
    /// the payload before that point are discarded, but the parser remains usable for the next
    /// payload.
    pub fn parse(&mut self, buf: &[u8], pts: i64, _dts: i64) -> Result<(), TeletextErr> {
        self.last_pts = pts;

        if !self.sent_info {
            self.sent_info = true;
            let info = TextStreamInfo {
                stream_id: self.stream_id,
                time_scale: MPEG2_TIMESCALE,
                sub_streams: self.languages.clone(),
            };
            self.processor.new_stream_info(info);
        }

        self.parse_data_units(buf, pts)
    }

    /// Emit every page still pending, ending at the timestamp of the last `parse()` call.
    pub fn flush(&mut self) {
        let keys: Vec<u16> = self.page_state.keys().copied().collect();
        for key in keys {
            self.send_pending(key, self.last_pts);
        }
    }

    /// Discard all pending pages and decoding state.  Stream info will be announced again on the
    /// next call to `parse()`.
    pub fn reset(&mut self) {
        self.page_state.clear();
        self.magazine = 0;
        self.page_number = 0;
        self.sent_info = false;
        self.charset_code = 0;
        self.charset = tables::charset(0);
    }

    fn parse_data_units(&mut self, data: &[u8], pts: i64) -> Result<(), TeletextErr> {
        let mut r = bitreader::BitReader::new(data);
        r.skip(8).named("data_identifier")?;
        let total_bits = data.len() as u64 * 8;
        let mut lines = Vec::new();

        while r.position() < total_bits {
            let data_unit_id = r.read_u8(8).named("data_unit_id")?;
            let data_unit_length = r.read_u8(8).named("data_unit_length")?;

            if data_unit_length != DATA_UNIT_LENGTH {
                log::warn!(
                    "Teletext: bad data_unit_length {} (expected {})",
                    data_unit_length,
                    DATA_UNIT_LENGTH
                );
                break;
            }

            if data_unit_id != EBU_TELETEXT_WITH_SUBTITLING {
                let start = (r.position() / 8) as usize;
                r.skip(u64::from(DATA_UNIT_LENGTH) * 8).named("data_unit")?;
                log::debug!(
                    "Teletext: skipping data_unit_id {:#04x}: {:02x}",
                    data_unit_id,
                    data[start..start + usize::from(DATA_UNIT_LENGTH)].plain_hex(false)
                );
                continue;
            }

            r.skip(2).named("data_field.reserved_future_use")?;
            let _field_parity = r.read_bool().named("data_field.field_parity")?;
            let _line_offset = r.read_u8(5).named("data_field.line_offset")?;
            let _framing_code = r.read_u8(8).named("data_field.framing_code")?;
            let address = r.read_u16(16).named("data_field.magazine_and_packet_address")?;

            let start = (r.position() / 8) as usize;
            r.skip(DATA_BLOCK_LENGTH as u64 * 8).named("data_field.data_block")?;
            let data_block = &data[start..start + DATA_BLOCK_LENGTH];

            self.parse_data_block(
                pts,
                data_block,
                packet_number(address),
                magazine(address),
                &mut lines,
            )?;
        }

        self.add_lines(lines, pts);
        Ok(())
    }

    fn parse_data_block(
        &mut self,
        pts: i64,
        data_block: &[u8],
        packet_nr: u8,
        magazine: u8,
        lines: &mut Vec<String>,
    ) -> Result<(), TeletextErr> {
        match packet_nr {
            0 => self.parse_page_header(pts, data_block, magazine, lines),
            1..=25 => {
                if self.page_number != FILLER_PAGE {
                    lines.push(build_text(data_block, &self.charset));
                }
                Ok(())
            }
            _ => {
                log::debug!("Teletext: ignoring packet {} of magazine {}", packet_nr, magazine);
                Ok(())
            }
        }
    }

    fn parse_page_header(
        &mut self,
        pts: i64,
        data_block: &[u8],
        magazine: u8,
        lines: &mut Vec<String>,
    ) -> Result<(), TeletextErr> {
        let mut r = bitreader::BitReader::new(data_block);
        let page_units = read_hamming(&mut r, "page_header.page_number_units")?;
        let page_tens = read_hamming(&mut r, "page_header.page_number_tens")?;
        let page_number = if page_tens == 0xf && page_units == 0xf {
            FILLER_PAGE
        } else {
            page_tens * 10 + page_units
        };

        // the page's previous content, if any, is replaced from this point
        self.send_pending(page_key(magazine, page_number), pts);

        if page_number == FILLER_PAGE {
            // rows so far belong to the page the filler header ends
            self.add_lines(std::mem::take(lines), pts);
            self.page_number = page_number;
            self.magazine = magazine;
            log::debug!("Teletext: filler header in magazine {}", magazine);
            return Ok(());
        }
        self.page_number = page_number;
        self.magazine = magazine;

        r.skip(40).named("page_header.subcode")?;
        let control_bits = read_hamming(&mut r, "page_header.control_bits")?;
        let charset_code = control_bits >> 1;
        if charset_code != self.charset_code {
            self.charset_code = charset_code;
            self.charset = tables::charset(charset_code);
        }
        Ok(())
    }

    fn add_lines(&mut self, lines: Vec<String>, pts: i64) {
        if lines.is_empty() {
            return;
        }
        let key = page_key(self.magazine, self.page_number);
        self.page_state
            .entry(key)
            .or_insert_with(|| PageState {
                lines: Vec::new(),
                pts,
            })
            .lines
            .extend(lines);
    }

    fn send_pending(&mut self, key: u16, end_pts: i64) {
        let state = match self.page_state.remove(&key) {
            Some(state) => state,
            None => return,
        };
        if state.lines.is_empty() {
            return;
        }
        log::trace!(
            "Teletext: page {} complete with {} rows, {}..{}",
            key,
            state.lines.len(),
            state.pts,
            end_pts
        );
        let sample = TextSample {
            start_time: state.pts,
            end_time: end_pts,
            sub_stream_index: key,
            body: TextFragment::from_lines(state.lines),
        };
        self.processor.emit_sample(sample);
    }
}
