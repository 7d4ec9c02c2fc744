//! Decoding of the _teletext_descriptor()_ (_EN 300 468, section 6.2.43_) found in the PMT entry
//! of a teletext elementary stream, which names the language of each subtitle page.

use crate::{ErrorFieldNamed, TeletextErr};
use std::collections::BTreeMap;

const ENTRY_LENGTH: usize = 5;

/// Page key (`magazine * 100 + page_number`) to ISO 639-2 language code.
pub type LanguageMap = BTreeMap<u16, String>;

/// Combine a magazine and page number into a single key identifying a page within the stream.
pub fn page_key(magazine: u8, page_number: u8) -> u16 {
    u16::from(magazine) * 100 + u16::from(page_number)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde_derive::Serialize)]
pub enum TeletextType {
    InitialPage,
    SubtitlePage,
    AdditionalInformationPage,
    ProgrammeSchedulePage,
    HearingImpairedSubtitlePage,
    Reserved(u8),
}
impl TeletextType {
    pub fn from_id(id: u8) -> TeletextType {
        match id {
            0x01 => TeletextType::InitialPage,
            0x02 => TeletextType::SubtitlePage,
            0x03 => TeletextType::AdditionalInformationPage,
            0x04 => TeletextType::ProgrammeSchedulePage,
            0x05 => TeletextType::HearingImpairedSubtitlePage,
            _ => TeletextType::Reserved(id),
        }
    }
}

/// One language entry of the descriptor.
#[derive(Debug, Clone, PartialEq, Eq, serde_derive::Serialize)]
pub struct TeletextDescriptorEntry {
    pub language_code: String,
    pub teletext_type: TeletextType,
    /// `1`-`8`; a magazine value of `0` on the wire is reported as `8`.
    pub magazine: u8,
    pub page_number: u8,
}
impl TeletextDescriptorEntry {
    pub fn page_key(&self) -> u16 {
        page_key(self.magazine, self.page_number)
    }
}

/// Parse every language entry of the given descriptor, which must start with the descriptor's
/// tag and length bytes.
pub fn parse_entries(buf: &[u8]) -> Result<Vec<TeletextDescriptorEntry>, TeletextErr> {
    let mut r = bitreader::BitReader::new(buf);
    r.skip(8).named("teletext_descriptor.descriptor_tag")?;
    let data_size = r.read_u8(8).named("teletext_descriptor.descriptor_length")? as usize;
    if data_size + 2 > buf.len() {
        return Err(TeletextErr::DescriptorTooLong {
            declared: data_size,
            available: buf.len() - 2,
        });
    }
    // don't read into whatever follows this descriptor
    let mut r = bitreader::BitReader::new(&buf[2..2 + data_size]);

    let entry_count = data_size / ENTRY_LENGTH;
    if data_size % ENTRY_LENGTH != 0 {
        log::debug!(
            "teletext_descriptor: ignoring {} bytes after last entry",
            data_size % ENTRY_LENGTH
        );
    }
    let mut entries = Vec::with_capacity(entry_count);
    for _ in 0..entry_count {
        let lang_code = r.read_u32(24).named("teletext_descriptor.ISO_639_language_code")?;
        let teletext_type = r.read_u8(5).named("teletext_descriptor.teletext_type")?;
        let mut magazine = r.read_u8(3).named("teletext_descriptor.teletext_magazine_number")?;
        if magazine == 0 {
            magazine = 8;
        }
        let page_tens = r.read_u8(4).named("teletext_descriptor.teletext_page_number")?;
        let page_units = r.read_u8(4).named("teletext_descriptor.teletext_page_number")?;

        // ISO 639-2 codes are ISO 8859-1 text
        let language_code = lang_code.to_be_bytes()[1..]
            .iter()
            .map(|&b| char::from(b))
            .collect();
        let entry = TeletextDescriptorEntry {
            language_code,
            teletext_type: TeletextType::from_id(teletext_type),
            magazine,
            page_number: page_tens * 10 + page_units,
        };
        log::trace!("teletext_descriptor: {:?}", entry);
        entries.push(entry);
    }
    Ok(entries)
}

/// Build the page-key to language mapping for the given descriptor.
///
/// Where several entries share a page key, the first one wins.
pub fn language_map(buf: &[u8]) -> Result<LanguageMap, TeletextErr> {
    let mut result = LanguageMap::new();
    for entry in parse_entries(buf)? {
        let key = entry.page_key();
        result.entry(key).or_insert(entry.language_code);
    }
    Ok(result)
}

#[cfg(test)]
mod test {
    use super::*;
    use hex_literal::*;
    use matches::*;

    #[test]
    fn two_languages() {
        // tag 0x56, two entries: "eng" subtitles at 888, "deu" subtitles at 250
        let data = hex!("560a 656e67 10 88 646575 12 50");
        let entries = parse_entries(&data[..]).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].language_code, "eng");
        assert_eq!(entries[0].teletext_type, TeletextType::SubtitlePage);
        assert_eq!(entries[0].magazine, 8);
        assert_eq!(entries[0].page_number, 88);
        assert_eq!(entries[1].language_code, "deu");
        assert_eq!(entries[1].magazine, 2);
        assert_eq!(entries[1].page_number, 50);

        let map = language_map(&data[..]).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map[&888], "eng");
        assert_eq!(map[&250], "deu");
    }

    #[test]
    fn first_entry_wins() {
        let data = hex!("560a 656e67 10 88 667261 28 88");
        let entries = parse_entries(&data[..]).unwrap();
        assert_eq!(entries[1].teletext_type, TeletextType::HearingImpairedSubtitlePage);
        let map = language_map(&data[..]).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map[&888], "eng");
    }

    #[test]
    fn declared_length_too_long() {
        let data = hex!("560a 656e67 10 88");
        assert_matches!(
            language_map(&data[..]),
            Err(TeletextErr::DescriptorTooLong { declared: 10, available: 5 })
        );
    }

    #[test]
    fn empty() {
        assert_matches!(language_map(&[]), Err(TeletextErr::NotEnoughData { .. }));
        assert_eq!(language_map(&hex!("5600")[..]).unwrap().len(), 0);
    }

    #[test]
    fn partial_trailing_entry_ignored() {
        let data = hex!("5606 656e67 10 88 00");
        assert_eq!(parse_entries(&data[..]).unwrap().len(), 1);
        let map = language_map(&data[..]).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map[&888], "eng");

        let data = hex!("5609 656e67 10 88 646575 12");
        let map = language_map(&data[..]).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map[&888], "eng");
    }

    #[test]
    fn ignores_trailing_descriptor() {
        // a second descriptor follows in the same buffer
        let data = hex!("5605 656e67 10 88 0a04 656e6700");
        let map = language_map(&data[..]).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map[&888], "eng");
    }

    #[test]
    fn page_keys_are_distinct() {
        let mut seen = std::collections::HashSet::new();
        for magazine in 1..=8 {
            for page in 0..=99 {
                assert!(seen.insert(page_key(magazine, page)));
            }
        }
        assert_eq!(page_key(8, 12), 812);
    }
}
