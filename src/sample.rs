//! Timed-text values handed to a [`TeletextProcessor`](../trait.TeletextProcessor.html).

use std::collections::BTreeMap;

/// Ticks per second of the timestamps carried in [`TextSample`](struct.TextSample.html) values.
pub const MPEG2_TIMESCALE: u32 = 90_000;

/// Announces the subtitle sub-streams available in a teletext elementary stream.
///
/// There is one sub-stream per page key advertised in the stream's descriptor, keyed by page key
/// (`magazine * 100 + page_number`) and giving the ISO 639-2 language of that page.
#[derive(Debug, Clone, PartialEq, Eq, serde_derive::Serialize)]
pub struct TextStreamInfo {
    pub stream_id: u32,
    pub time_scale: u32,
    pub sub_streams: BTreeMap<u16, String>,
}

/// Part of the body of a [`TextSample`](struct.TextSample.html).
#[derive(Debug, Clone, PartialEq, Eq, serde_derive::Serialize)]
pub enum TextFragment {
    /// A run of text, already escaped for inclusion in HTML / XML.
    Text(String),
    /// Forced line break between two rows.
    LineBreak,
    /// Sequence of fragments making up a multi-row page.
    Group(Vec<TextFragment>),
}
impl TextFragment {
    /// A single `Text` fragment for one row, or a `Group` of rows separated by `LineBreak`
    /// fragments.  There is never a break after the last row.
    pub fn from_lines(mut lines: Vec<String>) -> TextFragment {
        if lines.len() == 1 {
            return TextFragment::Text(lines.remove(0));
        }
        let mut fragments = Vec::with_capacity(lines.len() * 2);
        for line in lines {
            if !fragments.is_empty() {
                fragments.push(TextFragment::LineBreak);
            }
            fragments.push(TextFragment::Text(line));
        }
        TextFragment::Group(fragments)
    }

    /// Renders the fragment as plain text with `'\n'` for each line break.
    pub fn to_plain_text(&self) -> String {
        match self {
            TextFragment::Text(t) => t.clone(),
            TextFragment::LineBreak => "\n".to_string(),
            TextFragment::Group(fragments) => fragments.iter().map(|f| f.to_plain_text()).collect(),
        }
    }
}

/// One decoded teletext page, displayed from `start_time` until `end_time`.
#[derive(Debug, Clone, PartialEq, Eq, serde_derive::Serialize)]
pub struct TextSample {
    /// 90kHz presentation timestamp at which the page was first seen.
    pub start_time: i64,
    /// 90kHz presentation timestamp at which the page was replaced, or the stream ended.
    pub end_time: i64,
    /// Page key of the page; matches a key of
    /// [`TextStreamInfo::sub_streams`](struct.TextStreamInfo.html#structfield.sub_streams).
    pub sub_stream_index: u16,
    pub body: TextFragment,
}
