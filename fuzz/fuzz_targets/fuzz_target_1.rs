#![no_main]
use libfuzzer_sys::fuzz_target;
use teletext_reader::sample::{TextSample, TextStreamInfo};
use teletext_reader::*;

struct FuzzTeletextProcessor;
impl TeletextProcessor for FuzzTeletextProcessor {
    fn new_stream_info(&mut self, info: TextStreamInfo) {
        format!("{:?}", info);
    }
    fn emit_sample(&mut self, sample: TextSample) {
        // exercise every fragment
        sample.body.to_plain_text();
    }
}
fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }
    // first byte says how much of the input is descriptor, the rest is split into PES payloads
    let descriptor_len = (data[0] as usize).min(data.len() - 1);
    let (descriptor, rest) = data[1..].split_at(descriptor_len);
    let mut parser = TeletextParser::new(0x44, FuzzTeletextProcessor, descriptor);
    for (i, payload) in rest.chunks(93).enumerate() {
        let pts = i as i64 * 3600;
        let _ = parser.parse(payload, pts, pts);
    }
    parser.flush();
    parser.reset();
});
