//! Glue for attaching a [`TeletextParser`](../struct.TeletextParser.html) to the PES handling of
//! [mpeg2ts-reader](https://crates.io/crates/mpeg2ts-reader).
//!
//! The `TeletextElementaryStreamConsumer` gathers the payload of each PES packet (which may span
//! many Transport Stream packets) and hands the whole payload to the parser, along with the PES
//! packet's timestamps, once the packet is complete.

use crate::{TeletextParser, TeletextProcessor};
use mpeg2ts_reader::pes;

pub struct TeletextElementaryStreamConsumer<P>
where
    P: TeletextProcessor,
{
    parser: TeletextParser<P>,
    buf: Vec<u8>,
    /// `(pts, dts)` of the PES packet currently being gathered
    timestamps: Option<(i64, i64)>,
}
impl<P> TeletextElementaryStreamConsumer<P>
where
    P: TeletextProcessor,
{
    pub fn new(parser: TeletextParser<P>) -> TeletextElementaryStreamConsumer<P> {
        TeletextElementaryStreamConsumer {
            parser,
            buf: Vec::new(),
            timestamps: None,
        }
    }

    pub fn parser(&self) -> &TeletextParser<P> {
        &self.parser
    }

    pub fn parser_mut(&mut self) -> &mut TeletextParser<P> {
        &mut self.parser
    }

    pub fn into_parser(self) -> TeletextParser<P> {
        self.parser
    }

    fn read_timestamps(contents: &pes::PesParsedContents<'_>) -> Option<(i64, i64)> {
        match contents.pts_dts() {
            Ok(pes::PtsDts::PtsOnly(Ok(pts))) => {
                let pts = pts.value() as i64;
                Some((pts, pts))
            }
            Ok(pes::PtsDts::Both {
                pts: Ok(pts),
                dts: Ok(dts),
            }) => Some((pts.value() as i64, dts.value() as i64)),
            _ => None,
        }
    }
}
impl<P, Ctx> pes::ElementaryStreamConsumer<Ctx> for TeletextElementaryStreamConsumer<P>
where
    P: TeletextProcessor,
{
    fn start_stream(&mut self, _ctx: &mut Ctx) {}

    fn begin_packet(&mut self, _ctx: &mut Ctx, header: pes::PesHeader<'_>) {
        self.buf.clear();
        self.timestamps = None;
        match header.contents() {
            pes::PesContents::Parsed(Some(contents)) => {
                self.timestamps = Self::read_timestamps(&contents);
                self.buf.extend_from_slice(contents.payload());
            }
            pes::PesContents::Parsed(None) => {
                log::debug!("Teletext: invalid PES header");
            }
            pes::PesContents::Payload(payload) => {
                self.buf.extend_from_slice(payload);
            }
        }
    }

    fn continue_packet(&mut self, _ctx: &mut Ctx, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    fn end_packet(&mut self, _ctx: &mut Ctx) {
        match self.timestamps.take() {
            Some((pts, dts)) => {
                if let Err(e) = self.parser.parse(&self.buf, pts, dts) {
                    log::warn!("Teletext: {}", e);
                }
            }
            None => {
                log::debug!(
                    "Teletext: dropping {} byte PES packet without PTS",
                    self.buf.len()
                );
            }
        }
        self.buf.clear();
    }

    fn continuity_error(&mut self, _ctx: &mut Ctx) {
        log::debug!("Teletext: continuity error, discarding {} bytes", self.buf.len());
        self.buf.clear();
        self.timestamps = None;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tests::{header, pes_data, row, MockProcessor, ENG_888};
    use mpeg2ts_reader::pes::ElementaryStreamConsumer;

    fn pts_bytes(pts: u64) -> [u8; 5] {
        [
            0b0010_0000 | ((pts >> 29) as u8 & 0b1110) | 1,
            (pts >> 22) as u8,
            ((pts >> 14) as u8 & 0b1111_1110) | 1,
            (pts >> 7) as u8,
            ((pts << 1) as u8 & 0b1111_1110) | 1,
        ]
    }

    // private_stream_1 PES packet, with optional PTS
    fn pes_packet(pts: Option<u64>, payload: &[u8]) -> Vec<u8> {
        let header_data_len = if pts.is_some() { 5 } else { 0 };
        let pes_packet_length = 3 + header_data_len + payload.len();
        let mut buf = vec![0x00, 0x00, 0x01, 0xbd];
        buf.extend_from_slice(&(pes_packet_length as u16).to_be_bytes());
        buf.push(0b1000_0100);
        buf.push(if pts.is_some() { 0b1000_0000 } else { 0 });
        buf.push(header_data_len as u8);
        if let Some(pts) = pts {
            buf.extend_from_slice(&pts_bytes(pts));
        }
        buf.extend_from_slice(payload);
        buf
    }

    fn consumer() -> TeletextElementaryStreamConsumer<MockProcessor> {
        let _ = env_logger::builder().is_test(true).try_init();
        TeletextElementaryStreamConsumer::new(TeletextParser::new(
            0x44,
            MockProcessor::default(),
            &ENG_888[..],
        ))
    }

    #[test]
    fn payload_split_across_packets() {
        let mut consumer = consumer();
        let mut ctx = ();
        let data = pes_data(&[header(8, 88, 0), row(8, 1, "Hello")]);
        let packet = pes_packet(Some(900_000), &data);
        let (first, rest) = packet.split_at(60);

        consumer.start_stream(&mut ctx);
        consumer.begin_packet(&mut ctx, pes::PesHeader::from_bytes(first).unwrap());
        consumer.continue_packet(&mut ctx, rest);
        consumer.end_packet(&mut ctx);

        let packet = pes_packet(Some(990_000), &pes_data(&[header(8, 88, 0)]));
        consumer.begin_packet(&mut ctx, pes::PesHeader::from_bytes(&packet).unwrap());
        consumer.end_packet(&mut ctx);

        let p = consumer.parser().processor();
        assert_eq!(p.infos.len(), 1);
        assert_eq!(p.samples.len(), 1);
        assert_eq!(p.samples[0].start_time, 900_000);
        assert_eq!(p.samples[0].end_time, 990_000);
        assert_eq!(p.samples[0].body.to_plain_text(), "Hello");
    }

    #[test]
    fn packet_without_pts_dropped() {
        let mut consumer = consumer();
        let mut ctx = ();
        let packet = pes_packet(None, &pes_data(&[header(8, 88, 0), row(8, 1, "Hello")]));
        consumer.begin_packet(&mut ctx, pes::PesHeader::from_bytes(&packet).unwrap());
        consumer.end_packet(&mut ctx);

        let mut parser = consumer.into_parser();
        parser.flush();
        assert!(parser.processor().infos.is_empty());
        assert!(parser.processor().samples.is_empty());
    }

    #[test]
    fn continuity_error_discards_partial_packet() {
        let mut consumer = consumer();
        let mut ctx = ();
        let data = pes_data(&[header(8, 88, 0), row(8, 1, "Hello")]);
        let packet = pes_packet(Some(900_000), &data);
        let (first, _) = packet.split_at(60);
        consumer.begin_packet(&mut ctx, pes::PesHeader::from_bytes(first).unwrap());
        consumer.continuity_error(&mut ctx);
        consumer.end_packet(&mut ctx);

        consumer.parser_mut().flush();
        assert!(consumer.parser().processor().samples.is_empty());
    }
}
