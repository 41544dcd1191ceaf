//! `tokio_util` codec adapters over the streaming parsers.
//!
//! The codecs only decode; commands are written to the port directly as
//! prebuilt byte vectors. Invalid frames never surface as errors here: the
//! parsers count and drop them, and the stream simply yields the next valid
//! frame.

use bytes::Buf;
use tokio_util::codec::Decoder;

use rs1_types::{DetectionFrame, PresenceFrame};

use crate::{Ld2410Parser, Ld2450Parser, ParserStats};

/// Framed-stream decoder for the tracking radar.
#[derive(Debug, Default)]
pub struct Ld2450Codec {
    parser: Ld2450Parser,
}

impl Ld2450Codec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> ParserStats {
        self.parser.stats()
    }
}

impl Decoder for Ld2450Codec {
    type Item = DetectionFrame;
    type Error = std::io::Error;

    fn decode(&mut self, buf: &mut bytes::BytesMut) -> std::io::Result<Option<Self::Item>> {
        while buf.has_remaining() {
            let byte = buf[0];
            buf.advance(1);
            if let Some(frame) = self.parser.push_byte(byte) {
                return Ok(Some(frame));
            }
        }
        Ok(None)
    }
}

/// Framed-stream decoder for the presence radar.
#[derive(Debug, Default)]
pub struct Ld2410Codec {
    parser: Ld2410Parser,
}

impl Ld2410Codec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> ParserStats {
        self.parser.stats()
    }
}

impl Decoder for Ld2410Codec {
    type Item = PresenceFrame;
    type Error = std::io::Error;

    fn decode(&mut self, buf: &mut bytes::BytesMut) -> std::io::Result<Option<Self::Item>> {
        while buf.has_remaining() {
            let byte = buf[0];
            buf.advance(1);
            if let Some(frame) = self.parser.push_byte(byte) {
                return Ok(Some(frame));
            }
        }
        Ok(None)
    }
}
