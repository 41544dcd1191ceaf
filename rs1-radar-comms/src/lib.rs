//! Wire protocols and stream parsers for the RS-1 radar modules.
//!
//! Two distinct framed serial protocols share this crate: the LD2450-style
//! multi-target tracking radar and the LD2410-style stationary-presence
//! radar in engineering mode. The parsers are pure byte-at-a-time state
//! machines with no I/O and no clock; the driver stamps timestamps onto
//! decoded frames. [`Ld2450Codec`] and [`Ld2410Codec`] adapt the parsers to
//! `tokio_util` framed streams.

pub mod ld2410;
pub mod ld2450;

mod codec;
mod filter;

pub use codec::{Ld2410Codec, Ld2450Codec};
pub use filter::TargetFilter;
pub use ld2410::Ld2410Parser;
pub use ld2450::Ld2450Parser;

/// Both radars run their serial links at this rate, 8N1.
pub const BAUD_RATE: u32 = 256_000;

/// Counters every stream parser maintains.
///
/// `frames_parsed + frames_invalid` accounts for every complete frame-sized
/// window the parser consumed from the stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserStats {
    pub frames_parsed: u32,
    pub frames_invalid: u32,
}

/// Streaming parser states shared by both protocols.
///
/// In `WaitHeader` the header is matched byte by byte; a mismatching byte
/// resets the match and is itself immediately reconsidered as a possible
/// first header byte. `ReceiveData` fills the frame buffer to the expected
/// length, then validates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    WaitHeader { matched: usize },
    ReceiveData { filled: usize },
}

impl ParserState {
    fn start() -> ParserState {
        ParserState::WaitHeader { matched: 0 }
    }
}
