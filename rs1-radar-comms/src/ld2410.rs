//! LD2410-style stationary-presence radar protocol, engineering mode.
//!
//! Fixed 39-byte data frame:
//!
//! ```text
//! offset len  field
//!  0      4   header F4 F3 F2 F1
//!  4      2   u16 LE intra-frame length (29)
//!  6      1   data type, must be 0x01 (engineering)
//!  7      1   inner head 0xAA
//!  8      1   target state (0 none, 1 moving, 2 stationary, 3 both)
//!  9      2   u16 LE moving target distance, cm
//! 11      1   moving target energy 0..=100
//! 12      2   u16 LE stationary target distance, cm
//! 14      1   stationary target energy 0..=100
//! 15      1   max moving range gate
//! 16      1   max stationary range gate
//! 17      8   per-gate moving energies
//! 25      8   per-gate stationary energies
//! 33      1   inner tail 0x55
//! 34      1   check byte
//! 35      4   footer F8 F7 F6 F5
//! ```
//!
//! The output arrays carry nine gates; the ninth is zero-padded.
//!
//! Configuration commands share the wrapper
//! `FD FC FB FA [len LE] [cmd LE] [data…] 04 03 02 01`. Engineering output
//! is enabled at startup with enable-config (0xFF), enable-engineering
//! (0x62), end-config (0xFE), each followed by a settle delay.

use rs1_types::{PresenceFrame, PresenceTargetState};

use crate::{ParserState, ParserStats};

pub const FRAME_LEN: usize = 39;
pub const HEADER: [u8; 4] = [0xF4, 0xF3, 0xF2, 0xF1];
pub const FOOTER: [u8; 4] = [0xF8, 0xF7, 0xF6, 0xF5];

const INTRA_FRAME_LEN: u16 = 29;
const DATA_TYPE_ENGINEERING: u8 = 0x01;
const INNER_HEAD: u8 = 0xAA;
const INNER_TAIL: u8 = 0x55;
const FOOTER_OFFSET: usize = 35;

const CMD_HEADER: [u8; 4] = [0xFD, 0xFC, 0xFB, 0xFA];
const CMD_FOOTER: [u8; 4] = [0x04, 0x03, 0x02, 0x01];

const CMD_ENABLE_CONFIG: u16 = 0x00FF;
const CMD_ENABLE_ENGINEERING: u16 = 0x0062;
const CMD_END_CONFIG: u16 = 0x00FE;

/// Settle delay after each configuration command, ms.
pub const CONFIG_SETTLE_MS: u64 = 100;

/// Wrap a command word and payload in the shared command envelope.
pub fn build_command(cmd: u16, data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(CMD_HEADER.len() + 2 + 2 + data.len() + CMD_FOOTER.len());
    out.extend_from_slice(&CMD_HEADER);
    out.extend_from_slice(&((2 + data.len()) as u16).to_le_bytes());
    out.extend_from_slice(&cmd.to_le_bytes());
    out.extend_from_slice(data);
    out.extend_from_slice(&CMD_FOOTER);
    out
}

pub fn enable_config_command() -> Vec<u8> {
    build_command(CMD_ENABLE_CONFIG, &[0x01, 0x00])
}

pub fn enable_engineering_command() -> Vec<u8> {
    build_command(CMD_ENABLE_ENGINEERING, &[])
}

pub fn end_config_command() -> Vec<u8> {
    build_command(CMD_END_CONFIG, &[])
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("bad header")]
    Header,
    #[error("bad footer")]
    Footer,
    #[error("intra-frame length {0} != {INTRA_FRAME_LEN}")]
    Length(u16),
    #[error("data type {0:#04x} is not engineering (0x01)")]
    DataType(u8),
    #[error("inner head/tail marker missing")]
    InnerMarker,
    #[error("unknown target state byte {0:#04x}")]
    TargetState(u8),
}

/// Decode one complete engineering frame.
pub fn parse_frame(frame: &[u8; FRAME_LEN]) -> Result<PresenceFrame, FrameError> {
    if frame[..4] != HEADER {
        return Err(FrameError::Header);
    }
    if frame[FOOTER_OFFSET..] != FOOTER {
        return Err(FrameError::Footer);
    }
    let len = u16::from_le_bytes([frame[4], frame[5]]);
    if len != INTRA_FRAME_LEN {
        return Err(FrameError::Length(len));
    }
    if frame[6] != DATA_TYPE_ENGINEERING {
        return Err(FrameError::DataType(frame[6]));
    }
    if frame[7] != INNER_HEAD || frame[33] != INNER_TAIL {
        return Err(FrameError::InnerMarker);
    }
    let state = PresenceTargetState::from_wire(frame[8]).ok_or(FrameError::TargetState(frame[8]))?;

    let mut out = PresenceFrame {
        state,
        moving_distance_cm: u16::from_le_bytes([frame[9], frame[10]]),
        moving_energy: frame[11].min(100),
        stationary_distance_cm: u16::from_le_bytes([frame[12], frame[13]]),
        stationary_energy: frame[14].min(100),
        ..PresenceFrame::default()
    };
    for gate in 0..8 {
        out.moving_gate_energy[gate] = frame[17 + gate].min(100);
        out.stationary_gate_energy[gate] = frame[25 + gate].min(100);
    }
    if state == PresenceTargetState::None {
        // No target: the energy fields are noise, zero them.
        out.moving_energy = 0;
        out.stationary_energy = 0;
    }
    Ok(out)
}

/// Byte-at-a-time streaming parser with automatic resynchronisation.
#[derive(Debug)]
pub struct Ld2410Parser {
    state: ParserState,
    buf: [u8; FRAME_LEN],
    stats: ParserStats,
    frame_seq: u32,
}

impl Default for Ld2410Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Ld2410Parser {
    pub fn new() -> Self {
        Ld2410Parser {
            state: ParserState::start(),
            buf: [0u8; FRAME_LEN],
            stats: ParserStats::default(),
            frame_seq: 0,
        }
    }

    pub fn stats(&self) -> ParserStats {
        self.stats
    }

    pub fn push_byte(&mut self, byte: u8) -> Option<PresenceFrame> {
        match self.state {
            ParserState::WaitHeader { matched } => {
                if byte == HEADER[matched] {
                    let matched = matched + 1;
                    if matched == HEADER.len() {
                        self.buf[..HEADER.len()].copy_from_slice(&HEADER);
                        self.state = ParserState::ReceiveData {
                            filled: HEADER.len(),
                        };
                    } else {
                        self.state = ParserState::WaitHeader { matched };
                    }
                } else {
                    let matched = usize::from(byte == HEADER[0]);
                    self.state = ParserState::WaitHeader { matched };
                }
                None
            }
            ParserState::ReceiveData { filled } => {
                self.buf[filled] = byte;
                let filled = filled + 1;
                if filled < FRAME_LEN {
                    self.state = ParserState::ReceiveData { filled };
                    return None;
                }
                self.state = ParserState::start();
                match parse_frame(&self.buf) {
                    Ok(mut frame) => {
                        frame.frame_seq = self.frame_seq;
                        self.frame_seq = self.frame_seq.wrapping_add(1);
                        self.stats.frames_parsed = self.stats.frames_parsed.wrapping_add(1);
                        Some(frame)
                    }
                    Err(e) => {
                        tracing::trace!("dropping invalid LD2410 frame: {e}");
                        self.stats.frames_invalid = self.stats.frames_invalid.wrapping_add(1);
                        None
                    }
                }
            }
        }
    }

    pub fn push_bytes(&mut self, bytes: &[u8], mut on_frame: impl FnMut(PresenceFrame)) {
        for &b in bytes {
            if let Some(frame) = self.push_byte(b) {
                on_frame(frame);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rs1_types::NUM_RANGE_GATES;

    fn build_frame(
        state: u8,
        moving: (u16, u8),
        stationary: (u16, u8),
        moving_gates: [u8; 8],
        stationary_gates: [u8; 8],
    ) -> Vec<u8> {
        let mut f = vec![0u8; FRAME_LEN];
        f[..4].copy_from_slice(&HEADER);
        f[4..6].copy_from_slice(&INTRA_FRAME_LEN.to_le_bytes());
        f[6] = DATA_TYPE_ENGINEERING;
        f[7] = INNER_HEAD;
        f[8] = state;
        f[9..11].copy_from_slice(&moving.0.to_le_bytes());
        f[11] = moving.1;
        f[12..14].copy_from_slice(&stationary.0.to_le_bytes());
        f[14] = stationary.1;
        f[15] = 8;
        f[16] = 8;
        f[17..25].copy_from_slice(&moving_gates);
        f[25..33].copy_from_slice(&stationary_gates);
        f[33] = INNER_TAIL;
        f[34] = 0x00;
        f[FOOTER_OFFSET..].copy_from_slice(&FOOTER);
        f
    }

    #[test]
    fn engineering_frame_decodes() {
        let bytes = build_frame(
            0x03,
            (150, 80),
            (210, 55),
            [10, 20, 30, 40, 50, 60, 70, 80],
            [1, 2, 3, 4, 5, 6, 7, 8],
        );
        let frame = parse_frame(bytes.as_slice().try_into().unwrap()).unwrap();
        assert_eq!(frame.state, PresenceTargetState::Both);
        assert_eq!(frame.moving_distance_cm, 150);
        assert_eq!(frame.moving_energy, 80);
        assert_eq!(frame.stationary_distance_cm, 210);
        assert_eq!(frame.stationary_energy, 55);
        assert_eq!(frame.moving_gate_energy[..8], [10, 20, 30, 40, 50, 60, 70, 80]);
        // The ninth gate is zero-padded.
        assert_eq!(frame.moving_gate_energy[NUM_RANGE_GATES - 1], 0);
        assert_eq!(frame.stationary_gate_energy[NUM_RANGE_GATES - 1], 0);
    }

    #[test]
    fn none_state_zeroes_energies() {
        let bytes = build_frame(0x00, (0, 33), (0, 44), [0; 8], [0; 8]);
        let frame = parse_frame(bytes.as_slice().try_into().unwrap()).unwrap();
        assert_eq!(frame.state, PresenceTargetState::None);
        assert_eq!(frame.moving_energy, 0);
        assert_eq!(frame.stationary_energy, 0);
    }

    #[test]
    fn basic_mode_frame_rejected() {
        // Data type 0x02 is the non-engineering report.
        let mut bytes = build_frame(0x01, (100, 50), (0, 0), [0; 8], [0; 8]);
        bytes[6] = 0x02;
        let mut parser = Ld2410Parser::new();
        let mut frames = Vec::new();
        parser.push_bytes(&bytes, |f| frames.push(f));
        assert!(frames.is_empty());
        assert_eq!(parser.stats().frames_invalid, 1);
    }

    #[test]
    fn resync_after_truncated_frame() {
        let good = build_frame(0x02, (0, 0), (180, 60), [0; 8], [5; 8]);
        let mut stream = good[..20].to_vec(); // truncated frame
        stream.extend_from_slice(&good);
        stream.extend_from_slice(&good);

        let mut parser = Ld2410Parser::new();
        let mut frames = Vec::new();
        parser.push_bytes(&stream, |f| frames.push(f));
        // The truncated prefix swallows the first real frame's header bytes
        // into a garbage window; the parser recovers on the next header.
        assert!(!frames.is_empty());
        let stats = parser.stats();
        assert_eq!(stats.frames_parsed, frames.len() as u32);
        assert!(stats.frames_invalid >= 1);
    }

    #[test]
    fn command_wrapper_layout() {
        let cmd = enable_config_command();
        assert_eq!(&cmd[..4], &CMD_HEADER);
        assert_eq!(&cmd[cmd.len() - 4..], &CMD_FOOTER);
        // len = cmd word + payload = 4.
        assert_eq!(u16::from_le_bytes([cmd[4], cmd[5]]), 4);
        assert_eq!(u16::from_le_bytes([cmd[6], cmd[7]]), CMD_ENABLE_CONFIG);
        assert_eq!(&cmd[8..10], &[0x01, 0x00]);

        let eng = enable_engineering_command();
        assert_eq!(u16::from_le_bytes([eng[4], eng[5]]), 2);
        assert_eq!(u16::from_le_bytes([eng[6], eng[7]]), CMD_ENABLE_ENGINEERING);

        let end = end_config_command();
        assert_eq!(u16::from_le_bytes([end[6], end[7]]), CMD_END_CONFIG);
    }
}
