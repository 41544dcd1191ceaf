//! Shared data model for the RS-1 presence sensor core.
//!
//! Everything the sensing pipeline passes between components lives here:
//! radar frames, zones, occupancy results and the tunable parameter sets.
//! The crate is deliberately free of I/O so that the parser, tracker and
//! config crates can all depend on it without pulling in a runtime.

use serde::{Deserialize, Serialize};

mod params;
mod zone;

pub use params::{
    default_smoothing_params, default_target_filter_params, default_tdm_params,
    default_tracking_params, DisconnectParams, SmoothingParams, TargetFilterParams, TdmParams,
    TrackingParams, WatchdogParams,
};
pub use zone::{
    polygon_is_simple, SmoothedOccupancy, Zone, ZoneImageError, ZoneKind, ZoneOccupancy,
    ZoneStore, ZoneValidationError, ZoneWarning, MAX_VERTICES_PER_ZONE, MAX_ZONES,
    MIN_VERTICES_PER_ZONE, ZONE_ID_MAX_LEN, ZONE_STORE_IMAGE_LEN,
};

pub type MyFloat = f64;

/// Maximum simultaneous targets reported by the tracking radar.
pub const MAX_TARGETS: usize = 3;

/// Number of range gates in a presence-radar energy array.
///
/// The wire format carries 8 gates; a 9th is zero-padded for compatibility
/// with consumers written against the larger gate count.
pub const NUM_RANGE_GATES: usize = 9;

/// Which physical radar a frame or event originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RadarKind {
    /// Stationary-presence radar (gate-based energy).
    Ld2410,
    /// Multi-target tracking radar (x/y/velocity).
    Ld2450,
}

impl std::fmt::Display for RadarKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RadarKind::Ld2410 => write!(f, "LD2410"),
            RadarKind::Ld2450 => write!(f, "LD2450"),
        }
    }
}

/// Liveness of one radar's serial feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

/// One radar return for one target slot in one frame.
///
/// Invariant: when `valid` is false all numeric fields are zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub x_mm: i16,
    pub y_mm: i16,
    pub speed_cm_s: i16,
    pub resolution_mm: u16,
    /// 0..=100, derived from `resolution_mm` by the parser.
    pub signal_quality: u8,
    pub valid: bool,
}

impl Detection {
    pub const EMPTY: Detection = Detection {
        x_mm: 0,
        y_mm: 0,
        speed_cm_s: 0,
        resolution_mm: 0,
        signal_quality: 0,
        valid: false,
    };
}

/// One decoded tracking-radar frame.
///
/// Invariant: `target_count == targets.iter().filter(|d| d.valid).count()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionFrame {
    pub targets: [Detection; MAX_TARGETS],
    pub target_count: u8,
    /// Monotonic milliseconds since boot at decode time.
    pub timestamp_ms: u32,
    /// Monotone across one parser instance.
    pub frame_seq: u32,
}

impl DetectionFrame {
    /// Recompute `target_count` from the `valid` flags.
    pub fn recount(&mut self) {
        self.target_count = self.targets.iter().filter(|d| d.valid).count() as u8;
    }

    pub fn valid_targets(&self) -> impl Iterator<Item = &Detection> {
        self.targets.iter().filter(|d| d.valid)
    }
}

/// Target state reported by the stationary-presence radar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresenceTargetState {
    #[default]
    None,
    Moving,
    Stationary,
    Both,
}

impl PresenceTargetState {
    pub fn from_wire(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(PresenceTargetState::None),
            0x01 => Some(PresenceTargetState::Moving),
            0x02 => Some(PresenceTargetState::Stationary),
            0x03 => Some(PresenceTargetState::Both),
            _ => None,
        }
    }

    pub fn is_present(&self) -> bool {
        !matches!(self, PresenceTargetState::None)
    }
}

/// One decoded presence-radar engineering frame.
///
/// Invariant: `state == None` implies both energies are zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PresenceFrame {
    pub state: PresenceTargetState,
    pub moving_distance_cm: u16,
    pub stationary_distance_cm: u16,
    /// 0..=100.
    pub moving_energy: u8,
    /// 0..=100.
    pub stationary_energy: u8,
    pub moving_gate_energy: [u8; NUM_RANGE_GATES],
    pub stationary_gate_energy: [u8; NUM_RANGE_GATES],
    pub timestamp_ms: u32,
    pub frame_seq: u32,
}

/// State of one persistent track hypothesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackState {
    /// Seen, not yet trusted.
    Tentative,
    /// Established target.
    Confirmed,
    /// Confirmed target currently missing detections.
    Occluded,
    /// Finished; the slot is free for reuse.
    Retired,
}

impl TrackState {
    /// Whether consumers (zone engine, callbacks) should see this track.
    pub fn is_confirmed(&self) -> bool {
        matches!(self, TrackState::Confirmed | TrackState::Occluded)
    }
}

/// Public view of one track, published to consumers after each frame.
///
/// The Kalman internals stay inside the tracker; this carries the state
/// estimate plus the lifecycle bookkeeping consumers may inspect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackReport {
    /// Unique per boot, never reused.
    pub id: u32,
    pub state: TrackState,
    pub x_mm: MyFloat,
    pub y_mm: MyFloat,
    pub vx_mm_s: MyFloat,
    pub vy_mm_s: MyFloat,
    pub consecutive_hits: u16,
    pub consecutive_misses: u16,
    /// 0..=100, rises on hit, decays on miss. Informational only.
    pub confidence: u8,
    pub last_update_ms: u32,
}

impl TrackReport {
    pub fn confirmed(&self) -> bool {
        self.state.is_confirmed()
    }
}
