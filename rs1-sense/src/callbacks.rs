//! Consumer callback registry.
//!
//! Out-of-scope subsystems (API surface, telemetry) register a small fixed
//! set of capability functions at init; all are invoked on the sensing
//! context, so they must be cheap and non-blocking.

use rs1_types::{
    ConnectionState, DetectionFrame, PresenceFrame, RadarKind, SmoothedOccupancy, TrackReport,
};

pub type DetectionFrameFn = Box<dyn Fn(&DetectionFrame) + Send + Sync>;
pub type PresenceFrameFn = Box<dyn Fn(&PresenceFrame) + Send + Sync>;
pub type RadarStateFn = Box<dyn Fn(RadarKind, ConnectionState) + Send + Sync>;
pub type TrackUpdateFn = Box<dyn Fn(&[TrackReport]) + Send + Sync>;
pub type ZoneOccupancyFn = Box<dyn Fn(&[(&str, SmoothedOccupancy)]) + Send + Sync>;

/// All consumer hooks; any subset may be registered.
#[derive(Default)]
pub struct CoreCallbacks {
    pub on_detection_frame: Option<DetectionFrameFn>,
    pub on_presence_frame: Option<PresenceFrameFn>,
    /// Called on transitions only.
    pub on_radar_state: Option<RadarStateFn>,
    /// Called after each frame that caused any track state change.
    pub on_track_update: Option<TrackUpdateFn>,
    /// Called when smoothing has changes ready to publish.
    pub on_zone_occupancy: Option<ZoneOccupancyFn>,
}

impl CoreCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn detection_frame(&self, frame: &DetectionFrame) {
        if let Some(cb) = &self.on_detection_frame {
            cb(frame);
        }
    }

    pub(crate) fn presence_frame(&self, frame: &PresenceFrame) {
        if let Some(cb) = &self.on_presence_frame {
            cb(frame);
        }
    }

    pub(crate) fn radar_state(&self, radar: RadarKind, state: ConnectionState) {
        if let Some(cb) = &self.on_radar_state {
            cb(radar, state);
        }
    }

    pub(crate) fn track_update(&self, tracks: &[TrackReport]) {
        if let Some(cb) = &self.on_track_update {
            cb(tracks);
        }
    }

    pub(crate) fn zone_occupancy(&self, changes: &[(&str, SmoothedOccupancy)]) {
        if let Some(cb) = &self.on_zone_occupancy {
            cb(changes);
        }
    }
}
