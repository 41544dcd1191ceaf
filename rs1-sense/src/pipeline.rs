//! Synchronous per-frame pipeline and its shared-ownership wrapper.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use rs1_types::{
    DetectionFrame, PresenceFrame, RadarKind, SmoothedOccupancy, SmoothingParams, TrackingParams,
    ZoneOccupancy, MAX_ZONES,
};

use crate::callbacks::CoreCallbacks;
use crate::smoothing::PresenceSmoother;
use crate::snapshot::ActiveZones;
use crate::stats::CoreStats;
use crate::timebase::{FrameIntervalTracker, Timebase};
use crate::tracker::Tracker;
use crate::zones::evaluate_zones;

/// Nominal per-radar frame cadence under TDM, ms.
const EXPECTED_FRAME_INTERVAL_MS: u32 = 100;

/// The sensing-context pipeline: tracker → zones → smoothing → sinks.
///
/// One frame flows through synchronously; nothing here allocates and the
/// only lock taken is the active-zone snapshot's pointer copy.
pub struct SensePipeline {
    tracker: Tracker,
    smoother: PresenceSmoother,
    callbacks: CoreCallbacks,
    stats: Arc<CoreStats>,
    active_zones: Arc<ActiveZones>,
    zone_scratch: [ZoneOccupancy; MAX_ZONES],
    holds_ms: [u32; MAX_ZONES],
    seen_version: Option<u32>,
    detection_intervals: FrameIntervalTracker,
    presence_intervals: FrameIntervalTracker,
}

impl SensePipeline {
    pub fn new(
        tracking: TrackingParams,
        smoothing: SmoothingParams,
        callbacks: CoreCallbacks,
        stats: Arc<CoreStats>,
        active_zones: Arc<ActiveZones>,
    ) -> Self {
        SensePipeline {
            tracker: Tracker::new(tracking),
            smoother: PresenceSmoother::new(smoothing),
            callbacks,
            stats,
            active_zones,
            zone_scratch: [ZoneOccupancy::default(); MAX_ZONES],
            holds_ms: [0; MAX_ZONES],
            seen_version: None,
            detection_intervals: FrameIntervalTracker::new(EXPECTED_FRAME_INTERVAL_MS),
            presence_intervals: FrameIntervalTracker::new(EXPECTED_FRAME_INTERVAL_MS),
        }
    }

    pub fn detection_interval_stats(&self) -> crate::timebase::FrameIntervalStats {
        self.detection_intervals.stats()
    }

    pub fn presence_interval_stats(&self) -> crate::timebase::FrameIntervalStats {
        self.presence_intervals.stats()
    }

    /// Run one tracking-radar frame through the full pipeline.
    pub fn handle_detection_frame(&mut self, frame: &DetectionFrame) {
        let now = frame.timestamp_ms;
        self.stats.count_frame(RadarKind::Ld2450);
        self.detection_intervals.record_frame(now);
        self.callbacks.detection_frame(frame);

        let changed = self.tracker.process_frame(frame);
        self.stats.set_tracks_confirmed(self.tracker.confirmed_total());
        self.stats
            .set_divergence_resets(self.tracker.divergence_resets());
        if changed {
            self.callbacks.track_update(self.tracker.reports());
        }

        // Read lease on the active snapshot for the rest of this frame.
        let snapshot = self.active_zones.snapshot();
        if self.seen_version != Some(snapshot.version) {
            debug!(version = snapshot.version, "zone snapshot adopted");
            self.smoother.reset(snapshot.zones.len());
            for (idx, zone) in snapshot.zones.iter().enumerate() {
                self.holds_ms[idx] = SmoothingParams::hold_ms_for_sensitivity(zone.sensitivity);
            }
            self.seen_version = Some(snapshot.version);
        }

        evaluate_zones(self.tracker.reports(), &snapshot, &mut self.zone_scratch);
        self.smoother.observe(&self.zone_scratch, &self.holds_ms, now);
        if let Some(changes) = self.smoother.poll_publish(now) {
            let mut out: [(&str, SmoothedOccupancy); MAX_ZONES] =
                [("", SmoothedOccupancy::default()); MAX_ZONES];
            let n = changes.len();
            for (i, change) in changes.iter().enumerate() {
                out[i] = (
                    snapshot.zones[change.zone_index].id.as_str(),
                    change.occupancy,
                );
            }
            self.callbacks.zone_occupancy(&out[..n]);
        }
    }

    /// Presence-radar frames pass straight to the registered sink.
    pub fn handle_presence_frame(&mut self, frame: &PresenceFrame) {
        self.stats.count_frame(RadarKind::Ld2410);
        self.presence_intervals.record_frame(frame.timestamp_ms);
        self.callbacks.presence_frame(frame);
    }

    pub(crate) fn callbacks(&self) -> &CoreCallbacks {
        &self.callbacks
    }
}

/// Top-level owner of the sensing core's shared pieces.
///
/// Init once; hand [`SenseCore::pipeline`] to the radar drivers and
/// [`SenseCore::active_zones`] to the config layer.
pub struct SenseCore {
    timebase: Arc<Timebase>,
    stats: Arc<CoreStats>,
    active_zones: Arc<ActiveZones>,
    pipeline: Arc<Mutex<SensePipeline>>,
}

impl SenseCore {
    pub fn new(
        tracking: TrackingParams,
        smoothing: SmoothingParams,
        callbacks: CoreCallbacks,
    ) -> Self {
        let timebase = Arc::new(Timebase::new());
        let stats = Arc::new(CoreStats::new());
        let active_zones = Arc::new(ActiveZones::empty());
        let pipeline = Arc::new(Mutex::new(SensePipeline::new(
            tracking,
            smoothing,
            callbacks,
            stats.clone(),
            active_zones.clone(),
        )));
        SenseCore {
            timebase,
            stats,
            active_zones,
            pipeline,
        }
    }

    pub fn timebase(&self) -> Arc<Timebase> {
        self.timebase.clone()
    }

    pub fn stats(&self) -> Arc<CoreStats> {
        self.stats.clone()
    }

    pub fn active_zones(&self) -> Arc<ActiveZones> {
        self.active_zones.clone()
    }

    pub fn pipeline(&self) -> Arc<Mutex<SensePipeline>> {
        self.pipeline.clone()
    }

    /// Convenience for synchronous callers (tests, replay tools).
    pub fn handle_detection_frame(&self, frame: &DetectionFrame) {
        self.pipeline.lock().handle_detection_frame(frame);
    }

    pub fn handle_presence_frame(&self, frame: &PresenceFrame) {
        self.pipeline.lock().handle_presence_frame(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rs1_types::{
        default_tracking_params, Detection, Zone, ZoneKind, ZoneStore,
    };

    fn detection_frame(ts: u32, targets: &[(i16, i16)]) -> DetectionFrame {
        let mut f = DetectionFrame {
            timestamp_ms: ts,
            ..DetectionFrame::default()
        };
        for (i, &(x, y)) in targets.iter().enumerate() {
            f.targets[i] = Detection {
                x_mm: x,
                y_mm: y,
                speed_cm_s: 0,
                resolution_mm: 100,
                signal_quality: 100,
                valid: true,
            };
        }
        f.recount();
        f
    }

    fn zone(id: &str, x0: i16, x1: i16) -> Zone {
        Zone {
            id: id.to_string(),
            name: id.to_string(),
            kind: ZoneKind::Include,
            vertices: vec![(x0, 0), (x1, 0), (x1, 3000), (x0, 3000)],
            sensitivity: 50,
        }
    }

    #[test]
    fn end_to_end_occupancy_publishes() {
        let events: Arc<Mutex<Vec<(String, SmoothedOccupancy)>>> =
            Arc::new(Mutex::new(Vec::new()));
        let events2 = events.clone();
        let mut callbacks = CoreCallbacks::new();
        callbacks.on_zone_occupancy = Some(Box::new(move |changes| {
            let mut sink = events2.lock();
            for (id, occ) in changes {
                sink.push((id.to_string(), *occ));
            }
        }));

        let core = SenseCore::new(
            default_tracking_params(),
            SmoothingParams::default(),
            callbacks,
        );
        core.active_zones().install(ZoneStore {
            version: 1,
            updated_at: 0,
            zones: vec![zone("desk", 0, 2000)],
        });

        // Two hits confirm the track; the zone publishes occupied.
        let mut ts = 0;
        for _ in 0..3 {
            core.handle_detection_frame(&detection_frame(ts, &[(1000, 1500)]));
            ts += 100;
        }
        let published = events.lock().clone();
        assert!(!published.is_empty());
        let (id, occ) = &published[0];
        assert_eq!(id, "desk");
        assert!(occ.stable);
        assert_eq!(occ.target_count, 1);
    }

    #[test]
    fn zone_boundary_target_lands_in_exactly_one_zone() {
        let events: Arc<Mutex<Vec<(String, SmoothedOccupancy)>>> =
            Arc::new(Mutex::new(Vec::new()));
        let events2 = events.clone();
        let mut callbacks = CoreCallbacks::new();
        callbacks.on_zone_occupancy = Some(Box::new(move |changes| {
            let mut sink = events2.lock();
            for (id, occ) in changes {
                sink.push((id.to_string(), *occ));
            }
        }));

        let core = SenseCore::new(
            default_tracking_params(),
            SmoothingParams::default(),
            callbacks,
        );
        core.active_zones().install(ZoneStore {
            version: 1,
            updated_at: 0,
            zones: vec![zone("left", 0, 2000), zone("right", 2000, 4000)],
        });

        // Ten frames with a target exactly on the shared edge x=2000.
        let mut ts = 0;
        for _ in 0..10 {
            core.handle_detection_frame(&detection_frame(ts, &[(2000, 1000)]));
            ts += 100;
        }
        let published = events.lock().clone();
        let occupied: Vec<_> = published
            .iter()
            .filter(|(_, occ)| occ.stable)
            .map(|(id, _)| id.clone())
            .collect();
        assert!(!occupied.is_empty());
        assert!(
            occupied.iter().all(|id| id == &occupied[0]),
            "boundary target flapped between zones: {occupied:?}"
        );
    }

    #[test]
    fn snapshot_swap_applies_between_frames() {
        let core = SenseCore::new(
            default_tracking_params(),
            SmoothingParams::default(),
            CoreCallbacks::new(),
        );
        core.active_zones().install(ZoneStore {
            version: 1,
            updated_at: 0,
            zones: vec![zone("a", 0, 2000)],
        });
        core.handle_detection_frame(&detection_frame(0, &[(1000, 1500)]));

        // Swap under the sensing context's feet.
        core.active_zones().install(ZoneStore {
            version: 2,
            updated_at: 0,
            zones: vec![zone("b", -2000, 0)],
        });
        core.handle_detection_frame(&detection_frame(100, &[(1000, 1500)]));
        // No panic and the new snapshot's geometry is in effect.
        assert_eq!(core.active_zones().snapshot().version, 2);
    }

    #[test]
    fn presence_frames_reach_sink() {
        let seen = Arc::new(Mutex::new(0usize));
        let seen2 = seen.clone();
        let mut callbacks = CoreCallbacks::new();
        callbacks.on_presence_frame = Some(Box::new(move |_| {
            *seen2.lock() += 1;
        }));
        let core = SenseCore::new(
            default_tracking_params(),
            SmoothingParams::default(),
            callbacks,
        );
        core.handle_presence_frame(&PresenceFrame::default());
        assert_eq!(*seen.lock(), 1);
        assert_eq!(core.stats().frames(RadarKind::Ld2410), 1);
    }
}
