//! RS-1 sensing pipeline.
//!
//! Frames decoded by `rs1-radar-comms` flow through here synchronously on
//! the sensing context: tracking, zone evaluation, presence smoothing, then
//! sink dispatch through the registered callbacks. The housekeeping side
//! (scheduler, watchdog, TDM phase switching) lives in this crate too but
//! runs from the other execution context; the only state shared between the
//! two is the active zone snapshot, the TDM live flag and the relaxed stats
//! counters.
//!
//! Nothing on the per-frame path allocates: the track pool, zone scratch
//! and smoothing state are all fixed capacity.

use tracing::{debug, info};

mod callbacks;
mod driver;
mod error;
mod housekeeping;
mod pipeline;
mod scheduler;
mod smoothing;
mod snapshot;
mod stats;
mod tdm;
mod timebase;
mod tracker;
mod watchdog;
mod zones;

pub use callbacks::CoreCallbacks;
pub use driver::{
    run_ld2410_driver, run_ld2450_driver, ConnectionMonitor, RadarDriverConfig, WatchdogFeed,
};
pub use error::{Error, Result};
pub use housekeeping::{
    register_commit_telemetry_task, register_tdm_task, register_watchdog_task,
    COMMIT_TELEMETRY_INTERVAL_MS, WATCHDOG_CHECK_INTERVAL_MS,
};
pub use pipeline::{SenseCore, SensePipeline};
pub use scheduler::{Scheduler, TaskEntry, MAX_TASKS};
pub use smoothing::{PresenceSmoother, ZoneChange};
pub use snapshot::ActiveZones;
pub use stats::CoreStats;
pub use tdm::{PowerGate, TdmController, TdmHandle};
pub use timebase::{FrameIntervalStats, FrameIntervalTracker, Timebase};
pub use tracker::{Tracker, MAX_TRACKS};
pub use watchdog::{HardwareTimer, SourceId, Watchdog, MAX_WATCHDOG_SOURCES};
pub use zones::evaluate_zones;

/// Log the one-line boot banner with the compiled-in capacities.
pub fn log_build_info() {
    info!(
        max_tracks = tracker::MAX_TRACKS,
        max_zones = rs1_types::MAX_ZONES,
        max_tasks = scheduler::MAX_TASKS,
        "rs1-sense initialized"
    );
    debug!(version = env!("CARGO_PKG_VERSION"), "build");
}
