//! Standard housekeeping-context task wiring.
//!
//! These helpers register the periodic pieces of the core on the
//! [`Scheduler`] and keep the [`CoreStats`] surface current: the watchdog
//! check (with its starvation counter), the flash commit telemetry and the
//! TDM phase switch. The firmware shell calls these once at init, then
//! drives `scheduler.tick()` from its housekeeping loop.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;
use crate::scheduler::Scheduler;
use crate::stats::CoreStats;
use crate::tdm::TdmController;
use crate::watchdog::Watchdog;

/// Default cadence for the watchdog check task, ms.
pub const WATCHDOG_CHECK_INTERVAL_MS: u32 = 1000;

/// Default cadence for the commit telemetry task, ms.
pub const COMMIT_TELEMETRY_INTERVAL_MS: u32 = 10_000;

/// Register the periodic watchdog check.
///
/// Each run verifies every armed source, kicks the hardware timer when all
/// have fed and mirrors the starvation counter into the stats surface.
pub fn register_watchdog_task(
    scheduler: &mut Scheduler,
    watchdog: Arc<Mutex<Watchdog>>,
    stats: Arc<CoreStats>,
    interval_ms: u32,
) -> Result<()> {
    scheduler.add_task(
        "watchdog",
        interval_ms,
        Box::new(move |now| {
            let mut wd = watchdog.lock();
            wd.check(now);
            stats.set_watchdog_starved(wd.starved_checks());
        }),
    )
}

/// Register flash commit telemetry.
///
/// `commit_count` reads the config store's lifetime commit counter (e.g.
/// `ConfigStore::commit_count`, or `global::with_store` in the singleton
/// arrangement); the task mirrors it into the stats surface.
pub fn register_commit_telemetry_task(
    scheduler: &mut Scheduler,
    stats: Arc<CoreStats>,
    commit_count: impl Fn() -> u32 + Send + 'static,
    interval_ms: u32,
) -> Result<()> {
    scheduler.add_task(
        "nvs_commits",
        interval_ms,
        Box::new(move |_| {
            stats.set_nvs_commits(commit_count());
        }),
    )
}

/// Register the TDM phase switch (Pro hardware).
///
/// The controller moves into the task; drivers keep their [`TdmHandle`]s.
///
/// [`TdmHandle`]: crate::tdm::TdmHandle
pub fn register_tdm_task(
    scheduler: &mut Scheduler,
    mut controller: TdmController,
    interval_ms: u32,
) -> Result<()> {
    scheduler.add_task(
        "tdm",
        interval_ms,
        Box::new(move |now| {
            controller.tick(now);
        }),
    )
}
