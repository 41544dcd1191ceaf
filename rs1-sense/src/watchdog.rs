//! Multi-source software watchdog gating a hardware reset timer.
//!
//! Sources register by name and must feed between consecutive `check()`
//! calls. The hardware timer is kicked only when every armed source has
//! fed; a disarmed source (lost radar feed) is exempt so a dead sensor
//! degrades service instead of causing a reboot loop.

use tracing::{info, warn};

use crate::error::{Error, Result};

pub const MAX_WATCHDOG_SOURCES: usize = 8;

/// Handle identifying one registered source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceId(u8);

/// The actual hardware timer, kicked by a successful `check()`.
///
/// Firmware supplies the register write; tests supply a counter.
pub trait HardwareTimer: Send {
    fn reset(&mut self);
}

#[derive(Debug, Clone, Copy)]
struct Source {
    name: &'static str,
    armed: bool,
    fed: bool,
    last_feed_ms: u32,
}

pub struct Watchdog {
    sources: [Option<Source>; MAX_WATCHDOG_SOURCES],
    hw: Box<dyn HardwareTimer>,
    /// Number of checks that withheld the hardware kick.
    starved_checks: u32,
    /// Number of successful hardware kicks.
    kicks: u32,
}

impl Watchdog {
    pub fn new(hw: Box<dyn HardwareTimer>) -> Self {
        Watchdog {
            sources: [None; MAX_WATCHDOG_SOURCES],
            hw,
            starved_checks: 0,
            kicks: 0,
        }
    }

    pub fn register(&mut self, name: &'static str) -> Result<SourceId> {
        let free = self
            .sources
            .iter()
            .position(|s| s.is_none())
            .ok_or(Error::WatchdogCapacity)?;
        self.sources[free] = Some(Source {
            name,
            armed: true,
            fed: false,
            last_feed_ms: 0,
        });
        info!(source = name, id = free, "watchdog source registered");
        Ok(SourceId(free as u8))
    }

    pub fn feed(&mut self, id: SourceId, now_ms: u32) {
        if let Some(src) = self.sources[id.0 as usize].as_mut() {
            src.fed = true;
            src.last_feed_ms = now_ms;
        }
    }

    /// Stop expecting feeds from this source (e.g. radar disconnected).
    pub fn disarm(&mut self, id: SourceId) {
        if let Some(src) = self.sources[id.0 as usize].as_mut() {
            if src.armed {
                info!(source = src.name, "watchdog source disarmed");
            }
            src.armed = false;
        }
    }

    /// Resume expecting feeds. The source starts satisfied so a reconnect
    /// cannot instantly starve the next check.
    pub fn rearm(&mut self, id: SourceId, now_ms: u32) {
        if let Some(src) = self.sources[id.0 as usize].as_mut() {
            if !src.armed {
                info!(source = src.name, "watchdog source rearmed");
            }
            src.armed = true;
            src.fed = true;
            src.last_feed_ms = now_ms;
        }
    }

    /// Verify every armed source fed since the last check; kick the
    /// hardware timer if so. Returns whether the kick happened.
    pub fn check(&mut self, now_ms: u32) -> bool {
        let mut all_fed = true;
        for src in self.sources.iter().flatten() {
            if src.armed && !src.fed {
                warn!(
                    source = src.name,
                    last_feed_ms = src.last_feed_ms,
                    now_ms,
                    "watchdog source has not fed"
                );
                all_fed = false;
            }
        }
        if all_fed {
            self.hw.reset();
            self.kicks += 1;
        } else {
            self.starved_checks += 1;
        }
        for src in self.sources.iter_mut().flatten() {
            src.fed = false;
        }
        all_fed
    }

    pub fn starved_checks(&self) -> u32 {
        self.starved_checks
    }

    pub fn kicks(&self) -> u32 {
        self.kicks
    }
}
