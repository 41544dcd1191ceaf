//! Relaxed-atomic counters exposed to telemetry and the scheduler.
//!
//! Writers are on the sensing context; readers (stats getters, periodic
//! reporting tasks) may observe slightly stale values, which is fine for
//! monitoring.

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use rs1_types::{ConnectionState, RadarKind};

#[derive(Debug, Default)]
pub struct CoreStats {
    ld2450_frames: AtomicU32,
    ld2450_invalid: AtomicU32,
    ld2410_frames: AtomicU32,
    ld2410_invalid: AtomicU32,
    dropped_off_phase: AtomicU32,
    tracks_confirmed: AtomicU32,
    divergence_resets: AtomicU32,
    watchdog_starved: AtomicU32,
    nvs_commits: AtomicU32,
    // 0 = disconnected, 1 = connected.
    ld2450_connected: AtomicU8,
    ld2410_connected: AtomicU8,
}

impl CoreStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count_frame(&self, radar: RadarKind) {
        match radar {
            RadarKind::Ld2450 => &self.ld2450_frames,
            RadarKind::Ld2410 => &self.ld2410_frames,
        }
        .fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_invalid_frames(&self, radar: RadarKind, count: u32) {
        match radar {
            RadarKind::Ld2450 => &self.ld2450_invalid,
            RadarKind::Ld2410 => &self.ld2410_invalid,
        }
        .store(count, Ordering::Relaxed);
    }

    pub fn count_dropped_off_phase(&self) {
        self.dropped_off_phase.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_tracks_confirmed(&self, count: u32) {
        self.tracks_confirmed.store(count, Ordering::Relaxed);
    }

    pub fn set_divergence_resets(&self, count: u32) {
        self.divergence_resets.store(count, Ordering::Relaxed);
    }

    pub fn set_watchdog_starved(&self, count: u32) {
        self.watchdog_starved.store(count, Ordering::Relaxed);
    }

    pub fn set_nvs_commits(&self, count: u32) {
        self.nvs_commits.store(count, Ordering::Relaxed);
    }

    pub fn set_connection(&self, radar: RadarKind, state: ConnectionState) {
        let value = match state {
            ConnectionState::Connected => 1,
            ConnectionState::Disconnected => 0,
        };
        match radar {
            RadarKind::Ld2450 => &self.ld2450_connected,
            RadarKind::Ld2410 => &self.ld2410_connected,
        }
        .store(value, Ordering::Relaxed);
    }

    pub fn frames(&self, radar: RadarKind) -> u32 {
        match radar {
            RadarKind::Ld2450 => &self.ld2450_frames,
            RadarKind::Ld2410 => &self.ld2410_frames,
        }
        .load(Ordering::Relaxed)
    }

    pub fn invalid_frames(&self, radar: RadarKind) -> u32 {
        match radar {
            RadarKind::Ld2450 => &self.ld2450_invalid,
            RadarKind::Ld2410 => &self.ld2410_invalid,
        }
        .load(Ordering::Relaxed)
    }

    pub fn dropped_off_phase(&self) -> u32 {
        self.dropped_off_phase.load(Ordering::Relaxed)
    }

    pub fn tracks_confirmed(&self) -> u32 {
        self.tracks_confirmed.load(Ordering::Relaxed)
    }

    pub fn divergence_resets(&self) -> u32 {
        self.divergence_resets.load(Ordering::Relaxed)
    }

    pub fn watchdog_starved(&self) -> u32 {
        self.watchdog_starved.load(Ordering::Relaxed)
    }

    pub fn nvs_commits(&self) -> u32 {
        self.nvs_commits.load(Ordering::Relaxed)
    }

    pub fn connection(&self, radar: RadarKind) -> ConnectionState {
        let value = match radar {
            RadarKind::Ld2450 => &self.ld2450_connected,
            RadarKind::Ld2410 => &self.ld2410_connected,
        }
        .load(Ordering::Relaxed);
        if value == 1 {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }
}
