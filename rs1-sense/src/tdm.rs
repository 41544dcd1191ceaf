//! Time-division power gating of the two radars (Pro hardware).
//!
//! Both modules transmit at 24 GHz; running them together corrupts both
//! streams. The controller alternates their power rails: phase A powers
//! the tracking radar, phase B the presence radar, with the off-going rail
//! dropped before the on-coming one rises so at most one radar is ever
//! powered. The driver consults [`TdmHandle::is_live`] to drop-and-count
//! frames that straggle in during a radar's off phase.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tracing::debug;

use rs1_types::{RadarKind, TdmParams};

/// The two power-gate lines. Firmware maps these to GPIOs.
pub trait PowerGate: Send {
    fn set_power(&mut self, radar: RadarKind, on: bool);
}

const LIVE_NONE: u8 = 0;
const LIVE_LD2410: u8 = 1;
const LIVE_LD2450: u8 = 2;

/// Lock-free view of which radar is currently powered.
///
/// Cloned into each radar driver; read on every frame.
#[derive(Clone)]
pub struct TdmHandle {
    live: Arc<AtomicU8>,
    /// False on non-Pro hardware: both radars always live.
    gated: bool,
}

impl TdmHandle {
    /// Handle for single-radar (non-Pro) builds: everything is live.
    pub fn ungated() -> Self {
        TdmHandle {
            live: Arc::new(AtomicU8::new(LIVE_NONE)),
            gated: false,
        }
    }

    pub fn is_live(&self, radar: RadarKind) -> bool {
        if !self.gated {
            return true;
        }
        let live = self.live.load(Ordering::Relaxed);
        match radar {
            RadarKind::Ld2410 => live == LIVE_LD2410,
            RadarKind::Ld2450 => live == LIVE_LD2450,
        }
    }
}

/// Alternating phase controller, driven as a scheduler task.
pub struct TdmController {
    params: TdmParams,
    gate: Box<dyn PowerGate>,
    live: Arc<AtomicU8>,
    phase_started_ms: u32,
    current: RadarKind,
    switches: u32,
}

impl TdmController {
    /// Powers up phase A (tracking radar) immediately.
    pub fn new(params: TdmParams, mut gate: Box<dyn PowerGate>, now_ms: u32) -> Self {
        gate.set_power(RadarKind::Ld2410, false);
        gate.set_power(RadarKind::Ld2450, true);
        let live = Arc::new(AtomicU8::new(LIVE_LD2450));
        TdmController {
            params,
            gate,
            live,
            phase_started_ms: now_ms,
            current: RadarKind::Ld2450,
            switches: 0,
        }
    }

    pub fn handle(&self) -> TdmHandle {
        TdmHandle {
            live: self.live.clone(),
            gated: true,
        }
    }

    /// Effective per-radar frame budget within one phase, ms.
    pub fn usable_phase_ms(&self) -> u32 {
        self.params.phase_ms.saturating_sub(self.params.settle_ms)
    }

    pub fn switches(&self) -> u32 {
        self.switches
    }

    pub fn current(&self) -> RadarKind {
        self.current
    }

    /// Switch phases when the current one has run its length.
    pub fn tick(&mut self, now_ms: u32) {
        if now_ms.wrapping_sub(self.phase_started_ms) < self.params.phase_ms {
            return;
        }
        let next = match self.current {
            RadarKind::Ld2450 => RadarKind::Ld2410,
            RadarKind::Ld2410 => RadarKind::Ld2450,
        };
        // Off before on: the live flag passes through "none" so a reader
        // never observes both radars live.
        self.live.store(LIVE_NONE, Ordering::Relaxed);
        self.gate.set_power(self.current, false);
        self.gate.set_power(next, true);
        self.live.store(
            match next {
                RadarKind::Ld2410 => LIVE_LD2410,
                RadarKind::Ld2450 => LIVE_LD2450,
            },
            Ordering::Relaxed,
        );
        debug!(from = %self.current, to = %next, "tdm phase switch");
        self.current = next;
        self.phase_started_ms = now_ms;
        self.switches += 1;
    }
}
