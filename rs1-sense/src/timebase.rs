//! Monotonic timebase, optional wall clock and frame-interval health.

use std::time::Instant;

use parking_lot::Mutex;

/// Monotonic clocks since boot plus an optional NTP-fed wall clock.
///
/// Construct once at init and share via `Arc`. The wall clock stays unset
/// until a time-sync collaborator calls [`Timebase::set_wall_clock`].
pub struct Timebase {
    boot: Instant,
    /// Unix ms corresponding to `boot`, once known.
    wall_offset_ms: Mutex<Option<u64>>,
}

impl Timebase {
    pub fn new() -> Self {
        Timebase {
            boot: Instant::now(),
            wall_offset_ms: Mutex::new(None),
        }
    }

    /// Milliseconds since boot. Wraps after ~49 days, as the frame
    /// timestamps do; all consumers use wrapping subtraction.
    pub fn monotonic_ms(&self) -> u32 {
        self.boot.elapsed().as_millis() as u32
    }

    /// Microseconds since boot.
    pub fn monotonic_us(&self) -> u64 {
        self.boot.elapsed().as_micros() as u64
    }

    /// Record the current wall-clock time (unix ms), e.g. after NTP sync.
    pub fn set_wall_clock(&self, unix_ms: u64) {
        let now = self.boot.elapsed().as_millis() as u64;
        *self.wall_offset_ms.lock() = Some(unix_ms.saturating_sub(now));
    }

    /// Current wall-clock unix ms, if a sync has happened.
    pub fn wall_clock_ms(&self) -> Option<u64> {
        let offset = (*self.wall_offset_ms.lock())?;
        Some(offset + self.boot.elapsed().as_millis() as u64)
    }

    /// Wall-clock unix seconds, for record timestamps. Falls back to
    /// monotonic seconds when no sync has happened yet.
    pub fn stamp_s(&self) -> u32 {
        match self.wall_clock_ms() {
            Some(ms) => (ms / 1000) as u32,
            None => self.monotonic_ms() / 1000,
        }
    }
}

impl Default for Timebase {
    fn default() -> Self {
        Timebase::new()
    }
}

/// Snapshot of one radar stream's frame-interval health.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameIntervalStats {
    pub expected_interval_ms: u32,
    pub last_interval_ms: u32,
    /// Exponential moving average of |interval - expected|.
    pub jitter_ms: f32,
    /// Estimated frames lost to oversized gaps.
    pub missed_frames: u32,
    pub frames_seen: u32,
}

/// Tracks frame arrival intervals against an expected cadence.
#[derive(Debug, Clone)]
pub struct FrameIntervalTracker {
    expected_interval_ms: u32,
    last_arrival_ms: Option<u32>,
    stats: FrameIntervalStats,
}

impl FrameIntervalTracker {
    pub fn new(expected_interval_ms: u32) -> Self {
        FrameIntervalTracker {
            expected_interval_ms,
            last_arrival_ms: None,
            stats: FrameIntervalStats {
                expected_interval_ms,
                ..FrameIntervalStats::default()
            },
        }
    }

    pub fn record_frame(&mut self, now_ms: u32) {
        self.stats.frames_seen = self.stats.frames_seen.wrapping_add(1);
        if let Some(last) = self.last_arrival_ms {
            let interval = now_ms.wrapping_sub(last);
            self.stats.last_interval_ms = interval;
            let deviation = interval.abs_diff(self.expected_interval_ms) as f32;
            self.stats.jitter_ms = 0.9 * self.stats.jitter_ms + 0.1 * deviation;
            if interval > self.expected_interval_ms {
                let missed = interval / self.expected_interval_ms - 1;
                self.stats.missed_frames = self.stats.missed_frames.wrapping_add(missed);
            }
        }
        self.last_arrival_ms = Some(now_ms);
    }

    pub fn stats(&self) -> FrameIntervalStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wall_clock_unset_until_sync() {
        let tb = Timebase::new();
        assert!(tb.wall_clock_ms().is_none());
        tb.set_wall_clock(1_700_000_000_000);
        let wall = tb.wall_clock_ms().unwrap();
        assert!(wall >= 1_700_000_000_000);
    }

    #[test]
    fn missed_frames_estimated_from_gap() {
        let mut t = FrameIntervalTracker::new(100);
        t.record_frame(0);
        t.record_frame(100);
        assert_eq!(t.stats().missed_frames, 0);
        // A 450 ms gap at 100 ms cadence: floor(450/100) - 1 = 3 missed.
        t.record_frame(550);
        assert_eq!(t.stats().missed_frames, 3);
        assert_eq!(t.stats().last_interval_ms, 450);
    }

    #[test]
    fn jitter_settles_near_deviation() {
        let mut t = FrameIntervalTracker::new(100);
        t.record_frame(0);
        let mut now = 0;
        for _ in 0..200 {
            now += 110; // constant 10 ms late
            t.record_frame(now);
        }
        let jitter = t.stats().jitter_ms;
        assert!((jitter - 10.0).abs() < 1.0, "jitter {jitter}");
    }
}
