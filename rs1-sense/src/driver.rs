//! Async serial drivers: one task per radar on the sensing context.
//!
//! Each driver opens its port, (for the LD2410) switches the module into
//! engineering output, then drains decoded frames from the codec, stamping
//! timestamps, applying the plausibility filter, tracking liveness and
//! feeding the watchdog before handing the frame to the pipeline.
//!
//! Connection loss is inferred from frame silence, not from I/O errors:
//! the parser keeps resynchronising and the state callback fires exactly
//! once per transition.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;
use tokio_serial::SerialPortBuilderExt;
use tokio_util::codec::Decoder;
use tracing::{info, warn};

use rs1_radar_comms::{ld2410, Ld2410Codec, Ld2450Codec, TargetFilter, BAUD_RATE};
use rs1_types::{ConnectionState, DisconnectParams, RadarKind};

use crate::error::{Error, Result};
use crate::pipeline::SensePipeline;
use crate::stats::CoreStats;
use crate::tdm::TdmHandle;
use crate::timebase::Timebase;
use crate::watchdog::{SourceId, Watchdog};

/// How long one poll waits for bytes before checking liveness.
const RX_POLL_MS: u64 = 250;

#[derive(Debug, Clone)]
pub struct RadarDriverConfig {
    pub port: String,
    pub disconnect: DisconnectParams,
}

/// Frame-silence liveness tracker. Pure; the driver feeds it timestamps.
#[derive(Debug, Clone)]
pub struct ConnectionMonitor {
    timeout_ms: u32,
    state: ConnectionState,
    last_frame_ms: Option<u32>,
}

impl ConnectionMonitor {
    pub fn new(timeout_ms: u32) -> Self {
        ConnectionMonitor {
            timeout_ms,
            state: ConnectionState::Disconnected,
            last_frame_ms: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Note a decoded frame. Returns the new state on a transition.
    pub fn record_frame(&mut self, now_ms: u32) -> Option<ConnectionState> {
        self.last_frame_ms = Some(now_ms);
        if self.state == ConnectionState::Disconnected {
            self.state = ConnectionState::Connected;
            Some(ConnectionState::Connected)
        } else {
            None
        }
    }

    /// Check for frame silence. Returns the new state on a transition.
    pub fn poll(&mut self, now_ms: u32) -> Option<ConnectionState> {
        if self.state == ConnectionState::Connected {
            let last = self.last_frame_ms.unwrap_or(0);
            if now_ms.wrapping_sub(last) >= self.timeout_ms {
                self.state = ConnectionState::Disconnected;
                return Some(ConnectionState::Disconnected);
            }
        }
        None
    }
}

/// Watchdog attachment for one radar driver.
pub type WatchdogFeed = (Arc<Mutex<Watchdog>>, SourceId);

struct DriverShared {
    pipeline: Arc<Mutex<SensePipeline>>,
    timebase: Arc<Timebase>,
    stats: Arc<CoreStats>,
    tdm: TdmHandle,
    watchdog: Option<WatchdogFeed>,
    monitor: ConnectionMonitor,
    radar: RadarKind,
}

impl DriverShared {
    /// Liveness + watchdog bookkeeping common to both radars. Returns
    /// whether the frame should flow on to the pipeline (TDM off-phase
    /// frames are counted and dropped).
    fn on_frame(&mut self, now_ms: u32) -> bool {
        if let Some(transition) = self.monitor.record_frame(now_ms) {
            self.apply_transition(transition, now_ms);
        }
        if let Some((wd, id)) = &self.watchdog {
            wd.lock().feed(*id, now_ms);
        }
        if !self.tdm.is_live(self.radar) {
            self.stats.count_dropped_off_phase();
            return false;
        }
        true
    }

    fn poll_liveness(&mut self, now_ms: u32) {
        if let Some(transition) = self.monitor.poll(now_ms) {
            self.apply_transition(transition, now_ms);
        }
    }

    fn apply_transition(&mut self, state: ConnectionState, now_ms: u32) {
        info!(radar = %self.radar, ?state, "radar connection state");
        self.stats.set_connection(self.radar, state);
        if let Some((wd, id)) = &self.watchdog {
            let mut wd = wd.lock();
            match state {
                ConnectionState::Connected => wd.rearm(*id, now_ms),
                ConnectionState::Disconnected => wd.disarm(*id),
            }
        }
        self.pipeline.lock().callbacks().radar_state(self.radar, state);
    }
}

fn open_port(config: &RadarDriverConfig, radar: RadarKind) -> Result<tokio_serial::SerialStream> {
    #[allow(unused_mut)]
    let mut port = tokio_serial::new(&config.port, BAUD_RATE)
        .open_native_async()
        .map_err(|e| Error::DriverInstall {
            radar,
            reason: e.to_string(),
        })?;
    #[cfg(unix)]
    port.set_exclusive(false)
        .map_err(|e| Error::DriverInstall {
            radar,
            reason: e.to_string(),
        })?;
    info!(radar = %radar, port = %config.port, "serial port opened");
    Ok(port)
}

/// Run the tracking-radar RX loop until the port closes.
pub async fn run_ld2450_driver(
    config: RadarDriverConfig,
    filter: TargetFilter,
    pipeline: Arc<Mutex<SensePipeline>>,
    timebase: Arc<Timebase>,
    stats: Arc<CoreStats>,
    tdm: TdmHandle,
    watchdog: Option<WatchdogFeed>,
) -> Result<()> {
    let port = open_port(&config, RadarKind::Ld2450)?;
    let mut reader = Ld2450Codec::new().framed(port);

    let mut shared = DriverShared {
        pipeline,
        timebase,
        stats,
        tdm,
        watchdog,
        monitor: ConnectionMonitor::new(config.disconnect.disconnect_timeout_ms),
        radar: RadarKind::Ld2450,
    };

    loop {
        match tokio::time::timeout(Duration::from_millis(RX_POLL_MS), reader.next()).await {
            Ok(Some(Ok(mut frame))) => {
                let now = shared.timebase.monotonic_ms();
                shared
                    .stats
                    .set_invalid_frames(RadarKind::Ld2450, reader.codec().stats().frames_invalid);
                if !shared.on_frame(now) {
                    continue;
                }
                frame.timestamp_ms = now;
                filter.apply(&mut frame);
                shared.pipeline.lock().handle_detection_frame(&frame);
            }
            Ok(Some(Err(e))) => {
                // Transient I/O hiccup: the parser resyncs on its own.
                warn!(error = %e, "LD2450 serial read error");
            }
            Ok(None) => {
                warn!("LD2450 serial stream closed");
                return Ok(());
            }
            Err(_) => {
                let now = shared.timebase.monotonic_ms();
                shared.poll_liveness(now);
            }
        }
    }
}

/// Run the presence-radar RX loop until the port closes.
///
/// Sends the engineering-mode enable sequence first, with settle delays.
pub async fn run_ld2410_driver(
    config: RadarDriverConfig,
    pipeline: Arc<Mutex<SensePipeline>>,
    timebase: Arc<Timebase>,
    stats: Arc<CoreStats>,
    tdm: TdmHandle,
    watchdog: Option<WatchdogFeed>,
) -> Result<()> {
    let mut port = open_port(&config, RadarKind::Ld2410)?;

    for command in [
        ld2410::enable_config_command(),
        ld2410::enable_engineering_command(),
        ld2410::end_config_command(),
    ] {
        port.write_all(&command).await?;
        tokio::time::sleep(Duration::from_millis(ld2410::CONFIG_SETTLE_MS)).await;
    }
    info!("LD2410 engineering mode enabled");

    let mut reader = Ld2410Codec::new().framed(port);

    let mut shared = DriverShared {
        pipeline,
        timebase,
        stats,
        tdm,
        watchdog,
        monitor: ConnectionMonitor::new(config.disconnect.disconnect_timeout_ms),
        radar: RadarKind::Ld2410,
    };

    loop {
        match tokio::time::timeout(Duration::from_millis(RX_POLL_MS), reader.next()).await {
            Ok(Some(Ok(mut frame))) => {
                let now = shared.timebase.monotonic_ms();
                shared
                    .stats
                    .set_invalid_frames(RadarKind::Ld2410, reader.codec().stats().frames_invalid);
                if !shared.on_frame(now) {
                    continue;
                }
                frame.timestamp_ms = now;
                shared.pipeline.lock().handle_presence_frame(&frame);
            }
            Ok(Some(Err(e))) => {
                warn!(error = %e, "LD2410 serial read error");
            }
            Ok(None) => {
                warn!("LD2410 serial stream closed");
                return Ok(());
            }
            Err(_) => {
                let now = shared.timebase.monotonic_ms();
                shared.poll_liveness(now);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monitor_transitions_exactly_once_per_edge() {
        let mut m = ConnectionMonitor::new(3000);
        assert_eq!(m.state(), ConnectionState::Disconnected);

        assert_eq!(m.record_frame(100), Some(ConnectionState::Connected));
        assert_eq!(m.record_frame(200), None);
        assert_eq!(m.poll(1000), None);

        // Silence past the timeout: one Disconnected transition.
        assert_eq!(m.poll(3200), Some(ConnectionState::Disconnected));
        assert_eq!(m.poll(4000), None);

        // Frames resume: one Connected transition.
        assert_eq!(m.record_frame(5000), Some(ConnectionState::Connected));
        assert_eq!(m.record_frame(5100), None);
    }

    #[test]
    fn monitor_tolerates_frames_within_timeout() {
        let mut m = ConnectionMonitor::new(3000);
        m.record_frame(0);
        for now in (100..10_000).step_by(100) {
            assert_eq!(m.record_frame(now), None);
            assert_eq!(m.poll(now + 50), None);
        }
    }
}
