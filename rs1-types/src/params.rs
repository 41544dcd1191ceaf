//! Tunable parameter sets for the sensing pipeline.
//!
//! All defaults live here as free functions so that serde deserialization of
//! a partial record and programmatic construction agree on the same values.

use serde::{Deserialize, Serialize};

use crate::MyFloat;

/// Kalman filter and data association parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingParams {
    /// Position process noise spectral density, mm²/s. Diagonal `Q` entry
    /// for the x/y components, accumulated over the frame interval.
    pub process_noise_pos: MyFloat,
    /// Velocity process noise spectral density, mm²/s³. Diagonal `Q` entry
    /// for the vx/vy components.
    pub process_noise_vel: MyFloat,
    /// Measurement noise standard deviation, x axis, mm.
    pub observation_std_x_mm: MyFloat,
    /// Measurement noise standard deviation, y axis, mm.
    pub observation_std_y_mm: MyFloat,
    /// Initial position standard deviation for a spawned track, mm.
    pub initial_position_std_mm: MyFloat,
    /// Initial velocity standard deviation for a spawned track, mm/s.
    pub initial_vel_std_mm_s: MyFloat,
    /// Association gate at the nominal frame interval, mm.
    pub gate_base_mm: MyFloat,
    /// Assumed worst-case target speed for gate growth, mm/s.
    pub gate_max_speed_mm_s: MyFloat,
    /// Prediction interval clamp, seconds.
    pub dt_min_s: MyFloat,
    pub dt_max_s: MyFloat,
    /// Consecutive hits before a tentative track is confirmed.
    #[serde(default = "default_n_confirm")]
    pub n_confirm: u16,
    /// Consecutive misses before a confirmed track retires.
    #[serde(default = "default_m_drop")]
    pub m_drop: u16,
    /// Occlusion budget in frames; retirement on whichever bound hits first.
    #[serde(default = "default_occlusion_timeout_frames")]
    pub occlusion_timeout_frames: u16,
    /// Covariance diagonal floor that counts as singular.
    pub covariance_epsilon: MyFloat,
}

fn default_n_confirm() -> u16 {
    2
}

fn default_m_drop() -> u16 {
    5
}

fn default_occlusion_timeout_frames() -> u16 {
    // At the 10 Hz TDM cadence this bridges a two second occlusion.
    20
}

pub fn default_tracking_params() -> TrackingParams {
    TrackingParams {
        process_noise_pos: 10.0,
        process_noise_vel: 2500.0,
        observation_std_x_mm: 80.0,
        observation_std_y_mm: 80.0,
        initial_position_std_mm: 200.0,
        initial_vel_std_mm_s: 1000.0,
        gate_base_mm: 600.0,
        gate_max_speed_mm_s: 2000.0,
        dt_min_s: 0.01,
        dt_max_s: 0.5,
        n_confirm: default_n_confirm(),
        m_drop: default_m_drop(),
        occlusion_timeout_frames: default_occlusion_timeout_frames(),
        covariance_epsilon: 1e-6,
    }
}

impl Default for TrackingParams {
    fn default() -> Self {
        default_tracking_params()
    }
}

/// Plausibility bounds applied to raw detections before tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetFilterParams {
    pub min_range_mm: i16,
    pub max_range_mm: i16,
    pub max_abs_x_mm: i16,
    pub max_speed_cm_s: i16,
}

pub fn default_target_filter_params() -> TargetFilterParams {
    TargetFilterParams {
        min_range_mm: 0,
        max_range_mm: 6000,
        max_abs_x_mm: 6000,
        max_speed_cm_s: 600,
    }
}

impl Default for TargetFilterParams {
    fn default() -> Self {
        default_target_filter_params()
    }
}

/// Presence smoothing (hysteresis/hold) parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmoothingParams {
    /// Minimum spacing between published change events, ms.
    #[serde(default = "default_publish_throttle_ms")]
    pub publish_throttle_ms: u32,
}

fn default_publish_throttle_ms() -> u32 {
    100
}

pub fn default_smoothing_params() -> SmoothingParams {
    SmoothingParams {
        publish_throttle_ms: default_publish_throttle_ms(),
    }
}

impl Default for SmoothingParams {
    fn default() -> Self {
        default_smoothing_params()
    }
}

impl SmoothingParams {
    /// The single sensitivity→hold mapping used by the smoothing layer.
    ///
    /// Sensitivity 0 holds 5 s, 100 releases immediately; the default of 50
    /// holds 2.5 s.
    pub fn hold_ms_for_sensitivity(sensitivity: u8) -> u32 {
        (100u32.saturating_sub(sensitivity as u32)) * 50
    }
}

/// Radar time-division multiplexing parameters (Pro hardware).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TdmParams {
    /// Length of one power phase, ms.
    pub phase_ms: u32,
    /// Startup settle subtracted from usable frame time after a switch, ms.
    pub settle_ms: u32,
}

pub fn default_tdm_params() -> TdmParams {
    TdmParams {
        phase_ms: 50,
        settle_ms: 20,
    }
}

impl Default for TdmParams {
    fn default() -> Self {
        default_tdm_params()
    }
}

/// Watchdog feed deadline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchdogParams {
    pub timeout_ms: u32,
}

impl Default for WatchdogParams {
    fn default() -> Self {
        WatchdogParams { timeout_ms: 5000 }
    }
}

/// Serial liveness bound.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisconnectParams {
    pub disconnect_timeout_ms: u32,
}

impl Default for DisconnectParams {
    fn default() -> Self {
        DisconnectParams {
            disconnect_timeout_ms: 3000,
        }
    }
}
