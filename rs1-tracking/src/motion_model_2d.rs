//! Constant velocity 2D motion model parameterized by `dt`.

use nalgebra::core::dimension::U4;
use nalgebra::OMatrix;

use adskalman::TransitionModelLinearNoControl;

use rs1_types::MyFloat;

/// Generator for [`MotionModel2DFixedDt`] instances.
///
/// Call `calc_for_dt()` with the measured frame interval to get the model
/// for one prediction step. The state vector is `[x y vx vy]`.
///
/// Position and velocity process noise are tuned independently; `Q` is
/// diagonal, so position and velocity uncertainty grow without cross
/// coupling (the coupling between them enters only through `F P Fᵀ`).
#[derive(Debug, Clone)]
pub struct ConstantVelocity2DModel {
    /// Position noise spectral density, mm²/s.
    position_noise: MyFloat,
    /// Velocity noise spectral density, mm²/s³.
    velocity_noise: MyFloat,
}

impl ConstantVelocity2DModel {
    pub fn new(position_noise: MyFloat, velocity_noise: MyFloat) -> Self {
        Self {
            position_noise,
            velocity_noise,
        }
    }

    /// For a given `dt` in seconds, create a new instance of the motion model.
    pub fn calc_for_dt(&self, dt: MyFloat) -> MotionModel2DFixedDt {
        // Transition model for 2D position and 2D velocity.
        // This is "F" in most Kalman filter descriptions.
        #[rustfmt::skip]
        let transition_model = OMatrix::<MyFloat, U4, U4>::new(
            1.0, 0.0,  dt, 0.0,
            0.0, 1.0, 0.0,  dt,
            0.0, 0.0, 1.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        );
        let transition_model_transpose = transition_model.transpose();

        // This is "Q" in most Kalman filter descriptions: diagonal, with
        // per-axis position and velocity noise accumulated over `dt`.
        let q_pos = self.position_noise * dt;
        let q_vel = self.velocity_noise * dt;
        #[rustfmt::skip]
        let transition_noise_covariance = OMatrix::<MyFloat, U4, U4>::new(
            q_pos,   0.0,   0.0,   0.0,
              0.0, q_pos,   0.0,   0.0,
              0.0,   0.0, q_vel,   0.0,
              0.0,   0.0,   0.0, q_vel,
        );

        MotionModel2DFixedDt {
            transition_model,
            transition_model_transpose,
            transition_noise_covariance,
        }
    }
}

/// Constant velocity 2D motion model for a fixed `dt`.
#[derive(Debug, Clone)]
pub struct MotionModel2DFixedDt {
    transition_model: OMatrix<MyFloat, U4, U4>,
    transition_model_transpose: OMatrix<MyFloat, U4, U4>,
    transition_noise_covariance: OMatrix<MyFloat, U4, U4>,
}

impl TransitionModelLinearNoControl<MyFloat, U4> for MotionModel2DFixedDt {
    fn F(&self) -> &OMatrix<MyFloat, U4, U4> {
        &self.transition_model
    }
    fn FT(&self) -> &OMatrix<MyFloat, U4, U4> {
        &self.transition_model_transpose
    }
    fn Q(&self) -> &OMatrix<MyFloat, U4, U4> {
        &self.transition_noise_covariance
    }
}
