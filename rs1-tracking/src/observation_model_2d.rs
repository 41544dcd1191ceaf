//! Position-only observation model.

use nalgebra::core::dimension::{U2, U4};
use nalgebra::{OMatrix, OVector};

use adskalman::ObservationModel;

use rs1_types::MyFloat;

/// Observes `(x, y)` directly out of the `[x y vx vy]` state.
///
/// `H = [I₂ 0]`; the measurement noise is diagonal with independently
/// tunable per-axis standard deviations.
#[derive(Debug, Clone)]
pub struct PositionObservationModel {
    observation_matrix: OMatrix<MyFloat, U2, U4>,
    observation_matrix_transpose: OMatrix<MyFloat, U4, U2>,
    observation_noise_covariance: OMatrix<MyFloat, U2, U2>,
}

impl PositionObservationModel {
    pub fn new(std_x_mm: MyFloat, std_y_mm: MyFloat) -> Self {
        #[rustfmt::skip]
        let observation_matrix = OMatrix::<MyFloat, U2, U4>::new(
            1.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0,
        );
        let observation_matrix_transpose = observation_matrix.transpose();
        #[rustfmt::skip]
        let observation_noise_covariance = OMatrix::<MyFloat, U2, U2>::new(
            std_x_mm * std_x_mm, 0.0,
            0.0, std_y_mm * std_y_mm,
        );
        Self {
            observation_matrix,
            observation_matrix_transpose,
            observation_noise_covariance,
        }
    }
}

impl ObservationModel<MyFloat, U4, U2> for PositionObservationModel {
    fn H(&self) -> &OMatrix<MyFloat, U2, U4> {
        &self.observation_matrix
    }
    fn HT(&self) -> &OMatrix<MyFloat, U4, U2> {
        &self.observation_matrix_transpose
    }
    fn R(&self) -> &OMatrix<MyFloat, U2, U2> {
        &self.observation_noise_covariance
    }
    fn predict_observation(&self, state: &OVector<MyFloat, U4>) -> OVector<MyFloat, U2> {
        self.observation_matrix * state
    }
}
