//! Constant-velocity Kalman models for RS-1 target tracking.
//!
//! The state vector is `[x y vx vy]` in mm and mm/s on the radar's ground
//! plane. Models are concrete over [`rs1_types::MyFloat`]; the tracker
//! rebuilds the fixed-dt motion model each frame from the measured frame
//! interval.

pub mod motion_model_2d;
pub mod observation_model_2d;

pub use motion_model_2d::{ConstantVelocity2DModel, MotionModel2DFixedDt};
pub use observation_model_2d::PositionObservationModel;
