//! Perspective camera driven by keyboard and pointer input.

mod controller;
mod view;

pub use controller::CameraController;
pub use view::{
    Camera, CameraInput, LookDelta, Projection, BOOST_FACTOR, DEFAULT_SENSITIVITY, DEFAULT_SPEED,
    MAX_PITCH_DEGREES,
};
