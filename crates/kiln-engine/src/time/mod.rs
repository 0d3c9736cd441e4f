//! Frame timing.
//!
//! One `FrameClock` per window; `tick()` once per presented frame yields the
//! `dt` that camera movement is scaled by.

mod frame_clock;

pub use frame_clock::{FrameClock, FrameTime};
