//! Core engine-facing contracts.
//!
//! The interface between the runtime (platform loop) and the application:
//! the [`App`] callbacks and the per-frame context they receive.

mod app;
mod ctx;

pub use app::{App, AppControl};
pub use ctx::{FrameCtx, WindowCtx};
