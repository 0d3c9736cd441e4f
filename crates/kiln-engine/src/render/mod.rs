//! Per-frame rendering.
//!
//! `FrameRenderer` consumes the resource layer (program, texture, vertex
//! array) and records one depth-tested, indexed draw per frame via wgpu.
//!
//! Convention:
//! - Clip space follows wgpu: depth in `[0, 1]`, cleared to 1.0, `Less` passes.
//! - Texture row 0 is the bottom of the image, matching `v = 0`.

mod ctx;
mod frame;

pub use ctx::{RenderCtx, RenderTarget};
pub use frame::{FrameRenderer, FrameScene, RenderConfig, DEPTH_FORMAT};
