//! Kiln engine crate.
//!
//! A retained-mode renderer over wgpu: GPU resource wrappers with explicit
//! binding discipline (`resource`), a free-flying camera (`camera`) and the
//! per-frame draw (`render`), plus the winit runtime that hosts them.

pub mod camera;
pub mod core;
pub mod device;
pub mod input;
pub mod logging;
pub mod render;
pub mod resource;
pub mod time;
pub mod window;
