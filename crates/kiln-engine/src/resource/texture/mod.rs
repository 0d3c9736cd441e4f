//! Image textures: decoding, mip generation and upload.

mod object;
mod pixels;

pub use object::{BoundTexture, Texture, TextureKind};
pub use pixels::{mip_level_count, PixelFormat, TextureImage};
