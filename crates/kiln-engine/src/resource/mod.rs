//! GPU resource wrappers.
//!
//! Every wrapper owns one GPU object identified by a [`GpuHandle`]. Binding a
//! wrapper records it as current in a [`BindState`] and returns a token;
//! operations that depend on the binding take the token and fail once it has
//! been superseded.

mod binding;
mod buffer;
mod error;
mod handle;
pub mod shader;
pub mod texture;
mod vertex_array;

pub use binding::{BindCategory, BindState, MAX_TEXTURE_UNITS};
pub use buffer::{BoundBuffer, BufferObject, BufferTarget};
pub use error::{Error, Result, ShaderStage, INFO_LOG_CAPACITY};
pub use handle::GpuHandle;
pub use shader::{ActiveProgram, ShaderProgram, UniformLocation};
pub use texture::{PixelFormat, Texture, TextureImage, TextureKind};
pub use vertex_array::{
    BoundVertexArray, ComponentType, NumericKind, VertexArray, VertexInput, VertexLayoutSlot,
    MAX_VERTEX_ATTRIBUTES,
};

pub(crate) use shader::SampledBinding;
pub(crate) use vertex_array::{IndexStream, VertexStream};
