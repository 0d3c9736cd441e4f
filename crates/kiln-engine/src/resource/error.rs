use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use super::binding::BindCategory;
use super::handle::GpuHandle;

/// Upper bound on diagnostic text kept from the shader compiler, in bytes.
pub const INFO_LOG_CAPACITY: usize = 1024;

/// Programmable pipeline stage a diagnostic originates from.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    /// Tag used in compile diagnostics (`"VERTEX"` / `"FRAGMENT"`).
    pub const fn tag(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "VERTEX",
            ShaderStage::Fragment => "FRAGMENT",
        }
    }

    pub(crate) fn to_naga(self) -> naga::ShaderStage {
        match self {
            ShaderStage::Vertex => naga::ShaderStage::Vertex,
            ShaderStage::Fragment => naga::ShaderStage::Fragment,
        }
    }

    pub(crate) fn visibility(self) -> wgpu::ShaderStages {
        match self {
            ShaderStage::Vertex => wgpu::ShaderStages::VERTEX,
            ShaderStage::Fragment => wgpu::ShaderStages::FRAGMENT,
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Errors raised by the GPU resource layer and the camera.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid numeric parameters (projection range, viewport, layout, unit index).
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The device refused or cannot hold the requested object.
    #[error("failed to create {what}: {reason}")]
    ResourceCreation { what: &'static str, reason: String },

    /// One shader stage failed to parse or validate.
    #[error("shader compilation failed for {stage}:\n{log}")]
    Compilation { stage: ShaderStage, log: String },

    /// Both stages compiled but do not form a valid program.
    #[error("shader linking failed for PROGRAM:\n{log}")]
    Link { log: String },

    /// A shader source or image file is missing or unreadable.
    #[error("failed to load asset '{}': {reason}", path.display())]
    AssetLoad { path: PathBuf, reason: String },

    /// The wrapper was deleted; its handle no longer refers to a GPU object.
    #[error("{what} has been deleted")]
    Deleted { what: &'static str },

    /// A binding token was superseded by a later bind of the same category.
    #[error("stale {category} binding for {handle}: another object is now current")]
    StaleBinding { category: BindCategory, handle: GpuHandle },

    /// An operation required `handle` to be current in `category`.
    #[error("{handle} must be bound as the current {category}")]
    NotCurrent { category: BindCategory, handle: GpuHandle },

    /// A token from the wrong binding category was supplied.
    #[error("{handle} is bound as {actual}, expected {expected}")]
    WrongTarget {
        handle: GpuHandle,
        expected: BindCategory,
        actual: BindCategory,
    },

    /// A program samples a unit that has no texture bound.
    #[error("texture unit {unit} has no texture bound")]
    EmptyTextureUnit { unit: u32 },

    /// A uniform setter does not match the declared uniform type.
    #[error("uniform '{name}' is declared as {declared}, cannot set {requested}")]
    UniformType {
        name: String,
        declared: String,
        requested: &'static str,
    },
}

impl Error {
    /// Stage tag for compile/link failures: `"VERTEX"`, `"FRAGMENT"` or `"PROGRAM"`.
    pub fn stage_tag(&self) -> Option<&'static str> {
        match self {
            Error::Compilation { stage, .. } => Some(stage.tag()),
            Error::Link { .. } => Some("PROGRAM"),
            _ => None,
        }
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    pub(crate) fn asset(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        Error::AssetLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Bounds compiler output to `INFO_LOG_CAPACITY`, cutting on a char boundary.
pub(crate) fn info_log(mut text: String) -> String {
    if text.len() <= INFO_LOG_CAPACITY {
        return text;
    }
    let mut cut = INFO_LOG_CAPACITY;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
    text
}
