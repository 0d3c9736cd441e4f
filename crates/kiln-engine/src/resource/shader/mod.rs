//! Shader programs built from one WGSL source per stage.
//!
//! Each stage is parsed and validated on its own so diagnostics name the stage
//! that failed. Linking then checks the stage interface and the bindings both
//! stages declare, and reflects them into a name → location table.

mod compile;
mod program;
mod reflect;

pub use program::{ActiveProgram, ShaderProgram, SAMPLER_SUFFIX};
pub use reflect::{Reflection, UniformInfo, UniformKind, UniformLocation, UniformType};

pub(crate) use program::{ProgramObjects, SampledBinding};
