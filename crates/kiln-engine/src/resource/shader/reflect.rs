//! Program linking: stage interface checks and uniform reflection.

use std::collections::BTreeMap;
use std::fmt;

use naga::{AddressSpace, Binding, ImageClass, ImageDimension, ScalarKind, TypeInner, VectorSize};

use super::compile::CompiledStage;
use crate::resource::error::{info_log, Error, Result};
use crate::resource::vertex_array::{NumericKind, VertexInput};

// Uniform buffers are allocated in whole 16-byte rows.
const UNIFORM_ALIGNMENT: u64 = 16;

/// Value type of a uniform-buffer binding, as far as the typed setters care.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum UniformType {
    Mat4,
    Vec4,
    Vec3,
    Vec2,
    F32,
    I32,
    U32,
    /// Structs, arrays and anything else; only `set_uniform_bytes` writes these.
    Opaque,
}

impl UniformType {
    pub const fn wgsl_name(self) -> &'static str {
        match self {
            UniformType::Mat4 => "mat4x4<f32>",
            UniformType::Vec4 => "vec4<f32>",
            UniformType::Vec3 => "vec3<f32>",
            UniformType::Vec2 => "vec2<f32>",
            UniformType::F32 => "f32",
            UniformType::I32 => "i32",
            UniformType::U32 => "u32",
            UniformType::Opaque => "struct",
        }
    }
}

impl fmt::Display for UniformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wgsl_name())
    }
}

/// What a named binding holds.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum UniformKind {
    Buffer {
        /// Allocation size in bytes, rounded up to 16.
        size: u64,
        ty: UniformType,
    },
    Texture {
        dimension: wgpu::TextureViewDimension,
        sample_type: wgpu::TextureSampleType,
    },
    Sampler {
        comparison: bool,
    },
}

impl fmt::Display for UniformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniformKind::Buffer { ty, .. } => write!(f, "uniform {ty}"),
            UniformKind::Texture { dimension, .. } => write!(f, "texture {dimension:?}"),
            UniformKind::Sampler { comparison: false } => f.write_str("sampler"),
            UniformKind::Sampler { comparison: true } => f.write_str("sampler_comparison"),
        }
    }
}

/// Bind group and binding index of a named uniform.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct UniformLocation {
    pub group: u32,
    pub binding: u32,
}

impl fmt::Display for UniformLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@group({}) @binding({})", self.group, self.binding)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UniformInfo {
    pub name: String,
    pub location: UniformLocation,
    pub kind: UniformKind,
    /// Stages that declare the binding.
    pub visibility: wgpu::ShaderStages,
}

impl UniformInfo {
    fn layout_entry(&self) -> wgpu::BindGroupLayoutEntry {
        let ty = match self.kind {
            UniformKind::Buffer { size, .. } => wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: wgpu::BufferSize::new(size),
            },
            UniformKind::Texture {
                dimension,
                sample_type,
            } => wgpu::BindingType::Texture {
                sample_type,
                view_dimension: dimension,
                multisampled: false,
            },
            UniformKind::Sampler { comparison: false } => {
                wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering)
            }
            UniformKind::Sampler { comparison: true } => {
                wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison)
            }
        };
        wgpu::BindGroupLayoutEntry {
            binding: self.location.binding,
            visibility: self.visibility,
            ty,
            count: None,
        }
    }
}

/// Result of a successful link: name → binding table plus vertex inputs.
///
/// Built once; the table never changes for the life of the program.
#[derive(Debug, Clone, Default)]
pub struct Reflection {
    uniforms: BTreeMap<String, UniformInfo>,
    vertex_inputs: Vec<VertexInput>,
}

impl Reflection {
    pub fn uniform(&self, name: &str) -> Option<&UniformInfo> {
        self.uniforms.get(name)
    }

    pub fn uniforms(&self) -> impl Iterator<Item = &UniformInfo> {
        self.uniforms.values()
    }

    /// Locations read by the vertex entry point, ascending.
    pub fn vertex_inputs(&self) -> &[VertexInput] {
        &self.vertex_inputs
    }

    /// Number of bind groups the pipeline layout needs (highest group + 1).
    pub fn group_count(&self) -> u32 {
        self.uniforms
            .values()
            .map(|u| u.location.group + 1)
            .max()
            .unwrap_or(0)
    }

    pub(crate) fn layout_entries(&self, group: u32) -> Vec<wgpu::BindGroupLayoutEntry> {
        let mut entries: Vec<_> = self
            .uniforms
            .values()
            .filter(|u| u.location.group == group)
            .map(UniformInfo::layout_entry)
            .collect();
        entries.sort_by_key(|e| e.binding);
        entries
    }
}

/// Checks that `vertex` and `fragment` form a program and reflects its bindings.
///
/// Every problem found is reported; the log lists one per line.
pub(crate) fn link(vertex: &CompiledStage, fragment: &CompiledStage) -> Result<Reflection> {
    let mut problems = Vec::new();

    let uniforms = merge_uniforms(&[vertex, fragment], &mut problems);
    check_interface(vertex, fragment, &mut problems);

    if !problems.is_empty() {
        return Err(Error::Link {
            log: info_log(problems.join("\n")),
        });
    }

    let mut vertex_inputs: Vec<VertexInput> = stage_inputs(vertex)
        .into_iter()
        .filter_map(|(location, io)| {
            let kind = match io.scalar.kind {
                ScalarKind::Float => NumericKind::Float,
                ScalarKind::Uint => NumericKind::Uint,
                ScalarKind::Sint => NumericKind::Sint,
                _ => return None,
            };
            Some(VertexInput {
                location,
                kind,
                components: io.components,
            })
        })
        .collect();
    vertex_inputs.sort_by_key(|i| i.location);

    Ok(Reflection {
        uniforms,
        vertex_inputs,
    })
}

fn merge_uniforms(
    stages: &[&CompiledStage],
    problems: &mut Vec<String>,
) -> BTreeMap<String, UniformInfo> {
    let mut uniforms: BTreeMap<String, UniformInfo> = BTreeMap::new();

    for stage in stages {
        for info in stage_uniforms(stage, problems) {
            match uniforms.get_mut(&info.name) {
                Some(existing) => {
                    if existing.location != info.location || existing.kind != info.kind {
                        problems.push(format!(
                            "uniform '{}' is {} {} in one stage and {} {} in {}",
                            info.name,
                            existing.kind,
                            existing.location,
                            info.kind,
                            info.location,
                            stage.stage
                        ));
                    } else {
                        existing.visibility |= info.visibility;
                    }
                }
                None => {
                    uniforms.insert(info.name.clone(), info);
                }
            }
        }
    }

    let mut by_location: BTreeMap<UniformLocation, &str> = BTreeMap::new();
    for info in uniforms.values() {
        if let Some(other) = by_location.insert(info.location, &info.name) {
            problems.push(format!(
                "uniforms '{other}' and '{}' share {}",
                info.name, info.location
            ));
        }
    }

    uniforms
}

fn stage_uniforms(stage: &CompiledStage, problems: &mut Vec<String>) -> Vec<UniformInfo> {
    let module = &stage.module;
    let mut out = Vec::new();

    for (_, var) in module.global_variables.iter() {
        let Some(binding) = &var.binding else { continue };
        let location = UniformLocation {
            group: binding.group,
            binding: binding.binding,
        };
        let name = var
            .name
            .clone()
            .unwrap_or_else(|| format!("{location}"));

        let kind = match var.space {
            AddressSpace::Uniform => {
                let inner = &module.types[var.ty].inner;
                let size = u64::from(inner.size(module.to_ctx()));
                Ok(UniformKind::Buffer {
                    size: size.next_multiple_of(UNIFORM_ALIGNMENT),
                    ty: uniform_type(inner),
                })
            }
            AddressSpace::Handle => handle_kind(&module.types[var.ty].inner),
            AddressSpace::Storage { .. } => Err("storage buffers are not supported".to_owned()),
            _ => Err("unsupported address space".to_owned()),
        };

        match kind {
            Ok(kind) => out.push(UniformInfo {
                name,
                location,
                kind,
                visibility: stage.stage.visibility(),
            }),
            Err(reason) => problems.push(format!("{} '{name}': {reason}", stage.stage)),
        }
    }
    out
}

fn uniform_type(inner: &TypeInner) -> UniformType {
    let f32 = |s: &naga::Scalar| s.kind == ScalarKind::Float && s.width == 4;
    match inner {
        TypeInner::Matrix {
            columns: VectorSize::Quad,
            rows: VectorSize::Quad,
            scalar,
        } if f32(scalar) => UniformType::Mat4,
        TypeInner::Vector { size, scalar } if f32(scalar) => match size {
            VectorSize::Quad => UniformType::Vec4,
            VectorSize::Tri => UniformType::Vec3,
            VectorSize::Bi => UniformType::Vec2,
        },
        TypeInner::Scalar(scalar) if scalar.width == 4 => match scalar.kind {
            ScalarKind::Float => UniformType::F32,
            ScalarKind::Sint => UniformType::I32,
            ScalarKind::Uint => UniformType::U32,
            _ => UniformType::Opaque,
        },
        _ => UniformType::Opaque,
    }
}

fn handle_kind(inner: &TypeInner) -> std::result::Result<UniformKind, String> {
    match inner {
        TypeInner::Sampler { comparison } => Ok(UniformKind::Sampler {
            comparison: *comparison,
        }),
        TypeInner::Image {
            dim,
            arrayed,
            class,
        } => {
            let dimension = match (dim, arrayed) {
                (ImageDimension::D1, _) => wgpu::TextureViewDimension::D1,
                (ImageDimension::D2, false) => wgpu::TextureViewDimension::D2,
                (ImageDimension::D2, true) => wgpu::TextureViewDimension::D2Array,
                (ImageDimension::D3, _) => wgpu::TextureViewDimension::D3,
                (ImageDimension::Cube, false) => wgpu::TextureViewDimension::Cube,
                (ImageDimension::Cube, true) => wgpu::TextureViewDimension::CubeArray,
            };
            let sample_type = match class {
                ImageClass::Sampled { multi: true, .. } | ImageClass::Depth { multi: true } => {
                    return Err("multisampled textures are not supported".to_owned());
                }
                ImageClass::Sampled { kind, .. } => match kind {
                    ScalarKind::Float => wgpu::TextureSampleType::Float { filterable: true },
                    ScalarKind::Sint => wgpu::TextureSampleType::Sint,
                    ScalarKind::Uint => wgpu::TextureSampleType::Uint,
                    _ => return Err("unsupported texel type".to_owned()),
                },
                ImageClass::Depth { .. } => wgpu::TextureSampleType::Depth,
                _ => return Err("storage textures are not supported".to_owned()),
            };
            Ok(UniformKind::Texture {
                dimension,
                sample_type,
            })
        }
        _ => Err("unsupported resource type".to_owned()),
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
struct IoType {
    scalar: naga::Scalar,
    components: u32,
}

impl fmt::Display for IoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.scalar.kind {
            ScalarKind::Float => "f",
            ScalarKind::Sint => "i",
            ScalarKind::Uint => "u",
            _ => "?",
        };
        let bits = u32::from(self.scalar.width) * 8;
        if self.components == 1 {
            write!(f, "{prefix}{bits}")
        } else {
            write!(f, "vec{}<{prefix}{bits}>", self.components)
        }
    }
}

fn io_type(module: &naga::Module, ty: naga::Handle<naga::Type>) -> Option<IoType> {
    match module.types[ty].inner {
        TypeInner::Scalar(scalar) => Some(IoType {
            scalar,
            components: 1,
        }),
        TypeInner::Vector { size, scalar } => Some(IoType {
            scalar,
            components: size as u32,
        }),
        _ => None,
    }
}

// Flattens `@location` bindings, descending one level into structs.
fn collect_locations(
    module: &naga::Module,
    ty: naga::Handle<naga::Type>,
    binding: Option<&Binding>,
    out: &mut BTreeMap<u32, IoType>,
) {
    match binding {
        Some(Binding::Location { location, .. }) => {
            if let Some(io) = io_type(module, ty) {
                out.insert(*location, io);
            }
        }
        Some(Binding::BuiltIn(_)) => {}
        None => {
            if let TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    collect_locations(module, member.ty, member.binding.as_ref(), out);
                }
            }
        }
    }
}

fn stage_inputs(stage: &CompiledStage) -> BTreeMap<u32, IoType> {
    let mut out = BTreeMap::new();
    for arg in &stage.entry_point().function.arguments {
        collect_locations(&stage.module, arg.ty, arg.binding.as_ref(), &mut out);
    }
    out
}

fn stage_outputs(stage: &CompiledStage) -> BTreeMap<u32, IoType> {
    let mut out = BTreeMap::new();
    if let Some(result) = &stage.entry_point().function.result {
        collect_locations(&stage.module, result.ty, result.binding.as_ref(), &mut out);
    }
    out
}

fn check_interface(vertex: &CompiledStage, fragment: &CompiledStage, problems: &mut Vec<String>) {
    let produced = stage_outputs(vertex);
    for (location, consumed) in stage_inputs(fragment) {
        match produced.get(&location) {
            None => problems.push(format!(
                "fragment input @location({location}) is not written by the vertex stage"
            )),
            Some(io) if *io != consumed => problems.push(format!(
                "fragment input @location({location}) is {consumed} but the vertex stage writes {io}"
            )),
            Some(_) => {}
        }
    }

    if !stage_outputs(fragment).contains_key(&0) {
        problems.push("fragment stage does not write @location(0)".to_owned());
    }
}
