use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use glam::{Mat4, Vec2, Vec3, Vec4};

use super::compile::compile_stage;
use super::reflect::{link, Reflection, UniformKind, UniformLocation, UniformType};
use crate::resource::binding::{check_unit, BindCategory, BindState, Ticket};
use crate::resource::error::{Error, Result, ShaderStage};
use crate::resource::handle::GpuHandle;

/// Suffix that pairs a sampler binding with the texture of the same base name.
pub const SAMPLER_SUFFIX: &str = "_sampler";

/// GPU objects that exist only while the program is live.
#[derive(Debug)]
pub(crate) struct ProgramObjects {
    pub(crate) vertex_module: wgpu::ShaderModule,
    pub(crate) fragment_module: wgpu::ShaderModule,
    pub(crate) vertex_entry: String,
    pub(crate) fragment_entry: String,
    pub(crate) bind_group_layouts: Vec<wgpu::BindGroupLayout>,
    pub(crate) pipeline_layout: wgpu::PipelineLayout,
}

#[derive(Debug)]
struct UniformSlot {
    staged: Vec<u8>,
    buffer: wgpu::Buffer,
    dirty: bool,
}

/// Texture handle read by one texture or sampler binding of a program.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub(crate) struct SampledBinding {
    pub(crate) group: u32,
    pub(crate) binding: u32,
    pub(crate) unit: u32,
    pub(crate) texture: GpuHandle,
}

/// Token returned by [`ShaderProgram::activate`].
#[derive(Debug)]
pub struct ActiveProgram {
    pub(crate) ticket: Ticket,
}

impl ActiveProgram {
    pub fn handle(&self) -> GpuHandle {
        self.ticket.handle
    }
}

/// A vertex and a fragment stage linked into one program.
///
/// Uniform values are staged on the CPU by the setters and written to the
/// program's uniform buffers by [`flush_uniforms`](Self::flush_uniforms),
/// which the frame renderer calls right before drawing.
///
/// Texture bindings are fed by texture units: `set_texture_unit` points a
/// texture binding at a unit, and a sampler binding named `<texture>_sampler`
/// follows its texture. Unassigned texture bindings read unit 0.
#[derive(Debug)]
pub struct ShaderProgram {
    handle: GpuHandle,
    objects: Option<ProgramObjects>,
    reflection: Reflection,
    uniforms: BTreeMap<String, UniformSlot>,
    texture_units: BTreeMap<String, u32>,
    missing_warned: RefCell<HashSet<String>>,
}

impl ShaderProgram {
    /// Compiles both stages, links them and creates the GPU-side objects.
    ///
    /// No handle is allocated unless every step succeeds.
    pub fn new(device: &wgpu::Device, vertex_src: &str, fragment_src: &str) -> Result<Self> {
        let built = Self::build(device, vertex_src, fragment_src);
        if let Err(err) = &built {
            log::error!("{err}");
        }
        built
    }

    /// Reads both stage sources from disk, then behaves like [`new`](Self::new).
    pub fn from_files(
        device: &wgpu::Device,
        vertex_path: impl AsRef<Path>,
        fragment_path: impl AsRef<Path>,
    ) -> Result<Self> {
        let vertex_src = read_source(vertex_path.as_ref())?;
        let fragment_src = read_source(fragment_path.as_ref())?;
        Self::new(device, &vertex_src, &fragment_src)
    }

    fn build(device: &wgpu::Device, vertex_src: &str, fragment_src: &str) -> Result<Self> {
        let vertex = compile_stage(ShaderStage::Vertex, vertex_src)?;
        let fragment = compile_stage(ShaderStage::Fragment, fragment_src)?;
        let reflection = link(&vertex, &fragment)?;

        let limits = device.limits();
        if reflection.group_count() > limits.max_bind_groups {
            return Err(Error::ResourceCreation {
                what: "shader program",
                reason: format!(
                    "{} bind groups exceed device limit of {}",
                    reflection.group_count(),
                    limits.max_bind_groups
                ),
            });
        }

        let mut uniforms = BTreeMap::new();
        for info in reflection.uniforms() {
            let UniformKind::Buffer { size, .. } = info.kind else { continue };
            if size > u64::from(limits.max_uniform_buffer_binding_size) {
                return Err(Error::ResourceCreation {
                    what: "uniform buffer",
                    reason: format!(
                        "'{}' needs {size} bytes, device limit is {}",
                        info.name, limits.max_uniform_buffer_binding_size
                    ),
                });
            }
            let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("kiln uniform buffer"),
                size,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            uniforms.insert(
                info.name.clone(),
                UniformSlot {
                    staged: vec![0; size as usize],
                    buffer,
                    dirty: false,
                },
            );
        }

        let vertex_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("kiln vertex shader"),
            source: wgpu::ShaderSource::Wgsl(vertex_src.into()),
        });
        let fragment_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("kiln fragment shader"),
            source: wgpu::ShaderSource::Wgsl(fragment_src.into()),
        });

        let bind_group_layouts: Vec<wgpu::BindGroupLayout> = (0..reflection.group_count())
            .map(|group| {
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("kiln program bgl"),
                    entries: &reflection.layout_entries(group),
                })
            })
            .collect();
        let layout_refs: Vec<&wgpu::BindGroupLayout> = bind_group_layouts.iter().collect();

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("kiln program pipeline layout"),
            bind_group_layouts: &layout_refs,
            immediate_size: 0,
        });

        let handle = GpuHandle::allocate();
        log::debug!(
            "linked shader program {handle} ({} uniforms, {} vertex inputs)",
            reflection.uniforms().count(),
            reflection.vertex_inputs().len()
        );

        Ok(Self {
            handle,
            objects: Some(ProgramObjects {
                vertex_module,
                fragment_module,
                vertex_entry: vertex.entry_name().to_owned(),
                fragment_entry: fragment.entry_name().to_owned(),
                bind_group_layouts,
                pipeline_layout,
            }),
            reflection,
            uniforms,
            texture_units: BTreeMap::new(),
            missing_warned: RefCell::new(HashSet::new()),
        })
    }

    /// Makes this program the current program.
    pub fn activate(&self, state: &mut BindState) -> Result<ActiveProgram> {
        self.objects()?;
        let ticket = state.bind(BindCategory::Program, self.handle)?;
        Ok(ActiveProgram { ticket })
    }

    /// Looks up a uniform by name. Unknown names are logged once.
    pub fn uniform_location(&self, name: &str) -> Option<UniformLocation> {
        let location = self.reflection.uniform(name).map(|u| u.location);
        if location.is_none() {
            self.warn_missing(name);
        }
        location
    }

    pub fn reflection(&self) -> &Reflection {
        &self.reflection
    }

    pub fn set_uniform_mat4(
        &mut self,
        state: &BindState,
        active: &ActiveProgram,
        name: &str,
        value: &Mat4,
    ) -> Result<()> {
        self.write_typed(state, active, name, UniformType::Mat4, bytemuck::bytes_of(value))
    }

    pub fn set_uniform_vec4(
        &mut self,
        state: &BindState,
        active: &ActiveProgram,
        name: &str,
        value: Vec4,
    ) -> Result<()> {
        self.write_typed(state, active, name, UniformType::Vec4, bytemuck::bytes_of(&value))
    }

    pub fn set_uniform_vec3(
        &mut self,
        state: &BindState,
        active: &ActiveProgram,
        name: &str,
        value: Vec3,
    ) -> Result<()> {
        self.write_typed(state, active, name, UniformType::Vec3, bytemuck::bytes_of(&value))
    }

    pub fn set_uniform_vec2(
        &mut self,
        state: &BindState,
        active: &ActiveProgram,
        name: &str,
        value: Vec2,
    ) -> Result<()> {
        self.write_typed(state, active, name, UniformType::Vec2, bytemuck::bytes_of(&value))
    }

    pub fn set_uniform_f32(
        &mut self,
        state: &BindState,
        active: &ActiveProgram,
        name: &str,
        value: f32,
    ) -> Result<()> {
        self.write_typed(state, active, name, UniformType::F32, bytemuck::bytes_of(&value))
    }

    pub fn set_uniform_i32(
        &mut self,
        state: &BindState,
        active: &ActiveProgram,
        name: &str,
        value: i32,
    ) -> Result<()> {
        self.write_typed(state, active, name, UniformType::I32, bytemuck::bytes_of(&value))
    }

    pub fn set_uniform_u32(
        &mut self,
        state: &BindState,
        active: &ActiveProgram,
        name: &str,
        value: u32,
    ) -> Result<()> {
        self.write_typed(state, active, name, UniformType::U32, bytemuck::bytes_of(&value))
    }

    /// Writes raw bytes at the start of any uniform buffer binding.
    pub fn set_uniform_bytes(
        &mut self,
        state: &BindState,
        active: &ActiveProgram,
        name: &str,
        bytes: &[u8],
    ) -> Result<()> {
        self.ensure_active(state, active)?;
        let Some(slot) = self.buffer_slot(name, "bytes")? else {
            return Ok(());
        };
        if bytes.len() > slot.staged.len() {
            return Err(Error::config(format!(
                "uniform '{name}' holds {} bytes, got {}",
                slot.staged.len(),
                bytes.len()
            )));
        }
        slot.staged[..bytes.len()].copy_from_slice(bytes);
        slot.dirty = true;
        Ok(())
    }

    /// Points the texture binding `name` at texture unit `unit`.
    pub fn set_texture_unit(
        &mut self,
        state: &BindState,
        active: &ActiveProgram,
        name: &str,
        unit: u32,
    ) -> Result<()> {
        self.ensure_active(state, active)?;
        check_unit(unit)?;
        let Some(info) = self.reflection.uniform(name) else {
            self.warn_missing(name);
            return Ok(());
        };
        if !matches!(info.kind, UniformKind::Texture { .. }) {
            return Err(Error::UniformType {
                name: name.to_owned(),
                declared: info.kind.to_string(),
                requested: "texture unit",
            });
        }
        self.texture_units.insert(name.to_owned(), unit);
        Ok(())
    }

    /// Texture unit read by the texture or sampler binding `name`.
    pub fn texture_unit_of(&self, name: &str) -> Option<u32> {
        let info = self.reflection.uniform(name)?;
        match info.kind {
            UniformKind::Texture { .. } => Some(self.texture_units.get(name).copied().unwrap_or(0)),
            UniformKind::Sampler { .. } => {
                let paired = name
                    .strip_suffix(SAMPLER_SUFFIX)
                    .and_then(|base| self.texture_units.get(base));
                Some(paired.copied().unwrap_or(0))
            }
            UniformKind::Buffer { .. } => None,
        }
    }

    /// Uploads every uniform changed since the last flush.
    pub fn flush_uniforms(
        &mut self,
        queue: &wgpu::Queue,
        state: &BindState,
        active: &ActiveProgram,
    ) -> Result<()> {
        self.ensure_active(state, active)?;
        for slot in self.uniforms.values_mut().filter(|s| s.dirty) {
            queue.write_buffer(&slot.buffer, 0, &slot.staged);
            slot.dirty = false;
        }
        Ok(())
    }

    /// Releases the program. Further `activate()` calls fail with `Error::Deleted`.
    pub fn delete(&mut self, state: &mut BindState) {
        if self.objects.take().is_some() {
            state.release(self.handle);
            log::debug!("deleted shader program {}", self.handle);
            self.handle = GpuHandle::NONE;
            self.uniforms.clear();
            self.texture_units.clear();
        }
    }

    pub fn handle(&self) -> GpuHandle {
        self.handle
    }

    pub fn is_deleted(&self) -> bool {
        self.objects.is_none()
    }

    pub(crate) fn objects(&self) -> Result<&ProgramObjects> {
        self.objects.as_ref().ok_or(Error::Deleted {
            what: "shader program",
        })
    }

    /// Fails unless `active` is a live activation of this program.
    pub(crate) fn ensure_active(&self, state: &BindState, active: &ActiveProgram) -> Result<()> {
        self.objects()?;
        if active.ticket.handle != self.handle {
            return Err(Error::NotCurrent {
                category: BindCategory::Program,
                handle: self.handle,
            });
        }
        state.check(&active.ticket)
    }

    /// Every texture and sampler binding with the unit it reads and the
    /// texture currently bound there, ordered by location.
    pub(crate) fn sampled_bindings(&self, state: &BindState) -> Result<Vec<SampledBinding>> {
        let mut bindings = Vec::new();
        for info in self.reflection.uniforms() {
            let Some(unit) = self.texture_unit_of(&info.name) else { continue };
            let texture = state
                .current(BindCategory::TextureUnit(unit))
                .ok_or(Error::EmptyTextureUnit { unit })?;
            bindings.push(SampledBinding {
                group: info.location.group,
                binding: info.location.binding,
                unit,
                texture,
            });
        }
        bindings.sort();
        Ok(bindings)
    }

    /// Creates one bind group per layout group from the uniform buffers and
    /// the resources currently bound to the sampled texture units.
    pub(crate) fn create_bind_groups(
        &self,
        device: &wgpu::Device,
        state: &BindState,
    ) -> Result<Vec<wgpu::BindGroup>> {
        let objects = self.objects()?;
        let mut groups = Vec::with_capacity(objects.bind_group_layouts.len());

        for (group, layout) in objects.bind_group_layouts.iter().enumerate() {
            let mut entries = Vec::new();
            for info in self.reflection.uniforms() {
                if info.location.group != group as u32 {
                    continue;
                }
                let resource = match info.kind {
                    UniformKind::Buffer { .. } => {
                        let slot = self.uniforms.get(&info.name).ok_or(Error::Deleted {
                            what: "uniform buffer",
                        })?;
                        slot.buffer.as_entire_binding()
                    }
                    UniformKind::Texture {
                        dimension,
                        sample_type,
                    } => {
                        let unit = self.texture_unit_of(&info.name).unwrap_or(0);
                        let res = state
                            .unit_resources(unit)
                            .ok_or(Error::EmptyTextureUnit { unit })?;
                        check_texture_binding(
                            &info.name,
                            unit,
                            (dimension, sample_type),
                            (res.dimension, res.format),
                        )?;
                        wgpu::BindingResource::TextureView(&res.view)
                    }
                    UniformKind::Sampler { .. } => {
                        let unit = self.texture_unit_of(&info.name).unwrap_or(0);
                        let res = state
                            .unit_resources(unit)
                            .ok_or(Error::EmptyTextureUnit { unit })?;
                        wgpu::BindingResource::Sampler(&res.sampler)
                    }
                };
                entries.push(wgpu::BindGroupEntry {
                    binding: info.location.binding,
                    resource,
                });
            }

            groups.push(device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("kiln program bind group"),
                layout,
                entries: &entries,
            }));
        }
        Ok(groups)
    }

    fn write_typed(
        &mut self,
        state: &BindState,
        active: &ActiveProgram,
        name: &str,
        requested: UniformType,
        bytes: &[u8],
    ) -> Result<()> {
        self.ensure_active(state, active)?;
        let Some(info) = self.reflection.uniform(name) else {
            self.warn_missing(name);
            return Ok(());
        };
        match info.kind {
            UniformKind::Buffer { ty, .. } if ty == requested => {}
            declared => {
                return Err(Error::UniformType {
                    name: name.to_owned(),
                    declared: declared.to_string(),
                    requested: requested.wgsl_name(),
                });
            }
        }
        if let Some(slot) = self.uniforms.get_mut(name) {
            slot.staged[..bytes.len()].copy_from_slice(bytes);
            slot.dirty = true;
        }
        Ok(())
    }

    // `Ok(None)` means the name is unknown and has been reported.
    fn buffer_slot(&mut self, name: &str, requested: &'static str) -> Result<Option<&mut UniformSlot>> {
        let Some(info) = self.reflection.uniform(name) else {
            self.warn_missing(name);
            return Ok(None);
        };
        if !matches!(info.kind, UniformKind::Buffer { .. }) {
            return Err(Error::UniformType {
                name: name.to_owned(),
                declared: info.kind.to_string(),
                requested,
            });
        }
        Ok(self.uniforms.get_mut(name))
    }

    fn warn_missing(&self, name: &str) {
        if self.missing_warned.borrow_mut().insert(name.to_owned()) {
            log::warn!("shader program {}: no active uniform named '{name}'", self.handle);
        }
    }
}

/// Fails unless a texture with the `held` view dimension and format can be
/// read through a binding declared as `declared`.
fn check_texture_binding(
    name: &str,
    unit: u32,
    declared: (wgpu::TextureViewDimension, wgpu::TextureSampleType),
    held: (wgpu::TextureViewDimension, wgpu::TextureFormat),
) -> Result<()> {
    use wgpu::TextureSampleType as S;

    let (dimension, sample_type) = declared;
    let (held_dimension, held_format) = held;
    if held_dimension != dimension {
        return Err(Error::config(format!(
            "texture binding '{name}' is {dimension:?} but unit {unit} holds a {held_dimension:?} texture"
        )));
    }
    let compatible = match (sample_type, held_format.sample_type(None, None)) {
        (S::Float { filterable: true }, Some(S::Float { filterable })) => filterable,
        (S::Float { filterable: false }, Some(S::Float { .. })) => true,
        (expected, Some(provided)) => expected == provided,
        (_, None) => false,
    };
    if !compatible {
        return Err(Error::config(format!(
            "texture binding '{name}' samples {sample_type:?} but unit {unit} holds {held_format:?}"
        )));
    }
    Ok(())
}

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| Error::asset(path, e))
}
