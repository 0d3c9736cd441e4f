use std::collections::HashMap;

use crate::camera::{Camera, CameraInput, Projection};
use crate::resource::{
    ActiveProgram, BindCategory, BindState, BoundVertexArray, Error, GpuHandle, Result,
    SampledBinding, ShaderProgram, Texture, VertexArray, VertexStream,
};

use super::{RenderCtx, RenderTarget};

/// Format of the depth attachment created by [`FrameRenderer`].
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Per-frame rendering parameters.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub clear_color: wgpu::Color,
    /// Name of the mat4 uniform that receives the view-projection matrix.
    pub camera_uniform: String,
    pub projection: Projection,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            clear_color: wgpu::Color {
                r: 0.07,
                g: 0.13,
                b: 0.17,
                a: 1.0,
            },
            camera_uniform: "cam_matrix".to_string(),
            projection: Projection::default(),
        }
    }
}

/// Everything one frame draws: a program, its texture, a vertex array and the
/// camera looking at them.
pub struct FrameScene<'a> {
    pub program: &'a mut ShaderProgram,
    pub texture: &'a Texture,
    pub vertex_array: &'a VertexArray,
    pub camera: &'a mut Camera,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
struct PipelineKey {
    program: GpuHandle,
    vertex_array: GpuHandle,
    layout_revision: u64,
    color_format: wgpu::TextureFormat,
}

#[derive(Debug, Clone, Eq, PartialEq)]
struct BindGroupKey {
    program: GpuHandle,
    bindings: Vec<SampledBinding>,
}

struct DepthTarget {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    size: (u32, u32),
}

/// Turns the current program, texture unit and vertex array into one indexed
/// draw per frame.
///
/// Owns the depth attachment (recreated when the drawable size changes), the
/// render pipelines built so far and the bind groups of the last draw.
pub struct FrameRenderer {
    config: RenderConfig,
    depth: Option<DepthTarget>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    bind_groups: Option<(BindGroupKey, Vec<wgpu::BindGroup>)>,
}

impl Default for FrameRenderer {
    fn default() -> Self {
        Self::new(RenderConfig::default())
    }
}

impl FrameRenderer {
    pub fn new(config: RenderConfig) -> Self {
        Self {
            config,
            depth: None,
            pipelines: HashMap::new(),
            bind_groups: None,
        }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut RenderConfig {
        &mut self.config
    }

    /// Runs one frame: activate the program, move the camera and publish its
    /// matrix, bind the texture and the vertex array, then clear and draw.
    pub fn render_frame(
        &mut self,
        ctx: &RenderCtx<'_>,
        target: &mut RenderTarget<'_>,
        state: &mut BindState,
        scene: FrameScene<'_>,
        input: &CameraInput,
        dt: f32,
    ) -> Result<()> {
        let FrameScene {
            program,
            texture,
            vertex_array,
            camera,
        } = scene;

        let (width, height) = ctx.size;
        if width > 0 && height > 0 && camera.viewport() != ctx.size {
            camera.set_viewport(width, height)?;
        }

        let active = program.activate(state)?;
        camera.process_input(input, dt);
        camera.publish(
            program,
            state,
            &active,
            &self.config.camera_uniform,
            &self.config.projection,
        )?;

        texture.bind(state)?;
        let bound = vertex_array.bind(state)?;

        self.record_draw(ctx, target, state, program, &active, vertex_array, &bound)
    }

    /// Records a cleared render pass with one indexed draw of the whole
    /// element buffer of `vertex_array`.
    ///
    /// Both tokens must still be current, and every texture unit the program
    /// samples must have a texture bound.
    #[allow(clippy::too_many_arguments)]
    pub fn record_draw(
        &mut self,
        ctx: &RenderCtx<'_>,
        target: &mut RenderTarget<'_>,
        state: &BindState,
        program: &mut ShaderProgram,
        active: &ActiveProgram,
        vertex_array: &VertexArray,
        bound: &BoundVertexArray,
    ) -> Result<()> {
        program.ensure_active(state, active)?;
        if bound.handle() != vertex_array.handle() {
            return Err(Error::NotCurrent {
                category: BindCategory::VertexArray,
                handle: vertex_array.handle(),
            });
        }
        state.check(&bound.ticket)?;

        let index = vertex_array.index_stream()?;
        let streams = vertex_array.streams();

        let pipeline = self.pipeline(ctx, program, vertex_array, &streams)?;
        let bind_groups = self.bind_groups_for(ctx.device, program, state)?;
        let depth_view = self.depth_view(ctx.device, ctx.size);

        program.flush_uniforms(ctx.queue, state, active)?;

        let mut rpass = target.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("kiln frame pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.config.clear_color),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        rpass.set_pipeline(&pipeline);
        for (group, bind_group) in bind_groups.iter().enumerate() {
            rpass.set_bind_group(group as u32, bind_group, &[]);
        }
        for (slot, stream) in streams.iter().enumerate() {
            rpass.set_vertex_buffer(slot as u32, stream.raw.slice(..));
        }
        rpass.set_index_buffer(index.raw.slice(..), index.format);
        rpass.draw_indexed(0..index.count, 0, 0..1);

        Ok(())
    }

    /// Drops cached pipelines and bind groups that reference `handle`.
    pub fn forget(&mut self, handle: GpuHandle) {
        self.pipelines
            .retain(|key, _| key.program != handle && key.vertex_array != handle);
        if self
            .bind_groups
            .as_ref()
            .is_some_and(|(key, _)| {
                key.program == handle || key.bindings.iter().any(|b| b.texture == handle)
            })
        {
            self.bind_groups = None;
        }
    }

    /// Drops every cached GPU object, including the depth target.
    pub fn clear_caches(&mut self) {
        self.pipelines.clear();
        self.bind_groups = None;
        self.depth = None;
    }

    pub fn cached_pipelines(&self) -> usize {
        self.pipelines.len()
    }

    fn pipeline(
        &mut self,
        ctx: &RenderCtx<'_>,
        program: &ShaderProgram,
        vertex_array: &VertexArray,
        streams: &[VertexStream],
    ) -> Result<wgpu::RenderPipeline> {
        let key = PipelineKey {
            program: program.handle(),
            vertex_array: vertex_array.handle(),
            layout_revision: vertex_array.revision(),
            color_format: ctx.surface_format,
        };
        if let Some(pipeline) = self.pipelines.get(&key) {
            return Ok(pipeline.clone());
        }

        vertex_array.check_inputs(program.reflection().vertex_inputs())?;
        check_vertex_limits(
            streams.iter().map(|s| (s.stride, s.attributes.len())),
            &ctx.device.limits(),
        )?;
        let pipeline = build_pipeline(ctx.device, program, streams, ctx.surface_format)?;
        log::debug!(
            "built pipeline for program {} / vertex array {} ({:?})",
            key.program,
            key.vertex_array,
            key.color_format
        );

        // A vertex array that changed layout leaves its old pipeline behind.
        self.pipelines
            .retain(|k, _| !(k.program == key.program && k.vertex_array == key.vertex_array));
        self.pipelines.insert(key, pipeline.clone());
        Ok(pipeline)
    }

    fn bind_groups_for(
        &mut self,
        device: &wgpu::Device,
        program: &ShaderProgram,
        state: &BindState,
    ) -> Result<Vec<wgpu::BindGroup>> {
        let key = BindGroupKey {
            program: program.handle(),
            bindings: program.sampled_bindings(state)?,
        };
        if let Some((cached, groups)) = &self.bind_groups {
            if *cached == key {
                return Ok(groups.clone());
            }
        }

        let groups = program.create_bind_groups(device, state)?;
        self.bind_groups = Some((key, groups.clone()));
        Ok(groups)
    }

    fn depth_view(&mut self, device: &wgpu::Device, size: (u32, u32)) -> wgpu::TextureView {
        let size = (size.0.max(1), size.1.max(1));
        if let Some(depth) = &self.depth {
            if depth.size == size {
                return depth.view.clone();
            }
        }

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("kiln depth target"),
            size: wgpu::Extent3d {
                width: size.0,
                height: size.1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        log::debug!("depth target resized to {}x{}", size.0, size.1);

        self.depth = Some(DepthTarget {
            _texture: texture,
            view: view.clone(),
            size,
        });
        view
    }
}

/// Rejects vertex buffer layouts the device cannot fetch. Takes the stride and
/// attribute count of each stream.
fn check_vertex_limits(
    streams: impl IntoIterator<Item = (u64, usize)>,
    limits: &wgpu::Limits,
) -> Result<()> {
    let mut buffers = 0u32;
    let mut attributes = 0usize;
    for (stride, count) in streams {
        if stride > u64::from(limits.max_vertex_buffer_array_stride) {
            return Err(Error::config(format!(
                "vertex stride {stride} exceeds device limit of {}",
                limits.max_vertex_buffer_array_stride
            )));
        }
        buffers += 1;
        attributes += count;
    }
    if buffers > limits.max_vertex_buffers {
        return Err(Error::config(format!(
            "{buffers} vertex buffers exceed device limit of {}",
            limits.max_vertex_buffers
        )));
    }
    if attributes > limits.max_vertex_attributes as usize {
        return Err(Error::config(format!(
            "{attributes} vertex attributes exceed device limit of {}",
            limits.max_vertex_attributes
        )));
    }
    Ok(())
}

fn build_pipeline(
    device: &wgpu::Device,
    program: &ShaderProgram,
    streams: &[VertexStream],
    color_format: wgpu::TextureFormat,
) -> Result<wgpu::RenderPipeline> {
    let objects = program.objects()?;
    let buffers: Vec<wgpu::VertexBufferLayout<'_>> = streams.iter().map(VertexStream::layout).collect();

    Ok(device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("kiln pipeline"),
        layout: Some(&objects.pipeline_layout),

        vertex: wgpu::VertexState {
            module: &objects.vertex_module,
            entry_point: Some(objects.vertex_entry.as_str()),
            compilation_options: Default::default(),
            buffers: &buffers,
        },

        fragment: Some(wgpu::FragmentState {
            module: &objects.fragment_module,
            entry_point: Some(objects.fragment_entry.as_str()),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: color_format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),

        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },

        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),

        multiview_mask: None,
        cache: None,
    }))
}
