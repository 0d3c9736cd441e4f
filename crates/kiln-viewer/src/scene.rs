use std::mem::{offset_of, size_of};

use anyhow::{Context, Result};
use bytemuck::{Pod, Zeroable};

use kiln_engine::camera::{Camera, CameraInput};
use kiln_engine::render::{FrameRenderer, FrameScene, RenderCtx, RenderTarget};
use kiln_engine::resource::{
    BindState, BufferObject, BufferTarget, ComponentType, PixelFormat, ShaderProgram, Texture,
    TextureKind, VertexArray, VertexLayoutSlot,
};

use crate::config::ViewerConfig;

/// Interleaved pyramid vertex: position, color, texture coordinate.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
    pub tex_coord: [f32; 2],
}

const fn vertex(position: [f32; 3], color: [f32; 3], tex_coord: [f32; 2]) -> Vertex {
    Vertex {
        position,
        color,
        tex_coord,
    }
}

const BASE: [f32; 3] = [0.83, 0.70, 0.44];
const APEX: [f32; 3] = [0.92, 0.86, 0.76];

/// Square base on y = 0 and an apex at y = 0.8. Texture coordinates run past
/// 1.0 so the repeat wrap tiles the image.
pub const VERTICES: [Vertex; 5] = [
    vertex([-0.5, 0.0, 0.5], BASE, [0.0, 0.0]),
    vertex([-0.5, 0.0, -0.5], BASE, [5.0, 0.0]),
    vertex([0.5, 0.0, -0.5], BASE, [0.0, 0.0]),
    vertex([0.5, 0.0, 0.5], BASE, [5.0, 0.0]),
    vertex([0.0, 0.8, 0.0], APEX, [2.5, 5.0]),
];

pub const INDICES: [u32; 18] = [
    0, 1, 2, //
    0, 2, 3, //
    0, 1, 4, //
    1, 2, 4, //
    2, 3, 4, //
    3, 0, 4,
];

pub const TEXTURE_UNIT: u32 = 0;

/// Attribute slots matching the vertex stage's `@location`s.
pub fn vertex_layout() -> [VertexLayoutSlot; 3] {
    let stride = size_of::<Vertex>() as u64;
    [
        VertexLayoutSlot::new(0, 3, ComponentType::F32, stride, offset_of!(Vertex, position) as u64),
        VertexLayoutSlot::new(1, 3, ComponentType::F32, stride, offset_of!(Vertex, color) as u64),
        VertexLayoutSlot::new(2, 2, ComponentType::F32, stride, offset_of!(Vertex, tex_coord) as u64),
    ]
}

/// GPU resources of the textured pyramid.
pub struct PyramidScene {
    program: ShaderProgram,
    vertex_array: VertexArray,
    vertices: BufferObject,
    indices: BufferObject,
    texture: Texture,
}

impl PyramidScene {
    pub fn load(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        state: &mut BindState,
        config: &ViewerConfig,
    ) -> Result<Self> {
        let mut program =
            ShaderProgram::from_files(device, &config.vertex_shader, &config.fragment_shader)
                .context("failed to build the shader program")?;

        let mut vertex_array = VertexArray::new();
        let _vao = vertex_array.bind(state)?;

        let vertices = BufferObject::from_slice(device, BufferTarget::Array, &VERTICES)?;
        let indices = BufferObject::from_slice(device, BufferTarget::Element, &INDICES)?;
        let vbo = vertices.bind(state)?;
        let ebo = indices.bind(state)?;

        vertex_array.link_elements(state, &ebo, wgpu::IndexFormat::Uint32)?;
        for slot in vertex_layout() {
            vertex_array.link_attribute(state, &vbo, slot)?;
        }

        vertex_array.unbind(state);
        vertices.unbind(state);
        indices.unbind(state);

        let texture = Texture::from_file(
            device,
            queue,
            state,
            &config.texture,
            TextureKind::D2,
            TEXTURE_UNIT,
            PixelFormat::Rgba8Srgb,
        )
        .context("failed to load the pyramid texture")?;

        let active = program.activate(state)?;
        texture.texture_unit(&mut program, state, &active, "tex0", TEXTURE_UNIT)?;

        log::info!(
            "pyramid loaded: {} vertices, {} indices, texture {}x{}",
            VERTICES.len(),
            vertex_array.index_count(),
            texture.size().0,
            texture.size().1
        );

        Ok(Self {
            program,
            vertex_array,
            vertices,
            indices,
            texture,
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn draw(
        &mut self,
        renderer: &mut FrameRenderer,
        ctx: &RenderCtx<'_>,
        target: &mut RenderTarget<'_>,
        state: &mut BindState,
        camera: &mut Camera,
        input: &CameraInput,
        dt: f32,
    ) -> Result<()> {
        let scene = FrameScene {
            program: &mut self.program,
            texture: &self.texture,
            vertex_array: &self.vertex_array,
            camera,
        };
        renderer
            .render_frame(ctx, target, state, scene, input, dt)
            .context("failed to draw the pyramid")
    }

    /// Deletes everything in reverse order of creation.
    pub fn delete(mut self, state: &mut BindState) {
        self.vertex_array.delete(state);
        self.vertices.delete(state);
        self.indices.delete(state);
        self.texture.delete(state);
        self.program.delete(state);
    }
}
