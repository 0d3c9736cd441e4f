//! Resource and draw behavior against a real device.
//!
//! Every test returns early when the machine has no usable adapter.

use glam::{Mat4, Vec3};

use kiln_engine::camera::{Camera, CameraInput, Projection};
use kiln_engine::device::{GpuInit, HeadlessGpu};
use kiln_engine::render::{FrameRenderer, FrameScene, RenderConfig, RenderCtx, RenderTarget};
use kiln_engine::resource::{
    BindCategory, BindState, BufferObject, BufferTarget, ComponentType, Error, GpuHandle,
    PixelFormat, ShaderProgram, ShaderStage, Texture, TextureImage, TextureKind, UniformLocation,
    VertexArray, VertexLayoutSlot,
};

const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const TARGET_SIZE: u32 = 32;

const VERTEX_SRC: &str = r#"
@group(0) @binding(0) var<uniform> cam_matrix: mat4x4<f32>;

struct VsIn {
    @location(0) position: vec3<f32>,
    @location(1) tex_coord: vec2<f32>,
};

struct VsOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) tex_coord: vec2<f32>,
};

@vertex
fn vs_main(in: VsIn) -> VsOut {
    var out: VsOut;
    out.clip = cam_matrix * vec4<f32>(in.position, 1.0);
    out.tex_coord = in.tex_coord;
    return out;
}
"#;

const FRAGMENT_SRC: &str = r#"
@group(0) @binding(1) var tex0: texture_2d<f32>;
@group(0) @binding(2) var tex0_sampler: sampler;

@fragment
fn fs_main(@location(0) tex_coord: vec2<f32>) -> @location(0) vec4<f32> {
    return textureSample(tex0, tex0_sampler, tex_coord);
}
"#;

/// Position + texture coordinate, five floats per vertex.
const QUAD: [f32; 20] = [
    -1.0, -1.0, 0.5, 0.0, 0.0, //
    1.0, -1.0, 0.5, 1.0, 0.0, //
    1.0, 1.0, 0.5, 1.0, 1.0, //
    -1.0, 1.0, 0.5, 0.0, 1.0,
];
const QUAD_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];
const QUAD_STRIDE: u64 = 5 * 4;

fn gpu() -> Option<HeadlessGpu> {
    match pollster::block_on(HeadlessGpu::new(GpuInit::default())) {
        Ok(gpu) => Some(gpu),
        Err(e) => {
            eprintln!("skipping GPU test: {e:#}");
            None
        }
    }
}

fn checkerboard() -> TextureImage {
    let mut pixels = Vec::with_capacity(4 * 4 * 4);
    for y in 0..4u32 {
        for x in 0..4u32 {
            let value = if (x + y) % 2 == 0 { 255 } else { 0 };
            pixels.extend_from_slice(&[value, value, value, 255]);
        }
    }
    TextureImage::from_raw(4, 4, PixelFormat::Rgba8, pixels).unwrap()
}

struct Quad {
    vertex_array: VertexArray,
    vertices: BufferObject,
    indices: BufferObject,
}

fn quad(device: &wgpu::Device, state: &mut BindState) -> Quad {
    let mut vertex_array = VertexArray::new();
    let _vao = vertex_array.bind(state).unwrap();

    let vertices = BufferObject::from_slice(device, BufferTarget::Array, &QUAD).unwrap();
    let indices = BufferObject::from_slice(device, BufferTarget::Element, &QUAD_INDICES).unwrap();
    let vbo = vertices.bind(state).unwrap();
    let ebo = indices.bind(state).unwrap();

    vertex_array
        .link_attribute(state, &vbo, VertexLayoutSlot::new(0, 3, ComponentType::F32, QUAD_STRIDE, 0))
        .unwrap();
    vertex_array
        .link_attribute(state, &vbo, VertexLayoutSlot::new(1, 2, ComponentType::F32, QUAD_STRIDE, 12))
        .unwrap();
    vertex_array
        .link_elements(state, &ebo, wgpu::IndexFormat::Uint16)
        .unwrap();
    vertex_array.unbind(state);

    Quad {
        vertex_array,
        vertices,
        indices,
    }
}

fn offscreen_target(device: &wgpu::Device) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("test color target"),
        size: wgpu::Extent3d {
            width: TARGET_SIZE,
            height: TARGET_SIZE,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TARGET_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

/// Copies mip level 0 of an RGBA8 texture back to the CPU, row 0 first.
fn read_level0(device: &wgpu::Device, queue: &wgpu::Queue, texture: &wgpu::Texture) -> Vec<Vec<[u8; 4]>> {
    let (width, height) = (texture.width(), texture.height());
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded = (width * 4).div_ceil(align) * align;
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("test readback"),
        size: u64::from(padded * height),
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = buffer.slice(..);
    slice.map_async(wgpu::MapMode::Read, |result| result.unwrap());
    device.poll(wgpu::PollType::wait_indefinitely()).unwrap();

    let rows: Vec<Vec<[u8; 4]>> = {
        let data = slice.get_mapped_range();
        data.chunks(padded as usize)
            .map(|row| {
                row[..(width * 4) as usize]
                    .chunks_exact(4)
                    .map(|px| [px[0], px[1], px[2], px[3]])
                    .collect()
            })
            .collect()
    };
    buffer.unmap();
    rows
}

fn solid(color: [u8; 4]) -> TextureImage {
    TextureImage::from_raw(1, 1, PixelFormat::Rgba8, color.to_vec()).unwrap()
}

#[test]
fn stale_buffer_token_is_rejected() {
    let Some(gpu) = gpu() else { return };
    let device = gpu.device();
    let mut state = BindState::new();

    let mut vertex_array = VertexArray::new();
    let _vao = vertex_array.bind(&mut state).unwrap();

    let first = BufferObject::from_slice(device, BufferTarget::Array, &[0.0f32; 6]).unwrap();
    let second = BufferObject::from_slice(device, BufferTarget::Array, &[1.0f32; 6]).unwrap();

    let stale = first.bind(&mut state).unwrap();
    let _current = second.bind(&mut state).unwrap();

    let slot = VertexLayoutSlot::new(0, 3, ComponentType::F32, 12, 0);
    let err = vertex_array.link_attribute(&state, &stale, slot).unwrap_err();
    assert!(matches!(err, Error::StaleBinding { .. }), "{err}");
    assert_eq!(vertex_array.enabled_attributes().count(), 0);
}

#[test]
fn element_buffer_cannot_feed_an_attribute() {
    let Some(gpu) = gpu() else { return };
    let device = gpu.device();
    let mut state = BindState::new();

    let mut vertex_array = VertexArray::new();
    let _vao = vertex_array.bind(&mut state).unwrap();
    let indices = BufferObject::from_slice(device, BufferTarget::Element, &[0u32, 1, 2]).unwrap();
    let ebo = indices.bind(&mut state).unwrap();

    let slot = VertexLayoutSlot::new(0, 1, ComponentType::U32, 4, 0);
    let err = vertex_array.link_attribute(&state, &ebo, slot).unwrap_err();
    assert!(matches!(err, Error::WrongTarget { .. }), "{err}");
}

#[test]
fn attribute_past_the_buffer_end_is_rejected() {
    let Some(gpu) = gpu() else { return };
    let device = gpu.device();
    let mut state = BindState::new();

    let mut vertex_array = VertexArray::new();
    let _vao = vertex_array.bind(&mut state).unwrap();
    let vertices = BufferObject::from_slice(device, BufferTarget::Array, &[0.0f32; 2]).unwrap();
    let vbo = vertices.bind(&mut state).unwrap();

    let slot = VertexLayoutSlot::new(0, 3, ComponentType::F32, 12, 0);
    let err = vertex_array.link_attribute(&state, &vbo, slot).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)), "{err}");
}

#[test]
fn deleted_buffer_cannot_be_bound() {
    let Some(gpu) = gpu() else { return };
    let mut state = BindState::new();

    let mut buffer = BufferObject::from_slice(gpu.device(), BufferTarget::Array, &[1.0f32; 3]).unwrap();
    let handle = buffer.handle();
    let _bound = buffer.bind(&mut state).unwrap();
    assert_eq!(state.current(BindCategory::ArrayBuffer), Some(handle));

    buffer.delete(&mut state);
    assert!(buffer.is_deleted());
    assert_eq!(buffer.handle(), GpuHandle::NONE);
    assert_eq!(state.current(BindCategory::ArrayBuffer), None);
    assert!(matches!(buffer.bind(&mut state), Err(Error::Deleted { .. })));
}

#[test]
fn broken_vertex_stage_reports_vertex_tag() {
    let Some(gpu) = gpu() else { return };

    let err = ShaderProgram::new(gpu.device(), "@vertex fn vs_main( -> {", FRAGMENT_SRC).unwrap_err();
    match &err {
        Error::Compilation { stage, log } => {
            assert_eq!(*stage, ShaderStage::Vertex);
            assert!(!log.is_empty());
        }
        other => panic!("expected a compilation error, got {other}"),
    }
    assert_eq!(err.stage_tag(), Some("VERTEX"));
}

#[test]
fn program_exposes_uniform_locations() {
    let Some(gpu) = gpu() else { return };
    let mut state = BindState::new();

    let program = ShaderProgram::new(gpu.device(), VERTEX_SRC, FRAGMENT_SRC).unwrap();
    assert!(!program.is_deleted());
    assert_eq!(
        program.uniform_location("cam_matrix"),
        Some(UniformLocation { group: 0, binding: 0 })
    );
    assert_eq!(
        program.uniform_location("tex0"),
        Some(UniformLocation { group: 0, binding: 1 })
    );
    assert_eq!(program.uniform_location("no_such_uniform"), None);

    let active = program.activate(&mut state).unwrap();
    assert_eq!(active.handle(), program.handle());
    assert_eq!(state.current(BindCategory::Program), Some(program.handle()));
}

#[test]
fn uniform_writes_require_the_active_program() {
    let Some(gpu) = gpu() else { return };
    let mut state = BindState::new();

    let mut first = ShaderProgram::new(gpu.device(), VERTEX_SRC, FRAGMENT_SRC).unwrap();
    let second = ShaderProgram::new(gpu.device(), VERTEX_SRC, FRAGMENT_SRC).unwrap();

    let stale = first.activate(&mut state).unwrap();
    let _active = second.activate(&mut state).unwrap();

    let err = first
        .set_uniform_mat4(&state, &stale, "cam_matrix", &Mat4::IDENTITY)
        .unwrap_err();
    assert!(matches!(err, Error::StaleBinding { .. }), "{err}");
}

#[test]
fn mistyped_uniform_write_is_rejected() {
    let Some(gpu) = gpu() else { return };
    let mut state = BindState::new();

    let mut program = ShaderProgram::new(gpu.device(), VERTEX_SRC, FRAGMENT_SRC).unwrap();
    let active = program.activate(&mut state).unwrap();

    let err = program
        .set_uniform_vec3(&state, &active, "cam_matrix", Vec3::ONE)
        .unwrap_err();
    assert!(matches!(err, Error::UniformType { .. }), "{err}");
}

#[test]
fn texture_upload_builds_mips_and_leaves_the_unit_empty() {
    let Some(gpu) = gpu() else { return };
    let mut state = BindState::new();

    let mut texture = Texture::from_image(
        gpu.device(),
        gpu.queue(),
        &mut state,
        checkerboard(),
        TextureKind::D2,
        3,
    )
    .unwrap();

    assert_eq!(texture.size(), (4, 4));
    assert_eq!(texture.mip_levels(), 3);
    assert_eq!(texture.unit(), 3);
    assert_eq!(state.current(BindCategory::TextureUnit(3)), None);

    let bound = texture.bind(&mut state).unwrap();
    assert_eq!(bound.handle(), texture.handle());
    assert_eq!(state.current(BindCategory::TextureUnit(3)), Some(texture.handle()));

    texture.delete(&mut state);
    assert!(texture.is_deleted());
    assert_eq!(state.current(BindCategory::TextureUnit(3)), None);
    assert!(matches!(texture.bind(&mut state), Err(Error::Deleted { .. })));
}

#[test]
fn texture_unit_out_of_range_is_rejected() {
    let Some(gpu) = gpu() else { return };
    let mut state = BindState::new();

    let err = Texture::from_image(
        gpu.device(),
        gpu.queue(),
        &mut state,
        checkerboard(),
        TextureKind::D2,
        kiln_engine::resource::MAX_TEXTURE_UNITS,
    )
    .unwrap_err();
    assert!(matches!(err, Error::Configuration(_)), "{err}");
}

#[test]
fn draw_without_a_texture_on_the_unit_fails() {
    let Some(gpu) = gpu() else { return };
    let (device, queue) = (gpu.device(), gpu.queue());
    let mut state = BindState::new();

    let mut program = ShaderProgram::new(device, VERTEX_SRC, FRAGMENT_SRC).unwrap();
    let quad = quad(device, &mut state);
    let (_color, view) = offscreen_target(device);

    let active = program.activate(&mut state).unwrap();
    let bound = quad.vertex_array.bind(&mut state).unwrap();

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
    let ctx = RenderCtx::new(device, queue, TARGET_FORMAT, (TARGET_SIZE, TARGET_SIZE));
    let mut target = RenderTarget::new(&mut encoder, &view);

    let mut renderer = FrameRenderer::default();
    let err = renderer
        .record_draw(&ctx, &mut target, &state, &mut program, &active, &quad.vertex_array, &bound)
        .unwrap_err();
    assert!(matches!(err, Error::EmptyTextureUnit { unit: 0 }), "{err}");
}

#[test]
fn offscreen_frame_draws_and_reuses_the_pipeline() {
    let Some(gpu) = gpu() else { return };
    let (device, queue) = (gpu.device(), gpu.queue());
    let mut state = BindState::new();

    let mut program = ShaderProgram::new(device, VERTEX_SRC, FRAGMENT_SRC).unwrap();
    let mut quad = quad(device, &mut state);
    let mut texture = Texture::from_image(
        device,
        queue,
        &mut state,
        checkerboard(),
        TextureKind::D2,
        0,
    )
    .unwrap();
    let active = program.activate(&mut state).unwrap();
    texture
        .texture_unit(&mut program, &state, &active, "tex0", 0)
        .unwrap();

    let mut camera = Camera::new(TARGET_SIZE, TARGET_SIZE, Vec3::new(0.0, 0.0, 2.0)).unwrap();
    let mut renderer = FrameRenderer::new(RenderConfig {
        projection: Projection::default(),
        ..RenderConfig::default()
    });
    let (_color, view) = offscreen_target(device);

    for _ in 0..2 {
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
        {
            let ctx = RenderCtx::new(device, queue, TARGET_FORMAT, (TARGET_SIZE, TARGET_SIZE));
            let mut target = RenderTarget::new(&mut encoder, &view);
            let scene = FrameScene {
                program: &mut program,
                texture: &texture,
                vertex_array: &quad.vertex_array,
                camera: &mut camera,
            };
            renderer
                .render_frame(&ctx, &mut target, &mut state, scene, &CameraInput::default(), 1.0 / 60.0)
                .unwrap();
        }
        queue.submit(std::iter::once(encoder.finish()));
    }
    assert_eq!(renderer.cached_pipelines(), 1);

    renderer.forget(quad.vertex_array.handle());
    assert_eq!(renderer.cached_pipelines(), 0);

    quad.vertex_array.delete(&mut state);
    quad.vertices.delete(&mut state);
    quad.indices.delete(&mut state);
    texture.delete(&mut state);
    program.delete(&mut state);
    assert!(program.is_deleted());
    assert_eq!(state.current(BindCategory::Program), None);
    assert_eq!(state.current(BindCategory::VertexArray), None);
}

const RED: [u8; 4] = [255, 0, 0, 255];
const GREEN: [u8; 4] = [0, 255, 0, 255];
const BLUE: [u8; 4] = [0, 0, 255, 255];
const WHITE: [u8; 4] = [255, 255, 255, 255];

#[test]
fn uploaded_checkerboard_keeps_the_flipped_corners() {
    let Some(gpu) = gpu() else { return };
    let (device, queue) = (gpu.device(), gpu.queue());
    let mut state = BindState::new();

    // As seen on screen: top row red | green, bottom row blue | white.
    let source = image::RgbaImage::from_fn(2, 2, |x, y| match (x, y) {
        (0, 0) => image::Rgba(RED),
        (1, 0) => image::Rgba(GREEN),
        (0, 1) => image::Rgba(BLUE),
        _ => image::Rgba(WHITE),
    });
    let path = std::env::temp_dir().join(format!("kiln-checker-{}.png", std::process::id()));
    source.save(&path).unwrap();

    let texture = Texture::from_file(
        device,
        queue,
        &mut state,
        &path,
        TextureKind::D2,
        0,
        PixelFormat::Rgba8,
    );
    let _ = std::fs::remove_file(&path);
    let mut texture = texture.unwrap();
    assert_eq!(texture.size(), (2, 2));

    // Row 0 holds v = 0, the bottom of the picture.
    let rows = read_level0(device, queue, texture.raw().unwrap());
    assert_eq!(rows[0][0], BLUE);
    assert_eq!(rows[1][1], GREEN);
    assert_eq!(rows[1][0], RED);
    assert_eq!(rows[0][1], WHITE);

    texture.delete(&mut state);
    assert!(texture.raw().is_none());
}

const TWO_TEXTURE_FRAGMENT_SRC: &str = r#"
@group(0) @binding(1) var tex_a: texture_2d<f32>;
@group(0) @binding(2) var tex_a_sampler: sampler;
@group(0) @binding(3) var tex_b: texture_2d<f32>;
@group(0) @binding(4) var tex_b_sampler: sampler;

@fragment
fn fs_main(@location(0) tex_coord: vec2<f32>) -> @location(0) vec4<f32> {
    let a = textureSample(tex_a, tex_a_sampler, tex_coord);
    let b = textureSample(tex_b, tex_b_sampler, tex_coord);
    return vec4<f32>(a.r, b.r, 0.0, 1.0);
}
"#;

#[test]
fn swapping_texture_units_changes_what_is_sampled() {
    let Some(gpu) = gpu() else { return };
    let (device, queue) = (gpu.device(), gpu.queue());
    let mut state = BindState::new();

    let mut program = ShaderProgram::new(device, VERTEX_SRC, TWO_TEXTURE_FRAGMENT_SRC).unwrap();
    let quad = quad(device, &mut state);
    let red = Texture::from_image(device, queue, &mut state, solid(RED), TextureKind::D2, 0).unwrap();
    let green = Texture::from_image(device, queue, &mut state, solid(GREEN), TextureKind::D2, 1).unwrap();
    red.bind(&mut state).unwrap();
    green.bind(&mut state).unwrap();

    let (color, view) = offscreen_target(device);
    let ctx = RenderCtx::new(device, queue, TARGET_FORMAT, (TARGET_SIZE, TARGET_SIZE));
    let mut renderer = FrameRenderer::default();
    let center = (TARGET_SIZE / 2) as usize;

    let mut draw = |program: &mut ShaderProgram, state: &mut BindState, units: (u32, u32)| {
        let active = program.activate(state).unwrap();
        program
            .set_uniform_mat4(state, &active, "cam_matrix", &Mat4::IDENTITY)
            .unwrap();
        program.set_texture_unit(state, &active, "tex_a", units.0).unwrap();
        program.set_texture_unit(state, &active, "tex_b", units.1).unwrap();
        let bound = quad.vertex_array.bind(state).unwrap();

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
        {
            let mut target = RenderTarget::new(&mut encoder, &view);
            renderer
                .record_draw(&ctx, &mut target, state, program, &active, &quad.vertex_array, &bound)
                .unwrap();
        }
        queue.submit(std::iter::once(encoder.finish()));
        read_level0(device, queue, &color)[center][center]
    };

    assert_eq!(draw(&mut program, &mut state, (0, 1)), [255, 0, 0, 255]);
    assert_eq!(draw(&mut program, &mut state, (1, 0)), [0, 255, 0, 255]);
}

#[test]
fn one_dimensional_texture_on_a_2d_binding_is_rejected() {
    let Some(gpu) = gpu() else { return };
    let (device, queue) = (gpu.device(), gpu.queue());
    let mut state = BindState::new();

    let mut program = ShaderProgram::new(device, VERTEX_SRC, FRAGMENT_SRC).unwrap();
    let quad = quad(device, &mut state);
    let row = TextureImage::from_raw(4, 1, PixelFormat::Rgba8, vec![128; 4 * 4]).unwrap();
    let texture = Texture::from_image(device, queue, &mut state, row, TextureKind::D1, 0).unwrap();
    assert_eq!(texture.kind(), TextureKind::D1);
    texture.bind(&mut state).unwrap();

    let active = program.activate(&mut state).unwrap();
    let bound = quad.vertex_array.bind(&mut state).unwrap();
    let (_color, view) = offscreen_target(device);
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
    let ctx = RenderCtx::new(device, queue, TARGET_FORMAT, (TARGET_SIZE, TARGET_SIZE));
    let mut target = RenderTarget::new(&mut encoder, &view);

    let err = FrameRenderer::default()
        .record_draw(&ctx, &mut target, &state, &mut program, &active, &quad.vertex_array, &bound)
        .unwrap_err();
    assert!(matches!(err, Error::Configuration(ref msg) if msg.contains("tex0")), "{err}");
}

#[test]
fn stride_past_the_device_limit_is_rejected_before_pipeline_creation() {
    let Some(gpu) = gpu() else { return };
    let (device, queue) = (gpu.device(), gpu.queue());
    let mut state = BindState::new();

    let stride = u64::from(device.limits().max_vertex_buffer_array_stride) + 4;
    let records = vec![0.0f32; (2 * stride / 4) as usize];

    let mut program = ShaderProgram::new(device, VERTEX_SRC, FRAGMENT_SRC).unwrap();
    let mut vertex_array = VertexArray::new();
    let _vao = vertex_array.bind(&mut state).unwrap();
    let vertices = BufferObject::from_slice(device, BufferTarget::Array, &records).unwrap();
    let indices = BufferObject::from_slice(device, BufferTarget::Element, &QUAD_INDICES).unwrap();
    let vbo = vertices.bind(&mut state).unwrap();
    let ebo = indices.bind(&mut state).unwrap();
    vertex_array
        .link_attribute(&state, &vbo, VertexLayoutSlot::new(0, 3, ComponentType::F32, stride, 0))
        .unwrap();
    vertex_array
        .link_attribute(&state, &vbo, VertexLayoutSlot::new(1, 2, ComponentType::F32, stride, 12))
        .unwrap();
    vertex_array
        .link_elements(&state, &ebo, wgpu::IndexFormat::Uint16)
        .unwrap();

    let texture = Texture::from_image(device, queue, &mut state, checkerboard(), TextureKind::D2, 0).unwrap();
    texture.bind(&mut state).unwrap();
    let active = program.activate(&mut state).unwrap();
    let bound = vertex_array.bind(&mut state).unwrap();

    let (_color, view) = offscreen_target(device);
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
    let ctx = RenderCtx::new(device, queue, TARGET_FORMAT, (TARGET_SIZE, TARGET_SIZE));
    let mut target = RenderTarget::new(&mut encoder, &view);

    let mut renderer = FrameRenderer::default();
    let err = renderer
        .record_draw(&ctx, &mut target, &state, &mut program, &active, &vertex_array, &bound)
        .unwrap_err();
    assert!(matches!(err, Error::Configuration(ref msg) if msg.contains("stride")), "{err}");
    assert_eq!(renderer.cached_pipelines(), 0);
}
