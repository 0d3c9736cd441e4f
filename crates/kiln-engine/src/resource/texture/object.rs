use std::path::Path;

use super::pixels::{PixelFormat, TextureImage};
use crate::resource::binding::{check_unit, BindCategory, BindState, Ticket, UnitResources};
use crate::resource::error::{Error, Result};
use crate::resource::handle::GpuHandle;
use crate::resource::shader::{ActiveProgram, ShaderProgram};

/// Dimensionality of a texture.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TextureKind {
    /// One row of texels; the image must be 1 pixel tall and gets no mips.
    D1,
    D2,
}

impl TextureKind {
    fn dimension(self) -> wgpu::TextureDimension {
        match self {
            TextureKind::D1 => wgpu::TextureDimension::D1,
            TextureKind::D2 => wgpu::TextureDimension::D2,
        }
    }

    fn view_dimension(self) -> wgpu::TextureViewDimension {
        match self {
            TextureKind::D1 => wgpu::TextureViewDimension::D1,
            TextureKind::D2 => wgpu::TextureViewDimension::D2,
        }
    }
}

#[derive(Debug)]
struct TextureObjects {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

/// Token returned by [`Texture::bind`].
#[derive(Debug)]
pub struct BoundTexture {
    pub(crate) ticket: Ticket,
}

impl BoundTexture {
    pub fn handle(&self) -> GpuHandle {
        self.ticket.handle
    }
}

/// Image texture sampled with nearest filtering and repeat wrapping.
///
/// A texture remembers the texture unit it was created for; `bind` makes it
/// the current texture of that unit.
#[derive(Debug)]
pub struct Texture {
    handle: GpuHandle,
    kind: TextureKind,
    unit: u32,
    format: PixelFormat,
    width: u32,
    height: u32,
    mip_levels: u32,
    objects: Option<TextureObjects>,
}

impl Texture {
    /// Decodes `path` and uploads it with a full mip chain.
    pub fn from_file(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        state: &mut BindState,
        path: impl AsRef<Path>,
        kind: TextureKind,
        unit: u32,
        format: PixelFormat,
    ) -> Result<Self> {
        let image = TextureImage::load(path, format)?;
        Self::from_image(device, queue, state, image, kind, unit)
    }

    /// Uploads an already decoded image. The pixels are dropped once uploaded.
    pub fn from_image(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        state: &mut BindState,
        image: TextureImage,
        kind: TextureKind,
        unit: u32,
    ) -> Result<Self> {
        check_unit(unit)?;

        let (width, height) = (image.width(), image.height());
        let limits = device.limits();
        let max = match kind {
            TextureKind::D1 => limits.max_texture_dimension_1d,
            TextureKind::D2 => limits.max_texture_dimension_2d,
        };
        if width > max || height > max {
            return Err(Error::ResourceCreation {
                what: "texture",
                reason: format!("{width}x{height} exceeds device limit of {max}"),
            });
        }
        let mip_levels = match kind {
            TextureKind::D1 if height != 1 => {
                return Err(Error::config(format!(
                    "1D texture must be 1 texel tall, image is {width}x{height}"
                )));
            }
            TextureKind::D1 => 1,
            TextureKind::D2 => image.full_mip_count(),
        };

        let format = image.format();
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("kiln texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: mip_levels,
            sample_count: 1,
            dimension: kind.dimension(),
            format: format.wgpu_format(),
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("kiln texture view"),
            dimension: Some(kind.view_dimension()),
            ..Default::default()
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("kiln texture sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        let mips = image.mip_chain(mip_levels)?;
        let handle = GpuHandle::allocate();

        // Upload goes through the unit like any other texture operation, and
        // leaves it empty afterwards.
        state.bind_unit(
            unit,
            handle,
            UnitResources {
                view: view.clone(),
                sampler: sampler.clone(),
                dimension: kind.view_dimension(),
                format: format.wgpu_format(),
            },
        )?;
        write_level(queue, &texture, 0, &image);
        for (level, mip) in (1..).zip(&mips) {
            write_level(queue, &texture, level, mip);
        }
        state.unbind(BindCategory::TextureUnit(unit));
        drop(mips);
        drop(image);

        log::debug!(
            "created texture {handle} ({width}x{height} {format:?}, {mip_levels} mips, unit {unit})"
        );

        Ok(Self {
            handle,
            kind,
            unit,
            format,
            width,
            height,
            mip_levels,
            objects: Some(TextureObjects {
                texture,
                view,
                sampler,
            }),
        })
    }

    /// Points the program's texture binding `uniform_name` at `unit`.
    pub fn texture_unit(
        &self,
        program: &mut ShaderProgram,
        state: &BindState,
        active: &ActiveProgram,
        uniform_name: &str,
        unit: u32,
    ) -> Result<()> {
        self.objects()?;
        program.set_texture_unit(state, active, uniform_name, unit)
    }

    /// Makes this texture the current texture of its unit.
    pub fn bind(&self, state: &mut BindState) -> Result<BoundTexture> {
        let objects = self.objects()?;
        let ticket = state.bind_unit(
            self.unit,
            self.handle,
            UnitResources {
                view: objects.view.clone(),
                sampler: objects.sampler.clone(),
                dimension: self.kind.view_dimension(),
                format: self.format.wgpu_format(),
            },
        )?;
        Ok(BoundTexture { ticket })
    }

    pub fn unbind(&self, state: &mut BindState) {
        state.unbind(BindCategory::TextureUnit(self.unit));
    }

    /// Releases the texture and clears its unit if it was current there.
    pub fn delete(&mut self, state: &mut BindState) {
        if self.objects.take().is_some() {
            state.release(self.handle);
            log::debug!("deleted texture {}", self.handle);
            self.handle = GpuHandle::NONE;
        }
    }

    pub fn handle(&self) -> GpuHandle {
        self.handle
    }

    pub fn unit(&self) -> u32 {
        self.unit
    }

    pub fn kind(&self) -> TextureKind {
        self.kind
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    pub fn is_deleted(&self) -> bool {
        self.objects.is_none()
    }

    /// Underlying wgpu texture, for copies.
    pub fn raw(&self) -> Option<&wgpu::Texture> {
        self.objects.as_ref().map(|o| &o.texture)
    }

    fn objects(&self) -> Result<&TextureObjects> {
        self.objects.as_ref().ok_or(Error::Deleted { what: "texture" })
    }
}

fn write_level(queue: &wgpu::Queue, texture: &wgpu::Texture, mip_level: u32, image: &TextureImage) {
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        image.pixels(),
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(image.width() * image.channels()),
            rows_per_image: Some(image.height()),
        },
        wgpu::Extent3d {
            width: image.width(),
            height: image.height(),
            depth_or_array_layers: 1,
        },
    );
}
