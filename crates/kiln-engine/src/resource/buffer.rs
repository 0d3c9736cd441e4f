use bytemuck::Pod;
use wgpu::util::DeviceExt;

use super::binding::{BindCategory, BindState, Ticket};
use super::error::{Error, Result};
use super::handle::GpuHandle;

/// Which binding point a buffer serves.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BufferTarget {
    /// Per-vertex attribute data.
    Array,
    /// Index data for indexed draws.
    Element,
}

impl BufferTarget {
    pub const fn category(self) -> BindCategory {
        match self {
            BufferTarget::Array => BindCategory::ArrayBuffer,
            BufferTarget::Element => BindCategory::ElementBuffer,
        }
    }

    // Static usage: written once at creation, never a copy destination.
    fn usage(self) -> wgpu::BufferUsages {
        match self {
            BufferTarget::Array => wgpu::BufferUsages::VERTEX,
            BufferTarget::Element => wgpu::BufferUsages::INDEX,
        }
    }

    fn label(self) -> &'static str {
        match self {
            BufferTarget::Array => "kiln vertex buffer",
            BufferTarget::Element => "kiln element buffer",
        }
    }
}

/// GPU buffer holding vertex or index data, uploaded once at construction.
///
/// There is no resize or partial update. `delete()` moves the wrapper into a
/// terminal state in which `bind()` fails; dropping the wrapper releases the
/// GPU allocation on every path.
#[derive(Debug)]
pub struct BufferObject {
    handle: GpuHandle,
    target: BufferTarget,
    len: u64,
    raw: Option<wgpu::Buffer>,
}

/// Token returned by [`BufferObject::bind`].
///
/// Only valid while its buffer stays the current buffer of its category.
#[derive(Debug)]
pub struct BoundBuffer {
    pub(crate) ticket: Ticket,
    pub(crate) target: BufferTarget,
    pub(crate) raw: wgpu::Buffer,
    pub(crate) len: u64,
}

impl BoundBuffer {
    pub fn handle(&self) -> GpuHandle {
        self.ticket.handle
    }

    pub fn target(&self) -> BufferTarget {
        self.target
    }
}

impl BufferObject {
    /// Allocates a buffer for `target` and uploads `data` immediately.
    pub fn new(device: &wgpu::Device, target: BufferTarget, data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::config("buffer data is empty"));
        }

        let len = data.len() as u64;
        let max = device.limits().max_buffer_size;
        if len > max {
            return Err(Error::ResourceCreation {
                what: target.label(),
                reason: format!("{len} bytes exceeds device limit of {max} bytes"),
            });
        }

        let raw = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(target.label()),
            contents: data,
            usage: target.usage(),
        });

        let handle = GpuHandle::allocate();
        log::debug!("created {} {handle} ({len} bytes)", target.label());

        Ok(Self {
            handle,
            target,
            len,
            raw: Some(raw),
        })
    }

    /// Convenience over [`new`](Self::new) for typed slices.
    pub fn from_slice<T: Pod>(device: &wgpu::Device, target: BufferTarget, data: &[T]) -> Result<Self> {
        Self::new(device, target, bytemuck::cast_slice(data))
    }

    /// Makes this buffer the current buffer of its category.
    pub fn bind(&self, state: &mut BindState) -> Result<BoundBuffer> {
        let raw = self.raw.as_ref().ok_or(Error::Deleted {
            what: self.target.label(),
        })?;
        let ticket = state.bind(self.target.category(), self.handle)?;
        Ok(BoundBuffer {
            ticket,
            target: self.target,
            raw: raw.clone(),
            len: self.len,
        })
    }

    /// Clears the current buffer of this buffer's category.
    pub fn unbind(&self, state: &mut BindState) {
        state.unbind(self.target.category());
    }

    /// Releases the handle. Further `bind()` calls fail with `Error::Deleted`.
    ///
    /// Vertex arrays that captured this buffer keep their own reference to the
    /// allocation until they are deleted themselves.
    pub fn delete(&mut self, state: &mut BindState) {
        if self.raw.take().is_some() {
            state.release(self.handle);
            log::debug!("deleted {} {}", self.target.label(), self.handle);
            self.handle = GpuHandle::NONE;
        }
    }

    /// Current handle, or `GpuHandle::NONE` after deletion.
    pub fn handle(&self) -> GpuHandle {
        self.handle
    }

    pub fn target(&self) -> BufferTarget {
        self.target
    }

    /// Size of the uploaded data in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_deleted(&self) -> bool {
        self.raw.is_none()
    }
}
