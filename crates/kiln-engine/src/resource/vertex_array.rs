use std::collections::BTreeMap;

use super::binding::{BindCategory, BindState, Ticket};
use super::buffer::{BoundBuffer, BufferTarget};
use super::error::{Error, Result};
use super::handle::GpuHandle;

/// Highest attribute index + 1 accepted by `link_attribute`.
pub const MAX_VERTEX_ATTRIBUTES: u32 = 16;

// wgpu requires strides and 32-bit attribute offsets to be 4-byte aligned.
const VERTEX_ALIGNMENT: u64 = 4;

/// Scalar type of one attribute component.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ComponentType {
    F32,
    U32,
    I32,
    /// Unsigned byte normalized to `[0, 1]`; read as float in the shader.
    U8Norm,
}

/// Numeric class a shader sees for a vertex input.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum NumericKind {
    Float,
    Uint,
    Sint,
}

impl ComponentType {
    pub const fn size(self) -> u64 {
        match self {
            ComponentType::F32 | ComponentType::U32 | ComponentType::I32 => 4,
            ComponentType::U8Norm => 1,
        }
    }

    pub const fn kind(self) -> NumericKind {
        match self {
            ComponentType::F32 | ComponentType::U8Norm => NumericKind::Float,
            ComponentType::U32 => NumericKind::Uint,
            ComponentType::I32 => NumericKind::Sint,
        }
    }

    fn vertex_format(self, components: u32) -> Option<wgpu::VertexFormat> {
        use wgpu::VertexFormat as F;
        let format = match (self, components) {
            (ComponentType::F32, 1) => F::Float32,
            (ComponentType::F32, 2) => F::Float32x2,
            (ComponentType::F32, 3) => F::Float32x3,
            (ComponentType::F32, 4) => F::Float32x4,
            (ComponentType::U32, 1) => F::Uint32,
            (ComponentType::U32, 2) => F::Uint32x2,
            (ComponentType::U32, 3) => F::Uint32x3,
            (ComponentType::U32, 4) => F::Uint32x4,
            (ComponentType::I32, 1) => F::Sint32,
            (ComponentType::I32, 2) => F::Sint32x2,
            (ComponentType::I32, 3) => F::Sint32x3,
            (ComponentType::I32, 4) => F::Sint32x4,
            (ComponentType::U8Norm, 2) => F::Unorm8x2,
            (ComponentType::U8Norm, 4) => F::Unorm8x4,
            _ => return None,
        };
        Some(format)
    }
}

/// Describes how one attribute index reads from the bound vertex buffer.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct VertexLayoutSlot {
    pub index: u32,
    /// Components per vertex, 1 to 4.
    pub components: u32,
    pub ty: ComponentType,
    /// Bytes between consecutive records; 0 means tightly packed.
    pub stride: u64,
    /// Byte offset of the first component within a record.
    pub offset: u64,
}

impl VertexLayoutSlot {
    pub const fn new(index: u32, components: u32, ty: ComponentType, stride: u64, offset: u64) -> Self {
        Self {
            index,
            components,
            ty,
            stride,
            offset,
        }
    }

    /// Size of the attribute within one record.
    pub const fn attribute_size(&self) -> u64 {
        self.components as u64 * self.ty.size()
    }

    pub const fn effective_stride(&self) -> u64 {
        if self.stride == 0 {
            self.attribute_size()
        } else {
            self.stride
        }
    }

    pub(crate) fn validate(&self) -> Result<wgpu::VertexFormat> {
        if self.index >= MAX_VERTEX_ATTRIBUTES {
            return Err(Error::config(format!(
                "attribute index {} out of range (max {})",
                self.index,
                MAX_VERTEX_ATTRIBUTES - 1
            )));
        }
        if !(1..=4).contains(&self.components) {
            return Err(Error::config(format!(
                "attribute {}: component count {} is not in 1..=4",
                self.index, self.components
            )));
        }
        let format = self.ty.vertex_format(self.components).ok_or_else(|| {
            Error::config(format!(
                "attribute {}: {} x {:?} is not a fetchable vertex format",
                self.index, self.components, self.ty
            ))
        })?;

        let stride = self.effective_stride();
        if self.offset + self.attribute_size() > stride {
            return Err(Error::config(format!(
                "attribute {}: offset {} + size {} exceeds stride {}",
                self.index,
                self.offset,
                self.attribute_size(),
                stride
            )));
        }
        if stride % VERTEX_ALIGNMENT != 0 {
            return Err(Error::config(format!(
                "attribute {}: stride {stride} is not a multiple of {VERTEX_ALIGNMENT}",
                self.index
            )));
        }
        let align = self.ty.size().min(VERTEX_ALIGNMENT);
        if self.offset % align != 0 {
            return Err(Error::config(format!(
                "attribute {}: offset {} is not aligned to {align}",
                self.index, self.offset
            )));
        }
        Ok(format)
    }
}

/// Vertex input declared by a shader's entry point.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct VertexInput {
    pub location: u32,
    pub kind: NumericKind,
    pub components: u32,
}

#[derive(Debug, Clone)]
struct LinkedAttribute {
    slot: VertexLayoutSlot,
    format: wgpu::VertexFormat,
    buffer: GpuHandle,
    raw: wgpu::Buffer,
}

#[derive(Debug, Clone)]
struct LinkedElements {
    buffer: GpuHandle,
    raw: wgpu::Buffer,
    format: wgpu::IndexFormat,
    count: u32,
}

/// One vertex buffer slot of a draw: the buffer and how attributes read it.
#[derive(Debug, Clone)]
pub(crate) struct VertexStream {
    pub(crate) raw: wgpu::Buffer,
    pub(crate) stride: u64,
    pub(crate) attributes: Vec<wgpu::VertexAttribute>,
}

impl VertexStream {
    pub(crate) fn layout(&self) -> wgpu::VertexBufferLayout<'_> {
        wgpu::VertexBufferLayout {
            array_stride: self.stride,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &self.attributes,
        }
    }
}

/// Index buffer and count captured by `link_elements`.
#[derive(Debug, Clone)]
pub(crate) struct IndexStream {
    pub(crate) raw: wgpu::Buffer,
    pub(crate) format: wgpu::IndexFormat,
    pub(crate) count: u32,
}

/// Token returned by [`VertexArray::bind`].
#[derive(Debug)]
pub struct BoundVertexArray {
    pub(crate) ticket: Ticket,
}

impl BoundVertexArray {
    pub fn handle(&self) -> GpuHandle {
        self.ticket.handle
    }
}

/// Records which buffers feed which attribute indices, and the element buffer
/// used for indexed draws.
///
/// The GPU objects themselves are owned by their `BufferObject`s; a vertex
/// array only keeps reference-counted clones so a draw can still address them.
#[derive(Debug)]
pub struct VertexArray {
    handle: GpuHandle,
    attributes: BTreeMap<u32, LinkedAttribute>,
    elements: Option<LinkedElements>,
    revision: u64,
}

impl Default for VertexArray {
    fn default() -> Self {
        Self::new()
    }
}

impl VertexArray {
    pub fn new() -> Self {
        let handle = GpuHandle::allocate();
        log::debug!("created vertex array {handle}");
        Self {
            handle,
            attributes: BTreeMap::new(),
            elements: None,
            revision: 0,
        }
    }

    pub fn bind(&self, state: &mut BindState) -> Result<BoundVertexArray> {
        self.ensure_live()?;
        let ticket = state.bind(BindCategory::VertexArray, self.handle)?;
        Ok(BoundVertexArray { ticket })
    }

    pub fn unbind(&self, state: &mut BindState) {
        state.unbind(BindCategory::VertexArray);
    }

    /// Forgets every recorded attribute and releases the handle.
    pub fn delete(&mut self, state: &mut BindState) {
        if self.handle.is_none() {
            return;
        }
        state.release(self.handle);
        log::debug!("deleted vertex array {}", self.handle);
        self.handle = GpuHandle::NONE;
        self.attributes.clear();
        self.elements = None;
        self.revision += 1;
    }

    /// Enables attribute `slot.index` and records that it reads from `buffer`.
    ///
    /// This vertex array must be current and `buffer` must be the current
    /// array buffer. Linking an index again replaces the previous record.
    pub fn link_attribute(
        &mut self,
        state: &BindState,
        buffer: &BoundBuffer,
        slot: VertexLayoutSlot,
    ) -> Result<()> {
        self.ensure_live()?;
        state.require_current(BindCategory::VertexArray, self.handle)?;
        expect_target(buffer, BufferTarget::Array)?;
        state.check(&buffer.ticket)?;

        let format = slot.validate()?;
        if slot.offset + slot.attribute_size() > buffer.len {
            return Err(Error::config(format!(
                "attribute {}: offset {} + size {} exceeds buffer length {}",
                slot.index,
                slot.offset,
                slot.attribute_size(),
                buffer.len
            )));
        }

        let previous = self.attributes.insert(
            slot.index,
            LinkedAttribute {
                slot,
                format,
                buffer: buffer.handle(),
                raw: buffer.raw.clone(),
            },
        );
        if previous.is_some() {
            log::debug!("vertex array {}: attribute {} relinked", self.handle, slot.index);
        }
        self.revision += 1;
        Ok(())
    }

    /// Captures the current element buffer for indexed draws.
    pub fn link_elements(
        &mut self,
        state: &BindState,
        buffer: &BoundBuffer,
        format: wgpu::IndexFormat,
    ) -> Result<()> {
        self.ensure_live()?;
        state.require_current(BindCategory::VertexArray, self.handle)?;
        expect_target(buffer, BufferTarget::Element)?;
        state.check(&buffer.ticket)?;

        let index_size = match format {
            wgpu::IndexFormat::Uint16 => 2,
            wgpu::IndexFormat::Uint32 => 4,
        };
        if buffer.len % index_size != 0 {
            return Err(Error::config(format!(
                "element buffer length {} is not a multiple of {index_size}",
                buffer.len
            )));
        }
        let count = u32::try_from(buffer.len / index_size)
            .map_err(|_| Error::config("element buffer holds more than u32::MAX indices"))?;

        self.elements = Some(LinkedElements {
            buffer: buffer.handle(),
            raw: buffer.raw.clone(),
            format,
            count,
        });
        self.revision += 1;
        Ok(())
    }

    pub fn handle(&self) -> GpuHandle {
        self.handle
    }

    /// Attribute indices currently enabled, ascending.
    pub fn enabled_attributes(&self) -> impl Iterator<Item = u32> + '_ {
        self.attributes.keys().copied()
    }

    pub fn slot(&self, index: u32) -> Option<VertexLayoutSlot> {
        self.attributes.get(&index).map(|a| a.slot)
    }

    /// Number of indices in the linked element buffer, 0 if none.
    pub fn index_count(&self) -> u32 {
        self.elements.as_ref().map_or(0, |e| e.count)
    }

    pub fn element_buffer(&self) -> Option<GpuHandle> {
        self.elements.as_ref().map(|e| e.buffer)
    }

    /// Bumped on every layout change; part of the pipeline cache key.
    pub(crate) fn revision(&self) -> u64 {
        self.revision
    }

    /// Groups attributes by (buffer, stride) into vertex buffer slots.
    pub(crate) fn streams(&self) -> Vec<VertexStream> {
        let mut groups: BTreeMap<(GpuHandle, u64), VertexStream> = BTreeMap::new();
        for (index, attr) in &self.attributes {
            let stride = attr.slot.effective_stride();
            groups
                .entry((attr.buffer, stride))
                .or_insert_with(|| VertexStream {
                    raw: attr.raw.clone(),
                    stride,
                    attributes: Vec::new(),
                })
                .attributes
                .push(wgpu::VertexAttribute {
                    format: attr.format,
                    offset: attr.slot.offset,
                    shader_location: *index,
                });
        }
        groups.into_values().collect()
    }

    pub(crate) fn index_stream(&self) -> Result<IndexStream> {
        let elements = self.elements.as_ref().ok_or_else(|| {
            Error::config(format!("vertex array {} has no element buffer linked", self.handle))
        })?;
        Ok(IndexStream {
            raw: elements.raw.clone(),
            format: elements.format,
            count: elements.count,
        })
    }

    /// Compares the linked slots with a program's vertex inputs.
    ///
    /// A missing slot or a numeric kind mismatch cannot be drawn and is an
    /// error. Component count mismatches and slots the program ignores are
    /// only reported in debug builds.
    pub(crate) fn check_inputs(&self, inputs: &[VertexInput]) -> Result<()> {
        check_layout(
            self.handle,
            self.attributes.values().map(|a| a.slot),
            inputs,
        )
    }

    fn ensure_live(&self) -> Result<()> {
        if self.handle.is_none() {
            Err(Error::Deleted { what: "vertex array" })
        } else {
            Ok(())
        }
    }
}

fn expect_target(buffer: &BoundBuffer, expected: BufferTarget) -> Result<()> {
    if buffer.target == expected {
        Ok(())
    } else {
        Err(Error::WrongTarget {
            handle: buffer.handle(),
            expected: expected.category(),
            actual: buffer.target.category(),
        })
    }
}

fn check_layout(
    handle: GpuHandle,
    slots: impl Iterator<Item = VertexLayoutSlot>,
    inputs: &[VertexInput],
) -> Result<()> {
    let slots: BTreeMap<u32, VertexLayoutSlot> = slots.map(|s| (s.index, s)).collect();

    for input in inputs {
        let Some(slot) = slots.get(&input.location) else {
            return Err(Error::config(format!(
                "vertex array {handle}: shader reads location {} but no attribute is linked there",
                input.location
            )));
        };
        if slot.ty.kind() != input.kind {
            return Err(Error::config(format!(
                "vertex array {handle}: location {} is {:?} in the shader but {:?} in the layout",
                input.location,
                input.kind,
                slot.ty.kind()
            )));
        }
        if cfg!(debug_assertions) && slot.components != input.components {
            log::warn!(
                "vertex array {handle}: location {} has {} components, shader expects {}",
                input.location,
                slot.components,
                input.components
            );
        }
    }

    if cfg!(debug_assertions) {
        for index in slots.keys() {
            if !inputs.iter().any(|i| i.location == *index) {
                log::warn!("vertex array {handle}: attribute {index} is not read by the shader");
            }
        }
    }
    Ok(())
}
