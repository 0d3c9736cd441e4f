//! Explicit "current binding" state.
//!
//! GL-style APIs keep one current object per category in hidden global state and
//! every bind silently replaces the previous one. Here that state lives in a
//! `BindState` value owned by the caller. Each bind returns a ticket carrying a
//! generation number; operations that depend on a binding check the ticket and
//! reject it once another object of the same category has been bound.

use std::fmt;

use super::error::{Error, Result};
use super::handle::GpuHandle;

/// Number of texture units a `BindState` tracks.
pub const MAX_TEXTURE_UNITS: u32 = 16;

/// Category of current-object state.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BindCategory {
    /// Vertex data buffers.
    ArrayBuffer,
    /// Index data buffers.
    ElementBuffer,
    VertexArray,
    Program,
    TextureUnit(u32),
}

impl fmt::Display for BindCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindCategory::ArrayBuffer => f.write_str("array buffer"),
            BindCategory::ElementBuffer => f.write_str("element buffer"),
            BindCategory::VertexArray => f.write_str("vertex array"),
            BindCategory::Program => f.write_str("program"),
            BindCategory::TextureUnit(unit) => write!(f, "texture unit {unit}"),
        }
    }
}

/// Proof that `handle` was made current in `category` at `generation`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) struct Ticket {
    pub(crate) category: BindCategory,
    pub(crate) handle: GpuHandle,
    generation: u64,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
struct Slot {
    handle: GpuHandle,
    generation: u64,
}

/// Sampling resources published by the texture bound to a unit.
#[derive(Debug, Clone)]
pub(crate) struct UnitResources {
    pub(crate) view: wgpu::TextureView,
    pub(crate) sampler: wgpu::Sampler,
    pub(crate) dimension: wgpu::TextureViewDimension,
    pub(crate) format: wgpu::TextureFormat,
}

/// Current objects per category, owned by the thread that owns the device.
#[derive(Debug)]
pub struct BindState {
    generation: u64,
    array_buffer: Option<Slot>,
    element_buffer: Option<Slot>,
    vertex_array: Option<Slot>,
    program: Option<Slot>,
    units: [Option<Slot>; MAX_TEXTURE_UNITS as usize],
    unit_resources: Vec<Option<UnitResources>>,
}

impl Default for BindState {
    fn default() -> Self {
        Self::new()
    }
}

impl BindState {
    pub fn new() -> Self {
        Self {
            generation: 0,
            array_buffer: None,
            element_buffer: None,
            vertex_array: None,
            program: None,
            units: [None; MAX_TEXTURE_UNITS as usize],
            unit_resources: vec![None; MAX_TEXTURE_UNITS as usize],
        }
    }

    /// Returns the handle currently bound in `category`, if any.
    pub fn current(&self, category: BindCategory) -> Option<GpuHandle> {
        self.slot(category).and_then(|s| *s).map(|s| s.handle)
    }

    pub(crate) fn bind(&mut self, category: BindCategory, handle: GpuHandle) -> Result<Ticket> {
        debug_assert!(!handle.is_none(), "binding the none handle");
        self.generation += 1;
        let generation = self.generation;
        let slot = self.slot_mut(category)?;
        *slot = Some(Slot { handle, generation });
        Ok(Ticket {
            category,
            handle,
            generation,
        })
    }

    pub(crate) fn unbind(&mut self, category: BindCategory) {
        if let Ok(slot) = self.slot_mut(category) {
            *slot = None;
        }
        if let BindCategory::TextureUnit(unit) = category {
            if let Some(res) = self.unit_resources.get_mut(unit as usize) {
                *res = None;
            }
        }
    }

    /// Clears every category in which `handle` is current (deletion unbinds).
    pub(crate) fn release(&mut self, handle: GpuHandle) {
        let mut cleared = Vec::new();
        for category in Self::categories() {
            if self.current(category) == Some(handle) {
                cleared.push(category);
            }
        }
        for category in cleared {
            self.unbind(category);
        }
    }

    /// Fails unless `ticket` still describes the current binding of its category.
    pub(crate) fn check(&self, ticket: &Ticket) -> Result<()> {
        let current = self.slot(ticket.category).and_then(|s| *s);
        match current {
            Some(slot) if slot.handle == ticket.handle && slot.generation == ticket.generation => {
                Ok(())
            }
            _ => Err(Error::StaleBinding {
                category: ticket.category,
                handle: ticket.handle,
            }),
        }
    }

    /// Fails unless `handle` is the current object of `category`.
    pub(crate) fn require_current(&self, category: BindCategory, handle: GpuHandle) -> Result<()> {
        if self.current(category) == Some(handle) {
            Ok(())
        } else {
            Err(Error::NotCurrent { category, handle })
        }
    }

    pub(crate) fn bind_unit(
        &mut self,
        unit: u32,
        handle: GpuHandle,
        resources: UnitResources,
    ) -> Result<Ticket> {
        let ticket = self.bind(BindCategory::TextureUnit(unit), handle)?;
        self.unit_resources[unit as usize] = Some(resources);
        Ok(ticket)
    }

    pub(crate) fn unit_resources(&self, unit: u32) -> Option<&UnitResources> {
        self.unit_resources.get(unit as usize).and_then(Option::as_ref)
    }

    fn categories() -> impl Iterator<Item = BindCategory> {
        [
            BindCategory::ArrayBuffer,
            BindCategory::ElementBuffer,
            BindCategory::VertexArray,
            BindCategory::Program,
        ]
        .into_iter()
        .chain((0..MAX_TEXTURE_UNITS).map(BindCategory::TextureUnit))
    }

    fn slot(&self, category: BindCategory) -> Option<&Option<Slot>> {
        match category {
            BindCategory::ArrayBuffer => Some(&self.array_buffer),
            BindCategory::ElementBuffer => Some(&self.element_buffer),
            BindCategory::VertexArray => Some(&self.vertex_array),
            BindCategory::Program => Some(&self.program),
            BindCategory::TextureUnit(unit) => self.units.get(unit as usize),
        }
    }

    fn slot_mut(&mut self, category: BindCategory) -> Result<&mut Option<Slot>> {
        match category {
            BindCategory::ArrayBuffer => Ok(&mut self.array_buffer),
            BindCategory::ElementBuffer => Ok(&mut self.element_buffer),
            BindCategory::VertexArray => Ok(&mut self.vertex_array),
            BindCategory::Program => Ok(&mut self.program),
            BindCategory::TextureUnit(unit) => self.units.get_mut(unit as usize).ok_or_else(|| {
                Error::config(format!(
                    "texture unit {unit} out of range (max {})",
                    MAX_TEXTURE_UNITS - 1
                ))
            }),
        }
    }
}

/// Validates a texture unit index against `MAX_TEXTURE_UNITS`.
pub(crate) fn check_unit(unit: u32) -> Result<()> {
    if unit < MAX_TEXTURE_UNITS {
        Ok(())
    } else {
        Err(Error::config(format!(
            "texture unit {unit} out of range (max {})",
            MAX_TEXTURE_UNITS - 1
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rebinding_a_category_makes_previous_ticket_stale() {
        let mut state = BindState::new();
        let a = GpuHandle::allocate();
        let b = GpuHandle::allocate();

        let ta = state.bind(BindCategory::ArrayBuffer, a).unwrap();
        assert!(state.check(&ta).is_ok());

        let tb = state.bind(BindCategory::ArrayBuffer, b).unwrap();
        assert!(state.check(&tb).is_ok());

        let err = state.check(&ta).unwrap_err();
        assert!(matches!(
            err,
            Error::StaleBinding { category: BindCategory::ArrayBuffer, handle } if handle == a
        ));
    }

    #[test]
    fn rebinding_same_object_still_invalidates_old_ticket() {
        let mut state = BindState::new();
        let a = GpuHandle::allocate();
        let first = state.bind(BindCategory::Program, a).unwrap();
        let second = state.bind(BindCategory::Program, a).unwrap();
        assert!(state.check(&first).is_err());
        assert!(state.check(&second).is_ok());
    }

    #[test]
    fn categories_are_independent() {
        let mut state = BindState::new();
        let vbo = GpuHandle::allocate();
        let ebo = GpuHandle::allocate();

        let tv = state.bind(BindCategory::ArrayBuffer, vbo).unwrap();
        let te = state.bind(BindCategory::ElementBuffer, ebo).unwrap();

        assert!(state.check(&tv).is_ok());
        assert!(state.check(&te).is_ok());
        assert_eq!(state.current(BindCategory::ArrayBuffer), Some(vbo));
        assert_eq!(state.current(BindCategory::ElementBuffer), Some(ebo));
    }

    #[test]
    fn unbind_invalidates_ticket() {
        let mut state = BindState::new();
        let vao = GpuHandle::allocate();
        let t = state.bind(BindCategory::VertexArray, vao).unwrap();
        state.unbind(BindCategory::VertexArray);
        assert_eq!(state.current(BindCategory::VertexArray), None);
        assert!(state.check(&t).is_err());
    }

    #[test]
    fn release_clears_every_category_holding_the_handle() {
        let mut state = BindState::new();
        let tex = GpuHandle::allocate();
        state.bind(BindCategory::TextureUnit(0), tex).unwrap();
        state.bind(BindCategory::TextureUnit(3), tex).unwrap();
        state.release(tex);
        assert_eq!(state.current(BindCategory::TextureUnit(0)), None);
        assert_eq!(state.current(BindCategory::TextureUnit(3)), None);
    }

    #[test]
    fn require_current_reports_category() {
        let mut state = BindState::new();
        let vao = GpuHandle::allocate();
        let err = state.require_current(BindCategory::VertexArray, vao).unwrap_err();
        assert!(matches!(err, Error::NotCurrent { category: BindCategory::VertexArray, .. }));

        state.bind(BindCategory::VertexArray, vao).unwrap();
        assert!(state.require_current(BindCategory::VertexArray, vao).is_ok());
    }

    #[test]
    fn texture_unit_out_of_range_is_rejected() {
        let mut state = BindState::new();
        let tex = GpuHandle::allocate();
        let err = state
            .bind(BindCategory::TextureUnit(MAX_TEXTURE_UNITS), tex)
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(check_unit(MAX_TEXTURE_UNITS - 1).is_ok());
    }
}
