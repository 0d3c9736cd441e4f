use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Opaque identifier for a GPU-side object owned by one resource wrapper.
///
/// `GpuHandle::NONE` (zero) is the sentinel for "no object": wrappers report it
/// before creation and after `delete()`. Live handles are allocated from a
/// process-wide counter and never reused, so a stale handle can never alias a
/// newer object.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct GpuHandle(u32);

static NEXT_HANDLE: AtomicU32 = AtomicU32::new(1);

impl GpuHandle {
    pub const NONE: GpuHandle = GpuHandle(0);

    pub(crate) fn allocate() -> Self {
        Self(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub const fn get(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for GpuHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            f.write_str("#none")
        } else {
            write!(f, "#{}", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocated_handles_are_unique_and_non_zero() {
        let a = GpuHandle::allocate();
        let b = GpuHandle::allocate();
        assert!(!a.is_none());
        assert!(!b.is_none());
        assert_ne!(a, b);
    }

    #[test]
    fn default_is_none() {
        assert_eq!(GpuHandle::default(), GpuHandle::NONE);
        assert_eq!(GpuHandle::NONE.to_string(), "#none");
    }
}
