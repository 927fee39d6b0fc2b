//! Explicit CPU identity for allocator critical sections.
//!
//! The allocator's lock discipline assumes the calling CPU's index is stable
//! for the whole operation; an identity read that could go stale mid-use
//! (because the caller migrated CPUs) would break single-owner locking.
//! Instead of querying an ambient scheduler, callers carry a [`PinnedCpu`]
//! guard: workers fix their [`CpuId`] once at task start and pin it around
//! each critical section. The guard is usable by any code that needs a
//! stable CPU identity, not just the allocator.

use core::marker::PhantomData;

use derive_more::Display;

/// Index of one of the parallel execution units sharing physical memory.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[display("{_0}")]
#[repr(transparent)]
pub struct CpuId(usize);

impl CpuId {
    pub fn value(self) -> usize {
        self.0
    }

    pub fn from_raw(value: usize) -> Self {
        Self(value)
    }

    /// Pins this identity for the duration of a critical section.
    ///
    /// The returned guard is the scoped counterpart of disabling
    /// rescheduling: while it lives, the identity it reports cannot change
    /// out from under the holder. Dropping the guard ends the section.
    #[must_use]
    pub fn pin(self) -> PinnedCpu {
        PinnedCpu {
            id: self,
            _not_send: PhantomData,
        }
    }
}

/// Proof of a stable CPU identity.
///
/// `PinnedCpu` is not [`Send`], so it cannot leave the thread of control it
/// was created on; code holding one may treat [`id`](Self::id) as the
/// current CPU for the guard's whole lifetime.
#[derive(Debug)]
pub struct PinnedCpu {
    id: CpuId,
    _not_send: PhantomData<*mut ()>,
}

impl PinnedCpu {
    pub fn id(&self) -> CpuId {
        self.id
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    extern crate alloc;

    use alloc::format;

    use super::*;

    #[test]
    fn test_pinned_id_is_stable() {
        let pinned = CpuId::from_raw(2).pin();
        assert_eq!(pinned.id(), CpuId::from_raw(2));
        assert_eq!(pinned.id().value(), 2);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", CpuId::from_raw(1)), "1");
    }
}
