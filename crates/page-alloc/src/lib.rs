//! Physical page allocator with one free list per CPU.
//!
//! This crate hands out fixed-size 4096-byte pages of physical memory under
//! true parallel execution. Each CPU owns an independent free list behind its
//! own spin lock, so the common case (allocate and free on the same CPU)
//! never contends with other CPUs. When a CPU's own list runs dry, the
//! allocator *steals*: it scans the other lists in fixed ascending index
//! order, holding at most one lock at a time, and takes a single page from
//! the first non-empty list it finds.
//!
//! # Design
//!
//! - **Fixed block size**: every allocation is exactly one
//!   [`PAGE_SIZE`]-byte page. There is no splitting, coalescing, or
//!   variable-size path.
//! - **In-place free lists**: a free page stores its own list linkage in its
//!   first bytes; a page carries no metadata while it is allocated. The raw
//!   reinterpretation is confined to one private module.
//! - **Explicit CPU identity**: every operation takes a
//!   [`PinnedCpu`](cpu::PinnedCpu) handle, a scoped guard proving the caller's
//!   CPU identity cannot change mid-operation. See the [`cpu`] module.
//! - **Poisoning**: pages are overwritten with
//!   [`FREED_FILL`](allocator::FREED_FILL) when freed and
//!   [`ALLOCATED_FILL`](allocator::ALLOCATED_FILL) when handed out, so
//!   use-after-free and uninitialized reads show up as recognizable
//!   corruption instead of silent reuse of stale data.
//!
//! # Failure modes
//!
//! Exhaustion is an ordinary result: [`allocate`](allocator::PageAllocator::allocate)
//! returns `None` once every list is empty. Freeing a misaligned or
//! out-of-range address is a contract violation that halts the process
//! immediately — a bad address means the free-list topology can no longer be
//! trusted. See the [`error`] module.
//!
//! # Usage
//!
//! ```rust
//! use page_alloc::{PAGE_SIZE, allocator::PageAllocator, cpu::CpuId};
//!
//! // In a kernel this region would be the machine's physical memory; the
//! // environment supplies it at boot.
//! let mut pool = vec![0_u8; 8 * PAGE_SIZE];
//! let allocator = unsafe { PageAllocator::<3>::new(pool.as_mut_ptr(), pool.len()) };
//!
//! // Boot runs on one CPU; the whole pool lands on its list.
//! let cpu = CpuId::from_raw(0).pin();
//! let released = unsafe { allocator.release_pool(&cpu) };
//! assert!(released >= 7); // the unaligned region head is rounded away
//!
//! let page = allocator.allocate(&cpu).expect("pool was just released");
//! unsafe { allocator.free(&cpu, page) };
//! ```

#![no_std]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod allocator;
pub mod cpu;
pub mod error;
mod free_list;

/// Size of one page, the fixed allocation unit.
pub const PAGE_SIZE: usize = 4096;
/// Log2 of [`PAGE_SIZE`].
pub const PAGE_SHIFT: usize = 12;
const _: () = assert!(PAGE_SIZE == 1 << PAGE_SHIFT);

pub trait Align: Sized {
    fn align_up(&self, align: usize) -> Self;
    fn align_down(&self, align: usize) -> Self;
    fn is_aligned(&self, align: usize) -> bool;

    fn page_align_up(&self) -> Self {
        self.align_up(PAGE_SIZE)
    }
    fn page_align_down(&self) -> Self {
        self.align_down(PAGE_SIZE)
    }

    fn is_page_aligned(&self) -> bool {
        self.is_aligned(PAGE_SIZE)
    }
}

impl Align for usize {
    fn align_up(&self, align: usize) -> Self {
        self.next_multiple_of(align)
    }

    fn align_down(&self, align: usize) -> Self {
        self / align * align
    }

    fn is_aligned(&self, align: usize) -> bool {
        self.is_multiple_of(align)
    }
}
