//! The per-CPU page allocator.
//!
//! One free list per CPU, each behind its own spin lock. Allocation and
//! free on the same CPU serialize only on that CPU's lock; a CPU whose
//! list is empty steals a single page from the first non-empty list found
//! in a fixed ascending scan. The scan holds at most one lock at any
//! instant, which is the sole deadlock-avoidance mechanism.

use core::ops::Range;

use log::{debug, info, trace};
use spinlock::SpinMutex;

use crate::{
    Align as _, PAGE_SIZE,
    cpu::PinnedCpu,
    error::{self, MisalignedPageSnafu, PageOutOfRangeSnafu},
    free_list::FreeList,
};

/// Byte written over a page's whole extent when it enters a free list, so
/// dangling reads hit recognizable junk.
pub const FREED_FILL: u8 = 0x01;
/// Byte written over a page's whole extent just before it is handed out, so
/// reads of uninitialized memory hit recognizable junk.
pub const ALLOCATED_FILL: u8 = 0x05;

/// A fixed-page-size physical memory allocator for `N` parallel CPUs.
///
/// Constructed once at boot over the managed physical range and then shared
/// by reference; all operations take `&self`. Callers identify themselves
/// with a [`PinnedCpu`] handle whose index selects the free list they own.
///
/// The allocator never blocks beyond its spin locks, never sleeps, and
/// never retries: every operation completes in a bounded number of steps.
pub struct PageAllocator<const N: usize> {
    cpus: [SpinMutex<FreeList>; N],
    base: *mut u8,
    size: usize,
}

unsafe impl<const N: usize> Send for PageAllocator<N> {}
unsafe impl<const N: usize> Sync for PageAllocator<N> {}

impl<const N: usize> PageAllocator<N> {
    /// Creates an allocator managing the physical range
    /// `[base, base + size)`.
    ///
    /// All `N` free lists start empty; call
    /// [`release_pool`](Self::release_pool) once at boot to seed them.
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    ///
    /// - the range `base..base + size` is valid memory, exclusive to this
    ///   allocator, and remains so for the allocator's lifetime
    /// - no page inside the range is referenced except through pages handed
    ///   out by [`allocate`](Self::allocate)
    #[must_use]
    pub const unsafe fn new(base: *mut u8, size: usize) -> Self {
        assert!(N > 0, "at least one CPU is required");
        Self {
            cpus: [const { SpinMutex::new(FreeList::new()) }; N],
            base,
            size,
        }
    }

    /// The physical address interval this allocator is responsible for,
    /// as supplied by the environment at boot.
    #[must_use]
    pub fn managed_range(&self) -> Range<usize> {
        let start = self.base.addr();
        start..start + self.size
    }

    /// Releases every full page of the managed range into the free lists
    /// and returns how many pages were released.
    ///
    /// The range start is rounded up to the next page boundary. Every page
    /// lands on the *executing* CPU's list: after boot, all other CPUs
    /// start empty and are served by stealing until cross-CPU frees spread
    /// pages around naturally.
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    ///
    /// - this is called exactly once, before any other CPU allocates
    /// - no page of the managed range is in use
    pub unsafe fn release_pool(&self, cpu: &PinnedCpu) -> usize {
        let top = self.base.addr() + self.size;
        let mut page = self.base.map_addr(|addr| addr.page_align_up());
        let mut released = 0;
        while page.addr() + PAGE_SIZE <= top {
            unsafe {
                self.free(cpu, page);
            }
            page = page.map_addr(|addr| addr + PAGE_SIZE);
            released += 1;
        }
        info!("cpu{}: released {released} pages into the free lists", cpu.id());
        released
    }

    /// Hands out one page, preferring the calling CPU's own list.
    ///
    /// Pops the local list head under the local lock; if the local list is
    /// empty, falls back to stealing from another CPU. Any
    /// page acquired is filled with [`ALLOCATED_FILL`] after all locks are
    /// released. Returns `None` once every CPU's list is empty — the
    /// expected, recoverable out-of-memory result.
    #[must_use]
    pub fn allocate(&self, cpu: &PinnedCpu) -> Option<*mut u8> {
        let mut list = self.cpus[self.index_of(cpu)].lock();
        let page = list.pop();
        list.unlock();

        let page = page.or_else(|| self.steal(cpu))?;
        unsafe {
            page.write_bytes(ALLOCATED_FILL, PAGE_SIZE);
        }
        Some(page)
    }

    /// Returns a page to the calling CPU's free list.
    ///
    /// The page is filled with [`FREED_FILL`] before it is linked. A
    /// misaligned or out-of-range address is treated as corruption, not an
    /// error to recover from: the process halts via [`error::report`]
    /// before any list is touched.
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    ///
    /// - `page` was handed out by [`allocate`](Self::allocate) on this
    ///   allocator, or is being seeded by
    ///   [`release_pool`](Self::release_pool)
    /// - the page is not already free (double frees are undetectable here —
    ///   no independent tracking exists)
    /// - no reference to the page remains in use
    pub unsafe fn free(&self, cpu: &PinnedCpu, page: *mut u8) {
        let Range { start, end: top } = self.managed_range();
        let addr = page.addr();
        if !addr.is_page_aligned() {
            error::report(MisalignedPageSnafu { addr }.build());
        }
        if addr < start || addr >= top {
            error::report(PageOutOfRangeSnafu { addr, start, top }.build());
        }

        unsafe {
            page.write_bytes(FREED_FILL, PAGE_SIZE);
        }

        let mut list = self.cpus[self.index_of(cpu)].lock();
        unsafe {
            list.push(page);
        }
    }

    /// Per-CPU free page counts.
    ///
    /// Each count is read under that CPU's lock alone, so the array is a
    /// best-effort snapshot: entries for different CPUs may reflect
    /// different instants. Modifies nothing.
    #[must_use]
    pub fn free_page_counts(&self) -> [usize; N] {
        let mut counts = [0; N];
        for (count, list) in counts.iter_mut().zip(&self.cpus) {
            *count = list.lock().len();
        }
        counts
    }

    /// Total free pages across all CPUs, with the same snapshot caveat as
    /// [`free_page_counts`](Self::free_page_counts).
    #[must_use]
    pub fn total_free(&self) -> usize {
        self.free_page_counts().iter().sum()
    }

    /// Takes one page from the first non-empty list, scanning all CPUs in
    /// ascending index order.
    ///
    /// At most one list lock is held at any instant, and victims are always
    /// visited in the same fixed order; a scan can therefore never deadlock
    /// against concurrent local allocate/free or another scan.
    fn steal(&self, cpu: &PinnedCpu) -> Option<*mut u8> {
        for (victim, list) in self.cpus.iter().enumerate() {
            let mut list = list.lock();
            if let Some(page) = list.pop() {
                list.unlock();
                trace!("cpu{}: stole page {page:p} from cpu{victim}", cpu.id());
                return Some(page);
            }
        }
        debug!("cpu{}: every free list is empty", cpu.id());
        None
    }

    fn index_of(&self, cpu: &PinnedCpu) -> usize {
        let index = cpu.id().value();
        assert!(index < N, "cpu{index} is outside this allocator's {N} CPUs");
        index
    }
}
