//! A busy-waiting mutual exclusion lock.
//!
//! [`SpinMutex`] protects its data with a single test-and-set atomic and
//! never suspends the caller; contended lockers spin until the holder
//! releases. Critical sections guarded by it must be short and bounded.
//! The lock records the source location of the most recent acquisition,
//! which is visible in a debugger when hunting a stuck holder.

#![cfg_attr(not(test), no_std)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

use core::{
    cell::UnsafeCell,
    fmt, hint,
    ops::{Deref, DerefMut},
    panic::Location,
    sync::atomic::{AtomicBool, Ordering},
};

pub struct SpinMutex<T> {
    locked: AtomicBool,
    data: UnsafeCell<T>,
    locked_at: UnsafeCell<&'static Location<'static>>,
}

impl<T> Default for SpinMutex<T>
where
    T: Default,
{
    #[track_caller]
    fn default() -> Self {
        Self {
            locked: AtomicBool::new(false),
            data: UnsafeCell::new(T::default()),
            locked_at: UnsafeCell::new(Location::caller()),
        }
    }
}

unsafe impl<T> Sync for SpinMutex<T> where T: Send {}

impl<T> fmt::Debug for SpinMutex<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("SpinMutex");
        match self.try_lock() {
            Some(guard) => d.field("data", &&*guard),
            None => d.field("data", &"<locked>"),
        };
        d.finish()
    }
}

impl<T> SpinMutex<T> {
    pub const fn new(data: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            data: UnsafeCell::new(data),
            locked_at: UnsafeCell::new(Location::caller()),
        }
    }

    /// Acquires the lock, spinning until it becomes available.
    #[track_caller]
    pub fn lock(&self) -> SpinMutexGuard<'_, T> {
        while self.locked.swap(true, Ordering::Acquire) {
            hint::spin_loop();
        }

        unsafe {
            *self.locked_at.get() = Location::caller();
        }

        SpinMutexGuard { mutex: self }
    }

    /// Acquires the lock only if it is free right now.
    #[track_caller]
    pub fn try_lock(&self) -> Option<SpinMutexGuard<'_, T>> {
        if self.locked.swap(true, Ordering::Acquire) {
            return None;
        }

        unsafe {
            *self.locked_at.get() = Location::caller();
        }

        Some(SpinMutexGuard { mutex: self })
    }

    fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

pub struct SpinMutexGuard<'a, T> {
    mutex: &'a SpinMutex<T>,
}

unsafe impl<T> Send for SpinMutexGuard<'_, T> where T: Send {}
unsafe impl<T> Sync for SpinMutexGuard<'_, T> where T: Sync {}

impl<T> Drop for SpinMutexGuard<'_, T> {
    fn drop(&mut self) {
        assert!(
            self.mutex.is_locked(),
            "SpinMutexGuard dropped without holding the lock"
        );
        self.mutex.locked.store(false, Ordering::Release);
    }
}

impl<T> Deref for SpinMutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        unsafe { &*self.mutex.data.get() }
    }
}

impl<T> DerefMut for SpinMutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<T> SpinMutexGuard<'_, T> {
    pub fn unlock(self) {
        let _ = self; // drop
    }
}
