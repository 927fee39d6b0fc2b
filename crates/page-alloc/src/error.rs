//! Unrecoverable contract violations.
//!
//! The allocator has exactly two failure kinds. Exhaustion is ordinary and
//! recoverable: `allocate` returns `None` and the caller decides what to do.
//! A [`ContractViolation`] is not: a misaligned or out-of-range freed
//! address means some caller is corrupting memory, and continuing would let
//! a broken free-list topology propagate into future allocations. Such
//! errors are escalated through [`report`], which stops the process before
//! any list is touched.

use snafu::{Location, Snafu};

/// A caller broke the `free` contract. Never returned to the caller;
/// always escalated through [`report`].
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ContractViolation {
    #[snafu(display("freed page address {addr:#x} is not page-aligned"))]
    MisalignedPage {
        addr: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display(
        "freed page address {addr:#x} is outside the managed range {start:#x}..{top:#x}"
    ))]
    PageOutOfRange {
        addr: usize,
        start: usize,
        top: usize,
        #[snafu(implicit)]
        location: Location,
    },
}

/// Halts the process on an unrecoverable error.
///
/// Under the workspace's `panic = "abort"` profiles this is a true abort;
/// test builds unwind instead, so violation paths stay testable.
#[track_caller]
pub fn report<E>(err: E) -> !
where
    E: core::error::Error,
{
    panic!("halting on unrecoverable contract violation: {err}");
}
