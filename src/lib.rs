//! shared-handle: a single-threaded, reference-counted owning handle to a
//! heap value, released eagerly when the last owner goes away.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: an `Rc`-like primitive whose increment/decrement discipline is
//!   explicit and checkable, with the value and its counter record kept
//!   as two separately freed allocations.
//! - Layers:
//!   - `counter::Counter`: per-group record holding the shared (owner)
//!     count and a reserved weak (observer) count. Shares are minted and
//!     returned as zero-sized `ShareToken`s that panic if dropped.
//!   - `SharedHandle<T>`: public API. A handle is either Empty or Owning;
//!     an Owning handle holds the value pointer, the counter pointer and
//!     exactly one token for that counter.
//!
//! Constraints
//! - Single-threaded: `!Send`/`!Sync` (no atomics).
//! - One counter allocation per ownership group, created when a handle
//!   first takes ownership of a value; clones never allocate.
//! - Value pointer present iff counter pointer present; both live in one
//!   `Option` so a half-populated handle cannot be expressed.
//! - The value is dropped exactly once, when the shared count goes from 1
//!   to 0. The counter record is freed once both counts are zero.
//!
//! Empty handles
//! - Accessors that return a bare value (`Deref`, `count`) panic on an
//!   empty handle. Accessors that can express absence (`get`, `get_mut`,
//!   `try_count`, `as_ptr`) report it in their return type instead.
//!
//! Identity
//! - Handles compare equal when they belong to the same ownership group.
//!   For non-zero-sized values this is the same as pointer identity of the
//!   value; comparisons against raw pointers use the value pointer.
//!
//! Reentrancy
//! - `reset` clears the handle before returning its share, so a value
//!   whose `Drop` reaches other handles sees a consistent state.
//!
//! Overflow semantics
//! - Share-count overflow aborts the process, matching `Rc`. Returning a
//!   share to a counter at zero is an assertion failure.
//!
//! Notes and non-goals
//! - No weak handles yet; the weak count is carried but never changes.
//! - No atomic variant. A thread-safe flavour would swap `Counter`'s cells
//!   for atomics and be exposed as a separate handle type.
//! - No custom deleters, no slices or other unsized values.

mod counter;
mod shared_handle;

pub use shared_handle::{EmptyHandle, SharedHandle};
