//! Per-group counter record and the share tokens it hands out.
//!
//! Each owning handle carries one `ShareToken` next to its counter
//! pointer. `Counter::acquire` bumps the shared count and mints a token;
//! `Counter::release` takes it back. A token that is dropped instead of
//! released panics, so a share can neither leak nor be returned twice.

use core::cell::Cell;
use core::marker::PhantomData;

/// Zero-sized proof that the holder owns one share of a group.
pub struct ShareToken {
    _nosend: PhantomData<*mut ()>,
}

impl ShareToken {
    #[inline]
    fn mint() -> Self {
        Self {
            _nosend: PhantomData,
        }
    }
}

impl Drop for ShareToken {
    fn drop(&mut self) {
        panic!("share token dropped without Counter::release");
    }
}

/// Per-group counter record: live owners plus (reserved) weak observers.
///
/// Both counts live in one allocation and are zeroed independently; the
/// record may only be freed once both are zero.
#[derive(Debug)]
pub struct Counter {
    shared: Cell<usize>,
    weak: Cell<usize>,
    // !Send + !Sync: plain Cell arithmetic, no atomics.
    _nosend: PhantomData<*mut ()>,
}

impl Counter {
    /// A fresh record with no shares and no observers.
    pub fn new() -> Self {
        Self {
            shared: Cell::new(0),
            weak: Cell::new(0),
            _nosend: PhantomData,
        }
    }

    #[inline]
    pub fn shared_count(&self) -> usize {
        self.shared.get()
    }

    /// Always zero until a weak observer type exists.
    #[inline]
    pub fn weak_count(&self) -> usize {
        self.weak.get()
    }

    /// True when neither owners nor observers reference the record.
    #[inline]
    pub fn is_unreferenced(&self) -> bool {
        self.shared_count() == 0 && self.weak_count() == 0
    }

    /// Add one owner to the group.
    #[inline]
    pub fn acquire(&self) -> ShareToken {
        let n = self.shared.get().wrapping_add(1);
        self.shared.set(n);
        if n == 0 {
            // Share count wrapped: no safe way to continue.
            std::process::abort();
        }
        ShareToken::mint()
    }

    /// Give one owner's share back. Returns true if that was the last one.
    #[inline]
    pub fn release(&self, token: ShareToken) -> bool {
        core::mem::forget(token);
        let c = self.shared.get();
        assert!(c > 0, "share count underflow");
        self.shared.set(c - 1);
        c == 1
    }
}
