use crate::counter::{Counter, ShareToken};
use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use core::ops::Deref;
use std::ptr::NonNull;

// One owner's share of a group: the value and counter pointers plus the
// token proving the share was counted. A handle is Owning iff it holds one.
struct Share<T> {
    value: NonNull<T>,
    counter: NonNull<Counter>,
    token: ShareToken,
}

impl<T> Share<T> {
    fn counter(&self) -> &Counter {
        // Safety: the counter outlives every share that holds a token for it.
        unsafe { self.counter.as_ref() }
    }

    fn value(&self) -> &T {
        // Safety: the value is only freed once the last share is returned.
        unsafe { self.value.as_ref() }
    }

    // Mint another share of the same group.
    fn duplicate(&self) -> Self {
        let token = self.counter().acquire();
        Share {
            value: self.value,
            counter: self.counter,
            token,
        }
    }
}

/// A reference-counted owning handle to a heap value.
///
/// Cloning shares the value and increments the group's count; dropping or
/// resetting decrements it. The value is destroyed exactly once, when the
/// last owning handle of its group releases its share.
pub struct SharedHandle<T> {
    share: Option<Share<T>>,
    _owns: PhantomData<T>,
    // !Send + !Sync like Rc
    _nosend: PhantomData<*mut ()>,
}

/// Error returned when a count is requested from an empty handle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct EmptyHandle;

impl fmt::Display for EmptyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedHandle is empty")
    }
}

impl std::error::Error for EmptyHandle {}

impl<T> SharedHandle<T> {
    /// A handle that owns nothing.
    pub const fn empty() -> Self {
        Self {
            share: None,
            _owns: PhantomData,
            _nosend: PhantomData,
        }
    }

    /// Move `value` to the heap and become its first owner.
    pub fn new(value: T) -> Self {
        Self::from_box(Box::new(value))
    }

    /// Take ownership of an already boxed value, starting a new group with
    /// a count of 1.
    pub fn from_box(value: Box<T>) -> Self {
        let value = NonNull::from(Box::leak(value));
        let counter = NonNull::from(Box::leak(Box::new(Counter::new())));
        tracing::trace!(counter = ?counter, "Allocating share counter");
        let token = unsafe { counter.as_ref() }.acquire();
        Self::from_share(Some(Share {
            value,
            counter,
            token,
        }))
    }

    /// Take ownership of a raw pointer. A null pointer yields an empty
    /// handle.
    ///
    /// # Safety
    ///
    /// A non-null `ptr` must come from `Box::into_raw` and must not be used,
    /// freed, or handed to another owner afterwards.
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        match NonNull::new(ptr) {
            Some(p) => Self::from_box(unsafe { Box::from_raw(p.as_ptr()) }),
            None => Self::empty(),
        }
    }

    fn from_share(share: Option<Share<T>>) -> Self {
        Self {
            share,
            _owns: PhantomData,
            _nosend: PhantomData,
        }
    }

    // Identity of the ownership group; None for empty handles.
    fn group(&self) -> Option<NonNull<Counter>> {
        self.share.as_ref().map(|s| s.counter)
    }

    /// True if the handle owns nothing.
    pub fn is_empty(&self) -> bool {
        self.share.is_none()
    }

    /// Borrow the value, or None if the handle is empty.
    pub fn get(&self) -> Option<&T> {
        self.share.as_ref().map(Share::value)
    }

    /// Mutably borrow the value when this handle is its only owner.
    pub fn get_mut(&mut self) -> Option<&mut T> {
        let share = self.share.as_mut()?;
        if share.counter().shared_count() != 1 {
            return None;
        }
        // Safety: sole owner, and `&mut self` excludes other borrows.
        Some(unsafe { share.value.as_mut() })
    }

    /// Raw pointer to the value; null when empty. Ownership is unaffected.
    pub fn as_ptr(&self) -> *const T {
        match &self.share {
            Some(s) => s.value.as_ptr() as *const T,
            None => core::ptr::null(),
        }
    }

    /// Number of live handles sharing this value.
    ///
    /// Panics if the handle is empty; see `try_count`.
    pub fn count(&self) -> usize {
        match self.try_count() {
            Ok(n) => n,
            Err(e) => panic!("count() on empty handle: {e}"),
        }
    }

    /// Like `count`, but reports an empty handle as `EmptyHandle`.
    pub fn try_count(&self) -> Result<usize, EmptyHandle> {
        self.share
            .as_ref()
            .map(|s| s.counter().shared_count())
            .ok_or(EmptyHandle)
    }

    /// True when both handles belong to the same ownership group, or both
    /// are empty.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.group() == other.group()
    }

    /// Move this handle's share out, leaving `self` empty. The count is
    /// unchanged.
    pub fn take(&mut self) -> Self {
        Self::from_share(self.share.take())
    }

    /// Move-assign from `other`, leaving it empty.
    ///
    /// If both already share the same value, `other` returns its share
    /// instead of transferring it, so the count drops by one.
    pub fn move_from(&mut self, other: &mut Self) {
        if Self::ptr_eq(self, other) {
            other.reset();
            return;
        }
        self.reset();
        self.share = other.share.take();
    }

    /// Release this handle's share and become empty. A no-op on an empty
    /// handle.
    pub fn reset(&mut self) {
        if let Some(share) = self.share.take() {
            release(share);
        }
    }

    /// Reclaim the value if this is its last owner; otherwise hand the
    /// handle back unchanged.
    pub fn try_unwrap(mut self) -> Result<T, Self> {
        match self.share.take() {
            Some(share) if share.counter().shared_count() == 1 => {
                let Share {
                    value,
                    counter,
                    token,
                } = share;
                let last = unsafe { counter.as_ref() }.release(token);
                debug_assert!(last);
                free_counter_if_unreferenced(counter);
                Ok(*unsafe { Box::from_raw(value.as_ptr()) })
            }
            share => {
                self.share = share;
                Err(self)
            }
        }
    }
}

// Return one share; on the last one, free the counter record (unless weak
// observers remain) and destroy the value. The handle has already been
// cleared, so the value's Drop may touch other handles freely.
fn release<T>(share: Share<T>) {
    let Share {
        value,
        counter,
        token,
    } = share;
    if !unsafe { counter.as_ref() }.release(token) {
        return;
    }
    free_counter_if_unreferenced(counter);
    tracing::trace!(value = ?value, "Destroying shared value");
    drop(unsafe { Box::from_raw(value.as_ptr()) });
}

fn free_counter_if_unreferenced(counter: NonNull<Counter>) {
    if unsafe { counter.as_ref() }.is_unreferenced() {
        tracing::trace!(counter = ?counter, "Freeing share counter");
        drop(unsafe { Box::from_raw(counter.as_ptr()) });
    }
}

impl<T> Default for SharedHandle<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> Clone for SharedHandle<T> {
    fn clone(&self) -> Self {
        Self::from_share(self.share.as_ref().map(Share::duplicate))
    }

    fn clone_from(&mut self, source: &Self) {
        if Self::ptr_eq(self, source) {
            return;
        }
        self.reset();
        self.share = source.share.as_ref().map(Share::duplicate);
    }
}

impl<T> Drop for SharedHandle<T> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<T> Deref for SharedHandle<T> {
    type Target = T;

    /// Panics if the handle is empty; see `get`.
    fn deref(&self) -> &T {
        match self.get() {
            Some(v) => v,
            None => panic!("dereferenced an empty SharedHandle"),
        }
    }
}

impl<T> From<Box<T>> for SharedHandle<T> {
    fn from(value: Box<T>) -> Self {
        Self::from_box(value)
    }
}

impl<T> From<Option<Box<T>>> for SharedHandle<T> {
    fn from(value: Option<Box<T>>) -> Self {
        value.map_or_else(Self::empty, Self::from_box)
    }
}

impl<T> PartialEq for SharedHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other)
    }
}

impl<T> Eq for SharedHandle<T> {}

/// Compares the value pointer, so for zero-sized `T` every handle equals
/// every other handle's `as_ptr()` even when the handles themselves differ.
impl<T> PartialEq<*const T> for SharedHandle<T> {
    fn eq(&self, other: &*const T) -> bool {
        self.as_ptr() == *other
    }
}

/// Value-pointer comparison; see `PartialEq<*const T> for SharedHandle<T>`.
impl<T> PartialEq<SharedHandle<T>> for *const T {
    fn eq(&self, other: &SharedHandle<T>) -> bool {
        *self == other.as_ptr()
    }
}

impl<T> Hash for SharedHandle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.group().hash(state);
    }
}

impl<T: fmt::Debug> fmt::Debug for SharedHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(v) => f.debug_tuple("SharedHandle").field(v).finish(),
            None => f.write_str("SharedHandle(<empty>)"),
        }
    }
}
