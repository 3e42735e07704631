//! # Shared Queue
//!
//! Bounded FIFO for passing a stream of values from one task to another.
//! Storage is an inline ring of `N` slots, so a queue never allocates.
//!
//! When the ring is full, a write either fails with [`QueueError::Full`]
//! (contents untouched) or, with `overwrite` enabled, evicts the oldest
//! unread value first. Reads fail with [`QueueError::Empty`]; callers are
//! expected to check [`SharedQueue::any`] first.

use core::cell::UnsafeCell;
use core::fmt;
use core::marker::PhantomData;

use crate::error::{ConfigError, QueueError};
use crate::share::{Protected, Protection, ShareInfo, ShareValue};
use crate::sync;

#[inline]
fn wrap_inc(x: usize, bound: usize) -> usize {
    let y = x + 1;
    if y < bound {
        y
    } else {
        0
    }
}

#[inline]
fn wrap_add(x: usize, n: usize, bound: usize) -> usize {
    let y = x + n;
    if y < bound {
        y
    } else {
        y - bound
    }
}

struct Ring<T, const N: usize> {
    buf: [T; N],
    rd_idx: usize,
    len: usize,
    max_full: usize,
}

impl<T: ShareValue, const N: usize> Ring<T, N> {
    fn push(&mut self, value: T, overwrite: bool) -> Result<(), QueueError> {
        if self.len == N {
            if !overwrite {
                return Err(QueueError::Full);
            }
            self.rd_idx = wrap_inc(self.rd_idx, N);
            self.len -= 1;
        }

        let wr_idx = wrap_add(self.rd_idx, self.len, N);
        self.buf[wr_idx] = value;
        self.len += 1;
        self.max_full = self.max_full.max(self.len);
        Ok(())
    }

    fn pop(&mut self) -> Result<T, QueueError> {
        if self.len == 0 {
            return Err(QueueError::Empty);
        }
        let value = self.buf[self.rd_idx];
        self.rd_idx = wrap_inc(self.rd_idx, N);
        self.len -= 1;
        Ok(value)
    }
}

/// Bounded FIFO of `N` values of type `T` shared between tasks.
///
/// Protection works as for [`SharedCell`](crate::share::SharedCell): only a
/// [`Protected`] queue is `Sync`.
pub struct SharedQueue<T: ShareValue, const N: usize, P: Protection = Protected> {
    name: &'static str,
    overwrite: bool,
    ring: UnsafeCell<Ring<T, N>>,
    _protection: PhantomData<P>,
}

// Safety: the ring of a protected queue is only touched through `with_ring`,
// inside a critical section.
unsafe impl<T: ShareValue + Send, const N: usize> Sync for SharedQueue<T, N, Protected> {}

impl<T: ShareValue, const N: usize, P: Protection> SharedQueue<T, N, P> {
    /// Create an empty queue.
    ///
    /// # Errors
    /// `ConfigError::InvalidCapacity` if `N` is zero.
    pub fn new(name: &'static str, overwrite: bool) -> Result<Self, ConfigError> {
        if N == 0 {
            return Err(ConfigError::InvalidCapacity);
        }
        Ok(Self {
            name,
            overwrite,
            ring: UnsafeCell::new(Ring {
                buf: [T::ZERO; N],
                rd_idx: 0,
                len: 0,
                max_full: 0,
            }),
            _protection: PhantomData,
        })
    }

    #[inline]
    fn with_ring<R>(&self, f: impl FnOnce(&mut Ring<T, N>) -> R) -> R {
        // Safety: the closures passed here never call back into the queue,
        // so the mutable borrow is unique for its whole lifetime.
        sync::guarded(P::PROTECT, || f(unsafe { &mut *self.ring.get() }))
    }

    /// Append `value` at the tail.
    ///
    /// # Errors
    /// `QueueError::Full` if the queue is full and overwrite is disabled.
    pub fn put(&self, value: T) -> Result<(), QueueError> {
        let overwrite = self.overwrite;
        self.with_ring(|r| r.push(value, overwrite))
    }

    /// Remove and return the head.
    ///
    /// # Errors
    /// `QueueError::Empty` if nothing is queued.
    pub fn get(&self) -> Result<T, QueueError> {
        self.with_ring(|r| r.pop())
    }

    /// Number of values currently queued.
    pub fn size(&self) -> usize {
        self.with_ring(|r| r.len)
    }

    /// Whether at least one value is queued.
    pub fn any(&self) -> bool {
        self.size() > 0
    }

    pub fn full(&self) -> bool {
        self.size() == N
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Highest fill level seen since creation.
    pub fn max_full(&self) -> usize {
        self.with_ring(|r| r.max_full)
    }

    /// Drop everything queued. The high-water mark is kept.
    pub fn clear(&self) {
        self.with_ring(|r| {
            r.rd_idx = 0;
            r.len = 0;
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn overwrites(&self) -> bool {
        self.overwrite
    }

    pub fn is_protected(&self) -> bool {
        P::PROTECT
    }
}

impl<T: ShareValue, const N: usize, P: Protection> fmt::Debug for SharedQueue<T, N, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedQueue")
            .field("name", &self.name)
            .field("capacity", &N)
            .field("size", &self.size())
            .field("overwrite", &self.overwrite)
            .field("protect", &P::PROTECT)
            .finish()
    }
}

impl<T: ShareValue, const N: usize, P: Protection> ShareInfo for SharedQueue<T, N, P> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn type_code(&self) -> char {
        T::TYPE_CODE
    }

    fn is_protected(&self) -> bool {
        P::PROTECT
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "queue  {}/{} used, max {}{}",
            self.size(),
            N,
            self.max_full(),
            if self.overwrite { ", overwrite" } else { "" }
        )
    }
}
