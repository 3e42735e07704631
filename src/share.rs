//! # Shared Values
//!
//! Single-slot values exchanged between tasks, plus the registry that lists
//! every share for diagnostics.
//!
//! A share's element type is one of a closed set of fixed-width integers,
//! each identified by a one-letter type code (`b`/`B` 8-bit, `h`/`H` 16-bit,
//! `i`/`I` 32-bit, `q`/`Q` 64-bit; lower case is signed).
//!
//! Whether accesses run inside a critical section is part of a share's type:
//! [`Protected`] (the default) or [`Unprotected`]. Only protected shares are
//! `Sync`, so only they can sit in a `static` reachable from an interrupt
//! handler.

use core::cell::UnsafeCell;
use core::fmt;
use core::marker::PhantomData;

use crate::config::MAX_SHARES;
use crate::error::ConfigError;
use crate::sync;

mod sealed {
    pub trait Sealed {}
}

/// Element types allowed in a [`SharedCell`] or
/// [`SharedQueue`](crate::queue::SharedQueue).
pub trait ShareValue:
    Copy + Default + PartialEq + fmt::Debug + fmt::Display + sealed::Sealed
{
    /// One-letter code naming width and signedness.
    const TYPE_CODE: char;

    const ZERO: Self;

    /// Convert by keeping the low bits, the way a store into a narrower
    /// register would.
    fn from_i64_wrapping(v: i64) -> Self;
}

macro_rules! share_value {
    ($($t:ty => $code:literal),* $(,)?) => {
        $(
            impl sealed::Sealed for $t {}

            impl ShareValue for $t {
                const TYPE_CODE: char = $code;
                const ZERO: Self = 0;

                #[inline]
                fn from_i64_wrapping(v: i64) -> Self {
                    v as $t
                }
            }
        )*
    };
}

share_value! {
    i8 => 'b',
    u8 => 'B',
    i16 => 'h',
    u16 => 'H',
    i32 => 'i',
    u32 => 'I',
    i64 => 'q',
    u64 => 'Q',
}

/// Access policy of a share.
pub trait Protection: sealed::Sealed {
    const PROTECT: bool;
}

/// Every access is one critical section.
#[derive(Debug, Clone, Copy, Default)]
pub struct Protected;

/// Plain loads and stores. The share stays `!Sync` and is only reachable
/// from the context that owns it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unprotected;

impl sealed::Sealed for Protected {}
impl sealed::Sealed for Unprotected {}

impl Protection for Protected {
    const PROTECT: bool = true;
}

impl Protection for Unprotected {
    const PROTECT: bool = false;
}

/// Diagnostic view of a share, used by [`ShareRegistry`].
pub trait ShareInfo {
    fn name(&self) -> &'static str;
    fn type_code(&self) -> char;
    fn is_protected(&self) -> bool;
    /// Kind-specific summary (current value, fill level, ...).
    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

// ---------------------------------------------------------------------------
// SharedCell
// ---------------------------------------------------------------------------

/// A single value readable and writable by any task that holds a reference.
///
/// Starts at zero. A [`Protected`] cell makes every access one critical
/// section, so a reader in interrupt context never sees half of a
/// multi-word store.
pub struct SharedCell<T: ShareValue, P: Protection = Protected> {
    name: &'static str,
    value: UnsafeCell<T>,
    _protection: PhantomData<P>,
}

// Safety: every access to a protected cell is a single copy in or out of it,
// made inside a critical section.
unsafe impl<T: ShareValue + Send> Sync for SharedCell<T, Protected> {}

impl<T: ShareValue, P: Protection> SharedCell<T, P> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            value: UnsafeCell::new(T::ZERO),
            _protection: PhantomData,
        }
    }

    /// Store a new value.
    #[inline]
    pub fn put(&self, value: T) {
        // Safety: no reference into the cell outlives this call.
        sync::guarded(P::PROTECT, || unsafe { *self.value.get() = value });
    }

    /// Store `value` truncated to the cell's width.
    pub fn put_wrapping(&self, value: i64) {
        self.put(T::from_i64_wrapping(value));
    }

    /// Read the most recently stored value.
    #[inline]
    pub fn get(&self) -> T {
        // Safety: see `put`.
        sync::guarded(P::PROTECT, || unsafe { *self.value.get() })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_protected(&self) -> bool {
        P::PROTECT
    }
}

impl<T: ShareValue, P: Protection> fmt::Debug for SharedCell<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedCell")
            .field("name", &self.name)
            .field("protect", &P::PROTECT)
            .field("value", &self.get())
            .finish()
    }
}

impl<T: ShareValue, P: Protection> ShareInfo for SharedCell<T, P> {
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
        write!(f, "share  value {}", self.get())
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Fixed-size list of shares, rendered as a table by its `Display` impl.
///
/// Built once at startup next to the task list; nothing in the scheduler
/// depends on it.
pub struct ShareRegistry<'a, const N: usize = MAX_SHARES> {
    entries: [Option<&'a dyn ShareInfo>; N],
    len: usize,
}

impl<'a, const N: usize> ShareRegistry<'a, N> {
    pub const fn new() -> Self {
        Self {
            entries: [None; N],
            len: 0,
        }
    }

    pub fn register(&mut self, share: &'a dyn ShareInfo) -> Result<(), ConfigError> {
        if self.len >= N {
            return Err(ConfigError::RegistryFull);
        }
        self.entries[self.len] = Some(share);
        self.len += 1;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a dyn ShareInfo> + '_ {
        self.entries[..self.len].iter().flatten().copied()
    }
}

impl<const N: usize> Default for ShareRegistry<'_, N> {
    fn default() -> Self {
        Self::new()
    }
}

struct Describe<'s>(&'s dyn ShareInfo);

impl fmt::Display for Describe<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.describe(f)
    }
}

impl<const N: usize> fmt::Display for ShareRegistry<'_, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<16} {:>4} {:>5}  {}", "SHARE NAME", "TYPE", "PROT", "CONTENTS")?;
        for share in self.iter() {
            writeln!(
                f,
                "{:<16} {:>4} {:>5}  {}",
                share.name(),
                share.type_code(),
                if share.is_protected() { "yes" } else { "no" },
                Describe(share)
            )?;
        }
        Ok(())
    }
}
