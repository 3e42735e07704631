//! # Synchronization Primitives
//!
//! Critical section helpers for the shared primitives. Task bodies never
//! interleave with each other, so protection only matters for values that an
//! interrupt handler also touches, or that are wider than one machine word.
//!
//! The critical section implementation comes from `cortex-m` on bare-metal
//! ARM (interrupts disabled) and from `critical-section`'s `std` backend on
//! hosts (a global reentrant lock).

/// Run `f` inside a critical section when `protect` is set, or directly
/// otherwise.
///
/// # Usage
/// ```ignore
/// let v = sync::guarded(P::PROTECT, || unsafe { *self.value.get() });
/// ```
///
/// Keep the closure short: interrupts stay disabled for its whole duration
/// on the target.
#[inline]
pub fn guarded<F, R>(protect: bool, f: F) -> R
where
    F: FnOnce() -> R,
{
    if protect {
        critical_section::with(|_cs| f())
    } else {
        f()
    }
}
