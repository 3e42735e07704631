//! # Hardware Collaborators
//!
//! The scheduler core never touches pins or timers. A control task talks to
//! the outside world through these two traits; a board crate implements them
//! over its quadrature counter and PWM bridge, and [`crate::sim`] implements
//! them over a simulated motor.

/// Position sensor (e.g. a quadrature encoder counter).
pub trait Encoder {
    /// Current position in ticks relative to the last `zero`.
    fn read(&mut self) -> i32;

    /// Make the current position the new zero.
    fn zero(&mut self);
}

/// Drive output (e.g. an H-bridge on a PWM channel).
///
/// `level` is a signed duty cycle; implementations saturate values outside
/// their range instead of failing.
pub trait Actuator {
    fn set_command(&mut self, level: i32);
}

impl<T: Encoder + ?Sized> Encoder for &mut T {
    fn read(&mut self) -> i32 {
        (**self).read()
    }

    fn zero(&mut self) {
        (**self).zero()
    }
}

impl<T: Actuator + ?Sized> Actuator for &mut T {
    fn set_command(&mut self, level: i32) {
        (**self).set_command(level)
    }
}
