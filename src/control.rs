//! Proportional position controller.

use crate::config::{COMMAND_MAX, COMMAND_MIN};

/// `command = gain * (setpoint - measured)`, rounded and saturated to the
/// actuator range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProportionalController {
    gain: f32,
    min: i32,
    max: i32,
    /// Error seen by the last `run`. Unused by the P law.
    last_error: i32,
}

impl ProportionalController {
    /// Controller saturating to `COMMAND_MIN..=COMMAND_MAX`.
    pub const fn new(gain: f32) -> Self {
        Self {
            gain,
            min: COMMAND_MIN,
            max: COMMAND_MAX,
            last_error: 0,
        }
    }

    /// Replace the output range. Bounds are swapped if given in reverse.
    pub const fn with_limits(mut self, min: i32, max: i32) -> Self {
        if min <= max {
            self.min = min;
            self.max = max;
        } else {
            self.min = max;
            self.max = min;
        }
        self
    }

    /// Compute the command without touching any state.
    pub fn command(&self, setpoint: i32, measured: i32) -> i32 {
        let error = setpoint.saturating_sub(measured);
        saturate(self.gain * error as f32, self.min, self.max)
    }

    /// Compute the command and remember the error.
    pub fn run(&mut self, setpoint: i32, measured: i32) -> i32 {
        self.last_error = setpoint.saturating_sub(measured);
        self.command(setpoint, measured)
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn last_error(&self) -> i32 {
        self.last_error
    }

    pub fn limits(&self) -> (i32, i32) {
        (self.min, self.max)
    }
}

/// Round half away from zero into `min..=max`. NaN maps to zero, clamped.
fn saturate(x: f32, min: i32, max: i32) -> i32 {
    if x.is_nan() {
        return 0i32.clamp(min, max);
    }
    if x >= max as f32 {
        return max;
    }
    if x <= min as f32 {
        return min;
    }
    let rounded = if x >= 0.0 { x + 0.5 } else { x - 0.5 };
    (rounded as i32).clamp(min, max)
}
