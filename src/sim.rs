//! # Simulated Motor
//!
//! First-order DC motor model standing in for the encoder and H-bridge when
//! the demo runs on a host. Velocity lags the commanded duty cycle with time
//! constant `tau`; position integrates velocity. State advances lazily, each
//! time a handle touches the plant, using the shared [`Clock`].

use core::cell::Cell;
use core::time::Duration;

use crate::clock::Clock;
use crate::config::{COMMAND_MAX, COMMAND_MIN};
use crate::hal::{Actuator, Encoder};

/// Default no-load speed at full command, ticks per second.
pub const DEFAULT_MAX_SPEED: f32 = 6000.0;

/// Default mechanical time constant, seconds.
pub const DEFAULT_TIME_CONSTANT: f32 = 0.05;

/// The simulated motor. Hand out [`SimEncoder`] and [`SimActuator`] handles
/// to the control task.
pub struct SimPlant<'c, C: Clock + ?Sized> {
    clock: &'c C,
    max_speed: f32,
    tau: f32,
    position: Cell<f32>,
    velocity: Cell<f32>,
    offset: Cell<f32>,
    command: Cell<i32>,
    updated: Cell<Duration>,
}

impl<'c, C: Clock + ?Sized> SimPlant<'c, C> {
    pub fn new(clock: &'c C) -> Self {
        Self {
            clock,
            max_speed: DEFAULT_MAX_SPEED,
            tau: DEFAULT_TIME_CONSTANT,
            position: Cell::new(0.0),
            velocity: Cell::new(0.0),
            offset: Cell::new(0.0),
            command: Cell::new(0),
            updated: Cell::new(clock.now()),
        }
    }

    /// Override speed (ticks/s at full command) and time constant (s).
    /// Non-positive values keep the defaults.
    pub fn with_dynamics(mut self, max_speed: f32, tau: f32) -> Self {
        if max_speed > 0.0 {
            self.max_speed = max_speed;
        }
        if tau > 0.0 {
            self.tau = tau;
        }
        self
    }

    fn advance(&self) {
        let now = self.clock.now();
        let dt = now.saturating_sub(self.updated.get()).as_secs_f32();
        if dt <= 0.0 {
            return;
        }

        let target = self.max_speed * self.command.get() as f32 / COMMAND_MAX as f32;
        let v0 = self.velocity.get();
        // Backward-Euler step of tau * dv/dt = target - v; stable for any dt.
        let v1 = v0 + (target - v0) * (dt / (self.tau + dt));
        self.position.set(self.position.get() + 0.5 * (v0 + v1) * dt);
        self.velocity.set(v1);
        self.updated.set(now);
    }

    /// Absolute position in ticks, ignoring the encoder zero.
    pub fn position(&self) -> i32 {
        self.advance();
        round(self.position.get())
    }

    pub fn velocity(&self) -> f32 {
        self.advance();
        self.velocity.get()
    }

    /// Last applied command.
    pub fn command(&self) -> i32 {
        self.command.get()
    }

    pub fn encoder(&self) -> SimEncoder<'_, 'c, C> {
        SimEncoder { plant: self }
    }

    pub fn actuator(&self) -> SimActuator<'_, 'c, C> {
        SimActuator { plant: self }
    }
}

fn round(x: f32) -> i32 {
    if x >= 0.0 {
        (x + 0.5) as i32
    } else {
        (x - 0.5) as i32
    }
}

/// Encoder view of a [`SimPlant`].
pub struct SimEncoder<'p, 'c, C: Clock + ?Sized> {
    plant: &'p SimPlant<'c, C>,
}

impl<C: Clock + ?Sized> Encoder for SimEncoder<'_, '_, C> {
    fn read(&mut self) -> i32 {
        self.plant.advance();
        round(self.plant.position.get() - self.plant.offset.get())
    }

    fn zero(&mut self) {
        self.plant.advance();
        self.plant.offset.set(self.plant.position.get());
    }
}

/// Actuator view of a [`SimPlant`].
pub struct SimActuator<'p, 'c, C: Clock + ?Sized> {
    plant: &'p SimPlant<'c, C>,
}

impl<C: Clock + ?Sized> Actuator for SimActuator<'_, '_, C> {
    fn set_command(&mut self, level: i32) {
        self.plant.advance();
        self.plant.command.set(level.clamp(COMMAND_MIN, COMMAND_MAX));
    }
}
