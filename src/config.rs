//! # Configuration
//!
//! Compile-time constants governing the scheduler, the shared primitives and
//! the motor-control application. All limits are fixed at compile time, no
//! dynamic allocation.

/// Maximum number of tasks a [`TaskList`](crate::scheduler::TaskList) holds
/// by default. Each slot is inline in the list, so raise with care.
pub const MAX_TASKS: usize = 8;

/// Maximum number of shares a [`ShareRegistry`](crate::share::ShareRegistry)
/// tracks by default.
pub const MAX_SHARES: usize = 8;

/// Number of state transitions kept per traced task. Older entries are
/// overwritten once the ring is full.
pub const TRACE_CAPACITY: usize = 32;

/// Lowest valid task priority. `0` is rejected at construction.
pub const MIN_PRIORITY: u8 = 1;

/// Actuator command range (signed duty cycle, percent).
pub const COMMAND_MIN: i32 = -100;
pub const COMMAND_MAX: i32 = 100;

/// Proportional gain used by the demo controller, in duty percent per
/// encoder tick.
pub const DEFAULT_GAIN: f32 = 0.01;

/// Demo setpoint in encoder ticks.
pub const DEFAULT_SETPOINT: i32 = 8000;

/// Number of control iterations streamed before the sentinel is sent.
pub const CONTROL_STEPS: u32 = 300;

/// Control task period in milliseconds.
pub const CONTROL_PERIOD_MS: u64 = 10;

/// Monitor task period in milliseconds.
pub const MONITOR_PERIOD_MS: u64 = 1500;

/// Capacity of the demo counter queue.
pub const QUEUE_CAPACITY: usize = 16;

/// Source tag written at the start of every telemetry record.
pub const SOURCE_TAG: &str = "Motor 1";
