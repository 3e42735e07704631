//! # coopsched — Cooperative Priority Scheduler
//!
//! A run-to-completion task scheduler for single-core motor-control
//! firmware, with the shared-data primitives its tasks talk through.
//!
//! ## Overview
//!
//! Each task wraps a resumable body and a period. The application calls
//! [`TaskList::pri_sched`](scheduler::TaskList::pri_sched) in a tight loop;
//! every pass resumes each task whose period has elapsed, highest priority
//! first. A body does one bounded slice of work per resumption and returns a
//! small state number, so nothing is preempted and nothing needs a stack of
//! its own.
//!
//! Data crosses between tasks (and interrupt handlers) through
//! [`SharedCell`](share::SharedCell) and [`SharedQueue`](queue::SharedQueue),
//! which wrap every access in a critical section unless their type says
//! `Unprotected`.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │            Application Bodies (app.rs)                  │
//! │      MotorControlTask · MonitorTask                     │
//! ├───────────────┬──────────────────┬─────────────────────┤
//! │  Scheduler    │  Control         │  Telemetry          │
//! │  scheduler.rs │  control.rs      │  telemetry.rs       │
//! │  ─ append()   │  ─ command()     │  ─ record()         │
//! │  ─ pri_sched()│  ─ run()         │  ─ stop()           │
//! │  ─ rr_sched() │                  │                     │
//! ├───────────────┴──────────────────┴─────────────────────┤
//! │       Task Model (task.rs)                              │
//! │  Task · TaskConfig · Profile · Trace                    │
//! ├──────────────────────────┬─────────────────────────────┤
//! │  Shares (share.rs)       │  Queues (queue.rs)          │
//! │  SharedCell · Registry   │  SharedQueue                │
//! ├──────────────────────────┴─────────────────────────────┤
//! │  sync.rs (critical sections) · clock.rs · hal.rs        │
//! ├────────────────────────────────────────────────────────┤
//! │  Board: Encoder / Actuator impls, or sim.rs on a host   │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Memory Model
//!
//! - **No heap**: task lists, queues and traces are fixed-size arrays
//! - **Borrowed bodies**: a [`Task`](task::Task) holds `&mut dyn TaskBody`,
//!   so bodies live wherever the application puts them
//! - **Critical sections**: `critical_section::with()` around protected
//!   share and queue accesses
//!
//! ## Features
//!
//! - `std` (default): host demo binary, [`StepResponse`](telemetry::StepResponse)
//!   collection and `std::error::Error` impls. Disable for firmware builds.

#![no_std]

#[cfg(any(test, feature = "std"))]
extern crate std;

// Links the single-core critical-section implementation.
#[cfg(all(target_arch = "arm", target_os = "none"))]
use cortex_m as _;

pub mod app;
pub mod clock;
pub mod config;
pub mod control;
pub mod error;
pub mod hal;
pub mod queue;
pub mod scheduler;
pub mod share;
pub mod sim;
pub mod sync;
pub mod task;
pub mod telemetry;

pub use clock::Clock;
pub use error::{ConfigError, QueueError};
pub use queue::SharedQueue;
pub use scheduler::TaskList;
pub use share::{Protected, ShareRegistry, SharedCell, Unprotected};
pub use task::{Task, TaskBody, TaskConfig};
