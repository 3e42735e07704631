//! # Task
//!
//! A task couples a resumable body with its scheduling parameters and
//! optional diagnostics. The scheduler calls [`Task::run_if_due`] once per
//! pass; the task resumes its body only when its period has elapsed since the
//! previous resumption.
//!
//! ## Body contract
//!
//! A body is an explicit state machine: [`TaskBody::resume`] performs one
//! bounded increment of work and returns, reporting the state number it
//! stopped in. Anything that would wait must be written as check-and-return
//! so other tasks keep being served. A body that never returns stalls every
//! task; the scheduler does not detect this.

use core::fmt;
use core::time::Duration;

use crate::clock::Clock;
use crate::config::{MIN_PRIORITY, TRACE_CAPACITY};
use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Body
// ---------------------------------------------------------------------------

/// Resumable unit of work run by a [`Task`].
pub trait TaskBody {
    /// Run one increment. `now` is the scheduler time of this resumption.
    /// Returns the body's state number, recorded by tracing.
    fn resume(&mut self, now: Duration) -> u8;
}

impl<F> TaskBody for F
where
    F: FnMut(Duration) -> u8,
{
    #[inline]
    fn resume(&mut self, now: Duration) -> u8 {
        self(now)
    }
}

// ---------------------------------------------------------------------------
// Task state machine
// ---------------------------------------------------------------------------

/// Scheduling state of a task.
///
/// ```text
///   ┌──────┐  due   ┌─────────┐  return  ┌───────────┐
///   │ Idle │ ─────► │ Running │ ───────► │ Suspended │
///   └──────┘        └─────────┘ ◄─────── └───────────┘
///                                  due
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Registered, never resumed.
    Idle,
    /// Body is on the call stack.
    Running,
    /// Body returned; waiting for the next due time.
    Suspended,
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Scheduling parameters, fixed once the task is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskConfig {
    /// Higher runs first. Range `MIN_PRIORITY..=255`.
    pub priority: u8,
    /// Minimum time between resumptions. Must be non-zero.
    pub period: Duration,
    /// Record run counts and durations.
    pub profile: bool,
    /// Record state transitions. Keep off outside debugging.
    pub trace: bool,
}

impl TaskConfig {
    pub const fn new(priority: u8, period: Duration) -> Self {
        Self {
            priority,
            period,
            profile: false,
            trace: false,
        }
    }

    pub const fn with_profile(mut self, profile: bool) -> Self {
        self.profile = profile;
        self
    }

    pub const fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.period.is_zero() {
            return Err(ConfigError::InvalidPeriod);
        }
        if self.priority < MIN_PRIORITY {
            return Err(ConfigError::InvalidPriority(self.priority));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Profiling
// ---------------------------------------------------------------------------

/// Run statistics of a profiled task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Profile {
    pub runs: u32,
    pub total: Duration,
    pub min: Option<Duration>,
    pub max: Duration,
    /// Sum of the time each resumption started after its due time.
    pub late_total: Duration,
}

impl Profile {
    fn record(&mut self, duration: Duration, lateness: Duration) {
        self.runs = self.runs.saturating_add(1);
        self.total += duration;
        self.max = self.max.max(duration);
        self.min = Some(self.min.map_or(duration, |m| m.min(duration)));
        self.late_total += lateness;
    }

    pub fn average(&self) -> Duration {
        if self.runs == 0 {
            Duration::ZERO
        } else {
            self.total / self.runs
        }
    }

    pub fn average_lateness(&self) -> Duration {
        if self.runs == 0 {
            Duration::ZERO
        } else {
            self.late_total / self.runs
        }
    }
}

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// One recorded state change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraceEntry {
    /// Scheduler time of the resumption that produced `state`.
    pub at: Duration,
    pub state: u8,
}

/// Ring of the most recent [`TRACE_CAPACITY`] transitions.
#[derive(Debug, Clone)]
pub struct Trace {
    entries: [TraceEntry; TRACE_CAPACITY],
    head: usize,
    len: usize,
}

impl Trace {
    const fn new() -> Self {
        Self {
            entries: [TraceEntry {
                at: Duration::ZERO,
                state: 0,
            }; TRACE_CAPACITY],
            head: 0,
            len: 0,
        }
    }

    fn push(&mut self, entry: TraceEntry) {
        let idx = (self.head + self.len) % TRACE_CAPACITY;
        self.entries[idx] = entry;
        if self.len < TRACE_CAPACITY {
            self.len += 1;
        } else {
            self.head = (self.head + 1) % TRACE_CAPACITY;
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Entries from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = TraceEntry> + '_ {
        (0..self.len).map(move |i| self.entries[(self.head + i) % TRACE_CAPACITY])
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for e in self.iter() {
            writeln!(f, "{:>12.3} ms: {}", e.at.as_secs_f64() * 1000.0, e.state)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// A registered unit of cooperative work.
pub struct Task<'a> {
    name: &'static str,
    config: TaskConfig,
    body: &'a mut (dyn TaskBody + 'a),
    state: TaskState,
    last_run: Option<Duration>,
    last_body_state: Option<u8>,
    profile: Profile,
    trace: Trace,
}

impl<'a> Task<'a> {
    /// Build a task around `body`.
    ///
    /// Shares the body exchanges data through are handed to the body itself
    /// when it is constructed; the task only drives it.
    ///
    /// # Errors
    /// `InvalidPeriod` for a zero period, `InvalidPriority` below
    /// [`MIN_PRIORITY`].
    pub fn new(
        name: &'static str,
        body: &'a mut (dyn TaskBody + 'a),
        config: TaskConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            name,
            config,
            body,
            state: TaskState::Idle,
            last_run: None,
            last_body_state: None,
            profile: Profile::default(),
            trace: Trace::new(),
        })
    }

    /// Whether the task may run at `now`. A task that never ran is due
    /// immediately.
    pub fn is_due(&self, now: Duration) -> bool {
        match self.last_run {
            Some(last) => now.saturating_sub(last) >= self.config.period,
            None => true,
        }
    }

    /// Resume the body if the period has elapsed since the last resumption.
    ///
    /// Elapsed time is measured from the previous resumption, not from a
    /// fixed grid: a task that starts late stays shifted.
    ///
    /// Returns whether the body ran.
    pub fn run_if_due<C: Clock + ?Sized>(&mut self, clock: &C) -> bool {
        let now = clock.now();
        if !self.is_due(now) {
            return false;
        }

        let lateness = self
            .last_run
            .map_or(Duration::ZERO, |last| now - last - self.config.period);

        self.state = TaskState::Running;
        let body_state = self.body.resume(now);
        self.state = TaskState::Suspended;
        self.last_run = Some(now);

        if self.config.profile {
            let duration = clock.now().saturating_sub(now);
            self.profile.record(duration, lateness);
        }
        if self.config.trace && self.last_body_state != Some(body_state) {
            self.trace.push(TraceEntry {
                at: now,
                state: body_state,
            });
        }
        self.last_body_state = Some(body_state);

        log::trace!("{} resumed at {:?}, state {}", self.name, now, body_state);
        true
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn priority(&self) -> u8 {
        self.config.priority
    }

    pub fn period(&self) -> Duration {
        self.config.period
    }

    pub fn config(&self) -> &TaskConfig {
        &self.config
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn last_run(&self) -> Option<Duration> {
        self.last_run
    }

    /// Run statistics; all zero unless profiling is enabled.
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn reset_profile(&mut self) {
        self.profile = Profile::default();
    }

    /// Recorded transitions; empty unless tracing is enabled.
    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    pub fn is_tracing(&self) -> bool {
        self.config.trace
    }
}

impl fmt::Debug for Task<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("state", &self.state)
            .field("last_run", &self.last_run)
            .field("profile", &self.profile)
            .finish_non_exhaustive()
    }
}

fn ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

impl fmt::Display for Task<'_> {
    /// One row of the task table, matching `TaskList`'s header.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<16} {:>4} {:>10.1} {:>8}",
            self.name,
            self.config.priority,
            ms(self.config.period),
            self.profile.runs
        )?;
        if self.config.profile {
            write!(
                f,
                " {:>10.3} {:>10.3} {:>10.3}",
                ms(self.profile.average()),
                ms(self.profile.max),
                ms(self.profile.average_lateness())
            )
        } else {
            write!(f, " {:>10} {:>10} {:>10}", "-", "-", "-")
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::vec::Vec;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_config_validation() {
        assert_eq!(
            TaskConfig::new(1, Duration::ZERO).validate(),
            Err(ConfigError::InvalidPeriod)
        );
        assert_eq!(
            TaskConfig::new(0, ms(10)).validate(),
            Err(ConfigError::InvalidPriority(0))
        );
        assert_eq!(TaskConfig::new(255, ms(10)).validate(), Ok(()));
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut body = |_: Duration| 0u8;
        let res = Task::new("bad", &mut body, TaskConfig::new(1, Duration::ZERO));
        assert!(matches!(res, Err(ConfigError::InvalidPeriod)));
    }

    #[test]
    fn test_runs_measured_from_last_run() {
        let clock = ManualClock::new();
        let mut runs = Vec::new();
        let mut body = |now: Duration| {
            runs.push(now);
            0u8
        };
        {
            let mut task = Task::new("t", &mut body, TaskConfig::new(1, ms(40))).unwrap();
            assert_eq!(task.state(), TaskState::Idle);

            let mut ran = Vec::new();
            for t in [0, 10, 40, 41, 79, 80] {
                clock.set_millis(t);
                ran.push(task.run_if_due(&clock));
            }
            assert_eq!(ran, [true, false, true, false, false, true]);
            assert_eq!(task.state(), TaskState::Suspended);
            assert_eq!(task.last_run(), Some(ms(80)));
        }
        assert_eq!(runs, [ms(0), ms(40), ms(80)]);
    }

    #[test]
    fn test_late_start_shifts_schedule() {
        let clock = ManualClock::new();
        let mut body = |_: Duration| 0u8;
        let mut task = Task::new("t", &mut body, TaskConfig::new(1, ms(40))).unwrap();

        clock.set_millis(0);
        assert!(task.run_if_due(&clock));
        clock.set_millis(55);
        assert!(task.run_if_due(&clock));
        // Next due at 95, not 80.
        clock.set_millis(80);
        assert!(!task.run_if_due(&clock));
        clock.set_millis(95);
        assert!(task.run_if_due(&clock));
    }

    #[test]
    fn test_profile_records_duration_and_lateness() {
        let clock = ManualClock::new();
        let work = ms(3);
        let mut body = |_: Duration| {
            clock.advance(work);
            0u8
        };
        let config = TaskConfig::new(1, ms(10)).with_profile(true);
        let mut task = Task::new("t", &mut body, config).unwrap();

        clock.set_millis(0);
        task.run_if_due(&clock);
        clock.set_millis(12);
        task.run_if_due(&clock);

        let p = *task.profile();
        assert_eq!(p.runs, 2);
        assert_eq!(p.total, ms(6));
        assert_eq!(p.min, Some(ms(3)));
        assert_eq!(p.max, ms(3));
        assert_eq!(p.late_total, ms(2));
        assert_eq!(p.average(), ms(3));

        task.reset_profile();
        assert_eq!(task.profile().runs, 0);
    }

    #[test]
    fn test_unprofiled_task_keeps_zero_stats() {
        let clock = ManualClock::new();
        let mut body = |_: Duration| 0u8;
        let mut task = Task::new("t", &mut body, TaskConfig::new(1, ms(10))).unwrap();
        task.run_if_due(&clock);
        assert_eq!(*task.profile(), Profile::default());
    }

    #[test]
    fn test_trace_records_state_changes_only() {
        let clock = ManualClock::new();
        let states = [0u8, 0, 1, 1, 2, 0];
        let mut i = 0;
        let mut body = |_: Duration| {
            let s = states[i];
            i += 1;
            s
        };
        let config = TaskConfig::new(1, ms(1)).with_trace(true);
        let mut task = Task::new("t", &mut body, config).unwrap();
        for t in 0..6 {
            clock.set_millis(t);
            assert!(task.run_if_due(&clock));
        }

        let trace: Vec<_> = task.trace().iter().map(|e| (e.at, e.state)).collect();
        assert_eq!(trace, [(ms(0), 0), (ms(2), 1), (ms(4), 2), (ms(5), 0)]);
    }

    #[test]
    fn test_trace_ring_evicts_oldest() {
        let clock = ManualClock::new();
        let mut n = 0u8;
        let mut body = |_: Duration| {
            n = n.wrapping_add(1);
            n
        };
        let config = TaskConfig::new(1, ms(1)).with_trace(true);
        let mut task = Task::new("t", &mut body, config).unwrap();
        let total = TRACE_CAPACITY + 5;
        for t in 0..total as u64 {
            clock.set_millis(t);
            task.run_if_due(&clock);
        }

        let trace = task.trace();
        assert_eq!(trace.len(), TRACE_CAPACITY);
        let first = trace.iter().next().unwrap();
        assert_eq!(first.state, 6);
        assert_eq!(trace.iter().last().unwrap().state as usize, total);
    }

    #[test]
    fn test_trace_disabled_by_default() {
        let clock = ManualClock::new();
        let mut body = |_: Duration| 3u8;
        let mut task = Task::new("t", &mut body, TaskConfig::new(1, ms(1))).unwrap();
        task.run_if_due(&clock);
        assert!(!task.is_tracing());
        assert!(task.trace().is_empty());
    }
}
