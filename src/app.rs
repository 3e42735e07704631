//! # Motor-Control Application
//!
//! Task bodies for the demo: a control task streaming a step response and
//! then publishing a counter, and a monitor task reading what was published.
//!
//! | Body | Shares | Behavior |
//! |------|--------|----------|
//! | [`MotorControlTask`] | writes share + queue | P-control for N steps, sentinel, then counter |
//! | [`MonitorTask`] | reads share, drains queue | logs a summary each run |

use core::fmt;
use core::time::Duration;

use log::{debug, info, warn};

use crate::config::{CONTROL_STEPS, DEFAULT_GAIN, DEFAULT_SETPOINT};
use crate::control::ProportionalController;
use crate::hal::{Actuator, Encoder};
use crate::queue::SharedQueue;
use crate::share::{Protected, Protection, SharedCell};
use crate::task::TaskBody;
use crate::telemetry::{Record, SerialLog};

/// Phase of [`MotorControlTask`]; the discriminant is the state number it
/// reports to tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ControlPhase {
    /// Not yet resumed; the encoder is zeroed on the first resumption.
    Start = 0,
    /// One encoder read, record, control update per resumption.
    Stepping = 1,
    /// Step response done; publishing the counter. The resumption that ends
    /// the stream already publishes the first value.
    Publishing = 2,
}

/// Runs the proportional loop for a fixed number of steps, one step per
/// resumption, streaming a telemetry record each time. Afterwards it stops
/// the actuator, ends the stream, and publishes an incrementing counter into
/// a share and a queue on every resumption.
pub struct MotorControlTask<'a, E, A, W, const N: usize, P = Protected>
where
    W: fmt::Write,
    P: Protection,
{
    source: &'static str,
    encoder: E,
    actuator: A,
    controller: ProportionalController,
    setpoint: i32,
    steps: u32,
    step: u32,
    serial: &'a SerialLog<W>,
    counter_share: &'a SharedCell<i16, P>,
    counter_queue: &'a SharedQueue<u32, N, P>,
    counter: u32,
    dropped: u32,
    start: Duration,
    phase: ControlPhase,
}

impl<'a, E, A, W, const N: usize, P> MotorControlTask<'a, E, A, W, N, P>
where
    E: Encoder,
    A: Actuator,
    W: fmt::Write,
    P: Protection,
{
    pub fn new(
        source: &'static str,
        encoder: E,
        actuator: A,
        serial: &'a SerialLog<W>,
        counter_share: &'a SharedCell<i16, P>,
        counter_queue: &'a SharedQueue<u32, N, P>,
    ) -> Self {
        Self {
            source,
            encoder,
            actuator,
            controller: ProportionalController::new(DEFAULT_GAIN),
            setpoint: DEFAULT_SETPOINT,
            steps: CONTROL_STEPS,
            step: 0,
            serial,
            counter_share,
            counter_queue,
            counter: 0,
            dropped: 0,
            start: Duration::ZERO,
            phase: ControlPhase::Start,
        }
    }

    pub fn with_controller(mut self, controller: ProportionalController) -> Self {
        self.controller = controller;
        self
    }

    pub fn with_setpoint(mut self, setpoint: i32) -> Self {
        self.setpoint = setpoint;
        self
    }

    pub fn with_steps(mut self, steps: u32) -> Self {
        self.steps = steps;
        self
    }

    fn control_step(&mut self, now: Duration) {
        if self.step >= self.steps {
            self.actuator.set_command(0);
            match self.serial.stop() {
                Ok(true) => info!("{}: step response done, {} samples", self.source, self.step),
                Ok(false) => {}
                Err(_) => warn!("{}: failed to write end of stream", self.source),
            }
            self.phase = ControlPhase::Publishing;
            self.publish();
            return;
        }

        let position = self.encoder.read();
        let record = Record {
            source: self.source,
            elapsed_ms: now.saturating_sub(self.start).as_millis() as u64,
            position,
        };
        if self.serial.record(&record).is_err() {
            warn!("{}: serial write failed at step {}", self.source, self.step);
        }

        let level = self.controller.run(self.setpoint, position);
        self.actuator.set_command(level);
        self.step += 1;
    }

    fn publish(&mut self) {
        self.counter_share.put_wrapping(i64::from(self.counter));
        if let Err(e) = self.counter_queue.put(self.counter) {
            self.dropped = self.dropped.saturating_add(1);
            debug!("{}: {}, dropped {}", self.source, e, self.counter);
        }
        self.counter = self.counter.wrapping_add(1);
    }

    pub fn phase(&self) -> ControlPhase {
        self.phase
    }

    /// Control steps completed.
    pub fn steps_done(&self) -> u32 {
        self.step
    }

    /// Next counter value to publish.
    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// Counter values lost to a full queue.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    pub fn controller(&self) -> &ProportionalController {
        &self.controller
    }
}

impl<E, A, W, const N: usize, P> TaskBody for MotorControlTask<'_, E, A, W, N, P>
where
    E: Encoder,
    A: Actuator,
    W: fmt::Write,
    P: Protection,
{
    fn resume(&mut self, now: Duration) -> u8 {
        match self.phase {
            ControlPhase::Start => {
                self.encoder.zero();
                self.start = now;
                self.phase = ControlPhase::Stepping;
                self.control_step(now);
            }
            ControlPhase::Stepping => self.control_step(now),
            ControlPhase::Publishing => self.publish(),
        }
        self.phase as u8
    }
}

/// Reads the counter share and drains the counter queue on every run.
pub struct MonitorTask<'a, const N: usize, P: Protection = Protected> {
    share: &'a SharedCell<i16, P>,
    queue: &'a SharedQueue<u32, N, P>,
    received: u64,
    last: Option<u32>,
}

impl<'a, const N: usize, P: Protection> MonitorTask<'a, N, P> {
    pub fn new(share: &'a SharedCell<i16, P>, queue: &'a SharedQueue<u32, N, P>) -> Self {
        Self {
            share,
            queue,
            received: 0,
            last: None,
        }
    }

    /// Total values taken off the queue.
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Most recent value taken off the queue.
    pub fn last(&self) -> Option<u32> {
        self.last
    }
}

impl<const N: usize, P: Protection> TaskBody for MonitorTask<'_, N, P> {
    fn resume(&mut self, _now: Duration) -> u8 {
        let share = self.share.get();
        let mut first = None;
        let mut drained = 0u32;
        while self.queue.any() {
            match self.queue.get() {
                Ok(v) => {
                    first.get_or_insert(v);
                    self.last = Some(v);
                    drained += 1;
                }
                Err(_) => break,
            }
        }
        self.received += u64::from(drained);

        match (first, self.last) {
            (Some(a), Some(b)) if drained > 0 => {
                info!("Share: {}, Queue: {} value(s) {}..={}", share, drained, a, b)
            }
            _ => info!("Share: {}, Queue: empty", share),
        }
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::share::Unprotected;
    use crate::sim::SimPlant;
    use crate::telemetry::{parse_line, Line};
    use std::string::String;

    #[test]
    fn test_control_task_phases() {
        let clock = ManualClock::new();
        let plant = SimPlant::new(&clock);
        let serial = SerialLog::new(String::new());
        let share: SharedCell<i16> = SharedCell::new("Share 0");
        let queue: SharedQueue<u32, 4> = SharedQueue::new("Queue 0", false).unwrap();

        let mut task = MotorControlTask::new(
            "Motor 1",
            plant.encoder(),
            plant.actuator(),
            &serial,
            &share,
            &queue,
        )
        .with_steps(3);

        let mut states = [0u8; 6];
        for (i, s) in states.iter_mut().enumerate() {
            clock.set_millis(i as u64 * 10);
            *s = task.resume(clock.now());
        }
        // Three steps, the finishing run (which publishes 0), two publishes.
        assert_eq!(states, [1, 1, 1, 2, 2, 2]);
        assert_eq!(task.steps_done(), 3);
        assert_eq!(task.counter(), 3);
        assert_eq!(plant.command(), 0);
        assert_eq!(share.get(), 2);
        assert_eq!(queue.size(), 3);

        let out = serial.into_inner();
        let lines: std::vec::Vec<_> = out.split_inclusive('\n').collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(parse_line(lines[3]), Some(Line::Stop));
        match parse_line(lines[1]) {
            Some(Line::Record(r)) => {
                assert_eq!(r.source, "Motor 1");
                assert_eq!(r.elapsed_ms, 10);
            }
            other => panic!("unexpected line {:?}", other),
        }
    }

    #[test]
    fn test_control_drives_toward_setpoint() {
        let clock = ManualClock::new();
        let plant = SimPlant::new(&clock);
        let serial = SerialLog::new(String::new());
        let share: SharedCell<i16> = SharedCell::new("s");
        let queue: SharedQueue<u32, 4> = SharedQueue::new("q", false).unwrap();
        let mut task = MotorControlTask::new(
            "Motor 1",
            plant.encoder(),
            plant.actuator(),
            &serial,
            &share,
            &queue,
        )
        .with_setpoint(1000)
        .with_controller(ProportionalController::new(0.1));

        task.resume(clock.now());
        assert_eq!(plant.command(), 100);
        clock.set_millis(10);
        task.resume(clock.now());
        assert!(plant.command() > 0);
        assert!(task.controller().last_error() < 1000);
    }

    #[test]
    fn test_publish_counts_drops() {
        let clock = ManualClock::new();
        let plant = SimPlant::new(&clock);
        let serial = SerialLog::new(String::new());
        let share: SharedCell<i16, Unprotected> = SharedCell::new("s");
        let queue: SharedQueue<u32, 2, Unprotected> = SharedQueue::new("q", false).unwrap();
        let mut task = MotorControlTask::new(
            "Motor 1",
            plant.encoder(),
            plant.actuator(),
            &serial,
            &share,
            &queue,
        )
        .with_steps(0);

        for _ in 0..6 {
            task.resume(clock.now());
        }
        // Every run publishes, the first one also ends the empty stream.
        assert_eq!(task.counter(), 6);
        assert_eq!(queue.size(), 2);
        assert_eq!(task.dropped(), 4);
        assert_eq!(share.get(), 5);
        assert_eq!(queue.get(), Ok(0));
    }

    #[test]
    fn test_monitor_drains_queue() {
        let share: SharedCell<i16> = SharedCell::new("s");
        let queue: SharedQueue<u32, 8> = SharedQueue::new("q", false).unwrap();
        let mut monitor = MonitorTask::new(&share, &queue);

        assert_eq!(monitor.resume(Duration::ZERO), 0);
        assert_eq!(monitor.received(), 0);

        for v in 10..15 {
            queue.put(v).unwrap();
        }
        share.put(14);
        monitor.resume(Duration::ZERO);
        assert_eq!(monitor.received(), 5);
        assert_eq!(monitor.last(), Some(14));
        assert!(!queue.any());
    }
}
