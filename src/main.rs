//! # coopsched Demo
//!
//! Runs the motor-control application on a host against a simulated motor:
//!
//! | Task | Body | Priority | Period | Behavior |
//! |------|------|----------|--------|----------|
//! | `Task_1` | `MotorControlTask` | 1 | 10 ms | P-control step response, then counter publishing |
//! | `Task_2` | `MonitorTask` | 2 | 1500 ms | Reads the share, drains the queue |
//!
//! Telemetry records go to stdout, logs and diagnostic tables to stderr, so
//! the stream can be piped into `coopsched-demo collect`.
//!
//! Runs until Ctrl-C (or `--duration`), then ends the stream with the
//! sentinel and prints the task and share tables.

use core::fmt;
use std::fs::File;
use std::io::{self, BufReader, Write as _};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};

use coopsched::app::{MonitorTask, MotorControlTask};
use coopsched::config::{
    CONTROL_PERIOD_MS, CONTROL_STEPS, DEFAULT_GAIN, DEFAULT_SETPOINT, MONITOR_PERIOD_MS,
    QUEUE_CAPACITY, SOURCE_TAG,
};
use coopsched::control::ProportionalController;
use coopsched::share::{Protected, Protection, Unprotected};
use coopsched::sim::SimPlant;
use coopsched::telemetry::{SerialLog, StepResponse};
use coopsched::{Clock, ShareRegistry, SharedCell, SharedQueue, Task, TaskConfig, TaskList};

#[derive(Parser, Debug)]
#[command(name = "coopsched-demo", version, about = "Cooperative scheduler motor-control demo")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Summarize a captured telemetry stream
    Collect {
        /// Capture file; standard input when omitted
        input: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Proportional gain, duty percent per encoder tick
    #[arg(long, default_value_t = DEFAULT_GAIN)]
    gain: f32,

    /// Target position in encoder ticks
    #[arg(long, default_value_t = DEFAULT_SETPOINT, allow_hyphen_values = true)]
    setpoint: i32,

    /// Control iterations before the stream ends
    #[arg(long, default_value_t = CONTROL_STEPS)]
    steps: u32,

    /// Control task period in ms
    #[arg(long, default_value_t = CONTROL_PERIOD_MS)]
    control_period: u64,

    /// Monitor task period in ms
    #[arg(long, default_value_t = MONITOR_PERIOD_MS)]
    monitor_period: u64,

    #[arg(long, default_value_t = 1)]
    control_priority: u8,

    #[arg(long, default_value_t = 2)]
    monitor_priority: u8,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long)]
    duration: Option<u64>,

    /// Record control task state changes and print them on exit
    #[arg(long)]
    trace: bool,

    /// Let the counter queue overwrite its oldest entry when full
    #[arg(long)]
    overwrite: bool,

    /// Wrap share and queue accesses in critical sections
    #[arg(long)]
    protect: bool,

    /// Dispatch round-robin instead of by priority
    #[arg(long)]
    round_robin: bool,
}

/// Wall-clock time since the demo started.
struct HostClock(Instant);

impl Clock for HostClock {
    fn now(&self) -> Duration {
        self.0.elapsed()
    }
}

/// Stands in for the board's serial port.
struct StdoutSerial(io::Stdout);

impl fmt::Write for StdoutSerial {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let mut out = self.0.lock();
        out.write_all(s.as_bytes())
            .and_then(|_| out.flush())
            .map_err(|_| fmt::Error)
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Some(Command::Collect { input }) => collect(input.as_deref()),
        None => run(&cli.run),
    }
}

fn run(args: &RunArgs) -> Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl-C handler")?;

    if args.protect {
        run_with::<Protected>(args, &running)
    } else {
        run_with::<Unprotected>(args, &running)
    }
}

fn run_with<P: Protection>(args: &RunArgs, running: &AtomicBool) -> Result<()> {
    let clock = HostClock(Instant::now());
    let plant = SimPlant::new(&clock);
    let serial = SerialLog::new(StdoutSerial(io::stdout()));

    let share: SharedCell<i16, P> = SharedCell::new("Share 0");
    let queue: SharedQueue<u32, QUEUE_CAPACITY, P> = SharedQueue::new("Queue 0", args.overwrite)?;

    let mut registry: ShareRegistry = ShareRegistry::new();
    registry.register(&share)?;
    registry.register(&queue)?;

    let mut control = MotorControlTask::new(
        SOURCE_TAG,
        plant.encoder(),
        plant.actuator(),
        &serial,
        &share,
        &queue,
    )
    .with_controller(ProportionalController::new(args.gain))
    .with_setpoint(args.setpoint)
    .with_steps(args.steps);
    let mut monitor = MonitorTask::new(&share, &queue);

    let deadline = args.duration.map(Duration::from_secs);
    {
        let control_cfg = TaskConfig::new(
            args.control_priority,
            Duration::from_millis(args.control_period),
        )
        .with_profile(true)
        .with_trace(args.trace);
        let monitor_cfg = TaskConfig::new(
            args.monitor_priority,
            Duration::from_millis(args.monitor_period),
        )
        .with_profile(true);

        let mut tasks: TaskList = TaskList::new();
        tasks
            .append(Task::new("Task_1", &mut control, control_cfg)?)
            .context("Failed to register Task_1")?;
        tasks
            .append(Task::new("Task_2", &mut monitor, monitor_cfg)?)
            .context("Failed to register Task_2")?;

        info!(
            "Scheduling {} tasks ({}), press Ctrl-C to stop",
            tasks.len(),
            if args.round_robin { "round robin" } else { "priority" }
        );

        while running.load(Ordering::SeqCst) && deadline.map_or(true, |d| clock.now() < d) {
            let ran = if args.round_robin {
                tasks.rr_sched(&clock)
            } else {
                tasks.pri_sched(&clock)
            };
            if ran == 0 {
                std::hint::spin_loop();
            }
        }

        info!("Stopping after {:.3} s", clock.now().as_secs_f64());
        match serial.stop() {
            Ok(true) => info!("Telemetry stream closed early"),
            Ok(false) => {}
            Err(_) => warn!("Failed to write end of telemetry stream"),
        }

        eprint!("\n{}", tasks);
        if let Some(task) = tasks.get("Task_1") {
            if task.is_tracing() {
                eprint!("\nTask_1 state changes:\n{}", task.trace());
            }
        }
    }

    eprint!("\n{}", registry);
    info!(
        "Monitor received {} value(s), control dropped {}",
        monitor.received(),
        control.dropped()
    );
    Ok(())
}

fn collect(input: Option<&Path>) -> Result<()> {
    let response = match input {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            StepResponse::from_reader(BufReader::new(file))?
        }
        None => StepResponse::from_reader(io::stdin().lock())?,
    };

    if !response.is_finished() {
        warn!("Stream ended without the end marker");
    }
    if response.skipped() > 0 {
        warn!("Skipped {} malformed line(s)", response.skipped());
    }

    for source in response.sources() {
        let samples = response.series(source).unwrap_or(&[]);
        if let (Some(first), Some(last)) = (samples.first(), samples.last()) {
            println!(
                "{}: {} samples over {} ms, position {} -> {}",
                source,
                samples.len(),
                last.0.saturating_sub(first.0),
                first.1,
                last.1
            );
        }
    }
    Ok(())
}
