//! # Scheduler
//!
//! Cooperative, priority-ordered dispatch over a fixed set of tasks.
//!
//! ## Scheduling Algorithm
//!
//! Each call to [`TaskList::pri_sched`] is one pass:
//! 1. Walk the tasks in descending priority (ties in registration order)
//! 2. Give each task exactly one due-check via [`Task::run_if_due`]
//! 3. Return how many bodies ran
//!
//! The enclosing loop calls passes forever; the list itself never stops.
//! Stopping is the caller's business (e.g. a Ctrl-C flag checked between
//! passes).
//!
//! ## Latency
//!
//! A task runs at most once per pass. If its period is shorter than the time
//! a pass takes, it falls behind its nominal rate instead of being run twice;
//! in exchange, one pass costs at most one resumption per task. A body that
//! does not return promptly delays every task behind it.

use core::fmt;

use crate::clock::Clock;
use crate::config::MAX_TASKS;
use crate::error::ConfigError;
use crate::task::Task;

/// The registered tasks, kept sorted for priority dispatch.
pub struct TaskList<'a, const N: usize = MAX_TASKS> {
    tasks: [Option<Task<'a>>; N],
    len: usize,
    /// Starting slot of the next round-robin pass.
    rr_next: usize,
}

impl<'a, const N: usize> TaskList<'a, N> {
    pub fn new() -> Self {
        Self {
            tasks: core::array::from_fn(|_| None),
            len: 0,
            rr_next: 0,
        }
    }

    /// Register a task.
    ///
    /// The task is placed after every task of greater or equal priority, so
    /// equal priorities keep registration order.
    ///
    /// # Returns
    /// - `Ok(index)`: the task's current position in dispatch order
    /// - `Err(ConfigError::TaskListFull)`: all `N` slots are taken
    pub fn append(&mut self, task: Task<'a>) -> Result<usize, ConfigError> {
        if self.len >= N {
            return Err(ConfigError::TaskListFull);
        }

        let priority = task.priority();
        let pos = self.tasks[..self.len]
            .iter()
            .flatten()
            .position(|t| t.priority() < priority)
            .unwrap_or(self.len);

        log::debug!(
            "registered task {} (priority {}, period {:?}) at slot {}",
            task.name(),
            priority,
            task.period(),
            pos
        );

        self.tasks[self.len] = Some(task);
        self.tasks[pos..=self.len].rotate_right(1);
        self.len += 1;
        Ok(pos)
    }

    /// Priority pass: offer every task, highest priority first, one chance
    /// to run.
    ///
    /// Returns the number of tasks that ran. A pass with nothing due returns
    /// `0` immediately; the caller decides whether to spin or idle.
    pub fn pri_sched<C: Clock + ?Sized>(&mut self, clock: &C) -> usize {
        let mut ran = 0;
        for task in self.tasks[..self.len].iter_mut().flatten() {
            if task.run_if_due(clock) {
                ran += 1;
            }
        }
        ran
    }

    /// Round-robin pass: offer every task one chance to run regardless of
    /// priority, starting one slot later than the previous round-robin pass.
    pub fn rr_sched<C: Clock + ?Sized>(&mut self, clock: &C) -> usize {
        if self.len == 0 {
            return 0;
        }
        let start = self.rr_next % self.len;
        let mut ran = 0;
        for i in 0..self.len {
            let idx = (start + i) % self.len;
            if let Some(task) = self.tasks[idx].as_mut() {
                if task.run_if_due(clock) {
                    ran += 1;
                }
            }
        }
        self.rr_next = (start + 1) % self.len;
        ran
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Tasks in dispatch order.
    pub fn iter(&self) -> impl Iterator<Item = &Task<'a>> + '_ {
        self.tasks[..self.len].iter().flatten()
    }

    pub fn get(&self, name: &str) -> Option<&Task<'a>> {
        self.iter().find(|t| t.name() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Task<'a>> {
        self.tasks[..self.len]
            .iter_mut()
            .flatten()
            .find(|t| t.name() == name)
    }
}

impl<const N: usize> Default for TaskList<'_, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> fmt::Display for TaskList<'_, N> {
    /// Diagnostic table, one row per task in dispatch order. Times in ms.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<16} {:>4} {:>10} {:>8} {:>10} {:>10} {:>10}",
            "TASK", "PRI", "PERIOD", "RUNS", "AVG DUR", "MAX DUR", "AVG LATE"
        )?;
        for task in self.iter() {
            writeln!(f, "{}", task)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::task::TaskConfig;
    use core::cell::RefCell;
    use core::time::Duration;
    use std::format;
    use std::vec::Vec;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_priority_order_with_stable_ties() {
        let log = RefCell::new(Vec::new());
        let mut a = |_: Duration| {
            log.borrow_mut().push("a");
            0u8
        };
        let mut b = |_: Duration| {
            log.borrow_mut().push("b");
            0u8
        };
        let mut c = |_: Duration| {
            log.borrow_mut().push("c");
            0u8
        };
        let mut d = |_: Duration| {
            log.borrow_mut().push("d");
            0u8
        };

        let clock = ManualClock::new();
        let mut list: TaskList = TaskList::new();
        list.append(Task::new("a", &mut a, TaskConfig::new(1, ms(10))).unwrap()).unwrap();
        list.append(Task::new("b", &mut b, TaskConfig::new(3, ms(10))).unwrap()).unwrap();
        list.append(Task::new("c", &mut c, TaskConfig::new(1, ms(10))).unwrap()).unwrap();
        list.append(Task::new("d", &mut d, TaskConfig::new(3, ms(10))).unwrap()).unwrap();

        let order: Vec<_> = list.iter().map(|t| t.name()).collect();
        assert_eq!(order, ["b", "d", "a", "c"]);

        assert_eq!(list.pri_sched(&clock), 4);
        drop(list);
        assert_eq!(*log.borrow(), ["b", "d", "a", "c"]);
    }

    #[test]
    fn test_at_most_once_per_pass() {
        let clock = ManualClock::new();
        let mut count = 0u32;
        let mut body = |_: Duration| {
            count += 1;
            0u8
        };
        {
            let mut list: TaskList = TaskList::new();
            list.append(Task::new("fast", &mut body, TaskConfig::new(1, ms(1))).unwrap())
                .unwrap();
            // 100 ms between passes; still one run per pass.
            for t in 0..5 {
                clock.set_millis(t * 100);
                assert_eq!(list.pri_sched(&clock), 1);
            }
        }
        assert_eq!(count, 5);
    }

    #[test]
    fn test_pass_with_nothing_due() {
        let clock = ManualClock::new();
        let mut body = |_: Duration| 0u8;
        let mut list: TaskList = TaskList::new();
        list.append(Task::new("t", &mut body, TaskConfig::new(1, ms(50))).unwrap())
            .unwrap();
        assert_eq!(list.pri_sched(&clock), 1);
        clock.set_millis(49);
        assert_eq!(list.pri_sched(&clock), 0);
    }

    #[test]
    fn test_full_list_rejected() {
        let mut a = |_: Duration| 0u8;
        let mut b = |_: Duration| 0u8;
        let mut list: TaskList<'_, 1> = TaskList::new();
        assert_eq!(
            list.append(Task::new("a", &mut a, TaskConfig::new(1, ms(1))).unwrap()),
            Ok(0)
        );
        let res = list.append(Task::new("b", &mut b, TaskConfig::new(1, ms(1))).unwrap());
        assert_eq!(res, Err(ConfigError::TaskListFull));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_round_robin_rotates_start() {
        let log = RefCell::new(Vec::new());
        let mut hi = |_: Duration| {
            log.borrow_mut().push("hi");
            0u8
        };
        let mut lo = |_: Duration| {
            log.borrow_mut().push("lo");
            0u8
        };
        let clock = ManualClock::new();
        let mut list: TaskList = TaskList::new();
        list.append(Task::new("hi", &mut hi, TaskConfig::new(2, ms(1))).unwrap()).unwrap();
        list.append(Task::new("lo", &mut lo, TaskConfig::new(1, ms(1))).unwrap()).unwrap();

        assert_eq!(list.rr_sched(&clock), 2);
        clock.set_millis(1);
        assert_eq!(list.rr_sched(&clock), 2);
        drop(list);
        assert_eq!(*log.borrow(), ["hi", "lo", "lo", "hi"]);
    }

    #[test]
    fn test_lookup_and_table() {
        let clock = ManualClock::new();
        let mut body = |_: Duration| 0u8;
        let mut list: TaskList = TaskList::new();
        let config = TaskConfig::new(2, ms(100)).with_profile(true);
        list.append(Task::new("Task_1", &mut body, config).unwrap()).unwrap();
        list.pri_sched(&clock);

        assert_eq!(list.get("Task_1").map(|t| t.profile().runs), Some(1));
        assert!(list.get("missing").is_none());
        list.get_mut("Task_1").unwrap().reset_profile();
        assert_eq!(list.get("Task_1").unwrap().profile().runs, 0);

        let table = format!("{}", list);
        let mut lines = table.lines();
        assert!(lines.next().unwrap().starts_with("TASK"));
        let row = lines.next().unwrap();
        assert!(row.starts_with("Task_1"));
        assert!(row.contains("100.0"));
    }
}
