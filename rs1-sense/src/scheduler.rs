//! Cooperative periodic-task table for the housekeeping context.

use std::time::Instant;

use tracing::warn;

use crate::error::{Error, Result};

pub const MAX_TASKS: usize = 16;

/// Tasks must be non-blocking; anything long belongs to the task author.
pub type TaskFn = Box<dyn FnMut(u32) + Send>;

pub struct TaskEntry {
    pub name: &'static str,
    callback: TaskFn,
    pub interval_ms: u32,
    pub last_run_ms: u32,
    pub enabled: bool,
    pub max_observed_duration_us: u64,
}

/// Fixed-capacity cooperative scheduler.
///
/// `tick()` runs every due task once; intervals are measured from the
/// start of the previous run. A slow task delays its peers (single
/// threaded by design), which is why per-task max duration is recorded.
pub struct Scheduler {
    tasks: Vec<TaskEntry>,
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler {
            tasks: Vec::with_capacity(MAX_TASKS),
        }
    }

    pub fn add_task(
        &mut self,
        name: &'static str,
        interval_ms: u32,
        callback: TaskFn,
    ) -> Result<()> {
        if self.tasks.len() >= MAX_TASKS {
            return Err(Error::SchedulerCapacity);
        }
        self.tasks.push(TaskEntry {
            name,
            callback,
            interval_ms,
            last_run_ms: 0,
            enabled: true,
            max_observed_duration_us: 0,
        });
        Ok(())
    }

    pub fn set_enabled(&mut self, name: &str, enabled: bool) {
        if let Some(task) = self.tasks.iter_mut().find(|t| t.name == name) {
            task.enabled = enabled;
        }
    }

    /// Run every enabled task whose interval has elapsed.
    pub fn tick(&mut self, now_ms: u32) {
        for task in self.tasks.iter_mut() {
            if !task.enabled {
                continue;
            }
            if now_ms.wrapping_sub(task.last_run_ms) < task.interval_ms {
                continue;
            }
            task.last_run_ms = now_ms;
            let started = Instant::now();
            (task.callback)(now_ms);
            let took_us = started.elapsed().as_micros() as u64;
            if took_us > task.max_observed_duration_us {
                task.max_observed_duration_us = took_us;
                if took_us > 10_000 {
                    warn!(task = task.name, took_us, "slow housekeeping task");
                }
            }
        }
    }

    pub fn task(&self, name: &str) -> Option<&TaskEntry> {
        self.tasks.iter().find(|t| t.name == name)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Scheduler::new()
    }
}
