/*!
 * Process Manager
 *
 * Holds a bounded set of named process runners and routes requests to them:
 * `queue` goes to the first runner (in creation order) that accepts the
 * process; pause/resume/terminate go to the runner hosting the PID or name.
 */

use super::process_runner::ProcessRunner;
use super::types::{RunnerConfig, RunnerStatus};
use crate::core::config::SchedulerConfig;
use crate::core::errors::{SchedResult, SchedulerError};
use crate::core::id::Pid;
use crate::core::types::hash_name;
use crate::process::ProcessEntry;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Registry and router for process runners
pub struct ProcessManager {
    runners: RwLock<Vec<Arc<ProcessRunner>>>,
    max_runners: usize,
    defaults: SchedulerConfig,
}

impl ProcessManager {
    pub fn new(max_runners: usize) -> Self {
        Self::with_defaults(SchedulerConfig {
            max_runners,
            ..SchedulerConfig::default()
        })
    }

    /// Runners created by name take their settings from `defaults`
    pub fn with_defaults(defaults: SchedulerConfig) -> Self {
        Self {
            runners: RwLock::new(Vec::with_capacity(defaults.max_runners)),
            max_runners: defaults.max_runners,
            defaults,
        }
    }

    /// Create a runner with default settings
    ///
    /// Returns `None` with a warning if the name is taken or the manager
    /// already holds `max_runners` runners.
    pub fn create_runner(&self, name: &str) -> Option<Arc<ProcessRunner>> {
        self.create_runner_with(RunnerConfig::from_scheduler(name, &self.defaults))
    }

    pub fn create_runner_with(&self, config: RunnerConfig) -> Option<Arc<ProcessRunner>> {
        let mut runners = self.runners.write();
        if runners.len() >= self.max_runners {
            warn!(runner = %config.name, max = self.max_runners, "Cannot create runner, max runners reached");
            return None;
        }
        let hash = hash_name(&config.name);
        if runners.iter().any(|r| r.name_hash() == hash) {
            warn!(runner = %config.name, "Cannot create runner, already created");
            return None;
        }

        let runner = Arc::new(ProcessRunner::new(config));
        info!(runner = %runner.name(), "Runner created");
        runners.push(Arc::clone(&runner));
        Some(runner)
    }

    pub fn runner(&self, name: &str) -> Option<Arc<ProcessRunner>> {
        let hash = hash_name(name);
        self.runners
            .read()
            .iter()
            .find(|r| r.name_hash() == hash)
            .cloned()
    }

    pub fn runner_count(&self) -> usize {
        self.runners.read().len()
    }

    #[inline]
    pub fn max_runners(&self) -> usize {
        self.max_runners
    }

    /// Start every runner that has not been started yet
    pub fn start_runners(&self) -> SchedResult<()> {
        for runner in self.snapshot() {
            if runner.status() == RunnerStatus::NotStarted {
                runner.start()?;
            }
        }
        Ok(())
    }

    /// Post a stop to every runner without waiting
    pub fn stop_runners(&self) {
        for runner in self.snapshot() {
            if runner.status().is_ended() {
                continue;
            }
            if let Err(e) = runner.quit() {
                warn!(runner = %runner.name(), error = %e, "Failed to post stop");
            }
        }
    }

    /// Stop every runner and join the started ones; false if any failed
    pub fn stop_runners_and_wait(&self) -> bool {
        self.stop_runners();
        let mut clean = true;
        for runner in self.snapshot() {
            if matches!(
                runner.status(),
                RunnerStatus::NotStarted | RunnerStatus::FailedToStart
            ) {
                continue;
            }
            match runner.join() {
                Ok(status) => info!(runner = %runner.name(), status = %status, "Runner stopped"),
                // already joined
                Err(SchedulerError::NotRunning(_)) => {}
                Err(e) => {
                    error!(runner = %runner.name(), error = %e, "Runner did not stop cleanly");
                    clean = false;
                }
            }
        }
        clean
    }

    /// Queue on the first runner that accepts the process
    ///
    /// A runner that refuses the process after `accepts()` said yes (it
    /// filled up or stopped in between) passes it on to the next one. If
    /// every candidate refused, the last refusal is returned.
    pub fn queue(&self, entry: ProcessEntry) -> SchedResult<Pid> {
        let mut entry = entry;
        let mut refused = None;
        for runner in self.snapshot() {
            if !runner.accepts(&entry) {
                continue;
            }
            match runner.offer(entry) {
                Ok(pid) => return Ok(pid),
                Err((error, Some(returned))) => {
                    debug!(runner = %runner.name(), pid = %returned.pid(), error = %error, "Runner refused process; trying next");
                    refused = Some(error);
                    entry = returned;
                }
                Err((error, None)) => return Err(error),
            }
        }

        if let Some(error) = refused {
            return Err(error);
        }
        warn!(pid = %entry.pid(), mask = %entry.mask(), "No runner accepts process");
        Err(SchedulerError::NoRunnerAccepts(
            format!("{} ({})", entry.pid(), entry.name()).into(),
        ))
    }

    pub fn pause(&self, pid: Pid) -> SchedResult<()> {
        self.hosting(pid)?.pause(pid)
    }

    pub fn pause_named(&self, name: &str) -> SchedResult<()> {
        self.hosting_named(name)?.pause_named(name)
    }

    pub fn resume(&self, pid: Pid) -> SchedResult<()> {
        self.hosting(pid)?.resume(pid)
    }

    pub fn resume_named(&self, name: &str) -> SchedResult<()> {
        self.hosting_named(name)?.resume_named(name)
    }

    pub fn terminate(&self, pid: Pid) -> SchedResult<()> {
        self.hosting(pid)?.terminate(pid)
    }

    pub fn terminate_named(&self, name: &str) -> SchedResult<()> {
        self.hosting_named(name)?.terminate_named(name)
    }

    /// Terminate every process on every runner
    pub fn terminate_all(&self) {
        for runner in self.snapshot() {
            if let Err(e) = runner.terminate_all() {
                warn!(runner = %runner.name(), error = %e, "Failed to post terminate-all");
            }
        }
    }

    pub fn has_process(&self, pid: Pid) -> bool {
        self.runners.read().iter().any(|r| r.has_process(pid))
    }

    fn hosting(&self, pid: Pid) -> SchedResult<Arc<ProcessRunner>> {
        self.runners
            .read()
            .iter()
            .find(|r| r.has_process(pid))
            .cloned()
            .ok_or_else(|| {
                warn!(pid = %pid, "No runner hosts process");
                SchedulerError::NotFound(pid.to_string().into())
            })
    }

    fn hosting_named(&self, name: &str) -> SchedResult<Arc<ProcessRunner>> {
        self.runners
            .read()
            .iter()
            .find(|r| r.has_process_named(name))
            .cloned()
            .ok_or_else(|| {
                warn!(name, "No runner hosts process");
                SchedulerError::NotFound(name.into())
            })
    }

    /// Release the lock before calling into runners
    fn snapshot(&self) -> Vec<Arc<ProcessRunner>> {
        self.runners.read().clone()
    }
}

impl Drop for ProcessManager {
    fn drop(&mut self) {
        self.stop_runners_and_wait();
    }
}

impl fmt::Debug for ProcessManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessManager")
            .field("runners", &self.runner_count())
            .field("max_runners", &self.max_runners)
            .finish()
    }
}
