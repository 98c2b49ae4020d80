/*!
 * Scheduler Context
 *
 * Everything a program needs to schedule work, built once at startup from a
 * `SchedulerConfig` and handed down explicitly.
 */

use crate::core::config::SchedulerConfig;
use crate::core::errors::SchedResult;
use crate::monitoring::OperationSpan;
use crate::pool::WorkerPool;
use crate::scheduler::{ProcessManager, RunnerConfig, TaskRunner};
use std::fmt;
use tracing::info;

/// Worker pool plus process manager sharing one configuration
pub struct SchedulerContext {
    config: SchedulerConfig,
    pool: WorkerPool,
    processes: ProcessManager,
}

impl SchedulerContext {
    pub fn new(config: SchedulerConfig) -> SchedResult<Self> {
        config.validate()?;
        let pool = WorkerPool::from_config(&config)?;
        let processes = ProcessManager::with_defaults(config.clone());
        info!(
            workers = config.worker_count,
            max_runners = config.max_runners,
            "Scheduler context ready"
        );
        Ok(Self {
            config,
            pool,
            processes,
        })
    }

    /// Defaults overlaid with `COTHREAD_*` environment variables
    pub fn from_env() -> SchedResult<Self> {
        Self::new(SchedulerConfig::from_env()?)
    }

    #[inline]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    #[inline]
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    #[inline]
    pub fn processes(&self) -> &ProcessManager {
        &self.processes
    }

    /// Started task runner using this context's mailbox capacity
    pub fn spawn_task_runner(&self, name: &str) -> SchedResult<TaskRunner> {
        let runner = TaskRunner::new(RunnerConfig::from_scheduler(name, &self.config));
        runner.start()?;
        Ok(runner)
    }

    /// Stop every runner, then drain and stop the pool
    pub fn shutdown(&self) -> bool {
        let op = OperationSpan::new("scheduler_shutdown");
        let clean = op.span().in_scope(|| {
            let clean = self.processes.stop_runners_and_wait();
            self.pool.shutdown();
            clean
        });
        op.finish();
        clean
    }
}

impl fmt::Debug for SchedulerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerContext")
            .field("pool", &self.pool)
            .field("processes", &self.processes)
            .finish()
    }
}
