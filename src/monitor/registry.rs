//! Registry of monitored directories.
//!
//! Keys are canonical directory paths, so `./data` and `/srv/data` name the
//! same task. Every mutation takes the write lock for its whole duration, which
//! keeps start/stop/remove of one directory strictly ordered.

use crate::config::MonitorConfig;
use crate::io::logs::{read_log, LogPaths};
use crate::io::report::write_baseline;
use crate::monitor::scheduler::{spawn_scheduler, ComparisonJob, ScheduleSettings, SchedulerHandle};
use crate::monitor::watcher::{EventWatcher, WatchSettings};
use crate::services::schedule::validate_plan;
use crate::services::traverse::build_baseline;
use crate::{BuildOptions, Error, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// One monitored directory and the machinery attached to it
#[derive(Debug)]
pub struct MonitoringTask {
    directory: PathBuf,
    baseline_file: PathBuf,
    regular_per_hour: u32,
    random_per_interval: u32,
    logs: LogPaths,
    watcher: EventWatcher,
    scheduler: Option<SchedulerHandle>,
}

impl MonitoringTask {
    fn is_running(&self) -> bool {
        self.watcher.is_active() && self.scheduler.is_some()
    }

    fn status(&self) -> TaskStatus {
        TaskStatus {
            directory: self.directory.clone(),
            baseline_file: self.baseline_file.clone(),
            regular_per_hour: self.regular_per_hour,
            random_per_interval: self.random_per_interval,
            running: self.is_running(),
            event_log: self.logs.event_log.clone(),
            comparison_log: self.logs.comparison_log.clone(),
        }
    }

    /// Start (or restart) the watcher and the scheduler.
    async fn start(&mut self, settings: &WatchSettings, repeat: bool) -> Result<()> {
        self.halt().await;
        self.watcher.start().await?;

        let job = ComparisonJob {
            directory: self.directory.clone(),
            baseline_file: self.baseline_file.clone(),
            comparison_log: self.logs.comparison_log.clone(),
            clock: settings.clock,
        };
        let schedule = ScheduleSettings {
            regular_per_hour: self.regular_per_hour,
            random_per_interval: self.random_per_interval,
            repeat,
        };
        match spawn_scheduler(job, schedule) {
            Ok(handle) => {
                self.scheduler = Some(handle);
                Ok(())
            }
            Err(err) => {
                self.watcher.stop().await;
                Err(err)
            }
        }
    }

    async fn halt(&mut self) {
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.cancel();
        }
        self.watcher.stop().await;
    }

    /// Like `halt`, but also waits for a comparison pass in flight.
    async fn retire(mut self) {
        self.watcher.stop().await;
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.shutdown().await;
        }
    }
}

/// Snapshot of a task for listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskStatus {
    pub directory: PathBuf,
    pub baseline_file: PathBuf,
    pub regular_per_hour: u32,
    pub random_per_interval: u32,
    pub running: bool,
    pub event_log: PathBuf,
    pub comparison_log: PathBuf,
}

pub struct TaskRegistry {
    config: Arc<MonitorConfig>,
    settings: WatchSettings,
    tasks: RwLock<HashMap<PathBuf, MonitoringTask>>,
}

impl fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let task_count = self.tasks.try_read().map(|tasks| tasks.len()).ok();
        f.debug_struct("TaskRegistry")
            .field("config", &self.config)
            .field("settings", &self.settings)
            .field("task_count", &task_count)
            .finish()
    }
}

impl TaskRegistry {
    /// # Errors
    /// `Error::Config` when the configured time zone is invalid.
    pub fn new(config: Arc<MonitorConfig>) -> Result<Self> {
        let settings = WatchSettings::from_config(&config)?;
        Ok(Self {
            config,
            settings,
            tasks: RwLock::new(HashMap::new()),
        })
    }

    #[must_use]
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Monitor `directory` against an existing baseline report.
    ///
    /// # Errors
    /// - `Error::InvalidInput` for a missing directory, a missing baseline
    ///   file, or an infeasible schedule
    /// - `Error::SchedulingConflict` when the directory already has a task,
    ///   running or stopped
    /// - `Error::WatchSetup` when the OS watch cannot be installed; nothing is
    ///   registered in that case
    pub async fn add_task(
        &self,
        directory: impl AsRef<Path>,
        baseline_file: impl AsRef<Path>,
        regular_per_hour: u32,
        random_per_interval: u32,
    ) -> Result<TaskStatus> {
        validate_plan(regular_per_hour, random_per_interval)?;
        let directory = existing_directory(directory.as_ref())?;
        let baseline_file = baseline_file.as_ref();
        if !baseline_file.is_file() {
            return Err(Error::InvalidInput(format!(
                "Baseline file does not exist: {}",
                baseline_file.display()
            )));
        }
        let baseline_file = std::path::absolute(baseline_file)?;

        let mut tasks = self.tasks.write().await;
        self.register(
            &mut tasks,
            directory,
            baseline_file,
            regular_per_hour,
            random_per_interval,
        )
        .await
    }

    /// Capture a fresh baseline of `directory` into the baseline directory,
    /// then monitor it.
    pub async fn create_task(
        &self,
        directory: impl AsRef<Path>,
        regular_per_hour: u32,
        random_per_interval: u32,
    ) -> Result<TaskStatus> {
        validate_plan(regular_per_hour, random_per_interval)?;
        let directory = existing_directory(directory.as_ref())?;

        // Held across the build so a concurrent create for the same directory
        // cannot overwrite the baseline a running task reads.
        let mut tasks = self.tasks.write().await;
        ensure_unregistered(&tasks, &directory)?;

        let logs = LogPaths::for_directory(&self.config, &directory);
        let opts = BuildOptions {
            clock: self.settings.clock,
        };
        let root = directory.clone();
        let baseline_file = logs.baseline.clone();
        tokio::task::spawn_blocking(move || {
            let baseline = build_baseline(&root, &opts)?;
            write_baseline(&baseline_file, &baseline)
        })
        .await
        .map_err(|e| Error::Io(std::io::Error::other(format!("baseline task failed: {e}"))))??;

        self.register(
            &mut tasks,
            directory,
            logs.baseline,
            regular_per_hour,
            random_per_interval,
        )
        .await
    }

    /// Pause a task: the watcher is released and no new pass starts. The task
    /// stays registered.
    pub async fn stop_task(&self, directory: impl AsRef<Path>) -> Result<TaskStatus> {
        let key = directory_key(directory.as_ref())?;
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(&key)
            .ok_or_else(|| Error::TaskNotFound(key.to_string_lossy().to_string()))?;

        task.halt().await;
        log::info!("Stopped monitoring {}", key.display());
        Ok(task.status())
    }

    /// Restart a stopped task. Resuming a running task restarts it.
    pub async fn resume_task(&self, directory: impl AsRef<Path>) -> Result<TaskStatus> {
        let key = directory_key(directory.as_ref())?;
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(&key)
            .ok_or_else(|| Error::TaskNotFound(key.to_string_lossy().to_string()))?;

        task.start(&self.settings, self.config.repeat_schedule).await?;
        log::info!("Resumed monitoring {}", key.display());
        Ok(task.status())
    }

    /// Stop a task and forget it. Its log files are kept.
    pub async fn remove_task(&self, directory: impl AsRef<Path>) -> Result<TaskStatus> {
        let key = directory_key(directory.as_ref())?;
        let mut tasks = self.tasks.write().await;
        let mut task = tasks
            .remove(&key)
            .ok_or_else(|| Error::TaskNotFound(key.to_string_lossy().to_string()))?;

        task.halt().await;
        log::info!("Removed monitoring task for {}", key.display());
        Ok(task.status())
    }

    /// All tasks, ordered by directory.
    pub async fn tasks(&self) -> Vec<TaskStatus> {
        let tasks = self.tasks.read().await;
        let mut statuses: Vec<TaskStatus> = tasks.values().map(MonitoringTask::status).collect();
        statuses.sort_by(|a, b| a.directory.cmp(&b.directory));
        statuses
    }

    pub async fn task(&self, directory: impl AsRef<Path>) -> Result<TaskStatus> {
        let key = directory_key(directory.as_ref())?;
        self.tasks
            .read()
            .await
            .get(&key)
            .map(MonitoringTask::status)
            .ok_or_else(|| Error::TaskNotFound(key.to_string_lossy().to_string()))
    }

    /// Audit log text for a directory; `None` if nothing was logged yet.
    pub async fn event_log(&self, directory: impl AsRef<Path>) -> Result<Option<String>> {
        let path = self.log_paths(directory.as_ref())?.event_log;
        read_log_blocking(path).await
    }

    /// Comparison log text for a directory; `None` if no pass has run yet.
    pub async fn comparison_log(&self, directory: impl AsRef<Path>) -> Result<Option<String>> {
        let path = self.log_paths(directory.as_ref())?.comparison_log;
        read_log_blocking(path).await
    }

    /// Log locations for a directory, whether or not it is monitored.
    pub fn log_paths(&self, directory: &Path) -> Result<LogPaths> {
        let key = directory_key(directory)?;
        Ok(LogPaths::for_directory(&self.config, &key))
    }

    /// Build, start and insert a task. The caller holds the write lock.
    async fn register(
        &self,
        tasks: &mut HashMap<PathBuf, MonitoringTask>,
        directory: PathBuf,
        baseline_file: PathBuf,
        regular_per_hour: u32,
        random_per_interval: u32,
    ) -> Result<TaskStatus> {
        ensure_unregistered(tasks, &directory)?;

        let logs = LogPaths::for_directory(&self.config, &directory);
        let watcher = EventWatcher::new(
            directory.clone(),
            logs.event_log.clone(),
            self.settings.clone(),
        );
        let mut task = MonitoringTask {
            directory: directory.clone(),
            baseline_file,
            regular_per_hour,
            random_per_interval,
            logs,
            watcher,
            scheduler: None,
        };
        task.start(&self.settings, self.config.repeat_schedule).await?;

        let status = task.status();
        tasks.insert(directory, task);
        log::info!(
            "Monitoring {} ({} regular, {} random checks)",
            status.directory.display(),
            regular_per_hour,
            random_per_interval
        );
        Ok(status)
    }

    /// Stop every task, wait for passes in flight, and empty the registry.
    pub async fn shutdown(&self) {
        let mut tasks = self.tasks.write().await;
        for (directory, task) in tasks.drain() {
            task.retire().await;
            log::debug!("Shut down monitoring of {}", directory.display());
        }
    }
}

fn ensure_unregistered(tasks: &HashMap<PathBuf, MonitoringTask>, directory: &Path) -> Result<()> {
    if tasks.contains_key(directory) {
        return Err(Error::SchedulingConflict(
            directory.to_string_lossy().to_string(),
        ));
    }
    Ok(())
}

/// Canonical form of a directory that must exist right now.
fn existing_directory(directory: &Path) -> Result<PathBuf> {
    if !directory.exists() {
        return Err(Error::InvalidInput(format!(
            "Path does not exist: {}",
            directory.display()
        )));
    }
    if !directory.is_dir() {
        return Err(Error::InvalidInput(format!(
            "Path is not a directory: {}",
            directory.display()
        )));
    }
    Ok(directory.canonicalize()?)
}

/// Registry key for a directory that may have been deleted since it was added.
fn directory_key(directory: &Path) -> Result<PathBuf> {
    match directory.canonicalize() {
        Ok(path) => Ok(path),
        Err(_) => Ok(std::path::absolute(directory)?),
    }
}

async fn read_log_blocking(path: PathBuf) -> Result<Option<String>> {
    tokio::task::spawn_blocking(move || read_log(&path))
        .await
        .map_err(|e| Error::Io(std::io::Error::other(format!("log read failed: {e}"))))?
}
