//! Engine configuration
//!
//! Loaded from an optional JSON file, then overridden by `FIM_HOME` and
//! `FIM_UTC_OFFSET`. Every field has a default, so an empty object (or no
//! file at all) is a valid configuration.

use crate::services::clock::ReportClock;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_HOME: &str = "FIM_HOME";
pub const ENV_UTC_OFFSET: &str = "FIM_UTC_OFFSET";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Parent of the log and baseline directories unless those are set.
    pub data_dir: PathBuf,
    pub event_log_dir: Option<PathBuf>,
    pub comparison_log_dir: Option<PathBuf>,
    pub baseline_dir: Option<PathBuf>,
    /// `local`, `UTC`, or an offset such as `+05:00`.
    pub utc_offset: Option<String>,
    /// Plan another hour after the current plan is exhausted.
    pub repeat_schedule: bool,
    pub event_channel_capacity: usize,
    /// How long a rename half waits for its partner before it is logged alone.
    pub rename_window_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            event_log_dir: None,
            comparison_log_dir: None,
            baseline_dir: None,
            utc_offset: None,
            repeat_schedule: true,
            event_channel_capacity: 1024,
            rename_window_ms: 250,
        }
    }
}

impl MonitorConfig {
    /// Configuration rooted at `data_dir`, other fields at their defaults.
    #[must_use]
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Load configuration from `path` (if any) and apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let text = fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("cannot read {}: {e}", path.display()))
                })?;
                serde_json::from_str::<Self>(&text).map_err(|e| {
                    Error::Config(format!("invalid config {}: {e}", path.display()))
                })?
            }
            None => Self::default(),
        };

        if let Ok(home) = std::env::var(ENV_HOME)
            && !home.trim().is_empty()
        {
            config.data_dir = PathBuf::from(home);
        }
        if let Ok(offset) = std::env::var(ENV_UTC_OFFSET)
            && !offset.trim().is_empty()
        {
            config.utc_offset = Some(offset);
        }

        config.validate()?;
        log::debug!("Loaded configuration: {config:?}");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.clock()?;
        if self.event_channel_capacity == 0 {
            return Err(Error::Config(
                "event_channel_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn clock(&self) -> Result<ReportClock> {
        ReportClock::from_setting(self.utc_offset.as_deref())
    }

    #[must_use]
    pub fn event_log_dir(&self) -> PathBuf {
        self.event_log_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("events"))
    }

    #[must_use]
    pub fn comparison_log_dir(&self) -> PathBuf {
        self.comparison_log_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("comparisons"))
    }

    #[must_use]
    pub fn baseline_dir(&self) -> PathBuf {
        self.baseline_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("baselines"))
    }

    #[must_use]
    pub fn rename_window(&self) -> Duration {
        Duration::from_millis(self.rename_window_ms.max(1))
    }

    /// Create the log and baseline directories.
    ///
    /// # Errors
    /// `Error::Startup` when any directory cannot be created; callers treat
    /// this as fatal.
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            self.event_log_dir(),
            self.comparison_log_dir(),
            self.baseline_dir(),
        ] {
            fs::create_dir_all(&dir).map_err(|e| {
                Error::Startup(format!("cannot create {}: {e}", dir.display()))
            })?;
        }
        Ok(())
    }
}

fn default_data_dir() -> PathBuf {
    if let Ok(home) = std::env::var(ENV_HOME)
        && !home.trim().is_empty()
    {
        return PathBuf::from(home);
    }

    if cfg!(windows) {
        return PathBuf::from(r"C:\ProgramData\FIM");
    }

    match std::env::var("HOME") {
        Ok(home) if !home.is_empty() => Path::new(&home).join(".local/share/fim"),
        _ => PathBuf::from("fim-data"),
    }
}
