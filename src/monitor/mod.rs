//! Continuous supervision of monitored directories
//!
//! Each monitored directory pairs an [`watcher::EventWatcher`] with a
//! [`scheduler::SchedulerHandle`]; the [`registry::TaskRegistry`] owns them and
//! serializes every start, stop and removal.

pub mod registry;
pub mod scheduler;
pub mod watcher;
