//! Persistence: baseline reports and append-only logs

pub mod logs;
pub mod report;
