//! Command-line front end helpers

pub mod args;
pub mod output;
