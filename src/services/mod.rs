//! Core services for hashing, traversal, comparison and scheduling

pub mod clock;
pub mod diff;
pub mod format;
pub mod hash;
pub mod principal;
pub mod schedule;
pub mod traverse;
