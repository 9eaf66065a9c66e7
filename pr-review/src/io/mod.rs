//! I/O adapters for the review sequence.

pub mod agent;
pub mod config;
pub mod context;
pub mod gh;
pub mod process;
pub mod prompt;
