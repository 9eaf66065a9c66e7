//! Deterministic, pure logic for the review sequence.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! strings and return deterministic outputs suitable for tests.

pub mod inputs;
pub mod marker;
pub mod provider;
pub mod ticket;
pub mod truncate;
pub mod types;
