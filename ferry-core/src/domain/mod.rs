//! Core domain types
//!
//! The job record is the unit of work that flows through the runner: it is
//! created on submission, advanced by a worker, and read by API clients.

pub mod job;
