//! Ferry Core
//!
//! Core types shared by the Ferry CI runner.
//!
//! This crate contains:
//! - Domain types: the job record and its status state machine
//! - DTOs: request/response bodies exchanged with HTTP clients

pub mod domain;
pub mod dto;
