//! Core engine logic, independent of any particular OS backend.

pub mod blacklist;
pub mod config;
pub mod telemetry;
