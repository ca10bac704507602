//! Configuration and terminal rendering for the `ingest` binary.

pub mod config;
pub mod render;
