//! quicd-trace-cli library crate.
//!
//! Configuration, logging setup and subcommand execution for the
//! `quicd-trace` binary, exposed for testing. The binary is in main.rs.

pub mod commands;
pub mod config;
pub mod telemetry;
