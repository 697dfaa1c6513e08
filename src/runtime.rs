//! Runtime glue: validated configuration, tracing setup, telemetry, and the
//! signal-driven runner.

pub mod config;
pub mod runner;
pub mod telemetry;
