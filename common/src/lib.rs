// Common library for the AtCoder AC monitor: detection engine, state, sources and sinks

pub mod bootstrap;
pub mod config;
pub mod detector;
pub mod errors;
pub mod models;
pub mod monitor;
pub mod notifier;
pub mod schedule;
pub mod source;
pub mod state;
pub mod telemetry;
