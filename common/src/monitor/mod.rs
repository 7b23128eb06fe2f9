// Monitor module: drives per-user checks on a polling or wall-clock cadence

pub mod engine;

pub use engine::{Cadence, CycleSummary, Monitor, MonitorConfig, MonitorEngine};
