pub mod config;
pub mod error;
pub mod levy;
pub mod telemetry;
