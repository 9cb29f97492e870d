//! Configuration, logging and wiring behind the `motion-skills` binary.

pub mod app;
pub mod config;
pub mod telemetry;

pub use config::MotionConfig;
