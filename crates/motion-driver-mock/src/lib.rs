//! Simulated real-time controller for motion-core sessions.
//!
//! This crate provides an in-process stand-in for a deterministic robot
//! controller, for testing sessions and skills without hardware. It
//! implements [`motion_core::channel::ControlChannel`] and runs the real-time
//! side of an uploaded action graph on a tokio task.
//!
//! # Components
//!
//! - [`SimulatedController`] - part registry, atomic graph validation and the
//!   per-session real-time loop
//! - [`SimulatedNetwork`] - a [`ChannelFactory`](motion_core::channel::ChannelFactory)
//!   mapping addresses to controllers, able to refuse or black-hole dials
//! - [`SettleBehavior`] - how a simulated part follows a point-to-point move
//!
//! # Real-time semantics
//!
//! - One control tick advances every active motion of a session, then
//!   evaluates the reactions of each active action in declaration order.
//! - A reaction fires at most once per activation of its action, on the first
//!   tick its condition is true.
//! - When several reactions are true on the same tick they fire in
//!   declaration order until one performs a realtime transition; the rest of
//!   the old action's reactions are not evaluated.
//!
//! ```rust,ignore
//! use motion_driver_mock::{SettleBehavior, SimulatedController, SimulatedPartConfig};
//!
//! let controller = SimulatedController::builder()
//!     .part(SimulatedPartConfig::new("arm", 6).with_behavior(SettleBehavior::Stall))
//!     .build()?;
//! ```

mod config;
mod controller;
mod mode;
mod network;
mod realtime;

pub use config::{SettleBehavior, SimulatedPartConfig, SimulationConfig};
pub use controller::{RecordedCall, SimulatedController, SimulatedControllerBuilder};
pub use mode::MockMode;
pub use network::SimulatedNetwork;
