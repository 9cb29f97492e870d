//! Client side of real-time action/reaction control sessions.
//!
//! This crate dials controllers, makes the one-off configuration and status
//! calls that precede graph construction, and drives a [`Session`] through its
//! lifecycle:
//!
//! ```text
//! Disconnected -> Connected -> PartsRegistered -> GraphUploaded -> Running -> Terminated
//! ```
//!
//! Every RPC carries the controller instance name and a fresh request id in
//! its [`CallContext`](motion_core::channel::CallContext).

pub mod client;
pub mod equipment;
pub mod session;

pub use client::{ControllerClient, ControllerConnection};
pub use equipment::{connect_to_equipment, EquipmentHandle, EquipmentPack};
pub use session::{CancelHandle, LoopStats, Session};
