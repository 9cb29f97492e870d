//! Skills composed from real-time control sessions.
//!
//! A [`Skill`] receives decoded parameters and resolved equipment, opens a
//! control session against the equipment's controller and supervises the
//! motion it uploads. [`WiggleJoint`] is the reference skill: it moves one
//! joint of a position-controlled part out by a small offset and back.

pub mod error;
pub mod registry;
pub mod skill;
pub mod wiggle;

pub use error::SkillError;
pub use registry::SkillRegistry;
pub use skill::{EquipmentSelector, ExecuteContext, ExecuteRequest, ExecuteResult, Skill};
pub use wiggle::{build_wiggle_graph, build_wiggle_graph_with_timeout, WiggleJoint, WiggleJointParams};
