//! Skill errors.

use motion_core::error::SessionError;
use thiserror::Error;

/// Failure of a skill invocation.
#[derive(Error, Debug)]
pub enum SkillError {
    /// Parameters could not be decoded.
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// The request lacks equipment for a required slot.
    #[error("No equipment in slot '{0}'")]
    MissingEquipment(String),

    /// The equipment does not satisfy the skill's selector.
    #[error("Unsuitable equipment: {0}")]
    UnsuitableEquipment(String),

    /// No skill registered under this id.
    #[error("Unknown skill: {0}")]
    UnknownSkill(String),

    /// A skill with this id is already registered.
    #[error("Skill already registered: {0}")]
    DuplicateSkill(String),

    /// The control session failed.
    #[error(transparent)]
    Session(#[from] SessionError),
}
