//! Skill registry.

use crate::error::SkillError;
use crate::skill::Skill;
use crate::wiggle::WiggleJoint;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Skills by fully qualified id.
#[derive(Default)]
pub struct SkillRegistry {
    skills: BTreeMap<String, Arc<dyn Skill>>,
}

impl SkillRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every skill shipped with this crate.
    pub fn with_builtin() -> Self {
        let builtin: [Arc<dyn Skill>; 1] = [Arc::new(WiggleJoint)];
        Self {
            skills: builtin.into_iter().map(|skill| (skill.id(), skill)).collect(),
        }
    }

    /// Add a skill. Fails if its id is taken.
    pub fn register(&mut self, skill: Arc<dyn Skill>) -> Result<(), SkillError> {
        let id = skill.id();
        if self.skills.contains_key(&id) {
            return Err(SkillError::DuplicateSkill(id));
        }
        debug!(skill = %id, "Registered skill");
        self.skills.insert(id, skill);
        Ok(())
    }

    /// Look up a skill by id (`package.name`) or by bare name.
    pub fn get(&self, id_or_name: &str) -> Result<Arc<dyn Skill>, SkillError> {
        self.skills
            .get(id_or_name)
            .or_else(|| {
                self.skills
                    .values()
                    .find(|skill| skill.name() == id_or_name)
            })
            .cloned()
            .ok_or_else(|| SkillError::UnknownSkill(id_or_name.to_string()))
    }

    /// Registered skills in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Skill>> {
        self.skills.values()
    }

    /// Number of registered skills.
    pub fn len(&self) -> usize {
        self.skills.len()
    }

    /// `true` if no skill is registered.
    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }
}
