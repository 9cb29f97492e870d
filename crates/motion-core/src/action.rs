//! Actions: named motion primitive instances.

use crate::error::{SessionError, SessionResult};
use crate::ids::ActionId;
use crate::reaction::{Reaction, RealtimeReaction};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Primitive-specific parameter payload.
///
/// Opaque to the session; the controller decodes it according to the action
/// type and rejects the upload if it does not fit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FixedParams(pub serde_json::Value);

impl FixedParams {
    /// Encode a typed parameter struct.
    pub fn encode<T: Serialize>(params: &T) -> SessionResult<Self> {
        serde_json::to_value(params)
            .map(FixedParams)
            .map_err(|e| SessionError::Precondition(format!("unencodable fixed params: {e}")))
    }

    /// Decode into a typed parameter struct.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.0)
    }

    /// `true` if no parameters were set.
    pub fn is_empty(&self) -> bool {
        self.0.is_null()
    }
}

/// A motion primitive instance as composed by the client.
///
/// Immutable once built: the builder methods consume `self`, and the graph
/// takes ownership on insertion.
#[derive(Debug)]
pub struct Action {
    id: ActionId,
    action_type: String,
    part: String,
    fixed_params: FixedParams,
    reactions: Vec<Reaction>,
}

impl Action {
    /// New action of type `action_type` controlling `part`.
    pub fn new(id: ActionId, action_type: impl Into<String>, part: impl Into<String>) -> Self {
        Self {
            id,
            action_type: action_type.into(),
            part: part.into(),
            fixed_params: FixedParams::default(),
            reactions: Vec::new(),
        }
    }

    /// Set the fixed parameters.
    pub fn with_fixed_params(mut self, params: FixedParams) -> Self {
        self.fixed_params = params;
        self
    }

    /// Append a reaction. Declaration order is evaluation order.
    pub fn with_reaction(mut self, reaction: Reaction) -> Self {
        self.reactions.push(reaction);
        self
    }

    /// Action id.
    pub fn id(&self) -> ActionId {
        self.id
    }

    /// Action type tag, e.g. `xfa.point_to_point_move`.
    pub fn action_type(&self) -> &str {
        &self.action_type
    }

    /// Controlled part.
    pub fn part(&self) -> &str {
        &self.part
    }

    /// Fixed parameters.
    pub fn fixed_params(&self) -> &FixedParams {
        &self.fixed_params
    }

    /// Reactions in declaration order.
    pub fn reactions(&self) -> &[Reaction] {
        &self.reactions
    }

    pub(crate) fn into_parts(self) -> (ActionId, String, String, FixedParams, Vec<Reaction>) {
        (
            self.id,
            self.action_type,
            self.part,
            self.fixed_params,
            self.reactions,
        )
    }
}

/// Wire form of an action, as uploaded to the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    /// Action id.
    pub id: ActionId,
    /// Action type tag.
    pub action_type: String,
    /// Controlled part.
    pub part: String,
    /// Primitive-specific parameters.
    pub fixed_params: FixedParams,
    /// Real-time halves of the action's reactions, in declaration order.
    pub reactions: Vec<RealtimeReaction>,
}
