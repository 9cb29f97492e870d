//! The action graph: actions uploaded together for one session.
//!
//! Actions linked by realtime-transition reactions form an implicit state
//! machine that the controller walks on its own. [`TransitionGraph`] makes
//! that machine explicit as an adjacency list over [`ActionId`]s, which turns
//! upload-time validation into a lookup: every edge target must be a node of
//! the batch or an action the controller already knows.

use crate::action::{Action, ActionDescriptor};
use crate::error::{SessionError, SessionResult};
use crate::ids::{ActionId, ReactionId, ReactionIdAllocator};
use crate::reaction::{RealtimeReaction, RealtimeResponse, Trigger};
use crate::watcher::WatcherCallback;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

/// A realtime transition whose target does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DanglingTransition {
    /// Action owning the reaction.
    pub from: ActionId,
    /// Missing target.
    pub to: ActionId,
}

impl fmt::Display for DanglingTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} transitions to unknown {}", self.from, self.to)
    }
}

/// Directed graph of realtime transitions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionGraph {
    adjacency: BTreeMap<ActionId, Vec<ActionId>>,
}

impl TransitionGraph {
    /// Build from wire descriptors.
    pub fn from_descriptors(descriptors: &[ActionDescriptor]) -> Self {
        let adjacency = descriptors
            .iter()
            .map(|descriptor| {
                let targets = descriptor
                    .reactions
                    .iter()
                    .filter_map(RealtimeReaction::transition_target)
                    .collect();
                (descriptor.id, targets)
            })
            .collect();
        Self { adjacency }
    }

    /// Node ids in ascending order.
    pub fn nodes(&self) -> impl Iterator<Item = ActionId> + '_ {
        self.adjacency.keys().copied()
    }

    /// Transition targets of `id`, in declaration order.
    pub fn successors(&self, id: ActionId) -> &[ActionId] {
        self.adjacency.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether `id` is a node of this graph.
    pub fn contains(&self, id: ActionId) -> bool {
        self.adjacency.contains_key(&id)
    }

    /// Edges whose target is neither a node nor in `known`.
    pub fn dangling(&self, known: &BTreeSet<ActionId>) -> Vec<DanglingTransition> {
        self.adjacency
            .iter()
            .flat_map(|(from, targets)| {
                targets.iter().map(move |to| DanglingTransition {
                    from: *from,
                    to: *to,
                })
            })
            .filter(|edge| !self.contains(edge.to) && !known.contains(&edge.to))
            .collect()
    }

    /// Nodes reachable from `entry` through realtime transitions, including
    /// `entry` itself when it is a node.
    pub fn reachable_from(&self, entry: ActionId) -> BTreeSet<ActionId> {
        let mut seen = BTreeSet::new();
        if !self.contains(entry) {
            return seen;
        }
        let mut queue = VecDeque::from([entry]);
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            for next in self.successors(id) {
                if self.contains(*next) && !seen.contains(next) {
                    queue.push_back(*next);
                }
            }
        }
        seen
    }
}

/// A watcher callback waiting for its reaction to fire.
pub struct ArmedWatcher {
    /// Action owning the reaction.
    pub action: ActionId,
    /// Client code to run.
    pub callback: WatcherCallback,
}

impl fmt::Debug for ArmedWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArmedWatcher")
            .field("action", &self.action)
            .finish_non_exhaustive()
    }
}

/// An action graph split into its two execution domains.
#[derive(Debug)]
pub struct CompiledGraph {
    /// Serializable payload for the controller.
    pub descriptors: Vec<ActionDescriptor>,
    /// Client-side callbacks keyed by the reaction that triggers them.
    pub watchers: BTreeMap<ReactionId, ArmedWatcher>,
}

/// The set of actions uploaded together for one session.
#[derive(Debug, Default)]
pub struct ActionGraph {
    actions: BTreeMap<ActionId, Action>,
}

impl ActionGraph {
    /// Empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Graph from a batch of actions. Fails on duplicate ids.
    pub fn from_actions(actions: impl IntoIterator<Item = Action>) -> SessionResult<Self> {
        let mut graph = Self::new();
        for action in actions {
            graph.insert(action)?;
        }
        Ok(graph)
    }

    /// Add one action. Fails on a duplicate id.
    pub fn insert(&mut self, action: Action) -> SessionResult<()> {
        let id = action.id();
        if self.actions.contains_key(&id) {
            return Err(SessionError::Precondition(format!(
                "duplicate {id} in action graph"
            )));
        }
        self.actions.insert(id, action);
        Ok(())
    }

    /// Number of actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// `true` if the graph holds no actions.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Look up an action.
    pub fn get(&self, id: ActionId) -> Option<&Action> {
        self.actions.get(&id)
    }

    /// Action ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = ActionId> + '_ {
        self.actions.keys().copied()
    }

    /// Parts controlled by the actions of this graph.
    pub fn parts(&self) -> BTreeSet<&str> {
        self.actions.values().map(Action::part).collect()
    }

    /// The realtime transition structure of this graph.
    pub fn transition_graph(&self) -> TransitionGraph {
        let adjacency = self
            .actions
            .values()
            .map(|action| {
                let targets = action
                    .reactions()
                    .iter()
                    .filter_map(|reaction| reaction.transition_target())
                    .collect();
                (action.id(), targets)
            })
            .collect();
        TransitionGraph { adjacency }
    }

    /// Split into the controller payload and the client-side watcher table,
    /// assigning a fresh [`ReactionId`] to every reaction.
    pub fn compile(self, ids: &mut ReactionIdAllocator) -> CompiledGraph {
        let mut descriptors = Vec::with_capacity(self.actions.len());
        let mut watchers = BTreeMap::new();

        for action in self.actions.into_values() {
            let (id, action_type, part, fixed_params, reactions) = action.into_parts();
            let mut realtime = Vec::with_capacity(reactions.len());
            for reaction in reactions {
                let reaction_id = ids.allocate();
                let response = match reaction.trigger {
                    Trigger::RealtimeTransition(target) => RealtimeResponse::StartAction { target },
                    Trigger::Watcher(callback) => {
                        watchers.insert(
                            reaction_id,
                            ArmedWatcher {
                                action: id,
                                callback,
                            },
                        );
                        RealtimeResponse::NotifyWatcher
                    }
                };
                realtime.push(RealtimeReaction {
                    id: reaction_id,
                    condition: reaction.condition,
                    response,
                });
            }
            descriptors.push(ActionDescriptor {
                id,
                action_type,
                part,
                fixed_params,
                reactions: realtime,
            });
        }

        CompiledGraph {
            descriptors,
            watchers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Condition;
    use crate::reaction::Reaction;

    fn action(id: u64) -> Action {
        Action::new(ActionId(id), "xfa.point_to_point_move", "arm")
    }

    fn chain() -> ActionGraph {
        ActionGraph::from_actions([
            action(1)
                .with_reaction(Reaction::realtime(Condition::Done, ActionId(2)))
                .with_reaction(Reaction::watcher(Condition::is_true("t"), |_, c| c.quit())),
            action(2).with_reaction(Reaction::watcher(Condition::Done, |_, c| c.quit())),
            action(3).with_reaction(Reaction::realtime(Condition::Done, ActionId(1))),
        ])
        .unwrap()
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let err = ActionGraph::from_actions([action(1), action(1)]).unwrap_err();
        assert!(matches!(err, SessionError::Precondition(_)));
    }

    #[test]
    fn test_adjacency_and_reachability() {
        let graph = chain();
        let transitions = graph.transition_graph();

        assert_eq!(transitions.successors(ActionId(1)), &[ActionId(2)]);
        assert!(transitions.successors(ActionId(2)).is_empty());
        assert_eq!(
            transitions.reachable_from(ActionId(1)),
            BTreeSet::from([ActionId(1), ActionId(2)])
        );
        assert_eq!(transitions.reachable_from(ActionId(3)).len(), 3);
        assert!(transitions.reachable_from(ActionId(9)).is_empty());
    }

    #[test]
    fn test_dangling_detection() {
        let graph = ActionGraph::from_actions([
            action(1).with_reaction(Reaction::realtime(Condition::Done, ActionId(5)))
        ])
        .unwrap();
        let transitions = graph.transition_graph();

        let dangling = transitions.dangling(&BTreeSet::new());
        assert_eq!(
            dangling,
            vec![DanglingTransition {
                from: ActionId(1),
                to: ActionId(5)
            }]
        );
        assert!(transitions.dangling(&BTreeSet::from([ActionId(5)])).is_empty());
    }

    #[test]
    fn test_compile_splits_domains() {
        let graph = chain();
        let mut ids = ReactionIdAllocator::new();
        let compiled = graph.compile(&mut ids);

        assert_eq!(compiled.descriptors.len(), 3);
        assert_eq!(compiled.watchers.len(), 2);

        let first = &compiled.descriptors[0];
        assert_eq!(first.id, ActionId(1));
        assert_eq!(
            first.reactions[0].response,
            RealtimeResponse::StartAction { target: ActionId(2) }
        );
        assert_eq!(first.reactions[1].response, RealtimeResponse::NotifyWatcher);

        let watcher = &compiled.watchers[&first.reactions[1].id];
        assert_eq!(watcher.action, ActionId(1));

        let from_wire = TransitionGraph::from_descriptors(&compiled.descriptors);
        assert_eq!(from_wire.successors(ActionId(3)), &[ActionId(1)]);

        // ids keep increasing across compilations of the same session
        assert_eq!(ids.allocate(), ReactionId(5));
    }
}
