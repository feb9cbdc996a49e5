//! Manipulation control arbiter
//!
//! Decides, per hologram, which participant may drag it. Every participant
//! runs its own replica and feeds it `control` messages in log order, so all
//! replicas reach the same verdict: the first acquire delivered wins, and any
//! acquire delivered while the token is held is rejected.

use std::collections::BTreeMap;

use tracing::debug;

use crate::domain::ParticipantId;
use crate::error::{Result, SyncError};

/// Control state of one hologram
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlState {
    Free,
    Controlled(ParticipantId),
}

/// Local manipulation affordance change for a viewer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// Disable local manipulation and highlight the object
    Freeze(String),
    /// Re-enable local manipulation and clear the highlight
    Restore(String),
}

/// Outcome of an accepted control message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlTransition {
    Frozen { name: String, owner: ParticipantId },
    Restored { name: String, previous_owner: ParticipantId },
}

impl ControlTransition {
    pub fn name(&self) -> &str {
        match self {
            ControlTransition::Frozen { name, .. } | ControlTransition::Restored { name, .. } => name,
        }
    }

    pub fn owner(&self) -> &ParticipantId {
        match self {
            ControlTransition::Frozen { owner, .. } => owner,
            ControlTransition::Restored { previous_owner, .. } => previous_owner,
        }
    }

    /// The affordance change `viewer` should apply; the owner itself gets none
    pub fn signal_for(&self, viewer: &ParticipantId) -> Option<Signal> {
        if self.owner() == viewer {
            return None;
        }
        Some(match self {
            ControlTransition::Frozen { name, .. } => Signal::Freeze(name.clone()),
            ControlTransition::Restored { name, .. } => Signal::Restore(name.clone()),
        })
    }
}

/// Replica of the per-hologram control tokens
#[derive(Debug, Default, Clone)]
pub struct ControlArbiter {
    tokens: BTreeMap<String, ParticipantId>,
}

impl ControlArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process an acquire in log order
    pub fn acquire(&mut self, name: &str, requester: &ParticipantId) -> Result<ControlTransition> {
        if let Some(owner) = self.tokens.get(name) {
            debug!(%name, %requester, %owner, "ControlArbiter: acquire rejected");
            return Err(SyncError::AlreadyControlled {
                name: name.to_string(),
                owner: owner.clone(),
            });
        }
        self.tokens.insert(name.to_string(), requester.clone());
        debug!(%name, %requester, "ControlArbiter: token granted");
        Ok(ControlTransition::Frozen {
            name: name.to_string(),
            owner: requester.clone(),
        })
    }

    /// Process a release in log order
    ///
    /// Only the current owner can release. Anything else, including a
    /// release that was already applied, is ignored.
    pub fn release(&mut self, name: &str, requester: &ParticipantId) -> Option<ControlTransition> {
        match self.tokens.get(name) {
            Some(owner) if owner == requester => {
                self.tokens.remove(name);
                debug!(%name, %requester, "ControlArbiter: token released");
                Some(ControlTransition::Restored {
                    name: name.to_string(),
                    previous_owner: requester.clone(),
                })
            }
            _ => {
                debug!(%name, %requester, "ControlArbiter: release ignored");
                None
            }
        }
    }

    /// Release every token `owner` holds, in name order
    pub fn release_all(&mut self, owner: &ParticipantId) -> Vec<ControlTransition> {
        self.held_by(owner)
            .into_iter()
            .filter_map(|name| self.release(&name, owner))
            .collect()
    }

    pub fn state(&self, name: &str) -> ControlState {
        match self.tokens.get(name) {
            Some(owner) => ControlState::Controlled(owner.clone()),
            None => ControlState::Free,
        }
    }

    pub fn owner_of(&self, name: &str) -> Option<&ParticipantId> {
        self.tokens.get(name)
    }

    /// Names of the holograms `owner` controls, in name order
    pub fn held_by(&self, owner: &ParticipantId) -> Vec<String> {
        self.tokens
            .iter()
            .filter(|(_, o)| *o == owner)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn controlled_count(&self) -> usize {
        self.tokens.len()
    }
}
