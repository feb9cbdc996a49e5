//! View lifecycle coordinator
//!
//! Keeps the join order of a session and decides who holds update authority.
//! The earliest joiner still present is always the holder; when the holder
//! departs, the next participant in join order takes over.

use tracing::{debug, info};

use crate::domain::ParticipantId;

/// Result of processing a departure
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Departure {
    /// Whether the participant was part of the session at all
    pub was_member: bool,
    /// Participant that must now be told it holds authority, if it changed
    pub new_authority: Option<ParticipantId>,
}

/// Join order plus current authority holder
#[derive(Debug, Default)]
pub struct ViewLifecycle {
    order: Vec<ParticipantId>,
    authority: Option<ParticipantId>,
}

impl ViewLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a join
    ///
    /// Returns the participant to instruct as authority holder when the
    /// session had none.
    pub fn joined(&mut self, participant: &ParticipantId) -> Option<ParticipantId> {
        if self.order.contains(participant) {
            debug!(%participant, "ViewLifecycle: already joined");
            return None;
        }
        self.order.push(participant.clone());

        if self.authority.is_none() {
            info!(%participant, "ViewLifecycle: first participant takes update authority");
            self.authority = Some(participant.clone());
            return self.authority.clone();
        }
        None
    }

    /// Record a departure, graceful or not
    pub fn departed(&mut self, participant: &ParticipantId) -> Departure {
        let Some(pos) = self.order.iter().position(|p| p == participant) else {
            debug!(%participant, "ViewLifecycle: departure of unknown participant");
            return Departure::default();
        };
        self.order.remove(pos);

        if self.authority.as_ref() != Some(participant) {
            return Departure {
                was_member: true,
                new_authority: None,
            };
        }

        self.authority = self.order.first().cloned();
        match &self.authority {
            Some(next) => info!(from = %participant, to = %next, "ViewLifecycle: update authority handed off"),
            None => info!(%participant, "ViewLifecycle: last participant left, no authority holder"),
        }
        Departure {
            was_member: true,
            new_authority: self.authority.clone(),
        }
    }

    pub fn authority(&self) -> Option<&ParticipantId> {
        self.authority.as_ref()
    }

    pub fn participants(&self) -> &[ParticipantId] {
        &self.order
    }

    pub fn is_member(&self, participant: &ParticipantId) -> bool {
        self.order.contains(participant)
    }
}
