//! Event types for local session observability
//!
//! Everything a participant does in response to a delivery, or on its own
//! clock, surfaces as one of these events on its local bus:
//! - Entity lifecycle (materialized, transformed)
//! - Manipulation control (granted, rejected, released, affordance changes)
//! - Session membership (joins, departures, authority)
//! - Animations and menus (ticks, presses)

use serde::{Deserialize, Serialize};

use crate::domain::{Change, Color3, Entity, ParticipantId};

/// Where the change behind an event came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Origin {
    /// Published by this participant, or produced by its own clock
    Local,
    /// Published by a peer or by the store
    Remote,
}

/// Core event enum - the vocabulary of participant activity
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LocalEvent {
    // === Entities ===
    /// A created entity now exists locally
    EntityMaterialized {
        participant: ParticipantId,
        origin: Origin,
        entity: Entity,
    },
    /// A change was folded into a local entity
    TransformApplied {
        participant: ParticipantId,
        origin: Origin,
        target: String,
        change: Change,
    },

    // === Manipulation control ===
    /// Local manipulation of a hologram was disabled or re-enabled
    AffordanceChanged {
        participant: ParticipantId,
        origin: Origin,
        target: String,
        enabled: bool,
        highlight: Option<Color3>,
    },
    /// A control token was granted
    ControlGranted {
        participant: ParticipantId,
        origin: Origin,
        target: String,
        owner: ParticipantId,
    },
    /// An acquire lost to an earlier one
    ControlRejected {
        participant: ParticipantId,
        origin: Origin,
        target: String,
        requester: ParticipantId,
        owner: ParticipantId,
    },
    /// A control token was released
    ControlReleased {
        participant: ParticipantId,
        origin: Origin,
        target: String,
        previous_owner: ParticipantId,
    },

    // === Session membership ===
    /// This participant now holds update authority
    AuthorityGranted { participant: ParticipantId, origin: Origin },
    /// Someone attached to the session
    ParticipantJoined {
        participant: ParticipantId,
        origin: Origin,
        joined: ParticipantId,
    },
    /// Someone left the session
    ParticipantDeparted {
        participant: ParticipantId,
        origin: Origin,
        departed: ParticipantId,
    },

    // === Animations & menus ===
    /// An animation ticked
    AnimationTick {
        participant: ParticipantId,
        origin: Origin,
        name: String,
        tick: u64,
    },
    /// An animation was destroyed
    AnimationStopped {
        participant: ParticipantId,
        origin: Origin,
        name: String,
    },
    /// A menu button was pressed
    ButtonPressed {
        participant: ParticipantId,
        origin: Origin,
        button: String,
        by: ParticipantId,
    },

    // === Discards ===
    /// A delivery was dropped because it did not fit local state
    UpdateDiscarded {
        participant: ParticipantId,
        origin: Origin,
        kind: String,
        target: String,
        reason: String,
    },
}

impl LocalEvent {
    /// Get the participant whose bus carried this event
    pub fn participant(&self) -> &ParticipantId {
        match self {
            LocalEvent::EntityMaterialized { participant, .. }
            | LocalEvent::TransformApplied { participant, .. }
            | LocalEvent::AffordanceChanged { participant, .. }
            | LocalEvent::ControlGranted { participant, .. }
            | LocalEvent::ControlRejected { participant, .. }
            | LocalEvent::ControlReleased { participant, .. }
            | LocalEvent::AuthorityGranted { participant, .. }
            | LocalEvent::ParticipantJoined { participant, .. }
            | LocalEvent::ParticipantDeparted { participant, .. }
            | LocalEvent::AnimationTick { participant, .. }
            | LocalEvent::AnimationStopped { participant, .. }
            | LocalEvent::ButtonPressed { participant, .. }
            | LocalEvent::UpdateDiscarded { participant, .. } => participant,
        }
    }

    pub fn origin(&self) -> Origin {
        match self {
            LocalEvent::EntityMaterialized { origin, .. }
            | LocalEvent::TransformApplied { origin, .. }
            | LocalEvent::AffordanceChanged { origin, .. }
            | LocalEvent::ControlGranted { origin, .. }
            | LocalEvent::ControlRejected { origin, .. }
            | LocalEvent::ControlReleased { origin, .. }
            | LocalEvent::AuthorityGranted { origin, .. }
            | LocalEvent::ParticipantJoined { origin, .. }
            | LocalEvent::ParticipantDeparted { origin, .. }
            | LocalEvent::AnimationTick { origin, .. }
            | LocalEvent::AnimationStopped { origin, .. }
            | LocalEvent::ButtonPressed { origin, .. }
            | LocalEvent::UpdateDiscarded { origin, .. } => *origin,
        }
    }

    /// Get the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            LocalEvent::EntityMaterialized { .. } => "EntityMaterialized",
            LocalEvent::TransformApplied { .. } => "TransformApplied",
            LocalEvent::AffordanceChanged { .. } => "AffordanceChanged",
            LocalEvent::ControlGranted { .. } => "ControlGranted",
            LocalEvent::ControlRejected { .. } => "ControlRejected",
            LocalEvent::ControlReleased { .. } => "ControlReleased",
            LocalEvent::AuthorityGranted { .. } => "AuthorityGranted",
            LocalEvent::ParticipantJoined { .. } => "ParticipantJoined",
            LocalEvent::ParticipantDeparted { .. } => "ParticipantDeparted",
            LocalEvent::AnimationTick { .. } => "AnimationTick",
            LocalEvent::AnimationStopped { .. } => "AnimationStopped",
            LocalEvent::ButtonPressed { .. } => "ButtonPressed",
            LocalEvent::UpdateDiscarded { .. } => "UpdateDiscarded",
        }
    }
}
