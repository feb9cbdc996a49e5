//! Message types for the replicated store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::domain::{Change, Entity, ManipulationSample, ParticipantId};

/// Whether a control message takes or gives up a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControlAction {
    Acquire,
    Release,
}

/// Messages carried by the store
///
/// Everything except `AssignAuthority` travels through the ordered log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StoreMessage {
    /// A new named entity
    Create { entity: Entity },

    /// A canonical change to an existing entity
    Update { target: String, change: Change },

    /// Throttled pose sample from the token holder
    Manipulate(ManipulationSample),

    /// Token acquire or release
    Control {
        action: ControlAction,
        target: String,
        requester: ParticipantId,
    },

    /// Stop an animation's ticks everywhere
    DestroyAnimation { name: String },

    /// A menu button was pressed
    Press { button: String, by: ParticipantId },

    /// A participant attached
    Joined { participant: ParticipantId },

    /// A participant left, gracefully or not
    Departed { participant: ParticipantId },

    /// Direct instruction: the receiver now holds update authority
    AssignAuthority { participant: ParticipantId },
}

impl StoreMessage {
    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            StoreMessage::Create { .. } => "create",
            StoreMessage::Update { .. } => "update",
            StoreMessage::Manipulate(_) => "manipulate",
            StoreMessage::Control { .. } => "control",
            StoreMessage::DestroyAnimation { .. } => "destroy-animation",
            StoreMessage::Press { .. } => "press",
            StoreMessage::Joined { .. } => "joined",
            StoreMessage::Departed { .. } => "departed",
            StoreMessage::AssignAuthority { .. } => "assign-authority",
        }
    }

    /// Membership and authority messages only the store itself may originate
    pub fn is_store_only(&self) -> bool {
        matches!(
            self,
            StoreMessage::Joined { .. } | StoreMessage::Departed { .. } | StoreMessage::AssignAuthority { .. }
        )
    }
}

/// One message as handed to a participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    /// Log position; `None` for point-to-point messages
    pub seq: Option<u64>,

    /// Participant that published the message; `None` when the store itself did
    pub origin: Option<ParticipantId>,

    #[serde(rename = "sent-at")]
    pub sent_at: DateTime<Utc>,

    pub message: StoreMessage,
}

impl Delivery {
    pub fn logged(seq: u64, origin: Option<ParticipantId>, message: StoreMessage) -> Self {
        Self {
            seq: Some(seq),
            origin,
            sent_at: Utc::now(),
            message,
        }
    }

    pub fn direct(origin: Option<ParticipantId>, message: StoreMessage) -> Self {
        Self {
            seq: None,
            origin,
            sent_at: Utc::now(),
            message,
        }
    }

    pub fn is_direct(&self) -> bool {
        self.seq.is_none()
    }

    /// Whether `participant` published this delivery
    pub fn is_from(&self, participant: &ParticipantId) -> bool {
        self.origin.as_ref() == Some(participant)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

/// Internal requests to the store task
#[derive(Debug)]
pub enum StoreRequest {
    /// Attach a participant; the whole log is replayed to `tx` first
    Attach {
        participant: ParticipantId,
        tx: mpsc::UnboundedSender<Delivery>,
    },

    /// Graceful departure
    Detach { participant: ParticipantId },

    /// Append to the log and deliver to every attached participant
    Publish {
        from: ParticipantId,
        message: StoreMessage,
    },

    /// Deliver to one participant without logging
    SendTo {
        from: ParticipantId,
        target: ParticipantId,
        message: StoreMessage,
    },

    /// Reply once every earlier request has been delivered
    Flush { reply_tx: oneshot::Sender<()> },

    /// Get current metrics
    GetMetrics { reply_tx: oneshot::Sender<StoreMetrics> },

    /// Shutdown the store
    Shutdown,
}

/// Store metrics for observability
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreMetrics {
    pub attached: usize,
    #[serde(rename = "log-len")]
    pub log_len: usize,
    #[serde(rename = "messages-delivered")]
    pub messages_delivered: u64,
    #[serde(rename = "direct-sent")]
    pub direct_sent: u64,
    pub departures: u64,
    #[serde(rename = "ungraceful-departures")]
    pub ungraceful_departures: u64,
    /// Control tokens currently held
    pub controlled: usize,
    /// Publishes and direct sends refused as forged
    pub rejected: u64,
}
