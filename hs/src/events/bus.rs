//! Event Bus - per-participant pub/sub for local session events
//!
//! The EventBus uses a tokio broadcast channel to deliver events to every
//! local subscriber (renderer adapter, simulation report, tests) in emission
//! order. Each participant owns its own bus; nothing here is global.

use tokio::sync::broadcast;
use tracing::debug;

use super::types::{LocalEvent, Origin};
use crate::domain::{Change, Color3, Entity, ParticipantId};

/// Default channel capacity (events)
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Local event bus for one participant
pub struct EventBus {
    tx: broadcast::Sender<LocalEvent>,
}

impl EventBus {
    /// Create a new event bus with the given capacity
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "EventBus::new: creating event bus");
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Create a new event bus with default capacity
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Emit an event to all subscribers
    ///
    /// Fire-and-forget: with no subscribers the event is dropped.
    pub fn emit(&self, event: LocalEvent) {
        debug!(event_type = event.event_type(), participant = %event.participant(), "EventBus::emit");
        let _ = self.tx.send(event);
    }

    /// Subscribe to events emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<LocalEvent> {
        debug!("EventBus::subscribe: new subscriber");
        self.tx.subscribe()
    }

    /// Create an emitter bound to `participant`
    pub fn emitter_for(&self, participant: ParticipantId) -> EventEmitter {
        debug!(%participant, "EventBus::emitter_for: creating emitter");
        EventEmitter {
            tx: self.tx.clone(),
            participant,
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Handle for emitting events without owning the bus
///
/// Cheap to clone; every event it emits carries the bound participant id.
#[derive(Clone)]
pub struct EventEmitter {
    tx: broadcast::Sender<LocalEvent>,
    participant: ParticipantId,
}

impl EventEmitter {
    pub fn participant(&self) -> &ParticipantId {
        &self.participant
    }

    /// Emit a raw event
    pub fn emit(&self, event: LocalEvent) {
        debug!(event_type = event.event_type(), "EventEmitter::emit");
        let _ = self.tx.send(event);
    }

    /// Subscribe to the bus this emitter feeds
    pub fn subscribe(&self) -> broadcast::Receiver<LocalEvent> {
        self.tx.subscribe()
    }

    // === Convenience methods ===

    pub fn entity_materialized(&self, origin: Origin, entity: &Entity) {
        self.emit(LocalEvent::EntityMaterialized {
            participant: self.participant.clone(),
            origin,
            entity: entity.clone(),
        });
    }

    pub fn transform_applied(&self, origin: Origin, target: &str, change: &Change) {
        self.emit(LocalEvent::TransformApplied {
            participant: self.participant.clone(),
            origin,
            target: target.to_string(),
            change: change.clone(),
        });
    }

    /// Emit a freeze (`enabled == false`) or restore
    pub fn affordance_changed(&self, origin: Origin, target: &str, enabled: bool, highlight: Option<Color3>) {
        self.emit(LocalEvent::AffordanceChanged {
            participant: self.participant.clone(),
            origin,
            target: target.to_string(),
            enabled,
            highlight,
        });
    }

    pub fn control_granted(&self, origin: Origin, target: &str, owner: &ParticipantId) {
        self.emit(LocalEvent::ControlGranted {
            participant: self.participant.clone(),
            origin,
            target: target.to_string(),
            owner: owner.clone(),
        });
    }

    pub fn control_rejected(&self, origin: Origin, target: &str, requester: &ParticipantId, owner: &ParticipantId) {
        self.emit(LocalEvent::ControlRejected {
            participant: self.participant.clone(),
            origin,
            target: target.to_string(),
            requester: requester.clone(),
            owner: owner.clone(),
        });
    }

    pub fn control_released(&self, origin: Origin, target: &str, previous_owner: &ParticipantId) {
        self.emit(LocalEvent::ControlReleased {
            participant: self.participant.clone(),
            origin,
            target: target.to_string(),
            previous_owner: previous_owner.clone(),
        });
    }

    pub fn authority_granted(&self) {
        self.emit(LocalEvent::AuthorityGranted {
            participant: self.participant.clone(),
            origin: Origin::Remote,
        });
    }

    pub fn participant_joined(&self, origin: Origin, joined: &ParticipantId) {
        self.emit(LocalEvent::ParticipantJoined {
            participant: self.participant.clone(),
            origin,
            joined: joined.clone(),
        });
    }

    pub fn participant_departed(&self, origin: Origin, departed: &ParticipantId) {
        self.emit(LocalEvent::ParticipantDeparted {
            participant: self.participant.clone(),
            origin,
            departed: departed.clone(),
        });
    }

    /// Ticks come from the local clock, so they are always `Origin::Local`
    pub fn animation_tick(&self, name: &str, tick: u64) {
        self.emit(LocalEvent::AnimationTick {
            participant: self.participant.clone(),
            origin: Origin::Local,
            name: name.to_string(),
            tick,
        });
    }

    pub fn animation_stopped(&self, origin: Origin, name: &str) {
        self.emit(LocalEvent::AnimationStopped {
            participant: self.participant.clone(),
            origin,
            name: name.to_string(),
        });
    }

    pub fn button_pressed(&self, origin: Origin, button: &str, by: &ParticipantId) {
        self.emit(LocalEvent::ButtonPressed {
            participant: self.participant.clone(),
            origin,
            button: button.to_string(),
            by: by.clone(),
        });
    }

    pub fn update_discarded(&self, origin: Origin, kind: &str, target: &str, reason: &str) {
        self.emit(LocalEvent::UpdateDiscarded {
            participant: self.participant.clone(),
            origin,
            kind: kind.to_string(),
            target: target.to_string(),
            reason: reason.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    #[test]
    fn test_event_bus_subscribe() {
        let bus = EventBus::new(16);
        assert_eq!(bus.subscriber_count(), 0);
        let _rx1 = bus.subscribe();
        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn test_event_bus_no_subscribers() {
        let bus = EventBus::new(16);
        // This should not panic even with no subscribers
        bus.emitter_for(ParticipantId::from("a")).authority_granted();
    }

    #[tokio::test]
    async fn test_emitter_preserves_order() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let emitter = bus.emitter_for(ParticipantId::from("b"));
        let a = ParticipantId::from("a");

        emitter.participant_joined(Origin::Remote, &a);
        emitter.control_granted(Origin::Remote, "sphere", &a);
        emitter.affordance_changed(Origin::Remote, "sphere", false, Some(Color3::remote_control()));
        emitter.animation_tick("spin", 1);

        let types: Vec<&str> = (0..4).map(|_| rx.try_recv().unwrap().event_type()).collect();
        assert_eq!(
            types,
            vec!["ParticipantJoined", "ControlGranted", "AffordanceChanged", "AnimationTick"]
        );
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_emitter_binds_participant() {
        let bus = EventBus::new(16);
        let emitter = bus.emitter_for(ParticipantId::from("b"));
        let mut rx = emitter.subscribe();

        emitter.update_discarded(Origin::Remote, "update", "ghost", "unknown name");

        let event = rx.recv().await.unwrap();
        assert_eq!(event.participant(), &ParticipantId::from("b"));
        match event {
            LocalEvent::UpdateDiscarded { target, reason, .. } => {
                assert_eq!(target, "ghost");
                assert_eq!(reason, "unknown name");
            }
            other => panic!("Expected UpdateDiscarded, got {:?}", other),
        }
    }
}
