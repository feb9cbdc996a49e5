//! A participant in a shared hologram session
//!
//! Outbound operations validate synchronously against local state and then
//! publish to the store; nothing changes locally until the message comes back
//! through the log. Inbound deliveries are applied one at a time, in log order,
//! to the participant's projection and replicas, and surface as events on its
//! local bus.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing::{debug, info};

use super::clock::AnimationClock;
use crate::arbiter::{ControlArbiter, Signal};
use crate::authority::AuthorityGate;
use crate::domain::{
    Animation, Change, Color3, Entity, Hologram, ManipulationSample, Menu, MenuEntry, ParticipantId, Quat, ShapeKind,
    SyncVariable, Vec3,
};
use crate::error::{Result, SyncError};
use crate::events::{DEFAULT_CHANNEL_CAPACITY, EventBus, EventEmitter, LocalEvent, Origin};
use crate::registry::NameRegistry;
use crate::store::{ControlAction, Delivery, StoreHandle, StoreMessage, StoreMetrics, StoreRequest};
use crate::throttle::{Admission, BroadcastThrottle, ThrottleConfig, ThrottleStats};

/// Per-participant tunables
#[derive(Debug, Clone)]
pub struct ParticipantSettings {
    pub throttle: ThrottleConfig,
    pub bus_capacity: usize,
    pub remote_control_color: Color3,
}

impl Default for ParticipantSettings {
    fn default() -> Self {
        Self {
            throttle: ThrottleConfig::default(),
            bus_capacity: DEFAULT_CHANNEL_CAPACITY,
            remote_control_color: Color3::remote_control(),
        }
    }
}

/// One participant's view of the session
pub struct Participant {
    id: ParticipantId,
    handle: StoreHandle,
    remote_control_color: Color3,

    gate: AuthorityGate,
    registry: NameRegistry,
    arbiter: ControlArbiter,
    throttle: BroadcastThrottle,

    /// Every name that has been materialized from a delivered create
    materialized: HashSet<String>,
    holograms: BTreeMap<String, Hologram>,
    variables: BTreeMap<String, SyncVariable>,
    animations: BTreeMap<String, Animation>,
    menus: BTreeMap<String, Menu>,
    /// button -> menu
    buttons: HashMap<String, String>,
    /// Holograms someone else is manipulating
    frozen: BTreeSet<String>,
    peers: BTreeSet<ParticipantId>,
    applied: u64,

    clock: AnimationClock,
    bus: EventBus,
    emitter: EventEmitter,
}

impl Participant {
    /// Attach to the store behind `store` as `id`
    ///
    /// The store queues a replay of the whole log for the new participant;
    /// subscribe to [`Participant::subscribe`] before draining to observe it.
    pub async fn join(store: mpsc::Sender<StoreRequest>, id: ParticipantId, settings: ParticipantSettings) -> Result<Self> {
        debug!(%id, "Participant::join: called");
        let handle = StoreHandle::attach(store, id.clone()).await?;
        let bus = EventBus::new(settings.bus_capacity);
        let emitter = bus.emitter_for(id.clone());

        info!(%id, "Joined session");
        Ok(Self {
            id,
            handle,
            remote_control_color: settings.remote_control_color,
            gate: AuthorityGate::new(),
            registry: NameRegistry::new(),
            arbiter: ControlArbiter::new(),
            throttle: BroadcastThrottle::new(&settings.throttle),
            materialized: HashSet::new(),
            holograms: BTreeMap::new(),
            variables: BTreeMap::new(),
            animations: BTreeMap::new(),
            menus: BTreeMap::new(),
            buttons: HashMap::new(),
            frozen: BTreeSet::new(),
            peers: BTreeSet::new(),
            applied: 0,
            clock: AnimationClock::new(),
            bus,
            emitter,
        })
    }

    // === Creation ===

    /// Publish a new entity
    ///
    /// Returns `Ok(false)` without publishing when this participant does not
    /// hold update authority.
    pub async fn create(&mut self, entity: Entity) -> Result<bool> {
        debug!(id = %self.id, name = entity.name(), kind = %entity.kind(), "Participant::create: called");
        if !self.gate.permits("create") {
            return Ok(false);
        }
        entity.validate()?;
        let owned: Vec<String> = entity.names().into_iter().map(str::to_string).collect();
        let names: Vec<&str> = owned.iter().map(String::as_str).collect();
        self.registry.ensure_available(&names)?;
        // Names are only recorded once the store has taken the create
        self.handle.publish(StoreMessage::Create { entity }).await?;
        self.registry.claim_all(&names)?;
        Ok(true)
    }

    /// Create a primitive hologram; `shape` is one of the supported shape names
    pub async fn create_standard(
        &mut self,
        name: &str,
        shape: &str,
        creation_options: serde_json::Value,
        color: Color3,
    ) -> Result<bool> {
        if !self.gate.permits("create_standard") {
            return Ok(false);
        }
        let shape: ShapeKind = shape.parse()?;
        self.create(Entity::Hologram(Hologram::standard(name, shape, creation_options, color)))
            .await
    }

    pub async fn create_imported(&mut self, name: &str, mesh_file_path: &str) -> Result<bool> {
        self.create(Entity::Hologram(Hologram::imported(name, mesh_file_path))).await
    }

    pub async fn create_variable(&mut self, name: &str, value: serde_json::Value) -> Result<bool> {
        self.create(Entity::Variable(SyncVariable::new(name, value))).await
    }

    pub async fn create_animation(&mut self, name: &str, time_ms: u64) -> Result<bool> {
        self.create(Entity::Animation(Animation::new(name, time_ms))).await
    }

    pub async fn create_menu(&mut self, name: &str, entries: Vec<MenuEntry>) -> Result<bool> {
        self.create(Entity::Menu(Menu {
            name: name.to_string(),
            entries,
        }))
        .await
    }

    // === Gated setters ===

    pub async fn set_position(&mut self, name: &str, position: Vec3) -> Result<bool> {
        self.publish_update("set_position", name, Change::Position(position)).await
    }

    pub async fn set_rotation(&mut self, name: &str, rotation: Quat) -> Result<bool> {
        self.publish_update("set_rotation", name, Change::Rotation(rotation)).await
    }

    pub async fn set_scaling(&mut self, name: &str, scaling: Vec3) -> Result<bool> {
        self.publish_update("set_scaling", name, Change::Scaling(scaling)).await
    }

    pub async fn set_color(&mut self, name: &str, color: Color3) -> Result<bool> {
        self.publish_update("set_color", name, Change::Color(color)).await
    }

    pub async fn set_variable(&mut self, name: &str, value: serde_json::Value) -> Result<bool> {
        self.publish_update("set_variable", name, Change::Value(value)).await
    }

    async fn publish_update(&mut self, action: &str, target: &str, change: Change) -> Result<bool> {
        debug!(id = %self.id, %action, %target, "Participant::publish_update: called");
        if !self.gate.permits(action) {
            return Ok(false);
        }
        self.registry.require(target)?;
        self.handle
            .publish(StoreMessage::Update {
                target: target.to_string(),
                change,
            })
            .await?;
        Ok(true)
    }

    /// Stop an animation on every participant
    pub async fn destroy_animation(&mut self, name: &str) -> Result<bool> {
        debug!(id = %self.id, %name, "Participant::destroy_animation: called");
        if !self.gate.permits("destroy_animation") {
            return Ok(false);
        }
        self.registry.require(name)?;
        self.handle
            .publish(StoreMessage::DestroyAnimation { name: name.to_string() })
            .await?;
        Ok(true)
    }

    // === Manipulation ===

    /// Ask for the control token of a hologram
    ///
    /// Refused locally when this participant's replica already shows an
    /// owner. Otherwise the acquire is published and the log decides; the
    /// outcome arrives as `ControlGranted` or `ControlRejected`.
    pub async fn request_control(&mut self, name: &str) -> Result<()> {
        debug!(id = %self.id, %name, "Participant::request_control: called");
        if !self.holograms.contains_key(name) {
            return Err(SyncError::UnknownName { name: name.to_string() });
        }
        if let Some(owner) = self.arbiter.owner_of(name) {
            return Err(SyncError::AlreadyControlled {
                name: name.to_string(),
                owner: owner.clone(),
            });
        }
        self.handle
            .publish(StoreMessage::Control {
                action: ControlAction::Acquire,
                target: name.to_string(),
                requester: self.id.clone(),
            })
            .await
    }

    /// Offer one drag sample; returns whether it was broadcast
    pub async fn drag(&mut self, name: &str, position: Vec3, scaling: Vec3) -> Result<bool> {
        self.require_controller(name)?;
        let sample = ManipulationSample::new(name, position, scaling, self.id.clone());
        match self.throttle.offer(sample.clone(), Instant::now()) {
            Admission::Broadcast => {
                self.handle.publish(StoreMessage::Manipulate(sample)).await?;
                Ok(true)
            }
            Admission::Dropped => Ok(false),
        }
    }

    /// Give up the control token, publishing the final pose first
    pub async fn release_control(&mut self, name: &str) -> Result<()> {
        debug!(id = %self.id, %name, "Participant::release_control: called");
        self.require_controller(name)?;
        if let Some(last) = self.throttle.finish(name) {
            self.handle.publish(StoreMessage::Manipulate(last)).await?;
        }
        self.handle
            .publish(StoreMessage::Control {
                action: ControlAction::Release,
                target: name.to_string(),
                requester: self.id.clone(),
            })
            .await
    }

    fn require_controller(&self, name: &str) -> Result<()> {
        if self.arbiter.owner_of(name) == Some(&self.id) {
            Ok(())
        } else {
            Err(SyncError::NotController { name: name.to_string() })
        }
    }

    /// Press a menu button
    pub async fn press(&mut self, button: &str) -> Result<()> {
        debug!(id = %self.id, %button, "Participant::press: called");
        if !self.buttons.contains_key(button) {
            return Err(SyncError::UnknownName {
                name: button.to_string(),
            });
        }
        self.handle
            .publish(StoreMessage::Press {
                button: button.to_string(),
                by: self.id.clone(),
            })
            .await
    }

    /// Leave the session gracefully
    pub async fn leave(self) -> Result<()> {
        info!(id = %self.id, "Leaving session");
        self.handle.detach().await
    }

    // === Inbound ===

    /// Apply every delivery already queued; returns how many were applied
    pub fn drain(&mut self) -> usize {
        let mut count = 0;
        while let Some(delivery) = self.handle.try_recv() {
            self.apply(delivery);
            count += 1;
        }
        count
    }

    /// Wait until the store has delivered everything sent so far, then apply it
    pub async fn sync(&mut self) -> Result<usize> {
        self.handle.flush().await?;
        Ok(self.drain())
    }

    /// Await and apply one delivery; false once the store is gone
    pub async fn next_delivery(&mut self) -> bool {
        match self.handle.recv().await {
            Some(delivery) => {
                self.apply(delivery);
                true
            }
            None => {
                if self.gate.revoke() {
                    info!(id = %self.id, "Store gone, authority revoked");
                }
                false
            }
        }
    }

    /// Apply deliveries until the store closes
    pub async fn run(&mut self) {
        while self.next_delivery().await {}
        info!(id = %self.id, "Store closed, participant loop finished");
    }

    fn apply(&mut self, delivery: Delivery) {
        let origin = if delivery.is_from(&self.id) {
            Origin::Local
        } else {
            Origin::Remote
        };
        debug!(id = %self.id, seq = ?delivery.seq, kind = delivery.message.kind(), ?origin, "Participant::apply");
        self.applied += 1;

        match delivery.message {
            StoreMessage::Create { entity } => self.apply_create(origin, entity),
            StoreMessage::Update { target, change } => self.apply_update(origin, &target, change),
            StoreMessage::Manipulate(sample) => self.apply_sample(origin, sample),
            StoreMessage::Control {
                action,
                target,
                requester,
            } => self.apply_control(origin, action, &target, &requester),
            StoreMessage::DestroyAnimation { name } => {
                if self.animations.contains_key(&name) && self.clock.stop(&name) {
                    self.emitter.animation_stopped(origin, &name);
                } else {
                    self.discard(origin, "destroy-animation", &name, "no running animation with this name");
                }
            }
            StoreMessage::Press { button, by } => {
                if self.buttons.contains_key(&button) {
                    self.emitter.button_pressed(origin, &button, &by);
                } else {
                    self.discard(origin, "press", &button, "unknown button");
                }
            }
            StoreMessage::Joined { participant } => {
                if participant != self.id {
                    self.peers.insert(participant.clone());
                }
                self.emitter.participant_joined(origin, &participant);
            }
            StoreMessage::Departed { participant } => {
                self.peers.remove(&participant);
                self.emitter.participant_departed(origin, &participant);
            }
            StoreMessage::AssignAuthority { participant } => {
                if delivery.origin.is_some() {
                    self.discard(origin, "assign-authority", participant.as_str(), "not sent by the store");
                } else if participant != self.id {
                    self.discard(origin, "assign-authority", participant.as_str(), "addressed to another participant");
                } else if self.gate.grant() {
                    self.emitter.authority_granted();
                }
            }
        }
    }

    fn apply_create(&mut self, origin: Origin, entity: Entity) {
        let name = entity.name().to_string();
        if let Err(e) = entity.validate() {
            self.discard(origin, "create", &name, &e.to_string());
            return;
        }
        let names: Vec<String> = entity.names().into_iter().map(str::to_string).collect();
        if let Some(taken) = names.iter().find(|n| self.materialized.contains(*n)) {
            let reason = format!("'{}' already exists", taken);
            self.discard(origin, "create", &name, &reason);
            return;
        }
        for n in &names {
            self.registry.reserve(n);
            self.materialized.insert(n.clone());
        }

        match &entity {
            Entity::Hologram(h) => {
                self.holograms.insert(name.clone(), h.clone());
            }
            Entity::Variable(v) => {
                self.variables.insert(name.clone(), v.clone());
            }
            Entity::Animation(a) => {
                self.clock
                    .start(&a.name, Duration::from_millis(a.time_ms), self.emitter.clone());
                self.animations.insert(name.clone(), a.clone());
            }
            Entity::Menu(m) => {
                for entry in &m.entries {
                    self.buttons.insert(entry.button.clone(), m.name.clone());
                }
                self.menus.insert(name.clone(), m.clone());
            }
        }
        self.emitter.entity_materialized(origin, &entity);
    }

    fn apply_update(&mut self, origin: Origin, target: &str, change: Change) {
        let applied = if let Some(h) = self.holograms.get_mut(target) {
            h.apply(&change)
        } else if let Some(v) = self.variables.get_mut(target) {
            v.apply(&change)
        } else {
            self.discard(origin, "update", target, "not materialized");
            return;
        };

        if applied {
            self.emitter.transform_applied(origin, target, &change);
        } else {
            let reason = format!("field '{}' does not apply", change.field());
            self.discard(origin, "update", target, &reason);
        }
    }

    fn apply_sample(&mut self, origin: Origin, sample: ManipulationSample) {
        if self.arbiter.owner_of(&sample.target) != Some(&sample.actor) {
            self.discard(origin, "manipulate", &sample.target, "sample from a participant without the token");
            return;
        }
        let Some(h) = self.holograms.get_mut(&sample.target) else {
            self.discard(origin, "manipulate", &sample.target, "not materialized");
            return;
        };

        let position = Change::Position(sample.position);
        let scaling = Change::Scaling(sample.scaling);
        h.apply(&position);
        h.apply(&scaling);
        self.emitter.transform_applied(origin, &sample.target, &position);
        self.emitter.transform_applied(origin, &sample.target, &scaling);
    }

    fn apply_control(&mut self, origin: Origin, action: ControlAction, target: &str, requester: &ParticipantId) {
        match action {
            ControlAction::Acquire if !self.holograms.contains_key(target) => {
                self.discard(origin, "control", target, "not a materialized hologram");
            }
            ControlAction::Acquire => match self.arbiter.acquire(target, requester) {
                Ok(transition) => {
                    self.emitter.control_granted(origin, target, requester);
                    if let Some(signal) = transition.signal_for(&self.id) {
                        self.apply_signal(origin, signal);
                    }
                }
                Err(SyncError::AlreadyControlled { owner, .. }) => {
                    self.emitter.control_rejected(origin, target, requester, &owner);
                }
                Err(e) => self.discard(origin, "control", target, &e.to_string()),
            },
            ControlAction::Release => match self.arbiter.release(target, requester) {
                Some(transition) => {
                    if requester == &self.id {
                        self.throttle.forget(target);
                    }
                    self.emitter.control_released(origin, target, requester);
                    if let Some(signal) = transition.signal_for(&self.id) {
                        self.apply_signal(origin, signal);
                    }
                }
                None => self.discard(origin, "control", target, "release by a participant without the token"),
            },
        }
    }

    /// Freeze and restore are idempotent: a repeat changes nothing
    fn apply_signal(&mut self, origin: Origin, signal: Signal) {
        match signal {
            Signal::Freeze(name) => {
                if self.frozen.insert(name.clone()) {
                    self.emitter
                        .affordance_changed(origin, &name, false, Some(self.remote_control_color));
                }
            }
            Signal::Restore(name) => {
                if self.frozen.remove(&name) {
                    self.emitter.affordance_changed(origin, &name, true, None);
                }
            }
        }
    }

    fn discard(&self, origin: Origin, kind: &str, target: &str, reason: &str) {
        debug!(id = %self.id, %kind, %target, %reason, "Discarding delivery");
        self.emitter.update_discarded(origin, kind, target, reason);
    }

    // === Accessors ===

    pub fn id(&self) -> &ParticipantId {
        &self.id
    }

    pub fn is_authority(&self) -> bool {
        self.gate.is_authority()
    }

    pub fn hologram(&self, name: &str) -> Option<&Hologram> {
        self.holograms.get(name)
    }

    pub fn holograms(&self) -> impl Iterator<Item = &Hologram> {
        self.holograms.values()
    }

    pub fn variable(&self, name: &str) -> Option<&serde_json::Value> {
        self.variables.get(name).map(|v| &v.value)
    }

    pub fn menu(&self, name: &str) -> Option<&Menu> {
        self.menus.get(name)
    }

    pub fn controller_of(&self, name: &str) -> Option<&ParticipantId> {
        self.arbiter.owner_of(name)
    }

    /// Whether local manipulation of `name` is disabled
    pub fn is_frozen(&self, name: &str) -> bool {
        self.frozen.contains(name)
    }

    pub fn is_animating(&self, name: &str) -> bool {
        self.clock.is_running(name)
    }

    pub fn knows_name(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    /// Other participants currently in the session
    pub fn peers(&self) -> impl Iterator<Item = &ParticipantId> {
        self.peers.iter()
    }

    pub fn applied(&self) -> u64 {
        self.applied
    }

    pub fn throttle_stats(&self) -> ThrottleStats {
        self.throttle.stats()
    }

    pub async fn store_metrics(&self) -> Result<StoreMetrics> {
        self.handle.metrics().await
    }

    /// Subscribe to this participant's local events
    pub fn subscribe(&self) -> broadcast::Receiver<LocalEvent> {
        self.bus.subscribe()
    }
}
