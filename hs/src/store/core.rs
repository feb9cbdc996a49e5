//! Main store task implementation

use std::collections::{BTreeMap, HashSet, VecDeque};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::config::{SessionCredentials, StoreConfig};
use super::messages::{ControlAction, Delivery, StoreMessage, StoreMetrics, StoreRequest};
use crate::arbiter::ControlArbiter;
use crate::domain::{Entity, ParticipantId};
use crate::error::Result;
use crate::lifecycle::ViewLifecycle;

/// State owned by the running store task
#[derive(Default)]
struct StoreState {
    attached: BTreeMap<ParticipantId, mpsc::UnboundedSender<Delivery>>,
    log: Vec<Delivery>,
    /// Last sequence number handed out; survives log compaction
    last_seq: u64,
    lifecycle: ViewLifecycle,
    arbiter: ControlArbiter,
    /// Names created so far, and which of them are holograms
    materialized: HashSet<String>,
    holograms: HashSet<String>,
    /// Participants whose delivery failed, waiting to be departed
    failed: VecDeque<ParticipantId>,
    metrics: StoreMetrics,
}

impl StoreState {
    /// Append to the log and deliver to every attached participant in log order
    fn append(&mut self, origin: Option<ParticipantId>, message: StoreMessage) {
        self.track(&message);
        self.log_and_deliver(origin, message);
    }

    /// Mirror what every replica will conclude from `message`
    ///
    /// The store keeps its own arbiter so it knows what a departing
    /// participant held, and the hologram names so that replica agrees with
    /// the participants on which acquires count.
    fn track(&mut self, message: &StoreMessage) {
        match message {
            StoreMessage::Create { entity } => {
                let names = entity.names();
                if entity.validate().is_ok() && !names.iter().any(|n| self.materialized.contains(*n)) {
                    self.materialized.extend(names.iter().map(|n| n.to_string()));
                    if let Entity::Hologram(h) = entity {
                        self.holograms.insert(h.name.clone());
                    }
                }
            }
            StoreMessage::Control {
                action: ControlAction::Acquire,
                target,
                requester,
            } if self.holograms.contains(target) => {
                let _ = self.arbiter.acquire(target, requester);
            }
            StoreMessage::Control {
                action: ControlAction::Release,
                target,
                requester,
            } => {
                self.arbiter.release(target, requester);
            }
            StoreMessage::Manipulate(sample) if self.arbiter.owner_of(&sample.target) == Some(&sample.actor) => {
                // Samples carry absolute poses, so a valid one supersedes every earlier one
                let before = self.log.len();
                self.log
                    .retain(|d| !matches!(&d.message, StoreMessage::Manipulate(s) if s.target == sample.target));
                if self.log.len() < before {
                    debug!(target = %sample.target, dropped = before - self.log.len(), "Compacted superseded samples");
                }
            }
            _ => {}
        }
        self.metrics.controlled = self.arbiter.controlled_count();
    }

    fn log_and_deliver(&mut self, origin: Option<ParticipantId>, message: StoreMessage) {
        self.last_seq += 1;
        let seq = self.last_seq;
        let delivery = Delivery::logged(seq, origin, message);
        debug!(seq, kind = delivery.message.kind(), "StoreState::append");

        for (participant, tx) in &self.attached {
            if tx.send(delivery.clone()).is_ok() {
                self.metrics.messages_delivered += 1;
            } else if !self.failed.contains(participant) {
                warn!(%participant, seq, "Delivery failed, treating as departure");
                self.failed.push_back(participant.clone());
            }
        }
        self.log.push(delivery);
        self.metrics.log_len = self.log.len();
    }

    /// Deliver to one participant without logging
    fn send_direct(&mut self, target: &ParticipantId, origin: Option<ParticipantId>, message: StoreMessage) {
        let Some(tx) = self.attached.get(target) else {
            debug!(%target, kind = message.kind(), "Direct target not attached, dropping");
            return;
        };
        debug!(%target, kind = message.kind(), "StoreState::send_direct");
        if tx.send(Delivery::direct(origin, message)).is_ok() {
            self.metrics.direct_sent += 1;
        } else if !self.failed.contains(target) {
            warn!(%target, "Direct delivery failed, treating as departure");
            self.failed.push_back(target.clone());
        }
    }

    fn attach(&mut self, participant: ParticipantId, tx: mpsc::UnboundedSender<Delivery>) {
        if self.attached.contains_key(&participant) {
            info!(%participant, "Participant re-attached, departing the previous attachment");
            self.depart(&participant, true);
        }

        debug!(%participant, replay = self.log.len(), "Replaying log to new participant");
        for delivery in &self.log {
            if tx.send(delivery.clone()).is_err() {
                warn!(%participant, "Participant went away during replay");
                return;
            }
        }
        self.attached.insert(participant.clone(), tx);
        self.metrics.attached = self.attached.len();

        self.append(
            None,
            StoreMessage::Joined {
                participant: participant.clone(),
            },
        );
        if let Some(holder) = self.lifecycle.joined(&participant) {
            self.send_direct(&holder, None, StoreMessage::AssignAuthority { participant: holder.clone() });
        }
    }

    fn depart(&mut self, participant: &ParticipantId, graceful: bool) {
        self.attached.remove(participant);
        self.metrics.attached = self.attached.len();

        let departure = self.lifecycle.departed(participant);
        if !departure.was_member {
            return;
        }

        info!(%participant, graceful, "Participant departed");
        self.metrics.departures += 1;
        if !graceful {
            self.metrics.ungraceful_departures += 1;
        }

        self.append(
            None,
            StoreMessage::Departed {
                participant: participant.clone(),
            },
        );
        for transition in self.arbiter.release_all(participant) {
            debug!(%participant, target = transition.name(), "Releasing token held by departed participant");
            self.log_and_deliver(
                Some(participant.clone()),
                StoreMessage::Control {
                    action: ControlAction::Release,
                    target: transition.name().to_string(),
                    requester: participant.clone(),
                },
            );
        }
        self.metrics.controlled = self.arbiter.controlled_count();
        if let Some(next) = departure.new_authority {
            self.send_direct(&next, None, StoreMessage::AssignAuthority { participant: next.clone() });
        }
    }

    /// Depart everyone whose delivery queue is gone, including those found while doing so
    fn settle(&mut self) {
        for (participant, tx) in &self.attached {
            if tx.is_closed() && !self.failed.contains(participant) {
                warn!(%participant, "Delivery queue closed, treating as departure");
                self.failed.push_back(participant.clone());
            }
        }
        while let Some(participant) = self.failed.pop_front() {
            self.depart(&participant, false);
        }
    }
}

/// Why `from` may not publish `message`, if it may not
fn publish_violation(from: &ParticipantId, message: &StoreMessage) -> Option<&'static str> {
    match message {
        m if m.is_store_only() => Some("message kind is reserved for the store"),
        StoreMessage::Control { requester, .. } if requester != from => Some("control on behalf of another participant"),
        StoreMessage::Manipulate(sample) if &sample.actor != from => Some("sample attributed to another participant"),
        StoreMessage::Press { by, .. } if by != from => Some("press attributed to another participant"),
        _ => None,
    }
}

/// In-process replicated store
///
/// Owns the ordered log and the attached participants. All requests go
/// through one queue, which is what defines the total order.
pub struct ReplicatedStore {
    app_id: String,
    tx: mpsc::Sender<StoreRequest>,
    rx: mpsc::Receiver<StoreRequest>,
}

impl ReplicatedStore {
    /// Open a session store with the given credentials
    pub fn open(credentials: &SessionCredentials, config: &StoreConfig) -> Result<Self> {
        credentials.validate()?;
        let (tx, rx) = mpsc::channel(config.channel_buffer.max(1));
        info!(app_id = %credentials.app_id, "Opened replicated store");
        Ok(Self {
            app_id: credentials.app_id.clone(),
            tx,
            rx,
        })
    }

    /// Get a sender for creating handles
    pub fn sender(&self) -> mpsc::Sender<StoreRequest> {
        self.tx.clone()
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Run the store task
    ///
    /// This consumes the store and runs until shutdown is requested or every
    /// sender is gone.
    pub async fn run(mut self) {
        let mut state = StoreState::default();

        info!(app_id = %self.app_id, "Store started");

        while let Some(req) = self.rx.recv().await {
            // Departures must be visible before anything else is answered
            state.settle();
            match req {
                StoreRequest::Attach { participant, tx } => {
                    debug!(%participant, "Attaching participant");
                    state.attach(participant, tx);
                }

                StoreRequest::Detach { participant } => {
                    debug!(%participant, "Detaching participant");
                    state.depart(&participant, true);
                }

                StoreRequest::Publish { from, message } => {
                    if !state.attached.contains_key(&from) {
                        warn!(%from, kind = message.kind(), "Publish from detached participant ignored");
                        continue;
                    }
                    if let Some(reason) = publish_violation(&from, &message) {
                        warn!(%from, kind = message.kind(), %reason, "Publish rejected");
                        state.metrics.rejected += 1;
                        continue;
                    }
                    state.append(Some(from), message);
                }

                StoreRequest::SendTo { from, target, message } => {
                    if message.is_store_only() {
                        warn!(%from, %target, kind = message.kind(), "Direct message reserved for the store rejected");
                        state.metrics.rejected += 1;
                        continue;
                    }
                    state.send_direct(&target, Some(from), message);
                }

                StoreRequest::Flush { reply_tx } => {
                    let _ = reply_tx.send(());
                }

                StoreRequest::GetMetrics { reply_tx } => {
                    let _ = reply_tx.send(state.metrics.clone());
                }

                StoreRequest::Shutdown => {
                    info!("Store shutting down");
                    break;
                }
            }
            state.settle();
        }

        info!("Store stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Color3, Hologram, ManipulationSample, ShapeKind, SyncVariable, Vec3};
    use serde_json::json;
    use tokio::sync::oneshot;

    fn store() -> ReplicatedStore {
        ReplicatedStore::open(&SessionCredentials::new("key", "app"), &StoreConfig::default()).unwrap()
    }

    fn pid(s: &str) -> ParticipantId {
        ParticipantId::from(s)
    }

    async fn flush(sender: &mpsc::Sender<StoreRequest>) {
        let (reply_tx, reply_rx) = oneshot::channel();
        sender.send(StoreRequest::Flush { reply_tx }).await.unwrap();
        reply_rx.await.unwrap();
    }

    async fn metrics(sender: &mpsc::Sender<StoreRequest>) -> StoreMetrics {
        let (reply_tx, reply_rx) = oneshot::channel();
        sender.send(StoreRequest::GetMetrics { reply_tx }).await.unwrap();
        reply_rx.await.unwrap()
    }

    async fn attach(sender: &mpsc::Sender<StoreRequest>, id: &str) -> mpsc::UnboundedReceiver<Delivery> {
        let (tx, rx) = mpsc::unbounded_channel();
        sender
            .send(StoreRequest::Attach { participant: pid(id), tx })
            .await
            .unwrap();
        rx
    }

    async fn publish(sender: &mpsc::Sender<StoreRequest>, from: &str, message: StoreMessage) {
        sender
            .send(StoreRequest::Publish {
                from: pid(from),
                message,
            })
            .await
            .unwrap();
    }

    fn create_hologram(name: &str) -> StoreMessage {
        StoreMessage::Create {
            entity: Entity::Hologram(Hologram::standard(name, ShapeKind::Sphere, json!({}), Color3::white())),
        }
    }

    fn acquire(target: &str, requester: &str) -> StoreMessage {
        StoreMessage::Control {
            action: ControlAction::Acquire,
            target: target.to_string(),
            requester: pid(requester),
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Delivery>) -> Vec<Delivery> {
        let mut out = Vec::new();
        while let Ok(d) = rx.try_recv() {
            out.push(d);
        }
        out
    }

    fn kinds(deliveries: &[Delivery]) -> Vec<&'static str> {
        deliveries.iter().map(|d| d.message.kind()).collect()
    }

    #[test]
    fn test_open_rejects_empty_credentials() {
        let result = ReplicatedStore::open(&SessionCredentials::new("", "app"), &StoreConfig::default());
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_first_attach_gets_authority() {
        let store = store();
        let sender = store.sender();
        let task = tokio::spawn(store.run());

        let mut rx = attach(&sender, "a").await;
        flush(&sender).await;

        let got = drain(&mut rx);
        assert_eq!(got.len(), 2);
        assert!(matches!(got[0].message, StoreMessage::Joined { ref participant } if participant == &pid("a")));
        assert_eq!(got[0].seq, Some(1));
        assert!(matches!(got[1].message, StoreMessage::AssignAuthority { ref participant } if participant == &pid("a")));
        assert!(got[1].is_direct());

        sender.send(StoreRequest::Shutdown).await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_late_joiner_gets_replay() {
        let store = store();
        let sender = store.sender();
        let task = tokio::spawn(store.run());

        let _rx_a = attach(&sender, "a").await;
        publish(&sender, "a", acquire("sphere", "a")).await;
        let mut rx_b = attach(&sender, "b").await;
        flush(&sender).await;

        let got = drain(&mut rx_b);
        assert_eq!(kinds(&got), vec!["joined", "control", "joined"]);
        let seqs: Vec<Option<u64>> = got.iter().map(|d| d.seq).collect();
        assert_eq!(seqs, vec![Some(1), Some(2), Some(3)]);

        sender.send(StoreRequest::Shutdown).await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_ungraceful_departure_releases_tokens_and_hands_off() {
        let store = store();
        let sender = store.sender();
        let task = tokio::spawn(store.run());

        let rx_a = attach(&sender, "a").await;
        let mut rx_b = attach(&sender, "b").await;
        publish(&sender, "a", create_hologram("sphere")).await;
        publish(&sender, "a", acquire("sphere", "a")).await;
        flush(&sender).await;
        drain(&mut rx_b);
        assert_eq!(metrics(&sender).await.controlled, 1);

        // a goes away without detaching; the departure is settled before b's press
        drop(rx_a);
        publish(
            &sender,
            "b",
            StoreMessage::Press {
                button: "ok".to_string(),
                by: pid("b"),
            },
        )
        .await;
        flush(&sender).await;

        let got = drain(&mut rx_b);
        assert_eq!(kinds(&got), vec!["departed", "control", "assign-authority", "press"]);
        assert!(matches!(
            got[1].message,
            StoreMessage::Control { action: ControlAction::Release, ref target, .. } if target == "sphere"
        ));

        let metrics = metrics(&sender).await;
        assert_eq!(metrics.attached, 1);
        assert_eq!(metrics.departures, 1);
        assert_eq!(metrics.ungraceful_departures, 1);
        assert_eq!(metrics.controlled, 0);

        sender.send(StoreRequest::Shutdown).await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_queue_departs_without_further_traffic() {
        let store = store();
        let sender = store.sender();
        let task = tokio::spawn(store.run());

        let rx_a = attach(&sender, "a").await;
        let mut rx_b = attach(&sender, "b").await;
        publish(&sender, "a", create_hologram("sphere")).await;
        publish(&sender, "a", acquire("sphere", "a")).await;
        flush(&sender).await;
        drain(&mut rx_b);

        // Nothing is published after the drop; a flush alone must settle it
        drop(rx_a);
        flush(&sender).await;

        let got = drain(&mut rx_b);
        assert_eq!(kinds(&got), vec!["departed", "control", "assign-authority"]);
        assert!(matches!(got[2].message, StoreMessage::AssignAuthority { ref participant } if participant == &pid("b")));

        let metrics = metrics(&sender).await;
        assert_eq!(metrics.attached, 1);
        assert_eq!(metrics.ungraceful_departures, 1);
        assert_eq!(metrics.controlled, 0);

        sender.send(StoreRequest::Shutdown).await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_only_hologram_tokens_are_tracked() {
        let store = store();
        let sender = store.sender();
        let task = tokio::spawn(store.run());

        let rx_a = attach(&sender, "a").await;
        let mut rx_b = attach(&sender, "b").await;
        publish(
            &sender,
            "a",
            StoreMessage::Create {
                entity: Entity::Variable(SyncVariable::new("score", json!(0))),
            },
        )
        .await;
        publish(&sender, "a", acquire("score", "a")).await;
        publish(&sender, "a", acquire("ghost", "a")).await;
        assert_eq!(metrics(&sender).await.controlled, 0);
        drain(&mut rx_b);

        // Departure releases nothing for names that never held a token
        drop(rx_a);
        flush(&sender).await;
        assert_eq!(kinds(&drain(&mut rx_b)), vec!["departed", "assign-authority"]);

        sender.send(StoreRequest::Shutdown).await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_forged_messages_rejected() {
        let store = store();
        let sender = store.sender();
        let task = tokio::spawn(store.run());

        let _rx_a = attach(&sender, "a").await;
        let mut rx_b = attach(&sender, "b").await;
        publish(&sender, "b", create_hologram("sphere")).await;
        publish(&sender, "a", acquire("sphere", "a")).await;
        flush(&sender).await;
        let log_len = metrics(&sender).await.log_len;
        drain(&mut rx_b);

        // b tries to release a's token, fake a join and claim authority
        publish(
            &sender,
            "b",
            StoreMessage::Control {
                action: ControlAction::Release,
                target: "sphere".to_string(),
                requester: pid("a"),
            },
        )
        .await;
        publish(&sender, "b", StoreMessage::Joined { participant: pid("z") }).await;
        publish(
            &sender,
            "b",
            StoreMessage::Manipulate(ManipulationSample::new("sphere", Vec3::one(), Vec3::one(), pid("a"))),
        )
        .await;
        sender
            .send(StoreRequest::SendTo {
                from: pid("b"),
                target: pid("b"),
                message: StoreMessage::AssignAuthority { participant: pid("b") },
            })
            .await
            .unwrap();
        flush(&sender).await;

        assert!(drain(&mut rx_b).is_empty());
        let metrics = metrics(&sender).await;
        assert_eq!(metrics.rejected, 4);
        assert_eq!(metrics.log_len, log_len);
        assert_eq!(metrics.controlled, 1);

        sender.send(StoreRequest::Shutdown).await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_superseded_samples_compacted() {
        let store = store();
        let sender = store.sender();
        let task = tokio::spawn(store.run());

        let _rx_a = attach(&sender, "a").await;
        publish(&sender, "a", create_hologram("sphere")).await;
        publish(&sender, "a", acquire("sphere", "a")).await;
        for i in 0..5u8 {
            let sample = ManipulationSample::new("sphere", Vec3::new(f32::from(i), 0.0, 0.0), Vec3::one(), pid("a"));
            publish(&sender, "a", StoreMessage::Manipulate(sample)).await;
        }
        let mut rx_c = attach(&sender, "c").await;
        flush(&sender).await;

        let got = drain(&mut rx_c);
        assert_eq!(kinds(&got), vec!["joined", "create", "control", "manipulate", "joined"]);
        match &got[3].message {
            StoreMessage::Manipulate(sample) => assert_eq!(sample.position, Vec3::new(4.0, 0.0, 0.0)),
            other => panic!("Expected manipulate, got {:?}", other),
        }
        // Sequence numbers keep counting across compaction
        assert_eq!(got[3].seq, Some(8));
        assert_eq!(got[4].seq, Some(9));
        assert_eq!(metrics(&sender).await.log_len, 5);

        sender.send(StoreRequest::Shutdown).await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_send_to_skips_log() {
        let store = store();
        let sender = store.sender();
        let task = tokio::spawn(store.run());

        let mut rx_a = attach(&sender, "a").await;
        sender
            .send(StoreRequest::SendTo {
                from: pid("x"),
                target: pid("a"),
                message: StoreMessage::Press {
                    button: "ok".to_string(),
                    by: pid("x"),
                },
            })
            .await
            .unwrap();
        flush(&sender).await;

        let got = drain(&mut rx_a);
        assert!(got.last().unwrap().is_direct());

        let metrics = metrics(&sender).await;
        // Only the join is logged
        assert_eq!(metrics.log_len, 1);
        assert_eq!(metrics.direct_sent, 2);

        sender.send(StoreRequest::Shutdown).await.unwrap();
        task.await.unwrap();
    }
}
