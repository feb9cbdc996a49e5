//! StoreHandle - a participant's connection to the replicated store

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use super::messages::{Delivery, StoreMessage, StoreMetrics, StoreRequest};
use crate::domain::ParticipantId;
use crate::error::{Result, SyncError};

/// Handle for one participant
///
/// Owns the participant's delivery queue. Dropping the handle without calling
/// [`StoreHandle::detach`] is an ungraceful departure, which the store notices
/// the next time it tries to deliver.
pub struct StoreHandle {
    /// Sender to the store task
    tx: mpsc::Sender<StoreRequest>,

    /// Deliveries for this participant, in log order
    rx: mpsc::UnboundedReceiver<Delivery>,

    participant: ParticipantId,
}

impl StoreHandle {
    /// Attach `participant` to the store behind `tx`
    pub async fn attach(tx: mpsc::Sender<StoreRequest>, participant: ParticipantId) -> Result<Self> {
        debug!(%participant, "StoreHandle::attach: called");
        let (delivery_tx, rx) = mpsc::unbounded_channel();

        tx.send(StoreRequest::Attach {
            participant: participant.clone(),
            tx: delivery_tx,
        })
        .await
        .map_err(|_| SyncError::StoreClosed)?;

        Ok(Self { tx, rx, participant })
    }

    pub fn participant(&self) -> &ParticipantId {
        &self.participant
    }

    /// Append a message to the shared log
    pub async fn publish(&self, message: StoreMessage) -> Result<()> {
        debug!(participant = %self.participant, kind = message.kind(), "StoreHandle::publish: called");
        self.tx
            .send(StoreRequest::Publish {
                from: self.participant.clone(),
                message,
            })
            .await
            .map_err(|_| SyncError::StoreClosed)
    }

    /// Send a message to one participant only
    pub async fn send_to(&self, target: &ParticipantId, message: StoreMessage) -> Result<()> {
        debug!(participant = %self.participant, %target, kind = message.kind(), "StoreHandle::send_to: called");
        self.tx
            .send(StoreRequest::SendTo {
                from: self.participant.clone(),
                target: target.clone(),
                message,
            })
            .await
            .map_err(|_| SyncError::StoreClosed)
    }

    /// Receive the next delivery
    ///
    /// Returns None once the store has stopped and the queue is empty.
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.rx.recv().await
    }

    /// Take the next delivery if one is queued
    pub fn try_recv(&mut self) -> Option<Delivery> {
        self.rx.try_recv().ok()
    }

    /// Wait until the store has processed and delivered every earlier request
    pub async fn flush(&self) -> Result<()> {
        debug!(participant = %self.participant, "StoreHandle::flush: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(StoreRequest::Flush { reply_tx })
            .await
            .map_err(|_| SyncError::StoreClosed)?;
        reply_rx.await.map_err(|_| SyncError::StoreClosed)
    }

    /// Get current store metrics
    pub async fn metrics(&self) -> Result<StoreMetrics> {
        debug!(participant = %self.participant, "StoreHandle::metrics: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(StoreRequest::GetMetrics { reply_tx })
            .await
            .map_err(|_| SyncError::StoreClosed)?;
        reply_rx.await.map_err(|_| SyncError::StoreClosed)
    }

    /// Leave the session gracefully
    pub async fn detach(&self) -> Result<()> {
        debug!(participant = %self.participant, "StoreHandle::detach: called");
        self.tx
            .send(StoreRequest::Detach {
                participant: self.participant.clone(),
            })
            .await
            .map_err(|_| SyncError::StoreClosed)
    }
}
