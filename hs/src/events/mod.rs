//! Local event bus
//!
//! Each participant owns a bus. Applying a delivery, or a tick of the
//! participant's own animation clock, emits events here; the rendering
//! adapter and anything else interested subscribe.
//!
//! ```text
//!   replicated store ──deliveries──▶ Participant ──emits──▶ EventBus
//!                                        ▲                    │
//!                               animation clock       ┌───────┴────────┐
//!                                                     ▼                ▼
//!                                              RenderAdapter     report/tests
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use holosync::events::{EventBus, Origin};
//! use holosync::domain::ParticipantId;
//!
//! let bus = EventBus::with_default_capacity();
//! let emitter = bus.emitter_for(ParticipantId::from("alice"));
//! let mut rx = bus.subscribe();
//!
//! emitter.button_pressed(Origin::Local, "ok", &ParticipantId::from("alice"));
//! let event = rx.recv().await?;
//! ```

mod bus;
mod types;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus, EventEmitter};
pub use types::{LocalEvent, Origin};
