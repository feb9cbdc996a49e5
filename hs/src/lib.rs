//! holosync - shared hologram sessions
//!
//! Several participants view and edit one scene of named holograms, shared
//! variables, animations and menus. All of them attach to a replicated store
//! that delivers every change in one total order.
//!
//! # Core Concepts
//!
//! - **Update Authority**: exactly one participant publishes canonical
//!   changes; on everyone else the setters are no-ops, so nothing echoes
//! - **Control Tokens**: dragging a hologram needs its token; the first
//!   acquire in log order wins and everyone else sees it frozen
//! - **Throttled Manipulation**: drag samples go out at most 20 per second
//!   per object, and the final pose is always sent on release
//! - **Lifecycle**: the earliest joiner still present holds authority; a
//!   departure hands it on and frees the tokens the leaver held
//!
//! # Modules
//!
//! - [`domain`] - Entities, transforms and participant identities
//! - [`store`] - Replicated store, handles and wire messages
//! - [`session`] - Participants and their animation clocks
//! - [`registry`], [`authority`], [`arbiter`], [`throttle`], [`lifecycle`] - Session rules
//! - [`events`] - Per-participant event bus
//! - [`render`] - Renderer trait and adapter
//! - [`simulation`] - Scripted session used by the CLI
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod arbiter;
pub mod authority;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod registry;
pub mod render;
pub mod session;
pub mod simulation;
pub mod store;
pub mod throttle;

// Re-export commonly used types
pub use arbiter::{ControlArbiter, ControlState, ControlTransition, Signal};
pub use authority::AuthorityGate;
pub use config::Config;
pub use domain::{
    Animation, Change, Color3, Entity, EntityKind, Hologram, HologramKind, ManipulationSample, Menu, MenuEntry,
    ParticipantId, Quat, ShapeKind, SyncVariable, Vec3,
};
pub use error::{Result, SyncError};
pub use events::{EventBus, EventEmitter, LocalEvent, Origin};
pub use lifecycle::ViewLifecycle;
pub use registry::NameRegistry;
pub use render::{RecordingRenderer, RenderAdapter, RenderCall, Renderer, TracingRenderer};
pub use session::{Participant, ParticipantSettings};
pub use simulation::{SimulationOptions, SimulationReport, run_simulation};
pub use store::{
    ControlAction, Delivery, ReplicatedStore, SessionCredentials, StoreConfig, StoreHandle, StoreMessage, StoreMetrics,
};
pub use throttle::{Admission, BroadcastThrottle, ThrottleConfig};
