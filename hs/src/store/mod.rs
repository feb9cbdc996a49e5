//! Replicated state store
//!
//! The shared substrate every participant attaches to. It provides:
//! - **Ordered log:** every published message is delivered to every attached
//!   participant in one total order
//! - **Point-to-point delivery:** instructions for a single participant that
//!   bypass the log
//! - **Catch-up:** a newly attached participant first receives the whole log
//! - **Departure detection:** graceful detach or a failed delivery

mod config;
mod core;
mod handle;
mod messages;

pub use config::{SessionCredentials, StoreConfig};
pub use core::ReplicatedStore;
pub use handle::StoreHandle;
pub use messages::{ControlAction, Delivery, StoreMessage, StoreMetrics, StoreRequest};
