//! Domain types for shared hologram sessions
//!
//! Entities (holograms, variables, animations, menus), the transform values
//! they carry, and participant identities. None of these types know about the
//! replicated store; they are the payloads it carries.

mod entity;
mod geometry;
mod id;
mod sample;

pub use entity::{
    Animation, Change, Entity, EntityKind, Hologram, HologramKind, Menu, MenuEntry, ShapeKind, SyncVariable,
};
pub use geometry::{Color3, Quat, Vec3};
pub use id::{ParticipantId, generate_id};
pub use sample::ManipulationSample;
