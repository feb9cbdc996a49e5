//! Participant sessions
//!
//! A [`Participant`] owns everything one view of a shared session needs: its
//! store handle, authority gate, name registry, control arbiter replica,
//! broadcast throttle, entity projections, animation clock and event bus.

mod clock;
mod participant;

pub use clock::AnimationClock;
pub use participant::{Participant, ParticipantSettings};
