//! Manipulation samples

use serde::{Deserialize, Serialize};

use super::geometry::Vec3;
use super::id::ParticipantId;

/// One pose reading taken while a participant drags a hologram
///
/// Position and scaling are absolute, so applying any subset of samples in
/// order converges on the pose of the last one applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManipulationSample {
    pub target: String,
    pub position: Vec3,
    pub scaling: Vec3,
    pub actor: ParticipantId,
}

impl ManipulationSample {
    pub fn new(target: impl Into<String>, position: Vec3, scaling: Vec3, actor: ParticipantId) -> Self {
        Self {
            target: target.into(),
            position,
            scaling,
            actor,
        }
    }
}
