//! Participant identifiers
//!
//! Generated IDs use the format: `{8-char-hex}-{slug}` where the hex is the
//! random tail of a UUIDv7. Example: `9f3a01c2-alice`

use serde::{Deserialize, Serialize};

/// Generate a participant ID from a display label
pub fn generate_id(label: &str) -> String {
    let uuid = uuid::Uuid::now_v7();
    let hex = uuid.simple().to_string();
    let suffix = &hex[hex.len() - 8..];
    let slug = slugify(label);
    if slug.is_empty() {
        suffix.to_string()
    } else {
        format!("{}-{}", suffix, slug)
    }
}

/// Slugify a label for use in IDs
fn slugify(label: &str) -> String {
    label
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Opaque, session-scoped participant identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Create a fresh ID for a participant with the given display label
    pub fn generate(label: &str) -> Self {
        Self(generate_id(label))
    }

    /// Get the full ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ParticipantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ParticipantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
