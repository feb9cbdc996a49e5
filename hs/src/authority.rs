//! Update-authority gate
//!
//! Exactly one participant in a session holds update authority. Only that
//! participant's local mutations are published as canonical changes; on every
//! other participant the same setters are no-ops, so a change received from a
//! peer is never echoed back into the store.

use tracing::{debug, info};

/// Per-participant authority flag
#[derive(Debug, Default)]
pub struct AuthorityGate {
    is_authority: bool,
}

impl AuthorityGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_authority(&self) -> bool {
        self.is_authority
    }

    /// Open the gate; returns true if this changed the flag
    pub fn grant(&mut self) -> bool {
        let changed = !self.is_authority;
        self.is_authority = true;
        if changed {
            info!("AuthorityGate: update authority granted");
        }
        changed
    }

    /// Close the gate; returns true if this changed the flag
    pub fn revoke(&mut self) -> bool {
        let changed = self.is_authority;
        self.is_authority = false;
        if changed {
            info!("AuthorityGate: update authority revoked");
        }
        changed
    }

    /// Check whether `action` may be published from this participant
    pub fn permits(&self, action: &str) -> bool {
        if !self.is_authority {
            debug!(%action, "AuthorityGate: not the authority holder, skipping");
        }
        self.is_authority
    }
}
