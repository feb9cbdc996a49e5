//! Named-entity registry
//!
//! Tracks every name used in a session. Names are never released: once an
//! entity has been created under a name, no later entity may reuse it, which
//! keeps each name bound to at most one `create` in the replicated log.

use std::collections::HashSet;

use tracing::debug;

use crate::error::{Result, SyncError};

/// Session-scoped set of reserved entity names
#[derive(Debug, Default)]
pub struct NameRegistry {
    names: HashSet<String>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a name
    ///
    /// Returns false on first use and true if the name already existed.
    pub fn reserve(&mut self, name: &str) -> bool {
        let existed = !self.names.insert(name.to_string());
        debug!(%name, existed, "NameRegistry::reserve");
        existed
    }

    /// Reserve a name for a new entity, failing if it is taken
    pub fn claim(&mut self, name: &str) -> Result<()> {
        if self.reserve(name) {
            return Err(SyncError::NameConflict { name: name.to_string() });
        }
        Ok(())
    }

    /// Fail with the first name that is already taken, recording nothing
    pub fn ensure_available(&self, names: &[&str]) -> Result<()> {
        match names.iter().find(|n| self.contains(n)) {
            Some(taken) => Err(SyncError::NameConflict {
                name: taken.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Reserve several names at once; nothing is recorded if any is taken
    pub fn claim_all(&mut self, names: &[&str]) -> Result<()> {
        self.ensure_available(names)?;
        for name in names {
            self.claim(name)?;
        }
        Ok(())
    }

    /// Require that a name already exists
    pub fn require(&self, name: &str) -> Result<()> {
        if self.contains(name) {
            Ok(())
        } else {
            Err(SyncError::UnknownName { name: name.to_string() })
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
