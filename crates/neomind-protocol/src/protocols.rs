//! Protocol Registry - all protocol adapters loaded by the platform
//!
//! Protocols are keyed by id. Registering an id twice is an error; use
//! [`ProtocolRegistry::replace`] to swap an adapter, which disposes the old
//! one.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

use crate::config::Configuration;
use crate::error::{ProtocolError, Result};
use crate::support::ProtocolSupport;

/// Registry of protocol adapters by id.
#[derive(Default)]
pub struct ProtocolRegistry {
    protocols: DashMap<String, Arc<dyn ProtocolSupport>>,
}

impl ProtocolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a protocol and initialize it with `config`.
    ///
    /// `init` runs before the protocol is inserted and without any map guard
    /// held, so init callbacks may query this registry. If another caller
    /// claims the id in the meantime, the new protocol is disposed.
    pub fn register(&self, protocol: Arc<dyn ProtocolSupport>, config: &Configuration) -> Result<()> {
        let id = protocol.id().to_string();
        if self.protocols.contains_key(&id) {
            tracing::warn!("Protocol '{}' is already registered", id);
            return Err(ProtocolError::AlreadyRegistered(id));
        }

        protocol.init(config);

        let rejected = match self.protocols.entry(id.clone()) {
            Entry::Occupied(_) => Some(protocol),
            Entry::Vacant(entry) => {
                entry.insert(protocol);
                None
            }
        };

        match rejected {
            Some(protocol) => {
                tracing::warn!("Protocol '{}' was registered during init", id);
                protocol.dispose();
                Err(ProtocolError::AlreadyRegistered(id))
            }
            None => {
                tracing::info!("Registered protocol '{}'", id);
                Ok(())
            }
        }
    }

    /// Register or swap a protocol. The previous adapter, if any, is disposed
    /// and returned.
    pub fn replace(
        &self,
        protocol: Arc<dyn ProtocolSupport>,
        config: &Configuration,
    ) -> Option<Arc<dyn ProtocolSupport>> {
        let id = protocol.id().to_string();
        protocol.init(config);
        let previous = self.protocols.insert(id.clone(), protocol);
        if let Some(old) = &previous {
            old.dispose();
            tracing::info!("Replaced protocol '{}'", id);
        }
        previous
    }

    /// Remove and dispose a protocol.
    pub fn unregister(&self, id: &str) -> Result<Arc<dyn ProtocolSupport>> {
        let (_, protocol) = self
            .protocols
            .remove(id)
            .ok_or_else(|| ProtocolError::ProtocolNotFound(id.to_string()))?;
        protocol.dispose();
        tracing::info!("Unregistered protocol '{}'", id);
        Ok(protocol)
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn ProtocolSupport>> {
        self.protocols.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Ids of all registered protocols, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.protocols.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn count(&self) -> usize {
        self.protocols.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.protocols.contains_key(id)
    }

    /// Dispose and drop every protocol.
    ///
    /// Entries are removed one id at a time and each removed protocol is
    /// disposed. A protocol registered concurrently either gets removed and
    /// disposed here or stays registered.
    pub fn dispose_all(&self) {
        let ids: Vec<String> = self.protocols.iter().map(|entry| entry.key().clone()).collect();
        for id in ids {
            if let Some((_, protocol)) = self.protocols.remove(&id) {
                protocol.dispose();
            }
        }
        tracing::info!("Disposed all protocols");
    }
}
