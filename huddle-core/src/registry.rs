// ABOUTME: Registry tracking supported provider clients and enabled provider state.
// ABOUTME: Register-or-replace entries with per-provider cached team/channel/user state.

use std::collections::HashMap;
use std::sync::Arc;

use crate::traits::ChatProvider;
use crate::types::{Channel, CurrentUser, Presence, Team, User};

/// Runtime state for one enabled provider.
///
/// Cached channel/user state is fetched lazily and invalidated on
/// workspace change, explicit reload, or reset. Caches are replaced
/// wholesale, never merged.
#[derive(Clone)]
pub struct ProviderEntry {
    pub provider: Arc<dyn ChatProvider>,
    pub current_user: Option<CurrentUser>,
    pub teams: Vec<Team>,
    /// `None` means "not fetched"; an empty Vec is a valid fetched state
    pub channels: Option<Vec<Channel>>,
    pub users: Option<Vec<User>>,
    pub presence: Presence,
    /// Guards against stacking duplicate presence subscriptions across
    /// re-entrant setup runs
    pub presence_subscribed: bool,
}

impl ProviderEntry {
    pub fn new(provider: Arc<dyn ChatProvider>) -> Self {
        Self {
            provider,
            current_user: None,
            teams: Vec::new(),
            channels: None,
            users: None,
            presence: Presence::Available,
            presence_subscribed: false,
        }
    }
}

/// Tracks which chat backends are supported (clients constructed by the
/// host) and which are enabled (registered with live state).
pub struct ProviderRegistry {
    /// All clients the host constructed, in declaration order
    supported: Vec<Arc<dyn ChatProvider>>,
    entries: HashMap<String, ProviderEntry>,
}

impl ProviderRegistry {
    pub fn new(supported: Vec<Arc<dyn ChatProvider>>) -> Self {
        Self {
            supported,
            entries: HashMap::new(),
        }
    }

    /// Supported provider keys in declaration order.
    pub fn supported_ids(&self) -> Vec<String> {
        self.supported.iter().map(|p| p.id().to_string()).collect()
    }

    /// Look up a supported client by key, enabled or not.
    pub fn client(&self, provider: &str) -> Option<Arc<dyn ChatProvider>> {
        self.supported
            .iter()
            .find(|p| p.id() == provider)
            .cloned()
    }

    /// Register an enabled provider. An existing entry for the same key is
    /// replaced, never duplicated.
    pub fn register(&mut self, entry: ProviderEntry) {
        let id = entry.provider.id().to_string();
        if self.entries.insert(id.clone(), entry).is_some() {
            tracing::debug!(provider = %id, "provider entry replaced");
        } else {
            tracing::info!(provider = %id, "provider registered");
        }
    }

    /// Register the key only if absent, preserving existing live state.
    /// Used by re-entrant setup so a second run doesn't wipe caches.
    pub fn register_if_absent(&mut self, entry: ProviderEntry) {
        let id = entry.provider.id().to_string();
        self.entries.entry(id).or_insert(entry);
    }

    pub fn is_enabled(&self, provider: &str) -> bool {
        self.entries.contains_key(provider)
    }

    /// Enabled provider keys, in supported declaration order for
    /// deterministic fan-out.
    pub fn enabled_ids(&self) -> Vec<String> {
        self.supported
            .iter()
            .map(|p| p.id().to_string())
            .filter(|id| self.entries.contains_key(id))
            .collect()
    }

    pub fn entry(&self, provider: &str) -> Option<&ProviderEntry> {
        self.entries.get(provider)
    }

    pub fn entry_mut(&mut self, provider: &str) -> Option<&mut ProviderEntry> {
        self.entries.get_mut(provider)
    }

    /// Remove a provider's live state (sign-out or reset).
    pub fn deregister(&mut self, provider: &str) -> Option<ProviderEntry> {
        let removed = self.entries.remove(provider);
        if removed.is_some() {
            tracing::info!(provider = %provider, "provider deregistered");
        }
        removed
    }

    /// Drop all enabled entries except the listed keys.
    pub fn deregister_all_except(&mut self, keep: &[&str]) {
        self.entries.retain(|id, _| keep.contains(&id.as_str()));
    }

    /// Invalidate a provider's cached channel and user state. The next
    /// read triggers a fresh fetch instead of returning stale data.
    pub fn invalidate_cache(&mut self, provider: &str) {
        if let Some(entry) = self.entries.get_mut(provider) {
            entry.channels = None;
            entry.users = None;
            tracing::debug!(provider = %provider, "cached channel/user state invalidated");
        }
    }
}
