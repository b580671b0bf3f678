// ABOUTME: The ChatSession aggregate and the idempotent multi-provider setup sequence.
// ABOUTME: Tokens before providers before channels before presence, tolerant of re-entry.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::RwLock;

use crate::bridge;
use crate::error::CoreError;
use crate::registry::{ProviderEntry, ProviderRegistry};
use crate::selection;
use crate::traits::{ChatProvider, ChatStore, CollabApi, DisplaySurface, HostPrompts, Telemetry};
use crate::types::{EventType, Presence};

/// External URLs the session routes users to.
#[derive(Debug, Clone)]
pub struct SessionUrls {
    /// Onboarding walkthrough for first-time token setup
    pub onboarding: String,
    /// Issue tracker for reporting failures
    pub issue_report: String,
}

impl Default for SessionUrls {
    fn default() -> Self {
        Self {
            onboarding: "https://huddle.dev/setup".to_string(),
            issue_report: "https://github.com/huddle-dev/huddle/issues/new".to_string(),
        }
    }
}

/// One explicit session aggregate owned by the process and passed by
/// handle to every flow. Never an ambient singleton; tests construct an
/// isolated aggregate from doubles.
pub struct ChatSession {
    pub(crate) registry: RwLock<ProviderRegistry>,
    pub(crate) store: Arc<dyn ChatStore>,
    pub(crate) prompts: Arc<dyn HostPrompts>,
    pub(crate) display: Arc<dyn DisplaySurface>,
    pub(crate) telemetry: Arc<dyn Telemetry>,
    pub(crate) collab: Option<Arc<dyn CollabApi>>,
    pub(crate) urls: SessionUrls,
}

impl ChatSession {
    pub fn new(
        providers: Vec<Arc<dyn ChatProvider>>,
        store: Arc<dyn ChatStore>,
        prompts: Arc<dyn HostPrompts>,
        display: Arc<dyn DisplaySurface>,
        telemetry: Arc<dyn Telemetry>,
    ) -> Self {
        Self {
            registry: RwLock::new(ProviderRegistry::new(providers)),
            store,
            prompts,
            display,
            telemetry,
            collab: None,
            urls: SessionUrls::default(),
        }
    }

    pub fn with_collab(mut self, collab: Arc<dyn CollabApi>) -> Self {
        self.collab = Some(collab);
        self
    }

    pub fn with_urls(mut self, urls: SessionUrls) -> Self {
        self.urls = urls;
        self
    }

    pub fn store(&self) -> &Arc<dyn ChatStore> {
        &self.store
    }

    pub fn collab(&self) -> Option<&Arc<dyn CollabApi>> {
        self.collab.as_ref()
    }

    /// Enabled provider keys, in supported declaration order.
    pub async fn enabled_ids(&self) -> Vec<String> {
        self.registry.read().await.enabled_ids()
    }

    pub async fn is_enabled(&self, provider: &str) -> bool {
        self.registry.read().await.is_enabled(provider)
    }

    /// Client for an enabled provider.
    pub async fn client(&self, provider: &str) -> Result<Arc<dyn ChatProvider>> {
        let registry = self.registry.read().await;
        registry
            .entry(provider)
            .map(|e| e.provider.clone())
            .ok_or_else(|| CoreError::ProviderNotRegistered(provider.to_string()).into())
    }

    /// Snapshot of an enabled provider's live state.
    pub async fn entry_snapshot(&self, provider: &str) -> Option<ProviderEntry> {
        self.registry.read().await.entry(provider).cloned()
    }

    /// The presence target: first enabled provider that is not the
    /// collaboration session.
    pub async fn first_enabled_team_chat(&self) -> Option<String> {
        let registry = self.registry.read().await;
        registry
            .enabled_ids()
            .into_iter()
            .find(|id| {
                registry
                    .entry(id)
                    .map(|e| !e.provider.capabilities().is_collaboration)
                    .unwrap_or(false)
            })
    }

    /// Drop all live provider state. Persisted state is untouched.
    pub async fn teardown(&self) {
        self.registry.write().await.deregister_all_except(&[]);
    }

    /// The bootstrap sequence. Each step is gated on the previous one
    /// succeeding; fire-and-forget steps are detached tasks whose failures
    /// are logged, never propagated.
    ///
    /// May be invoked concurrently; every step is safe to repeat
    /// (register-or-replace, invalidate-and-refetch), so redundant runs
    /// cost network calls, not correctness.
    pub async fn setup(
        self: &Arc<Self>,
        can_prompt_for_auth: bool,
        forced_provider: Option<&str>,
    ) -> Result<()> {
        self.store
            .run_state_migrations()
            .context("state migrations failed")?;

        self.ensure_installation_id()?;
        self.initialize_token(can_prompt_for_auth, forced_provider)
            .await?;
        self.initialize_providers().await?;

        for provider in self.enabled_ids().await {
            self.hydrate_provider(&provider).await?;
        }

        // Contact bridging depends on the user state hydrated above.
        // Optional enhancement: failures never abort setup.
        if self.collab.is_some() {
            if let Err(e) = bridge::initialize_contacts(self).await {
                tracing::warn!(error = %e, "collaboration contact bridge init failed");
            }
        }

        Ok(())
    }

    /// Generate the installation identity on first activation. Guarded by
    /// a presence check so repeated activations never re-emit the
    /// "installed" event.
    fn ensure_installation_id(&self) -> Result<()> {
        if self.store.installation_id()?.is_some() {
            return Ok(());
        }
        let id = uuid::Uuid::new_v4().to_string();
        self.store.set_installation_id(&id)?;
        self.telemetry.record(EventType::Installed, None, None);
        tracing::info!("installation identity generated");
        Ok(())
    }

    /// Ensure an authentication token exists. Routes to onboarding when
    /// prompting is allowed, then fails hard either way: callers that
    /// require a session must not proceed past a missing token.
    async fn initialize_token(
        &self,
        can_prompt_for_auth: bool,
        forced_provider: Option<&str>,
    ) -> Result<()> {
        let registry = self.registry.read().await;
        let auth_ids: Vec<String> = registry
            .supported_ids()
            .into_iter()
            .filter(|id| {
                registry
                    .client(id)
                    .map(|p| p.capabilities().requires_auth)
                    .unwrap_or(false)
            })
            .collect();
        drop(registry);

        if auth_ids.is_empty() {
            return Ok(());
        }

        // Force-configuring a provider requires that provider's token;
        // otherwise any valid token satisfies the session.
        let target = match forced_provider {
            Some(p) if auth_ids.iter().any(|id| id == p) => p.to_string(),
            _ => {
                let mut with_token = None;
                for id in &auth_ids {
                    if self.store.token(id)?.is_some() {
                        with_token = Some(id.clone());
                        break;
                    }
                }
                with_token.unwrap_or_else(|| auth_ids[0].clone())
            }
        };

        if self.store.token(&target)?.is_some() {
            return Ok(());
        }

        if can_prompt_for_auth {
            self.prompts
                .show_information("No chat token is configured yet. Opening setup instructions.")
                .await;
            self.prompts.open_url(&self.urls.onboarding).await;
        }

        Err(CoreError::TokenNotFound { provider: target }.into())
    }

    /// Capability negotiation and registration for every enabled backend.
    /// Registration preserves existing live state on re-entry.
    async fn initialize_providers(self: &Arc<Self>) -> Result<()> {
        let supported = {
            let registry = self.registry.read().await;
            registry.supported_ids()
        };

        for id in supported {
            let client = {
                let registry = self.registry.read().await;
                match registry.client(&id) {
                    Some(c) => c,
                    None => continue,
                }
            };
            let caps = client.capabilities();

            let enabled = if caps.is_collaboration {
                self.collab.is_some()
            } else if caps.requires_auth {
                self.store.token(&id)?.is_some()
            } else {
                true
            };
            if !enabled {
                continue;
            }

            let token = self.store.token(&id)?;
            client
                .initialize(token.as_deref())
                .await
                .with_context(|| format!("failed to initialize provider '{}'", id))?;

            self.registry
                .write()
                .await
                .register_if_absent(ProviderEntry::new(client.clone()));

            // Some backends are unusable until a team is selected.
            if caps.requires_team_before_use && self.store.current_team(&id)?.is_none() {
                // Cancellation is a clean abort for this provider only.
                selection::ask_for_workspace(self, &id).await?;
            }
        }

        Ok(())
    }

    /// Per-provider fan-out in fixed order: preference refresh (detached),
    /// user state (awaited), presence subscription (detached, registered
    /// at most once), channel state (awaited).
    async fn hydrate_provider(self: &Arc<Self>, provider: &str) -> Result<()> {
        let client = self.client(provider).await?;

        let prefs_client = client.clone();
        let prefs_provider = provider.to_string();
        tokio::spawn(async move {
            if let Err(e) = prefs_client.fetch_user_preferences().await {
                tracing::warn!(provider = %prefs_provider, error = %e, "preference refresh failed");
            }
        });

        let user = client
            .fetch_current_user()
            .await
            .with_context(|| format!("failed to fetch current user for '{}'", provider))?;
        self.store.set_current_user(provider, &user)?;
        if self.store.current_team(provider)?.is_none() {
            if let Some(team_id) = &user.current_team_id {
                self.store.set_current_team(provider, team_id)?;
            }
        }

        let users = client
            .fetch_users()
            .await
            .with_context(|| format!("failed to fetch users for '{}'", provider))?;
        self.store.set_user_directory(provider, &users)?;

        let subscribe = {
            let mut registry = self.registry.write().await;
            let entry = match registry.entry_mut(provider) {
                Some(e) => e,
                None => return Err(CoreError::ProviderNotRegistered(provider.to_string()).into()),
            };
            entry.teams = user.teams.clone();
            entry.current_user = Some(user);
            entry.users = Some(users.clone());
            if entry.presence_subscribed {
                false
            } else {
                entry.presence_subscribed = true;
                true
            }
        };

        if subscribe {
            let presence_client = client.clone();
            let presence_provider = provider.to_string();
            tokio::spawn(async move {
                if let Err(e) = presence_client.subscribe_presence(&users).await {
                    tracing::warn!(
                        provider = %presence_provider,
                        error = %e,
                        "presence subscription failed"
                    );
                }
            });
        }

        let channels = client
            .fetch_channels()
            .await
            .with_context(|| format!("failed to fetch channels for '{}'", provider))?;
        let mut registry = self.registry.write().await;
        if let Some(entry) = registry.entry_mut(provider) {
            entry.channels = Some(channels);
        }

        Ok(())
    }

    /// Record a provider's live presence after a successful update.
    pub(crate) async fn set_presence(&self, provider: &str, presence: Presence) {
        let mut registry = self.registry.write().await;
        if let Some(entry) = registry.entry_mut(provider) {
            entry.presence = presence;
        }
    }
}
