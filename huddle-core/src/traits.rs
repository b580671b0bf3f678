// ABOUTME: Trait seams between the orchestration engine and its collaborators.
// ABOUTME: Provider clients, persistent store, host prompts, display surface, telemetry.

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{
    Channel, CurrentUser, EventSource, EventType, Message, Presence, UiMessage, User,
};

// =============================================================================
// Provider Capabilities
// =============================================================================

/// What a chat backend can and cannot do. Negotiated once at registration;
/// flows consult this instead of matching on provider keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderCapabilities {
    /// Backend needs a validated token before it is usable
    pub requires_auth: bool,
    /// User may belong to several teams and switch between them
    pub supports_multiple_workspaces: bool,
    /// Do-not-disturb may carry a snooze duration
    pub supports_snooze: bool,
    /// `Presence::Idle` is a legal target
    pub supports_idle_presence: bool,
    /// Message reactions are supported
    pub supports_reactions: bool,
    /// Typing indicators are supported
    pub supports_typing: bool,
    /// Backend must have a current team selected before any other call
    pub requires_team_before_use: bool,
    /// Backend is the peer-to-peer collaboration session
    pub is_collaboration: bool,
}

impl ProviderCapabilities {
    /// Defaults for a token-authenticated team-chat backend.
    pub fn team_chat() -> Self {
        Self {
            requires_auth: true,
            supports_multiple_workspaces: true,
            supports_snooze: false,
            supports_idle_presence: false,
            supports_reactions: true,
            supports_typing: true,
            requires_team_before_use: false,
            is_collaboration: false,
        }
    }

    /// Defaults for the peer-collaboration backend: no authentication,
    /// enabled from the host environment's own session state.
    pub fn collaboration() -> Self {
        Self {
            requires_auth: false,
            supports_multiple_workspaces: false,
            supports_snooze: false,
            supports_idle_presence: false,
            supports_reactions: false,
            supports_typing: false,
            requires_team_before_use: true,
            is_collaboration: true,
        }
    }
}

// =============================================================================
// Provider Client
// =============================================================================

/// A chat backend client. One implementation per provider key; the
/// orchestrator drives all of them uniformly through this trait.
///
/// Wire formats and transport are the implementation's concern. Every
/// method is a suspension point from the orchestrator's point of view.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Opaque lowercase provider key (e.g., "slack", "discord", "liveshare")
    fn id(&self) -> &str;

    fn capabilities(&self) -> ProviderCapabilities;

    /// Validate a candidate token against the backend without persisting
    /// anything. Returns the authenticated user on success.
    async fn validate_token(&self, token: &str) -> Result<CurrentUser>;

    /// Initialize the client for this session. `token` is `None` for
    /// backends that don't authenticate. Safe to call repeatedly.
    async fn initialize(&self, token: Option<&str>) -> Result<()>;

    /// Fetch the authenticated user and their team memberships.
    async fn fetch_current_user(&self) -> Result<CurrentUser>;

    /// Fetch the user directory for the current team.
    async fn fetch_users(&self) -> Result<Vec<User>>;

    /// Fetch all channels for the current team.
    async fn fetch_channels(&self) -> Result<Vec<Channel>>;

    /// Refresh server-side user preferences. Fire-and-forget from the
    /// orchestrator; later steps never assume this has completed.
    async fn fetch_user_preferences(&self) -> Result<()> {
        Ok(())
    }

    /// Newest message history for a channel.
    async fn fetch_history(&self, channel_id: &str) -> Result<Vec<Message>>;

    /// Replies under a thread parent.
    async fn fetch_thread_replies(
        &self,
        channel_id: &str,
        parent_timestamp: &str,
    ) -> Result<Vec<Message>>;

    /// Send a message; `parent_timestamp` attaches it to a thread.
    async fn send_message(
        &self,
        channel_id: &str,
        text: &str,
        parent_timestamp: Option<&str>,
    ) -> Result<()>;

    /// Mark a channel read up to its newest message.
    async fn mark_read(&self, channel_id: &str) -> Result<()>;

    /// Find or create a direct-message channel with a user.
    async fn create_im_channel(&self, user: &User) -> Result<Channel>;

    /// Subscribe to presence updates for the given users. Registration
    /// replaces any prior subscription; never stacks a duplicate.
    async fn subscribe_presence(&self, users: &[User]) -> Result<()> {
        let _ = users;
        Ok(())
    }

    /// Apply a presence status. `duration_minutes` is meaningful only for
    /// snooze-capable backends; 0 means "until manually cleared".
    async fn update_presence(&self, presence: Presence, duration_minutes: u32) -> Result<()> {
        let _ = (presence, duration_minutes);
        Ok(())
    }

    async fn add_reaction(&self, channel_id: &str, timestamp: &str, reaction: &str) -> Result<()> {
        let _ = (channel_id, timestamp, reaction);
        Ok(())
    }

    async fn remove_reaction(
        &self,
        channel_id: &str,
        timestamp: &str,
        reaction: &str,
    ) -> Result<()> {
        let _ = (channel_id, timestamp, reaction);
        Ok(())
    }

    /// Best-effort typing indicator.
    async fn send_typing(&self, channel_id: &str) -> Result<()> {
        let _ = channel_id;
        Ok(())
    }
}

// =============================================================================
// Persistent Store
// =============================================================================

/// Persistent local state. Implementations own the storage format; the
/// orchestrator relies only on this shape contract.
pub trait ChatStore: Send + Sync {
    /// Run any pending state migrations. Must complete before any read.
    fn run_state_migrations(&self) -> Result<()>;

    fn installation_id(&self) -> Result<Option<String>>;
    fn set_installation_id(&self, id: &str) -> Result<()>;

    fn token(&self, provider: &str) -> Result<Option<String>>;
    fn set_token(&self, provider: &str, token: &str) -> Result<()>;
    fn clear_token(&self, provider: &str) -> Result<()>;

    fn current_team(&self, provider: &str) -> Result<Option<String>>;
    fn set_current_team(&self, provider: &str, team_id: &str) -> Result<()>;

    fn last_channel_id(&self, provider: &str) -> Result<Option<String>>;
    fn set_last_channel_id(&self, provider: &str, channel_id: &str) -> Result<()>;

    fn current_user(&self, provider: &str) -> Result<Option<CurrentUser>>;
    fn set_current_user(&self, provider: &str, user: &CurrentUser) -> Result<()>;

    fn user_directory(&self, provider: &str) -> Result<Vec<User>>;
    fn set_user_directory(&self, provider: &str, users: &[User]) -> Result<()>;

    /// Clear all persisted state except the providers named in `keep`.
    fn clear_all(&self, keep: &[&str]) -> Result<()>;
}

// =============================================================================
// Host Environment
// =============================================================================

/// Interactive prompt primitives supplied by the host environment. Every
/// prompt can be dismissed; dismissal is `None`, never an error.
#[async_trait]
pub trait HostPrompts: Send + Sync {
    /// Present a single-select list. Returns the selected item.
    async fn pick_one(&self, placeholder: &str, items: Vec<String>) -> Option<String>;

    /// Free-text input; `masked` hides the typed value (token entry).
    async fn input(&self, prompt: &str, masked: bool) -> Option<String>;

    /// Non-blocking informational notice.
    async fn show_information(&self, message: &str);

    /// Error notice with an optional action button. Returns the chosen
    /// action label, if any.
    async fn show_error(&self, message: &str, action: Option<&str>) -> Option<String>;

    /// Open a URL in the host's default handler.
    async fn open_url(&self, url: &str);
}

/// The rendering surface. The orchestrator tells it what changed; how
/// anything is drawn is out of scope here.
#[async_trait]
pub trait DisplaySurface: Send + Sync {
    /// Record the currently displayed (provider, channel) pair.
    async fn update_current_state(&self, provider: &str, channel_id: Option<&str>);

    /// (Re)load the full UI from current state.
    async fn load_ui(&self);

    /// Push an incremental update to the UI.
    async fn send_to_ui(&self, message: UiMessage);

    /// Refresh the rendered view for one provider.
    async fn update_webview_for_provider(&self, provider: &str);
}

/// Telemetry sink. Transport is external; failures must never surface.
pub trait Telemetry: Send + Sync {
    fn record(&self, event: EventType, source: Option<EventSource>, provider: Option<&str>);
}

// =============================================================================
// Peer-Collaboration API
// =============================================================================

/// The host's peer-to-peer collaboration session, bridged into the chat
/// model as a special provider.
#[async_trait]
pub trait CollabApi: Send + Sync {
    /// Whether a live collaboration session is currently active.
    fn session_active(&self) -> bool;

    /// Obtain (or create) a shareable session link. `None` when no link
    /// could be produced; callers treat that as a best-effort no-op.
    async fn share_link(&self, suppress_notification: bool) -> Result<Option<String>>;

    /// Explicit mapping from a collaboration contact id to a provider
    /// user id, when the host knows one.
    fn contact_user_id(&self, contact_id: &str) -> Option<String>;

    /// The current user's own peer id, used to ignore self-originated
    /// invites.
    fn self_peer_id(&self) -> Option<String>;

    /// Publish provider users as collaboration contacts. Best effort.
    async fn register_contacts(&self, users: &[User]) -> Result<()> {
        let _ = users;
        Ok(())
    }
}
