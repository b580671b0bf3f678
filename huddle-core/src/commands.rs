// ABOUTME: The command surface: a fixed set of named operations with typed payloads.
// ABOUTME: Payloads are validated at the boundary, then fanned out to the flows.

use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::bridge;
use crate::error::CoreError;
use crate::presence;
use crate::selection;
use crate::session::ChatSession;
use crate::types::{ChatArgs, CurrentUser, EventType, Presence, UiMessage};

/// Every named operation the host or UI can invoke, each with its payload
/// shape fixed by contract. Wire form is `{"command": "...", ...}`.
///
/// Commands are idempotent-safe to invoke repeatedly; each either produces
/// a UI-visible effect or a persisted-state change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum Command {
    /// Open the chat view; selects a channel interactively when no args
    /// are supplied. Always runs a full setup before rendering.
    OpenView {
        #[serde(default)]
        args: Option<ChatArgs>,
    },
    /// Run channel selection, then open the view on the result.
    ChangeChannel {
        #[serde(default)]
        args: Option<ChatArgs>,
    },
    /// Switch the current team for a multi-workspace provider.
    ChangeWorkspace {
        #[serde(default)]
        provider: Option<String>,
    },
    /// Send to the provider's last-used channel.
    SendMessage { provider: String, text: String },
    /// Same as send-message, with a thread parent attached.
    SendThreadReply {
        provider: String,
        text: String,
        parent_timestamp: String,
    },
    /// Prompt for, validate, and persist a provider token.
    ConfigureToken,
    /// Drop one provider's token and live state.
    SignOut { provider: String },
    /// Clear all persisted state except the collaboration session, then
    /// re-run setup without forcing auth.
    Reset,
    /// Interactive presence selection for the presence target provider.
    AskForSelfPresence,
    /// Apply a presence status directly.
    UpdateSelfPresence {
        provider: String,
        presence: Presence,
        #[serde(default)]
        duration_minutes: u32,
    },
    /// Force a fresh users-then-channels fetch for a provider.
    ReloadChannels {
        #[serde(default)]
        provider: Option<String>,
    },
    /// Share the live collaboration session link into a channel or DM.
    ShareCollabLink { args: ChatArgs },
    /// Open a DM with a collaboration-session participant.
    ChatWithContact { contact_id: String },
    /// Host notification that the collaboration session started/stopped.
    CollabSessionChanged {
        active: bool,
        current_user: Option<CurrentUser>,
    },
    /// A link addressed to this system arrived from the host.
    HandleIncomingLink {
        uri: String,
        sender_id: String,
        provider: String,
    },
    /// Request the newest history for a channel.
    FetchHistory { provider: String, channel_id: String },
    /// Request the replies under a thread parent.
    FetchThreadReplies {
        provider: String,
        channel_id: String,
        parent_timestamp: String,
    },
    /// Mark a channel read and zero its unread count.
    MarkRead { provider: String, channel_id: String },
    AddReaction {
        provider: String,
        channel_id: String,
        timestamp: String,
        reaction: String,
    },
    RemoveReaction {
        provider: String,
        channel_id: String,
        timestamp: String,
        reaction: String,
    },
    /// Best-effort typing indicator.
    SendTyping { provider: String, channel_id: String },
    /// Open a URL through the host.
    OpenLink { url: String },
    /// Reload the UI and every provider webview.
    RefreshUi,
    /// Persisted configuration changed; re-run setup without prompting.
    ConfigChanged,
    /// Open the issue tracker.
    ReportIssue,
}

impl Command {
    /// The wire name of this command.
    pub fn name(&self) -> &'static str {
        match self {
            Self::OpenView { .. } => "open-view",
            Self::ChangeChannel { .. } => "change-channel",
            Self::ChangeWorkspace { .. } => "change-workspace",
            Self::SendMessage { .. } => "send-message",
            Self::SendThreadReply { .. } => "send-thread-reply",
            Self::ConfigureToken => "configure-token",
            Self::SignOut { .. } => "sign-out",
            Self::Reset => "reset",
            Self::AskForSelfPresence => "ask-for-self-presence",
            Self::UpdateSelfPresence { .. } => "update-self-presence",
            Self::ReloadChannels { .. } => "reload-channels",
            Self::ShareCollabLink { .. } => "share-collab-link",
            Self::ChatWithContact { .. } => "chat-with-contact",
            Self::CollabSessionChanged { .. } => "collab-session-changed",
            Self::HandleIncomingLink { .. } => "handle-incoming-link",
            Self::FetchHistory { .. } => "fetch-history",
            Self::FetchThreadReplies { .. } => "fetch-thread-replies",
            Self::MarkRead { .. } => "mark-read",
            Self::AddReaction { .. } => "add-reaction",
            Self::RemoveReaction { .. } => "remove-reaction",
            Self::SendTyping { .. } => "send-typing",
            Self::OpenLink { .. } => "open-link",
            Self::RefreshUi => "refresh-ui",
            Self::ConfigChanged => "config-changed",
            Self::ReportIssue => "report-issue",
        }
    }
}

/// Routes named commands to orchestrator, selection, presence, and bridge
/// operations against one session aggregate.
pub struct CommandBus {
    session: Arc<ChatSession>,
}

impl CommandBus {
    pub fn new(session: Arc<ChatSession>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<ChatSession> {
        &self.session
    }

    /// Validate a raw JSON payload at the boundary, then dispatch.
    pub async fn dispatch_json(&self, payload: &str) -> Result<()> {
        let command: Command = serde_json::from_str(payload)
            .map_err(|e| anyhow::anyhow!("malformed command payload: {}", e))?;
        self.dispatch(command).await
    }

    pub async fn dispatch(&self, command: Command) -> Result<()> {
        tracing::debug!(command = command.name(), "dispatching command");
        let session = &self.session;
        match command {
            Command::OpenView { args } => open_view(session, args).await,
            Command::ChangeChannel { args } => change_channel(session, args).await,
            Command::ChangeWorkspace { provider } => {
                change_workspace(session, provider.as_deref()).await
            }
            Command::SendMessage { provider, text } => {
                send_message(session, &provider, &text, None).await
            }
            Command::SendThreadReply {
                provider,
                text,
                parent_timestamp,
            } => send_message(session, &provider, &text, Some(&parent_timestamp)).await,
            Command::ConfigureToken => configure_token(session).await,
            Command::SignOut { provider } => sign_out(session, &provider).await,
            Command::Reset => reset(session).await,
            Command::AskForSelfPresence => presence::ask_for_self_presence(session).await,
            Command::UpdateSelfPresence {
                provider,
                presence,
                duration_minutes,
            } => presence::update_self_presence(session, &provider, presence, duration_minutes)
                .await,
            Command::ReloadChannels { provider } => {
                reload_channels(session, provider.as_deref()).await
            }
            Command::ShareCollabLink { args } => bridge::share_collab_link(session, &args).await,
            Command::ChatWithContact { contact_id } => {
                bridge::chat_with_collab_contact(session, &contact_id).await
            }
            Command::CollabSessionChanged {
                active,
                current_user,
            } => collab_session_changed(session, active, current_user).await,
            Command::HandleIncomingLink {
                uri,
                sender_id,
                provider,
            } => handle_incoming_link(session, &uri, &sender_id, &provider).await,
            Command::FetchHistory {
                provider,
                channel_id,
            } => fetch_history(session, &provider, &channel_id).await,
            Command::FetchThreadReplies {
                provider,
                channel_id,
                parent_timestamp,
            } => fetch_thread_replies(session, &provider, &channel_id, &parent_timestamp).await,
            Command::MarkRead {
                provider,
                channel_id,
            } => mark_read(session, &provider, &channel_id).await,
            Command::AddReaction {
                provider,
                channel_id,
                timestamp,
                reaction,
            } => {
                let client = session.client(&provider).await?;
                if client.capabilities().supports_reactions {
                    client.add_reaction(&channel_id, &timestamp, &reaction).await?;
                }
                Ok(())
            }
            Command::RemoveReaction {
                provider,
                channel_id,
                timestamp,
                reaction,
            } => {
                let client = session.client(&provider).await?;
                if client.capabilities().supports_reactions {
                    client
                        .remove_reaction(&channel_id, &timestamp, &reaction)
                        .await?;
                }
                Ok(())
            }
            Command::SendTyping {
                provider,
                channel_id,
            } => {
                let client = session.client(&provider).await?;
                if client.capabilities().supports_typing {
                    client.send_typing(&channel_id).await?;
                }
                Ok(())
            }
            Command::OpenLink { url } => {
                session.prompts.open_url(&url).await;
                Ok(())
            }
            Command::RefreshUi => refresh_ui(session).await,
            Command::ConfigChanged => setup_without_session_requirement(session).await,
            Command::ReportIssue => {
                session.prompts.open_url(&session.urls.issue_report).await;
                Ok(())
            }
        }
    }
}

/// Open the chat view on a resolved channel. Runs the full bootstrap
/// first, then renders and requests the newest history.
pub async fn open_view(session: &Arc<ChatSession>, args: Option<ChatArgs>) -> Result<()> {
    session.setup(true, None).await?;

    let args = match args {
        Some(args) => args,
        None => match selection::ask_for_channel(session, None).await? {
            Some((channel, provider)) => ChatArgs::for_channel(provider, channel.id),
            None => return Ok(()),
        },
    };
    let ChatArgs {
        provider,
        channel_id,
        user,
        source,
    } = args;

    let client = session.client(&provider).await?;
    let channel_id = match (channel_id, user) {
        (Some(id), _) => id,
        (None, Some(user)) => client.create_im_channel(&user).await?.id,
        (None, None) => return Ok(()),
    };

    session.store.set_last_channel_id(&provider, &channel_id)?;
    session
        .display
        .update_current_state(&provider, Some(&channel_id))
        .await;
    session.display.load_ui().await;

    let messages = client.fetch_history(&channel_id).await?;
    session
        .display
        .send_to_ui(UiMessage::History {
            provider: provider.clone(),
            channel_id,
            messages,
        })
        .await;

    session
        .telemetry
        .record(EventType::ViewOpened, Some(source), Some(&provider));
    Ok(())
}

async fn change_channel(session: &Arc<ChatSession>, args: Option<ChatArgs>) -> Result<()> {
    let (filter, source) = match &args {
        Some(a) => (Some(a.provider.clone()), a.source),
        None => (None, Default::default()),
    };

    let picked = selection::ask_for_channel(session, filter.as_deref()).await?;
    let (channel, provider) = match picked {
        Some(result) => result,
        None => return Ok(()),
    };

    session
        .telemetry
        .record(EventType::ChannelChanged, Some(source), Some(&provider));
    open_view(
        session,
        Some(ChatArgs::for_channel(provider, channel.id).with_source(source)),
    )
    .await
}

async fn change_workspace(session: &Arc<ChatSession>, provider: Option<&str>) -> Result<()> {
    let provider = match provider {
        Some(p) => p.to_string(),
        None => match selection::ask_for_provider(session).await {
            Some(p) => p,
            None => return Ok(()),
        },
    };

    let client = {
        let registry = session.registry.read().await;
        registry.client(&provider)
    };
    let client = match client {
        Some(c) => c,
        None => return Ok(()),
    };
    if !client.capabilities().supports_multiple_workspaces {
        session
            .prompts
            .show_information("This provider does not support multiple workspaces.")
            .await;
        return Ok(());
    }
    if !session.is_enabled(&provider).await {
        session
            .prompts
            .show_information("Connect this provider before changing its workspace.")
            .await;
        return Ok(());
    }

    if selection::ask_for_workspace(session, &provider)
        .await?
        .is_some()
    {
        // Re-run the bootstrap for this provider; never re-prompt for auth.
        session.setup(false, Some(&provider)).await?;
    }
    Ok(())
}

/// Send to the provider's last-used channel, marking it read first.
/// With no last-used channel there is nothing to send: no dispatch, no
/// success telemetry.
async fn send_message(
    session: &Arc<ChatSession>,
    provider: &str,
    text: &str,
    parent_timestamp: Option<&str>,
) -> Result<()> {
    let channel_id = match session.store.last_channel_id(provider)? {
        Some(id) => id,
        None => {
            tracing::warn!(provider = %provider, "no last-used channel; message not sent");
            return Ok(());
        }
    };

    let client = session.client(provider).await?;
    client.mark_read(&channel_id).await?;
    client
        .send_message(&channel_id, text, parent_timestamp)
        .await?;
    session
        .telemetry
        .record(EventType::MessageSent, None, Some(provider));
    Ok(())
}

/// Strip whitespace and surrounding quotes from pasted token input.
fn sanitize_token(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string()
}

const REPORT_ISSUE_ACTION: &str = "Report Issue";

/// Prompt for a token, validate it against the backend, and persist it
/// only on success. Validation failure leaves any prior token untouched.
async fn configure_token(session: &Arc<ChatSession>) -> Result<()> {
    let provider = match selection::ask_for_provider(session).await {
        Some(p) => p,
        None => return Ok(()),
    };
    let client = {
        let registry = session.registry.read().await;
        registry.client(&provider)
    };
    let client = match client {
        Some(c) => c,
        None => return Ok(()),
    };

    let raw = match session
        .prompts
        .input(&format!("Enter your {} token", crate::types::title_case(&provider)), true)
        .await
    {
        Some(raw) => raw,
        None => return Ok(()),
    };
    let token = sanitize_token(&raw);
    if token.is_empty() {
        return Ok(());
    }

    match client.validate_token(&token).await {
        Ok(_) => {
            session.store.set_token(&provider, &token)?;
            session
                .telemetry
                .record(EventType::TokenConfigured, None, Some(&provider));
            tracing::info!(provider = %provider, "token configured");
        }
        Err(e) => {
            let action = session
                .prompts
                .show_error(
                    &format!("Token validation failed: {}", e),
                    Some(REPORT_ISSUE_ACTION),
                )
                .await;
            if action.as_deref() == Some(REPORT_ISSUE_ACTION) {
                session.prompts.open_url(&session.urls.issue_report).await;
            }
        }
    }
    Ok(())
}

async fn sign_out(session: &Arc<ChatSession>, provider: &str) -> Result<()> {
    session.store.clear_token(provider)?;
    session.registry.write().await.deregister(provider);
    session.display.update_webview_for_provider(provider).await;
    session.display.load_ui().await;
    Ok(())
}

/// Clear all persisted and live state except the collaboration session
/// (the host environment owns that), refresh the UI, and re-run setup.
async fn reset(session: &Arc<ChatSession>) -> Result<()> {
    let keep: Vec<String> = {
        let registry = session.registry.read().await;
        registry
            .supported_ids()
            .into_iter()
            .filter(|id| {
                registry
                    .client(id)
                    .map(|c| c.capabilities().is_collaboration)
                    .unwrap_or(false)
            })
            .collect()
    };
    let keep_refs: Vec<&str> = keep.iter().map(String::as_str).collect();

    session.store.clear_all(&keep_refs)?;
    session
        .registry
        .write()
        .await
        .deregister_all_except(&keep_refs);
    session.telemetry.record(EventType::Reset, None, None);

    refresh_ui(session).await?;
    setup_without_session_requirement(session).await
}

/// Re-run setup for flows that don't themselves require an authenticated
/// session: a missing token is expected there, not a failure.
async fn setup_without_session_requirement(session: &Arc<ChatSession>) -> Result<()> {
    match session.setup(false, None).await {
        Ok(()) => Ok(()),
        Err(e) => match e.downcast_ref::<CoreError>() {
            Some(CoreError::TokenNotFound { provider }) => {
                tracing::debug!(provider = %provider, "setup deferred: no token yet");
                Ok(())
            }
            _ => Err(e),
        },
    }
}

async fn reload_channels(session: &Arc<ChatSession>, provider: Option<&str>) -> Result<()> {
    let provider = match provider {
        Some(p) => p.to_string(),
        None => match selection::ask_for_provider(session).await {
            Some(p) => p,
            None => return Ok(()),
        },
    };
    selection::reload_channel_state(session, &provider).await?;
    session.display.update_webview_for_provider(&provider).await;
    Ok(())
}

async fn collab_session_changed(
    session: &Arc<ChatSession>,
    active: bool,
    current_user: Option<CurrentUser>,
) -> Result<()> {
    let collab_ids: Vec<String> = {
        let registry = session.registry.read().await;
        registry
            .supported_ids()
            .into_iter()
            .filter(|id| {
                registry
                    .client(id)
                    .map(|c| c.capabilities().is_collaboration)
                    .unwrap_or(false)
            })
            .collect()
    };

    let mut acted = false;
    for id in collab_ids {
        if !session.is_enabled(&id).await {
            continue;
        }
        acted = true;
        if let Some(user) = &current_user {
            session.store.set_current_user(&id, user)?;
            let mut registry = session.registry.write().await;
            if let Some(entry) = registry.entry_mut(&id) {
                entry.current_user = Some(user.clone());
            }
        }
        tracing::info!(provider = %id, active, "collaboration session state changed");
    }

    if acted {
        refresh_ui(session).await?;
    }
    Ok(())
}

/// Act only on links addressed to the collaboration invite authority,
/// and never on invites that originate from the current user.
async fn handle_incoming_link(
    session: &Arc<ChatSession>,
    uri: &str,
    sender_id: &str,
    provider: &str,
) -> Result<()> {
    if bridge::link_authority(uri) != Some(bridge::COLLAB_INVITE_AUTHORITY) {
        return Ok(());
    }

    if let Some(collab) = session.collab() {
        if collab.self_peer_id().as_deref() == Some(sender_id) {
            return Ok(());
        }
    }
    if let Some(user) = session.store.current_user(provider)? {
        if user.id == sender_id {
            return Ok(());
        }
    }

    bridge::chat_with_collab_contact(session, sender_id).await
}

async fn fetch_history(
    session: &Arc<ChatSession>,
    provider: &str,
    channel_id: &str,
) -> Result<()> {
    let client = session.client(provider).await?;
    let messages = client.fetch_history(channel_id).await?;
    session
        .display
        .send_to_ui(UiMessage::History {
            provider: provider.to_string(),
            channel_id: channel_id.to_string(),
            messages,
        })
        .await;
    Ok(())
}

async fn fetch_thread_replies(
    session: &Arc<ChatSession>,
    provider: &str,
    channel_id: &str,
    parent_timestamp: &str,
) -> Result<()> {
    let client = session.client(provider).await?;
    let messages = client
        .fetch_thread_replies(channel_id, parent_timestamp)
        .await?;
    session
        .display
        .send_to_ui(UiMessage::ThreadReplies {
            provider: provider.to_string(),
            channel_id: channel_id.to_string(),
            parent_timestamp: parent_timestamp.to_string(),
            messages,
        })
        .await;
    Ok(())
}

async fn mark_read(session: &Arc<ChatSession>, provider: &str, channel_id: &str) -> Result<()> {
    let client = session.client(provider).await?;
    client.mark_read(channel_id).await?;

    let mut registry = session.registry.write().await;
    if let Some(entry) = registry.entry_mut(provider) {
        if let Some(channels) = entry.channels.as_mut() {
            if let Some(channel) = channels.iter_mut().find(|c| c.id == channel_id) {
                channel.unread_count = 0;
            }
        }
    }
    Ok(())
}

async fn refresh_ui(session: &Arc<ChatSession>) -> Result<()> {
    session.display.load_ui().await;
    for provider in session.enabled_ids().await {
        session.display.update_webview_for_provider(&provider).await;
    }
    Ok(())
}
