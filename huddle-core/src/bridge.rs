// ABOUTME: Bridges the peer-to-peer collaboration session into the provider/channel model.
// ABOUTME: Session-link sharing and contact-to-user matching, both best effort.

use std::sync::Arc;

use anyhow::Result;

use crate::commands;
use crate::session::ChatSession;
use crate::types::{ChatArgs, EventSource, User};

/// URI authority that marks a link as a collaboration invite. Links with
/// any other authority are ignored by the incoming-link handler.
pub const COLLAB_INVITE_AUTHORITY: &str = "collab";

/// Extract the authority component of a `scheme://authority/...` link.
pub fn link_authority(uri: &str) -> Option<&str> {
    let rest = uri.split_once("://")?.1;
    let authority = rest.split(['/', '?']).next()?;
    if authority.is_empty() {
        None
    } else {
        Some(authority)
    }
}

/// Share the live collaboration session link into a channel.
///
/// If the target is a user rather than an existing channel, a
/// direct-message channel is created (or reused) first. Every failure
/// here is a silent no-op: link sharing is an enhancement, not a core
/// guarantee.
pub async fn share_collab_link(session: &Arc<ChatSession>, args: &ChatArgs) -> Result<()> {
    let collab = match session.collab() {
        Some(c) => c.clone(),
        None => return Ok(()),
    };
    if !collab.session_active() {
        tracing::debug!("no live collaboration session to share");
        return Ok(());
    }

    let link = match collab.share_link(true).await {
        Ok(Some(link)) => link,
        Ok(None) => {
            tracing::debug!("no collaboration session link available");
            return Ok(());
        }
        Err(e) => {
            tracing::debug!(error = %e, "collaboration link request failed");
            return Ok(());
        }
    };

    let client = match session.client(&args.provider).await {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!(provider = %args.provider, error = %e, "link share target unavailable");
            return Ok(());
        }
    };

    let channel_id = match (&args.channel_id, &args.user) {
        (Some(id), _) => id.clone(),
        (None, Some(user)) => match client.create_im_channel(user).await {
            Ok(channel) => channel.id,
            Err(e) => {
                tracing::debug!(user = %user.id, error = %e, "could not resolve DM channel for link share");
                return Ok(());
            }
        },
        (None, None) => {
            tracing::debug!("link share has no resolvable target");
            return Ok(());
        }
    };

    if let Err(e) = client.send_message(&channel_id, &link, None).await {
        tracing::debug!(channel = %channel_id, error = %e, "collaboration link send failed");
    }
    Ok(())
}

/// Open a direct-message chat with a collaboration-session participant.
///
/// The contact is resolved to a provider user first through the explicit
/// id mapping, then by treating the contact id as a provider user id
/// directly. An unresolvable contact surfaces an informational notice
/// and changes nothing.
pub async fn chat_with_collab_contact(session: &Arc<ChatSession>, contact_id: &str) -> Result<()> {
    let provider = match session.first_enabled_team_chat().await {
        Some(p) => p,
        None => {
            session
                .prompts
                .show_information("No chat provider is connected for this contact.")
                .await;
            return Ok(());
        }
    };

    let user = match resolve_contact(session, &provider, contact_id).await? {
        Some(user) => user,
        None => {
            session
                .prompts
                .show_information("This contact could not be matched to a chat user.")
                .await;
            return Ok(());
        }
    };

    let client = session.client(&provider).await?;
    let channel = client.create_im_channel(&user).await?;
    session.store.set_last_channel_id(&provider, &channel.id)?;

    let args =
        ChatArgs::for_channel(provider, channel.id).with_source(EventSource::Collaboration);
    commands::open_view(session, Some(args)).await
}

/// Resolve a collaboration contact to a provider user: explicit mapping
/// first, then the contact id taken as a user id directly.
async fn resolve_contact(
    session: &Arc<ChatSession>,
    provider: &str,
    contact_id: &str,
) -> Result<Option<User>> {
    let mapped = session
        .collab()
        .and_then(|c| c.contact_user_id(contact_id));
    let user_id = mapped.as_deref().unwrap_or(contact_id);

    let users = match session.entry_snapshot(provider).await.and_then(|e| e.users) {
        Some(users) => users,
        None => session.store.user_directory(provider)?,
    };
    Ok(users.into_iter().find(|u| u.id == user_id))
}

/// Publish provider users as collaboration contacts. Runs last in setup
/// because it depends on hydrated user state.
pub async fn initialize_contacts(session: &Arc<ChatSession>) -> Result<()> {
    let collab = match session.collab() {
        Some(c) => c.clone(),
        None => return Ok(()),
    };

    let mut users = Vec::new();
    for provider in session.enabled_ids().await {
        let entry = match session.entry_snapshot(&provider).await {
            Some(e) => e,
            None => continue,
        };
        if entry.provider.capabilities().is_collaboration {
            continue;
        }
        if let Some(provider_users) = entry.users {
            users.extend(provider_users);
        }
    }

    collab.register_contacts(&users).await?;
    tracing::debug!(contacts = users.len(), "collaboration contacts registered");
    Ok(())
}
