// ABOUTME: Interactive pickers for provider, workspace, and channel selection.
// ABOUTME: Channel picker sorts by descending unread and carries a synthetic reload entry.

use std::sync::Arc;

use anyhow::Result;

use crate::session::ChatSession;
use crate::types::{title_case, Channel, ChannelLabel, EventType, Team};

/// Synthetic trailing entry in the channel picker.
pub const RELOAD_CHANNELS_LABEL: &str = "Reload channels…";

/// Present the supported provider keys, title-cased, as a single-select
/// list. Returns the lowercase key, or `None` if dismissed.
pub async fn ask_for_provider(session: &ChatSession) -> Option<String> {
    let supported = {
        let registry = session.registry.read().await;
        registry.supported_ids()
    };
    let items: Vec<String> = supported.iter().map(|id| title_case(id)).collect();
    let picked = session
        .prompts
        .pick_one("Select a provider", items)
        .await?;
    supported.into_iter().find(|id| title_case(id) == picked)
}

/// Present the provider's team list and commit the selection as that
/// provider's current team. The commit invalidates the provider's cached
/// channel/user state so the next read fetches fresh.
pub async fn ask_for_workspace(
    session: &Arc<ChatSession>,
    provider: &str,
) -> Result<Option<Team>> {
    let client = session.client(provider).await?;

    let current_user = match session
        .entry_snapshot(provider)
        .await
        .and_then(|e| e.current_user)
    {
        Some(user) => user,
        None => {
            let user = client.fetch_current_user().await?;
            let mut registry = session.registry.write().await;
            if let Some(entry) = registry.entry_mut(provider) {
                entry.teams = user.teams.clone();
                entry.current_user = Some(user.clone());
            }
            user
        }
    };

    if current_user.teams.is_empty() {
        tracing::debug!(provider = %provider, "no teams available for workspace selection");
        return Ok(None);
    }

    let items: Vec<String> = current_user.teams.iter().map(|t| t.name.clone()).collect();
    let picked = match session.prompts.pick_one("Select a workspace", items).await {
        Some(name) => name,
        None => return Ok(None),
    };

    let team = match current_user.teams.iter().find(|t| t.name == picked) {
        Some(team) => team.clone(),
        None => return Ok(None),
    };

    commit_workspace(session, provider, &team).await?;
    Ok(Some(team))
}

/// Commit a team as the provider's current team. Switching invalidates
/// that provider's cached channel/user state only.
async fn commit_workspace(session: &Arc<ChatSession>, provider: &str, team: &Team) -> Result<()> {
    session.store.set_current_team(provider, &team.id)?;
    session.registry.write().await.invalidate_cache(provider);
    session
        .telemetry
        .record(EventType::WorkspaceChanged, None, Some(provider));
    tracing::info!(provider = %provider, team = %team.name, "current workspace changed");
    Ok(())
}

/// Present the channel projection across one provider (or all enabled
/// providers), sorted by descending unread count with ties in original
/// enumeration order, plus a trailing reload entry.
///
/// Reload resolves a provider (asking interactively if no filter was
/// given), forces a fresh fetch of that provider's users then channels,
/// and loops back into selection with the original filter. The loop ends
/// only on a real pick or an explicit dismissal.
pub async fn ask_for_channel(
    session: &Arc<ChatSession>,
    provider: Option<&str>,
) -> Result<Option<(Channel, String)>> {
    loop {
        let labels = channel_labels(session, provider).await?;
        // When listing across several providers, prefix each entry with the
        // provider so identical channels on different backends stay distinct.
        let multi = provider.is_none() && session.enabled_ids().await.len() > 1;
        let mut items: Vec<String> = labels
            .iter()
            .map(|l| {
                if multi {
                    format!("{} · {}", title_case(&l.provider), l.display())
                } else {
                    l.display()
                }
            })
            .collect();
        items.push(RELOAD_CHANNELS_LABEL.to_string());

        let picked = match session
            .prompts
            .pick_one("Select a channel", items.clone())
            .await
        {
            Some(p) => p,
            None => return Ok(None),
        };

        // Resolve by position in the presented list; items and labels share
        // their ordering, with the reload entry trailing.
        let index = match items.iter().position(|item| *item == picked) {
            Some(i) => i,
            None => return Ok(None),
        };

        if index == labels.len() {
            let target = match provider {
                Some(p) => p.to_string(),
                None => match ask_for_provider(session).await {
                    Some(p) => p,
                    None => return Ok(None),
                },
            };
            reload_channel_state(session, &target).await?;
            continue;
        }

        return Ok(labels
            .get(index)
            .map(|l| (l.channel.clone(), l.provider.clone())));
    }
}

/// Compute the channel-label projection. Channels are fetched lazily for
/// providers whose cache was invalidated or never filled.
pub async fn channel_labels(
    session: &Arc<ChatSession>,
    provider: Option<&str>,
) -> Result<Vec<ChannelLabel>> {
    let targets: Vec<String> = match provider {
        Some(p) => vec![p.to_string()],
        None => session.enabled_ids().await,
    };

    let mut labels = Vec::new();
    for id in &targets {
        let entry = match session.entry_snapshot(id).await {
            Some(e) => e,
            None => continue,
        };

        let channels = match entry.channels {
            Some(channels) => channels,
            None => {
                let fresh = entry.provider.fetch_channels().await?;
                let mut registry = session.registry.write().await;
                if let Some(live) = registry.entry_mut(id) {
                    live.channels = Some(fresh.clone());
                }
                fresh
            }
        };

        let team_name = session
            .store
            .current_team(id)?
            .and_then(|team_id| entry.teams.iter().find(|t| t.id == team_id).cloned())
            .map(|t| t.name);

        for channel in channels {
            let unread = channel.unread_count;
            labels.push(ChannelLabel {
                channel,
                provider: id.clone(),
                team: team_name.clone(),
                unread,
            });
        }
    }

    // Stable sort: equal unread counts keep their enumeration order.
    labels.sort_by(|a, b| b.unread.cmp(&a.unread));
    Ok(labels)
}

/// Force a fresh fetch of a provider's users, then channels, replacing
/// the cached state wholesale.
pub(crate) async fn reload_channel_state(session: &Arc<ChatSession>, provider: &str) -> Result<()> {
    let client = session.client(provider).await?;

    let users = client.fetch_users().await?;
    session.store.set_user_directory(provider, &users)?;
    let channels = client.fetch_channels().await?;

    let mut registry = session.registry.write().await;
    if let Some(entry) = registry.entry_mut(provider) {
        entry.users = Some(users);
        entry.channels = Some(channels);
    }
    tracing::debug!(provider = %provider, "channel state reloaded");
    Ok(())
}
