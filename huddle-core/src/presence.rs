// ABOUTME: Self-presence negotiation: status selection and backend-specific option sets.
// ABOUTME: Omits idle where unsupported; do-not-disturb may carry a snooze duration.

use std::sync::Arc;

use anyhow::Result;

use crate::session::ChatSession;
use crate::types::{EventType, Presence, UiMessage};

/// Suffix appended to the list item matching the current presence.
const CURRENT_MARKER: &str = " (current)";

/// Fixed snooze duration choices, in minutes.
const SNOOZE_DURATIONS: [u32; 6] = [20, 60, 120, 240, 480, 1440];

fn duration_label(minutes: u32) -> String {
    match minutes {
        m if m < 60 => format!("{} minutes", m),
        60 => "1 hour".to_string(),
        m if m % 60 == 0 => format!("{} hours", m / 60),
        m => format!("{} minutes", m),
    }
}

/// Ask the user for their presence status and apply it.
///
/// The target is the first enabled non-collaboration provider; presence
/// is not offered when only the collaboration session is enabled. The
/// candidate list omits `Idle` for backends without idle support and
/// marks the item matching current presence.
pub async fn ask_for_self_presence(session: &Arc<ChatSession>) -> Result<()> {
    let provider = match session.first_enabled_team_chat().await {
        Some(p) => p,
        None => {
            tracing::debug!("presence not offered: no team-chat provider enabled");
            return Ok(());
        }
    };

    let entry = match session.entry_snapshot(&provider).await {
        Some(e) => e,
        None => return Ok(()),
    };
    let caps = entry.provider.capabilities();
    let current = entry.presence;

    let mut candidates = vec![
        Presence::Available,
        Presence::DoNotDisturb,
        Presence::Invisible,
    ];
    if caps.supports_idle_presence {
        candidates.push(Presence::Idle);
    }

    let items: Vec<String> = candidates
        .iter()
        .map(|p| {
            if *p == current {
                format!("{}{}", p.label(), CURRENT_MARKER)
            } else {
                p.label().to_string()
            }
        })
        .collect();

    let picked = match session.prompts.pick_one("Set presence", items).await {
        Some(p) => p,
        None => return Ok(()),
    };

    let label = picked.trim_end_matches(CURRENT_MARKER);
    let presence = match Presence::from_label(label) {
        Some(p) => p,
        None => return Ok(()),
    };

    update_self_presence(session, &provider, presence, 0).await
}

/// Apply a presence status to a provider.
///
/// For do-not-disturb on snooze-capable backends, a duration prompt is
/// shown first; dismissing it still applies presence with duration 0
/// ("until manually cleared").
pub async fn update_self_presence(
    session: &Arc<ChatSession>,
    provider: &str,
    presence: Presence,
    duration_minutes: u32,
) -> Result<()> {
    let client = session.client(provider).await?;
    let caps = client.capabilities();

    let mut duration = duration_minutes;
    if presence == Presence::DoNotDisturb && caps.supports_snooze && duration == 0 {
        let items: Vec<String> = SNOOZE_DURATIONS.iter().map(|m| duration_label(*m)).collect();
        duration = match session.prompts.pick_one("Snooze for", items).await {
            Some(picked) => SNOOZE_DURATIONS
                .iter()
                .copied()
                .find(|m| duration_label(*m) == picked)
                .unwrap_or(0),
            None => 0,
        };
    }

    client.update_presence(presence, duration).await?;
    session.set_presence(provider, presence).await;
    session
        .telemetry
        .record(EventType::PresenceUpdated, None, Some(provider));
    session
        .display
        .send_to_ui(UiMessage::PresenceChanged {
            provider: provider.to_string(),
            presence,
        })
        .await;
    tracing::info!(provider = %provider, presence = ?presence, duration, "presence updated");
    Ok(())
}
