// ABOUTME: Core data model for multi-provider chat orchestration.
// ABOUTME: Providers, teams, channels, users, presence, and telemetry event tags.

use serde::{Deserialize, Serialize};

/// A named tenant scope within a provider (Slack workspace, Discord guild).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
}

/// Kind of conversation stream within a (provider, team).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Public or private named channel
    Channel,
    /// Multi-party group conversation
    Group,
    /// 1:1 direct message
    DirectMessage,
}

/// An addressable conversation stream, scoped to one (provider, team).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub kind: ChannelKind,
    /// Optional grouping label (e.g., a Discord category)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub unread_count: u32,
}

impl Channel {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: ChannelKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            category: None,
            unread_count: 0,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_unread(mut self, unread: u32) -> Self {
        self.unread_count = unread;
        self
    }
}

/// A chat user within one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

impl User {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            full_name: None,
        }
    }
}

/// The authenticated user for a provider, with the teams they belong to.
///
/// A user may belong to multiple teams but has exactly one current team
/// per provider at any time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub teams: Vec<Team>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_team_id: Option<String>,
}

/// A single message in a channel's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Provider-native timestamp, also the message identity within a channel
    pub timestamp: String,
    pub user_id: String,
    pub text: String,
}

/// A user's availability status.
///
/// `Idle` is not a legal target for providers that don't support it;
/// `DoNotDisturb` may carry a snooze duration in minutes (0 = until
/// manually cleared), meaningful only for snooze-capable providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    Available,
    DoNotDisturb,
    Invisible,
    Idle,
}

impl Presence {
    /// Human-readable label used in selection prompts.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Available => "Available",
            Self::DoNotDisturb => "Do Not Disturb",
            Self::Invisible => "Invisible",
            Self::Idle => "Idle",
        }
    }

    /// Parse a prompt label back into the enum form.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Available" => Some(Self::Available),
            "Do Not Disturb" => Some(Self::DoNotDisturb),
            "Invisible" => Some(Self::Invisible),
            "Idle" => Some(Self::Idle),
            _ => None,
        }
    }
}

/// Why a telemetry-worthy transition occurred. Descriptive only, never
/// authoritative state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    /// Invoked from the command palette or a keybinding
    Command,
    /// Invoked from the activity/status surface
    Activity,
    /// Invoked from an informational notice
    Notification,
    /// Invoked by the peer-collaboration session
    Collaboration,
}

impl Default for EventSource {
    fn default() -> Self {
        Self::Command
    }
}

/// Telemetry-worthy state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Installed,
    ViewOpened,
    MessageSent,
    TokenConfigured,
    WorkspaceChanged,
    ChannelChanged,
    PresenceUpdated,
    Reset,
}

/// The addressing tuple used to open or route to a chat view.
///
/// Exactly one of `channel_id` / `user` is meaningful when resolving a
/// target; a user target means "create or find a direct-message channel".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatArgs {
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(default)]
    pub source: EventSource,
}

impl ChatArgs {
    pub fn for_channel(provider: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            channel_id: Some(channel_id.into()),
            user: None,
            source: EventSource::default(),
        }
    }

    pub fn for_user(provider: impl Into<String>, user: User) -> Self {
        Self {
            provider: provider.into(),
            channel_id: None,
            user: Some(user),
            source: EventSource::default(),
        }
    }

    pub fn with_source(mut self, source: EventSource) -> Self {
        self.source = source;
        self
    }
}

/// Derived projection used only for channel selection UI. Recomputed on
/// demand, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelLabel {
    pub channel: Channel,
    pub provider: String,
    pub team: Option<String>,
    pub unread: u32,
}

impl ChannelLabel {
    /// The display string presented in the picker. Encodes both category
    /// and name so same-named channels across categories stay distinct.
    pub fn display(&self) -> String {
        let name = match &self.channel.category {
            Some(category) => format!("{} · {}", category, self.channel.name),
            None => self.channel.name.clone(),
        };
        if self.unread > 0 {
            format!("{} ({} new)", name, self.unread)
        } else {
            name
        }
    }
}

/// Messages pushed to the rendering surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiMessage {
    History {
        provider: String,
        channel_id: String,
        messages: Vec<Message>,
    },
    ThreadReplies {
        provider: String,
        channel_id: String,
        parent_timestamp: String,
        messages: Vec<Message>,
    },
    PresenceChanged {
        provider: String,
        presence: Presence,
    },
}

/// Title-case a lowercase provider key for display ("slack" -> "Slack").
pub fn title_case(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_builder() {
        let channel = Channel::new("C1", "general", ChannelKind::Channel)
            .with_category("Text")
            .with_unread(3);
        assert_eq!(channel.id, "C1");
        assert_eq!(channel.category.as_deref(), Some("Text"));
        assert_eq!(channel.unread_count, 3);
    }

    #[test]
    fn test_presence_label_round_trip() {
        for presence in [
            Presence::Available,
            Presence::DoNotDisturb,
            Presence::Invisible,
            Presence::Idle,
        ] {
            assert_eq!(Presence::from_label(presence.label()), Some(presence));
        }
        assert_eq!(Presence::from_label("Away"), None);
    }

    #[test]
    fn test_presence_serde_snake_case() {
        let json = serde_json::to_string(&Presence::DoNotDisturb).unwrap();
        assert_eq!(json, "\"do_not_disturb\"");
    }

    #[test]
    fn test_chat_args_channel_target() {
        let args = ChatArgs::for_channel("slack", "C1");
        assert_eq!(args.provider, "slack");
        assert_eq!(args.channel_id.as_deref(), Some("C1"));
        assert!(args.user.is_none());
    }

    #[test]
    fn test_chat_args_user_target() {
        let args = ChatArgs::for_user("discord", User::new("U1", "harper"));
        assert!(args.channel_id.is_none());
        assert_eq!(args.user.as_ref().unwrap().id, "U1");
    }

    #[test]
    fn test_chat_args_deserialize_defaults_source() {
        let args: ChatArgs =
            serde_json::from_str(r#"{"provider":"slack","channel_id":"C9"}"#).unwrap();
        assert_eq!(args.source, EventSource::Command);
    }

    #[test]
    fn test_channel_label_display_plain() {
        let label = ChannelLabel {
            channel: Channel::new("C1", "general", ChannelKind::Channel),
            provider: "slack".to_string(),
            team: None,
            unread: 0,
        };
        assert_eq!(label.display(), "general");
    }

    #[test]
    fn test_channel_label_display_category_and_unread() {
        let label = ChannelLabel {
            channel: Channel::new("C2", "general", ChannelKind::Channel).with_category("Gaming"),
            provider: "discord".to_string(),
            team: Some("Guild".to_string()),
            unread: 4,
        };
        assert_eq!(label.display(), "Gaming · general (4 new)");
    }

    #[test]
    fn test_channel_label_disambiguates_categories() {
        let a = ChannelLabel {
            channel: Channel::new("C1", "general", ChannelKind::Channel).with_category("Alpha"),
            provider: "discord".to_string(),
            team: None,
            unread: 0,
        };
        let b = ChannelLabel {
            channel: Channel::new("C2", "general", ChannelKind::Channel).with_category("Beta"),
            provider: "discord".to_string(),
            team: None,
            unread: 0,
        };
        assert_ne!(a.display(), b.display());
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("slack"), "Slack");
        assert_eq!(title_case("liveshare"), "Liveshare");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn test_ui_message_serialization() {
        let msg = UiMessage::History {
            provider: "slack".to_string(),
            channel_id: "C1".to_string(),
            messages: vec![],
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"history\""));
        assert!(json.contains("\"channel_id\":\"C1\""));
    }
}
