// ABOUTME: Platform-agnostic chat session orchestration across heterogeneous providers.
// ABOUTME: Bootstrap sequencing, selection flows, presence, command routing, contact bridging.

pub mod bridge;
pub mod commands;
pub mod error;
pub mod presence;
pub mod registry;
pub mod selection;
pub mod session;
pub mod traits;
pub mod types;

pub use commands::{Command, CommandBus};
pub use error::CoreError;
pub use registry::{ProviderEntry, ProviderRegistry};
pub use session::{ChatSession, SessionUrls};

// Re-export the trait seams for convenient access
pub use traits::{
    ChatProvider, ChatStore, CollabApi, DisplaySurface, HostPrompts, ProviderCapabilities,
    Telemetry,
};

// Re-export the data model
pub use types::{
    ChannelKind, ChatArgs, Channel, ChannelLabel, CurrentUser, EventSource, EventType, Message,
    Presence, Team, UiMessage, User,
};
