// ABOUTME: Host-side wiring for the huddle orchestration engine.
// ABOUTME: Configuration, data paths, and the SQLite-backed persistent store.

pub mod config;
pub mod paths;
pub mod store;

// Re-export the engine for embedders
pub use huddle_core::{
    bridge, commands, presence, selection, ChatProvider, ChatSession, ChatStore, CollabApi,
    Command, CommandBus, CoreError, DisplaySurface, HostPrompts, ProviderCapabilities,
    SessionUrls, Telemetry,
};

pub use huddle_core::types;
