// ABOUTME: Shared test doubles: mock provider, scripted prompts, recording surfaces.
// ABOUTME: Builds an isolated session aggregate over the in-memory SQLite store.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;

use huddle::store::SqliteStore;
use huddle::types::{
    Channel, ChannelKind, CurrentUser, EventSource, EventType, Message, Presence, Team, UiMessage,
    User,
};
use huddle::{
    ChatProvider, ChatSession, CollabApi, DisplaySurface, HostPrompts, ProviderCapabilities,
    Telemetry,
};

// =============================================================================
// Provider double
// =============================================================================

pub struct MockProvider {
    pub id: String,
    pub caps: ProviderCapabilities,
    pub current_user: CurrentUser,
    pub users: Vec<User>,
    pub channels: Mutex<Vec<Channel>>,
    pub history: Vec<Message>,
    pub validate_ok: bool,
    pub initialize_calls: AtomicUsize,
    pub fetch_user_calls: AtomicUsize,
    pub fetch_users_calls: AtomicUsize,
    pub fetch_channels_calls: AtomicUsize,
    pub subscribe_calls: AtomicUsize,
    pub sent: Mutex<Vec<(String, String, Option<String>)>>,
    pub marked_read: Mutex<Vec<String>>,
    pub presence_updates: Mutex<Vec<(Presence, u32)>>,
}

impl MockProvider {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            caps: ProviderCapabilities::team_chat(),
            current_user: CurrentUser {
                id: "U-self".to_string(),
                name: "self".to_string(),
                teams: vec![Team {
                    id: "T1".to_string(),
                    name: "Acme".to_string(),
                }],
                current_team_id: Some("T1".to_string()),
            },
            users: vec![User::new("U1", "harper")],
            channels: Mutex::new(vec![Channel::new("C1", "general", ChannelKind::Channel)]),
            history: vec![],
            validate_ok: true,
            initialize_calls: AtomicUsize::new(0),
            fetch_user_calls: AtomicUsize::new(0),
            fetch_users_calls: AtomicUsize::new(0),
            fetch_channels_calls: AtomicUsize::new(0),
            subscribe_calls: AtomicUsize::new(0),
            sent: Mutex::new(vec![]),
            marked_read: Mutex::new(vec![]),
            presence_updates: Mutex::new(vec![]),
        }
    }

    pub fn with_caps(mut self, caps: ProviderCapabilities) -> Self {
        self.caps = caps;
        self
    }

    pub fn with_channels(self, channels: Vec<Channel>) -> Self {
        *self.channels.lock().unwrap() = channels;
        self
    }

    pub fn with_users(mut self, users: Vec<User>) -> Self {
        self.users = users;
        self
    }

    pub fn with_teams(mut self, teams: Vec<Team>) -> Self {
        self.current_user.teams = teams;
        self
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    pub fn set_channels(&self, channels: Vec<Channel>) {
        *self.channels.lock().unwrap() = channels;
    }

    pub fn sent_messages(&self) -> Vec<(String, String, Option<String>)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatProvider for MockProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> ProviderCapabilities {
        self.caps
    }

    async fn validate_token(&self, _token: &str) -> Result<CurrentUser> {
        if self.validate_ok {
            Ok(self.current_user.clone())
        } else {
            anyhow::bail!("invalid token")
        }
    }

    async fn initialize(&self, _token: Option<&str>) -> Result<()> {
        self.initialize_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn fetch_current_user(&self) -> Result<CurrentUser> {
        self.fetch_user_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.current_user.clone())
    }

    async fn fetch_users(&self) -> Result<Vec<User>> {
        self.fetch_users_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.users.clone())
    }

    async fn fetch_channels(&self) -> Result<Vec<Channel>> {
        self.fetch_channels_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.channels.lock().unwrap().clone())
    }

    async fn fetch_history(&self, _channel_id: &str) -> Result<Vec<Message>> {
        Ok(self.history.clone())
    }

    async fn fetch_thread_replies(
        &self,
        _channel_id: &str,
        _parent_timestamp: &str,
    ) -> Result<Vec<Message>> {
        Ok(self.history.clone())
    }

    async fn send_message(
        &self,
        channel_id: &str,
        text: &str,
        parent_timestamp: Option<&str>,
    ) -> Result<()> {
        self.sent.lock().unwrap().push((
            channel_id.to_string(),
            text.to_string(),
            parent_timestamp.map(str::to_string),
        ));
        Ok(())
    }

    async fn mark_read(&self, channel_id: &str) -> Result<()> {
        self.marked_read.lock().unwrap().push(channel_id.to_string());
        Ok(())
    }

    async fn create_im_channel(&self, user: &User) -> Result<Channel> {
        Ok(Channel::new(
            format!("D-{}", user.id),
            user.name.clone(),
            ChannelKind::DirectMessage,
        ))
    }

    async fn subscribe_presence(&self, _users: &[User]) -> Result<()> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn update_presence(&self, presence: Presence, duration_minutes: u32) -> Result<()> {
        self.presence_updates
            .lock()
            .unwrap()
            .push((presence, duration_minutes));
        Ok(())
    }
}

// =============================================================================
// Host doubles
// =============================================================================

#[derive(Default)]
pub struct ScriptedPrompts {
    picks: Mutex<VecDeque<Option<String>>>,
    inputs: Mutex<VecDeque<Option<String>>>,
    error_action: Mutex<Option<String>>,
    pub pick_prompts: Mutex<Vec<(String, Vec<String>)>>,
    pub infos: Mutex<Vec<String>>,
    pub errors: Mutex<Vec<String>>,
    pub opened_urls: Mutex<Vec<String>>,
}

impl ScriptedPrompts {
    pub fn push_pick(&self, response: Option<&str>) {
        self.picks
            .lock()
            .unwrap()
            .push_back(response.map(str::to_string));
    }

    pub fn push_input(&self, response: Option<&str>) {
        self.inputs
            .lock()
            .unwrap()
            .push_back(response.map(str::to_string));
    }

    pub fn set_error_action(&self, action: Option<&str>) {
        *self.error_action.lock().unwrap() = action.map(str::to_string);
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened_urls.lock().unwrap().clone()
    }

    pub fn info_count(&self) -> usize {
        self.infos.lock().unwrap().len()
    }

    /// Item lists offered to pick_one, in call order.
    pub fn offered(&self) -> Vec<Vec<String>> {
        self.pick_prompts
            .lock()
            .unwrap()
            .iter()
            .map(|(_, items)| items.clone())
            .collect()
    }
}

#[async_trait]
impl HostPrompts for ScriptedPrompts {
    async fn pick_one(&self, placeholder: &str, items: Vec<String>) -> Option<String> {
        self.pick_prompts
            .lock()
            .unwrap()
            .push((placeholder.to_string(), items));
        self.picks.lock().unwrap().pop_front().flatten()
    }

    async fn input(&self, _prompt: &str, _masked: bool) -> Option<String> {
        self.inputs.lock().unwrap().pop_front().flatten()
    }

    async fn show_information(&self, message: &str) {
        self.infos.lock().unwrap().push(message.to_string());
    }

    async fn show_error(&self, message: &str, _action: Option<&str>) -> Option<String> {
        self.errors.lock().unwrap().push(message.to_string());
        self.error_action.lock().unwrap().clone()
    }

    async fn open_url(&self, url: &str) {
        self.opened_urls.lock().unwrap().push(url.to_string());
    }
}

#[derive(Default)]
pub struct RecordingDisplay {
    pub states: Mutex<Vec<(String, Option<String>)>>,
    pub load_ui_calls: AtomicUsize,
    pub ui_messages: Mutex<Vec<UiMessage>>,
    pub webview_updates: Mutex<Vec<String>>,
}

impl RecordingDisplay {
    pub fn messages(&self) -> Vec<UiMessage> {
        self.ui_messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl DisplaySurface for RecordingDisplay {
    async fn update_current_state(&self, provider: &str, channel_id: Option<&str>) {
        self.states
            .lock()
            .unwrap()
            .push((provider.to_string(), channel_id.map(str::to_string)));
    }

    async fn load_ui(&self) {
        self.load_ui_calls.fetch_add(1, Ordering::SeqCst);
    }

    async fn send_to_ui(&self, message: UiMessage) {
        self.ui_messages.lock().unwrap().push(message);
    }

    async fn update_webview_for_provider(&self, provider: &str) {
        self.webview_updates
            .lock()
            .unwrap()
            .push(provider.to_string());
    }
}

#[derive(Default)]
pub struct RecordingTelemetry {
    pub events: Mutex<Vec<(EventType, Option<EventSource>, Option<String>)>>,
}

impl RecordingTelemetry {
    pub fn count(&self, event: EventType) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(e, _, _)| *e == event)
            .count()
    }
}

impl Telemetry for RecordingTelemetry {
    fn record(&self, event: EventType, source: Option<EventSource>, provider: Option<&str>) {
        self.events
            .lock()
            .unwrap()
            .push((event, source, provider.map(str::to_string)));
    }
}

#[derive(Default)]
pub struct MockCollab {
    pub active: bool,
    pub link: Option<String>,
    pub contact_map: HashMap<String, String>,
    pub self_peer: Option<String>,
    pub registered: Mutex<Vec<User>>,
}

#[async_trait]
impl CollabApi for MockCollab {
    fn session_active(&self) -> bool {
        self.active
    }

    async fn share_link(&self, _suppress_notification: bool) -> Result<Option<String>> {
        Ok(self.link.clone())
    }

    fn contact_user_id(&self, contact_id: &str) -> Option<String> {
        self.contact_map.get(contact_id).cloned()
    }

    fn self_peer_id(&self) -> Option<String> {
        self.self_peer.clone()
    }

    async fn register_contacts(&self, users: &[User]) -> Result<()> {
        self.registered.lock().unwrap().extend_from_slice(users);
        Ok(())
    }
}

// =============================================================================
// Harness
// =============================================================================

pub struct Harness {
    pub session: Arc<ChatSession>,
    pub store: Arc<SqliteStore>,
    pub prompts: Arc<ScriptedPrompts>,
    pub display: Arc<RecordingDisplay>,
    pub telemetry: Arc<RecordingTelemetry>,
}

pub fn harness(providers: Vec<Arc<MockProvider>>) -> Harness {
    build(providers, None)
}

pub fn harness_with_collab(providers: Vec<Arc<MockProvider>>, collab: Arc<MockCollab>) -> Harness {
    build(providers, Some(collab))
}

fn build(providers: Vec<Arc<MockProvider>>, collab: Option<Arc<MockCollab>>) -> Harness {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let prompts = Arc::new(ScriptedPrompts::default());
    let display = Arc::new(RecordingDisplay::default());
    let telemetry = Arc::new(RecordingTelemetry::default());

    let clients: Vec<Arc<dyn ChatProvider>> = providers
        .into_iter()
        .map(|p| p as Arc<dyn ChatProvider>)
        .collect();

    let mut session = ChatSession::new(
        clients,
        store.clone(),
        prompts.clone(),
        display.clone(),
        telemetry.clone(),
    );
    if let Some(collab) = collab {
        session = session.with_collab(collab);
    }

    Harness {
        session: Arc::new(session),
        store,
        prompts,
        display,
        telemetry,
    }
}

/// Yield long enough for detached (fire-and-forget) tasks to run.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
