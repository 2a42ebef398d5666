//! In-memory conversation state for widget visitors.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use helpmate_config::SessionConfig;
use helpmate_orchestrator::ChatMessage;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

/// A live widget conversation. `history` holds user and assistant turns only;
/// the system prompt is rebuilt for every message.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub integration_id: i64,
    pub visitor_id: Option<String>,
    /// Row id of the persisted transcript.
    pub chat_id: i64,
    pub history: Vec<ChatMessage>,
    pub created_at: Instant,
}

impl Conversation {
    pub fn new(integration_id: i64, visitor_id: Option<String>, chat_id: i64) -> Self {
        Self {
            integration_id,
            visitor_id,
            chat_id,
            history: Vec::new(),
            created_at: Instant::now(),
        }
    }

    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }
}

/// Session id to conversation map. Entries live for a fixed `ttl` counted
/// from creation; expired entries are dropped on access and by [`sweep`].
///
/// The lock is only held for map operations, never across an await on
/// anything else.
///
/// [`sweep`]: ConversationStore::sweep
#[derive(Clone)]
pub struct ConversationStore {
    sessions: Arc<Mutex<HashMap<String, Conversation>>>,
    ttl: Duration,
    max_history: usize,
}

impl ConversationStore {
    pub fn new(ttl: Duration, max_history: usize) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            ttl,
            max_history,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(Duration::from_secs(config.ttl_seconds), config.max_history_messages)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    fn is_expired(&self, conversation: &Conversation, now: Instant) -> bool {
        now.duration_since(conversation.created_at) >= self.ttl
    }

    /// Snapshot of a live session that belongs to `integration_id`.
    pub async fn get(&self, session_id: &str, integration_id: i64) -> Option<Conversation> {
        let mut sessions = self.sessions.lock().await;
        let expired = match sessions.get(session_id) {
            Some(conversation) => self.is_expired(conversation, Instant::now()),
            None => return None,
        };
        if expired {
            sessions.remove(session_id);
            debug!(session = session_id, "conversation expired");
            return None;
        }

        sessions
            .get(session_id)
            .filter(|conversation| conversation.integration_id == integration_id)
            .cloned()
    }

    pub async fn insert(&self, session_id: impl Into<String>, mut conversation: Conversation) {
        trim_history(&mut conversation.history, self.max_history);
        self.sessions.lock().await.insert(session_id.into(), conversation);
    }

    /// Record one exchange. Returns false when the session is gone.
    pub async fn append_exchange(&self, session_id: &str, user: &str, assistant: &str) -> bool {
        let mut sessions = self.sessions.lock().await;
        let Some(conversation) = sessions.get_mut(session_id) else {
            return false;
        };
        conversation.history.push(ChatMessage::user(user));
        conversation.history.push(ChatMessage::assistant(assistant));
        trim_history(&mut conversation.history, self.max_history);
        true
    }

    pub async fn remove(&self, session_id: &str) -> bool {
        self.sessions.lock().await.remove(session_id).is_some()
    }

    /// Drop every session backed by the transcript row `chat_id`.
    pub async fn remove_chat(&self, chat_id: i64) -> usize {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, conversation| conversation.chat_id != chat_id);
        before - sessions.len()
    }

    /// Drop every expired session, returning how many were removed.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, conversation| !self.is_expired(conversation, now));
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Periodically sweep expired sessions until the returned task is aborted.
    pub fn spawn_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = store.sweep().await;
                if removed > 0 {
                    info!(removed, "expired conversations swept");
                }
            }
        })
    }
}

fn trim_history(history: &mut Vec<ChatMessage>, max: usize) {
    if history.len() > max {
        let excess = history.len() - max;
        history.drain(..excess);
    }
}
