use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use hypr_gemini::Content;

use crate::{Assistant, Error};

/// A conversation with a fixed system instruction and a growing history.
#[derive(Debug)]
pub struct ChatSession {
    key: String,
    role: String,
    system_instruction: Option<String>,
    history: tokio::sync::Mutex<Vec<Content>>,
    created_at: Instant,
    seq: u64,
}

impl ChatSession {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn system_instruction(&self) -> Option<&str> {
        self.system_instruction.as_deref()
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub async fn history(&self) -> Vec<Content> {
        self.history.lock().await.clone()
    }

    /// Sends one user turn with the full history. Both turns are recorded only
    /// if the reply arrives, and turns from concurrent callers never interleave.
    pub async fn send_message(&self, assistant: &Assistant, text: &str) -> Result<String, Error> {
        let mut history = self.history.lock().await;

        let mut contents = history.clone();
        contents.push(Content::user(text));

        tracing::debug!(
            session = %self.key,
            role = %self.role,
            turns = contents.len(),
            "session_message_sent"
        );

        let reply = assistant
            .generate_contents(self.system_instruction.as_deref(), contents.clone(), None)
            .await?;

        contents.push(Content::model(reply.clone()));
        *history = contents;

        Ok(reply)
    }
}

/// Keyed store of live sessions, e.g. one per `witness-<id>-<case-id>`.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Arc<ChatSession>>>,
    capacity: Option<usize>,
    next_seq: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Once full, creating a session evicts the oldest one.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity.max(1)),
            ..Self::default()
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<ChatSession>>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns the live session for `key`, creating it if absent. An existing
    /// session is returned unchanged; the new arguments are ignored.
    pub fn get_or_create(
        &self,
        key: &str,
        role: &str,
        system_instruction: Option<&str>,
        initial_history: Vec<Content>,
    ) -> Arc<ChatSession> {
        let mut sessions = self.lock();

        if let Some(existing) = sessions.get(key) {
            return existing.clone();
        }

        if let Some(capacity) = self.capacity
            && sessions.len() >= capacity
            && let Some(oldest) = sessions
                .values()
                .min_by_key(|s| (s.created_at, s.seq))
                .map(|s| s.key.clone())
        {
            tracing::info!(session = %oldest, "session_evicted");
            sessions.remove(&oldest);
        }

        let session = Arc::new(ChatSession {
            key: key.to_string(),
            role: role.to_string(),
            system_instruction: system_instruction.map(str::to_string),
            history: tokio::sync::Mutex::new(initial_history),
            created_at: Instant::now(),
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
        });

        tracing::info!(session = %key, role = %role, "session_created");
        sessions.insert(key.to_string(), session.clone());
        session
    }

    pub fn get(&self, key: &str) -> Option<Arc<ChatSession>> {
        self.lock().get(key).cloned()
    }

    /// Removal only forgets the key; holders of the handle keep using it.
    pub fn remove(&self, key: &str) -> Option<Arc<ChatSession>> {
        self.lock().remove(key)
    }

    pub fn remove_all(&self) {
        let mut sessions = self.lock();
        tracing::info!(count = sessions.len(), "sessions_cleared");
        sessions.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_key_returns_same_handle() {
        let registry = SessionRegistry::new();

        let first = registry.get_or_create(
            "witness-7-case-42",
            "witness",
            Some("Answer as the witness."),
            vec![],
        );
        let second = registry.get_or_create(
            "witness-7-case-42",
            "opposing",
            Some("Something else."),
            vec![],
        );

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.system_instruction(), Some("Answer as the witness."));
        assert_eq!(second.role(), "witness");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_all_then_fresh_handle() {
        let registry = SessionRegistry::new();

        let first = registry.get_or_create("witness-1-case-1", "witness", None, vec![]);
        registry.get_or_create("witness-2-case-1", "witness", None, vec![]);
        registry.remove_all();
        assert!(registry.is_empty());

        let fresh = registry.get_or_create("witness-1-case-1", "witness", None, vec![]);
        assert!(!Arc::ptr_eq(&first, &fresh));
        // The old handle is still usable by whoever holds it.
        assert_eq!(first.key(), "witness-1-case-1");
    }

    #[test]
    fn test_remove_single() {
        let registry = SessionRegistry::new();
        registry.get_or_create("a", "witness", None, vec![]);
        registry.get_or_create("b", "witness", None, vec![]);

        assert!(registry.remove("a").is_some());
        assert!(registry.remove("a").is_none());
        assert!(registry.get("a").is_none());
        assert!(registry.get("b").is_some());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let registry = SessionRegistry::with_capacity(2);
        registry.get_or_create("first", "witness", None, vec![]);
        registry.get_or_create("second", "witness", None, vec![]);
        registry.get_or_create("third", "witness", None, vec![]);

        let mut keys = registry.keys();
        keys.sort();
        assert_eq!(keys, vec!["second".to_string(), "third".to_string()]);
    }

    #[tokio::test]
    async fn test_initial_history_is_kept() {
        let registry = SessionRegistry::new();
        let session = registry.get_or_create(
            "k",
            "witness",
            None,
            vec![Content::user("hello"), Content::model("hi")],
        );
        assert_eq!(session.history().await.len(), 2);
    }
}
