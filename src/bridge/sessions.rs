use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Caller,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
    pub at: DateTime<Utc>,
}

impl Turn {
    #[must_use]
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
            at: Utc::now(),
        }
    }
}

/// Metadata kept for one caller session.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: Instant,
    pub context: Map<String, Value>,
    pub history: Vec<Turn>,
}

impl SessionRecord {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            created_at: Utc::now(),
            last_activity: Instant::now(),
            context: Map::new(),
            history: Vec::new(),
        }
    }

    fn touch(&mut self) {
        self.last_activity = self.last_activity.max(Instant::now());
    }
}

/// Process-wide session registry, shared by every connection.
///
/// Records outlive their connection. `sweep` is the only removal path.
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: DashMap<String, SessionRecord>,
}

impl SessionTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fresh record, replacing any record with the same id.
    pub fn create(&self, id: &str) -> SessionRecord {
        let record = SessionRecord::new(id);
        self.sessions.insert(id.to_string(), record.clone());
        tracing::debug!(session_id = id, "Session created");
        record
    }

    /// Return the record for `id`, refreshing its activity, or create it.
    pub fn get_or_create(&self, id: &str) -> SessionRecord {
        self.sessions
            .entry(id.to_string())
            .and_modify(SessionRecord::touch)
            .or_insert_with(|| SessionRecord::new(id))
            .clone()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<SessionRecord> {
        self.sessions.get(id).map(|record| record.clone())
    }

    /// Refresh last activity. Returns `false` if the session is unknown.
    pub fn touch(&self, id: &str) -> bool {
        let Some(mut record) = self.sessions.get_mut(id) else {
            return false;
        };
        record.touch();
        true
    }

    /// Merge `partial` into the session context; existing keys are overwritten.
    /// An unknown session is created first.
    pub fn update_context(&self, id: &str, partial: Map<String, Value>) {
        let mut record = self
            .sessions
            .entry(id.to_string())
            .and_modify(SessionRecord::touch)
            .or_insert_with(|| SessionRecord::new(id));
        record.context.extend(partial);
    }

    pub fn append_turn(&self, id: &str, turn: Turn) -> bool {
        let Some(mut record) = self.sessions.get_mut(id) else {
            return false;
        };
        record.history.push(turn);
        true
    }

    /// Remove every session idle for longer than `max_age` and return how many
    /// were removed.
    pub fn sweep(&self, max_age: Duration) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        self.sessions.retain(|_, record| {
            let keep = now.saturating_duration_since(record.last_activity) <= max_age;
            if !keep {
                removed += 1;
            }
            keep
        });
        if removed > 0 {
            tracing::info!(removed, remaining = self.sessions.len(), "Swept idle sessions");
        }
        removed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
