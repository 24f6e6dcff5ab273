//! Per-session state and the interaction handler that drives the pipeline.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::attributes::AttributeSelection;
use crate::error::{InteractionError, ValidationError};
use crate::models::{Answer, HistoryEntry};
use crate::rag::RagPipeline;

#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    created_at: DateTime<Utc>,
    last_active: DateTime<Utc>,
    history: Vec<HistoryEntry>,
}

impl Session {
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4())
    }

    pub fn with_id(id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id,
            created_at: now,
            last_active: now,
            history: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    fn record(&mut self, query: String, answer: String) {
        self.history.push(HistoryEntry {
            query,
            answer,
            created_at: Utc::now(),
        });
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub enum UserRequest {
    FreeText(String),
    Attributes(AttributeSelection),
}

impl UserRequest {
    /// The query string handed to the pipeline.
    pub fn compose(&self, max_styles: usize) -> Result<String, ValidationError> {
        match self {
            Self::FreeText(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return Err(ValidationError::EmptyQuery);
                }
                Ok(text.to_string())
            }
            Self::Attributes(selection) => Ok(selection.normalize(max_styles)?.to_query()),
        }
    }
}

pub struct Shell {
    pipeline: Arc<RagPipeline>,
    max_styles: usize,
}

impl Shell {
    pub fn new(pipeline: Arc<RagPipeline>, max_styles: usize) -> Self {
        Self {
            pipeline,
            max_styles,
        }
    }

    pub fn pipeline(&self) -> &Arc<RagPipeline> {
        &self.pipeline
    }

    pub fn max_styles(&self) -> usize {
        self.max_styles
    }

    /// Validate, run the pipeline and, only on success, append to the session history.
    pub async fn interact(
        &self,
        session: &mut Session,
        request: UserRequest,
    ) -> Result<Answer, InteractionError> {
        session.last_active = Utc::now();

        let query = request.compose(self.max_styles)?;
        let answer = self.pipeline.answer(&query).await?;

        session.record(query, answer.text.clone());
        tracing::debug!(
            "Session {} now holds {} entries",
            session.id,
            session.history.len()
        );
        Ok(answer)
    }
}

/// In-memory sessions keyed by cookie id. Nothing here survives a restart.
pub struct SessionStore {
    sessions: Mutex<HashMap<Uuid, Arc<Mutex<Session>>>>,
    /// `None` when the timeout is too large to represent; sessions then never expire.
    idle_timeout: Option<Duration>,
}

impl SessionStore {
    pub fn new(idle_timeout_minutes: u64) -> Self {
        let idle_timeout = i64::try_from(idle_timeout_minutes)
            .ok()
            .and_then(Duration::try_minutes);
        if idle_timeout.is_none() {
            tracing::warn!(
                "Session idle timeout of {} minutes is out of range; sessions will not expire",
                idle_timeout_minutes
            );
        }
        Self {
            sessions: Mutex::new(HashMap::new()),
            idle_timeout,
        }
    }

    /// The existing session for `id`. Never creates one.
    pub async fn get(&self, id: Option<Uuid>) -> Option<Arc<Mutex<Session>>> {
        let id = id?;
        let mut sessions = self.sessions.lock().await;
        self.evict_idle(&mut sessions);
        sessions.get(&id).map(Arc::clone)
    }

    /// The session for `id`, or a fresh one when the id is unknown or absent.
    pub async fn get_or_create(&self, id: Option<Uuid>) -> Arc<Mutex<Session>> {
        let mut sessions = self.sessions.lock().await;
        self.evict_idle(&mut sessions);

        if let Some(session) = id.and_then(|id| sessions.get(&id)) {
            return Arc::clone(session);
        }

        let session = Session::new();
        let id = session.id();
        tracing::info!("Starting session {}", id);
        let session = Arc::new(Mutex::new(session));
        sessions.insert(id, Arc::clone(&session));
        session
    }

    /// Drop the session (and its history) and start a new one.
    pub async fn reset(&self, id: Option<Uuid>) -> Arc<Mutex<Session>> {
        if let Some(id) = id {
            if self.sessions.lock().await.remove(&id).is_some() {
                tracing::info!("Session {} reset", id);
            }
        }
        self.get_or_create(None).await
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    fn evict_idle(&self, sessions: &mut HashMap<Uuid, Arc<Mutex<Session>>>) {
        let Some(cutoff) = self
            .idle_timeout
            .and_then(|timeout| Utc::now().checked_sub_signed(timeout))
        else {
            return;
        };
        sessions.retain(|id, session| {
            // A session locked by an in-flight interaction is active.
            let keep = session
                .try_lock()
                .map(|s| s.last_active >= cutoff)
                .unwrap_or(true);
            if !keep {
                tracing::debug!("Evicting idle session {}", id);
            }
            keep
        });
    }
}
