//! Session registry.
//!
//! Each session sits behind its own mutex, so callers working on the same
//! race are serialised while different races proceed independently. The
//! outer lock only guards the id → session map.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::info;
use uuid::Uuid;

use super::{RaceSession, SessionSummary};
use crate::betting::BetPlanner;
use crate::config::{AppConfig, DisplayConfig};
use crate::types::{Competitor, KeibaError, RaceMeta};

pub type SharedSession = Arc<Mutex<RaceSession>>;

pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, SharedSession>>,
    planner: BetPlanner,
    display: DisplayConfig,
    default_budget: u64,
}

impl SessionRegistry {
    pub fn new(cfg: &AppConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            planner: BetPlanner::new(&cfg.betting),
            display: cfg.display.clone(),
            default_budget: cfg.betting.default_budget,
        }
    }

    pub fn planner(&self) -> &BetPlanner {
        &self.planner
    }

    pub fn display(&self) -> &DisplayConfig {
        &self.display
    }

    pub fn default_budget(&self) -> u64 {
        self.default_budget
    }

    /// Open a session and register it. Returns the new session id.
    pub async fn open(&self, meta: RaceMeta, roster: Vec<Competitor>) -> Result<Uuid, KeibaError> {
        let session = RaceSession::new(meta, roster)?;
        let id = session.id();
        let mut sessions = self.sessions.write().await;
        sessions.insert(id, Arc::new(Mutex::new(session)));
        info!(session_id = %id, open_sessions = sessions.len(), "Session registered");
        Ok(id)
    }

    pub async fn get(&self, id: Uuid) -> Result<SharedSession, KeibaError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(KeibaError::SessionNotFound(id))
    }

    /// Summaries of every open session, oldest first.
    pub async fn list(&self) -> Vec<SessionSummary> {
        let handles: Vec<SharedSession> = self.sessions.read().await.values().cloned().collect();
        let mut summaries = Vec::with_capacity(handles.len());
        for handle in handles {
            summaries.push(handle.lock().await.summary());
        }
        summaries.sort_by_key(|s| s.created_at);
        summaries
    }

    pub async fn close(&self, id: Uuid) -> Result<(), KeibaError> {
        self.sessions
            .write()
            .await
            .remove(&id)
            .map(|_| info!(session_id = %id, "Session closed"))
            .ok_or(KeibaError::SessionNotFound(id))
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
