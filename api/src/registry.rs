//! In-process record of the agent sessions this gateway has driven.
//!
//! Backs the debug endpoints. Created once at startup and shared through
//! `AppState`; contents are lost on restart. Sessions are never evicted, so
//! the map grows with every distinct (app, user, session) for the life of the
//! process; each session keeps only its most recent events.

use std::collections::BTreeMap;

use mugo_adk::{Event, RunRequest, RunResult};
use tokio::sync::RwLock;

/// Events kept per session; older ones are dropped first.
pub const MAX_EVENTS_PER_SESSION: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct SessionKey {
    app_name: String,
    user_id: String,
    session_id: String,
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<BTreeMap<SessionKey, Vec<Event>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the user's message and the events of a successful run,
    /// trimming the session to its newest [`MAX_EVENTS_PER_SESSION`] events.
    pub async fn record(&self, request: &RunRequest, result: &RunResult) {
        let key = SessionKey {
            app_name: request.app_name.clone(),
            user_id: request.user_id.clone(),
            session_id: request.session_id.clone(),
        };
        let user_event = Event {
            author: "user".to_string(),
            content: Some(request.new_message.clone()),
            ..Default::default()
        };

        let mut sessions = self.sessions.write().await;
        let events = sessions.entry(key).or_default();
        events.push(user_event);
        events.extend(result.events.iter().cloned());
        if events.len() > MAX_EVENTS_PER_SESSION {
            let excess = events.len() - MAX_EVENTS_PER_SESSION;
            events.drain(..excess);
        }
    }

    /// Session ids for `user_id`, optionally limited to one app. Sorted,
    /// without duplicates.
    pub async fn session_ids(&self, user_id: &str, app_name: Option<&str>) -> Vec<String> {
        let sessions = self.sessions.read().await;
        let mut ids: Vec<String> = sessions
            .keys()
            .filter(|key| key.user_id == user_id && matches_app(key, app_name))
            .map(|key| key.session_id.clone())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Texts of every part of every recorded event, in order. `None` when no
    /// matching session was recorded.
    pub async fn messages(
        &self,
        user_id: &str,
        session_id: &str,
        app_name: Option<&str>,
    ) -> Option<Vec<String>> {
        let sessions = self.sessions.read().await;
        let mut found = false;
        let mut texts = Vec::new();

        for (key, events) in sessions.iter() {
            if key.user_id != user_id || key.session_id != session_id || !matches_app(key, app_name) {
                continue;
            }
            found = true;
            texts.extend(
                events
                    .iter()
                    .filter_map(|e| e.content.as_ref())
                    .flat_map(|c| c.parts.iter())
                    .filter_map(|p| p.text.clone()),
            );
        }

        found.then_some(texts)
    }

    /// Number of recorded sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

fn matches_app(key: &SessionKey, app_name: Option<&str>) -> bool {
    app_name.is_none_or(|app| key.app_name == app)
}
