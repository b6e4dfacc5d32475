use crate::error::Error;
use crate::session::{Session, SessionStore};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use time::OffsetDateTime;

#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct InMemorySessionStore {
    sessions: HashMap<String, Session>,
}

impl InMemorySessionStore {
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_by_hostname(&self, hostname: &str) -> Result<Option<Session>, Error> {
        Ok(self.sessions.get(&hostname.to_ascii_lowercase()).cloned())
    }

    async fn upsert(&mut self, mut session: Session) -> Result<Vec<Session>, Error> {
        session.hostname = session.hostname.to_ascii_lowercase();
        let same_id: Vec<String> = self
            .sessions
            .iter()
            .filter(|(hostname, existing)| {
                existing.session_id == session.session_id && **hostname != session.hostname
            })
            .map(|(hostname, _)| hostname.clone())
            .collect();
        let mut replaced: Vec<Session> = same_id
            .iter()
            .filter_map(|hostname| self.sessions.remove(hostname))
            .collect();
        replaced.extend(self.sessions.insert(session.hostname.clone(), session));
        Ok(replaced)
    }

    async fn remove(&mut self, session_id: &str) -> Result<Option<Session>, Error> {
        let hostname = self
            .sessions
            .iter()
            .find(|(_, s)| s.session_id == session_id)
            .map(|(hostname, _)| hostname.clone());
        Ok(hostname.and_then(|h| self.sessions.remove(&h)))
    }

    async fn delete_expired(&mut self, now: OffsetDateTime) -> Result<usize, Error> {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| !s.is_expired(now));
        Ok(before - self.sessions.len())
    }
}
