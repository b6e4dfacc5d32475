//! Tunnel session storage.
//!
//! A session maps a hostname (`{address}-{proxy entry id}`, without the zone) to the IP address
//! of the proxy entry serving it. The DNS server only ever reads sessions, through
//! [`SessionStore::get_by_hostname`]. Writes come from session lifecycle events (see
//! [`events`]) and from the periodic expiry sweep (see [`cleanup`]).
//!
//! Two implementations are provided, [`memory::InMemorySessionStore`] and
//! [`file::FileSessionStore`]. The former is not durable across restarts. The latter will write
//! its state to disk for each update and load this state again on startup.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::RwLock;

pub mod cleanup;
pub mod events;
pub mod file;
pub mod memory;

#[allow(clippy::module_name_repetitions)]
pub use file::FileSessionStore;
#[allow(clippy::module_name_repetitions)]
pub use memory::InMemorySessionStore;

/// `DynSessionStore` is a type alias for a [`SessionStore`] that can be used by multiple
/// read/write consumers that coordinate through an [`Arc`] and a [`RwLock`] wrapping the
/// [`SessionStore`].
#[allow(clippy::module_name_repetitions)]
pub type DynSessionStore = Arc<RwLock<dyn SessionStore + Send + Sync>>;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub session_id: String,
    /// Lowercase `{address}-{proxy entry id}`.
    pub hostname: String,
    pub ip_address: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl Session {
    #[must_use]
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at < now
    }
}

/// An async trait describing durable storage of [`Session`]s, keyed by hostname for lookups
/// and by session id for lifecycle updates.
#[async_trait::async_trait]
pub trait SessionStore {
    /// Get the session for `hostname` (case-insensitive), if any.
    async fn get_by_hostname(&self, hostname: &str) -> Result<Option<Session>, Error>;

    /// Add a session, replacing any session with the same id or the same hostname. Returns the
    /// replaced sessions.
    async fn upsert(&mut self, session: Session) -> Result<Vec<Session>, Error>;

    /// Remove the session with `session_id`, returning it if it existed.
    async fn remove(&mut self, session_id: &str) -> Result<Option<Session>, Error>;

    /// Remove every session that expired before `now`, returning how many were removed.
    async fn delete_expired(&mut self, now: OffsetDateTime) -> Result<usize, Error>;
}
