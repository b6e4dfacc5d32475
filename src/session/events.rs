//! Session lifecycle events.
//!
//! The tunnel control plane reports sessions opening and closing. A [`SessionCreated`] event
//! records the session against the IP address of its proxy entry; a [`SessionClosed`] event
//! removes it and drops any cached answer for its hostname so the next query sees the change.

use crate::cache::SessionCache;
use crate::config::Shared;
use crate::error::Error;
use crate::proxy_map::ProxyEntryMap;
use crate::session::{DynSessionStore, Session};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

#[serde_as]
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SessionCreated {
    pub session_id: String,
    /// Full tunnel hostname, with or without the authoritative zone.
    pub tunnel_host: String,
    pub proxy_entry_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Lifetime of the session from `timestamp`, in seconds.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub ttl: Duration,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SessionClosed {
    pub session_id: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Applies session events to the session store, keeping the session cache coherent.
#[derive(Clone)]
pub struct SessionEvents {
    config: Shared,
    store: DynSessionStore,
    proxy_map: Arc<ProxyEntryMap>,
    cache: Arc<SessionCache>,
}

impl SessionEvents {
    #[must_use]
    pub fn new(
        config: Shared,
        store: DynSessionStore,
        proxy_map: Arc<ProxyEntryMap>,
        cache: Arc<SessionCache>,
    ) -> Self {
        SessionEvents {
            config,
            store,
            proxy_map,
            cache,
        }
    }

    /// Record a new session, returning the stored [`Session`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownProxyEntry`] when the event's proxy entry has no IP address, in
    /// which case nothing is written. Store errors are passed through.
    pub async fn created(&self, event: SessionCreated) -> Result<Session, Error> {
        let Some(ip_address) = self.proxy_map.get(&event.proxy_entry_id) else {
            warn!(
                session_id = %event.session_id,
                proxy_entry_id = %event.proxy_entry_id,
                "no IP address for proxy entry, session not recorded"
            );
            return Err(Error::UnknownProxyEntry(event.proxy_entry_id));
        };

        let ttl = time::Duration::try_from(event.ttl).unwrap_or(time::Duration::MAX);
        let session = Session {
            session_id: event.session_id,
            hostname: self.config.session_hostname(&event.tunnel_host),
            ip_address,
            created_at: event.timestamp,
            expires_at: event.timestamp.saturating_add(ttl),
        };

        let replaced = self.store.write().await.upsert(session.clone()).await?;
        // A renamed session leaves its old hostname cached.
        for old in replaced.iter().filter(|old| old.hostname != session.hostname) {
            debug!(
                session_id = %old.session_id,
                hostname = %old.hostname,
                "replaced session evicted from cache"
            );
            self.cache.remove(&old.hostname);
        }
        self.cache.remove(&session.hostname);
        info!(
            session_id = %session.session_id,
            hostname = %session.hostname,
            ip_address = %session.ip_address,
            "session created"
        );
        Ok(session)
    }

    /// Remove a session, returning the removed [`Session`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionNotFound`] when no session has the event's id. Store errors are
    /// passed through.
    pub async fn closed(&self, event: SessionClosed) -> Result<Session, Error> {
        let removed = self.store.write().await.remove(&event.session_id).await?;
        let Some(session) = removed else {
            debug!(session_id = %event.session_id, "close for unknown session");
            return Err(Error::SessionNotFound(event.session_id));
        };
        self.cache.remove(&session.hostname);
        info!(
            session_id = %session.session_id,
            hostname = %session.hostname,
            reason = event.reason.as_deref().unwrap_or("unspecified"),
            "session closed"
        );
        Ok(session)
    }
}
