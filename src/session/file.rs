//! An JSON file-backed implementation of the [`SessionStore`][super::SessionStore] trait.
//!
//! Wraps a [`InMemorySessionStore`][super::memory::InMemorySessionStore] instance, persisting
//! updates to a JSON file on disk that can be reloaded across restarts.
use crate::error::Error;
use crate::session::memory::InMemorySessionStore;
use crate::session::{Session, SessionStore};
use std::io::ErrorKind;
use time::OffsetDateTime;
use tokio::fs::File;
use tokio::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// An file-backed session store. After each update a JSON file on disk is rewritten with the
/// new data. This file is reloaded on startup so restarts don't forget live sessions.
#[derive(Default, Debug, Clone)]
#[allow(clippy::module_name_repetitions)]
pub struct FileSessionStore {
    sessions: InMemorySessionStore,
    path: String,
}

impl FileSessionStore {
    /// Save the state of the session store as JSON to the store's configured path, or return an
    /// Error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidJSON`] if a session can't be serialized to JSON.
    ///
    /// Returns [`Error::IO`] if the serialized state can't be written to the backing file path.
    pub async fn save(&self) -> Result<(), Error> {
        let data = serde_json::to_string_pretty(&self.sessions)?;
        let mut output_file = File::create(&self.path).await?;
        output_file.write_all(data.as_bytes()).await?;
        output_file.flush().await?;
        Ok(())
    }

    /// Load a [`FileSessionStore`] from the JSON state located at the given path, creating an
    /// empty state file when none exists yet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidJSON`] if the JSON state file is invalid.
    ///
    /// Returns [`Error::IO`] if the path can't be opened or read.
    pub async fn try_from_file(p: &str) -> Result<Self, Error> {
        let contents = match File::open(p).await {
            Ok(mut f) => {
                let mut buf = vec![];
                f.read_to_end(&mut buf).await?;
                buf
            }
            Err(err) => match err.kind() {
                ErrorKind::NotFound => Self::write_empty_state(File::create(&p).await?).await?,
                _ => return Err(Error::IO(err)),
            },
        };

        let sessions: InMemorySessionStore = serde_json::from_slice(&contents)?;
        tracing::debug!("loaded {} sessions from {p}", sessions.len());
        Ok(Self {
            path: p.to_string(),
            sessions,
        })
    }

    async fn write_empty_state(mut f: File) -> io::Result<Vec<u8>> {
        let default_data = serde_json::to_string_pretty(&InMemorySessionStore::default())?;
        let default_bytes = default_data.as_bytes();
        f.write_all(default_bytes).await?;
        f.flush().await?;
        Ok(default_bytes.to_vec())
    }
}

#[async_trait::async_trait]
impl SessionStore for FileSessionStore {
    async fn get_by_hostname(&self, hostname: &str) -> Result<Option<Session>, Error> {
        self.sessions.get_by_hostname(hostname).await
    }

    async fn upsert(&mut self, session: Session) -> Result<Vec<Session>, Error> {
        let replaced = self.sessions.upsert(session).await?;
        self.save().await?;
        Ok(replaced)
    }

    async fn remove(&mut self, session_id: &str) -> Result<Option<Session>, Error> {
        let removed = self.sessions.remove(session_id).await?;
        if removed.is_some() {
            self.save().await?;
        }
        Ok(removed)
    }

    async fn delete_expired(&mut self, now: OffsetDateTime) -> Result<usize, Error> {
        let count = self.sessions.delete_expired(now).await?;
        if count > 0 {
            self.save().await?;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::test_support::session;
    use time::Duration;

    fn temp_path(name: &str) -> String {
        std::env::temp_dir()
            .join(format!("tunneldns-sessions-{}-{name}.json", std::process::id()))
            .to_string_lossy()
            .into_owned()
    }

    #[tokio::test]
    async fn creates_missing_state_file() {
        let path = temp_path("fresh");
        let _ = tokio::fs::remove_file(&path).await;

        let store = FileSessionStore::try_from_file(&path).await.unwrap();
        assert!(store.sessions.is_empty());
        assert!(tokio::fs::metadata(&path).await.is_ok());
        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn state_survives_reload() {
        let path = temp_path("reload");
        let _ = tokio::fs::remove_file(&path).await;

        let mut store = FileSessionStore::try_from_file(&path).await.unwrap();
        store
            .upsert(session("s1", "my-app-e1", "203.0.113.10", Duration::hours(1)))
            .await
            .unwrap();
        store
            .upsert(session("s2", "other-e2", "203.0.113.11", Duration::hours(1)))
            .await
            .unwrap();
        store.remove("s2").await.unwrap();

        let reloaded = FileSessionStore::try_from_file(&path).await.unwrap();
        let found = reloaded.get_by_hostname("my-app-e1").await.unwrap().unwrap();
        assert_eq!(found, store.get_by_hostname("my-app-e1").await.unwrap().unwrap());
        assert_eq!(reloaded.get_by_hostname("other-e2").await.unwrap(), None);
        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn invalid_state_file_is_rejected() {
        let path = temp_path("invalid");
        tokio::fs::write(&path, "[1, 2").await.unwrap();
        assert!(matches!(
            FileSessionStore::try_from_file(&path).await,
            Err(Error::InvalidJSON(_))
        ));
        tokio::fs::remove_file(&path).await.unwrap();
    }
}
