//! A JSON file-backed implementation of the [`AcmeTokenSource`][super::AcmeTokenSource] trait.
//!
//! The file holds `{"challenge_1": "...", "challenge_2": "..."}` and is read on every lookup.
use crate::acme::AcmeTokenSource;
use crate::error::Error;
use serde::Deserialize;
use std::time::Duration;

#[derive(Deserialize, Debug, Default)]
struct TokenFile {
    #[serde(default)]
    challenge_1: Option<String>,
    #[serde(default)]
    challenge_2: Option<String>,
}

#[derive(Debug, Clone)]
#[allow(clippy::module_name_repetitions)]
pub struct FileAcmeTokens {
    path: String,
    ttl: Duration,
}

impl FileAcmeTokens {
    #[must_use]
    pub fn new(path: impl Into<String>, ttl: Duration) -> Self {
        FileAcmeTokens {
            path: path.into(),
            ttl,
        }
    }
}

#[async_trait::async_trait]
impl AcmeTokenSource for FileAcmeTokens {
    /// # Errors
    ///
    /// Returns [`Error::IO`] if the token file can't be read and [`Error::InvalidJSON`] if it
    /// doesn't parse.
    async fn tokens(&self) -> Result<Vec<String>, Error> {
        let contents = tokio::fs::read(&self.path).await?;
        let file: TokenFile = serde_json::from_slice(&contents)?;
        Ok([file.challenge_1, file.challenge_2]
            .into_iter()
            .flatten()
            .filter(|t| !t.trim().is_empty())
            .collect())
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "tunneldns-acme-{}-{name}.json",
            std::process::id()
        ))
    }

    #[tokio::test]
    async fn reads_tokens_on_every_lookup() {
        let path = temp_path("rotate");
        tokio::fs::write(&path, r#"{"challenge_1":"a","challenge_2":"b"}"#)
            .await
            .unwrap();
        let source = FileAcmeTokens::new(path.to_string_lossy(), Duration::from_secs(60));
        assert_eq!(source.tokens().await.unwrap(), vec!["a", "b"]);

        tokio::fs::write(&path, r#"{"challenge_2":"c"}"#).await.unwrap();
        assert_eq!(source.tokens().await.unwrap(), vec!["c"]);
        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn missing_or_invalid_file_is_an_error() {
        let missing = FileAcmeTokens::new(
            temp_path("missing").to_string_lossy(),
            Duration::from_secs(60),
        );
        assert!(matches!(missing.tokens().await, Err(Error::IO(_))));

        let path = temp_path("invalid");
        tokio::fs::write(&path, "not json").await.unwrap();
        let invalid = FileAcmeTokens::new(path.to_string_lossy(), Duration::from_secs(60));
        assert!(matches!(invalid.tokens().await, Err(Error::InvalidJSON(_))));
        tokio::fs::remove_file(&path).await.unwrap();
    }
}
