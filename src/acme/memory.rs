use crate::acme::AcmeTokenSource;
use crate::config::AcmeConfig;
use crate::error::Error;
use arc_swap::ArcSwap;
use std::sync::Arc;
use std::time::Duration;

/// Tokens taken from the config file. [`InMemoryAcmeTokens::replace`] swaps them atomically
/// when the config is reloaded.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct InMemoryAcmeTokens {
    tokens: ArcSwap<Vec<String>>,
    ttl: Duration,
}

impl InMemoryAcmeTokens {
    #[must_use]
    pub fn new(tokens: Vec<String>, ttl: Duration) -> Self {
        InMemoryAcmeTokens {
            tokens: ArcSwap::from_pointee(tokens),
            ttl,
        }
    }

    #[must_use]
    pub fn from_config(config: &AcmeConfig, ttl: Duration) -> Self {
        Self::new(config.tokens(), ttl)
    }

    pub fn replace(&self, tokens: Vec<String>) {
        tracing::info!(count = tokens.len(), "ACME tokens replaced");
        self.tokens.store(Arc::new(tokens));
    }
}

#[async_trait::async_trait]
impl AcmeTokenSource for InMemoryAcmeTokens {
    async fn tokens(&self) -> Result<Vec<String>, Error> {
        Ok(self.tokens.load().as_ref().clone())
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn yields_configured_tokens_in_order() {
        let config = AcmeConfig {
            challenge_1: Some("first".to_string()),
            challenge_2: Some("second".to_string()),
            ..AcmeConfig::default()
        };
        let source = InMemoryAcmeTokens::from_config(&config, Duration::from_secs(60));
        assert_eq!(source.tokens().await.unwrap(), vec!["first", "second"]);
        assert_eq!(source.ttl(), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn skips_blank_tokens() {
        let config = AcmeConfig {
            challenge_1: Some(String::new()),
            challenge_2: Some("second".to_string()),
            ..AcmeConfig::default()
        };
        let source = InMemoryAcmeTokens::from_config(&config, Duration::from_secs(60));
        assert_eq!(source.tokens().await.unwrap(), vec!["second"]);
    }

    #[tokio::test]
    async fn replace_swaps_tokens() {
        let source = InMemoryAcmeTokens::new(vec!["old".to_string()], Duration::from_secs(60));
        source.replace(vec![]);
        assert!(source.tokens().await.unwrap().is_empty());
        source.replace(vec!["new".to_string()]);
        assert_eq!(source.tokens().await.unwrap(), vec!["new"]);
    }
}
