use crate::acme;
use crate::error::Error;
use crate::session::{DynSessionStore, FileSessionStore, InMemorySessionStore};
use ipnetwork::IpNetwork;
use lazy_static::lazy_static;
use serde::Deserialize;
use serde_with::{serde_as, DurationSeconds};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use trust_dns_proto::rr::Name;

pub type Shared = Arc<Config>;

#[serde_as]
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    pub dns_udp_bind_addr: SocketAddr,
    pub api_bind_addr: SocketAddr,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub api_timeout: Duration,
    /// Zones this server answers for. Lowercase, without a trailing dot, once loaded.
    pub authoritative_zones: Vec<String>,
    pub response_ttl_seconds: ResponseTtls,
    pub legacy_mode: LegacyModeConfig,
    /// Proxy entry id to IPv4 address, the last resolution tier for new scheme hostnames.
    pub entry_ip_address_map: HashMap<String, String>,
    pub acme: AcmeConfig,
    pub session_cache: SessionCacheConfig,
    pub session_store: SessionStoreConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            dns_udp_bind_addr: SocketAddr::from(([0, 0, 0, 0], 53)),
            api_bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            api_timeout: Duration::from_secs(10),
            authoritative_zones: vec!["tunnel4.com".to_string()],
            response_ttl_seconds: ResponseTtls::default(),
            legacy_mode: LegacyModeConfig::default(),
            entry_ip_address_map: HashMap::default(),
            acme: AcmeConfig::default(),
            session_cache: SessionCacheConfig::default(),
            session_store: SessionStoreConfig::default(),
        }
    }
}

/// Answer TTLs in seconds.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct ResponseTtls {
    pub legacy_a: u32,
    pub new_a: u32,
    /// Used for ACME TXT answers when [`AcmeConfig::ttl`] is unset.
    pub txt: u32,
    /// Parsed but not applied: NXDOMAIN and REFUSED answers carry no SOA record, so there is
    /// nothing to attach a negative caching TTL to.
    pub negative: u32,
}

impl Default for ResponseTtls {
    fn default() -> Self {
        ResponseTtls {
            legacy_a: 300,
            new_a: 30,
            txt: 60,
            negative: 5,
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LegacyModeConfig {
    pub enabled: bool,
    pub static_ip: Ipv4Addr,
}

impl Default for LegacyModeConfig {
    fn default() -> Self {
        LegacyModeConfig {
            enabled: true,
            static_ip: Ipv4Addr::new(203, 0, 113, 42),
        }
    }
}

#[serde_as]
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct AcmeConfig {
    pub challenge_1: Option<String>,
    pub challenge_2: Option<String>,
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    pub ttl: Option<Duration>,
    /// When set, tokens are read from this JSON file on every lookup instead of from
    /// `challenge_1`/`challenge_2`.
    pub tokens_path: Option<String>,
}

impl AcmeConfig {
    /// The configured tokens in order, skipping blank ones.
    #[must_use]
    pub fn tokens(&self) -> Vec<String> {
        [&self.challenge_1, &self.challenge_2]
            .into_iter()
            .flatten()
            .filter(|t| !t.trim().is_empty())
            .cloned()
            .collect()
    }
}

#[serde_as]
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SessionCacheConfig {
    pub enabled: bool,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub sliding_expiration: Duration,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub absolute_expiration: Duration,
    pub max_entries: usize,
}

impl Default for SessionCacheConfig {
    fn default() -> Self {
        SessionCacheConfig {
            enabled: true,
            sliding_expiration: Duration::from_secs(5 * 60),
            absolute_expiration: Duration::from_secs(60 * 60),
            max_entries: 10_000,
        }
    }
}

#[serde_as]
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SessionStoreConfig {
    /// JSON state file for sessions. Sessions only live in memory when unset.
    pub state_path: Option<String>,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub cleanup_interval: Duration,
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        SessionStoreConfig {
            state_path: None,
            cleanup_interval: Duration::from_secs(5 * 60),
        }
    }
}

lazy_static! {
    // NOTE(XXX): Once the "ip" feature has stabilized we can use Ipv6Addr.is_unique_local[0].
    //            Presently this feature is unstable so we home-roll. See also RFC 4193[1].
    // [0]: https://doc.rust-lang.org/std/net/struct.Ipv6Addr.html#method.is_unique_local
    // [1]: https://www.rfc-editor.org/rfc/rfc4193.html
    static ref IPV6_UNIQUE_LOCAL_NETWORK: IpNetwork = IpNetwork::from_str("fc00::/7").unwrap();
}

impl Config {
    /// Load and validate a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IO`] when the file can't be read, [`Error::InvalidJSON`] when it doesn't
    /// parse, and the errors of [`Config::try_from_reader`] otherwise.
    pub fn try_from_file(p: impl AsRef<Path>) -> Result<Self, Error> {
        let f = File::open(p)?;
        Self::try_from_reader(BufReader::new(f))
    }

    /// Parse and validate JSON config from `reader`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidJSON`] for bad JSON, [`Error::InsecureAPIBind`] for a public API
    /// bind address, [`Error::DNSError`] for a zone that isn't a valid name and
    /// [`Error::InvalidConfig`] for other unusable values.
    pub fn try_from_reader(reader: impl Read) -> Result<Self, Error> {
        let mut conf: Config = serde_json::from_reader(reader)?;
        conf.normalize_zones()?;
        conf.bind_addr_is_secure()?;
        if conf.session_cache.max_entries == 0 {
            return Err(Error::InvalidConfig(
                "session_cache.max_entries must be at least 1".to_string(),
            ));
        }
        conf.warn_invalid_tokens();
        Ok(conf)
    }

    /// TTL for ACME TXT answers: `acme.ttl`, or `response_ttl_seconds.txt` when that is unset.
    #[must_use]
    pub fn acme_ttl(&self) -> Duration {
        self.acme
            .ttl
            .unwrap_or_else(|| Duration::from_secs(self.response_ttl_seconds.txt.into()))
    }

    /// Open the configured session store: file-backed when `session_store.state_path` is set,
    /// in-memory otherwise.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`FileSessionStore::try_from_file`].
    pub async fn session_store(&self) -> Result<DynSessionStore, Error> {
        Ok(match &self.session_store.state_path {
            Some(path) => {
                tracing::info!("loading session state from {path}");
                Arc::new(RwLock::new(FileSessionStore::try_from_file(path).await?))
            }
            None => {
                tracing::warn!("no session state path configured, sessions are not durable");
                Arc::new(RwLock::new(InMemorySessionStore::default()))
            }
        })
    }

    /// Whether `hostname` is one of the authoritative zones or a subdomain of one.
    #[must_use]
    pub fn is_authoritative(&self, hostname: &str) -> bool {
        let hostname = normalize_name(hostname);
        self.authoritative_zones.iter().any(|zone| {
            hostname == *zone
                || hostname
                    .strip_suffix(zone.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }

    /// Whether `hostname` is exactly `_acme-challenge.{zone}` for an authoritative zone.
    #[must_use]
    pub fn is_acme_challenge(&self, hostname: &str) -> bool {
        normalize_name(hostname)
            .strip_prefix("_acme-challenge.")
            .is_some_and(|zone| self.authoritative_zones.iter().any(|z| z == zone))
    }

    /// Lowercase `hostname`, trim a trailing dot and drop an authoritative zone suffix, giving
    /// the session hostname form used as a resolution key.
    #[must_use]
    pub fn session_hostname(&self, hostname: &str) -> String {
        let hostname = normalize_name(hostname);
        self.authoritative_zones
            .iter()
            .find_map(|zone| {
                hostname
                    .strip_suffix(zone.as_str())
                    .and_then(|prefix| prefix.strip_suffix('.'))
                    .filter(|prefix| !prefix.is_empty())
            })
            .unwrap_or(&hostname)
            .to_string()
    }

    fn normalize_zones(&mut self) -> Result<(), Error> {
        if self.authoritative_zones.is_empty() {
            return Err(Error::InvalidConfig(
                "at least one authoritative zone is required".to_string(),
            ));
        }
        for zone in &mut self.authoritative_zones {
            let normalized = normalize_name(zone);
            if normalized.is_empty() {
                return Err(Error::InvalidConfig(
                    "authoritative zones can't be empty".to_string(),
                ));
            }
            Name::from_ascii(&normalized)?;
            *zone = normalized;
        }
        Ok(())
    }

    fn warn_invalid_tokens(&self) {
        for token in self.acme.tokens() {
            if let Err(err) = acme::valid_dns01(&token) {
                tracing::warn!("configured ACME token is not a DNS-01 digest: {err}");
            }
        }
    }

    fn bind_addr_is_secure(&self) -> Result<(), Error> {
        match self.api_bind_addr {
            SocketAddr::V4(v4_addr) => {
                let ip = v4_addr.ip();
                if !ip.is_loopback() && !ip.is_private() {
                    return Err(Error::InsecureAPIBind(IpAddr::V4(*ip)));
                }
                Ok(())
            }
            SocketAddr::V6(v6_addr) => {
                let ip = v6_addr.ip();
                if !ip.is_loopback() && !IPV6_UNIQUE_LOCAL_NETWORK.contains(IpAddr::V6(*ip)) {
                    return Err(Error::InsecureAPIBind(IpAddr::V6(*ip)));
                }
                Ok(())
            }
        }
    }
}

fn normalize_name(name: &str) -> String {
    name.trim_end_matches('.').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionStore;

    fn load(json: &str) -> Result<Config, Error> {
        Config::try_from_reader(json.as_bytes())
    }

    #[test]
    fn empty_object_gives_defaults() {
        let config = load("{}").unwrap();
        assert_eq!(config.authoritative_zones, vec!["tunnel4.com"]);
        assert_eq!(config.response_ttl_seconds, ResponseTtls::default());
        assert_eq!(config.response_ttl_seconds.legacy_a, 300);
        assert_eq!(config.response_ttl_seconds.new_a, 30);
        assert!(config.legacy_mode.enabled);
        assert_eq!(config.legacy_mode.static_ip, Ipv4Addr::new(203, 0, 113, 42));
        assert_eq!(config.session_cache.max_entries, 10_000);
        assert_eq!(
            config.session_cache.sliding_expiration,
            Duration::from_secs(300)
        );
        assert_eq!(config.session_store.state_path, None);
        assert_eq!(config.acme.ttl, None);
    }

    #[test]
    fn parses_full_config() {
        let config = load(
            r#"{
                "dns_udp_bind_addr": "0.0.0.0:5353",
                "api_bind_addr": "10.0.0.5:8080",
                "api_timeout": 3,
                "authoritative_zones": ["Tunnel4.COM.", "example.net"],
                "response_ttl_seconds": { "new_a": 15 },
                "legacy_mode": { "enabled": false, "static_ip": "198.51.100.1" },
                "entry_ip_address_map": { "e1": "203.0.113.10" },
                "acme": { "challenge_1": "one", "challenge_2": " ", "ttl": 120 },
                "session_cache": { "sliding_expiration": 30, "max_entries": 5 },
                "session_store": { "state_path": "/tmp/sessions.json", "cleanup_interval": 60 }
            }"#,
        )
        .unwrap();
        assert_eq!(config.authoritative_zones, vec!["tunnel4.com", "example.net"]);
        assert_eq!(config.api_timeout, Duration::from_secs(3));
        assert_eq!(config.response_ttl_seconds.new_a, 15);
        assert_eq!(config.response_ttl_seconds.legacy_a, 300);
        assert!(!config.legacy_mode.enabled);
        assert_eq!(config.entry_ip_address_map["e1"], "203.0.113.10");
        assert_eq!(config.acme.tokens(), vec!["one"]);
        assert_eq!(config.acme.ttl, Some(Duration::from_secs(120)));
        assert_eq!(config.session_cache.max_entries, 5);
        assert_eq!(
            config.session_cache.absolute_expiration,
            Duration::from_secs(3600)
        );
        assert_eq!(
            config.session_store.cleanup_interval,
            Duration::from_secs(60)
        );
    }

    #[test]
    fn rejects_public_api_bind() {
        assert!(matches!(
            load(r#"{ "api_bind_addr": "8.8.8.8:8080" }"#),
            Err(Error::InsecureAPIBind(_))
        ));
        assert!(matches!(
            load(r#"{ "api_bind_addr": "[2001:db8::1]:8080" }"#),
            Err(Error::InsecureAPIBind(_))
        ));
        assert!(load(r#"{ "api_bind_addr": "[fd00::1]:8080" }"#).is_ok());
    }

    #[test]
    fn rejects_unusable_values() {
        assert!(matches!(
            load(r#"{ "authoritative_zones": [] }"#),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            load(r#"{ "authoritative_zones": ["."] }"#),
            Err(Error::InvalidConfig(_))
        ));
        let long_label = "a".repeat(64);
        assert!(matches!(
            load(&format!(r#"{{ "authoritative_zones": ["{long_label}.com"] }}"#)),
            Err(Error::DNSError(_))
        ));
        assert!(matches!(
            load(r#"{ "session_cache": { "max_entries": 0 } }"#),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(load("{"), Err(Error::InvalidJSON(_))));
    }

    #[test]
    fn authoritative_zone_check() {
        let config = load(r#"{ "authoritative_zones": ["tunnel4.com"] }"#).unwrap();
        assert!(config.is_authoritative("tunnel4.com"));
        assert!(config.is_authoritative("TUNNEL4.com."));
        assert!(config.is_authoritative("my-app-e1.tunnel4.com"));
        assert!(!config.is_authoritative("example.com"));
        assert!(!config.is_authoritative("eviltunnel4.com"));
        assert!(!config.is_authoritative("tunnel4.com.evil.org"));
    }

    #[test]
    fn acme_challenge_name_is_exact() {
        let config = load("{}").unwrap();
        assert!(config.is_acme_challenge("_acme-challenge.tunnel4.com"));
        assert!(config.is_acme_challenge("_ACME-Challenge.Tunnel4.com."));
        assert!(!config.is_acme_challenge("_acme-challenge.sub.tunnel4.com"));
        assert!(!config.is_acme_challenge("x._acme-challenge.tunnel4.com"));
    }

    #[test]
    fn acme_ttl_falls_back_to_txt_ttl() {
        let config = load(r#"{ "response_ttl_seconds": { "txt": 90 } }"#).unwrap();
        assert_eq!(config.acme_ttl(), Duration::from_secs(90));
        let config = load(r#"{ "acme": { "ttl": 15 } }"#).unwrap();
        assert_eq!(config.acme_ttl(), Duration::from_secs(15));
    }

    #[tokio::test]
    async fn in_memory_session_store_without_path() {
        let store = load("{}").unwrap().session_store().await.unwrap();
        assert_eq!(
            store.read().await.get_by_hostname("my-app-e1").await.unwrap(),
            None
        );
    }

    #[test]
    fn session_hostname_strips_zone() {
        let config = load("{}").unwrap();
        assert_eq!(config.session_hostname("My-App-e1.tunnel4.com."), "my-app-e1");
        assert_eq!(config.session_hostname("my-app-e1"), "my-app-e1");
        assert_eq!(config.session_hostname("tunnel4.com"), "tunnel4.com");
        assert_eq!(config.session_hostname("a.example.org"), "a.example.org");
    }
}
