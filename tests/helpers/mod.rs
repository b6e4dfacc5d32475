#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use trust_dns_proto::op::{Message, Query};
use trust_dns_proto::rr::{Name, RData, RecordType};
use tunneldns::acme::DynAcmeTokenSource;
use tunneldns::dns::Handler;
use tunneldns::error::Error;
use tunneldns::session::events::SessionEvents;
use tunneldns::session::{DynSessionStore, Session, SessionStore};
use tunneldns::{Config, InMemoryAcmeTokens, ProxyEntryMap, SessionCache};

/// A session store that counts lookups and can be told to fail.
#[derive(Clone, Default)]
pub struct MockSessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    call_count: Arc<AtomicU64>,
    should_fail: Arc<RwLock<bool>>,
}

impl MockSessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub async fn set_should_fail(&self, fail: bool) {
        *self.should_fail.write().await = fail;
    }

    pub async fn add_session(&self, hostname: &str, ip_address: &str) {
        let now = OffsetDateTime::now_utc();
        self.sessions.write().await.insert(
            hostname.to_string(),
            Session {
                session_id: format!("session-{hostname}"),
                hostname: hostname.to_string(),
                ip_address: ip_address.to_string(),
                created_at: now,
                expires_at: now + time::Duration::hours(1),
            },
        );
    }
}

#[async_trait]
impl SessionStore for MockSessionStore {
    async fn get_by_hostname(&self, hostname: &str) -> Result<Option<Session>, Error> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if *self.should_fail.read().await {
            return Err(Error::IO(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "session store unavailable",
            )));
        }
        Ok(self.sessions.read().await.get(hostname).cloned())
    }

    async fn upsert(&mut self, session: Session) -> Result<Vec<Session>, Error> {
        let mut sessions = self.sessions.write().await;
        let same_id: Vec<String> = sessions
            .values()
            .filter(|s| s.session_id == session.session_id && s.hostname != session.hostname)
            .map(|s| s.hostname.clone())
            .collect();
        let mut replaced: Vec<Session> = same_id
            .iter()
            .filter_map(|hostname| sessions.remove(hostname))
            .collect();
        replaced.extend(sessions.insert(session.hostname.clone(), session));
        Ok(replaced)
    }

    async fn remove(&mut self, session_id: &str) -> Result<Option<Session>, Error> {
        let mut sessions = self.sessions.write().await;
        let hostname = sessions
            .values()
            .find(|s| s.session_id == session_id)
            .map(|s| s.hostname.clone());
        Ok(hostname.and_then(|h| sessions.remove(&h)))
    }

    async fn delete_expired(&mut self, now: OffsetDateTime) -> Result<usize, Error> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at >= now);
        Ok(before - sessions.len())
    }
}

pub struct TestServer {
    pub handler: Handler,
    pub cache: Arc<SessionCache>,
    pub store: MockSessionStore,
    pub proxy_map: Arc<ProxyEntryMap>,
    pub events: SessionEvents,
}

/// The default config plus `e1 -> 203.0.113.10` and two ACME tokens.
pub fn test_config() -> Config {
    let mut config = Config {
        entry_ip_address_map: HashMap::from([("e1".to_string(), "203.0.113.10".to_string())]),
        ..Config::default()
    };
    config.acme.challenge_1 = Some("LPsIwTo7o8BoG0-vjCyGQGBWSVIPxI-i_X336eUOQZo".to_string());
    config.acme.challenge_2 = Some("Q3J5cHRvZ3JhcGhpY2FsbHktcmFuZG9tLXRva2VuISE".to_string());
    config
}

pub fn test_server(config: Config) -> TestServer {
    let config = Arc::new(config);
    let cache = Arc::new(SessionCache::new(&config.session_cache));
    let store = MockSessionStore::new();
    let dyn_store: DynSessionStore = Arc::new(RwLock::new(store.clone()));
    let proxy_map = Arc::new(ProxyEntryMap::new(&config.entry_ip_address_map));
    let tokens: DynAcmeTokenSource = Arc::new(InMemoryAcmeTokens::from_config(
        &config.acme,
        config.acme_ttl(),
    ));
    let events = SessionEvents::new(
        config.clone(),
        dyn_store.clone(),
        proxy_map.clone(),
        cache.clone(),
    );
    let handler = Handler::new(config, cache.clone(), dyn_store, proxy_map.clone(), tokens);
    TestServer {
        handler,
        cache,
        store,
        proxy_map,
        events,
    }
}

pub fn query_bytes(id: u16, name: &str, record_type: RecordType) -> Vec<u8> {
    let mut message = Message::new();
    message
        .set_id(id)
        .set_recursion_desired(true)
        .add_query(Query::query(Name::from_ascii(name).unwrap(), record_type));
    message.to_vec().unwrap()
}

pub async fn ask(server: &TestServer, name: &str, record_type: RecordType) -> Message {
    let reply = server
        .handler
        .handle_request(&query_bytes(0x2A2A, name, record_type))
        .await;
    Message::from_vec(&reply).unwrap()
}

pub fn a_answers(message: &Message) -> Vec<(Ipv4Addr, u32)> {
    message
        .answers()
        .iter()
        .filter_map(|record| match record.data() {
            Some(RData::A(ip)) => Some((*ip, record.ttl())),
            _ => None,
        })
        .collect()
}

pub fn txt_answers(message: &Message) -> Vec<(String, u32)> {
    message
        .answers()
        .iter()
        .filter_map(|record| match record.data() {
            Some(RData::TXT(txt)) => Some((
                txt.txt_data()
                    .iter()
                    .map(|s| String::from_utf8_lossy(s).into_owned())
                    .collect::<String>(),
                record.ttl(),
            )),
            _ => None,
        })
        .collect()
}

pub const ONE_MINUTE: Duration = Duration::from_secs(60);
