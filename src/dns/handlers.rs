use crate::acme::DynAcmeTokenSource;
use crate::cache::SessionCache;
use crate::config::Shared;
use crate::dns::packet::{peek_header, Flags, Message, ResourceRecord, HEADER_LEN};
use crate::dns::pattern::{DomainMatch, Pattern};
use crate::proxy_map::ProxyEntryMap;
use crate::session::DynSessionStore;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use trust_dns_proto::op::ResponseCode;
use trust_dns_proto::rr::RecordType;

/// Where a new scheme address came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    Cache,
    Store,
    ProxyMap,
}

impl Tier {
    fn as_str(self) -> &'static str {
        match self {
            Tier::Cache => "cache",
            Tier::Store => "session store",
            Tier::ProxyMap => "proxy entry map",
        }
    }
}

/// Turns raw query datagrams into raw response datagrams.
#[derive(Clone)]
pub struct Handler {
    config: Shared,
    cache: Arc<SessionCache>,
    session_store: DynSessionStore,
    proxy_map: Arc<ProxyEntryMap>,
    acme_tokens: DynAcmeTokenSource,
}

impl Handler {
    #[must_use]
    pub fn new(
        config: Shared,
        cache: Arc<SessionCache>,
        session_store: DynSessionStore,
        proxy_map: Arc<ProxyEntryMap>,
        acme_tokens: DynAcmeTokenSource,
    ) -> Self {
        Handler {
            config,
            cache,
            session_store,
            proxy_map,
            acme_tokens,
        }
    }

    /// Answer one query datagram. Always produces a reply: packets that can't be parsed, and
    /// replies that can't be encoded, turn into SERVFAIL.
    pub async fn handle_request(&self, raw: &[u8]) -> Vec<u8> {
        let request = match Message::from_bytes(raw) {
            Ok(request) => request,
            Err(err) => {
                error!("unparseable query ({} bytes): {err}", raw.len());
                return parse_failure(raw);
            }
        };

        let response = self.dispatch_request(&request).await;
        match response.to_bytes() {
            Ok(bytes) => bytes,
            Err(err) => {
                error!(id = request.id, "failed to encode response: {err}");
                encode_failure(&request)
            }
        }
    }

    async fn dispatch_request(&self, request: &Message) -> Message {
        // Only the first question is answered.
        let Some(question) = request.questions.first() else {
            debug!(id = request.id, "query without questions");
            return reply(request, ResponseCode::Refused, false, vec![]);
        };

        let name = question.name.trim_end_matches('.');
        let qtype = RecordType::from(question.qtype);
        info!(id = request.id, name, %qtype, "query");

        if !self.config.is_authoritative(name) {
            debug!(name, "refusing query outside authoritative zones");
            return reply(request, ResponseCode::Refused, false, vec![]);
        }

        let answers = match qtype {
            RecordType::A => self.handle_request_a(&question.name, name).await,
            RecordType::TXT => self.handle_request_txt(&question.name, name).await,
            _ => vec![],
        };

        let rcode = if answers.is_empty() {
            ResponseCode::NXDomain
        } else {
            ResponseCode::NoError
        };
        reply(request, rcode, true, answers)
    }

    async fn handle_request_a(&self, owner: &str, name: &str) -> Vec<ResourceRecord> {
        let ttls = self.config.response_ttl_seconds;

        if self.config.legacy_mode.enabled {
            if let Some(DomainMatch::Legacy { guid, .. }) = Pattern::Legacy.try_match(name) {
                debug!(%guid, "legacy hostname");
                return vec![ResourceRecord::a(
                    owner,
                    ttls.legacy_a,
                    self.config.legacy_mode.static_ip,
                )];
            }
        }

        let Some(domain_match) = Pattern::New.try_match(name) else {
            debug!(name, "hostname matches no scheme");
            return vec![];
        };
        let (Some(key), DomainMatch::New { proxy_entry_id, .. }) =
            (domain_match.resolution_key(), &domain_match)
        else {
            return vec![];
        };

        match self.resolve(&key, proxy_entry_id).await {
            Some(ip) => vec![ResourceRecord::a(owner, ttls.new_a, ip)],
            None => {
                debug!(%key, "no address in any tier");
                vec![]
            }
        }
    }

    /// Resolve a new scheme key through the cache, the session store and the proxy entry map,
    /// in that order. Answers from the store or the map are written back to the cache.
    async fn resolve(&self, key: &str, proxy_entry_id: &str) -> Option<Ipv4Addr> {
        if let Some(ip) = self
            .cache
            .get(key)
            .and_then(|value| parse_tier_value(Tier::Cache, key, &value))
        {
            return Some(ip);
        }

        let (tier, ip) = match self.store_lookup(key).await {
            Some(ip) => (Tier::Store, ip),
            None => {
                let value = self.proxy_map.get(proxy_entry_id);
                let ip = value.and_then(|v| parse_tier_value(Tier::ProxyMap, key, &v))?;
                (Tier::ProxyMap, ip)
            }
        };

        debug!(key, %ip, tier = tier.as_str(), "resolved");
        self.cache.insert(key, &ip.to_string());
        Some(ip)
    }

    async fn store_lookup(&self, key: &str) -> Option<Ipv4Addr> {
        let result = self.session_store.read().await.get_by_hostname(key).await;
        match result {
            Ok(Some(session)) => parse_tier_value(Tier::Store, key, &session.ip_address),
            Ok(None) => {
                debug!(key, "no session");
                None
            }
            Err(err) => {
                warn!(key, "session store lookup failed: {err}");
                None
            }
        }
    }

    async fn handle_request_txt(&self, owner: &str, name: &str) -> Vec<ResourceRecord> {
        if !self.config.is_acme_challenge(name) {
            debug!(name, "TXT query for a name other than an ACME challenge");
            return vec![];
        }

        let tokens = match self.acme_tokens.tokens().await {
            Ok(tokens) => tokens,
            Err(err) => {
                warn!("ACME token lookup failed: {err}");
                return vec![];
            }
        };

        let ttl = u32::try_from(self.acme_tokens.ttl().as_secs()).unwrap_or(u32::MAX);
        tokens
            .into_iter()
            .map(|token| ResourceRecord::txt(owner, ttl, token))
            .collect()
    }
}

fn parse_tier_value(tier: Tier, key: &str, value: &str) -> Option<Ipv4Addr> {
    match value.trim().parse() {
        Ok(ip) => Some(ip),
        Err(_) => {
            warn!(key, value, tier = tier.as_str(), "ignoring value that isn't an IPv4 address");
            None
        }
    }
}

fn response_flags(request: Flags, rcode: ResponseCode, authoritative: bool) -> Flags {
    Flags::new(0)
        .with(Flags::QR, true)
        .with(Flags::RD, request.recursion_desired())
        .with(Flags::AA, authoritative)
        .with_response_code(rcode.into())
}

fn reply(
    request: &Message,
    rcode: ResponseCode,
    authoritative: bool,
    answers: Vec<ResourceRecord>,
) -> Message {
    Message {
        id: request.id,
        flags: response_flags(request.flags, rcode, authoritative),
        questions: request.questions.clone(),
        answers,
    }
}

fn parse_failure(raw: &[u8]) -> Vec<u8> {
    let (id, flags) = peek_header(raw);
    header_only(
        id.unwrap_or(0),
        response_flags(
            flags.unwrap_or_default(),
            ResponseCode::ServFail,
            false,
        ),
    )
}

fn encode_failure(request: &Message) -> Vec<u8> {
    let servfail = reply(request, ResponseCode::ServFail, false, vec![]);
    servfail
        .to_bytes()
        .unwrap_or_else(|_| header_only(servfail.id, servfail.flags))
}

fn header_only(id: u16, flags: Flags) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN);
    out.extend_from_slice(&id.to_be_bytes());
    out.extend_from_slice(&flags.bits().to_be_bytes());
    out.resize(HEADER_LEN, 0);
    out
}
