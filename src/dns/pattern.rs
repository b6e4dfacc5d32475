//! Tunnel hostname classification.
//!
//! Two hostname schemes are served side by side:
//!
//! * **Legacy**: `{guid}.{domain}`, e.g. `2a3be342-60f3-48a9-a2c5-e7359e34959a.tunnel4.com`.
//!   Every legacy hostname resolves to one static address.
//! * **New**: `{address}-{proxy entry id}.{domain}`, e.g. `my-app-e1.tunnel4.com`. The address
//!   and proxy entry id together name a session; the proxy entry id alone names the ingress
//!   point it runs on.
//!
//! Both `address` and the proxy entry id may contain hyphens. The split between them is the one
//! a leftmost-first regular expression engine picks for
//! `(?P<address>[a-z0-9-]{3,128})-(?P<proxy_entry_id>[a-z0-9][a-z0-9-]{0,31})`: the longest
//! address that still leaves a valid proxy entry id. So `a-b-c-d` splits as `a-b-c` / `d`, while
//! `abc-xy-` (where a trailing hyphen can't start an id) splits as `abc` / `xy-`.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref LEGACY_PATTERN: Regex = Regex::new(
        r"(?i)^(?P<guid>[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12})\.(?P<domain>[-a-z0-9]+(?:\.[-a-z0-9]+)*)$"
    )
    .unwrap();
    static ref NEW_PATTERN: Regex = Regex::new(
        r"(?i)^(?P<address>[a-z0-9-]{3,128})-(?P<proxy_entry_id>[a-z0-9][a-z0-9-]{0,31})\.(?P<domain>[-a-z0-9]+(?:\.[-a-z0-9]+)*)$"
    )
    .unwrap();
}

/// A successful classification. Every field keeps the casing of the input hostname.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainMatch {
    Legacy {
        guid: String,
        domain: String,
    },
    New {
        address: String,
        proxy_entry_id: String,
        domain: String,
    },
}

impl DomainMatch {
    #[must_use]
    pub fn domain(&self) -> &str {
        match self {
            DomainMatch::Legacy { domain, .. } | DomainMatch::New { domain, .. } => domain,
        }
    }

    /// The session cache key and session store hostname for a new scheme match,
    /// `{address}-{proxy entry id}` in lowercase.
    #[must_use]
    pub fn resolution_key(&self) -> Option<String> {
        match self {
            DomainMatch::New {
                address,
                proxy_entry_id,
                ..
            } => Some(format!("{address}-{proxy_entry_id}").to_ascii_lowercase()),
            DomainMatch::Legacy { .. } => None,
        }
    }
}

/// The two hostname matchers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    Legacy,
    New,
}

impl Pattern {
    /// Classify `hostname` (without a trailing dot). Matching is case-insensitive.
    #[must_use]
    pub fn try_match(self, hostname: &str) -> Option<DomainMatch> {
        if hostname.trim().is_empty() {
            return None;
        }
        match self {
            Pattern::Legacy => {
                let caps = LEGACY_PATTERN.captures(hostname)?;
                Some(DomainMatch::Legacy {
                    guid: caps["guid"].to_string(),
                    domain: caps["domain"].to_string(),
                })
            }
            Pattern::New => {
                let caps = NEW_PATTERN.captures(hostname)?;
                Some(DomainMatch::New {
                    address: caps["address"].to_string(),
                    proxy_entry_id: caps["proxy_entry_id"].to_string(),
                    domain: caps["domain"].to_string(),
                })
            }
        }
    }
}
