//! Authoritative DNS server for tunnel hostnames.
//!
//! Queries arrive as UDP datagrams, are decoded by [`packet`], answered by
//! [`handlers::Handler`] and encoded back onto the wire. Only the first question of a query is
//! answered, and only for names inside one of the
//! [`Config::authoritative_zones`][crate::config::Config::authoritative_zones]. Anything else
//! is `REFUSED` without the authoritative flag.
//!
//! # A
//!
//! Names are classified with the two hostname schemes in [`pattern`].
//!
//! Legacy hostnames (`{guid}.{zone}`) answer with
//! [`LegacyModeConfig::static_ip`][crate::config::LegacyModeConfig::static_ip] whenever legacy
//! mode is enabled. E.g. with the default config:
//!
//! ```bash
//! ❯ dig @127.0.0.1 -p 5353 +short 2a3be342-60f3-48a9-a2c5-e7359e34959a.tunnel4.com A
//! 203.0.113.42
//! ```
//!
//! New hostnames (`{address}-{proxy entry id}.{zone}`) resolve through three tiers, stopping at
//! the first hit:
//!
//! 1. the [`SessionCache`][crate::cache::SessionCache], keyed by `{address}-{proxy entry id}`,
//! 2. the [`SessionStore`][crate::session::SessionStore], using the same key as a hostname,
//! 3. the [`ProxyEntryMap`][crate::proxy_map::ProxyEntryMap], keyed by the proxy entry id.
//!
//! Answers from the last two tiers are written back to the cache. When nothing matches the
//! reply is an authoritative `NXDOMAIN`. A failing session store counts as a miss, so an outage
//! degrades to the static map rather than to `SERVFAIL`.
//!
//! E.g. with config:
//! ```json
//! {
//!   "entry_ip_address_map": { "e1": "203.0.113.10" },
//!   ...
//! }
//! ```
//!
//! ```bash
//! ❯ dig @127.0.0.1 -p 5353 +short my-app-e1.tunnel4.com A
//! 203.0.113.10
//! ```
//!
//! # TXT
//!
//! `_acme-challenge.{zone}` answers with one record per ACME token from the configured
//! [`AcmeTokenSource`][crate::acme::AcmeTokenSource]. Every other TXT name, and every other
//! record type, is `NXDOMAIN`.
//!
//! ```bash
//! ❯ dig @127.0.0.1 -p 5353 +short _acme-challenge.tunnel4.com TXT
//! "LPsIwTo7o8BoG0-vjCyGQGBWSVIPxI-i_X336eUOQZo"
//! ```

pub mod handlers;
pub mod packet;
pub mod pattern;
pub mod server;

pub use handlers::Handler;
pub use server::{new, Server};
