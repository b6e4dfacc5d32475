//! tunneldns
//!
//! An authoritative DNS server for dynamically provisioned tunnel hostnames.
//!
//! Tunnel hostnames come in two schemes. Legacy `{guid}.{zone}` names all resolve to one static
//! ingress address. New `{address}-{proxy entry id}.{zone}` names resolve to the ingress address
//! of the proxy entry the session runs on, looked up in a [session cache][cache], then a
//! [session store][session], then a static [proxy entry map][proxy_map].
//!
//! The server also answers [RFC-8555][RFC-8555] [DNS-01] challenges at
//! `_acme-challenge.{zone}` so wildcard certificates can be issued for the tunnel zones.
//!
//! [RFC-8555]: https://www.rfc-editor.org/rfc/rfc8555
//! [DNS-01]: https://www.rfc-editor.org/rfc/rfc8555#section-8.4
//!
#![warn(clippy::pedantic)]

pub mod acme;
pub mod api;
pub mod cache;
pub mod config;
pub mod dns;
pub mod error;
pub mod proxy_map;
pub mod session;

pub use acme::{FileAcmeTokens, InMemoryAcmeTokens};
pub use api::new as new_http;
pub use cache::SessionCache;
pub use config::{Config, Shared};
pub use dns::new as new_dns;
pub use proxy_map::ProxyEntryMap;
pub use session::{FileSessionStore, InMemorySessionStore};
