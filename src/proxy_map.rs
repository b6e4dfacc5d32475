//! Proxy entry id to ingress IPv4 address map.
//!
//! The last resolution tier for new scheme hostnames, and the source of the IP address recorded
//! for a session when it is created. Loaded from
//! [`Config::entry_ip_address_map`][crate::config::Config::entry_ip_address_map] and swapped
//! wholesale on reload, so readers never block.

use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug)]
pub struct ProxyEntryMap {
    entries: ArcSwap<HashMap<String, String>>,
}

impl ProxyEntryMap {
    #[must_use]
    pub fn new(entries: &HashMap<String, String>) -> Self {
        ProxyEntryMap {
            entries: ArcSwap::from_pointee(normalize(entries)),
        }
    }

    /// The IP address for `proxy_entry_id`, matched case-insensitively.
    #[must_use]
    pub fn get(&self, proxy_entry_id: &str) -> Option<String> {
        self.entries
            .load()
            .get(&proxy_entry_id.to_ascii_lowercase())
            .cloned()
    }

    /// Swap in a new set of entries.
    pub fn replace(&self, entries: &HashMap<String, String>) {
        let entries = normalize(entries);
        tracing::info!("proxy entry map reloaded with {} entries", entries.len());
        self.entries.store(Arc::new(entries));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn normalize(entries: &HashMap<String, String>) -> HashMap<String, String> {
    entries
        .iter()
        .map(|(id, ip)| (id.to_ascii_lowercase(), ip.trim().to_string()))
        .collect()
}
