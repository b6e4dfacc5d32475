//! Error types.

use axum::extract::rejection::JsonRejection;
use std::net::IpAddr;
use trust_dns_proto::error::ProtoError;

/// Error enumerates the possible tunneldns error states.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Returned by [`Message::from_bytes`][crate::dns::packet::Message::from_bytes] when the
    /// packet is shorter than a DNS header, or when reading a field would run past the end of
    /// the buffer.
    #[error("malformed DNS packet: {0}")]
    MalformedPacket(&'static str),

    /// Returned when decoding a name follows more compression pointers than
    /// [`MAX_POINTER_HOPS`][crate::dns::packet::MAX_POINTER_HOPS] allows.
    #[error("too many compression pointer hops in DNS name")]
    CompressionLoop,

    /// Returned when a name can't be written as a sequence of labels: a label is empty, longer
    /// than 63 bytes, or contains a character outside Latin-1.
    #[error("name can't be encoded: \"{0}\"")]
    NameEncoding(String),

    /// Returned when a TXT string is longer than a single character-string can carry.
    #[error("TXT string of {0} bytes exceeds 255 bytes")]
    TxtTooLong(usize),

    /// Returned when the configuration file parses but describes an unusable setup.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Returned when the [`Config::api_bind_addr`][`crate::config::Config::api_bind_addr`] is
    /// not a loopback address, or an address within a private network space. The HTTP API
    /// mutates session state and is only meant for the private network the tunnel control
    /// plane runs on.
    #[error("API bind address ({0}) must be a loopback or private IP")]
    InsecureAPIBind(IpAddr),

    /// Returned when a session event references a proxy entry with no configured IP address.
    #[error("no IP address mapping for proxy entry \"{0}\"")]
    UnknownProxyEntry(String),

    /// Returned when closing a session that the store doesn't know about.
    #[error("session \"{0}\" not found")]
    SessionNotFound(String),

    /// Returned when clients `POST` invalid JSON.
    #[error(transparent)]
    JsonExtractorRejection(#[from] JsonRejection),

    /// Returned when a generic IO error occurs.
    #[error("an IO error occurred")]
    IO(#[from] std::io::Error),

    /// Returned when processing JSON from disk (the [`Config`][crate::config::Config], a
    /// [`FileSessionStore`][crate::session::FileSessionStore] state file or a
    /// [`FileAcmeTokens`][crate::acme::FileAcmeTokens] token file) fails due to invalid JSON
    /// content.
    #[error("invalid JSON")]
    InvalidJSON(#[from] serde_json::Error),

    /// Returned when a configured zone isn't a valid DNS name.
    #[error("DNS error")]
    DNSError(#[from] ProtoError),
}
