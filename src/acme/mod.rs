//! ACME [DNS-01] challenge tokens.
//!
//! A wildcard certificate order for a zone asks for TXT records at `_acme-challenge.{zone}`.
//! Let's Encrypt issues two challenges for a wildcard plus apex order, so a token source yields
//! up to two tokens and the DNS server answers with one TXT record per token.
//!
//! Two implementations are provided, [`memory::InMemoryAcmeTokens`] and
//! [`file::FileAcmeTokens`]. The former holds the tokens from the config file and can be swapped
//! on reload. The latter re-reads a JSON token file on every lookup, so an external secret sync
//! can rotate tokens without touching the server.
//!
//! [DNS-01]: https://www.rfc-editor.org/rfc/rfc8555#section-8.4

use crate::error::Error;
use base64::engine::general_purpose;
use base64::{alphabet, engine, DecodeError, Engine};
use lazy_static::lazy_static;
use std::sync::Arc;
use std::time::Duration;

pub mod file;
pub mod memory;

pub use file::FileAcmeTokens;
pub use memory::InMemoryAcmeTokens;

#[allow(clippy::module_name_repetitions)]
pub type DynAcmeTokenSource = Arc<dyn AcmeTokenSource + Send + Sync>;

/// Source of the TXT values served for `_acme-challenge.{zone}`.
#[async_trait::async_trait]
pub trait AcmeTokenSource {
    /// The current non-empty tokens in order (zero to two expected).
    async fn tokens(&self) -> Result<Vec<String>, Error>;

    /// TTL for the TXT answers.
    fn ttl(&self) -> Duration;
}

#[derive(thiserror::Error, Debug)]
pub enum TxtValidationError {
    #[error("invalid encoding: {0}")]
    InvalidEncoding(DecodeError),
    #[error("invalid decoded length: found {actual} bytes, expected {expected}")]
    InvalidDecodedLength { actual: usize, expected: usize },
}

const DNS01_DECODED_LEN_BYTES: usize = 32;

lazy_static! {
    static ref BASE64_ENGINE: engine::GeneralPurpose =
        engine::GeneralPurpose::new(&alphabet::URL_SAFE, general_purpose::NO_PAD);
}

/// Check that `txt` is a DNS-01 challenge response: the unpadded URL-safe base64 encoding of a
/// 32 byte SHA-256 digest.
///
/// # Errors
///
/// Returns [`TxtValidationError`] describing why the value is not a challenge response.
pub fn valid_dns01(txt: &str) -> Result<(), TxtValidationError> {
    match BASE64_ENGINE.decode(txt) {
        Ok(raw) => match raw.len() {
            DNS01_DECODED_LEN_BYTES => Ok(()),
            _ => Err(TxtValidationError::InvalidDecodedLength {
                actual: raw.len(),
                expected: DNS01_DECODED_LEN_BYTES,
            }),
        },
        Err(err) => Err(TxtValidationError::InvalidEncoding(err)),
    }
}
