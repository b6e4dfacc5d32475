//! HTTP API for the tunnel control plane.
//!
//! Bound to [`Config::api_bind_addr`][crate::config::Config::api_bind_addr], which must be a
//! loopback or private address. Errors are returned as `{"error": "<message>"}`.
//!
//! # API Endpoints
//!
//! ## `/healthz` (GET)
//!
//!   Returns HTTP 200 (OK) and the JSON body `{"status":"healthy","service":"tunneldns"}` when
//!   the service is operational.
//!
//! ## `/cache` (GET)
//!
//!   Returns `{"enabled": true, "entries": 12}`.
//!
//! ## `/cache` (DELETE)
//!
//!   Evicts every cached session address and returns `{"evicted": 12}`.
//!
//! ## `/cache/:key` (DELETE)
//!
//!   Evicts one `{address}-{proxy entry id}` key. Returns HTTP 204 (No Content) when it was
//!   cached and HTTP 404 (Not Found) otherwise.
//!
//! ## `/sessions` (POST)
//!
//!   Records a session. Expects a JSON request body of the form:
//!
//!   ```json
//!   {
//!     "session_id": "0b6c1f9e",
//!     "tunnel_host": "my-app-e1.tunnel4.com",
//!     "proxy_entry_id": "e1",
//!     "timestamp": "2024-05-01T12:00:00Z",
//!     "ttl": 3600
//!   }
//!   ```
//!
//!   Returns HTTP 200 (OK) with the stored session, or HTTP 422 (Unprocessable Entity) when the
//!   proxy entry has no configured address.
//!
//! ## `/sessions/:session_id` (DELETE)
//!
//!   Closes a session, optionally with a `?reason=` query parameter. Returns HTTP 200 (OK) with
//!   the removed session, or HTTP 404 (Not Found).

mod api_error;
mod model;
mod routes;
pub mod server;

pub use server::{new, AppState};
