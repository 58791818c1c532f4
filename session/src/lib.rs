//! Upstream credential management.
//!
//! One user session owns a dedicated `reqwest::Client` with its own cookie
//! jar, established through the upstream's CSRF + form-login handshake and
//! kept alive in a TTL-bounded in-memory store keyed by an opaque token.

pub mod connect;
pub mod store;

pub use connect::{SessionError, XSRF_COOKIE, connect, xsrf_token};
pub use store::{SessionRecord, SessionStore};
