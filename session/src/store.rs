//! TTL-bounded in-memory store of live upstream sessions.

use moka::sync::Cache;
use reqwest::cookie::Jar;
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use uuid::Uuid;

use crate::connect::{self, SessionError, xsrf_token};

const USER_AGENT: &str = concat!("refuge/", env!("CARGO_PKG_VERSION"));

/// One authenticated upstream session: a client bound to its cookie jar.
pub struct SessionRecord {
    pub http: reqwest::Client,
    pub jar: Arc<Jar>,
}

impl SessionRecord {
    /// The session's current anti-forgery token.
    pub fn xsrf_token(&self, base_url: &Url) -> Option<String> {
        xsrf_token(&self.jar, base_url)
    }
}

/// Sessions keyed by opaque token, expiring `ttl` after login.
///
/// Each login builds a fresh client so upstream cookies never leak between
/// users. Lookups after expiry or invalidation return `None`; the caller
/// treats that as "not logged in".
pub struct SessionStore {
    sessions: Cache<String, Arc<SessionRecord>>,
    base_url: Url,
    http_timeout: Duration,
}

impl SessionStore {
    pub fn new(base_url: Url, ttl: Duration, http_timeout: Duration) -> Self {
        Self {
            sessions: Cache::builder().time_to_live(ttl).build(),
            base_url,
            http_timeout,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Runs the upstream login handshake and stores the resulting session.
    ///
    /// Returns the opaque token identifying the session to the caller.
    pub async fn login(&self, username: &str, password: &str) -> Result<String, SessionError> {
        let jar = Arc::new(Jar::default());
        let http = reqwest::Client::builder()
            .cookie_provider(jar.clone())
            .user_agent(USER_AGENT)
            .timeout(self.http_timeout)
            .build()?;

        connect::connect(&http, &jar, &self.base_url, username, password).await?;

        let token = Uuid::new_v4().to_string();
        self.sessions
            .insert(token.clone(), Arc::new(SessionRecord { http, jar }));
        tracing::info!("upstream session established");
        Ok(token)
    }

    pub fn get(&self, token: &str) -> Option<Arc<SessionRecord>> {
        self.sessions.get(token)
    }

    /// Drops the session; subsequent lookups miss. Idempotent.
    pub fn invalidate(&self, token: &str) {
        self.sessions.invalidate(token);
        tracing::info!("upstream session invalidated");
    }
}
