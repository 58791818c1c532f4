//! Authenticated HTTP access to the upstream reservation service.

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use url::Url;

use crate::protocol::{AttrMap, CapacityDay};

/// Header carrying the per-session anti-forgery token on every call.
pub const XSRF_HEADER: &str = "X-XSRF-TOKEN";

const LISTING_PATH: &str = "/api/v1/manage/hutsList";
const DETAIL_PATH: &str = "/api/v1/reservation/hutInfo";
const AVAILABILITY_PATH: &str = "/api/v1/reservation/getHutAvailability";

/// Errors from a single upstream sub-request.
///
/// `AuthRejected` is kept separate from the transport and decode variants
/// because it is the only class that triggers session invalidation.
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("upstream rejected the session credentials")]
    AuthRejected,

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected upstream status {0}")]
    UnexpectedStatus(StatusCode),

    #[error("failed to decode upstream payload: {0}")]
    Decode(String),
}

/// The three upstream operations the aggregation engine consumes.
///
/// Implementations must be safe for concurrent use: every per-facility task
/// calls into the same instance, and the underlying credential state is
/// read-only for the duration of one run.
#[async_trait]
pub trait ReservationApi: Send + Sync {
    async fn list_facilities(&self) -> Result<Vec<AttrMap>, ApiError>;

    async fn fetch_detail(&self, id: &str) -> Result<AttrMap, ApiError>;

    async fn fetch_availability(&self, id: &str) -> Result<Vec<CapacityDay>, ApiError>;
}

/// [`ReservationApi`] implementation over a session-scoped `reqwest::Client`.
///
/// The client shares the session's cookie jar; the anti-forgery token is
/// extracted once per run by the caller and sent on every request.
pub struct HttpReservationClient {
    http: reqwest::Client,
    base_url: Url,
    xsrf_token: String,
}

impl HttpReservationClient {
    pub fn new(http: reqwest::Client, base_url: Url, xsrf_token: String) -> Self {
        Self {
            http,
            base_url,
            xsrf_token,
        }
    }

    fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(path);
        url
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        let response = self
            .http
            .get(url)
            .header(XSRF_HEADER, &self.xsrf_token)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED => Err(ApiError::AuthRejected),
            status if status.is_success() => response
                .json::<T>()
                .await
                .map_err(|e| ApiError::Decode(e.to_string())),
            status => Err(ApiError::UnexpectedStatus(status)),
        }
    }
}

#[async_trait]
impl ReservationApi for HttpReservationClient {
    async fn list_facilities(&self) -> Result<Vec<AttrMap>, ApiError> {
        self.get_json(self.endpoint(LISTING_PATH)).await
    }

    async fn fetch_detail(&self, id: &str) -> Result<AttrMap, ApiError> {
        self.get_json(self.endpoint(&format!("{DETAIL_PATH}/{id}")))
            .await
    }

    async fn fetch_availability(&self, id: &str) -> Result<Vec<CapacityDay>, ApiError> {
        let mut url = self.endpoint(AVAILABILITY_PATH);
        url.query_pairs_mut()
            .append_pair("hutId", id)
            .append_pair("step", "WIZARD");
        self.get_json(url).await
    }
}
