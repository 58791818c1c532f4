//! Endpoint handlers for the gateway's own API.

use aggregator::{
    AggregateError, AggregateQuery, Aggregator, HttpReservationClient, InvalidationSink,
    StayWindow,
};
use http_body_util::{BodyExt, Full, combinators::BoxBody};
use hyper::body::Bytes;
use hyper::{Request, Response, StatusCode, header};
use serde::Deserialize;
use serde_json::json;
use session::{SessionError, SessionStore};
use std::sync::Arc;
use std::time::Duration;
use url::form_urlencoded;

use crate::config::Config;
use crate::errors::GatewayError;
use crate::metrics_defs;

pub type GatewayResponse = Response<BoxBody<Bytes, GatewayError>>;

/// Shared per-process state behind every handler.
pub struct AppState {
    pub config: Config,
    pub store: Arc<SessionStore>,
    pub aggregator: Aggregator,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let store = SessionStore::new(
            config.upstream.base_url.clone(),
            Duration::from_secs(config.session.ttl_secs),
            Duration::from_secs(config.aggregator.http_timeout_secs),
        );
        let aggregator = Aggregator::new(config.aggregator.clone());
        Self {
            config,
            store: Arc::new(store),
            aggregator,
        }
    }
}

/// Drops the stored session when the engine reports invalid credentials.
struct StoreInvalidation {
    store: Arc<SessionStore>,
    token: String,
}

impl InvalidationSink for StoreInvalidation {
    fn invalidate(&self) {
        self.store.invalidate(&self.token);
    }
}

fn json_response(
    status: StatusCode,
    body: &serde_json::Value,
) -> Result<GatewayResponse, GatewayError> {
    let response = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(
            Full::new(Bytes::from(body.to_string()))
                .map_err(|e| match e {})
                .boxed(),
        )?;
    Ok(response)
}

fn error_response(status: StatusCode, message: &str) -> Result<GatewayResponse, GatewayError> {
    json_response(status, &json!({ "error": message }))
}

/// Extracts this gateway's session token from the request's cookies.
fn session_token<B>(req: &Request<B>, cookie_name: &str) -> Option<String> {
    let header = req.headers().get(header::COOKIE)?;
    let cookies = header.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == cookie_name).then(|| value.to_string())
    })
}

/// Parses the optional availability window out of the query string.
///
/// The three parameters come as a group: all absent means a plain listing,
/// all present means an availability check, anything in between is rejected.
fn parse_window(query: &str) -> Result<Option<StayWindow>, String> {
    let mut start = None;
    let mut end = None;
    let mut beds = None;
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "startDate" => start = Some(value.into_owned()),
            "endDate" => end = Some(value.into_owned()),
            "numPeople" => beds = Some(value.into_owned()),
            _ => {}
        }
    }

    match (start, end, beds) {
        (None, None, None) => Ok(None),
        (Some(start), Some(end), Some(beds)) => StayWindow::parse(&start, &end, &beds)
            .map(Some)
            .map_err(|e| e.to_string()),
        _ => Err("startDate, endDate and numPeople must be provided together".to_string()),
    }
}

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

pub async fn login<B>(
    state: Arc<AppState>,
    req: Request<B>,
) -> Result<GatewayResponse, GatewayError>
where
    B: hyper::body::Body<Data = Bytes> + Send,
    B::Error: std::fmt::Display,
{
    let body = req
        .into_body()
        .collect()
        .await
        .map_err(|e| GatewayError::Body(e.to_string()))?
        .to_bytes();

    let Ok(credentials) = serde_json::from_slice::<LoginRequest>(&body) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "expected JSON body with username and password",
        );
    };

    establish_session(&state, &credentials.username, &credentials.password).await
}

/// Anonymous fallback login with credentials from the config.
pub async fn anonymous(state: Arc<AppState>) -> Result<GatewayResponse, GatewayError> {
    let Some(credentials) = state.config.session.anonymous.clone() else {
        return error_response(StatusCode::NOT_FOUND, "anonymous login is not enabled");
    };
    establish_session(&state, &credentials.username, &credentials.password).await
}

async fn establish_session(
    state: &AppState,
    username: &str,
    password: &str,
) -> Result<GatewayResponse, GatewayError> {
    match state.store.login(username, password).await {
        Ok(token) => {
            let cookie = format!(
                "{}={token}; Path=/; HttpOnly",
                state.config.session.cookie_name
            );
            let response = Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::SET_COOKIE, cookie)
                .body(
                    Full::new(Bytes::from(json!({ "loggedIn": true }).to_string()))
                        .map_err(|e| match e {})
                        .boxed(),
                )?;
            Ok(response)
        }
        Err(SessionError::BadCredentials) => {
            metrics::counter!(metrics_defs::LOGIN_FAILURES.name).increment(1);
            error_response(StatusCode::UNAUTHORIZED, "invalid credentials")
        }
        Err(err) => {
            tracing::warn!(error = %err, "upstream login handshake failed");
            error_response(StatusCode::BAD_GATEWAY, "upstream login failed")
        }
    }
}

pub async fn logout<B>(
    state: Arc<AppState>,
    req: Request<B>,
) -> Result<GatewayResponse, GatewayError> {
    let cookie_name = &state.config.session.cookie_name;
    if let Some(token) = session_token(&req, cookie_name) {
        state.store.invalidate(&token);
    }

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json")
        .header(
            header::SET_COOKIE,
            format!("{cookie_name}=; Path=/; HttpOnly; Max-Age=0"),
        )
        .body(
            Full::new(Bytes::from(json!({ "loggedIn": false }).to_string()))
                .map_err(|e| match e {})
                .boxed(),
        )?;
    Ok(response)
}

pub async fn session_probe<B>(
    state: Arc<AppState>,
    req: Request<B>,
) -> Result<GatewayResponse, GatewayError> {
    let logged_in = session_token(&req, &state.config.session.cookie_name)
        .and_then(|token| state.store.get(&token))
        .is_some();
    json_response(StatusCode::OK, &json!({ "loggedIn": logged_in }))
}

/// The aggregated facility listing, optionally with availability verdicts.
pub async fn huts<B>(
    state: Arc<AppState>,
    req: Request<B>,
) -> Result<GatewayResponse, GatewayError> {
    let window = match parse_window(req.uri().query().unwrap_or("")) {
        Ok(window) => window,
        Err(reason) => return error_response(StatusCode::BAD_REQUEST, &reason),
    };

    let Some(token) = session_token(&req, &state.config.session.cookie_name) else {
        return error_response(StatusCode::UNAUTHORIZED, "not logged in");
    };
    let Some(record) = state.store.get(&token) else {
        return error_response(StatusCode::UNAUTHORIZED, "not logged in");
    };

    let base_url = state.store.base_url();
    let Some(xsrf) = record.xsrf_token(base_url) else {
        // A jar without the anti-forgery cookie cannot make upstream calls.
        state.store.invalidate(&token);
        return error_response(StatusCode::UNAUTHORIZED, "not logged in");
    };

    let api = Arc::new(HttpReservationClient::new(
        record.http.clone(),
        base_url.clone(),
        xsrf,
    ));
    let sink = Arc::new(StoreInvalidation {
        store: state.store.clone(),
        token,
    });
    let query = AggregateQuery {
        country_filter: state.config.upstream.country_filter.clone(),
        window,
    };

    match state.aggregator.aggregate(api, &query, sink).await {
        Ok(results) => {
            let body = serde_json::Value::Array(
                results.into_iter().map(serde_json::Value::Object).collect(),
            );
            json_response(StatusCode::OK, &body)
        }
        Err(AggregateError::Unauthorized) => {
            error_response(StatusCode::UNAUTHORIZED, "upstream session expired")
        }
        Err(AggregateError::Listing(err)) => {
            tracing::warn!(error = %err, "facility listing fetch failed");
            error_response(StatusCode::BAD_GATEWAY, "upstream listing failed")
        }
    }
}

pub fn healthcheck() -> Result<GatewayResponse, GatewayError> {
    json_response(StatusCode::OK, &json!({ "status": "ok" }))
}

pub fn not_found() -> Result<GatewayResponse, GatewayError> {
    error_response(StatusCode::NOT_FOUND, "no route matched")
}
