//! Request dispatch for the gateway listener.

use http_body_util::combinators::BoxBody;
use hyper::body::{Bytes, Incoming};
use hyper::service::Service as HyperService;
use hyper::{Method, Request, Response};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::config::Config;
use crate::errors::GatewayError;
use crate::handlers::{self, AppState};
use crate::metrics_defs;

#[derive(Clone)]
pub struct GatewayService {
    state: Arc<AppState>,
}

impl GatewayService {
    pub fn new(config: Config) -> Self {
        Self {
            state: Arc::new(AppState::new(config)),
        }
    }
}

impl HyperService<Request<Incoming>> for GatewayService {
    type Response = Response<BoxBody<Bytes, GatewayError>>;
    type Error = GatewayError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let state = self.state.clone();
        Box::pin(dispatch(state, req))
    }
}

/// Routes one request to its handler.
pub async fn dispatch<B>(
    state: Arc<AppState>,
    req: Request<B>,
) -> Result<Response<BoxBody<Bytes, GatewayError>>, GatewayError>
where
    B: hyper::body::Body<Data = Bytes> + Send + 'static,
    B::Error: std::fmt::Display,
{
    metrics::counter!(metrics_defs::REQUESTS.name).increment(1);
    tracing::debug!(method = %req.method(), path = %req.uri().path(), "Dispatching request");

    match (req.method(), req.uri().path()) {
        (&Method::POST, "/api/login") => handlers::login(state, req).await,
        (&Method::POST, "/api/session/anonymous") => handlers::anonymous(state).await,
        (&Method::POST, "/api/logout") => handlers::logout(state, req).await,
        (&Method::GET, "/api/session") => handlers::session_probe(state, req).await,
        (&Method::GET, "/api/huts") => handlers::huts(state, req).await,
        (&Method::GET, "/healthcheck") => handlers::healthcheck(),
        _ => {
            tracing::warn!(
                method = %req.method(),
                path = %req.uri().path(),
                "No route matched"
            );
            handlers::not_found()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::{BodyExt, Empty, Full};
    use hyper::StatusCode;
    use hyper::header;
    use hyper::service::service_fn;
    use hyper_util::rt::{TokioExecutor, TokioIo};
    use std::convert::Infallible;
    use std::time::Duration;
    use tokio::net::TcpListener;

    /// Mock reservation upstream covering the login handshake and the three
    /// aggregation endpoints.
    async fn start_mock_reservation_service() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                let io = TokioIo::new(stream);

                tokio::spawn(async move {
                    let service = service_fn(|req: Request<hyper::body::Incoming>| async move {
                        let path = req.uri().path().to_string();
                        let mut builder = Response::builder().status(200);
                        let body = match path.as_str() {
                            "/api/v1/csrf" => {
                                builder =
                                    builder.header("Set-Cookie", "XSRF-TOKEN=tok-7; Path=/");
                                String::new()
                            }
                            "/api/v1/users/login" => {
                                let body =
                                    req.into_body().collect().await.unwrap().to_bytes();
                                let body = String::from_utf8(body.to_vec()).unwrap();
                                if !body.contains("password=secret") {
                                    builder = builder.status(401);
                                }
                                String::new()
                            }
                            "/api/v1/manage/hutsList" => concat!(
                                r#"[{"hutId": 1, "hutCountry": "CH", "hutName": "Cabane A"},"#,
                                r#" {"hutId": 2, "hutCountry": "FR", "hutName": "Refuge B"},"#,
                                r#" {"hutId": 3, "hutCountry": "CH", "hutName": "Cabane C"}]"#
                            )
                            .to_string(),
                            "/api/v1/reservation/hutInfo/1" => {
                                r#"{"hutWebsite": "https://a.example"}"#.to_string()
                            }
                            "/api/v1/reservation/hutInfo/3" => {
                                r#"{"hutWebsite": "https://c.example"}"#.to_string()
                            }
                            "/api/v1/reservation/getHutAvailability" => {
                                let query = req.uri().query().unwrap_or("");
                                if query.contains("hutId=1") {
                                    concat!(
                                        r#"[{"freeBeds": 8, "date": "2024-06-01T00:00:00Z"},"#,
                                        r#" {"freeBeds": 8, "date": "2024-06-02T00:00:00Z"}]"#
                                    )
                                    .to_string()
                                } else {
                                    r#"[{"freeBeds": 0, "date": "2024-06-01T00:00:00Z"}]"#
                                        .to_string()
                                }
                            }
                            _ => {
                                builder = builder.status(404);
                                String::new()
                            }
                        };
                        Ok::<_, Infallible>(
                            builder.body(Full::new(Bytes::from(body))).unwrap(),
                        )
                    });

                    let _ = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                        .serve_connection(io, service)
                        .await;
                });
            }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        port
    }

    fn test_state(upstream_port: u16) -> Arc<AppState> {
        let raw = format!(
            r#"
listener:
  host: "127.0.0.1"
  port: 8080
upstream:
  base_url: "http://127.0.0.1:{upstream_port}"
  country_filter: "CH"
session:
  anonymous:
    username: "guest"
    password: "secret"
"#
        );
        let config: Config = serde_yaml::from_str(&raw).unwrap();
        config.validate().unwrap();
        Arc::new(AppState::new(config))
    }

    fn get(path: &str, cookie: Option<&str>) -> Request<Empty<Bytes>> {
        let mut builder = Request::builder().method(Method::GET).uri(path);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Empty::new()).unwrap()
    }

    fn post_json(path: &str, body: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body.to_string())))
            .unwrap()
    }

    async fn body_json(
        response: Response<BoxBody<Bytes, GatewayError>>,
    ) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Logs in and returns the session cookie pair.
    async fn login_session(state: &Arc<AppState>) -> String {
        let response = dispatch(
            state.clone(),
            post_json(
                "/api/login",
                r#"{"username": "alice", "password": "secret"}"#,
            ),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        cookie.split(';').next().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_healthcheck() {
        let port = start_mock_reservation_service().await;
        let response = dispatch(test_state(port), get("/healthcheck", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let port = start_mock_reservation_service().await;
        let response = dispatch(test_state(port), get("/nope", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_login_rejected_credentials() {
        let port = start_mock_reservation_service().await;
        let response = dispatch(
            test_state(port),
            post_json("/api/login", r#"{"username": "alice", "password": "wrong"}"#),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_login_malformed_body() {
        let port = start_mock_reservation_service().await;
        let response = dispatch(test_state(port), post_json("/api/login", "not json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_session_probe_lifecycle() {
        let port = start_mock_reservation_service().await;
        let state = test_state(port);

        let response = dispatch(state.clone(), get("/api/session", None))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["loggedIn"], false);

        let cookie = login_session(&state).await;
        let response = dispatch(state.clone(), get("/api/session", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["loggedIn"], true);

        let mut logout = post_json("/api/logout", "");
        logout
            .headers_mut()
            .insert(header::COOKIE, cookie.parse().unwrap());
        dispatch(state.clone(), logout).await.unwrap();

        let response = dispatch(state.clone(), get("/api/session", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["loggedIn"], false);
    }

    #[tokio::test]
    async fn test_anonymous_login() {
        let port = start_mock_reservation_service().await;
        let state = test_state(port);

        let response = dispatch(state.clone(), post_json("/api/session/anonymous", ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::SET_COOKIE).is_some());
    }

    #[tokio::test]
    async fn test_huts_requires_session() {
        let port = start_mock_reservation_service().await;
        let response = dispatch(test_state(port), get("/api/huts", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_huts_rejects_partial_window() {
        let port = start_mock_reservation_service().await;
        let state = test_state(port);
        let cookie = login_session(&state).await;

        let response = dispatch(
            state.clone(),
            get("/api/huts?startDate=2024-06-01", Some(&cookie)),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_huts_listing_with_country_filter() {
        let port = start_mock_reservation_service().await;
        let state = test_state(port);
        let cookie = login_session(&state).await;

        let response = dispatch(state.clone(), get("/api/huts", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let huts = body.as_array().unwrap();
        assert_eq!(huts.len(), 2);
        assert_eq!(huts[0]["hutId"], 1);
        assert_eq!(huts[0]["hutWebsite"], "https://a.example");
        assert_eq!(huts[1]["hutId"], 3);
        // No window requested, no verdict.
        assert!(huts[0].get("isAvailable").is_none());
    }

    #[tokio::test]
    async fn test_huts_with_availability_window() {
        let port = start_mock_reservation_service().await;
        let state = test_state(port);
        let cookie = login_session(&state).await;

        let response = dispatch(
            state.clone(),
            get(
                "/api/huts?startDate=2024-06-01&endDate=2024-06-02&numPeople=2",
                Some(&cookie),
            ),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let huts = body.as_array().unwrap();
        assert_eq!(huts.len(), 2);
        assert_eq!(huts[0]["isAvailable"], true);
        assert_eq!(huts[1]["isAvailable"], false);
    }
}
