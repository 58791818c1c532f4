//! Login handshake against the upstream reservation service.

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::REFERER;
use url::Url;

/// Cookie the upstream sets on the CSRF probe.
pub const XSRF_COOKIE: &str = "XSRF-TOKEN";

/// Header mirroring the cookie back on state-changing requests.
pub const XSRF_HEADER: &str = "X-XSRF-TOKEN";

const CSRF_PATH: &str = "/api/v1/csrf";
const LOGIN_PATH: &str = "/api/v1/users/login";

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("upstream rejected the login credentials")]
    BadCredentials,

    #[error("upstream did not set an anti-forgery cookie")]
    MissingXsrfCookie,

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Reads the anti-forgery token for `base_url` out of the cookie jar.
///
/// `None` when the handshake has not run yet or the cookie has been dropped.
pub fn xsrf_token(jar: &Jar, base_url: &Url) -> Option<String> {
    let header = jar.cookies(base_url)?;
    let cookies = header.to_str().ok()?;
    cookies.split("; ").find_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        (name == XSRF_COOKIE).then(|| value.to_string())
    })
}

/// Runs the upstream login handshake and returns the anti-forgery token.
///
/// The CSRF probe seeds the jar, the form login binds the credentials to it.
/// `client` must share `jar` as its cookie provider; on success the jar
/// carries everything subsequent API calls need.
pub async fn connect(
    client: &reqwest::Client,
    jar: &Jar,
    base_url: &Url,
    username: &str,
    password: &str,
) -> Result<String, SessionError> {
    let mut csrf_url = base_url.clone();
    csrf_url.set_path(CSRF_PATH);
    client.get(csrf_url).send().await?;

    let token = xsrf_token(jar, base_url).ok_or(SessionError::MissingXsrfCookie)?;

    let mut login_url = base_url.clone();
    login_url.set_path(LOGIN_PATH);
    let mut referer = base_url.clone();
    referer.set_path("/login");

    let response = client
        .post(login_url)
        .form(&[("username", username), ("password", password)])
        .header(XSRF_HEADER, &token)
        .header(REFERER, referer.as_str())
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(SessionError::BadCredentials);
    }

    Ok(token)
}
