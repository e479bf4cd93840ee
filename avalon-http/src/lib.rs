//! Cookie-keeping HTTP session with safe logging and cancellation.
//!
//! - One [`HttpSession`] owns one cookie jar, one user agent and one configured
//!   `reqwest::Client`; nothing is shared between sessions
//! - Redirects are followed transparently; cookies from every hop are kept
//! - Non-2xx statuses are returned as data, callers decide policy
//! - Every call takes a [`CancellationToken`]; a cancelled call leaves the jar
//!   exactly as it was (see [`jar`])
//! - Optional *raw* request/response logging via `AVALON_HTTP_RAW=1`
//!
//! Example (no_run):
//! ```no_run
//! # async fn demo() -> Result<(), avalon_http::HttpError> {
//! use avalon_http::{HttpSession, RequestOpts, TransportOptions};
//! use tokio_util::sync::CancellationToken;
//!
//! let session = HttpSession::new(TransportOptions::default())?;
//! let url = url::Url::parse("https://example.com/").unwrap();
//! let resp = session
//!     .send(reqwest::Method::GET, &url, RequestOpts::default(), &CancellationToken::new())
//!     .await?;
//! println!("{} bytes", resp.body.len());
//! # Ok(()) }
//! ```
//!
//! Security: form field values are never logged, and `Cookie` / `Set-Cookie`
//! header values are redacted even in raw mode.

use reqwest::header::{HeaderMap, USER_AGENT};
use reqwest::{Client, Method, StatusCode};
use std::borrow::Cow;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

pub mod agent;
pub mod jar;
pub mod transport;

pub use agent::{random_user_agent, USER_AGENTS};
pub use jar::{CookieTransaction, SessionJar};
pub use transport::{ClientIdentity, TransportOptions};

// ==============================
// Raw logging toggles
// ==============================

const RAW_ENV: &str = "AVALON_HTTP_RAW";
const RAW_MAX_BODY: usize = 64 * 1024;

fn raw_enabled() -> bool {
    matches!(
        env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

fn is_secret_header(name: &str) -> bool {
    name.eq_ignore_ascii_case("cookie")
        || name.eq_ignore_ascii_case("set-cookie")
        || name.eq_ignore_ascii_case("authorization")
}

/// Render a curl command for repro/debug. Secret headers and every form value
/// are replaced with placeholders.
fn make_curl(method: &Method, url: &Url, headers: &HeaderMap, form_keys: &[&str]) -> String {
    let mut parts = vec!["curl".to_string(), format!("-X{}", method)];
    for (name, val) in redact_headers(headers) {
        parts.push(format!("-H '{}: {}'", name, val.replace('\'', r"'\''")));
    }
    if !form_keys.is_empty() {
        let body = form_keys
            .iter()
            .map(|k| format!("{k}=<redacted>"))
            .collect::<Vec<_>>()
            .join("&");
        parts.push(format!("--data '{body}'"));
    }
    parts.push(format!("'{}'", url.as_str()));
    parts.join(" ")
}

fn redact_headers(h: &HeaderMap) -> Vec<(String, String)> {
    h.iter()
        .map(|(k, v)| {
            let key = k.as_str().to_string();
            let val = if is_secret_header(&key) {
                "<redacted>".to_string()
            } else {
                v.to_str().unwrap_or("").to_string()
            };
            (key, val)
        })
        .collect()
}

// ==============================
// Errors
// ==============================

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request build failed: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("request cancelled")]
    Cancelled,
}

// ==============================
// Request options & response
// ==============================

/// Per-request inputs besides method and URL.
///
/// ```
/// use avalon_http::RequestOpts;
/// use reqwest::header::{HeaderMap, HeaderValue, REFERER};
///
/// let mut headers = HeaderMap::new();
/// headers.insert(REFERER, HeaderValue::from_static("https://example.com/"));
/// let opts = RequestOpts {
///     headers: Some(headers),
///     form: Some(vec![("q", "rust".into())]),
///     ..Default::default()
/// };
/// assert!(opts.timeout.is_none());
/// ```
#[derive(Clone, Debug, Default)]
pub struct RequestOpts<'a> {
    pub headers: Option<HeaderMap>,
    /// URL-encoded form body, sent in order.
    pub form: Option<Vec<(&'a str, Cow<'a, str>)>>,
    /// Overrides the transport timeout for this request only.
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    /// Final URL after redirects.
    pub url: Url,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

// ==============================
// Session
// ==============================

/// HTTP client bound to a single cookie jar and user agent.
///
/// Calls on one session must be serialized by the caller; distinct sessions
/// are fully independent.
pub struct HttpSession {
    inner: Client,
    jar: Arc<SessionJar>,
    user_agent: String,
}

impl HttpSession {
    /// Build a session with a user agent picked at random from [`USER_AGENTS`].
    pub fn new(transport: TransportOptions) -> Result<Self, HttpError> {
        Self::with_user_agent(transport, random_user_agent())
    }

    /// Build a session with a fixed user agent.
    ///
    /// ```
    /// use avalon_http::{HttpSession, HttpError, TransportOptions};
    ///
    /// let session = HttpSession::with_user_agent(TransportOptions::default(), "test-agent/1.0")?;
    /// assert_eq!(session.user_agent(), "test-agent/1.0");
    /// assert_eq!(session.cookie_count(), 0);
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn with_user_agent(
        transport: TransportOptions,
        user_agent: impl Into<String>,
    ) -> Result<Self, HttpError> {
        let jar = SessionJar::new();
        let inner = transport
            .client_builder()?
            .cookie_provider(Arc::clone(&jar))
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        let user_agent = user_agent.into();
        tracing::debug!(user_agent = %user_agent, "http.session.created");
        Ok(Self {
            inner,
            jar,
            user_agent,
        })
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Open a cookie transaction spanning several [`HttpSession::send`] calls.
    pub fn transaction(&self) -> CookieTransaction {
        self.jar.begin()
    }

    pub fn cookie_names(&self, url: &Url) -> Vec<String> {
        self.jar.cookie_names(url)
    }

    pub fn has_cookie(&self, url: &Url, name: &str) -> bool {
        self.jar.has_cookie(url, name)
    }

    pub fn cookie_value(&self, url: &Url, name: &str) -> Option<String> {
        self.jar.cookie_value(url, name)
    }

    pub fn cookie_count(&self) -> usize {
        self.jar.len()
    }

    /// Send one request and read the whole body as text.
    ///
    /// Cookies received on the way are committed only once the body has been
    /// read. Cancellation aborts the in-flight request and yields
    /// [`HttpError::Cancelled`].
    pub async fn send(
        &self,
        method: Method,
        url: &Url,
        opts: RequestOpts<'_>,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, HttpError> {
        let tx = self.jar.begin();
        let resp = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(
                    method = %method,
                    host_path = %host_path(url),
                    "http.cancelled"
                );
                Err(HttpError::Cancelled)
            }
            resp = self.exchange(method.clone(), url, opts) => resp,
        }?;
        tx.commit();
        Ok(resp)
    }

    async fn exchange(
        &self,
        method: Method,
        url: &Url,
        opts: RequestOpts<'_>,
    ) -> Result<HttpResponse, HttpError> {
        let mut rb = self
            .inner
            .request(method.clone(), url.clone())
            .header(USER_AGENT, self.user_agent.as_str());

        if let Some(timeout) = opts.timeout {
            rb = rb.timeout(timeout);
        }
        if let Some(hdrs) = &opts.headers {
            rb = rb.headers(hdrs.clone());
        }

        let form_keys: Vec<&str> = opts
            .form
            .as_ref()
            .map(|f| f.iter().map(|(k, _)| *k).collect())
            .unwrap_or_default();
        if let Some(form) = &opts.form {
            let pairs: Vec<(&str, &str)> = form.iter().map(|(k, v)| (*k, v.as_ref())).collect();
            rb = rb.form(&pairs);
        }

        let req_id = format!(
            "r{:x}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        );
        let header_names: Vec<&str> = opts
            .headers
            .as_ref()
            .map(|h| h.keys().map(|k| k.as_str()).collect())
            .unwrap_or_default();

        tracing::debug!(
            req_id = %req_id,
            method = %method,
            host_path = %host_path(url),
            headers = ?header_names,
            form_fields = ?form_keys,
            timeout_ms = opts.timeout.map(|t| t.as_millis() as u64),
            "http.request.start"
        );

        if raw_enabled() {
            let mut merged = HeaderMap::new();
            if let Ok(ua) = self.user_agent.parse() {
                merged.insert(USER_AGENT, ua);
            }
            if let Some(h) = &opts.headers {
                for (k, v) in h.iter() {
                    merged.append(k, v.clone());
                }
            }
            let curl = make_curl(&method, url, &merged, &form_keys);
            tracing::debug!(target: "http.raw", %req_id, %curl, "request");
        }

        let t0 = std::time::Instant::now();
        let resp = rb.send().await.map_err(|err| {
            tracing::warn!(req_id = %req_id, message = %err, "http.network_error.send");
            HttpError::Network(err.to_string())
        })?;
        let status = resp.status();
        let final_url = resp.url().clone();
        let headers = resp.headers().clone();
        let body = resp.text().await.map_err(|err| {
            tracing::warn!(req_id = %req_id, message = %err, "http.network_error.body");
            HttpError::Network(err.to_string())
        })?;
        let dur_ms = t0.elapsed().as_millis() as u64;

        tracing::debug!(
            req_id = %req_id,
            %status,
            duration_ms = dur_ms,
            body_len = body.len(),
            final_url = %host_path(&final_url),
            "http.response"
        );

        if raw_enabled() {
            let hdrs = redact_headers(&headers);
            let mut text = body.clone();
            let truncated = text.len() > RAW_MAX_BODY;
            if truncated {
                text.truncate(floor_char_boundary(&text, RAW_MAX_BODY));
            }
            tracing::info!(
                target: "http.raw",
                %req_id,
                status = %status,
                duration_ms = dur_ms,
                headers = ?hdrs,
                body = %text,
                truncated
            );
        }

        Ok(HttpResponse {
            status,
            url: final_url,
            body,
        })
    }
}

// ==============================
// Helpers
// ==============================

fn host_path(url: &Url) -> String {
    format!("{}{}", url.host_str().unwrap_or("-"), url.path())
}

fn floor_char_boundary(s: &str, max: usize) -> usize {
    let mut idx = max.min(s.len());
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}
