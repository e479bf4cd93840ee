//! Credential login and page scraping over one cookie session.
//!
//! Every public operation is a plain request/response cycle, optionally
//! followed by synchronous extraction. Operations take `&mut self`, so calls
//! on one gateway are serialized by construction; separate gateways share
//! nothing.
//!
//! Cookies from an operation are committed only when all of its round trips
//! completed. A transport error or a cancellation leaves the jar (and
//! [`AuthState`]) exactly as before the call.
use std::borrow::Cow;

use avalon_http::{HttpResponse, HttpSession, RequestOpts, TransportOptions};
use reqwest::Method;
use reqwest::header::{ACCEPT_LANGUAGE, HeaderMap, HeaderValue, REFERER};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::facebook::extract::{extract_groups, extract_posts};
use crate::facebook::site::{self, Site};
use crate::facebook::{AuthState, Credentials, GatewayError, Group, PostHandle, PostRemover};

pub struct Gateway {
    credentials: Credentials,
    site: Site,
    http: HttpSession,
    state: AuthState,
}

impl Gateway {
    /// Gateway with a fresh session and a randomly chosen user agent.
    pub fn new(
        credentials: Credentials,
        site: Site,
        transport: TransportOptions,
    ) -> Result<Self, GatewayError> {
        let http = HttpSession::new(transport)?;
        Ok(Self::with_session(credentials, site, http))
    }

    /// Gateway over a caller-built session (fixed user agent, test transport).
    pub fn with_session(credentials: Credentials, site: Site, http: HttpSession) -> Self {
        let state = seeded_state(&http);
        Self {
            credentials,
            site,
            http,
            state,
        }
    }

    pub fn mail_address(&self) -> &str {
        self.credentials.email()
    }

    pub fn user_agent(&self) -> &str {
        self.http.user_agent()
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    pub fn site(&self) -> &Site {
        &self.site
    }

    pub fn session(&self) -> &HttpSession {
        &self.http
    }

    /// Log in with the gateway's credentials.
    ///
    /// Seeds cookies from the landing page first when the jar is empty, then
    /// posts the login form. Success means the jar now holds the site's
    /// session cookie. Calling this again re-posts the form.
    pub async fn authenticate(&mut self, cancel: &CancellationToken) -> Result<(), GatewayError> {
        tracing::info!(email = %self.credentials.email(), state = ?self.state, "facebook.auth.start");

        let tx = self.http.transaction();
        let outcome = self.login_round_trips(cancel).await;
        if let Err(GatewayError::Network(err)) = &outcome {
            tracing::warn!(error = %err, "facebook.auth.aborted");
            return outcome;
        }
        tx.commit();

        self.state = match &outcome {
            Ok(()) => AuthState::Authenticated,
            Err(_) => seeded_state(&self.http),
        };
        match &outcome {
            Ok(()) => tracing::info!(email = %self.credentials.email(), "facebook.auth.ok"),
            Err(e) => tracing::warn!(error = %e, state = ?self.state, "facebook.auth.failed"),
        }
        outcome
    }

    async fn login_round_trips(&self, cancel: &CancellationToken) -> Result<(), GatewayError> {
        if self.http.cookie_count() == 0 {
            tracing::debug!("facebook.auth.seed");
            let opts = RequestOpts {
                headers: Some(self.headers(false)),
                ..Default::default()
            };
            let resp = self
                .http
                .send(Method::GET, self.site.landing(), opts, cancel)
                .await?;
            ensure_success(&resp)?;
        }

        let opts = RequestOpts {
            headers: Some(self.headers(true)),
            form: Some(vec![
                ("email", Cow::Borrowed(self.credentials.email())),
                ("pass", Cow::Borrowed(self.credentials.password())),
                ("login", Cow::Borrowed(site::LOGIN_BUTTON)),
            ]),
            ..Default::default()
        };
        let resp = self
            .http
            .send(Method::POST, self.site.login(), opts, cancel)
            .await?;
        ensure_success(&resp)?;

        if !self
            .http
            .has_cookie(self.site.cookie_root(), self.site.session_cookie())
        {
            tracing::debug!(
                cookies = ?self.http.cookie_names(self.site.cookie_root()),
                "facebook.auth.no_session_cookie"
            );
            return Err(GatewayError::InvalidCredentials);
        }
        Ok(())
    }

    /// Group memberships from the groups overview page.
    pub async fn fetch_groups(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Vec<Group>, GatewayError> {
        let body = self.scrape(self.site.groups(), cancel).await?;
        let groups = extract_groups(&body);
        tracing::info!(count = groups.len(), "facebook.groups.fetched");
        Ok(groups)
    }

    /// Post-like elements on the account's own profile page.
    pub async fn list_own_posts(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Vec<PostHandle>, GatewayError> {
        let body = self.scrape(self.site.profile(), cancel).await?;
        let posts = extract_posts(&body);
        tracing::info!(count = posts.len(), "facebook.posts.listed");
        Ok(posts)
    }

    /// Enumerate own posts and hand each one to `remover`, in page order.
    ///
    /// Stops at the first remover error. Returns how many posts were handed
    /// over.
    pub async fn purge_own_posts(
        &mut self,
        remover: &dyn PostRemover,
        cancel: &CancellationToken,
    ) -> Result<usize, GatewayError> {
        let posts = self.list_own_posts(cancel).await?;
        for post in &posts {
            if cancel.is_cancelled() {
                return Err(avalon_http::HttpError::Cancelled.into());
            }
            remover.remove(&self.http, &self.site, post, cancel).await?;
        }
        Ok(posts.len())
    }

    async fn scrape(&self, url: &Url, cancel: &CancellationToken) -> Result<String, GatewayError> {
        if self.state != AuthState::Authenticated {
            return Err(GatewayError::NotAuthenticated);
        }
        let opts = RequestOpts {
            headers: Some(self.headers(true)),
            ..Default::default()
        };
        let resp = self.http.send(Method::GET, url, opts, cancel).await?;
        ensure_success(&resp)?;
        Ok(resp.body)
    }

    fn headers(&self, with_referer: bool) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static(site::ACCEPT_LANGUAGE),
        );
        if with_referer {
            if let Ok(referer) = HeaderValue::from_str(self.site.landing().as_str()) {
                headers.insert(REFERER, referer);
            }
        }
        headers
    }
}

fn seeded_state(http: &HttpSession) -> AuthState {
    if http.cookie_count() == 0 {
        AuthState::NoSession
    } else {
        AuthState::HasSeedCookies
    }
}

fn ensure_success(resp: &HttpResponse) -> Result<(), GatewayError> {
    if resp.is_success() {
        return Ok(());
    }
    tracing::warn!(status = %resp.status, url = %resp.url, "facebook.unexpected_response");
    Err(GatewayError::UnexpectedResponse {
        status: resp.status,
        url: resp.url.to_string(),
    })
}
