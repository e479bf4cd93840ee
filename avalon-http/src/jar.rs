//! Session cookie jar with all-or-nothing updates.
//!
//! The jar is handed to `reqwest` as its cookie provider, so `Set-Cookie`
//! headers from every response (redirect hops included) land here. While a
//! [`CookieTransaction`] is open those writes go to a staged copy; the copy
//! replaces the committed store only on [`CookieTransaction::commit`].
//! Dropping an uncommitted transaction (an error, or a cancelled future)
//! discards everything staged since it began.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use cookie_store::{CookieStore as Store, RawCookie};
use reqwest::cookie::CookieStore;
use reqwest::header::HeaderValue;
use url::Url;

#[derive(Default)]
struct JarState {
    committed: Store,
    staged: Option<Store>,
}

impl JarState {
    fn active(&self) -> &Store {
        self.staged.as_ref().unwrap_or(&self.committed)
    }

    fn active_mut(&mut self) -> &mut Store {
        match &mut self.staged {
            Some(staged) => staged,
            None => &mut self.committed,
        }
    }
}

/// Cookie store owned by exactly one [`crate::HttpSession`].
#[derive(Default)]
pub struct SessionJar {
    state: Mutex<JarState>,
}

impl SessionJar {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, JarState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a transaction. If one is already open the returned handle is a
    /// no-op and the outermost transaction decides the outcome.
    pub fn begin(self: &Arc<Self>) -> CookieTransaction {
        let mut state = self.lock();
        let owner = state.staged.is_none();
        if owner {
            let snapshot = state.committed.clone();
            state.staged = Some(snapshot);
        }
        CookieTransaction {
            jar: Arc::clone(self),
            owner,
            done: false,
        }
    }

    /// Names of the unexpired cookies that would be sent to `url`.
    pub fn cookie_names(&self, url: &Url) -> Vec<String> {
        self.lock()
            .active()
            .matches(url)
            .into_iter()
            .map(|c| c.name().to_string())
            .collect()
    }

    pub fn has_cookie(&self, url: &Url, name: &str) -> bool {
        self.lock()
            .active()
            .matches(url)
            .iter()
            .any(|c| c.name() == name)
    }

    /// Value of the named cookie as it would be sent to `url`.
    pub fn cookie_value(&self, url: &Url, name: &str) -> Option<String> {
        self.lock()
            .active()
            .matches(url)
            .iter()
            .find(|c| c.name() == name)
            .map(|c| c.value().to_string())
    }

    /// Number of unexpired cookies across all domains.
    pub fn len(&self) -> usize {
        self.lock().active().iter_unexpired().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CookieStore for SessionJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let cookies = cookie_headers
            .filter_map(|value| value.to_str().ok())
            .filter_map(|raw| RawCookie::parse(raw.to_owned()).ok())
            .collect::<Vec<_>>();
        if cookies.is_empty() {
            return;
        }
        tracing::trace!(
            host = %url.host_str().unwrap_or("-"),
            count = cookies.len(),
            "jar.store"
        );
        self.lock()
            .active_mut()
            .store_response_cookies(cookies.into_iter(), url);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        let header = self
            .lock()
            .active()
            .get_request_values(url)
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        if header.is_empty() {
            return None;
        }
        HeaderValue::from_str(&header).ok()
    }
}

/// Guard over staged cookie writes. Rolls back on drop unless committed.
#[must_use = "dropping a transaction discards its cookies"]
pub struct CookieTransaction {
    jar: Arc<SessionJar>,
    owner: bool,
    done: bool,
}

impl CookieTransaction {
    pub fn commit(mut self) {
        if self.owner {
            let mut state = self.jar.lock();
            if let Some(staged) = state.staged.take() {
                state.committed = staged;
            }
        }
        self.done = true;
    }
}

impl Drop for CookieTransaction {
    fn drop(&mut self) {
        if self.owner && !self.done {
            self.jar.lock().staged = None;
            tracing::debug!("jar.rollback");
        }
    }
}
