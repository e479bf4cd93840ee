use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Login pair. The password is never printed, not even through `Debug`.
#[derive(Clone)]
pub struct Credentials {
    email: String,
    password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub(crate) fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Where a [`crate::facebook::Gateway`] stands in the login handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// Cookie jar is empty.
    NoSession,
    /// Landing-page cookies are present but no login has succeeded.
    HasSeedCookies,
    Authenticated,
}

/// One group membership as listed on the groups overview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Link as written in the page, usually relative.
    pub url: String,
    pub name: String,
    /// Unread count from the row badge; 0 when there is no badge.
    pub notifications: u32,
}

/// A post-like element found on the account's profile page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostHandle {
    /// Raw `data-ft` attribute.
    pub tracking: String,
    /// Element `id`, when the page assigns one.
    pub id: Option<String>,
    /// Outer markup of the element.
    pub html: String,
}

impl PostHandle {
    /// The `data-ft` payload decoded as JSON, if it is JSON.
    pub fn tracking_data(&self) -> Option<Value> {
        serde_json::from_str(&self.tracking).ok()
    }

    pub fn top_level_post_id(&self) -> Option<String> {
        self.tracking_field("top_level_post_id")
    }

    pub fn owner_id(&self) -> Option<String> {
        self.tracking_field("content_owner_id_new")
    }

    fn tracking_field(&self, key: &str) -> Option<String> {
        match self.tracking_data()?.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}
