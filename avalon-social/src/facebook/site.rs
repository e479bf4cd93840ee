//! Endpoints and fixed request values for the mobile-lite host.
//!
//! The host is data rather than a literal so the whole flow can run against a
//! local server; [`Site::mbasic`] is the production description.

use url::Url;

use crate::facebook::GatewayError;

pub const MBASIC_BASE: &str = "https://mbasic.facebook.com/";
pub const COOKIE_ROOT: &str = "https://facebook.com/";
pub const SESSION_COOKIE: &str = "c_user";

pub const ACCEPT_LANGUAGE: &str = "pt-BR,pt;q=0.8,en-US;q=0.5,en;q=0.3";
/// Literal value of the login form's submit button.
pub const LOGIN_BUTTON: &str = "Entrar";

const LOGIN_PATH: &str = "login/device-based/regular/login/";
const GROUPS_PATH: &str = "groups/?seemore";
const PROFILE_PATH: &str = "profile.php";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
    landing: Url,
    login: Url,
    groups: Url,
    profile: Url,
    cookie_root: Url,
    session_cookie: String,
}

impl Site {
    /// ```
    /// use avalon_social::facebook::Site;
    ///
    /// let site = Site::mbasic();
    /// assert_eq!(site.landing().as_str(), "https://mbasic.facebook.com/");
    /// assert_eq!(
    ///     site.login().as_str(),
    ///     "https://mbasic.facebook.com/login/device-based/regular/login/?refsrc=https://mbasic.facebook.com"
    /// );
    /// assert_eq!(site.groups().as_str(), "https://mbasic.facebook.com/groups/?seemore");
    /// assert_eq!(site.session_cookie(), "c_user");
    /// ```
    pub fn mbasic() -> Self {
        match Self::new(MBASIC_BASE, COOKIE_ROOT, SESSION_COOKIE) {
            Ok(site) => site,
            Err(e) => unreachable!("built-in site description is valid: {e}"),
        }
    }

    /// Describe a site rooted at `base`. The session cookie is looked up in
    /// the jar as it would be sent to `cookie_root`.
    pub fn new(
        base: &str,
        cookie_root: &str,
        session_cookie: impl Into<String>,
    ) -> Result<Self, GatewayError> {
        let landing = parse_base(base)?;
        let cookie_root =
            Url::parse(cookie_root).map_err(|e| GatewayError::InvalidUrl(format!("{cookie_root}: {e}")))?;

        let mut login = join(&landing, LOGIN_PATH)?;
        let refsrc = landing.as_str().trim_end_matches('/').to_string();
        login.set_query(Some(&format!("refsrc={refsrc}")));

        Ok(Self {
            login,
            groups: join(&landing, GROUPS_PATH)?,
            profile: join(&landing, PROFILE_PATH)?,
            landing,
            cookie_root,
            session_cookie: session_cookie.into(),
        })
    }

    /// A site whose cookies are scoped to its own host, with the production
    /// session cookie name.
    pub fn for_base(base: &str) -> Result<Self, GatewayError> {
        Self::new(base, base, SESSION_COOKIE)
    }

    pub fn landing(&self) -> &Url {
        &self.landing
    }

    pub fn login(&self) -> &Url {
        &self.login
    }

    pub fn groups(&self) -> &Url {
        &self.groups
    }

    pub fn profile(&self) -> &Url {
        &self.profile
    }

    pub fn cookie_root(&self) -> &Url {
        &self.cookie_root
    }

    pub fn session_cookie(&self) -> &str {
        &self.session_cookie
    }
}

impl Default for Site {
    fn default() -> Self {
        Self::mbasic()
    }
}

fn parse_base(base: &str) -> Result<Url, GatewayError> {
    // Relative joins need the trailing slash.
    let normalized = if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{base}/")
    };
    let url = Url::parse(&normalized).map_err(|e| GatewayError::InvalidUrl(format!("{base}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(GatewayError::InvalidUrl(format!("{base}: not a base URL")));
    }
    Ok(url)
}

fn join(base: &Url, path: &str) -> Result<Url, GatewayError> {
    base.join(path)
        .map_err(|e| GatewayError::InvalidUrl(format!("{base}{path}: {e}")))
}
