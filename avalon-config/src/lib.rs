//! Loader for Avalon settings with YAML + environment overlays.
//!
//! Sources are merged by the `config` crate: YAML files or inline snippets,
//! then `AVALON_`-prefixed environment variables (`__` separates nesting, so
//! `AVALON_ACCOUNT__EMAIL` sets `account.email`). Environment values arrive
//! as strings, so they can only override string settings. After merging,
//! `${VAR}` placeholders anywhere in the tree are expanded.
//!
//! Only strings holding at least one `${...}` placeholder are expanded, so a
//! literal password such as `ab$HOME` is kept as written. Inside a string that
//! does hold a placeholder, a bare `$NAME` is expanded too; values substituted
//! from the environment are not re-expanded unless they contain `${`.
//!
//! ```yaml
//! account:
//!   email: "${AVALON_EMAIL}"
//!   password: "${AVALON_PASSWORD}"   # or a literal; `$` alone is not expanded
//! transport:
//!   proxy: "http://127.0.0.1:8080"
//!   accept_invalid_certs: true
//! logging:
//!   format: json
//! ```
use avalon_common::observability::{LogConfig, LogFormat};
use avalon_http::{ClientIdentity, HttpSession, TransportOptions};
use avalon_social::facebook::site::{COOKIE_ROOT, MBASIC_BASE, SESSION_COOKIE};
use avalon_social::facebook::{Credentials, Gateway, GatewayError, Site};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
const PLACEHOLDER: &str = "${";

#[derive(Debug, Error)]
pub enum AvalonConfigError {
    #[error(transparent)]
    Load(#[from] ConfigError),
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

#[derive(Debug, Deserialize)]
pub struct AvalonConfig {
    pub account: AccountConfig,
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    /// Fixed user agent; when absent one is drawn from the built-in pool.
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Deserialize)]
pub struct AccountConfig {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountConfig")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_cookie_root")]
    pub cookie_root: String,
    #[serde(default = "default_session_cookie")]
    pub session_cookie: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            cookie_root: default_cookie_root(),
            session_cookie: default_session_cookie(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TransportConfig {
    #[serde(default)]
    pub accept_invalid_certs: bool,
    #[serde(default)]
    pub proxy: Option<String>,
    /// DER or PEM file added as a trusted root.
    #[serde(default)]
    pub root_certificate: Option<PathBuf>,
    #[serde(default)]
    pub client_identity: Option<IdentityConfig>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,
    #[serde(default)]
    pub verbose: bool,
}

/// PKCS#12 client certificate on disk.
#[derive(Deserialize)]
pub struct IdentityConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub password: String,
}

impl fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("path", &self.path)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default)]
    pub stderr: bool,
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: None,
            format: LogFormat::default(),
            stderr: false,
            filter: default_filter(),
        }
    }
}

fn default_base_url() -> String {
    MBASIC_BASE.into()
}
fn default_cookie_root() -> String {
    COOKIE_ROOT.into()
}
fn default_session_cookie() -> String {
    SESSION_COOKIE.into()
}
fn default_filter() -> String {
    "info".into()
}

impl AvalonConfig {
    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.account.email, &self.account.password)
    }

    pub fn site(&self) -> Result<Site, GatewayError> {
        Site::new(
            &self.site.base_url,
            &self.site.cookie_root,
            &self.site.session_cookie,
        )
    }

    /// Transport options with certificate files read into memory.
    pub fn transport_options(&self) -> Result<TransportOptions, AvalonConfigError> {
        let t = &self.transport;
        let root_certificate = t.root_certificate.as_deref().map(read_file).transpose()?;
        let client_identity = t
            .client_identity
            .as_ref()
            .map(|id| {
                Ok::<_, AvalonConfigError>(ClientIdentity {
                    pkcs12: read_file(&id.path)?,
                    password: id.password.clone(),
                })
            })
            .transpose()?;

        Ok(TransportOptions {
            accept_invalid_certs: t.accept_invalid_certs,
            proxy: t.proxy.clone(),
            root_certificate,
            client_identity,
            timeout: t.timeout_secs.map(Duration::from_secs),
            connect_timeout: t.connect_timeout_secs.map(Duration::from_secs),
            verbose: t.verbose,
        })
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            log_dir: self.logging.dir.clone(),
            emit_stderr: self.logging.stderr,
            format: self.logging.format,
            default_filter: self.logging.filter.clone(),
            ..LogConfig::default()
        }
    }

    /// Assemble a gateway with its own fresh session.
    pub fn gateway(&self) -> Result<Gateway, AvalonConfigError> {
        let transport = self.transport_options()?;
        let http = match &self.user_agent {
            Some(ua) => HttpSession::with_user_agent(transport, ua.as_str()),
            None => HttpSession::new(transport),
        }
        .map_err(GatewayError::from)?;
        Ok(Gateway::with_session(self.credentials(), self.site()?, http))
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, AvalonConfigError> {
    std::fs::read(path).map_err(|source| AvalonConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains(PLACEHOLDER) {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    if !cur.contains(PLACEHOLDER) {
                        break;
                    }
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder over the `config` crate wiring (YAML + env overrides).
pub struct AvalonConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for AvalonConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl AvalonConfigLoader {
    /// Empty loader. `AVALON_` environment overrides are applied on top of
    /// every attached source when [`AvalonConfigLoader::load`] runs.
    ///
    /// ```
    /// use avalon_config::AvalonConfigLoader;
    ///
    /// let config = AvalonConfigLoader::new()
    ///     .with_yaml_str("account: { email: a@example.com, password: pw }")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.account.email, "a@example.com");
    /// assert_eq!(config.site.session_cookie, "c_user");
    /// assert!(config.user_agent.is_none());
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
        }
    }

    /// Attach a YAML/TOML/JSON file; the format is inferred from the suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that may be absent.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Merge an inline YAML snippet.
    ///
    /// ```
    /// use avalon_config::AvalonConfigLoader;
    /// use avalon_common::observability::LogFormat;
    ///
    /// let cfg = AvalonConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// account:
    ///   email: "b@example.com"
    ///   password: "pw"
    /// transport:
    ///   proxy: "http://127.0.0.1:8080"
    ///   accept_invalid_certs: true
    ///   timeout_secs: 30
    /// logging:
    ///   format: json
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// let transport = cfg.transport_options().unwrap();
    /// assert!(transport.accept_invalid_certs);
    /// assert_eq!(transport.timeout.unwrap().as_secs(), 30);
    /// assert_eq!(cfg.log_config().format, LogFormat::Json);
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Merge all sources, expand `${VAR}` placeholders and deserialize.
    ///
    /// Environment variables are the last source, so they win over files.
    pub fn load(self) -> Result<AvalonConfig, ConfigError> {
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix("AVALON")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let typed: AvalonConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;

        Ok(typed)
    }
}
