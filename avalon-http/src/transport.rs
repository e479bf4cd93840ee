//! Transport knobs applied when a session's `reqwest::Client` is built.
//!
//! These replace build-flavour switches: relaxed certificate checks, an
//! intercepting proxy and connection tracing are plain values a caller (or a
//! test) sets explicitly.

use std::fmt;
use std::time::Duration;

use reqwest::redirect::Policy;
use reqwest::{Certificate, ClientBuilder, Identity, Proxy};

use crate::HttpError;

const MAX_REDIRECTS: usize = 10;

/// PKCS#12 bundle presented as the TLS client certificate.
#[derive(Clone)]
pub struct ClientIdentity {
    pub pkcs12: Vec<u8>,
    pub password: String,
}

impl fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("pkcs12_len", &self.pkcs12.len())
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Transport configuration for an [`crate::HttpSession`].
///
/// ```
/// use avalon_http::TransportOptions;
/// use std::time::Duration;
///
/// let opts = TransportOptions {
///     proxy: Some("http://127.0.0.1:8080".into()),
///     accept_invalid_certs: true,
///     timeout: Some(Duration::from_secs(30)),
///     ..Default::default()
/// };
/// assert!(opts.client_identity.is_none());
/// assert!(!opts.verbose);
/// ```
#[derive(Clone, Debug, Default)]
pub struct TransportOptions {
    /// Skip server certificate validation.
    pub accept_invalid_certs: bool,
    /// Forward proxy for every scheme, e.g. `http://127.0.0.1:8080`.
    pub proxy: Option<String>,
    /// Extra trusted root, DER or PEM encoded.
    pub root_certificate: Option<Vec<u8>>,
    pub client_identity: Option<ClientIdentity>,
    /// Whole-request timeout. Unset means no timeout.
    pub timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    /// Connection-level tracing from `reqwest`.
    pub verbose: bool,
}

impl TransportOptions {
    pub(crate) fn client_builder(&self) -> Result<ClientBuilder, HttpError> {
        let mut builder = ClientBuilder::new()
            .redirect(Policy::limited(MAX_REDIRECTS))
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .connection_verbose(self.verbose);

        if let Some(proxy) = &self.proxy {
            let proxy = Proxy::all(proxy.as_str())
                .map_err(|e| HttpError::Build(format!("invalid proxy {proxy}: {e}")))?;
            builder = builder.proxy(proxy);
        }

        if let Some(bytes) = &self.root_certificate {
            builder = builder.add_root_certificate(parse_certificate(bytes)?);
        }

        if let Some(identity) = &self.client_identity {
            let identity = Identity::from_pkcs12_der(&identity.pkcs12, &identity.password)
                .map_err(|e| HttpError::Build(format!("invalid client identity: {e}")))?;
            builder = builder.identity(identity);
        }

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }

        Ok(builder)
    }
}

fn parse_certificate(bytes: &[u8]) -> Result<Certificate, HttpError> {
    let parsed = if bytes.starts_with(b"-----BEGIN") {
        Certificate::from_pem(bytes)
    } else {
        Certificate::from_der(bytes)
    };
    parsed.map_err(|e| HttpError::Build(format!("invalid root certificate: {e}")))
}
