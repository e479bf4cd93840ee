use avalon_http::HttpError;
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Transport failure, including cancellation.
    #[error(transparent)]
    Network(#[from] HttpError),

    #[error("unexpected response {status} from {url}")]
    UnexpectedResponse { status: StatusCode, url: String },

    /// The login round trip completed but no session cookie was issued.
    #[error("invalid account credentials")]
    InvalidCredentials,

    #[error("session is not authenticated")]
    NotAuthenticated,

    #[error("invalid site URL: {0}")]
    InvalidUrl(String),

    #[error("post removal failed: {0}")]
    Removal(String),
}

impl GatewayError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Network(HttpError::Cancelled))
    }
}
