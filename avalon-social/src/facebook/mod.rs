//! Facebook mobile-lite (`mbasic`) integration.
//!
//! [`Gateway`] drives the login handshake and owns the session; the
//! [`extract`] functions turn fetched markup into [`types`] records and never
//! fail, malformed rows are skipped. [`removal`] is the hook for acting on
//! enumerated posts.
pub mod client;
pub mod error;
pub mod extract;
pub mod removal;
pub mod site;
pub mod types;

pub use client::Gateway;
pub use error::GatewayError;
pub use removal::PostRemover;
pub use site::Site;
pub use types::{AuthState, Credentials, Group, PostHandle};
