//! Hook for acting on enumerated profile posts.
//!
//! No remover ships with this crate: which endpoint removes a post and how
//! its confirmation step works are not modelled here. Callers plug in their
//! own implementation and drive it through
//! [`crate::facebook::Gateway::purge_own_posts`].

use async_trait::async_trait;
use avalon_http::HttpSession;
use tokio_util::sync::CancellationToken;

use crate::facebook::{GatewayError, PostHandle, Site};

#[async_trait]
pub trait PostRemover: Send + Sync {
    /// Act on one post using the gateway's authenticated session.
    async fn remove(
        &self,
        session: &HttpSession,
        site: &Site,
        post: &PostHandle,
        cancel: &CancellationToken,
    ) -> Result<(), GatewayError>;
}
