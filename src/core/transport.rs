use crate::core::error::Result;
use crate::core::request::{Request, Response};
use async_trait::async_trait;

/// Anything that can carry a request to the network and bring back a
/// response. Connection-level failures surface as `NetworkFailure`;
/// non-2xx statuses are still responses.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response>;
}
