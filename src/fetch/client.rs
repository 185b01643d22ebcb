use async_trait::async_trait;
use reqwest::{Request, Response};

/// Executes a prepared key-listing request.
///
/// [`super::BasicClient`] is the production implementation; tests plug in
/// canned responses behind the same seam.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
