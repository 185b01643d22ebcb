//! Key Fetcher: downloads one user's public key listing.
//!
//! Keys are served as plain text at `{host}/{user}.keys`, one key per line.
//! The body is passed through untouched; no key syntax is checked here.

mod basic;
mod client;
mod error;
#[cfg(test)]
pub(crate) mod mock;

pub use basic::BasicClient;
pub use client::HttpClient;
pub use error::FetchError;

use reqwest::{Method, Request, StatusCode};
use tracing::debug;
use url::Url;

/// Builds the key-listing URL for `user` on `host`.
///
/// A trailing `/` on `host` is ignored.
pub fn key_url(host: &str, user: &str) -> Result<Url, FetchError> {
    let raw = format!("{}/{}.keys", host.trim_end_matches('/'), user);
    Url::parse(&raw).map_err(|source| FetchError::InvalidUrl { url: raw, source })
}

/// Fetches the raw key listing for `user`.
///
/// Issues one GET with no retry. Only a `200 OK` counts as success. The body
/// bytes are returned exactly as received, with no charset decoding.
#[tracing::instrument(skip_all, fields(user = %user))]
pub async fn fetch_keys<C: HttpClient + ?Sized>(
    client: &C,
    host: &str,
    user: &str,
) -> Result<Vec<u8>, FetchError> {
    let url = key_url(host, user)?;
    debug!(url = %url, "Fetching keys");

    let req = Request::new(Method::GET, url.clone());
    let resp = match client.execute(req).await {
        Ok(resp) => resp,
        Err(source) => return Err(FetchError::FetchFailed { url, source }),
    };

    let status = resp.status();
    if status != StatusCode::OK {
        return Err(FetchError::UnexpectedStatus { url, status });
    }

    match resp.bytes().await {
        Ok(body) => {
            debug!(bytes = body.len(), "Key listing received");
            Ok(body.to_vec())
        }
        Err(source) => Err(FetchError::ResponseReadFailed { url, source }),
    }
}
