use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

/// Reasons a single user's key listing could not be obtained.
///
/// Every variant is recoverable: the aggregator logs it and moves on to the
/// next user.
#[derive(Error, Debug)]
pub enum FetchError {
    /// `{host}/{user}.keys` did not form a valid URL.
    #[error("invalid key URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// Transport-level failure (DNS, connect, TLS, timeout).
    #[error("fetching {url} failed: {source}")]
    FetchFailed {
        url: Url,
        #[source]
        source: reqwest::Error,
    },

    /// The endpoint answered with anything other than 200.
    #[error("expected status code 200 from {url} but got {status}")]
    UnexpectedStatus { url: Url, status: StatusCode },

    /// The status was fine but the body could not be read to the end.
    #[error("reading response body from {url} failed: {source}")]
    ResponseReadFailed {
        url: Url,
        #[source]
        source: reqwest::Error,
    },
}
