//! Key Aggregator: fetches every configured user and joins the listings.
//!
//! A failure for one user never aborts the batch. That user simply
//! contributes nothing this cycle.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::fetch::{FetchError, HttpClient, fetch_keys};

/// The joined key listings of one cycle, in username order.
///
/// Listings are raw bytes from upstream and are never decoded.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct KeyBlob {
    keys: Vec<u8>,
    /// Users whose listing was fetched, including empty ones.
    pub fetched: Vec<String>,
    /// Users skipped because their fetch failed.
    pub skipped: Vec<String>,
}

impl KeyBlob {
    /// Appends one user's listing, keeping each user's block on its own lines.
    fn push(&mut self, user: &str, keys: &[u8]) {
        self.fetched.push(user.to_string());
        if keys.is_empty() {
            return;
        }
        if !self.keys.is_empty() && !self.keys.ends_with(b"\n") {
            self.keys.push(b'\n');
        }
        self.keys.extend_from_slice(keys);
    }

    fn record(&mut self, user: &str, result: Result<Vec<u8>, FetchError>) {
        match result {
            Ok(keys) => self.push(user, &keys),
            Err(e) => {
                warn!(user = %user, error = %e, "Skipping user for this cycle");
                self.skipped.push(user.to_string());
            }
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.keys
    }
}

/// Fetches keys for `users` from `host` and joins the successful listings.
///
/// With `concurrency <= 1` users are fetched strictly one after another.
/// Larger values fan out up to that many requests at once; results are
/// still joined in the order `users` lists them. Duplicate usernames are
/// fetched and joined as many times as they appear.
pub async fn aggregate_keys<C: HttpClient + 'static>(
    client: Arc<C>,
    host: &str,
    users: &[String],
    concurrency: usize,
) -> KeyBlob {
    let mut blob = KeyBlob::default();

    if concurrency <= 1 {
        for user in users {
            let result = fetch_keys(client.as_ref(), host, user).await;
            blob.record(user, result);
        }
    } else {
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut tasks = Vec::with_capacity(users.len());

        for user in users {
            let sem = semaphore.clone();
            let client = client.clone();
            let host = host.to_string();
            let user = user.clone();

            tasks.push(tokio::spawn(async move {
                let _permit = sem.acquire().await;
                fetch_keys(client.as_ref(), &host, &user).await
            }));
        }

        for (user, task) in users.iter().zip(tasks) {
            match task.await {
                Ok(result) => blob.record(user, result),
                Err(e) => {
                    warn!(user = %user, error = %e, "Fetch task did not complete");
                    blob.skipped.push(user.clone());
                }
            }
        }
    }

    debug!(
        fetched = blob.fetched.len(),
        skipped = blob.skipped.len(),
        bytes = blob.keys.len(),
        "Aggregated key listings"
    );
    blob
}
