use super::client::HttpClient;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::net::{Ipv4Addr, TcpListener};
use std::sync::Mutex;

/// Serves canned key listings keyed by username. Unknown users get a 404.
#[derive(Default)]
pub(crate) struct MockClient {
    responses: HashMap<String, (u16, Vec<u8>)>,
    unreachable: HashSet<String>,
    requests: Mutex<Vec<String>>,
}

impl MockClient {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_keys(self, user: &str, body: &str) -> Self {
        self.with_response(user, 200, body)
    }

    pub(crate) fn with_response(self, user: &str, status: u16, body: &str) -> Self {
        self.with_response_bytes(user, status, body.as_bytes())
    }

    pub(crate) fn with_response_bytes(mut self, user: &str, status: u16, body: &[u8]) -> Self {
        self.responses
            .insert(format!("/{user}.keys"), (status, body.to_vec()));
        self
    }

    /// Requests for `user` fail at the transport layer.
    pub(crate) fn with_unreachable(mut self, user: &str) -> Self {
        self.unreachable.insert(format!("/{user}.keys"));
        self
    }

    pub(crate) fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for MockClient {
    async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        self.requests.lock().unwrap().push(req.url().to_string());
        let path = req.url().path().to_string();

        if self.unreachable.contains(&path) {
            // Bind then drop a listener so the port is known to be closed.
            let port = {
                let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
                listener.local_addr().unwrap().port()
            };
            return reqwest::Client::new()
                .get(format!("http://127.0.0.1:{port}{path}"))
                .send()
                .await;
        }

        let (status, body) = self
            .responses
            .get(&path)
            .cloned()
            .unwrap_or((404, b"Not Found".to_vec()));
        let resp = http::Response::builder().status(status).body(body).unwrap();
        Ok(reqwest::Response::from(resp))
    }
}
