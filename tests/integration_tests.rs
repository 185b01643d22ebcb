use keysync::config::Config;
use keysync::fetch::BasicClient;
use keysync::scheduler::run;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Copy)]
enum Reply {
    Keys(&'static [u8]),
    /// 200 that promises 1000 bytes, sends these, then hangs up.
    Truncated(&'static [u8]),
}

/// Minimal HTTP/1.1 server answering `GET /{user}.keys` from a fixed table.
/// Unknown paths get a 404.
async fn serve_keys(routes: HashMap<&'static str, Reply>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let routes = routes.clone();
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }
                let request = String::from_utf8_lossy(&buf);
                let path = request.split_whitespace().nth(1).unwrap_or("/");
                let (status, length, body): (&str, usize, &[u8]) = match routes.get(path) {
                    Some(&Reply::Keys(body)) => ("200 OK", body.len(), body),
                    Some(&Reply::Truncated(body)) => ("200 OK", 1000, body),
                    None => ("404 Not Found", 9, b"Not Found"),
                };
                let head = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {length}\r\nConnection: close\r\n\r\n"
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(body).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{addr}")
}

fn one_shot(host: String, keyfile: &Path, users: &[&str]) -> Config {
    Config {
        keyfile: keyfile.to_path_buf(),
        host,
        users: users.iter().map(|u| u.to_string()).collect(),
        interval: Duration::from_secs(30),
        timeout: Duration::from_secs(5),
        concurrency: 1,
        once: true,
        debug: false,
    }
}

#[tokio::test]
async fn test_one_shot_skips_missing_user() {
    let host = serve_keys(HashMap::from([(
        "/alice.keys",
        Reply::Keys(b"ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIAlice alice\n"),
    )]))
    .await;
    let dir = tempfile::tempdir().unwrap();
    let keyfile = dir.path().join("authorized_keys");
    let config = one_shot(host, &keyfile, &["alice", "bob"]);
    let client = Arc::new(BasicClient::with_timeout(config.timeout).unwrap());

    let cycles = run(&config, client, CancellationToken::new()).await.unwrap();

    assert_eq!(cycles, 1);
    assert_eq!(
        std::fs::read_to_string(&keyfile).unwrap(),
        "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIAlice alice\n"
    );
}

#[tokio::test]
async fn test_one_shot_joins_users_in_order() {
    let host = serve_keys(HashMap::from([
        ("/alice.keys", Reply::Keys(b"ssh-ed25519 AAA alice")),
        ("/bob.keys", Reply::Keys(b"ssh-rsa BBB bob\nssh-ed25519 CCC bob\n")),
    ]))
    .await;
    let dir = tempfile::tempdir().unwrap();
    let keyfile = dir.path().join("authorized_keys");
    let mut config = one_shot(host, &keyfile, &["alice", "bob"]);
    config.concurrency = 2;
    let client = Arc::new(BasicClient::with_timeout(config.timeout).unwrap());

    run(&config, client, CancellationToken::new()).await.unwrap();

    assert_eq!(
        std::fs::read_to_string(&keyfile).unwrap(),
        "ssh-ed25519 AAA alice\nssh-rsa BBB bob\nssh-ed25519 CCC bob\n"
    );
}

#[tokio::test]
async fn test_key_bytes_are_published_verbatim() {
    // Latin-1 comment bytes, even though the server claims utf-8.
    let host = serve_keys(HashMap::from([
        ("/alice.keys", Reply::Keys(b"ssh-rsa AAA caf\xe9 x\n")),
        ("/bob.keys", Reply::Keys(b"ssh-ed25519 BBB b\xf6b")),
    ]))
    .await;
    let dir = tempfile::tempdir().unwrap();
    let keyfile = dir.path().join("authorized_keys");
    let config = one_shot(host, &keyfile, &["alice", "bob"]);
    let client = Arc::new(BasicClient::with_timeout(config.timeout).unwrap());

    run(&config, client, CancellationToken::new()).await.unwrap();

    assert_eq!(
        std::fs::read(&keyfile).unwrap(),
        b"ssh-rsa AAA caf\xe9 x\nssh-ed25519 BBB b\xf6b"
    );
}

#[tokio::test]
async fn test_truncated_body_skips_only_that_user() {
    let host = serve_keys(HashMap::from([
        ("/alice.keys", Reply::Truncated(b"ssh-ed25519 AAA al")),
        ("/bob.keys", Reply::Keys(b"bob-key\n")),
    ]))
    .await;
    let dir = tempfile::tempdir().unwrap();
    let keyfile = dir.path().join("authorized_keys");
    let config = one_shot(host, &keyfile, &["alice", "bob"]);
    let client = Arc::new(BasicClient::with_timeout(config.timeout).unwrap());

    let cycles = run(&config, client, CancellationToken::new()).await.unwrap();

    assert_eq!(cycles, 1);
    assert_eq!(std::fs::read_to_string(&keyfile).unwrap(), "bob-key\n");
}

#[tokio::test]
async fn test_unreachable_host_publishes_empty_file() {
    // Nothing listens on a port we bound and released.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let dir = tempfile::tempdir().unwrap();
    let keyfile = dir.path().join("authorized_keys");
    std::fs::write(&keyfile, "ssh-rsa STALE stale\n").unwrap();
    let config = one_shot(format!("http://127.0.0.1:{port}"), &keyfile, &["alice", "bob"]);
    let client = Arc::new(BasicClient::with_timeout(config.timeout).unwrap());

    let cycles = run(&config, client, CancellationToken::new()).await.unwrap();

    assert_eq!(cycles, 1);
    assert_eq!(std::fs::metadata(&keyfile).unwrap().len(), 0);
}
