//! Minimal HTTP/1.1 server for tests.
//!
//! Serves a fixed table of paths; anything else is a 404. One request per
//! connection.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use url::Url;

use crate::config::SessionSettings;
use crate::http_client::HttpClient;
use crate::rate_limiter::RateLimiter;

pub struct Route {
    pub path: &'static str,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Route {
    pub fn new(path: &'static str, content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            path,
            content_type,
            body: body.into(),
        }
    }
}

/// Start serving `routes` on an ephemeral port and return the base URL.
pub async fn serve(routes: Vec<Route>) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let routes: Arc<HashMap<&'static str, Route>> =
        Arc::new(routes.into_iter().map(|r| (r.path, r)).collect());

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(respond(socket, routes.clone()));
        }
    });

    Url::parse(&format!("http://{}/", addr)).unwrap()
}

async fn respond(mut socket: TcpStream, routes: Arc<HashMap<&'static str, Route>>) {
    let mut buf = vec![0u8; 8192];
    let mut read = 0;
    while read < buf.len() {
        match socket.read(&mut buf[read..]).await {
            Ok(0) | Err(_) => break,
            Ok(n) => read += n,
        }
        if buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }

    let request = String::from_utf8_lossy(&buf[..read]);
    let path = request.split_whitespace().nth(1).unwrap_or("/");
    let (status, content_type, body): (&str, &str, &[u8]) = match routes.get(path) {
        Some(route) => ("200 OK", route.content_type, &route.body),
        None => ("404 Not Found", "text/plain", b"not found"),
    };

    let head = format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        content_type,
        body.len()
    );
    let _ = socket.write_all(head.as_bytes()).await;
    let _ = socket.write_all(body).await;
    let _ = socket.shutdown().await;
}

/// Client for `base` with default session settings.
pub fn client(base: &Url, rate_limiter: RateLimiter) -> HttpClient {
    HttpClient::new(&SessionSettings::default(), rate_limiter, base)
        .ok()
        .unwrap()
}
