//! Shared integration-test harness: a fake host serving the verification
//! endpoint, the push stream, the fragments and the page carrying the CSRF
//! token, plus a helper for running the `knockgate` binary.

#![allow(dead_code)]

use std::process::Output;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Page served at `/` with the CSRF token in its metadata.
pub const PAGE: &str = r#"<!doctype html>
<html><head>
  <meta charset="utf-8">
  <meta name="csrf-token" content="page-token-42">
</head><body><ul id="server-list"></ul></body></html>"#;

/// Push stream body: advertises a short retry, sends a keep-alive comment
/// and one update signal, then closes.
pub const STREAM: &str = "retry: 50\n\n: keep-alive\n\ndata: update\n\n";

/// Fragment served at `/_get_server_list`.
pub const SERVER_LIST: &str = "<li>alpha</li><li>beta</li>";

/// How the fake host answers the verification call.
#[derive(Debug, Clone)]
pub enum ActivationReply {
    /// 200 with this JSON body
    Json(&'static str),
    /// Bare status code
    Status(u16),
    /// Never answer within any sane timeout
    Stall,
    /// 200 with a well-formed JSON body padded to this many bytes
    Padded(usize),
}

impl ActivationReply {
    async fn respond(self) -> Response {
        match self {
            Self::Json(body) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
            Self::Status(code) => StatusCode::from_u16(code)
                .expect("valid status code")
                .into_response(),
            Self::Stall => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                StatusCode::OK.into_response()
            }
            Self::Padded(size) => {
                let head = r#"{"path": "/hidden-panel", "pad": ""#;
                let pad = "x".repeat(size.saturating_sub(head.len() + 2));
                let body = format!("{head}{pad}\"}}");
                ([(header::CONTENT_TYPE, "application/json")], body).into_response()
            }
        }
    }
}

/// A fake host bound to an ephemeral port on loopback.
///
/// The server task is aborted on drop.
pub struct FakeHost {
    /// `http://127.0.0.1:<port>`
    pub base_url: String,
    /// `X-CSRFToken` values seen on fragment requests, in order
    pub csrf_seen: Arc<Mutex<Vec<String>>>,
    /// Number of push stream subscriptions
    pub subscriptions: Arc<Mutex<usize>>,
    task: JoinHandle<()>,
}

impl FakeHost {
    /// Starts a host answering the verification call with `reply`.
    #[allow(clippy::missing_panics_doc)]
    pub async fn start(reply: ActivationReply) -> Self {
        let csrf_seen = Arc::new(Mutex::new(Vec::new()));
        let subscriptions = Arc::new(Mutex::new(0));

        let app = Router::new()
            .route(
                "/_s_a_p_",
                get(move || {
                    let reply = reply.clone();
                    async move { reply.respond().await }
                }),
            )
            .route("/", get(|| async { Html(PAGE) }))
            .route(
                "/stream-updates",
                get({
                    let subscriptions = Arc::clone(&subscriptions);
                    move || {
                        *subscriptions.lock().unwrap() += 1;
                        async { ([(header::CONTENT_TYPE, "text/event-stream")], STREAM) }
                    }
                }),
            )
            .route(
                "/_get_server_list",
                get({
                    let csrf_seen = Arc::clone(&csrf_seen);
                    move |headers: HeaderMap| {
                        if let Some(token) = headers.get("x-csrftoken") {
                            csrf_seen
                                .lock()
                                .unwrap()
                                .push(token.to_str().unwrap_or_default().to_string());
                        }
                        async { Html(SERVER_LIST) }
                    }
                }),
            )
            .route(
                "/_get_downtime_table",
                get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
            );

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind fake host");
        let addr = listener.local_addr().expect("no local addr");
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fake host failed");
        });

        Self {
            base_url: format!("http://{addr}"),
            csrf_seen,
            subscriptions,
            task,
        }
    }
}

impl Drop for FakeHost {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Runs the `knockgate` binary to completion.
#[allow(clippy::missing_panics_doc)]
pub fn knockgate(args: &[&str]) -> Output {
    std::process::Command::new(env!("CARGO_BIN_EXE_knockgate"))
        .args(args)
        .env_remove("KNOCKGATE_CONFIG")
        .env_remove("KNOCKGATE_BASE_URL")
        .env_remove("KNOCKGATE_LOG_LEVEL")
        .output()
        .expect("failed to run knockgate")
}
