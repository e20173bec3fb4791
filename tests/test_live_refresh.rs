mod common;

use std::time::Duration;

use common::{ActivationReply, FakeHost, SERVER_LIST};
use knockgate::config::schema::RefreshConfig;
use knockgate::error::RefreshError;
use knockgate::refresh::{FragmentSink, LiveRefresh};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Forwards every swap to a channel.
struct ChannelSink(mpsc::UnboundedSender<(String, String)>);

impl FragmentSink for ChannelSink {
    fn swap(&mut self, container: &str, html: String) {
        let _ = self.0.send((container.to_string(), html));
    }
}

#[tokio::test]
async fn csrf_token_read_from_page() {
    let host = FakeHost::start(ActivationReply::Status(404)).await;
    let refresh = LiveRefresh::new(&host.base_url, RefreshConfig::default()).unwrap();
    assert_eq!(refresh.csrf_token().await.unwrap(), "page-token-42");
}

#[tokio::test]
async fn page_without_token_is_an_error() {
    let host = FakeHost::start(ActivationReply::Status(404)).await;
    let config = RefreshConfig {
        page_path: "/_get_server_list".to_string(),
        ..RefreshConfig::default()
    };
    let refresh = LiveRefresh::new(&host.base_url, config).unwrap();
    assert!(matches!(
        refresh.csrf_token().await,
        Err(RefreshError::MissingCsrfToken(_))
    ));
}

#[tokio::test]
async fn update_signal_swaps_fragments_with_csrf_header() {
    let host = FakeHost::start(ActivationReply::Status(404)).await;
    let refresh = LiveRefresh::new(&host.base_url, RefreshConfig::default()).unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let task = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            let mut sink = ChannelSink(tx);
            refresh.run(&mut sink, cancel).await
        }
    });

    let (container, html) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no swap within 5s")
        .expect("sink dropped");
    assert_eq!(container, "server-list");
    assert_eq!(html, SERVER_LIST);

    // the downtime table fails on the host and is skipped; the stream closes
    // and the client reconnects after the advertised 50ms
    let (again, _) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no swap after reconnect")
        .expect("sink dropped");
    assert_eq!(again, "server-list");

    cancel.cancel();
    task.await.unwrap().unwrap();

    assert!(*host.subscriptions.lock().unwrap() >= 2);
    let seen = host.csrf_seen.lock().unwrap();
    assert!(seen.len() >= 2);
    assert!(seen.iter().all(|t| t == "page-token-42"));
}

#[tokio::test]
async fn configured_token_is_sent() {
    let host = FakeHost::start(ActivationReply::Status(404)).await;
    let config = RefreshConfig {
        csrf_token: Some("fixed-token".to_string()),
        ..RefreshConfig::default()
    };
    let refresh = LiveRefresh::new(&host.base_url, config).unwrap();

    let (tx, _rx) = mpsc::unbounded_channel();
    let mut sink = ChannelSink(tx);
    let swapped = refresh.refresh_fragments("fixed-token", &mut sink).await;

    assert_eq!(swapped, 1);
    assert_eq!(*host.csrf_seen.lock().unwrap(), vec!["fixed-token".to_string()]);
}
