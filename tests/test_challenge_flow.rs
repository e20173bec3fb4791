//! End-to-end runs of the gate event loop.
//!
//! Most tests run on a paused clock with a canned verification result. The
//! last one runs in real time against the fake host with short windows.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{ActivationReply, FakeHost};
use knockgate::activation::{Activator, HttpActivator};
use knockgate::config::schema::GateConfig;
use knockgate::error::ActivationError;
use knockgate::gate::{Gate, GateEvent, GateExit, TimingWindow, ZoneId};
use knockgate::surface::{RecordingSurface, SurfaceEffect};
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

struct Canned(Result<String, ActivationError>);

#[async_trait]
impl Activator for Canned {
    async fn activate(&self) -> Result<String, ActivationError> {
        self.0.clone()
    }
}

fn click(tx: &UnboundedSender<GateEvent>, zone: ZoneId) {
    tx.send(GateEvent::Click(zone)).expect("gate stopped");
}

/// Plays the three knocks and the arming click with stock timings.
async fn knock(tx: &UnboundedSender<GateEvent>) {
    click(tx, ZoneId::A);
    sleep(Duration::from_millis(2500)).await;
    click(tx, ZoneId::B);
    sleep(Duration::from_millis(3500)).await;
    click(tx, ZoneId::C);
    sleep(Duration::from_millis(2500)).await;
    click(tx, ZoneId::C);
    sleep(Duration::from_millis(200)).await;
}

fn burst(tx: &UnboundedSender<GateEvent>, clicks: usize) {
    click(tx, ZoneId::C);
    for _ in 0..clicks {
        click(tx, ZoneId::C);
    }
}

fn spawn_gate(
    config: GateConfig,
    activator: Arc<dyn Activator>,
) -> (
    UnboundedSender<GateEvent>,
    RecordingSurface,
    CancellationToken,
    tokio::task::JoinHandle<GateExit>,
) {
    let surface = RecordingSurface::new();
    let gate = Gate::new(Arc::new(config), surface.clone(), activator);
    let tx = gate.sender();
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(gate.run(cancel.clone()));
    (tx, surface, cancel, handle)
}

#[tokio::test(start_paused = true)]
async fn passing_run_navigates_without_reload() {
    let (tx, surface, _cancel, handle) = spawn_gate(
        GateConfig::default(),
        Arc::new(Canned(Ok("http://gate.local/panel".into()))),
    );

    knock(&tx).await;
    burst(&tx, 200);

    let exit = tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("gate did not finish")
        .unwrap();
    assert_eq!(exit, GateExit::Navigated("http://gate.local/panel".into()));

    let snap = surface.snapshot();
    assert_eq!(snap.navigated_to.as_deref(), Some("http://gate.local/panel"));
    assert_eq!(snap.reloads, 0);
    // zones were swapped in order A, B, C
    let mounts: Vec<&str> = snap
        .effects
        .iter()
        .filter_map(|e| match e {
            SurfaceEffect::Mount(id) if id.starts_with("knock-zone") => Some(id.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(mounts, vec!["knock-zone-a", "knock-zone-b", "knock-zone-c"]);
}

#[tokio::test(start_paused = true)]
async fn slow_knock_resets_and_next_attempt_can_pass() {
    let (tx, surface, _cancel, handle) = spawn_gate(
        GateConfig::default(),
        Arc::new(Canned(Ok("/panel".into()))),
    );

    // B arrives after the first window closed
    click(&tx, ZoneId::A);
    sleep(Duration::from_millis(3600)).await;
    click(&tx, ZoneId::B);
    sleep(Duration::from_millis(100)).await;
    assert_eq!(surface.snapshot().reloads, 1);
    assert_eq!(surface.snapshot().mounted_ids(), vec!["knock-zone-a"]);

    knock(&tx).await;
    burst(&tx, 180);

    let exit = tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("gate did not finish")
        .unwrap();
    assert_eq!(exit, GateExit::Navigated("/panel".into()));
    assert_eq!(surface.snapshot().reloads, 1);
}

#[tokio::test(start_paused = true)]
async fn weak_burst_resets_and_never_calls_out() {
    let (tx, surface, cancel, handle) = spawn_gate(
        GateConfig::default(),
        Arc::new(Canned(Err(ActivationError::MissingTarget))),
    );

    knock(&tx).await;
    burst(&tx, 179);
    sleep(Duration::from_millis(3500)).await;

    let snap = surface.snapshot();
    assert_eq!(snap.reloads, 1);
    assert_eq!(snap.navigated_to, None);
    assert_eq!(snap.mounted_ids(), vec!["knock-zone-a"]);

    cancel.cancel();
    assert_eq!(handle.await.unwrap(), GateExit::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn failed_verification_resets() {
    let (tx, surface, cancel, handle) = spawn_gate(
        GateConfig::default(),
        Arc::new(Canned(Err(ActivationError::HttpStatus(403)))),
    );

    knock(&tx).await;
    burst(&tx, 190);
    sleep(Duration::from_millis(3500)).await;

    let snap = surface.snapshot();
    assert_eq!(snap.reloads, 1);
    assert_eq!(snap.navigated_to, None);

    cancel.cancel();
    assert_eq!(handle.await.unwrap(), GateExit::Cancelled);
}

#[tokio::test]
async fn real_host_short_windows() {
    let host = FakeHost::start(ActivationReply::Json(r#"{"path": "/vault"}"#)).await;

    let mut config = GateConfig::default();
    config.windows.first = TimingWindow::new(100, 1500);
    config.windows.second = TimingWindow::new(100, 1500);
    config.windows.blind = TimingWindow::new(100, 1500);
    config.burst.duration = Duration::from_millis(300);
    config.burst.threshold = 5;
    config.activation.base_url = host.base_url.clone();

    let activator = Arc::new(HttpActivator::new(&config.activation).unwrap());
    let (tx, surface, _cancel, handle) = spawn_gate(config, activator);

    for zone in [ZoneId::A, ZoneId::B, ZoneId::C, ZoneId::C] {
        click(&tx, zone);
        sleep(Duration::from_millis(400)).await;
    }
    burst(&tx, 20);

    let exit = tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("gate did not finish")
        .unwrap();
    let target = format!("{}/vault", host.base_url);
    assert_eq!(exit, GateExit::Navigated(target.clone()));
    assert_eq!(surface.snapshot().navigated_to, Some(target));
}
