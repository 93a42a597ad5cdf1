// Shared test helpers: sample data, a stub Sorti API server, and a
// recording render surface.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::ws::{Message, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use tokio::sync::broadcast;

use sorti_dash::api_repo::ApiRepo;
use sorti_dash::coordinator::{self, CoordinatorConfig, CoordinatorDeps, CoordinatorHandle};
use sorti_dash::models::*;
use sorti_dash::store::ClientStore;
use sorti_dash::view::{BinRow, EventsPane, RenderSurface};

pub const ADMIN_KEY: &str = "test-admin-key";
pub const INGEST_KEY: &str = "test-ingest-key";

pub fn sample_bin(bin_id: &str, capacity_g: f64, current_weight_g: f64) -> Bin {
    Bin {
        bin_id: bin_id.into(),
        capacity_g,
        current_weight_g,
        last_seen: Some("2026-02-01T10:00:00Z".into()),
    }
}

pub fn sample_event(id: &str, bin_id: &str, material: &str, weight_g: f64) -> Event {
    Event {
        id: Some(id.into()),
        ts: "2026-02-01T10:00:00Z".into(),
        bin_id: bin_id.into(),
        material: material.into(),
        weight_g,
        co2_saved_g: weight_g * 1.5,
    }
}

pub fn sample_snapshot() -> Snapshot {
    Snapshot {
        bins: vec![
            sample_bin("SORTI_001", 10_000.0, 9_000.0),
            sample_bin("SORTI_002", 10_000.0, 4_000.0),
        ],
        totals: Totals {
            total_weight_g: 13_000.0,
            total_co2_saved_g: 19_500.0,
        },
        daily: vec![DailyPoint {
            day: "2026-02-01".into(),
            weight_g: 13_000.0,
            co2_saved_g: 19_500.0,
        }],
        by_material: vec![MaterialTotal {
            material: "plastica".into(),
            weight_g: 13_000.0,
            co2_saved_g: 19_500.0,
        }],
        events: vec![sample_event("ev-1", "SORTI_001", "plastica", 18.0)],
        events_visible: true,
    }
}

/// Frames the stub pushes to connected update-channel clients.
#[derive(Debug, Clone)]
pub enum PushFrame {
    Text(String),
    Close,
}

/// In-process Sorti API stand-in. Counters expose what the client did;
/// flags steer failure modes.
pub struct StubState {
    pub snapshot: Mutex<Snapshot>,
    pub fetch_count: AtomicUsize,
    concurrent_fetches: AtomicUsize,
    pub max_concurrent_fetches: AtomicUsize,
    pub fetch_delay_ms: AtomicU64,
    pub fail_fetches: AtomicBool,
    pub garbage_body: AtomicBool,
    pub push_tx: broadcast::Sender<PushFrame>,
}

impl StubState {
    pub fn new() -> Arc<Self> {
        let (push_tx, _) = broadcast::channel(32);
        Arc::new(Self {
            snapshot: Mutex::new(sample_snapshot()),
            fetch_count: AtomicUsize::new(0),
            concurrent_fetches: AtomicUsize::new(0),
            max_concurrent_fetches: AtomicUsize::new(0),
            fetch_delay_ms: AtomicU64::new(0),
            fail_fetches: AtomicBool::new(false),
            garbage_body: AtomicBool::new(false),
            push_tx,
        })
    }

    pub fn fetches(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }

    pub fn push(&self, text: &str) {
        let _ = self.push_tx.send(PushFrame::Text(text.to_string()));
    }

    pub fn close_channel(&self) {
        let _ = self.push_tx.send(PushFrame::Close);
    }
}

fn admin_ok(headers: &HeaderMap) -> bool {
    headers.get("x-api-key").and_then(|v| v.to_str().ok()) == Some(ADMIN_KEY)
}

async fn dashboard(State(state): State<Arc<StubState>>, headers: HeaderMap) -> impl IntoResponse {
    state.fetch_count.fetch_add(1, Ordering::SeqCst);
    let now = state.concurrent_fetches.fetch_add(1, Ordering::SeqCst) + 1;
    state.max_concurrent_fetches.fetch_max(now, Ordering::SeqCst);
    let delay = state.fetch_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(tokio::time::Duration::from_millis(delay)).await;
    }
    state.concurrent_fetches.fetch_sub(1, Ordering::SeqCst);

    if state.fail_fetches.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "stub failure").into_response();
    }
    if state.garbage_body.load(Ordering::SeqCst) {
        return (StatusCode::OK, "{ this is not json").into_response();
    }
    let mut snapshot = state.snapshot.lock().unwrap().clone();
    snapshot.events_visible = admin_ok(&headers);
    if !snapshot.events_visible {
        snapshot.events.clear();
    }
    axum::Json(snapshot).into_response()
}

async fn set_capacity(
    State(state): State<Arc<StubState>>,
    Path(bin_id): Path<String>,
    headers: HeaderMap,
    axum::Json(body): axum::Json<serde_json::Value>,
) -> impl IntoResponse {
    if !admin_ok(&headers) {
        return (StatusCode::UNAUTHORIZED, "Unauthorized (admin)").into_response();
    }
    let capacity_g = body
        .get("capacity_g")
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0);
    let mut snapshot = state.snapshot.lock().unwrap();
    if let Some(bin) = snapshot.bins.iter_mut().find(|b| b.bin_id == bin_id) {
        bin.capacity_g = capacity_g;
    }
    axum::Json(serde_json::json!({ "ok": true, "bin_id": bin_id, "capacity_g": capacity_g }))
        .into_response()
}

async fn empty_bin(
    State(state): State<Arc<StubState>>,
    Path(bin_id): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if !admin_ok(&headers) {
        return (StatusCode::UNAUTHORIZED, "Unauthorized (admin)").into_response();
    }
    let mut snapshot = state.snapshot.lock().unwrap();
    let Some(bin) = snapshot.bins.iter_mut().find(|b| b.bin_id == bin_id) else {
        return (StatusCode::NOT_FOUND, "Bin non trovato").into_response();
    };
    bin.current_weight_g = 0.0;
    axum::Json(serde_json::json!({
        "ok": true,
        "bin_id": bin_id,
        "emptied_at": "2026-02-01T12:00:00Z"
    }))
    .into_response()
}

async fn submit_event(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    axum::Json(body): axum::Json<serde_json::Value>,
) -> impl IntoResponse {
    let ingest_ok = headers.get("x-ingest-key").and_then(|v| v.to_str().ok()) == Some(INGEST_KEY);
    if !ingest_ok {
        return (StatusCode::UNAUTHORIZED, "Unauthorized (ingest)").into_response();
    }
    let bin_id = body
        .get("bin_id")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let material = body
        .get("material")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let weight_g = body.get("weight_g").and_then(|v| v.as_f64()).unwrap_or(0.0);
    if material == "mistero" {
        return (StatusCode::BAD_REQUEST, "Materiale sconosciuto: mistero").into_response();
    }
    let mut snapshot = state.snapshot.lock().unwrap();
    let (capacity_g, current_weight_g) = match snapshot.bins.iter_mut().find(|b| b.bin_id == bin_id)
    {
        Some(bin) => {
            bin.current_weight_g += weight_g;
            (bin.capacity_g, bin.current_weight_g)
        }
        None => (10_000.0, weight_g),
    };
    let fill_percent = (current_weight_g / capacity_g * 100.0).min(100.0);
    axum::Json(serde_json::json!({
        "ok": true,
        "ts": "2026-02-01T12:00:00Z",
        "bin_id": bin_id,
        "material": material,
        "weight_g": weight_g,
        "factor_gco2_per_g": 1.5,
        "co2_saved_g": weight_g * 1.5,
        "bin": {
            "capacity_g": capacity_g,
            "current_weight_g": current_weight_g,
            "fill_percent": fill_percent
        }
    }))
    .into_response()
}

async fn export_events(headers: HeaderMap) -> impl IntoResponse {
    if !admin_ok(&headers) {
        return (StatusCode::UNAUTHORIZED, "Unauthorized (admin)").into_response();
    }
    (
        StatusCode::OK,
        "ts,bin_id,material,weight_g,co2_saved_g\n2026-02-01T10:00:00Z,SORTI_001,plastica,18,27\n",
    )
        .into_response()
}

async fn export_daily(headers: HeaderMap) -> impl IntoResponse {
    if !admin_ok(&headers) {
        return (StatusCode::UNAUTHORIZED, "Unauthorized (admin)").into_response();
    }
    (
        StatusCode::OK,
        "day,total_weight_g,total_co2_saved_g\n2026-02-01,13000,19500\n",
    )
        .into_response()
}

async fn ws_updates(
    State(state): State<Arc<StubState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let mut rx = state.push_tx.subscribe();
    ws.on_upgrade(move |mut socket| async move {
        if socket
            .send(Message::Text(r#"{"type":"hello"}"#.into()))
            .await
            .is_err()
        {
            return;
        }
        loop {
            match rx.recv().await {
                Ok(PushFrame::Text(text)) => {
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Ok(PushFrame::Close) => {
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Serve the stub on an ephemeral port; returns the bound address.
pub async fn spawn_stub(state: Arc<StubState>) -> SocketAddr {
    let app = Router::new()
        .route("/api/dashboard", get(dashboard))
        .route("/api/bins/{bin_id}/config", post(set_capacity))
        .route("/api/bins/{bin_id}/empty", post(empty_bin))
        .route("/api/event", post(submit_event))
        .route("/api/export/events.csv", get(export_events))
        .route("/api/export/daily.csv", get(export_daily))
        .route("/ws/updates", get(ws_updates))
        .with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Everything a render surface was told, for assertions.
#[derive(Debug, Default, Clone)]
pub struct Recorded {
    pub bin_renders: usize,
    pub event_renders: usize,
    pub summary_renders: usize,
    /// Bin ids of the most recent bin render, in order.
    pub last_bins: Vec<String>,
    /// Severity labels of the most recent bin render, in order.
    pub last_severities: Vec<String>,
    /// Event ids of the most recent event render, in order.
    pub last_events: Vec<Option<String>>,
    /// "locked" / "rejected" / "rows" of the most recent event render.
    pub last_pane: Option<String>,
    pub patches: Vec<String>,
    pub connectivity: Vec<Connectivity>,
    pub errors: Vec<Option<String>>,
}

#[derive(Clone, Default)]
pub struct RecordingView(Arc<Mutex<Recorded>>);

impl RecordingView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Recorded {
        self.0.lock().unwrap().clone()
    }

    pub fn last_connectivity(&self) -> Option<Connectivity> {
        self.0.lock().unwrap().connectivity.last().copied()
    }

    pub fn saw_connectivity(&self, c: Connectivity) -> bool {
        self.0.lock().unwrap().connectivity.contains(&c)
    }

    pub fn last_error(&self) -> Option<String> {
        self.0.lock().unwrap().errors.last().cloned().flatten()
    }
}

impl RenderSurface for RecordingView {
    fn apply_bins(&mut self, rows: &[BinRow]) {
        let mut r = self.0.lock().unwrap();
        r.bin_renders += 1;
        r.last_bins = rows.iter().map(|b| b.bin_id.clone()).collect();
        r.last_severities = rows
            .iter()
            .map(|b| b.severity.label().to_string())
            .collect();
    }

    fn apply_events(&mut self, pane: &EventsPane) {
        let mut r = self.0.lock().unwrap();
        r.event_renders += 1;
        match pane {
            EventsPane::Locked => {
                r.last_pane = Some("locked".into());
                r.last_events.clear();
            }
            EventsPane::Rejected => {
                r.last_pane = Some("rejected".into());
                r.last_events.clear();
            }
            EventsPane::Rows(rows) => {
                r.last_pane = Some("rows".into());
                r.last_events = rows.iter().map(|e| e.id.clone()).collect();
            }
        }
    }

    fn apply_summary(&mut self, _totals: &Totals, _bin_count: usize, _alert_count: usize) {
        self.0.lock().unwrap().summary_renders += 1;
    }

    fn apply_charts(&mut self, _daily: &[DailyPoint], _by_material: &[MaterialTotal]) {}

    fn patch_last_seen(&mut self, bin_id: &str, _last_seen_label: &str) {
        self.0.lock().unwrap().patches.push(bin_id.to_string());
    }

    fn set_connectivity(&mut self, connectivity: Connectivity) {
        self.0.lock().unwrap().connectivity.push(connectivity);
    }

    fn set_error(&mut self, message: Option<&str>) {
        self.0
            .lock()
            .unwrap()
            .errors
            .push(message.map(str::to_string));
    }
}

/// A coordinator wired against the stub, with a recording surface.
pub struct TestClient {
    pub coordinator: CoordinatorHandle,
    pub view: RecordingView,
    pub store: Arc<ClientStore>,
    pub api_repo: Arc<ApiRepo>,
    // Held so the state dir and the coordinator stay alive for the test.
    _dir: tempfile::TempDir,
    _shutdown_tx: tokio::sync::oneshot::Sender<()>,
}

pub fn client_config() -> CoordinatorConfig {
    CoordinatorConfig {
        catchup_delay_ms: 150,
        range_days: 30,
        event_limit: 20,
    }
}

pub async fn start_client(addr: SocketAddr, with_admin_key: bool) -> TestClient {
    start_client_with(addr, with_admin_key, client_config()).await
}

pub async fn start_client_with(
    addr: SocketAddr,
    with_admin_key: bool,
    config: CoordinatorConfig,
) -> TestClient {
    let dir = tempfile::TempDir::new().unwrap();
    let store = Arc::new(ClientStore::open(dir.path().join("state.json")).unwrap());
    if with_admin_key {
        store.set_admin_key(ADMIN_KEY).unwrap();
    }
    let api_repo = Arc::new(ApiRepo::new(&format!("http://{addr}"), store.clone()));
    let view = RecordingView::new();
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let (coordinator, _task) = coordinator::spawn(
        CoordinatorDeps {
            api_repo: api_repo.clone(),
            store: store.clone(),
            shutdown_rx,
        },
        config,
        view.clone(),
    );
    TestClient {
        coordinator,
        view,
        store,
        api_repo,
        _dir: dir,
        _shutdown_tx: shutdown_tx,
    }
}

/// Poll a condition with a deadline; the message names what was awaited.
pub async fn wait_for<F: Fn() -> bool>(cond: F, timeout_ms: u64, what: &str) {
    let deadline = tokio::time::Instant::now() + tokio::time::Duration::from_millis(timeout_ms);
    while !cond() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
    }
}
