// Refresh coordinator: owns the current snapshot and all rendered state.
// Fetch-and-render cycles are strictly serialized; bursts of refresh
// requests collapse into one debounced fetch plus at most one catch-up.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{Duration, Instant, sleep_until};

use crate::api_repo::{ApiError, ApiRepo};
use crate::differ::{self, SIG_EVENTS_LOCKED, SIG_EVENTS_REJECTED, SectionSignatures};
use crate::format;
use crate::models::{Connectivity, Event, Snapshot, Thresholds, TransportMode};
use crate::store::ClientStore;
use crate::view::{self, EventsPane, RenderSurface};

const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Commands accepted by the coordinator task. Every component that wants
/// to touch view state - transport manager, operator console - goes
/// through these.
#[derive(Debug)]
pub enum Command {
    /// Arm (or re-arm) the debounced refresh timer; only the most recent
    /// call survives.
    Schedule(Duration),
    /// Unconditional refresh, subject only to the in-flight guarantee.
    Refresh,
    TransportMode(TransportMode),
    /// Cheap localized update of one bin's last-seen cell, ahead of the
    /// debounced full refresh.
    PatchLastSeen {
        bin_id: String,
        ts: Option<String>,
    },
    /// Optimistic prepend of a pushed event, deduplicated by id against
    /// already-rendered rows.
    PreviewEvent(Event),
    SetThresholds(Thresholds),
    SetAlertsOnly(bool),
    SetRangeDays(u32),
    /// Completion of the in-flight fetch task.
    FetchDone(Result<Box<Snapshot>, ApiError>),
}

/// Cloneable sender half of the coordinator's command channel.
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<Command>,
}

impl CoordinatorHandle {
    pub async fn schedule_refresh(&self, delay: Duration) {
        self.send(Command::Schedule(delay)).await;
    }

    pub async fn refresh_now(&self) {
        self.send(Command::Refresh).await;
    }

    pub async fn set_transport_mode(&self, mode: TransportMode) {
        self.send(Command::TransportMode(mode)).await;
    }

    pub async fn patch_last_seen(&self, bin_id: String, ts: Option<String>) {
        self.send(Command::PatchLastSeen { bin_id, ts }).await;
    }

    pub async fn preview_event(&self, event: Event) {
        self.send(Command::PreviewEvent(event)).await;
    }

    pub async fn set_thresholds(&self, thresholds: Thresholds) {
        self.send(Command::SetThresholds(thresholds)).await;
    }

    pub async fn set_alerts_only(&self, alerts_only: bool) {
        self.send(Command::SetAlertsOnly(alerts_only)).await;
    }

    pub async fn set_range_days(&self, days: u32) {
        self.send(Command::SetRangeDays(days)).await;
    }

    async fn send(&self, cmd: Command) {
        if self.tx.send(cmd).await.is_err() {
            tracing::debug!("coordinator channel closed");
        }
    }
}

pub struct CoordinatorDeps {
    pub api_repo: Arc<ApiRepo>,
    pub store: Arc<ClientStore>,
    pub shutdown_rx: tokio::sync::oneshot::Receiver<()>,
}

pub struct CoordinatorConfig {
    pub catchup_delay_ms: u64,
    pub range_days: u32,
    pub event_limit: usize,
}

pub fn spawn<V>(
    deps: CoordinatorDeps,
    config: CoordinatorConfig,
    view: V,
) -> (CoordinatorHandle, tokio::task::JoinHandle<()>)
where
    V: RenderSurface + 'static,
{
    let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
    let thresholds = deps.store.thresholds();
    let shutdown_rx = deps.shutdown_rx;
    let coordinator = Coordinator {
        api_repo: deps.api_repo,
        store: deps.store,
        view,
        catchup_delay: Duration::from_millis(config.catchup_delay_ms),
        range_days: config.range_days,
        event_limit: config.event_limit,
        thresholds,
        alerts_only: false,
        current: None,
        signatures: SectionSignatures::default(),
        in_flight: false,
        pending: false,
        deadline: None,
        transport_mode: TransportMode::Connecting,
        last_fetch_failed: false,
        tx: tx.clone(),
    };
    let join = tokio::spawn(coordinator.run(rx, shutdown_rx));
    (CoordinatorHandle { tx }, join)
}

struct Coordinator<V> {
    api_repo: Arc<ApiRepo>,
    store: Arc<ClientStore>,
    view: V,
    catchup_delay: Duration,
    range_days: u32,
    event_limit: usize,
    thresholds: Thresholds,
    alerts_only: bool,
    /// The single logical current snapshot. Replaced wholesale by each
    /// fetch; the event preview and last-seen patch are the only
    /// localized mutations.
    current: Option<Snapshot>,
    signatures: SectionSignatures,
    in_flight: bool,
    /// At most one refresh request is remembered while a fetch is in
    /// flight.
    pending: bool,
    /// Single-slot debounce deadline; each Schedule replaces it.
    deadline: Option<Instant>,
    transport_mode: TransportMode,
    last_fetch_failed: bool,
    tx: mpsc::Sender<Command>,
}

impl<V: RenderSurface> Coordinator<V> {
    async fn run(
        mut self,
        mut rx: mpsc::Receiver<Command>,
        mut shutdown_rx: tokio::sync::oneshot::Receiver<()>,
    ) {
        loop {
            let cmd = if let Some(deadline) = self.deadline {
                tokio::select! {
                    cmd = rx.recv() => match cmd {
                        Some(cmd) => cmd,
                        None => break,
                    },
                    _ = sleep_until(deadline) => {
                        self.deadline = None;
                        self.begin_refresh();
                        continue;
                    }
                    _ = &mut shutdown_rx => break,
                }
            } else {
                tokio::select! {
                    cmd = rx.recv() => match cmd {
                        Some(cmd) => cmd,
                        None => break,
                    },
                    _ = &mut shutdown_rx => break,
                }
            };
            self.handle(cmd);
        }
        tracing::debug!("coordinator shutting down");
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Schedule(delay) => {
                self.deadline = Some(Instant::now() + delay);
            }
            Command::Refresh => self.begin_refresh(),
            Command::TransportMode(mode) => {
                self.transport_mode = mode;
                let connectivity = self.connectivity();
                self.view.set_connectivity(connectivity);
            }
            Command::PatchLastSeen { bin_id, ts } => self.patch_last_seen(bin_id, ts),
            Command::PreviewEvent(event) => self.preview_event(event),
            Command::SetThresholds(thresholds) => {
                self.thresholds = thresholds;
                self.signatures.invalidate_bins();
                self.render_bins();
                self.render_summary();
            }
            Command::SetAlertsOnly(alerts_only) => {
                self.alerts_only = alerts_only;
                self.signatures.invalidate_bins();
                self.render_bins();
                self.render_summary();
            }
            Command::SetRangeDays(days) => {
                self.range_days = days;
            }
            Command::FetchDone(result) => self.finish_refresh(result),
        }
    }

    /// Start a fetch, or remember that one was requested. The fetch runs
    /// as its own task so the command loop keeps absorbing notifications
    /// while it is in flight.
    fn begin_refresh(&mut self) {
        if self.in_flight {
            self.pending = true;
            return;
        }
        self.in_flight = true;
        self.view.set_error(None);
        let api_repo = self.api_repo.clone();
        let tx = self.tx.clone();
        let days = self.range_days;
        let limit = self.event_limit;
        tokio::spawn(async move {
            let result = api_repo.fetch_dashboard(days, limit).await.map(Box::new);
            if tx.send(Command::FetchDone(result)).await.is_err() {
                tracing::debug!("coordinator gone before fetch settled");
            }
        });
    }

    fn finish_refresh(&mut self, result: Result<Box<Snapshot>, ApiError>) {
        match result {
            Ok(snapshot) => {
                self.last_fetch_failed = false;
                self.current = Some(*snapshot);
                self.render_all();
            }
            Err(e) => {
                self.last_fetch_failed = true;
                tracing::warn!(error = %e, operation = "fetch_dashboard", "refresh failed");
                let message = e.to_string();
                self.view.set_error(Some(&message));
                let connectivity = self.connectivity();
                self.view.set_connectivity(connectivity);
            }
        }
        self.in_flight = false;
        if self.pending {
            self.pending = false;
            self.deadline = Some(Instant::now() + self.catchup_delay);
        }
    }

    fn render_all(&mut self) {
        if self.current.is_none() {
            return;
        }
        self.render_bins();
        self.render_summary();
        self.render_events();
        let connectivity = self.connectivity();
        self.view.set_connectivity(connectivity);
    }

    fn render_bins(&mut self) {
        let Some(snapshot) = &self.current else {
            return;
        };
        let visible = view::visible_bins(&snapshot.bins, &self.thresholds, self.alerts_only);
        let sig = differ::bin_signature(visible.iter().copied());
        if self.signatures.update_bins(sig) {
            let rows = view::bin_rows(&visible, &self.thresholds);
            self.view.apply_bins(&rows);
        }
    }

    fn render_summary(&mut self) {
        let Some(snapshot) = &self.current else {
            return;
        };
        let alert_count = snapshot
            .bins
            .iter()
            .filter(|b| b.fill_percent() >= self.thresholds.warn)
            .count();
        self.view
            .apply_summary(&snapshot.totals, snapshot.bins.len(), alert_count);
        self.view.apply_charts(&snapshot.daily, &snapshot.by_material);
    }

    fn render_events(&mut self) {
        let Some(snapshot) = &self.current else {
            return;
        };
        let (sig, pane) = if self.store.admin_key().is_none() {
            (SIG_EVENTS_LOCKED.to_string(), EventsPane::Locked)
        } else if !snapshot.events_visible {
            (SIG_EVENTS_REJECTED.to_string(), EventsPane::Rejected)
        } else {
            let events = &snapshot.events[..snapshot.events.len().min(self.event_limit)];
            (
                differ::event_signature(events),
                EventsPane::Rows(view::event_rows(events)),
            )
        };
        if self.signatures.update_events(sig) {
            self.view.apply_events(&pane);
        }
    }

    fn patch_last_seen(&mut self, bin_id: String, ts: Option<String>) {
        let ts = ts.unwrap_or_else(|| chrono::Utc::now().to_rfc3339());
        let Some(snapshot) = &mut self.current else {
            return;
        };
        // An unknown bin id is left to the upcoming full refresh.
        if let Some(bin) = snapshot.bins.iter_mut().find(|b| b.bin_id == bin_id) {
            bin.last_seen = Some(ts.clone());
            let label = format::format_last_seen(Some(&ts));
            self.view.patch_last_seen(&bin_id, &label);
        }
    }

    fn preview_event(&mut self, event: Event) {
        let Some(snapshot) = &mut self.current else {
            return;
        };
        if !snapshot.events_visible {
            return;
        }
        if let Some(id) = event.id.as_deref()
            && snapshot.events.iter().any(|e| e.id.as_deref() == Some(id))
        {
            return;
        }
        snapshot.events.insert(0, event);
        snapshot.events.truncate(self.event_limit);
        self.render_events();
    }

    fn connectivity(&self) -> Connectivity {
        if self.last_fetch_failed {
            return Connectivity::Offline;
        }
        match self.transport_mode {
            TransportMode::Live => Connectivity::Realtime,
            TransportMode::Connecting | TransportMode::Polling => Connectivity::Polling,
        }
    }
}
