// Transport manager: push-preferred live updates with polling fallback.
// Owns the connection lifecycle; everything it learns is forwarded to the
// coordinator as commands.

use std::time::Instant;

use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::time::{Duration, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::coordinator::CoordinatorHandle;
use crate::models::{Notification, TransportMode, UpdateKind, UpdateNotice};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TransportDeps {
    pub coordinator: CoordinatorHandle,
    pub shutdown_rx: oneshot::Receiver<()>,
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub ws_url: String,
    pub dedup_window_ms: u64,
    pub poll_interval_secs: u64,
    pub connect_timeout_secs: u64,
    pub admin_delay_ms: u64,
    pub event_delay_ms: u64,
    pub default_delay_ms: u64,
}

impl TransportConfig {
    /// Refresh delay derived from the notification's declared kind:
    /// administrative changes soonest, ingest events next, the rest at
    /// the default.
    pub fn delay_for(&self, kind: UpdateKind) -> Duration {
        let ms = match kind {
            k if k.is_admin() => self.admin_delay_ms,
            UpdateKind::Event => self.event_delay_ms,
            _ => self.default_delay_ms,
        };
        Duration::from_millis(ms)
    }
}

/// Anti-storm gate: drops notifications arriving closer together than the
/// window. An availability guard against notification storms, not a
/// correctness guarantee - the debounced refresh coalesces anyway.
#[derive(Debug)]
pub struct NotificationGate {
    window: Duration,
    last_admitted: Option<Instant>,
}

impl NotificationGate {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_admitted: None,
        }
    }

    pub fn admit(&mut self, now: Instant) -> bool {
        match self.last_admitted {
            Some(prev) if now.duration_since(prev) < self.window => false,
            _ => {
                self.last_admitted = Some(now);
                true
            }
        }
    }
}

enum SessionEnd {
    Shutdown,
    Lost,
}

pub fn spawn(deps: TransportDeps, config: TransportConfig) -> tokio::task::JoinHandle<()> {
    tokio::spawn(run(deps, config))
}

/// Connecting -> Live -> (error) -> Polling -> (reconnect attempt) -> Live.
/// No terminal state short of the shutdown signal; while degraded the
/// manager refreshes at a fixed cadence and retries the channel each
/// cycle.
async fn run(deps: TransportDeps, config: TransportConfig) {
    let TransportDeps {
        coordinator,
        mut shutdown_rx,
    } = deps;
    let mut gate = NotificationGate::new(Duration::from_millis(config.dedup_window_ms));
    let connect_timeout = Duration::from_secs(config.connect_timeout_secs);
    let poll_interval = Duration::from_secs(config.poll_interval_secs);

    loop {
        let connected = tokio::select! {
            res = timeout(connect_timeout, connect_async(config.ws_url.as_str())) => res,
            _ = &mut shutdown_rx => return,
        };
        match connected {
            Ok(Ok((stream, _))) => {
                tracing::info!(url = %config.ws_url, "live update channel connected");
                let end =
                    run_session(stream, &coordinator, &mut gate, &config, &mut shutdown_rx).await;
                if let SessionEnd::Shutdown = end {
                    return;
                }
                tracing::warn!("live update channel lost; falling back to polling");
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "live update channel unavailable");
            }
            Err(_) => {
                tracing::warn!(
                    timeout_secs = config.connect_timeout_secs,
                    "live update channel connect timed out"
                );
            }
        }

        coordinator.set_transport_mode(TransportMode::Polling).await;
        coordinator.refresh_now().await;
        tokio::select! {
            _ = tokio::time::sleep(poll_interval) => {}
            _ = &mut shutdown_rx => return,
        }
    }
}

async fn run_session(
    mut stream: WsStream,
    coordinator: &CoordinatorHandle,
    gate: &mut NotificationGate,
    config: &TransportConfig,
    shutdown_rx: &mut oneshot::Receiver<()>,
) -> SessionEnd {
    loop {
        let msg = tokio::select! {
            msg = stream.next() => msg,
            _ = &mut *shutdown_rx => return SessionEnd::Shutdown,
        };
        match msg {
            Some(Ok(Message::Text(text))) => {
                handle_text(&text, coordinator, gate, config).await;
            }
            Some(Ok(Message::Close(_))) => {
                tracing::info!("live update channel closed by server");
                return SessionEnd::Lost;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                tracing::warn!(error = %e, "live update channel error");
                return SessionEnd::Lost;
            }
            None => return SessionEnd::Lost,
        }
    }
}

async fn handle_text(
    text: &str,
    coordinator: &CoordinatorHandle,
    gate: &mut NotificationGate,
    config: &TransportConfig,
) {
    match Notification::parse(text) {
        Notification::Hello => {
            coordinator.set_transport_mode(TransportMode::Live).await;
            coordinator.refresh_now().await;
        }
        Notification::Update(notice) => {
            if !gate.admit(Instant::now()) {
                return;
            }
            handle_update(notice, coordinator, config).await;
        }
    }
}

async fn handle_update(
    notice: UpdateNotice,
    coordinator: &CoordinatorHandle,
    config: &TransportConfig,
) {
    let UpdateNotice {
        kind,
        bin_id,
        ts,
        event,
    } = notice;
    if let Some(bin_id) = bin_id {
        // Cheap localized update so perceived latency does not wait for
        // the debounced refresh.
        coordinator.patch_last_seen(bin_id, ts).await;
    }
    if let Some(event) = event {
        coordinator.preview_event(event).await;
    }
    coordinator.schedule_refresh(config.delay_for(kind)).await;
}
