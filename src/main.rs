use anyhow::Result;
use sorti_dash::*;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;
    tracing::info!(
        name = version::NAME,
        version = version::VERSION,
        server = %app_config.server.base_url,
        "starting console"
    );

    let store = Arc::new(store::ClientStore::open(&app_config.storage.state_path)?);
    let api_repo = Arc::new(api_repo::ApiRepo::new(
        &app_config.server.base_url,
        store.clone(),
    ));

    let (coordinator_shutdown_tx, coordinator_shutdown_rx) = tokio::sync::oneshot::channel();
    let (coordinator, coordinator_task) = coordinator::spawn(
        coordinator::CoordinatorDeps {
            api_repo: api_repo.clone(),
            store: store.clone(),
            shutdown_rx: coordinator_shutdown_rx,
        },
        coordinator::CoordinatorConfig {
            catchup_delay_ms: app_config.refresh.catchup_delay_ms,
            range_days: app_config.refresh.range_days,
            event_limit: app_config.refresh.event_limit,
        },
        view::TermView::new(),
    );

    let (transport_shutdown_tx, transport_shutdown_rx) = tokio::sync::oneshot::channel();
    let transport_task = transport::spawn(
        transport::TransportDeps {
            coordinator: coordinator.clone(),
            shutdown_rx: transport_shutdown_rx,
        },
        transport::TransportConfig {
            ws_url: app_config.server.ws_url.clone(),
            dedup_window_ms: app_config.transport.dedup_window_ms,
            poll_interval_secs: app_config.transport.poll_interval_secs,
            connect_timeout_secs: app_config.transport.connect_timeout_secs,
            admin_delay_ms: app_config.transport.admin_delay_ms,
            event_delay_ms: app_config.transport.event_delay_ms,
            default_delay_ms: app_config.transport.default_delay_ms,
        },
    );

    // First paint without waiting for the channel to settle.
    coordinator.refresh_now().await;

    let console = console::Console {
        api_repo,
        store,
        coordinator: coordinator.clone(),
    };
    tokio::select! {
        result = console.run() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal");
        }
    }

    let _ = transport_shutdown_tx.send(());
    let _ = transport_task.await;
    let _ = coordinator_shutdown_tx.send(());
    let _ = coordinator_task.await;

    Ok(())
}
