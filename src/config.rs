use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub transport: TransportSettings,
    pub refresh: RefreshSettings,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the Sorti API, e.g. "http://127.0.0.1:8000".
    pub base_url: String,
    /// WebSocket URL of the live-update channel.
    pub ws_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransportSettings {
    /// Anti-storm window: update notifications arriving closer together
    /// than this are dropped.
    #[serde(default = "default_dedup_window_ms")]
    pub dedup_window_ms: u64,
    /// Fixed refresh cadence while the push channel is down.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Refresh delay for administrative change notifications.
    #[serde(default = "default_admin_delay_ms")]
    pub admin_delay_ms: u64,
    /// Refresh delay for discrete ingest-event notifications.
    #[serde(default = "default_event_delay_ms")]
    pub event_delay_ms: u64,
    /// Refresh delay for anything else.
    #[serde(default = "default_default_delay_ms")]
    pub default_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshSettings {
    /// Delay of the catch-up refresh scheduled when requests arrived
    /// during an in-flight fetch.
    #[serde(default = "default_catchup_delay_ms")]
    pub catchup_delay_ms: u64,
    /// Initial snapshot range in days (1-365).
    #[serde(default = "default_range_days")]
    pub range_days: u32,
    /// Most recent events kept in view.
    #[serde(default = "default_event_limit")]
    pub event_limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// JSON state file holding operator keys and thresholds.
    pub state_path: String,
}

fn default_dedup_window_ms() -> u64 {
    120
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_admin_delay_ms() -> u64 {
    350
}

fn default_event_delay_ms() -> u64 {
    650
}

fn default_default_delay_ms() -> u64 {
    800
}

fn default_catchup_delay_ms() -> u64 {
    350
}

fn default_range_days() -> u32 {
    30
}

fn default_event_limit() -> usize {
    20
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.server.base_url.is_empty(),
            "server.base_url must be non-empty"
        );
        anyhow::ensure!(
            !self.server.ws_url.is_empty(),
            "server.ws_url must be non-empty"
        );
        anyhow::ensure!(
            self.transport.dedup_window_ms > 0,
            "transport.dedup_window_ms must be > 0, got {}",
            self.transport.dedup_window_ms
        );
        anyhow::ensure!(
            self.transport.poll_interval_secs > 0,
            "transport.poll_interval_secs must be > 0, got {}",
            self.transport.poll_interval_secs
        );
        anyhow::ensure!(
            self.transport.connect_timeout_secs > 0,
            "transport.connect_timeout_secs must be > 0, got {}",
            self.transport.connect_timeout_secs
        );
        anyhow::ensure!(
            self.transport.admin_delay_ms > 0,
            "transport.admin_delay_ms must be > 0, got {}",
            self.transport.admin_delay_ms
        );
        anyhow::ensure!(
            self.transport.event_delay_ms > 0,
            "transport.event_delay_ms must be > 0, got {}",
            self.transport.event_delay_ms
        );
        anyhow::ensure!(
            self.transport.default_delay_ms > 0,
            "transport.default_delay_ms must be > 0, got {}",
            self.transport.default_delay_ms
        );
        anyhow::ensure!(
            self.refresh.catchup_delay_ms > 0,
            "refresh.catchup_delay_ms must be > 0, got {}",
            self.refresh.catchup_delay_ms
        );
        anyhow::ensure!(
            (1..=365).contains(&self.refresh.range_days),
            "refresh.range_days must be between 1 and 365, got {}",
            self.refresh.range_days
        );
        anyhow::ensure!(
            self.refresh.event_limit > 0,
            "refresh.event_limit must be > 0, got {}",
            self.refresh.event_limit
        );
        anyhow::ensure!(
            !self.storage.state_path.is_empty(),
            "storage.state_path must be non-empty"
        );
        Ok(())
    }
}
