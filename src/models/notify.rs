// Push-channel notifications and connectivity states

use serde::Deserialize;

use super::Event;

/// Connection lifecycle state, owned by the transport manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    Connecting,
    Live,
    Polling,
}

/// Connectivity as displayed to the operator. `Offline` means the most
/// recent full refresh attempt itself failed; transport degradation alone
/// only downgrades to `Polling`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Realtime,
    Polling,
    Offline,
}

impl Connectivity {
    pub fn label(self) -> &'static str {
        match self {
            Connectivity::Realtime => "realtime",
            Connectivity::Polling => "polling",
            Connectivity::Offline => "offline",
        }
    }
}

/// Declared type of an update notification, used only to pick the refresh
/// scheduling delay. Unknown kinds fall through to `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateKind {
    BinConfig,
    BinEmptied,
    Event,
    #[default]
    Other,
}

impl UpdateKind {
    pub fn classify(kind: Option<&str>) -> Self {
        match kind {
            Some("bin_config") => UpdateKind::BinConfig,
            Some("bin_emptied") => UpdateKind::BinEmptied,
            Some("event") => UpdateKind::Event,
            _ => UpdateKind::Other,
        }
    }

    pub fn is_admin(self) -> bool {
        matches!(self, UpdateKind::BinConfig | UpdateKind::BinEmptied)
    }
}

/// Payload of an `update` notification. Every field is optional on the
/// wire; a fully empty notice still schedules a default-priority refresh.
#[derive(Debug, Clone, Default)]
pub struct UpdateNotice {
    pub kind: UpdateKind,
    pub bin_id: Option<String>,
    pub ts: Option<String>,
    pub event: Option<Event>,
}

#[derive(Debug, Clone)]
pub enum Notification {
    Hello,
    Update(UpdateNotice),
}

#[derive(Debug, Deserialize)]
struct WireNotification {
    #[serde(rename = "type")]
    msg_type: String,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    bin_id: Option<String>,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    event: Option<Event>,
}

impl Notification {
    /// Tolerant parse. A payload that fails to parse is treated as a
    /// content-less notification, never as an error: the authoritative
    /// state comes from the next snapshot fetch anyway.
    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str::<WireNotification>(raw) {
            Ok(w) if w.msg_type == "hello" => Notification::Hello,
            Ok(w) => Notification::Update(UpdateNotice {
                kind: UpdateKind::classify(w.kind.as_deref()),
                bin_id: w.bin_id,
                ts: w.ts,
                event: w.event,
            }),
            Err(_) => Notification::Update(UpdateNotice::default()),
        }
    }
}
