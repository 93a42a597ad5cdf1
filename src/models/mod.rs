// Domain models for the Sorti dashboard wire format

mod notify;
mod snapshot;
mod thresholds;

pub use notify::{Connectivity, Notification, TransportMode, UpdateKind, UpdateNotice};
pub use snapshot::{Bin, DailyPoint, Event, MaterialTotal, Snapshot, Totals};
pub use thresholds::{Severity, Thresholds};
