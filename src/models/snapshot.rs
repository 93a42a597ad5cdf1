// Bin, event, and aggregate models

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bin {
    pub bin_id: String,
    pub capacity_g: f64,
    pub current_weight_g: f64,
    pub last_seen: Option<String>,
}

impl Bin {
    /// Fill ratio in percent, clamped to 0..=100. A bin with no usable
    /// capacity reads as empty rather than dividing by zero.
    pub fn fill_percent(&self) -> f64 {
        if self.capacity_g <= 0.0 {
            return 0.0;
        }
        (self.current_weight_g / self.capacity_g * 100.0).clamp(0.0, 100.0)
    }
}

/// A single sorting event. `id` is absent on push-preview payloads that
/// have not yet been confirmed by a full snapshot fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub id: Option<String>,
    pub ts: String,
    pub bin_id: String,
    pub material: String,
    pub weight_g: f64,
    #[serde(default)]
    pub co2_saved_g: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Totals {
    pub total_weight_g: f64,
    pub total_co2_saved_g: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyPoint {
    pub day: String,
    pub weight_g: f64,
    pub co2_saved_g: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialTotal {
    pub material: String,
    pub weight_g: f64,
    pub co2_saved_g: f64,
}

/// Point-in-time aggregate served by GET /api/dashboard. Replaces the prior
/// snapshot wholesale; `events` is populated only when the admin key was
/// accepted (`events_visible`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub bins: Vec<Bin>,
    #[serde(default)]
    pub totals: Totals,
    #[serde(default)]
    pub daily: Vec<DailyPoint>,
    #[serde(default)]
    pub by_material: Vec<MaterialTotal>,
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default)]
    pub events_visible: bool,
}
