// Render core: severity ordering, alert filtering, row construction.
// The data transformation lives here; surfaces only draw what they are
// handed.

mod term;

pub use term::TermView;

use crate::format;
use crate::models::{
    Bin, Connectivity, DailyPoint, Event, MaterialTotal, Severity, Thresholds, Totals,
};

/// One computed row of the bin table, ready for any surface.
#[derive(Debug, Clone)]
pub struct BinRow {
    pub bin_id: String,
    pub fill_percent: f64,
    pub severity: Severity,
    pub weight_label: String,
    pub capacity_label: String,
    pub last_seen_label: String,
}

#[derive(Debug, Clone)]
pub struct EventRow {
    pub id: Option<String>,
    pub ts_label: String,
    pub bin_id: String,
    pub material: String,
    pub weight_label: String,
    pub co2_label: String,
}

/// Content of the event pane. The two locked variants are authorization
/// states rather than data states; the differ treats them as sentinels.
#[derive(Debug, Clone)]
pub enum EventsPane {
    /// No admin key stored; prompt the operator to set one.
    Locked,
    /// A key is stored but the server rejected it.
    Rejected,
    Rows(Vec<EventRow>),
}

/// Bins sorted by severity class descending, then fill descending, then
/// bin id for a stable tie-break. Recomputed from the current thresholds
/// on every render; never cached across threshold edits.
pub fn prioritize<'a>(bins: &'a [Bin], thresholds: &Thresholds) -> Vec<&'a Bin> {
    let mut out: Vec<&Bin> = bins.iter().collect();
    out.sort_by(|a, b| {
        let (fa, fb) = (a.fill_percent(), b.fill_percent());
        let (sa, sb) = (thresholds.severity(fa), thresholds.severity(fb));
        sb.cmp(&sa)
            .then_with(|| fb.partial_cmp(&fa).unwrap_or(std::cmp::Ordering::Equal))
            .then_with(|| a.bin_id.cmp(&b.bin_id))
    });
    out
}

/// Sorted bins, restricted to warn-or-worse when the alerts-only mode is
/// on. The filter applies after sorting.
pub fn visible_bins<'a>(
    bins: &'a [Bin],
    thresholds: &Thresholds,
    alerts_only: bool,
) -> Vec<&'a Bin> {
    let sorted = prioritize(bins, thresholds);
    if !alerts_only {
        return sorted;
    }
    sorted
        .into_iter()
        .filter(|b| b.fill_percent() >= thresholds.warn)
        .collect()
}

pub fn bin_rows(bins: &[&Bin], thresholds: &Thresholds) -> Vec<BinRow> {
    bins.iter()
        .map(|b| {
            let fill = b.fill_percent();
            BinRow {
                bin_id: b.bin_id.clone(),
                fill_percent: fill,
                severity: thresholds.severity(fill),
                weight_label: format::format_weight(b.current_weight_g),
                capacity_label: format::format_weight(b.capacity_g),
                last_seen_label: format::format_last_seen(b.last_seen.as_deref()),
            }
        })
        .collect()
}

pub fn event_rows(events: &[Event]) -> Vec<EventRow> {
    events
        .iter()
        .map(|e| EventRow {
            id: e.id.clone(),
            ts_label: format::format_timestamp(&e.ts),
            bin_id: e.bin_id.clone(),
            material: e.material.clone(),
            weight_label: format::format_weight(e.weight_g),
            co2_label: format::format_co2(e.co2_saved_g),
        })
        .collect()
}

/// The thin, swappable render adapter. The coordinator is the only caller;
/// surfaces must not retain references into the snapshot.
pub trait RenderSurface: Send {
    fn apply_bins(&mut self, rows: &[BinRow]);
    fn apply_events(&mut self, pane: &EventsPane);
    fn apply_summary(&mut self, totals: &Totals, bin_count: usize, alert_count: usize);
    fn apply_charts(&mut self, daily: &[DailyPoint], by_material: &[MaterialTotal]);
    /// Cheap localized update of a single bin's last-seen cell, issued for
    /// push notifications ahead of the full refresh.
    fn patch_last_seen(&mut self, bin_id: &str, last_seen_label: &str);
    fn set_connectivity(&mut self, connectivity: Connectivity);
    fn set_error(&mut self, message: Option<&str>);
}
