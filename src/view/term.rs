// Terminal render surface

use crate::models::{Connectivity, DailyPoint, MaterialTotal, Severity, Totals};

use super::{BinRow, EventsPane, RenderSurface};

const BAR_WIDTH: usize = 24;

/// Chart state kept across renders. Labels and series are reassigned in
/// place and redrawn rather than rebuilt, mirroring how the browser
/// dashboard mutates its chart datasets to keep animation identity.
#[derive(Debug, Default)]
struct ChartState {
    day_labels: Vec<String>,
    day_weights: Vec<f64>,
    day_co2: Vec<f64>,
    material_labels: Vec<String>,
    material_weights: Vec<f64>,
}

impl ChartState {
    fn assign(&mut self, daily: &[DailyPoint], by_material: &[MaterialTotal]) {
        self.day_labels.clear();
        self.day_weights.clear();
        self.day_co2.clear();
        for p in daily {
            self.day_labels.push(p.day.clone());
            self.day_weights.push(p.weight_g);
            self.day_co2.push(p.co2_saved_g);
        }
        self.material_labels.clear();
        self.material_weights.clear();
        for m in by_material {
            self.material_labels.push(m.material.clone());
            self.material_weights.push(m.weight_g);
        }
    }
}

/// Prints the dashboard sections to stdout as they change. Stateful only
/// where the render contract demands it (charts, connectivity banner).
pub struct TermView {
    connectivity: Connectivity,
    error: Option<String>,
    charts: ChartState,
}

impl TermView {
    pub fn new() -> Self {
        Self {
            connectivity: Connectivity::Polling,
            error: None,
            charts: ChartState::default(),
        }
    }

    fn draw_charts(&self) {
        if !self.charts.day_labels.is_empty() {
            println!("-- daily (weight / co2 saved) --");
            let max = self
                .charts
                .day_weights
                .iter()
                .cloned()
                .fold(0.0_f64, f64::max);
            for i in 0..self.charts.day_labels.len() {
                println!(
                    "{:<10} {:<width$} {:>10} / {}",
                    self.charts.day_labels[i],
                    bar(self.charts.day_weights[i], max),
                    crate::format::format_weight(self.charts.day_weights[i]),
                    crate::format::format_co2(self.charts.day_co2[i]),
                    width = BAR_WIDTH,
                );
            }
        }
        if !self.charts.material_labels.is_empty() {
            println!("-- by material --");
            let max = self
                .charts
                .material_weights
                .iter()
                .cloned()
                .fold(0.0_f64, f64::max);
            for i in 0..self.charts.material_labels.len() {
                println!(
                    "{:<10} {:<width$} {:>10}",
                    self.charts.material_labels[i],
                    bar(self.charts.material_weights[i], max),
                    crate::format::format_weight(self.charts.material_weights[i]),
                    width = BAR_WIDTH,
                );
            }
        }
    }
}

impl Default for TermView {
    fn default() -> Self {
        Self::new()
    }
}

fn bar(value: f64, max: f64) -> String {
    if max <= 0.0 {
        return String::new();
    }
    let filled = ((value / max) * BAR_WIDTH as f64).round() as usize;
    "#".repeat(filled.min(BAR_WIDTH))
}

fn severity_tag(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "!!",
        Severity::Warn => " !",
        Severity::Ok => "  ",
    }
}

impl RenderSurface for TermView {
    fn apply_bins(&mut self, rows: &[BinRow]) {
        println!(
            "== bins ({}) [{}] ==",
            rows.len(),
            self.connectivity.label()
        );
        if let Some(err) = &self.error {
            println!("ERROR: {err}");
        }
        for r in rows {
            println!(
                "{} {:<12} {:>4} {:<8} {:>9} / {:<9} seen {}",
                severity_tag(r.severity),
                r.bin_id,
                crate::format::format_percent(r.fill_percent),
                r.severity.label(),
                r.weight_label,
                r.capacity_label,
                r.last_seen_label,
            );
        }
    }

    fn apply_events(&mut self, pane: &EventsPane) {
        match pane {
            EventsPane::Locked => {
                println!("== events: locked (set an admin key with `admin-key <key>`) ==");
            }
            EventsPane::Rejected => {
                println!("== events: admin key rejected by the server ==");
            }
            EventsPane::Rows(rows) => {
                println!("== recent events ({}) ==", rows.len());
                for e in rows {
                    println!(
                        "{} {:<12} {:<10} {:>9} co2 {}",
                        e.ts_label, e.bin_id, e.material, e.weight_label, e.co2_label,
                    );
                }
            }
        }
    }

    fn apply_summary(&mut self, totals: &Totals, bin_count: usize, alert_count: usize) {
        println!(
            "-- totals: {} collected, {} co2 saved, {} bins, {} alerting --",
            crate::format::format_weight(totals.total_weight_g),
            crate::format::format_co2(totals.total_co2_saved_g),
            bin_count,
            alert_count,
        );
    }

    fn apply_charts(&mut self, daily: &[DailyPoint], by_material: &[MaterialTotal]) {
        self.charts.assign(daily, by_material);
        self.draw_charts();
    }

    fn patch_last_seen(&mut self, bin_id: &str, last_seen_label: &str) {
        println!("   {bin_id} seen {last_seen_label}");
    }

    fn set_connectivity(&mut self, connectivity: Connectivity) {
        if self.connectivity != connectivity {
            println!("-- connectivity: {} --", connectivity.label());
        }
        self.connectivity = connectivity;
    }

    fn set_error(&mut self, message: Option<&str>) {
        match (message, self.error.as_deref()) {
            (Some(m), prev) if prev != Some(m) => {
                println!("ERROR: {m}");
            }
            _ => {}
        }
        self.error = message.map(str::to_string);
    }
}
