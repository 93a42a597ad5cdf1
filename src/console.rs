// Operator console: line commands on stdin, dispatched against the API
// and the coordinator. Parsing is pure; dispatch owns the side effects.

use std::sync::Arc;

use tokio::io::AsyncBufReadExt;

use crate::api_repo::{ApiError, ApiRepo};
use crate::coordinator::CoordinatorHandle;
use crate::format;
use crate::models::Thresholds;
use crate::store::ClientStore;

const HELP: &str = "\
commands:
  status                          show stored keys and thresholds
  refresh                         force a refresh now
  range <days>                    set the snapshot range (1-365)
  alerts on|off                   show only bins at or above warn
  thresholds <warn> <critical>    set alert thresholds (percent)
  admin-key <key>                 store the admin key
  ingest-key <key>                store the ingest key
  capacity <bin> <grams>          set a bin's capacity (admin)
  empty <bin>                     empty a bin (admin)
  ingest <bin> <material> <grams> submit a simulated event (ingest key)
  export events <path>            download the events CSV (admin)
  export daily <days> <path>      download the daily CSV (admin)
  quit";

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Help,
    Status,
    Refresh,
    Range(u32),
    AlertsOnly(bool),
    Thresholds { warn: f64, critical: f64 },
    AdminKey(String),
    IngestKey(String),
    Capacity { bin_id: String, capacity_g: f64 },
    Empty { bin_id: String },
    Ingest {
        bin_id: String,
        material: String,
        weight_g: f64,
    },
    ExportEvents { path: String },
    ExportDaily { days: u32, path: String },
    Quit,
}

/// Parse one operator line. Input that cannot possibly become a valid
/// request is rejected here with a corrective message; nothing is sent.
pub fn parse_command(line: &str) -> Result<ConsoleCommand, String> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    match parts.as_slice() {
        ["help"] => Ok(ConsoleCommand::Help),
        ["status"] => Ok(ConsoleCommand::Status),
        ["refresh"] => Ok(ConsoleCommand::Refresh),
        ["quit"] | ["exit"] => Ok(ConsoleCommand::Quit),
        ["range", days] => Ok(ConsoleCommand::Range(parse_days(days)?)),
        ["alerts", "on"] => Ok(ConsoleCommand::AlertsOnly(true)),
        ["alerts", "off"] => Ok(ConsoleCommand::AlertsOnly(false)),
        ["thresholds", warn, critical] => Ok(ConsoleCommand::Thresholds {
            warn: parse_number(warn, "warn threshold")?,
            critical: parse_number(critical, "critical threshold")?,
        }),
        ["admin-key", key] => Ok(ConsoleCommand::AdminKey(key.to_string())),
        ["ingest-key", key] => Ok(ConsoleCommand::IngestKey(key.to_string())),
        ["capacity", bin_id, grams] => Ok(ConsoleCommand::Capacity {
            bin_id: bin_id.to_string(),
            capacity_g: parse_positive(grams, "capacity")?,
        }),
        ["empty", bin_id] => Ok(ConsoleCommand::Empty {
            bin_id: bin_id.to_string(),
        }),
        ["ingest", bin_id, material, grams] => Ok(ConsoleCommand::Ingest {
            bin_id: bin_id.to_string(),
            material: material.to_string(),
            weight_g: parse_positive(grams, "weight")?,
        }),
        ["export", "events", path] => Ok(ConsoleCommand::ExportEvents {
            path: path.to_string(),
        }),
        ["export", "daily", days, path] => Ok(ConsoleCommand::ExportDaily {
            days: parse_days(days)?,
            path: path.to_string(),
        }),
        _ => Err(format!("unrecognized command `{line}`; type `help`")),
    }
}

fn parse_number(raw: &str, what: &str) -> Result<f64, String> {
    raw.parse::<f64>()
        .map_err(|_| format!("{what} must be a number, got `{raw}`"))
}

fn parse_positive(raw: &str, what: &str) -> Result<f64, String> {
    let value = parse_number(raw, what)?;
    if value <= 0.0 {
        return Err(format!("{what} must be positive, got {raw}"));
    }
    Ok(value)
}

fn parse_days(raw: &str) -> Result<u32, String> {
    let days = raw
        .parse::<u32>()
        .map_err(|_| format!("days must be a whole number, got `{raw}`"))?;
    if !(1..=365).contains(&days) {
        return Err(format!("days must be between 1 and 365, got {days}"));
    }
    Ok(days)
}

pub struct Console {
    pub api_repo: Arc<ApiRepo>,
    pub store: Arc<ClientStore>,
    pub coordinator: CoordinatorHandle,
}

impl Console {
    /// Read operator lines until quit or EOF.
    pub async fn run(&self) -> anyhow::Result<()> {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        let mut lines = stdin.lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if !self.dispatch(line).await {
                break;
            }
        }
        Ok(())
    }

    /// Returns false when the operator asked to quit. Every action that
    /// may have altered server state is followed by an explicit refresh,
    /// independent of whatever the push channel echoes back.
    pub async fn dispatch(&self, line: &str) -> bool {
        let cmd = match parse_command(line) {
            Ok(cmd) => cmd,
            Err(msg) => {
                println!("{msg}");
                return true;
            }
        };
        match cmd {
            ConsoleCommand::Help => println!("{HELP}"),
            ConsoleCommand::Status => self.print_status(),
            ConsoleCommand::Refresh => self.coordinator.refresh_now().await,
            ConsoleCommand::Quit => return false,
            ConsoleCommand::Range(days) => {
                self.coordinator.set_range_days(days).await;
                self.coordinator.refresh_now().await;
            }
            ConsoleCommand::AlertsOnly(on) => {
                self.coordinator.set_alerts_only(on).await;
            }
            ConsoleCommand::Thresholds { warn, critical } => {
                match self.store.set_thresholds(warn, critical) {
                    Ok(t) => {
                        println!("thresholds set: warn {}% critical {}%", t.warn, t.critical);
                        self.coordinator.set_thresholds(t).await;
                        self.coordinator.refresh_now().await;
                    }
                    Err(e) => println!("invalid thresholds: {e}"),
                }
            }
            ConsoleCommand::AdminKey(key) => {
                if let Err(e) = self.store.set_admin_key(&key) {
                    println!("could not save admin key: {e}");
                } else {
                    println!("admin key saved");
                    self.coordinator.refresh_now().await;
                }
            }
            ConsoleCommand::IngestKey(key) => {
                if let Err(e) = self.store.set_ingest_key(&key) {
                    println!("could not save ingest key: {e}");
                } else {
                    println!("ingest key saved");
                }
            }
            ConsoleCommand::Capacity { bin_id, capacity_g } => {
                match self.api_repo.set_capacity(&bin_id, capacity_g).await {
                    Ok(ack) => println!(
                        "capacity of {} set to {}",
                        ack.bin_id,
                        format::format_weight(ack.capacity_g)
                    ),
                    Err(e) => print_api_error(&e),
                }
                self.coordinator.refresh_now().await;
            }
            ConsoleCommand::Empty { bin_id } => {
                match self.api_repo.empty_bin(&bin_id).await {
                    Ok(ack) => println!(
                        "{} emptied at {}",
                        ack.bin_id,
                        format::format_timestamp(&ack.emptied_at)
                    ),
                    Err(e) => print_api_error(&e),
                }
                self.coordinator.refresh_now().await;
            }
            ConsoleCommand::Ingest {
                bin_id,
                material,
                weight_g,
            } => {
                match self.api_repo.submit_event(&bin_id, &material, weight_g).await {
                    Ok(ack) => println!(
                        "event recorded: {} of {} into {}, now at {}",
                        format::format_weight(ack.weight_g),
                        ack.material,
                        ack.bin_id,
                        format::format_percent(ack.bin.fill_percent)
                    ),
                    Err(e) => print_api_error(&e),
                }
                self.coordinator.refresh_now().await;
            }
            ConsoleCommand::ExportEvents { path } => {
                match self.api_repo.export_events_csv().await {
                    Ok(csv) => write_export(&path, &csv),
                    Err(e) => print_api_error(&e),
                }
            }
            ConsoleCommand::ExportDaily { days, path } => {
                match self.api_repo.export_daily_csv(days).await {
                    Ok(csv) => write_export(&path, &csv),
                    Err(e) => print_api_error(&e),
                }
            }
        }
        true
    }

    fn print_status(&self) {
        let Thresholds { warn, critical } = self.store.thresholds();
        println!(
            "admin key: {} | ingest key: {} | thresholds: warn {}% critical {}%",
            presence(self.store.admin_key()),
            presence(self.store.ingest_key()),
            warn,
            critical,
        );
    }
}

fn presence(key: Option<String>) -> &'static str {
    if key.is_some() { "set" } else { "not set" }
}

fn print_api_error(e: &ApiError) {
    match e {
        ApiError::Unauthorized => {
            println!("unauthorized: store a valid key first (`admin-key <key>` or `ingest-key <key>`)");
        }
        other => println!("request failed: {other}"),
    }
}

fn write_export(path: &str, csv: &str) {
    match std::fs::write(path, csv) {
        Ok(()) => println!("wrote {} bytes to {path}", csv.len()),
        Err(e) => println!("could not write {path}: {e}"),
    }
}
