// HTTP repo for the Sorti SmartBin API

use std::sync::Arc;

use serde::Deserialize;

use crate::models::Snapshot;
use crate::store::ClientStore;

const ADMIN_KEY_HEADER: &str = "x-api-key";
const INGEST_KEY_HEADER: &str = "x-ingest-key";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or rejected admin/ingest key (HTTP 401). Surfaced to the
    /// operator at the point of the privileged action; never retried
    /// automatically.
    #[error("unauthorized: the server rejected the key (or none is set)")]
    Unauthorized,
    /// The server rejected the request as invalid (HTTP 400), e.g. an
    /// unknown material.
    #[error("rejected by server: {0}")]
    Rejected(String),
    #[error("server returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// Non-parseable response body; treated the same as a fetch failure.
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct CapacityAck {
    pub bin_id: String,
    pub capacity_g: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmptyAck {
    pub bin_id: String,
    pub emptied_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestBinState {
    pub capacity_g: f64,
    pub current_weight_g: f64,
    pub fill_percent: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestAck {
    pub ts: String,
    pub bin_id: String,
    pub material: String,
    pub weight_g: f64,
    pub co2_saved_g: f64,
    pub bin: IngestBinState,
}

/// Client for the consumed HTTP endpoints. Keys are read from the store at
/// call time so an operator key edit applies to the next request.
pub struct ApiRepo {
    http: reqwest::Client,
    base_url: String,
    store: Arc<ClientStore>,
}

impl ApiRepo {
    pub fn new(base_url: &str, store: Arc<ClientStore>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            store,
        }
    }

    /// GET /api/dashboard - the full snapshot for the selected range. The
    /// admin key is attached when stored; the server flags whether it was
    /// accepted via `events_visible`.
    pub async fn fetch_dashboard(&self, days: u32, limit: usize) -> Result<Snapshot, ApiError> {
        let url = format!("{}/api/dashboard?days={}&limit={}", self.base_url, days, limit);
        let mut req = self.http.get(&url);
        if let Some(key) = self.store.admin_key() {
            req = req.header(ADMIN_KEY_HEADER, key);
        }
        let body = check_status(req.send().await?).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// POST /api/bins/{bin_id}/config (admin).
    pub async fn set_capacity(&self, bin_id: &str, capacity_g: f64) -> Result<CapacityAck, ApiError> {
        let url = format!("{}/api/bins/{}/config", self.base_url, bin_id);
        let req = self
            .admin_request(self.http.post(&url))?
            .json(&serde_json::json!({ "capacity_g": capacity_g }));
        let body = check_status(req.send().await?).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// POST /api/bins/{bin_id}/empty (admin).
    pub async fn empty_bin(&self, bin_id: &str) -> Result<EmptyAck, ApiError> {
        let url = format!("{}/api/bins/{}/empty", self.base_url, bin_id);
        let req = self.admin_request(self.http.post(&url))?;
        let body = check_status(req.send().await?).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// POST /api/event (ingest key) - simulated or real sorting event.
    pub async fn submit_event(
        &self,
        bin_id: &str,
        material: &str,
        weight_g: f64,
    ) -> Result<IngestAck, ApiError> {
        let url = format!("{}/api/event", self.base_url);
        let key = self.store.ingest_key().ok_or(ApiError::Unauthorized)?;
        let req = self.http.post(&url).header(INGEST_KEY_HEADER, key).json(
            &serde_json::json!({ "bin_id": bin_id, "material": material, "weight_g": weight_g }),
        );
        let body = check_status(req.send().await?).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// GET /api/export/events.csv (admin). Returns the raw CSV body.
    pub async fn export_events_csv(&self) -> Result<String, ApiError> {
        let url = format!("{}/api/export/events.csv", self.base_url);
        let req = self.admin_request(self.http.get(&url))?;
        Ok(check_status(req.send().await?).await?.text().await?)
    }

    /// GET /api/export/daily.csv (admin).
    pub async fn export_daily_csv(&self, days: u32) -> Result<String, ApiError> {
        let url = format!("{}/api/export/daily.csv?days={}", self.base_url, days);
        let req = self.admin_request(self.http.get(&url))?;
        Ok(check_status(req.send().await?).await?.text().await?)
    }

    fn admin_request(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, ApiError> {
        let key = self.store.admin_key().ok_or(ApiError::Unauthorized)?;
        Ok(req.header(ADMIN_KEY_HEADER, key))
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorized);
    }
    if status == reqwest::StatusCode::BAD_REQUEST {
        let detail = resp.text().await.unwrap_or_default();
        return Err(ApiError::Rejected(detail));
    }
    Err(ApiError::Status(status))
}
