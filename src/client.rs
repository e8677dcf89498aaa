//! HTTP client for the VATSIM data feed, the VATSIM METAR service and the
//! airplanes.live tracking API.
//!
//! Requests are single-shot: a failure is reported to the caller, which
//! decides how to surface it. There is no retry or rate limiting here.

use reqwest::{Client, StatusCode, header::ACCEPT};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

use crate::feed::{AircraftResponse, VatsimData};
use crate::stats::WatchStats;

/// VATSIM v3 network data feed.
pub const VATSIM_DATA_URL: &str = "https://data.vatsim.net/v3/vatsim-data.json";

/// VATSIM METAR/TAF text service.
pub const METAR_URL: &str = "https://metar.vatsim.net";

/// airplanes.live REST API root.
pub const AIRPLANES_LIVE_URL: &str = "http://api.airplanes.live/v2/";

/// Errors from talking to the upstream services.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Server returned error status: {status}")]
    Status { status: StatusCode },

    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Configuration for the feed client.
#[derive(Debug, Clone)]
pub struct FeedClientConfig {
    /// URL of the VATSIM data feed document.
    pub vatsim_data_url: String,

    /// Base URL of the METAR service (`{base}/{ICAO}`).
    pub metar_url: String,

    /// Base URL of the airplanes.live API.
    pub airplanes_live_url: String,

    /// Timeout for a whole request.
    pub request_timeout: Duration,
}

impl Default for FeedClientConfig {
    fn default() -> Self {
        Self {
            vatsim_data_url: VATSIM_DATA_URL.to_string(),
            metar_url: METAR_URL.to_string(),
            airplanes_live_url: AIRPLANES_LIVE_URL.to_string(),
            request_timeout: Duration::from_secs(15),
        }
    }
}

impl FeedClientConfig {
    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Point the VATSIM data feed at a different URL.
    pub fn with_vatsim_data_url(mut self, url: impl Into<String>) -> Self {
        self.vatsim_data_url = url.into();
        self
    }

    /// Point METAR and TAF lookups at a different service.
    pub fn with_metar_url(mut self, url: impl Into<String>) -> Self {
        self.metar_url = url.into();
        self
    }

    pub fn with_airplanes_live_url(mut self, url: impl Into<String>) -> Self {
        self.airplanes_live_url = url.into();
        self
    }

    fn metar_endpoint(&self, icao: &str) -> String {
        format!(
            "{}/{}",
            self.metar_url.trim_end_matches('/'),
            icao.to_ascii_uppercase()
        )
    }

    fn taf_endpoint(&self, icao: &str) -> String {
        format!("{}?taf", self.metar_endpoint(icao))
    }

    fn callsign_endpoint(&self, callsign: &str) -> String {
        format!(
            "{}/callsign/{}",
            self.airplanes_live_url.trim_end_matches('/'),
            callsign.to_ascii_uppercase()
        )
    }
}

/// Async client for the upstream services.
#[derive(Clone)]
pub struct FeedClient {
    config: FeedClientConfig,
    http: Client,
    stats: Option<Arc<WatchStats>>,
}

impl FeedClient {
    /// Create a new client with the given configuration.
    pub fn new(config: FeedClientConfig) -> Result<Self, FeedError> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;
        Ok(Self {
            config,
            http,
            stats: None,
        })
    }

    /// Record request latency and failures into `stats`.
    pub fn with_stats(mut self, stats: Arc<WatchStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn config(&self) -> &FeedClientConfig {
        &self.config
    }

    /// Fetch and decode the VATSIM data feed.
    pub async fn fetch_vatsim_data(&self) -> Result<VatsimData, FeedError> {
        let body = self.get_text(&self.config.vatsim_data_url, false).await?;
        VatsimData::from_json(&body)
    }

    /// Fetch the raw METAR text for an airport.
    ///
    /// An unknown airport yields an empty string.
    pub async fn fetch_metar(&self, icao: &str) -> Result<String, FeedError> {
        let url = self.config.metar_endpoint(icao);
        Ok(self.get_text(&url, true).await?.trim().to_string())
    }

    /// Fetch the raw TAF text for an airport.
    pub async fn fetch_taf(&self, icao: &str) -> Result<String, FeedError> {
        let url = self.config.taf_endpoint(icao);
        Ok(self.get_text(&url, true).await?.trim().to_string())
    }

    /// Look up real-world aircraft by callsign on airplanes.live.
    pub async fn search_aircraft(&self, callsign: &str) -> Result<AircraftResponse, FeedError> {
        let url = self.config.callsign_endpoint(callsign);
        let body = self.get_text(&url, false).await?;
        AircraftResponse::from_json(&body)
    }

    async fn get_text(&self, url: &str, plain_text: bool) -> Result<String, FeedError> {
        debug!("Fetching {}", url);
        let started = Instant::now();

        let result = self.send(url, plain_text).await;

        if let Some(ref stats) = self.stats {
            match &result {
                Ok(_) => stats.record_request(started.elapsed()),
                Err(_) => stats.record_request_failure(),
            }
        }
        result
    }

    async fn send(&self, url: &str, plain_text: bool) -> Result<String, FeedError> {
        let mut request = self.http.get(url);
        if plain_text {
            request = request.header(ACCEPT, "text/plain");
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("{} returned {}: {}", url, status, body.trim());
            return Err(FeedError::Status { status });
        }

        Ok(response.text().await?)
    }
}
