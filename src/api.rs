// Device API Module - HTTP client for the robot's control endpoints
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::types::Rgb;

/// Every endpoint the panels talk to. Also used as the key for request sequencing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Hop,
    Brightness,
    Color,
    Pattern,
    HopStatus,
    ParamUpdate,
    MonitorData,
}

impl Endpoint {
    pub const COUNT: usize = 7;

    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Hop => "/hop",
            Endpoint::Brightness => "/lights/brightness",
            Endpoint::Color => "/lights/color",
            Endpoint::Pattern => "/lights/pattern",
            Endpoint::HopStatus => "/hop/status",
            Endpoint::ParamUpdate => "/param_update",
            Endpoint::MonitorData => "/monitor_data",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Failure taxonomy for device requests. The panels collapse all three
/// into a single user-facing message per operation.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Connection refused, timeout, DNS failure...
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: Endpoint,
        #[source]
        source: reqwest::Error,
    },

    /// The device answered with a non-success status
    #[error("{endpoint} returned status {status}")]
    Status { endpoint: Endpoint, status: StatusCode },

    /// The body was absent or not the JSON we expected
    #[error("malformed response from {endpoint}: {source}")]
    Decode {
        endpoint: Endpoint,
        #[source]
        source: reqwest::Error,
    },

    /// The HTTP client itself could not be set up (TLS backend, resolver)
    #[error("building HTTP client: {0}")]
    Build(#[source] reqwest::Error),
}

/// Accelerometer reading as reported by `/hop/status`.
/// The readings are absent when the sensor is disconnected.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SensorSnapshot {
    pub connected: bool,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub raw_x: Option<f64>,
    #[serde(default)]
    pub raw_y: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub x: f64,
    pub y: f64,
    pub raw_x: f64,
    pub raw_y: f64,
}

impl SensorSnapshot {
    /// All four readings, or None if any is missing
    pub fn reading(&self) -> Option<SensorReading> {
        Some(SensorReading {
            x: self.x?,
            y: self.y?,
            raw_x: self.raw_x?,
            raw_y: self.raw_y?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct KalmanStats {
    pub value: f64,
    #[serde(rename = "Q")]
    pub q: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MonitorSnapshot {
    pub kalman_x: KalmanStats,
    pub kalman_y: KalmanStats,
    pub pid_error: f64,
    pub stability: f64,
    #[serde(default)]
    pub parameters: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParamUpdateResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

#[derive(Clone)]
pub struct DeviceClient {
    http: reqwest::Client,
    base_url: String,
}

impl DeviceClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(format!("hopctl/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ApiError::Build)?;

        Ok(DeviceClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }

    pub async fn hop(&self, speed: u32, air_time: f64) -> Result<(), ApiError> {
        self.post_command(Endpoint::Hop, json!({ "speed": speed, "air_time": air_time }))
            .await
    }

    pub async fn set_brightness(&self, brightness: u8) -> Result<(), ApiError> {
        self.post_command(Endpoint::Brightness, json!({ "brightness": brightness }))
            .await
    }

    pub async fn set_color(&self, color: Rgb) -> Result<(), ApiError> {
        self.post_command(Endpoint::Color, json!({ "r": color.r, "g": color.g, "b": color.b }))
            .await
    }

    pub async fn set_pattern(&self, pattern: &str) -> Result<(), ApiError> {
        self.post_command(Endpoint::Pattern, json!({ "pattern": pattern }))
            .await
    }

    pub async fn hop_status(&self) -> Result<SensorSnapshot, ApiError> {
        let response = self.send(Endpoint::HopStatus, self.http.get(self.url(Endpoint::HopStatus))).await?;
        Self::decode(Endpoint::HopStatus, response).await
    }

    pub async fn param_update(&self, name: &str, value: f64) -> Result<ParamUpdateResponse, ApiError> {
        let value = value.to_string();
        let request = self
            .http
            .get(self.url(Endpoint::ParamUpdate))
            .query(&[("name", name), ("value", value.as_str())]);
        let response = self.send(Endpoint::ParamUpdate, request).await?;
        Self::decode(Endpoint::ParamUpdate, response).await
    }

    pub async fn monitor_data(&self) -> Result<MonitorSnapshot, ApiError> {
        let response = self.send(Endpoint::MonitorData, self.http.get(self.url(Endpoint::MonitorData))).await?;
        Self::decode(Endpoint::MonitorData, response).await
    }

    // Commands only care about the status code; the body is ignored
    async fn post_command(&self, endpoint: Endpoint, body: serde_json::Value) -> Result<(), ApiError> {
        let response = self.send(endpoint, self.http.post(self.url(endpoint)).json(&body)).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status { endpoint, status });
        }
        Ok(())
    }

    async fn send(
        &self,
        endpoint: Endpoint,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ApiError> {
        debug!(%endpoint, "sending request");
        request
            .send()
            .await
            .map_err(|source| ApiError::Transport { endpoint, source })
    }

    // Telemetry endpoints answer with JSON even on error statuses, so decode regardless
    async fn decode<T: DeserializeOwned>(endpoint: Endpoint, response: reqwest::Response) -> Result<T, ApiError> {
        debug!(%endpoint, status = %response.status(), "decoding response");
        response
            .json::<T>()
            .await
            .map_err(|source| ApiError::Decode { endpoint, source })
    }
}
