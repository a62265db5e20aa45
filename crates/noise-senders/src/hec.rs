//! Splunk HTTP Event Collector sender
//!
//! One POST per event to `/services/collector/event`. Failures are returned
//! to the caller as-is; there is no retry or batching.

use async_trait::async_trait;
use noise_core::{Event, EventFormat, SendError, Sender};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const EVENT_PATH: &str = "/services/collector/event";
const HEALTH_PATH: &str = "/services/collector/health";

/// Longest response body kept in a status error
const MAX_ERROR_BODY: usize = 256;

#[derive(Debug, Clone)]
pub struct HecConfig {
    pub url: String,
    pub token: String,
    pub index: Option<String>,
    pub sourcetype: Option<String>,
    pub insecure_skip_verify: bool,
    pub timeout: Duration,
}

#[derive(Serialize)]
struct HecEvent<'a> {
    time: f64,
    host: &'a str,
    source: &'a str,
    sourcetype: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    index: Option<&'a str>,
    event: Value,
}

pub struct HecSender {
    client: reqwest::Client,
    event_url: String,
    health_url: String,
    authorization: String,
    index: Option<String>,
    sourcetype: Option<String>,
}

impl HecSender {
    pub fn new(config: HecConfig) -> Result<Self, SendError> {
        let base = config.url.trim_end_matches('/');
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(SendError::InvalidConfig(format!(
                "HEC url must start with http:// or https://: {}",
                config.url
            )));
        }
        if config.token.is_empty() {
            return Err(SendError::InvalidConfig("HEC token is empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(4)
            .danger_accept_invalid_certs(config.insecure_skip_verify)
            .build()
            .map_err(|e| SendError::Http(e.to_string()))?;

        debug!(url = %base, insecure = config.insecure_skip_verify, "HEC sender created");
        Ok(Self {
            client,
            event_url: format!("{}{}", base, EVENT_PATH),
            health_url: format!("{}{}", base, HEALTH_PATH),
            authorization: format!("Splunk {}", config.token),
            index: config.index.filter(|i| !i.is_empty()),
            sourcetype: config.sourcetype.filter(|s| !s.is_empty()),
        })
    }

    fn payload<'a>(&'a self, event: &'a Event) -> HecEvent<'a> {
        // JSON payloads are indexed as objects so fields are searchable
        let body = match event.format {
            EventFormat::Json => serde_json::from_str(&event.raw)
                .unwrap_or_else(|_| Value::String(event.raw.clone())),
            _ => Value::String(event.raw.clone()),
        };
        HecEvent {
            time: event.timestamp.timestamp_millis() as f64 / 1000.0,
            host: &event.host,
            source: &event.source,
            sourcetype: self.sourcetype.as_deref().unwrap_or(&event.sourcetype),
            index: self.index.as_deref(),
            event: body,
        }
    }
}

async fn check_status(response: reqwest::Response) -> Result<(), SendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }
    Err(SendError::Status {
        code: status.as_u16(),
        body,
    })
}

#[async_trait]
impl Sender for HecSender {
    async fn send(&self, event: &Event) -> Result<(), SendError> {
        let response = self
            .client
            .post(&self.event_url)
            .header(reqwest::header::AUTHORIZATION, &self.authorization)
            .json(&self.payload(event))
            .send()
            .await
            .map_err(|e| SendError::Http(e.to_string()))?;
        check_status(response).await
    }

    async fn test(&self) -> Result<(), SendError> {
        let response = self
            .client
            .get(&self.health_url)
            .header(reqwest::header::AUTHORIZATION, &self.authorization)
            .send()
            .await
            .map_err(|e| SendError::Http(e.to_string()))?;
        check_status(response).await
    }

    async fn close(&self) -> Result<(), SendError> {
        Ok(())
    }
}
