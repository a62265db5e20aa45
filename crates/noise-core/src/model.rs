//! Core Types for noise generation
//!
//! Events produced by generators, destinations consumed by senders and the
//! run configuration owned by the scheduler. Wire names are camelCase.

use crate::error::NoiseError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use uuid::Uuid;

pub const MIN_RATE_PER_SECOND: f64 = 0.1;
pub const MAX_RATE_PER_SECOND: f64 = 10_000.0;
pub const DEFAULT_RATE_PER_SECOND: f64 = 10.0;

/// Weight applied to sources configured with a weight of zero or less.
pub const DEFAULT_SOURCE_WEIGHT: u64 = 10;

/// Larger configured weights are clamped so pool totals stay far from `u64::MAX`.
pub const MAX_SOURCE_WEIGHT: u64 = u32::MAX as u64;

/// Opaque field overrides handed to generators. The scheduler never looks inside.
pub type Overrides = serde_json::Map<String, serde_json::Value>;

// ============================================================================
// Events
// ============================================================================

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EventFormat {
    Json,
    Xml,
    Syslog,
    Text,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Fatal,
}

impl Severity {
    /// Syslog severity code (RFC 5424 table 2).
    pub fn syslog_code(self) -> u8 {
        match self {
            Severity::Debug => 7,
            Severity::Info => 6,
            Severity::Warn => 4,
            Severity::Error => 3,
            Severity::Fatal => 2,
        }
    }
}

/// A single synthetic log event, rendered and ready to ship.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    pub event_type_id: String,
    pub template_id: String,
    pub timestamp: DateTime<Utc>,
    pub format: EventFormat,
    pub severity: Severity,
    /// Host the event claims to originate from
    pub host: String,
    /// Emitting program / service (syslog app-name, HEC source)
    pub source: String,
    pub sourcetype: String,
    /// Serialized payload, delivered verbatim inside the transport framing
    pub raw: String,
}

impl Event {
    pub fn new(
        event_type_id: impl Into<String>,
        template_id: impl Into<String>,
        format: EventFormat,
        raw: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type_id: event_type_id.into(),
            template_id: template_id.into(),
            timestamp: Utc::now(),
            format,
            severity: Severity::Info,
            host: String::from("localhost"),
            source: String::from("noisegen"),
            sourcetype: String::from("noisegen"),
            raw: raw.into(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventTypeDescriptor {
    pub id: String,
    pub name: String,
    pub category: String,
    pub format: EventFormat,
    pub description: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDescriptor {
    pub id: String,
    pub name: String,
    pub description: String,
}

impl TemplateDescriptor {
    pub fn new(id: &str, name: &str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
        }
    }
}

/// Event type catalog entry
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventTypeInfo {
    #[serde(flatten)]
    pub descriptor: EventTypeDescriptor,
    pub templates: Vec<TemplateDescriptor>,
}

// ============================================================================
// Destinations
// ============================================================================

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Destination {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub kind: DestinationKind,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum DestinationKind {
    Syslog {
        host: String,
        port: u16,
        #[serde(default)]
        protocol: SyslogProtocol,
        #[serde(default)]
        format: SyslogFormat,
    },
    Hec {
        url: String,
        token: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sourcetype: Option<String>,
        #[serde(default)]
        insecure_skip_verify: bool,
    },
    File {
        path: PathBuf,
        #[serde(default = "default_max_size_mb")]
        max_size_mb: u64,
        #[serde(default = "default_max_backups")]
        max_backups: u32,
    },
}

impl DestinationKind {
    pub fn label(&self) -> &'static str {
        match self {
            DestinationKind::Syslog { .. } => "syslog",
            DestinationKind::Hec { .. } => "hec",
            DestinationKind::File { .. } => "file",
        }
    }
}

fn default_max_size_mb() -> u64 {
    100
}

fn default_max_backups() -> u32 {
    5
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyslogProtocol {
    #[default]
    Udp,
    Tcp,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyslogFormat {
    #[default]
    Rfc5424,
    Rfc3164,
}

// ============================================================================
// Run configuration
// ============================================================================

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NoiseConfig {
    /// Fallback destination for sources without their own
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_id: Option<String>,
    #[serde(default = "default_rate")]
    pub rate_per_second: f64,
    #[serde(default)]
    pub enabled_sources: Vec<EnabledEventSource>,
}

fn default_rate() -> f64 {
    DEFAULT_RATE_PER_SECOND
}

impl NoiseConfig {
    pub fn validate(&self) -> Result<(), NoiseError> {
        validate_rate(self.rate_per_second)
    }

    /// Distinct destination ids that enabled sources resolve to.
    pub fn referenced_destinations(&self) -> BTreeSet<&str> {
        let fallback = self.fallback_destination();
        self.enabled_sources
            .iter()
            .filter(|source| source.enabled)
            .filter_map(|source| source.effective_destination(fallback))
            .collect()
    }

    pub fn fallback_destination(&self) -> Option<&str> {
        self.destination_id.as_deref().filter(|id| !id.is_empty())
    }
}

pub fn validate_rate(rate: f64) -> Result<(), NoiseError> {
    if rate.is_finite() && (MIN_RATE_PER_SECOND..=MAX_RATE_PER_SECOND).contains(&rate) {
        Ok(())
    } else {
        Err(NoiseError::InvalidRate(rate))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnabledEventSource {
    pub event_type_id: String,
    /// Empty means every template the generator exposes
    #[serde(default)]
    pub template_ids: Vec<String>,
    #[serde(default)]
    pub weight: i64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_id: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl EnabledEventSource {
    pub fn new(event_type_id: impl Into<String>) -> Self {
        Self {
            event_type_id: event_type_id.into(),
            template_ids: Vec::new(),
            weight: DEFAULT_SOURCE_WEIGHT as i64,
            enabled: true,
            destination_id: None,
        }
    }

    pub fn effective_weight(&self) -> u64 {
        if self.weight <= 0 {
            DEFAULT_SOURCE_WEIGHT
        } else {
            (self.weight as u64).min(MAX_SOURCE_WEIGHT)
        }
    }

    pub fn effective_destination<'a>(&'a self, fallback: Option<&'a str>) -> Option<&'a str> {
        self.destination_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .or(fallback)
    }
}

/// Partial update applied to a running configuration
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NoiseUpdateRequest {
    #[serde(default)]
    pub rate_per_second: Option<f64>,
    #[serde(default)]
    pub enabled_sources: Option<Vec<EnabledEventSource>>,
}
