//! Error types
//!
//! `NoiseError` is what callers of the scheduler see. Generator and sender
//! failures during a running cycle never surface here; they are counted and
//! sampled in the run statistics instead.

use std::fmt;

/// Configuration errors returned by start / stop / update_config
#[derive(Debug)]
pub enum NoiseError {
    AlreadyRunning,
    NotRunning,
    NoValidSources,
    InvalidRate(f64),
    Sender {
        destination_id: String,
        source: SendError,
    },
}

impl fmt::Display for NoiseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyRunning => write!(f, "noise generator is already running"),
            Self::NotRunning => write!(f, "noise generator is not running"),
            Self::NoValidSources => write!(f, "no valid event sources enabled"),
            Self::InvalidRate(rate) => write!(
                f,
                "rate {} is outside the supported range {}..={} events per second",
                rate,
                crate::model::MIN_RATE_PER_SECOND,
                crate::model::MAX_RATE_PER_SECOND
            ),
            Self::Sender {
                destination_id,
                source,
            } => write!(
                f,
                "failed to create sender for destination {}: {}",
                destination_id, source
            ),
        }
    }
}

impl std::error::Error for NoiseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Sender { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Errors raised by content generators
#[derive(Debug, Clone, PartialEq)]
pub enum GenerateError {
    UnknownTemplate {
        event_type: String,
        template: String,
    },
    InvalidOverride {
        field: String,
        reason: String,
    },
    Render(String),
}

impl fmt::Display for GenerateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTemplate {
                event_type,
                template,
            } => write!(f, "unknown template {} for event type {}", template, event_type),
            Self::InvalidOverride { field, reason } => {
                write!(f, "invalid override for {}: {}", field, reason)
            }
            Self::Render(e) => write!(f, "render failed: {}", e),
        }
    }
}

impl std::error::Error for GenerateError {}

/// Errors raised by destination senders
#[derive(Debug)]
pub enum SendError {
    Io(std::io::Error),
    Http(String),
    Status { code: u16, body: String },
    Closed,
    InvalidConfig(String),
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "i/o error: {}", e),
            Self::Http(e) => write!(f, "http error: {}", e),
            Self::Status { code, body } if body.is_empty() => write!(f, "status {}", code),
            Self::Status { code, body } => write!(f, "status {}: {}", code, body),
            Self::Closed => write!(f, "sender is closed"),
            Self::InvalidConfig(e) => write!(f, "invalid destination config: {}", e),
        }
    }
}

impl std::error::Error for SendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SendError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
