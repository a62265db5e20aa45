//! # noise-core - Continuous Security Log Noise Scheduler
//!
//! Rate-controlled synthetic event production for testing log ingestion and
//! detection pipelines.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       NoiseGenerator                         │
//! │                                                              │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────────┐  │
//! │  │ WeightedPool │──▶│  tick loop   │──▶│  NoiseStats       │  │
//! │  │ (selection)  │   │ (interval)   │   │  (atomics + ring) │  │
//! │  └──────────────┘   └──────┬───────┘   └──────────────────┘  │
//! │                            │                                 │
//! │              ┌─────────────┴─────────────┐                   │
//! │              ▼                           ▼                   │
//! │   ┌────────────────────┐     ┌──────────────────────┐        │
//! │   │ ContentGenerator   │     │ Sender (per dest.)   │        │
//! │   │ (event type)       │     │ syslog / hec / file  │        │
//! │   └────────────────────┘     └──────────────────────┘        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick performs exactly one cycle: pick a weighted
//! `(event type, template, destination)` entry, generate the event, send it.
//! Configuration can be swapped while running and status can be read from any
//! task without stalling the loop.

pub mod error;
pub mod generator;
pub mod metrics;
pub mod model;
pub mod pool;
pub mod scheduler;
pub mod sender;
pub mod stats;

pub use error::{GenerateError, NoiseError, SendError};
pub use generator::{ContentGenerator, GeneratorRegistry};
pub use model::{
    Destination, DestinationKind, EnabledEventSource, Event, EventFormat, EventTypeDescriptor,
    EventTypeInfo, NoiseConfig, NoiseUpdateRequest, Overrides, Severity, SyslogFormat,
    SyslogProtocol, TemplateDescriptor,
};
pub use pool::{WeightedPool, WeightedTemplate};
pub use scheduler::{NoiseGenerator, NoiseStatus};
pub use sender::{Sender, SenderFactory, SenderMap};
pub use stats::{NoiseStats, NoiseStatsSnapshot};
