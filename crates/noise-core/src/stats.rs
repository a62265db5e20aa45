//! Run statistics
//!
//! Scalars are atomics so the status endpoint can read them without touching
//! the cycle's lock. The breakdown maps and the error ring share one mutex
//! taken once per cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Most recent error messages kept per run
pub const ERROR_SAMPLE_CAPACITY: usize = 5;

#[derive(Debug, Default)]
struct Breakdown {
    by_event_type: HashMap<String, u64>,
    by_template: HashMap<String, u64>,
    last_event_at: Option<DateTime<Utc>>,
    error_samples: VecDeque<String>,
}

/// Live counters for a single run. Replaced wholesale on every start.
#[derive(Debug, Default)]
pub struct NoiseStats {
    total_generated: AtomicU64,
    total_sent: AtomicU64,
    total_errors: AtomicU64,
    breakdown: Mutex<Breakdown>,
}

impl NoiseStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn breakdown(&self) -> MutexGuard<'_, Breakdown> {
        self.breakdown.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count a successful generation and attribute it to its type and template.
    pub fn record_generated(&self, event_type_id: &str, template_id: &str, at: DateTime<Utc>) {
        self.total_generated.fetch_add(1, Ordering::Relaxed);

        let mut breakdown = self.breakdown();
        *breakdown
            .by_event_type
            .entry(event_type_id.to_string())
            .or_insert(0) += 1;
        *breakdown
            .by_template
            .entry(template_id.to_string())
            .or_insert(0) += 1;
        breakdown.last_event_at = Some(at);
    }

    pub fn record_sent(&self) {
        self.total_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one failure and keep its message, evicting the oldest sample.
    pub fn record_error(&self, message: impl Into<String>) {
        self.total_errors.fetch_add(1, Ordering::Relaxed);

        let mut breakdown = self.breakdown();
        if breakdown.error_samples.len() == ERROR_SAMPLE_CAPACITY {
            breakdown.error_samples.pop_front();
        }
        breakdown.error_samples.push_back(message.into());
    }

    pub fn total_generated(&self) -> u64 {
        self.total_generated.load(Ordering::Relaxed)
    }

    pub fn total_sent(&self) -> u64 {
        self.total_sent.load(Ordering::Relaxed)
    }

    pub fn total_errors(&self) -> u64 {
        self.total_errors.load(Ordering::Relaxed)
    }

    /// Deep copy for callers. `duration_seconds` is supplied by the scheduler,
    /// which owns the run's start and stop times.
    pub fn snapshot(&self, duration_seconds: f64) -> NoiseStatsSnapshot {
        let total_generated = self.total_generated();
        let total_sent = self.total_sent();
        let total_errors = self.total_errors();

        let breakdown = self.breakdown();
        let events_per_second = if duration_seconds > 0.0 {
            total_sent as f64 / duration_seconds
        } else {
            0.0
        };

        NoiseStatsSnapshot {
            total_generated,
            total_sent,
            total_errors,
            by_event_type: breakdown
                .by_event_type
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
            by_template: breakdown
                .by_template
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
            last_event_at: breakdown.last_event_at,
            error_samples: breakdown.error_samples.iter().cloned().collect(),
            duration_seconds,
            events_per_second,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NoiseStatsSnapshot {
    pub total_generated: u64,
    pub total_sent: u64,
    pub total_errors: u64,
    pub by_event_type: BTreeMap<String, u64>,
    pub by_template: BTreeMap<String, u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_event_at: Option<DateTime<Utc>>,
    pub error_samples: Vec<String>,
    pub duration_seconds: f64,
    pub events_per_second: f64,
}
