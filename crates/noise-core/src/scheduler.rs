//! Continuous Noise Scheduler
//!
//! Drives one select + generate + send cycle per timer tick at the configured
//! events-per-second rate.
//!
//! ## Run lifecycle
//!
//! ```text
//!   Stopped ──start()──▶ Running ──stop()──▶ Stopped
//!                          │  ▲
//!                          └──┘ update_config()
//! ```
//!
//! All run state lives behind one `RwLock` that is never held across an
//! `.await`. The tick loop only reads it to take `Arc` snapshots of the pool
//! and sender map, so status reads and config swaps never wait on a send.

use crate::error::NoiseError;
use crate::generator::GeneratorRegistry;
use crate::metrics::{self, ErrorKind};
use crate::model::{Destination, NoiseConfig, NoiseUpdateRequest, validate_rate};
use crate::pool::WeightedPool;
use crate::sender::{SenderFactory, SenderMap, close_all};
use crate::stats::{NoiseStats, NoiseStatsSnapshot};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Point-in-time view of the scheduler
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NoiseStatus {
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<NoiseConfig>,
    pub stats: NoiseStatsSnapshot,
}

#[derive(Default)]
struct RunState {
    running: bool,
    /// Bumped on every start so a loop from an earlier run cannot act on a newer one
    generation: u64,
    started_at: Option<DateTime<Utc>>,
    stopped_at: Option<DateTime<Utc>>,
    config: Option<NoiseConfig>,
    pool: Arc<WeightedPool>,
    senders: Arc<SenderMap>,
    cancel: Option<CancellationToken>,
    stats: Arc<NoiseStats>,
}

struct Inner {
    registry: Arc<GeneratorRegistry>,
    factory: Arc<dyn SenderFactory>,
    state: RwLock<RunState>,
}

/// Rate-controlled noise scheduler.
///
/// Cheap to clone; clones share the same run.
#[derive(Clone)]
pub struct NoiseGenerator {
    inner: Arc<Inner>,
}

impl NoiseGenerator {
    pub fn new(registry: Arc<GeneratorRegistry>, factory: Arc<dyn SenderFactory>) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry,
                factory,
                state: RwLock::new(RunState::default()),
            }),
        }
    }

    pub fn registry(&self) -> &Arc<GeneratorRegistry> {
        &self.inner.registry
    }

    pub fn is_running(&self) -> bool {
        self.inner.read_state().running
    }

    /// Open senders, build the pool and spawn the tick loop.
    ///
    /// `destinations` resolves the ids referenced by the config; ids it does
    /// not contain are skipped, as are their sources. Returns as soon as the
    /// loop is spawned.
    pub async fn start(
        &self,
        config: NoiseConfig,
        destinations: &HashMap<String, Destination>,
    ) -> Result<(), NoiseError> {
        if self.is_running() {
            return Err(NoiseError::AlreadyRunning);
        }
        config.validate()?;

        let mut senders = SenderMap::new();
        for destination_id in config.referenced_destinations() {
            let Some(destination) = destinations.get(destination_id) else {
                debug!(destination = %destination_id, "Skipping unknown destination");
                continue;
            };
            match self.inner.factory.connect(destination).await {
                Ok(sender) => {
                    senders.insert(destination_id.to_string(), sender);
                }
                Err(source) => {
                    close_all(&senders).await;
                    return Err(NoiseError::Sender {
                        destination_id: destination_id.to_string(),
                        source,
                    });
                }
            }
        }

        let pool = WeightedPool::build(&config, &senders, &self.inner.registry);
        if pool.is_empty() {
            close_all(&senders).await;
            return Err(NoiseError::NoValidSources);
        }

        let rate = config.rate_per_second;
        let source_count = config.enabled_sources.len();
        let entry_count = pool.len();
        let senders = Arc::new(senders);

        let committed = {
            let mut state = self.inner.write_state();
            if state.running {
                None
            } else {
                let cancel = CancellationToken::new();
                let stats = Arc::new(NoiseStats::new());
                state.running = true;
                state.generation += 1;
                state.started_at = Some(Utc::now());
                state.stopped_at = None;
                state.config = Some(config);
                state.pool = Arc::new(pool);
                state.senders = Arc::clone(&senders);
                state.cancel = Some(cancel.clone());
                state.stats = Arc::clone(&stats);
                metrics::RUNNING.set(1);
                Some((state.generation, cancel, stats))
            }
        };

        let Some((generation, cancel, stats)) = committed else {
            close_all(&senders).await;
            return Err(NoiseError::AlreadyRunning);
        };

        info!(
            rate = rate,
            sources = source_count,
            entries = entry_count,
            destinations = senders.len(),
            "Noise generator started"
        );

        tokio::spawn(run_loop(
            Arc::clone(&self.inner),
            generation,
            cancel,
            stats,
            rate,
        ));
        Ok(())
    }

    /// Cancel the loop and close every sender of the current run.
    ///
    /// Close failures are logged, not returned.
    pub async fn stop(&self) -> Result<(), NoiseError> {
        let (senders, stats) = {
            let mut state = self.inner.write_state();
            if !state.running {
                return Err(NoiseError::NotRunning);
            }
            if let Some(cancel) = state.cancel.take() {
                cancel.cancel();
            }
            state.running = false;
            state.stopped_at = Some(Utc::now());
            state.config = None;
            state.pool = Arc::default();
            metrics::RUNNING.set(0);
            (std::mem::take(&mut state.senders), Arc::clone(&state.stats))
        };

        info!(
            generated = stats.total_generated(),
            sent = stats.total_sent(),
            errors = stats.total_errors(),
            "Noise generator stopped"
        );

        close_all(&senders).await;
        Ok(())
    }

    /// Apply a partial update to the running configuration.
    ///
    /// A new source list is resolved against the senders opened at start;
    /// sources whose destination was not open then are dropped without an
    /// error. If that leaves the pool empty the loop keeps ticking without
    /// producing events. Stats and senders are left alone.
    pub fn update_config(&self, update: NoiseUpdateRequest) -> Result<(), NoiseError> {
        let mut state = self.inner.write_state();
        let Some(current) = state.config.as_ref().filter(|_| state.running) else {
            return Err(NoiseError::NotRunning);
        };

        let mut next = current.clone();
        if let Some(rate) = update.rate_per_second {
            validate_rate(rate)?;
            next.rate_per_second = rate;
        }

        if let Some(sources) = update.enabled_sources {
            next.enabled_sources = sources;
            let pool = WeightedPool::build(&next, &state.senders, &self.inner.registry);
            if pool.is_empty() {
                warn!(
                    sources = next.enabled_sources.len(),
                    "No updated source has an open destination; generation idles"
                );
            }
            state.pool = Arc::new(pool);
        }

        info!(
            rate = next.rate_per_second,
            sources = next.enabled_sources.len(),
            entries = state.pool.len(),
            "Noise config updated"
        );
        state.config = Some(next);
        Ok(())
    }

    pub fn status(&self) -> NoiseStatus {
        let (running, started_at, config, stats, duration_seconds) = {
            let state = self.inner.read_state();
            let end = if state.running {
                Some(Utc::now())
            } else {
                state.stopped_at
            };
            let duration_seconds = match (state.started_at, end) {
                (Some(start), Some(end)) => (end - start)
                    .to_std()
                    .map(|d| d.as_secs_f64())
                    .unwrap_or(0.0),
                _ => 0.0,
            };
            (
                state.running,
                state.started_at.filter(|_| state.running),
                state.config.clone(),
                Arc::clone(&state.stats),
                duration_seconds,
            )
        };

        NoiseStatus {
            running,
            started_at,
            config,
            stats: stats.snapshot(duration_seconds),
        }
    }
}

impl Inner {
    fn read_state(&self) -> RwLockReadGuard<'_, RunState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, RunState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pool and senders of the given run, or `None` once it is over
    fn snapshot(&self, generation: u64) -> Option<(Arc<WeightedPool>, Arc<SenderMap>)> {
        let state = self.read_state();
        if !state.running || state.generation != generation || state.pool.is_empty() {
            return None;
        }
        Some((Arc::clone(&state.pool), Arc::clone(&state.senders)))
    }

    fn current_rate(&self, generation: u64) -> Option<f64> {
        let state = self.read_state();
        if !state.running || state.generation != generation {
            return None;
        }
        state.config.as_ref().map(|c| c.rate_per_second)
    }

    async fn run_cycle(&self, generation: u64, stats: &NoiseStats) {
        let Some((pool, senders)) = self.snapshot(generation) else {
            return;
        };
        let selected = {
            let mut rng = rand::rng();
            pool.select(&mut rng).cloned()
        };
        let Some(entry) = selected else {
            return;
        };

        let Some(sender) = senders.get(&entry.destination_id) else {
            record_failure(
                stats,
                ErrorKind::MissingSender,
                format!("sender not found for destination: {}", entry.destination_id),
            );
            return;
        };
        let Some(generator) = self.registry.get(&entry.event_type_id) else {
            record_failure(
                stats,
                ErrorKind::MissingGenerator,
                format!("generator not found for event type: {}", entry.event_type_id),
            );
            return;
        };

        let event = match generator.generate(&entry.template_id, None) {
            Ok(event) => event,
            Err(e) => {
                record_failure(
                    stats,
                    ErrorKind::Generate,
                    format!("generate {}/{}: {}", entry.event_type_id, entry.template_id, e),
                );
                return;
            }
        };

        stats.record_generated(&entry.event_type_id, &entry.template_id, Utc::now());
        metrics::EVENTS_GENERATED
            .with_label_values(&[entry.event_type_id.as_str()])
            .inc();

        let timer = metrics::SEND_DURATION.start_timer();
        let result = sender.send(&event).await;
        timer.observe_duration();

        match result {
            Ok(()) => {
                stats.record_sent();
                metrics::EVENTS_SENT
                    .with_label_values(&[entry.destination_id.as_str()])
                    .inc();
            }
            Err(e) => record_failure(
                stats,
                ErrorKind::Send,
                format!("send to {}: {}", entry.destination_id, e),
            ),
        }
    }
}

fn record_failure(stats: &NoiseStats, kind: ErrorKind, message: String) {
    debug!(kind = kind.as_str(), error = %message, "Noise cycle failed");
    metrics::record_error(kind);
    stats.record_error(message);
}

fn tick_period(rate_per_second: f64) -> Duration {
    Duration::from_secs_f64(1.0 / rate_per_second)
}

/// First tick one period from now. Ticks missed during a slow send are
/// dropped, so a slow destination lowers the rate instead of bursting.
fn ticker(period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn run_loop(
    inner: Arc<Inner>,
    generation: u64,
    cancel: CancellationToken,
    stats: Arc<NoiseStats>,
    mut rate: f64,
) {
    let mut period = tick_period(rate);
    let mut interval = ticker(period);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        inner.run_cycle(generation, &stats).await;

        match inner.current_rate(generation) {
            None => break,
            Some(current) if current != rate => {
                rate = current;
                period = tick_period(rate);
                interval = ticker(period);
                debug!(rate = rate, period_us = period.as_micros() as u64, "Tick interval reset");
            }
            Some(_) => {}
        }
    }

    debug!(generation = generation, "Noise loop exited");
}
