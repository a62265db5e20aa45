//! Scheduler behaviour against in-memory generators and senders.

use async_trait::async_trait;
use noise_core::{
    ContentGenerator, Destination, DestinationKind, EnabledEventSource, Event, EventFormat,
    EventTypeDescriptor, GenerateError, GeneratorRegistry, NoiseConfig, NoiseError,
    NoiseGenerator, NoiseUpdateRequest, Overrides, SendError, Sender, SenderFactory,
    SyslogFormat, SyslogProtocol, TemplateDescriptor,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Test doubles
// ============================================================================

struct StubGenerator {
    id: &'static str,
    templates: &'static [&'static str],
}

impl ContentGenerator for StubGenerator {
    fn event_type(&self) -> EventTypeDescriptor {
        EventTypeDescriptor {
            id: self.id.to_string(),
            name: self.id.to_string(),
            category: "test".to_string(),
            format: EventFormat::Json,
            description: String::new(),
        }
    }

    fn templates(&self) -> Vec<TemplateDescriptor> {
        self.templates
            .iter()
            .map(|t| TemplateDescriptor::new(t, t, ""))
            .collect()
    }

    fn generate(&self, template_id: &str, _: Option<&Overrides>) -> Result<Event, GenerateError> {
        if template_id == "broken" {
            return Err(GenerateError::Render("template exploded".to_string()));
        }
        Ok(Event::new(self.id, template_id, EventFormat::Json, "{}"))
    }
}

#[derive(Default)]
struct Recorder {
    sent: Mutex<Vec<(String, String)>>,
    closes: Mutex<HashMap<String, u32>>,
}

impl Recorder {
    fn sent_types(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
    }

    fn closes(&self, destination_id: &str) -> u32 {
        self.closes
            .lock()
            .unwrap()
            .get(destination_id)
            .copied()
            .unwrap_or(0)
    }
}

struct RecordingSender {
    destination_id: String,
    fail: bool,
    /// Delay applied to the first send only
    stall: Mutex<Option<Duration>>,
    recorder: Arc<Recorder>,
}

#[async_trait]
impl Sender for RecordingSender {
    async fn send(&self, event: &Event) -> Result<(), SendError> {
        let stall = self.stall.lock().unwrap().take();
        if let Some(stall) = stall {
            tokio::time::sleep(stall).await;
        }
        if self.fail {
            return Err(SendError::Http("connection refused".to_string()));
        }
        self.recorder
            .sent
            .lock()
            .unwrap()
            .push((self.destination_id.clone(), event.event_type_id.clone()));
        Ok(())
    }

    async fn test(&self) -> Result<(), SendError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), SendError> {
        *self
            .recorder
            .closes
            .lock()
            .unwrap()
            .entry(self.destination_id.clone())
            .or_insert(0) += 1;
        Ok(())
    }
}

#[derive(Default)]
struct RecordingFactory {
    recorder: Arc<Recorder>,
    failing_sends: HashSet<String>,
    refused: HashSet<String>,
    first_send_stall: Option<Duration>,
}

#[async_trait]
impl SenderFactory for RecordingFactory {
    async fn connect(&self, destination: &Destination) -> Result<Arc<dyn Sender>, SendError> {
        if self.refused.contains(&destination.id) {
            return Err(SendError::InvalidConfig("refused".to_string()));
        }
        Ok(Arc::new(RecordingSender {
            destination_id: destination.id.clone(),
            fail: self.failing_sends.contains(&destination.id),
            stall: Mutex::new(self.first_send_stall),
            recorder: Arc::clone(&self.recorder),
        }))
    }
}

// ============================================================================
// Fixtures
// ============================================================================

fn registry() -> Arc<GeneratorRegistry> {
    Arc::new(
        GeneratorRegistry::new()
            .with(StubGenerator {
                id: "dns_query",
                templates: &["query_allowed", "query_blocked"],
            })
            .with(StubGenerator {
                id: "firewall",
                templates: &["allow", "deny"],
            })
            .with(StubGenerator {
                id: "faulty",
                templates: &["broken"],
            }),
    )
}

fn destinations(ids: &[&str]) -> HashMap<String, Destination> {
    ids.iter()
        .map(|id| {
            let destination = Destination {
                id: id.to_string(),
                name: id.to_string(),
                kind: DestinationKind::Syslog {
                    host: "127.0.0.1".to_string(),
                    port: 514,
                    protocol: SyslogProtocol::Udp,
                    format: SyslogFormat::Rfc5424,
                },
            };
            (id.to_string(), destination)
        })
        .collect()
}

fn config(rate: f64, sources: Vec<EnabledEventSource>) -> NoiseConfig {
    NoiseConfig {
        destination_id: Some("d1".to_string()),
        rate_per_second: rate,
        enabled_sources: sources,
    }
}

fn source_to(event_type: &str, destination: &str) -> EnabledEventSource {
    let mut source = EnabledEventSource::new(event_type);
    source.destination_id = Some(destination.to_string());
    source
}

fn setup(factory: RecordingFactory) -> (NoiseGenerator, Arc<Recorder>) {
    let recorder = Arc::clone(&factory.recorder);
    (NoiseGenerator::new(registry(), Arc::new(factory)), recorder)
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_start_then_second_start_rejected() {
    let (noise, _) = setup(RecordingFactory::default());
    let dests = destinations(&["d1"]);

    noise
        .start(config(10.0, vec![EnabledEventSource::new("dns_query")]), &dests)
        .await
        .unwrap();
    assert!(noise.is_running());

    let second = noise
        .start(config(10.0, vec![EnabledEventSource::new("dns_query")]), &dests)
        .await;
    assert!(matches!(second, Err(NoiseError::AlreadyRunning)));

    let status = noise.status();
    assert!(status.running);
    assert!(status.started_at.is_some());
    assert_eq!(status.config.unwrap().rate_per_second, 10.0);

    noise.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_unresolvable_sources_close_built_senders() {
    let (noise, recorder) = setup(RecordingFactory::default());

    // d1 opens but its only source has no generator; d2 is not a known destination
    let cfg = config(
        10.0,
        vec![
            EnabledEventSource::new("not_registered"),
            source_to("dns_query", "d2"),
        ],
    );
    let err = noise.start(cfg, &destinations(&["d1"])).await.unwrap_err();

    assert!(matches!(err, NoiseError::NoValidSources));
    assert!(!noise.is_running());
    assert_eq!(recorder.closes("d1"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_sender_failure_aborts_start() {
    let factory = RecordingFactory {
        refused: HashSet::from(["d2".to_string()]),
        ..Default::default()
    };
    let (noise, recorder) = setup(factory);

    let cfg = config(
        10.0,
        vec![EnabledEventSource::new("dns_query"), source_to("firewall", "d2")],
    );
    let err = noise.start(cfg, &destinations(&["d1", "d2"])).await.unwrap_err();

    match err {
        NoiseError::Sender { destination_id, .. } => assert_eq!(destination_id, "d2"),
        other => panic!("unexpected error {:?}", other),
    }
    assert!(!noise.is_running());
    assert_eq!(recorder.closes("d1"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_closes_each_destination_once() {
    let (noise, recorder) = setup(RecordingFactory::default());
    let cfg = config(
        50.0,
        vec![EnabledEventSource::new("dns_query"), source_to("firewall", "d2")],
    );
    noise.start(cfg, &destinations(&["d1", "d2"])).await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;

    noise.stop().await.unwrap();
    assert!(!noise.is_running());
    assert_eq!(recorder.closes("d1"), 1);
    assert_eq!(recorder.closes("d2"), 1);

    assert!(matches!(noise.stop().await, Err(NoiseError::NotRunning)));
    assert_eq!(recorder.closes("d1"), 1);

    let status = noise.status();
    assert!(!status.running);
    assert!(status.started_at.is_none());
    assert!(status.config.is_none());
    assert!(status.stats.total_generated > 0);
}

#[tokio::test(start_paused = true)]
async fn test_restart_resets_stats() {
    let (noise, _) = setup(RecordingFactory::default());
    let dests = destinations(&["d1"]);

    noise
        .start(config(100.0, vec![EnabledEventSource::new("dns_query")]), &dests)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(205)).await;
    noise.stop().await.unwrap();
    assert!(noise.status().stats.total_generated >= 19);

    noise
        .start(config(100.0, vec![EnabledEventSource::new("firewall")]), &dests)
        .await
        .unwrap();
    let fresh = noise.status().stats;
    assert_eq!(fresh.total_generated, 0);
    assert!(fresh.by_event_type.is_empty());

    tokio::time::sleep(Duration::from_millis(105)).await;
    let stats = noise.status().stats;
    assert!(!stats.by_event_type.contains_key("dns_query"));
    noise.stop().await.unwrap();
}

// ============================================================================
// Rate and accounting
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_thousand_events_per_second() {
    let (noise, recorder) = setup(RecordingFactory::default());
    noise
        .start(
            config(1000.0, vec![EnabledEventSource::new("dns_query")]),
            &destinations(&["d1"]),
        )
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(1)).await;
    noise.stop().await.unwrap();

    let stats = noise.status().stats;
    assert!(
        (950..=1050).contains(&stats.total_generated),
        "generated {}",
        stats.total_generated
    );
    assert_eq!(stats.by_event_type.len(), 1);
    assert_eq!(stats.by_event_type["dns_query"], stats.total_generated);
    assert_eq!(stats.by_template.values().sum::<u64>(), stats.total_generated);
    assert_eq!(stats.total_sent, stats.total_generated);
    assert_eq!(stats.total_errors, 0);
    assert!(recorder.sent_types().iter().all(|t| t == "dns_query"));
}

#[tokio::test(start_paused = true)]
async fn test_send_failures_still_count_generation() {
    let factory = RecordingFactory {
        failing_sends: HashSet::from(["d1".to_string()]),
        ..Default::default()
    };
    let (noise, _) = setup(factory);
    noise
        .start(
            config(100.0, vec![EnabledEventSource::new("dns_query")]),
            &destinations(&["d1"]),
        )
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(505)).await;
    let stats = noise.status().stats;
    noise.stop().await.unwrap();

    assert!(stats.total_generated >= 45);
    assert_eq!(stats.total_sent, 0);
    assert_eq!(stats.total_errors, stats.total_generated);
    assert_eq!(stats.by_event_type.values().sum::<u64>(), stats.total_generated);
    assert_eq!(stats.by_template.values().sum::<u64>(), stats.total_generated);
    assert!(stats.last_event_at.is_some());
    assert_eq!(stats.error_samples.len(), 5);
    assert!(
        stats
            .error_samples
            .iter()
            .all(|e| e.starts_with("send to d1: "))
    );
}

#[tokio::test(start_paused = true)]
async fn test_generate_failures_are_sampled() {
    let (noise, recorder) = setup(RecordingFactory::default());
    noise
        .start(
            config(100.0, vec![EnabledEventSource::new("faulty")]),
            &destinations(&["d1"]),
        )
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(105)).await;
    let stats = noise.status().stats;
    noise.stop().await.unwrap();

    assert_eq!(stats.total_generated, 0);
    assert!(stats.total_errors >= 9);
    assert!(stats.by_event_type.is_empty());
    assert_eq!(
        stats.error_samples[0],
        "generate faulty/broken: render failed: template exploded"
    );
    assert!(recorder.sent_types().is_empty());
}

// ============================================================================
// Live reconfiguration
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_rate_update_keeps_stats_and_retimes_loop() {
    let (noise, _) = setup(RecordingFactory::default());
    noise
        .start(
            config(10.0, vec![EnabledEventSource::new("dns_query")]),
            &destinations(&["d1"]),
        )
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(1050)).await;
    let before = noise.status().stats.total_generated;
    assert_eq!(before, 10);

    noise
        .update_config(NoiseUpdateRequest {
            rate_per_second: Some(100.0),
            enabled_sources: None,
        })
        .unwrap();
    assert_eq!(noise.status().stats.total_generated, before);
    assert_eq!(noise.status().config.unwrap().rate_per_second, 100.0);

    tokio::time::sleep(Duration::from_secs(1)).await;
    let gained = noise.status().stats.total_generated - before;
    noise.stop().await.unwrap();

    assert!((85..=105).contains(&gained), "gained {}", gained);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_rate_update_rejected() {
    let (noise, _) = setup(RecordingFactory::default());
    noise
        .start(
            config(10.0, vec![EnabledEventSource::new("dns_query")]),
            &destinations(&["d1"]),
        )
        .await
        .unwrap();

    let err = noise
        .update_config(NoiseUpdateRequest {
            rate_per_second: Some(50_000.0),
            enabled_sources: None,
        })
        .unwrap_err();
    assert!(matches!(err, NoiseError::InvalidRate(_)));
    assert_eq!(noise.status().config.unwrap().rate_per_second, 10.0);
    noise.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_source_update_rebuilds_pool() {
    let (noise, recorder) = setup(RecordingFactory::default());
    noise
        .start(
            config(100.0, vec![EnabledEventSource::new("dns_query")]),
            &destinations(&["d1"]),
        )
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(105)).await;

    noise
        .update_config(NoiseUpdateRequest {
            rate_per_second: None,
            enabled_sources: Some(vec![EnabledEventSource::new("firewall")]),
        })
        .unwrap();
    let sent_before = recorder.sent_types().len();

    tokio::time::sleep(Duration::from_millis(205)).await;
    noise.stop().await.unwrap();

    let after: Vec<String> = recorder.sent_types().split_off(sent_before);
    assert!(!after.is_empty());
    assert!(after.iter().all(|t| t == "firewall"));

    let stats = noise.status().stats;
    assert!(stats.by_event_type["dns_query"] > 0);
    assert!(stats.by_event_type["firewall"] > 0);
}

#[tokio::test(start_paused = true)]
async fn test_source_update_to_unopened_destination_idles() {
    let (noise, recorder) = setup(RecordingFactory::default());
    noise
        .start(
            config(10.0, vec![EnabledEventSource::new("dns_query")]),
            &destinations(&["d1", "d2"]),
        )
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;

    noise
        .update_config(NoiseUpdateRequest {
            rate_per_second: Some(20.0),
            enabled_sources: Some(vec![source_to("firewall", "d2")]),
        })
        .unwrap();

    let config = noise.status().config.unwrap();
    assert_eq!(config.rate_per_second, 20.0);
    assert_eq!(config.enabled_sources[0].event_type_id, "firewall");

    let before = noise.status().stats;
    let sent_before = recorder.sent_types().len();
    tokio::time::sleep(Duration::from_secs(1)).await;
    let after = noise.status().stats;

    assert!(noise.is_running());
    assert_eq!(after.total_generated, before.total_generated);
    assert_eq!(after.total_errors, 0);
    assert_eq!(recorder.sent_types().len(), sent_before);
    noise.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_source_update_drops_only_unopened_destinations() {
    let (noise, recorder) = setup(RecordingFactory::default());
    noise
        .start(
            config(100.0, vec![EnabledEventSource::new("firewall")]),
            &destinations(&["d1", "d2"]),
        )
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(105)).await;

    noise
        .update_config(NoiseUpdateRequest {
            rate_per_second: None,
            enabled_sources: Some(vec![
                EnabledEventSource::new("dns_query"),
                source_to("firewall", "d2"),
            ]),
        })
        .unwrap();
    assert_eq!(noise.status().config.unwrap().enabled_sources.len(), 2);
    let sent_before = recorder.sent_types().len();

    tokio::time::sleep(Duration::from_millis(305)).await;
    noise.stop().await.unwrap();

    let after: Vec<String> = recorder.sent_types().split_off(sent_before);
    assert!(after.len() >= 25, "sent {}", after.len());
    assert!(after.iter().all(|t| t == "dns_query"));
    assert_eq!(noise.status().stats.total_errors, 0);
}

// ============================================================================
// Back-pressure
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_slow_send_does_not_burst_afterwards() {
    let factory = RecordingFactory {
        first_send_stall: Some(Duration::from_secs(3)),
        ..Default::default()
    };
    let (noise, recorder) = setup(factory);
    noise
        .start(
            config(10.0, vec![EnabledEventSource::new("dns_query")]),
            &destinations(&["d1"]),
        )
        .await
        .unwrap();

    // first tick at 0.1s stalls until 3.1s; the ~30 ticks missed meanwhile are dropped
    tokio::time::sleep(Duration::from_millis(3450)).await;
    let generated = noise.status().stats.total_generated;
    noise.stop().await.unwrap();

    assert!((4..=6).contains(&generated), "generated {}", generated);
    assert!(recorder.sent_types().len() as u64 <= generated);
}
