//! Weighted Source Pool
//!
//! Flattens the enabled sources of a [`NoiseConfig`] into selectable
//! `(event type, template, destination)` entries. The pool is immutable once
//! built; every start or source update builds a new one.

use crate::generator::GeneratorRegistry;
use crate::model::NoiseConfig;
use crate::sender::SenderMap;
use rand::Rng;
use serde::Serialize;

/// One selectable entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightedTemplate {
    pub event_type_id: String,
    pub template_id: String,
    pub destination_id: String,
    pub weight: u64,
}

#[derive(Debug, Clone, Default)]
pub struct WeightedPool {
    entries: Vec<WeightedTemplate>,
    total_weight: u64,
}

impl WeightedPool {
    /// Build the pool for `config` against the currently open senders.
    ///
    /// Sources are skipped silently when disabled, when their destination has
    /// no open sender, or when no generator is registered for their event
    /// type. A source's weight (clamped to `MAX_SOURCE_WEIGHT`) is split evenly across its templates with a
    /// floor of one per template, so a source with more templates than weight
    /// contributes more than its configured weight.
    pub fn build(config: &NoiseConfig, senders: &SenderMap, registry: &GeneratorRegistry) -> Self {
        let fallback = config.fallback_destination();
        let mut entries = Vec::new();

        for source in config.enabled_sources.iter().filter(|s| s.enabled) {
            let Some(destination_id) = source.effective_destination(fallback) else {
                continue;
            };
            if !senders.contains_key(destination_id) {
                continue;
            }
            let Some(generator) = registry.get(&source.event_type_id) else {
                continue;
            };

            let available: Vec<String> = generator.templates().into_iter().map(|t| t.id).collect();
            let template_ids: &[String] = if source.template_ids.is_empty() {
                &available
            } else {
                &source.template_ids
            };
            if template_ids.is_empty() {
                continue;
            }

            // Split over the configured ids, unknown ones included
            let per_template = (source.effective_weight() / template_ids.len() as u64).max(1);

            for template_id in template_ids {
                if !available.contains(template_id) {
                    continue;
                }
                entries.push(WeightedTemplate {
                    event_type_id: source.event_type_id.clone(),
                    template_id: template_id.clone(),
                    destination_id: destination_id.to_string(),
                    weight: per_template,
                });
            }
        }

        // Only reachable with billions of clamped entries; treated as no usable sources
        let Some(total_weight) = entries
            .iter()
            .try_fold(0u64, |total, e| total.checked_add(e.weight))
        else {
            return Self::default();
        };
        Self {
            entries,
            total_weight,
        }
    }

    pub fn entries(&self) -> &[WeightedTemplate] {
        &self.entries
    }

    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_weight == 0
    }

    /// Pick an entry with probability proportional to its weight.
    ///
    /// Cumulative scan over the entries; pools hold tens to low hundreds of
    /// entries so a linear walk is cheaper than maintaining an index.
    pub fn select<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&WeightedTemplate> {
        if self.total_weight == 0 {
            return None;
        }
        let r = rng.random_range(0..self.total_weight);
        let mut cumulative: u64 = 0;
        for entry in &self.entries {
            cumulative = cumulative.saturating_add(entry.weight);
            if r < cumulative {
                return Some(entry);
            }
        }
        None
    }
}
