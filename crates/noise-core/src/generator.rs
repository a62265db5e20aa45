//! Content generator contract and registry

use crate::error::GenerateError;
use crate::model::{Event, EventTypeDescriptor, EventTypeInfo, Overrides, TemplateDescriptor};
use std::collections::HashMap;
use std::sync::Arc;

/// Turns a template id plus optional overrides into a rendered event.
///
/// Implementations are stateless apart from randomness and must be cheap
/// enough to call once per scheduler tick.
pub trait ContentGenerator: Send + Sync {
    fn event_type(&self) -> EventTypeDescriptor;

    fn templates(&self) -> Vec<TemplateDescriptor>;

    fn generate(
        &self,
        template_id: &str,
        overrides: Option<&Overrides>,
    ) -> Result<Event, GenerateError>;
}

/// Lookup of generators by event type id
#[derive(Clone, Default)]
pub struct GeneratorRegistry {
    generators: HashMap<String, Arc<dyn ContentGenerator>>,
}

impl GeneratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a generator under its event type id, returning the one it replaced.
    pub fn register(
        &mut self,
        generator: Arc<dyn ContentGenerator>,
    ) -> Option<Arc<dyn ContentGenerator>> {
        let id = generator.event_type().id;
        self.generators.insert(id, generator)
    }

    pub fn with<G: ContentGenerator + 'static>(mut self, generator: G) -> Self {
        self.register(Arc::new(generator));
        self
    }

    pub fn get(&self, event_type_id: &str) -> Option<&Arc<dyn ContentGenerator>> {
        self.generators.get(event_type_id)
    }

    pub fn len(&self) -> usize {
        self.generators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }

    /// Descriptors with their templates, sorted by event type id
    pub fn catalog(&self) -> Vec<EventTypeInfo> {
        let mut catalog: Vec<EventTypeInfo> = self
            .generators
            .values()
            .map(|generator| EventTypeInfo {
                descriptor: generator.event_type(),
                templates: generator.templates(),
            })
            .collect();
        catalog.sort_by(|a, b| a.descriptor.id.cmp(&b.descriptor.id));
        catalog
    }
}

impl std::fmt::Debug for GeneratorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<&String> = self.generators.keys().collect();
        ids.sort();
        f.debug_struct("GeneratorRegistry")
            .field("event_types", &ids)
            .finish()
    }
}
