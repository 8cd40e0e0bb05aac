//! Model registry: resource name to handler constructor, populated at startup.

use crate::config::{validate, ResourceDefinition};
use crate::error::{AppError, ConfigError};
use crate::service::ResourceHandler;
use crate::store::RecordStore;
use std::sync::Arc;

/// Builds a handler around a request's store handle.
pub type HandlerFactory = Arc<dyn Fn(Arc<ResourceDefinition>, Box<dyn RecordStore>) -> ResourceHandler + Send + Sync>;

#[derive(Clone)]
pub struct RegisteredResource {
    definition: Arc<ResourceDefinition>,
    factory: HandlerFactory,
}

impl RegisteredResource {
    pub fn definition(&self) -> &ResourceDefinition {
        &self.definition
    }

    /// New handler for one request. Handlers are never reused.
    pub fn handler(&self, store: Box<dyn RecordStore>) -> ResourceHandler {
        (self.factory)(self.definition.clone(), store)
    }
}

/// Registered resources in registration order.
#[derive(Clone, Default)]
pub struct ModelRegistry {
    entries: Vec<RegisteredResource>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource with the standard handler.
    pub fn register(&mut self, definition: ResourceDefinition) -> Result<(), ConfigError> {
        self.register_with(definition, ResourceHandler::new)
    }

    /// Register a resource with a custom handler constructor.
    pub fn register_with<F>(&mut self, mut definition: ResourceDefinition, factory: F) -> Result<(), ConfigError>
    where
        F: Fn(Arc<ResourceDefinition>, Box<dyn RecordStore>) -> ResourceHandler + Send + Sync + 'static,
    {
        definition.name = definition.name.to_lowercase();
        validate(&definition)?;
        if self.entries.iter().any(|e| {
            e.definition.name == definition.name || e.definition.path_segment == definition.path_segment
        }) {
            return Err(ConfigError::DuplicateResource(definition.name));
        }
        tracing::debug!(resource = %definition.name, path = %definition.path_segment, "registered resource");
        self.entries.push(RegisteredResource {
            definition: Arc::new(definition),
            factory: Arc::new(factory),
        });
        Ok(())
    }

    /// Case-insensitive lookup by resource name.
    pub fn resolve(&self, name: &str) -> Result<&RegisteredResource, AppError> {
        let name = name.to_lowercase();
        self.entries
            .iter()
            .find(|e| e.definition.name == name)
            .ok_or_else(|| AppError::NotFound("Model".into()))
    }

    pub fn resources(&self) -> impl Iterator<Item = &RegisteredResource> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
