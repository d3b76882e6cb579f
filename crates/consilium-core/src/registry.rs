//! The process-wide role table.
//!
//! Built once at startup from the built-in specialists plus the
//! role-definition document, then shared read-only behind an `Arc`.

use std::collections::HashMap;
use std::sync::Arc;

use consilium_llm::TextGenerator;
use tracing::{info, warn};

use crate::config::{RoleCatalog, RoleDefinition};
use crate::connector::{Connector, ConnectorConfig};
use crate::error::{ConfigResult, RegistryError, RegistryResult};
use crate::results::CONNECTOR_KEY;
use crate::roles::{
    canonical_role_id, ResearchSpecialist, Role, Synthesizer, TemplatedSpecialist,
    CONNECTOR_ROLE_ID,
};
use crate::text::placeholder_count;

#[derive(Debug, Default)]
pub struct RoleRegistry {
    roles: Vec<Role>,
    index: HashMap<String, usize>,
    configuration_error: Option<String>,
}

impl RoleRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the research specialist and the connector.
    ///
    /// Built-ins must always register; any failure here is fatal to startup.
    pub fn with_builtins(
        generator: Arc<dyn TextGenerator>,
        connector: ConnectorConfig,
    ) -> RegistryResult<Self> {
        let mut registry = Self::new();
        registry.register(ResearchSpecialist::role(generator.clone()))?;
        registry.register(Connector::role(generator, connector))?;
        Ok(registry)
    }

    pub fn register(&mut self, role: Role) -> RegistryResult<()> {
        if role.id().is_empty() {
            return Err(RegistryError::EmptyRoleId);
        }
        if self.index.contains_key(role.id()) {
            return Err(RegistryError::DuplicateRole(role.id().to_string()));
        }
        // Display names key the result set.
        if role.display_name() == CONNECTOR_KEY {
            return Err(RegistryError::ReservedDisplayName(CONNECTOR_KEY.to_string()));
        }
        if self.roles.iter().any(|r| r.display_name() == role.display_name()) {
            return Err(RegistryError::DuplicateDisplayName(
                role.display_name().to_string(),
            ));
        }
        self.index.insert(role.id().to_string(), self.roles.len());
        self.roles.push(role);
        Ok(())
    }

    /// Register one configured specialist.
    pub fn register_definition(
        &mut self,
        definition: RoleDefinition,
        generator: Arc<dyn TextGenerator>,
    ) -> RegistryResult<()> {
        let id = canonical_role_id(&definition.name);
        if id.is_empty() {
            return Err(RegistryError::EmptyRoleId);
        }
        let placeholders = placeholder_count(&definition.prompt);
        if placeholders != 1 {
            return Err(RegistryError::InvalidTemplate {
                role: id,
                placeholders,
            });
        }

        let label = definition.label().to_string();
        let capability = TemplatedSpecialist::new(
            definition.prompt,
            definition.temperature,
            definition.model,
            definition.mode,
            generator,
        );
        let mut role = Role::new(&id, label, Arc::new(capability))
            .with_keywords(definition.keywords, definition.keyword_weight);
        if let Some(detection) = definition.detection {
            role = role.with_detection(detection);
        }
        self.register(role)
    }

    /// Register every definition of a loaded document.
    ///
    /// Rejected records are skipped with a warning. A document that failed
    /// to load is remembered so detection can route to keyword fallback.
    /// Returns the number of roles added.
    pub fn load_definitions(
        &mut self,
        catalog: ConfigResult<RoleCatalog>,
        generator: Arc<dyn TextGenerator>,
    ) -> usize {
        let catalog = match catalog {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!(error = %e, "role definitions unavailable");
                self.configuration_error = Some(e.to_string());
                return 0;
            }
        };

        let mut added = 0;
        for definition in catalog.definitions {
            let name = definition.name.clone();
            match self.register_definition(definition, generator.clone()) {
                Ok(()) => added += 1,
                Err(e) => warn!(role = %name, error = %e, "skipping role definition"),
            }
        }
        info!(
            added,
            skipped = catalog.skipped,
            total = self.roles.len(),
            "role definitions loaded"
        );
        added
    }

    /// Case-insensitive lookup.
    pub fn get(&self, id: &str) -> Option<&Role> {
        self.index
            .get(&canonical_role_id(id))
            .map(|&slot| &self.roles[slot])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Whether `id` names a role the orchestrator may dispatch.
    pub fn is_dispatchable(&self, id: &str) -> bool {
        self.get(id).is_some_and(|role| !role.is_synthesizer())
    }

    /// `(id, display name)` pairs in registration order.
    pub fn list(&self) -> Vec<(String, String)> {
        self.roles
            .iter()
            .map(|r| (r.id().to_string(), r.display_name().to_string()))
            .collect()
    }

    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.roles.iter()
    }

    /// The synthesis capability registered under the connector id.
    pub fn synthesizer(&self) -> Option<&dyn Synthesizer> {
        self.get(CONNECTOR_ROLE_ID)
            .and_then(|role| role.capability().as_synthesizer())
    }

    /// `(id, snippet)` for every dispatchable role that has one.
    pub fn detection_snippets(&self) -> Vec<(&str, &str)> {
        self.roles
            .iter()
            .filter(|r| !r.is_synthesizer())
            .filter_map(|r| r.detection().map(|d| (r.id(), d)))
            .collect()
    }

    pub fn configuration_error(&self) -> Option<&str> {
        self.configuration_error.as_deref()
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}
