//! Reference data consulted by movements: which components and locations exist.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use quartermaster_core::{ComponentId, LocationId};

use crate::error::{ServiceError, ServiceResult};

/// A named catalog row, as loaded from seed data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem<Id> {
    pub id: Id,
    pub name: String,
}

pub trait Catalog: Send + Sync {
    fn has_component(&self, id: ComponentId) -> bool;

    fn has_location(&self, id: LocationId) -> bool;
}

impl<C> Catalog for Arc<C>
where
    C: Catalog + ?Sized,
{
    fn has_component(&self, id: ComponentId) -> bool {
        (**self).has_component(id)
    }

    fn has_location(&self, id: LocationId) -> bool {
        (**self).has_location(id)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    components: RwLock<HashMap<ComponentId, String>>,
    locations: RwLock<HashMap<LocationId, String>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_component(&self, id: ComponentId, name: impl Into<String>) -> ServiceResult<()> {
        self.components
            .write()
            .map_err(|_| ServiceError::poisoned("catalog"))?
            .insert(id, name.into());
        Ok(())
    }

    pub fn add_location(&self, id: LocationId, name: impl Into<String>) -> ServiceResult<()> {
        self.locations
            .write()
            .map_err(|_| ServiceError::poisoned("catalog"))?
            .insert(id, name.into());
        Ok(())
    }

    pub fn component_name(&self, id: ComponentId) -> Option<String> {
        self.components.read().ok()?.get(&id).cloned()
    }

    pub fn location_name(&self, id: LocationId) -> Option<String> {
        self.locations.read().ok()?.get(&id).cloned()
    }
}

impl Catalog for InMemoryCatalog {
    fn has_component(&self, id: ComponentId) -> bool {
        self.components
            .read()
            .map(|c| c.contains_key(&id))
            .unwrap_or(false)
    }

    fn has_location(&self, id: LocationId) -> bool {
        self.locations
            .read()
            .map(|l| l.contains_key(&id))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_reflect_registered_rows() {
        let catalog = InMemoryCatalog::new();
        let quantum_drive = ComponentId::new();
        let hangar = LocationId::new();
        catalog.add_component(quantum_drive, "Quantum drive").unwrap();
        catalog.add_location(hangar, "Hangar 3").unwrap();

        assert!(catalog.has_component(quantum_drive));
        assert!(!catalog.has_component(ComponentId::new()));
        assert!(catalog.has_location(hangar));
        assert_eq!(catalog.location_name(hangar).as_deref(), Some("Hangar 3"));
    }
}
