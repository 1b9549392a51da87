//! ModelRegistry for mapping route segments to CatalogModel implementations.

use crate::domain::model::{CatalogModel, NurseryModel, PlantModel, ProductModel};
use std::collections::HashMap;
use std::sync::Arc;

/// A registry that maps collection names (`nurseries`, `plants`, ...) to their models.
pub struct ModelRegistry {
    models: HashMap<String, Arc<dyn CatalogModel>>,
}

impl ModelRegistry {
    /// Creates a new empty ModelRegistry.
    pub fn new() -> Self {
        Self {
            models: HashMap::new(),
        }
    }

    /// Registry with the three reviewable kinds under their collection names.
    pub fn with_catalog_models() -> Self {
        let mut reg = Self::new();
        reg.register(NurseryModel);
        reg.register(PlantModel);
        reg.register(ProductModel);
        reg
    }

    /// Registers a model under its collection name.
    pub fn register<M: CatalogModel + 'static>(&mut self, model: M) {
        self.models
            .insert(model.collection().to_string(), Arc::new(model));
    }

    /// Retrieves a model by collection name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<Arc<dyn CatalogModel>> {
        self.models.get(&name.trim().to_lowercase()).cloned()
    }

    /// Returns all registered collection names, sorted.
    pub fn list_models(&self) -> Vec<String> {
        let mut names: Vec<String> = self.models.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::with_catalog_models()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::EntityKind;

    #[test]
    fn resolves_collection_names() {
        let reg = ModelRegistry::with_catalog_models();
        assert_eq!(reg.list_models(), vec!["nurseries", "plants", "products"]);
        assert_eq!(reg.get("Plants").map(|m| m.kind()), Some(EntityKind::Plant));
        assert!(reg.get("users").is_none());
    }
}
