//! Model display-name resolution.

use std::collections::HashMap;

use crate::task::GenerationParams;

/// Resolves the human-readable label shown for a submission's model.
pub trait DisplayNameResolver: Send + Sync {
    fn display_name(&self, params: &GenerationParams) -> String;
}

/// Static model-id to label table. Unknown models are labelled with their id.
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    names: HashMap<String, String>,
}

impl ModelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a label for a model id.
    pub fn with_model(mut self, model: impl Into<String>, label: impl Into<String>) -> Self {
        self.names.insert(model.into(), label.into());
        self
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl FromIterator<(String, String)> for ModelCatalog {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().collect(),
        }
    }
}

impl DisplayNameResolver for ModelCatalog {
    fn display_name(&self, params: &GenerationParams) -> String {
        self.names
            .get(&params.model)
            .cloned()
            .unwrap_or_else(|| params.model.clone())
    }
}
