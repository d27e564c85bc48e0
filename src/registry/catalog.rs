use std::collections::BTreeMap;
use std::sync::Arc;

use super::Endpoint;
use crate::schemas::ModelSummary;

/// # Model Catalog
///
/// Immutable snapshot of model id to the endpoints that serve it. Endpoint
/// order within a model follows configuration order. A catalog is only ever
/// published complete; refreshes build a new one.
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    models: BTreeMap<String, Vec<Arc<Endpoint>>>,
    generation: u64,
    discovered_at_ms: i64,
}

impl ModelCatalog {
    pub fn new(generation: u64, discovered_at_ms: i64) -> Self {
        Self {
            models: BTreeMap::new(),
            generation,
            discovered_at_ms,
        }
    }

    /// Record that `endpoint` serves `model_id`. A repeated listing from the
    /// same configured endpoint is ignored; distinct endpoints sharing a base
    /// URL are kept apart.
    pub fn insert(&mut self, model_id: impl Into<String>, endpoint: Arc<Endpoint>) {
        let serving = self.models.entry(model_id.into()).or_default();
        if !serving.iter().any(|existing| Arc::ptr_eq(existing, &endpoint)) {
            serving.push(endpoint);
        }
    }

    /// Endpoints for a model; empty when the model is unknown.
    pub fn endpoints_for(&self, model_id: &str) -> &[Arc<Endpoint>] {
        self.models.get(model_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, model_id: &str) -> bool {
        self.models.contains_key(model_id)
    }

    pub fn model_ids(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Bumped on every published discovery pass
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn discovered_at_ms(&self) -> i64 {
        self.discovered_at_ms
    }

    /// De-duplicated listing in the OpenAI `/v1/models` shape, sorted by id.
    pub fn summaries(&self) -> Vec<ModelSummary> {
        self.models
            .keys()
            .map(|id| ModelSummary::proxied(id.clone(), self.discovered_at_ms))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_preserves_declaration_order() {
        let a = Arc::new(Endpoint::new("http://a", ""));
        let b = Arc::new(Endpoint::new("http://b", ""));
        let mut catalog = ModelCatalog::new(1, 0);

        catalog.insert("llama", a.clone());
        catalog.insert("llama", b.clone());
        catalog.insert("llama", a.clone());

        let urls: Vec<_> = catalog.endpoints_for("llama").iter().map(|e| e.url.as_str()).collect();
        assert_eq!(urls, vec!["http://a", "http://b"]);
    }

    #[test]
    fn test_same_url_endpoints_are_both_kept() {
        let a = Arc::new(Endpoint::new("http://gpu:8000", "key-a").with_weight(1));
        let b = Arc::new(Endpoint::new("http://gpu:8000", "key-b").with_weight(3));
        let mut catalog = ModelCatalog::new(1, 0);

        catalog.insert("llama", a.clone());
        catalog.insert("llama", b);
        catalog.insert("llama", a);

        let keys: Vec<_> = catalog.endpoints_for("llama").iter().map(|e| e.api_key.as_str()).collect();
        assert_eq!(keys, vec!["key-a", "key-b"]);
        let weights: Vec<_> = catalog.endpoints_for("llama").iter().map(|e| e.effective_weight()).collect();
        assert_eq!(weights, vec![1, 3]);
    }

    #[test]
    fn test_unknown_model_is_empty() {
        let catalog = ModelCatalog::new(1, 0);
        assert!(catalog.endpoints_for("nonexistent-model").is_empty());
        assert!(!catalog.contains("nonexistent-model"));
    }

    #[test]
    fn test_summaries_are_deduplicated() {
        let a = Arc::new(Endpoint::new("http://a", ""));
        let b = Arc::new(Endpoint::new("http://b", ""));
        let mut catalog = ModelCatalog::new(3, 1_700_000_000_000);
        catalog.insert("qwen", a.clone());
        catalog.insert("llama", a);
        catalog.insert("llama", b);

        let summaries = catalog.summaries();
        let ids: Vec<_> = summaries.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["llama", "qwen"]);
        assert!(summaries.iter().all(|m| m.owned_by == "proxy" && m.object == "model"));
        assert!(summaries.iter().all(|m| m.created == 1_700_000_000_000));
    }
}
