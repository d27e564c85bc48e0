use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::error::ProxyError;
use crate::registry::{Endpoint, ModelCatalog};

/// # Weight Table
///
/// Cumulative weights over a model's endpoints in declaration order.
/// `table[i]` is non-decreasing and the last entry is the total weight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightTable {
    cumulative: Vec<u64>,
}

impl WeightTable {
    pub fn from_weights(weights: impl IntoIterator<Item = u64>) -> Self {
        let mut sum = 0u64;
        let cumulative = weights
            .into_iter()
            .map(|weight| {
                sum += weight;
                sum
            })
            .collect();
        Self { cumulative }
    }

    pub fn from_endpoints(endpoints: &[Arc<Endpoint>]) -> Self {
        Self::from_weights(endpoints.iter().map(|e| e.effective_weight()))
    }

    pub fn total(&self) -> u64 {
        self.cumulative.last().copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.cumulative.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cumulative.is_empty()
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.cumulative
    }

    /// First index whose cumulative weight is `>= draw`. Boundary values go
    /// to the earlier endpoint.
    pub fn index_for(&self, draw: f64) -> Option<usize> {
        self.cumulative.iter().position(|&cum| draw <= cum as f64)
    }
}

#[derive(Debug, Clone)]
struct CachedTable {
    generation: u64,
    table: Arc<WeightTable>,
}

/// # Weighted Random Selector
///
/// Picks an endpoint for a model with probability proportional to its
/// weight. Tables are built on first use per model and reused until the
/// catalog generation changes.
#[derive(Debug, Default)]
pub struct WeightedSelector {
    tables: DashMap<String, CachedTable>,
}

impl WeightedSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(
        &self,
        model_id: &str,
        catalog: &ModelCatalog,
    ) -> Result<Arc<Endpoint>, ProxyError> {
        self.select_with(model_id, catalog, |total| fastrand::f64() * total as f64)
    }

    /// Selection with a caller-supplied draw in `[0, total)`.
    pub fn select_with<F>(
        &self,
        model_id: &str,
        catalog: &ModelCatalog,
        draw: F,
    ) -> Result<Arc<Endpoint>, ProxyError>
    where
        F: FnOnce(u64) -> f64,
    {
        let endpoints = catalog.endpoints_for(model_id);
        if endpoints.is_empty() {
            return Err(ProxyError::UnsupportedModel(model_id.to_string()));
        }

        let table = self.table_for(model_id, catalog);
        let total = table.total();
        let value = draw(total);
        let index = table.index_for(value).unwrap_or(endpoints.len() - 1);

        debug!(
            model = model_id,
            index,
            draw = value,
            total_weight = total,
            endpoint = %endpoints[index].url,
            "Selected endpoint"
        );
        Ok(endpoints[index].clone())
    }

    /// Cached table for the model, rebuilt when the catalog moved on.
    pub fn table_for(&self, model_id: &str, catalog: &ModelCatalog) -> Arc<WeightTable> {
        let generation = catalog.generation();

        if let Some(cached) = self.tables.get(model_id) {
            if cached.generation == generation {
                return cached.table.clone();
            }
            if cached.generation > generation {
                // caller holds an older snapshot than the cache; don't regress it
                return Arc::new(WeightTable::from_endpoints(catalog.endpoints_for(model_id)));
            }
        }

        let build = || CachedTable {
            generation,
            table: Arc::new(WeightTable::from_endpoints(catalog.endpoints_for(model_id))),
        };

        let mut entry = self.tables.entry(model_id.to_string()).or_insert_with(build);
        if entry.generation < generation {
            *entry = build();
        }
        entry.table.clone()
    }

    /// Number of models with a cached table
    pub fn cached_models(&self) -> usize {
        self.tables.len()
    }
}
