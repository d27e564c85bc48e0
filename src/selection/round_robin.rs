use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};

use crate::error::ProxyError;
use crate::health::HealthTracker;
use crate::registry::Endpoint;

/// An endpoint handed out by the pool, with the pool size at that moment
#[derive(Debug, Clone)]
pub struct PoolSelection {
    pub endpoint: Arc<Endpoint>,
    pub healthy: usize,
    pub total: usize,
}

#[derive(Debug)]
struct PoolState {
    healthy: Vec<Arc<Endpoint>>,
    cursor: usize,
}

/// # Round-Robin Pool
///
/// Cycles through the healthy members of a homogeneous pool (transcription
/// servers). Health comes from a [`HealthTracker`]; the cursor and the
/// healthy list sit behind one mutex so read-and-advance is a single step.
pub struct RoundRobinPool {
    name: String,
    endpoints: Vec<Arc<Endpoint>>,
    tracker: HealthTracker,
    state: Mutex<PoolState>,
    refresh_gate: tokio::sync::Mutex<()>,
}

impl RoundRobinPool {
    /// Every configured endpoint starts out in the healthy list.
    pub fn new(name: impl Into<String>, endpoints: Vec<Endpoint>, tracker: HealthTracker) -> Self {
        let endpoints: Vec<Arc<Endpoint>> = endpoints.into_iter().map(Arc::new).collect();
        Self {
            name: name.into(),
            state: Mutex::new(PoolState {
                healthy: endpoints.clone(),
                cursor: 0,
            }),
            endpoints,
            tracker,
            refresh_gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn endpoints(&self) -> &[Arc<Endpoint>] {
        &self.endpoints
    }

    pub fn tracker(&self) -> &HealthTracker {
        &self.tracker
    }

    pub fn total(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_configured(&self) -> bool {
        !self.endpoints.is_empty()
    }

    pub fn healthy_count(&self) -> usize {
        self.lock().healthy.len()
    }

    /// Hand out the endpoint at the cursor and advance it.
    pub fn next(&self) -> Result<Arc<Endpoint>, ProxyError> {
        let mut state = self.lock();

        if state.healthy.is_empty() {
            state.healthy = self.endpoints.clone();
            state.cursor = 0;
        }
        if state.healthy.is_empty() {
            return Err(ProxyError::NoEndpointsConfigured(self.name.clone()));
        }

        let endpoint = state.healthy[state.cursor].clone();
        state.cursor = (state.cursor + 1) % state.healthy.len();
        Ok(endpoint)
    }

    /// Re-probe stale members and replace the healthy list. Concurrent
    /// callers queue behind one probe pass; later ones find fresh records.
    pub async fn refresh(&self) -> usize {
        let _gate = self.refresh_gate.lock().await;
        let healthy = self
            .tracker
            .refresh_healthy_list(&self.endpoints, self.tracker.ttl())
            .await;
        self.replace_healthy(healthy)
    }

    /// Refresh, then pick.
    pub async fn next_healthy(&self) -> Result<PoolSelection, ProxyError> {
        if !self.is_configured() {
            return Err(ProxyError::NoEndpointsConfigured(self.name.clone()));
        }

        let healthy = self.refresh().await;
        let endpoint = self.next()?;
        debug!(pool = %self.name, endpoint = %endpoint.url, healthy, "Round-robin selection");

        Ok(PoolSelection {
            endpoint,
            healthy,
            total: self.total(),
        })
    }

    fn replace_healthy(&self, healthy: Vec<Arc<Endpoint>>) -> usize {
        let mut state = self.lock();
        if healthy.len() != state.healthy.len() {
            info!(
                pool = %self.name,
                healthy = healthy.len(),
                total = self.endpoints.len(),
                "Healthy pool membership changed"
            );
        }
        state.healthy = healthy;
        if state.cursor >= state.healthy.len() {
            state.cursor = 0;
        }
        state.healthy.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::HealthProbe;
    use reqwest::Client;
    use std::collections::HashSet;
    use std::time::Duration;

    fn pool(urls: &[&str]) -> RoundRobinPool {
        let tracker = HealthTracker::new(
            Client::new(),
            HealthProbe::transcription(),
            Duration::from_millis(200),
            Duration::from_secs(30),
        );
        RoundRobinPool::new(
            "transcription",
            urls.iter().map(|u| Endpoint::new(*u, "")).collect(),
            tracker,
        )
    }

    #[test]
    fn test_round_robin_completeness_and_wrap() {
        let pool = pool(&["http://a", "http://b", "http://c"]);

        let picked: Vec<_> = (0..4).map(|_| pool.next().unwrap().url.clone()).collect();
        assert_eq!(picked, vec!["http://a", "http://b", "http://c", "http://a"]);
    }

    #[test]
    fn test_empty_healthy_list_repopulates_from_config() {
        let pool = pool(&["http://a", "http://b"]);
        pool.next().unwrap();
        pool.replace_healthy(Vec::new());

        assert_eq!(pool.next().unwrap().url, "http://a");
        assert_eq!(pool.healthy_count(), 2);
    }

    #[test]
    fn test_cursor_reset_when_list_shrinks() {
        let pool = pool(&["http://a", "http://b", "http://c"]);
        pool.next().unwrap();
        pool.next().unwrap();

        let only_a = vec![pool.endpoints()[0].clone()];
        pool.replace_healthy(only_a);
        assert_eq!(pool.next().unwrap().url, "http://a");
        assert_eq!(pool.next().unwrap().url, "http://a");
    }

    #[test]
    fn test_empty_pool_errors() {
        let pool = pool(&[]);
        assert!(matches!(pool.next(), Err(ProxyError::NoEndpointsConfigured(_))));
    }

    #[tokio::test]
    async fn test_all_unhealthy_still_selects() {
        // nothing listens on port 1, so every probe fails
        let pool = pool(&["http://127.0.0.1:1", "http://127.0.0.2:1"]);

        let selection = pool.next_healthy().await.unwrap();
        assert_eq!(selection.total, 2);
        assert_eq!(selection.healthy, 2);
        assert_eq!(selection.endpoint.url, "http://127.0.0.1:1");
    }

    #[test]
    fn test_concurrent_next_hands_out_each_endpoint_evenly() {
        let pool = Arc::new(pool(&["http://a", "http://b", "http://c", "http://d"]));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pool = pool.clone();
                std::thread::spawn(move || {
                    (0..1_000).map(|_| pool.next().unwrap().url.clone()).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut counts = std::collections::HashMap::new();
        for handle in handles {
            for url in handle.join().unwrap() {
                *counts.entry(url).or_insert(0usize) += 1;
            }
        }

        let distinct: HashSet<_> = counts.keys().collect();
        assert_eq!(distinct.len(), 4);
        assert!(counts.values().all(|&n| n == 1_000));
    }
}
