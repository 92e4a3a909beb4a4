//! Named health checks run by the admin `/healthcheck` endpoint
//!
//! ```rust,ignore
//! use melon_core::health::{HealthRegistry, HealthStatus};
//!
//! let mut health = HealthRegistry::new();
//! health.register("database", || async { HealthStatus::healthy() });
//! ```

use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Health status of a component
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Component is healthy
    Healthy,
    /// Component is unhealthy
    Unhealthy { reason: String },
    /// Component is degraded but functional
    Degraded { reason: String },
}

impl HealthStatus {
    pub fn healthy() -> Self {
        Self::Healthy
    }

    pub fn unhealthy(reason: impl Into<String>) -> Self {
        Self::Unhealthy {
            reason: reason.into(),
        }
    }

    pub fn degraded(reason: impl Into<String>) -> Self {
        Self::Degraded {
            reason: reason.into(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy { .. })
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    /// The reason attached to a non-healthy status
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Healthy => None,
            Self::Unhealthy { reason } | Self::Degraded { reason } => Some(reason),
        }
    }
}

/// One entry of the `/healthcheck` report
///
/// A degraded check still reports `healthy: true`, with its reason as the message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<&HealthStatus> for CheckReport {
    fn from(status: &HealthStatus) -> Self {
        Self {
            healthy: !status.is_unhealthy(),
            message: status.reason().map(str::to_owned),
        }
    }
}

/// Results of one run over every registered check, keyed by check name
#[derive(Debug, Clone, Default)]
pub struct HealthReport {
    results: BTreeMap<String, HealthStatus>,
}

impl HealthReport {
    /// True when no check is unhealthy
    pub fn is_healthy(&self) -> bool {
        !self.results.values().any(HealthStatus::is_unhealthy)
    }

    pub fn get(&self, name: &str) -> Option<&HealthStatus> {
        self.results.get(name)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// The serializable `{name: {healthy, message}}` form
    pub fn to_map(&self) -> BTreeMap<&str, CheckReport> {
        self.results
            .iter()
            .map(|(name, status)| (name.as_str(), CheckReport::from(status)))
            .collect()
    }
}

/// Type alias for async health check functions
pub type HealthCheckFn =
    Arc<dyn Fn() -> Pin<Box<dyn Future<Output = HealthStatus> + Send>> + Send + Sync>;

/// Ordered set of named health checks
#[derive(Clone, Default)]
pub struct HealthRegistry {
    checks: Vec<(String, HealthCheckFn)>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a check; a later check with the same name replaces the earlier one
    pub fn register<F, Fut>(&mut self, name: impl Into<String>, check: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HealthStatus> + Send + 'static,
    {
        let name = name.into();
        let check_fn: HealthCheckFn = Arc::new(move || {
            Box::pin(check()) as Pin<Box<dyn Future<Output = HealthStatus> + Send>>
        });

        match self.checks.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = check_fn,
            None => self.checks.push((name, check_fn)),
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.checks.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    /// Run every check in registration order
    pub async fn run_checks(&self) -> HealthReport {
        let mut results = BTreeMap::new();
        for (name, check) in &self.checks {
            let status = check().await;
            if let Some(reason) = status.reason() {
                tracing::debug!(target: "melon::admin", check = %name, reason, "health check not healthy");
            }
            results.insert(name.clone(), status);
        }
        HealthReport { results }
    }
}

impl std::fmt::Debug for HealthRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthRegistry")
            .field("checks", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn runs_all_checks() {
        let mut registry = HealthRegistry::new();
        registry.register("database", || async { HealthStatus::healthy() });
        registry.register("cache", || async { HealthStatus::degraded("slow") });

        let report = registry.run_checks().await;
        assert_eq!(report.len(), 2);
        assert!(report.is_healthy());
        assert_eq!(report.get("cache"), Some(&HealthStatus::degraded("slow")));
    }

    #[tokio::test]
    async fn one_unhealthy_check_fails_the_report() {
        let mut registry = HealthRegistry::new();
        registry.register("database", || async { HealthStatus::healthy() });
        registry.register("queue", || async { HealthStatus::unhealthy("down") });

        let report = registry.run_checks().await;
        assert!(!report.is_healthy());
    }

    #[tokio::test]
    async fn report_map_serializes_health_and_message() {
        let mut registry = HealthRegistry::new();
        registry.register("db", || async { HealthStatus::healthy() });
        registry.register("queue", || async { HealthStatus::unhealthy("down") });
        registry.register("cache", || async { HealthStatus::degraded("slow") });

        let report = registry.run_checks().await;
        let json = serde_json::to_value(report.to_map()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "cache": {"healthy": true, "message": "slow"},
                "db": {"healthy": true},
                "queue": {"healthy": false, "message": "down"},
            })
        );
    }

    #[test]
    fn re_registering_a_name_replaces_the_check() {
        let mut registry = HealthRegistry::new();
        registry.register("db", || async { HealthStatus::healthy() });
        registry.register("db", || async { HealthStatus::unhealthy("gone") });
        assert_eq!(registry.names(), vec!["db"]);
    }

    #[test]
    fn status_helpers() {
        assert!(HealthStatus::healthy().is_healthy());
        assert!(HealthStatus::unhealthy("x").is_unhealthy());
        assert!(HealthStatus::degraded("x").is_degraded());
        assert_eq!(HealthStatus::degraded("slow").reason(), Some("slow"));
        assert_eq!(HealthStatus::healthy().reason(), None);
    }
}
