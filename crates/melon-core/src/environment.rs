//! Application-side registration: routes, resources, providers and filters
//!
//! Everything is collected during the single-threaded start-up phase and
//! turned into an immutable [`Router`] by [`ServerEnvironment::start`].

use crate::error::{RouteError, StartupError};
use crate::filter::{Filter, FilterStack};
use crate::handler::{into_boxed_handler, BoxedHandler, Handler};
use crate::rest::{Provider, ProviderRegistry, Resource, ResourceAdapter};
use crate::router::{join_path, Pattern, Router};
use std::fmt;
use std::fmt::Write as _;
use std::sync::Arc;

/// One line of the start-up endpoint table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub method: String,
    /// Full path, router prefix included
    pub path: String,
    /// The component that registered the route
    pub component: String,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<7} {} ({})", self.method, self.path, self.component)
    }
}

struct PlainRoute {
    method: String,
    pattern: String,
    handler: BoxedHandler,
    component: &'static str,
}

/// Collects the application surface until [`start`](Self::start)
#[derive(Default)]
pub struct ServerEnvironment {
    routes: Vec<PlainRoute>,
    resources: Vec<Arc<dyn Resource>>,
    providers: Vec<Arc<dyn Provider>>,
    filters: FilterStack,
}

impl ServerEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plain handler
    pub fn handle<H, T>(&mut self, method: &str, pattern: &str, handler: H)
    where
        H: Handler<T>,
        T: 'static,
    {
        self.routes.push(PlainRoute {
            method: method.to_string(),
            pattern: pattern.to_string(),
            handler: into_boxed_handler(handler),
            component: std::any::type_name::<H>(),
        });
    }

    /// Register a resource to be adapted at start
    pub fn register<R: Resource>(&mut self, resource: R) {
        self.resources.push(Arc::new(resource));
    }

    pub fn register_arc(&mut self, resource: Arc<dyn Resource>) {
        self.resources.push(resource);
    }

    /// Add a provider after the built-in JSON and XML providers
    pub fn add_provider(&mut self, provider: Arc<dyn Provider>) {
        self.providers.push(provider);
    }

    /// Add a filter; filters run in the order added, after the recovery filter
    pub fn add_filter(&mut self, filter: Arc<dyn Filter>) {
        self.filters.push(filter);
    }

    /// Build the application router mounted at `prefix`
    ///
    /// Every registration error is collected; any error prevents serving.
    pub fn start(self, prefix: &str) -> Result<Router, StartupError> {
        let mut router = Router::with_filters(prefix, self.filters);
        let mut registry = ProviderRegistry::with_defaults();
        registry.register_all(self.providers);
        let adapter = ResourceAdapter::new(Arc::new(registry));

        let mut endpoints = Vec::new();
        let mut errors: Vec<RouteError> = Vec::new();

        for route in self.routes {
            match register_route(&mut router, &route) {
                Ok(endpoint) => endpoints.push(endpoint),
                Err(err) => errors.push(err),
            }
        }
        for resource in &self.resources {
            match adapter.register(&mut router, resource.clone()) {
                Ok(registered) => endpoints.extend(registered),
                Err(err) => errors.push(err),
            }
        }

        if !errors.is_empty() {
            for err in &errors {
                tracing::error!(target: "melon::server", error = %err, "Route registration failed");
            }
            return Err(StartupError::Routes(errors));
        }

        log_resources(&self.resources);
        log_endpoints(&endpoints);
        Ok(router)
    }
}

impl fmt::Debug for ServerEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerEnvironment")
            .field("routes", &self.routes.len())
            .field("resources", &self.resources.len())
            .field("providers", &self.providers.len())
            .field("filters", &self.filters)
            .finish()
    }
}

fn register_route(router: &mut Router, route: &PlainRoute) -> Result<Endpoint, RouteError> {
    router.handle_boxed(&route.method, &route.pattern, route.handler.clone())?;
    let pattern = Pattern::parse(&route.pattern)?;
    Ok(Endpoint {
        method: route.method.clone(),
        path: join_path(router.path_prefix(), pattern.as_str()),
        component: route.component.to_string(),
    })
}

fn log_resources(resources: &[Arc<dyn Resource>]) {
    if !tracing::enabled!(target: "melon::server", tracing::Level::DEBUG) {
        return;
    }
    let names: Vec<&str> = resources.iter().map(|r| r.name()).collect();
    tracing::debug!(target: "melon::server", "resources = [{}]", names.join(","));
}

fn log_endpoints(endpoints: &[Endpoint]) {
    let mut table = String::new();
    for endpoint in endpoints {
        let _ = writeln!(table, "    {endpoint}");
    }
    tracing::info!(target: "melon::server", "endpoints =\n\n{table}");
}
