//! The admin surface: an operational menu with ping, runtime, health checks and tasks
//!
//! Everything here is an ordinary route registered through [`Router::handle`];
//! the dispatch core has no knowledge of it.
//!
//! | Method | Path            | Description                          |
//! |--------|-----------------|--------------------------------------|
//! | GET    | `/`             | HTML index linking every admin handler |
//! | *      | `/ping`         | `pong`                               |
//! | *      | `/runtime`      | platform and process details         |
//! | *      | `/healthcheck`  | runs the registered health checks    |
//! | POST   | `/tasks/{name}` | runs a registered task               |

mod handlers;

pub use handlers::{HEALTHCHECK_PATH, NO_HEALTH_CHECKS, PING_PATH, RUNTIME_PATH};

use crate::error::{RouteError, StartupError};
use crate::filter::{filter_fn, Filter, FilterStack, Next};
use crate::handler::{into_boxed_handler, BoxedHandler, Handler};
use crate::health::{HealthRegistry, HealthStatus};
use crate::request::Request;
use crate::response::Html;
use crate::router::{join_path, Router, ANY_METHOD};
use http::{header, HeaderValue};
use std::fmt::Write as _;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

/// `Cache-Control` set on every admin response
pub const ADMIN_CACHE_CONTROL: &str = "must-revalidate,no-cache,no-store";

/// Prefix of task routes
pub const TASKS_PATH: &str = "/tasks";

const NO_HEALTH_CHECKS_BANNER: &str = "\n\
!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!\n\
!    THIS APPLICATION HAS NO HEALTHCHECKS.    !\n\
!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!\n";

/// An entry of the operational menu
#[derive(Clone)]
pub struct AdminHandler {
    path: String,
    name: String,
    handler: BoxedHandler,
}

impl AdminHandler {
    pub fn new<H, T>(path: impl Into<String>, name: impl Into<String>, handler: H) -> Self
    where
        H: Handler<T>,
        T: 'static,
    {
        Self {
            path: path.into(),
            name: name.into(),
            handler: into_boxed_handler(handler),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for AdminHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminHandler")
            .field("path", &self.path)
            .field("name", &self.name)
            .finish()
    }
}

/// A named operation triggered by `POST /tasks/{name}`
#[derive(Clone)]
pub struct Task {
    name: String,
    handler: BoxedHandler,
}

impl Task {
    pub fn new<H, T>(name: impl Into<String>, handler: H) -> Self
    where
        H: Handler<T>,
        T: 'static,
    {
        Self {
            name: name.into(),
            handler: into_boxed_handler(handler),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").field("name", &self.name).finish()
    }
}

/// Collects admin handlers, tasks and health checks until [`start`](Self::start)
#[derive(Debug)]
pub struct AdminEnvironment {
    handlers: Vec<AdminHandler>,
    tasks: Vec<Task>,
    health: HealthRegistry,
    filters: FilterStack,
    started: Instant,
}

impl Default for AdminEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

impl AdminEnvironment {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
            tasks: Vec::new(),
            health: HealthRegistry::new(),
            filters: FilterStack::new(),
            started: Instant::now(),
        }
    }

    /// Add an entry to the operational menu
    pub fn add_handler(&mut self, handler: AdminHandler) {
        self.handlers.push(handler);
    }

    pub fn add_task(&mut self, task: Task) {
        self.tasks.push(task);
    }

    pub fn register_health_check<F, Fut>(&mut self, name: impl Into<String>, check: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HealthStatus> + Send + 'static,
    {
        self.health.register(name, check);
    }

    pub fn health_checks(&self) -> &HealthRegistry {
        &self.health
    }

    /// Filter applied to admin routes after the recovery and cache-control filters
    pub fn add_filter(&mut self, filter: Arc<dyn Filter>) {
        self.filters.push(filter);
    }

    /// Build the admin router mounted at `prefix`
    pub fn start(self, prefix: &str) -> Result<Router, StartupError> {
        let mut filters = self.filters;
        filters.prepend(filter_fn("cache-control", |req: Request, next: Next| async move {
            let mut response = next.run(req).await;
            response.headers_mut().insert(
                header::CACHE_CONTROL,
                HeaderValue::from_static(ADMIN_CACHE_CONTROL),
            );
            response
        }));

        let mut router = Router::with_filters(prefix, filters);
        let health = Arc::new(self.health);

        let mut menu = vec![
            handlers::ping(),
            handlers::runtime(self.started),
            handlers::healthcheck(health.clone()),
        ];
        menu.extend(self.handlers);

        let mut errors: Vec<RouteError> = Vec::new();

        let links: Vec<(String, String)> = menu
            .iter()
            .map(|h| (h.path.clone(), h.name.clone()))
            .collect();
        let Html(index) = handlers::index_page(router.path_prefix(), &links);
        if let Err(err) = router.handle("GET", "/", move || {
            let page = index.clone();
            async move { Html(page) }
        }) {
            errors.push(err);
        }

        for handler in &menu {
            if let Err(err) = router.handle_boxed(ANY_METHOD, &handler.path, handler.handler.clone()) {
                errors.push(err);
            }
        }
        for task in &self.tasks {
            let path = format!("{TASKS_PATH}/{}", task.name);
            if let Err(err) = router.handle_boxed("POST", &path, task.handler.clone()) {
                errors.push(err);
            }
        }

        if !errors.is_empty() {
            return Err(StartupError::Routes(errors));
        }

        log_tasks(router.path_prefix(), &self.tasks);
        log_health_checks(&health);
        Ok(router)
    }
}

fn log_tasks(prefix: &str, tasks: &[Task]) {
    let mut table = String::new();
    for task in tasks {
        let path = join_path(prefix, &format!("{TASKS_PATH}/{}", task.name));
        let _ = writeln!(table, "    {:<7} {}", "POST", path);
    }
    tracing::info!(target: "melon::admin", "tasks =\n\n{table}");
}

fn log_health_checks(health: &HealthRegistry) {
    let names = health.names();
    tracing::debug!(target: "melon::admin", checks = ?names, "health checks");
    if names.is_empty() {
        tracing::warn!(target: "melon::admin", "{NO_HEALTH_CHECKS_BANNER}");
    }
}
