//! Melon application builder

use crate::admin::{AdminEnvironment, AdminHandler, Task};
use crate::config::{ConfigError, ServerConfig, ServerType};
use crate::environment::ServerEnvironment;
use crate::error::StartupError;
use crate::filter::Filter;
use crate::handler::Handler;
use crate::health::HealthStatus;
use crate::rest::{Provider, Resource};
use crate::router::join_path;
use crate::server::Server;
use std::future::Future;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Main application builder
///
/// Registration happens here, on one thread, before anything is served.
/// [`build`](Self::build) turns it into an immutable [`Server`] or reports
/// every registration error at once.
///
/// # Example
///
/// ```rust,ignore
/// use melon::prelude::*;
///
/// #[tokio::main]
/// async fn main() -> Result<(), StartupError> {
///     Melon::from_env()?
///         .resource(UserResource::default())
///         .route("GET", "/status", || async { "ok" })
///         .health_check("database", || async { HealthStatus::healthy() })
///         .run()
///         .await
/// }
/// ```
pub struct Melon {
    config: ServerConfig,
    server: ServerEnvironment,
    admin: AdminEnvironment,
}

impl Default for Melon {
    fn default() -> Self {
        Self::new()
    }
}

impl Melon {
    /// Create an application with the default configuration
    pub fn new() -> Self {
        // Initialize tracing if not already done
        let _ = tracing_subscriber::registry()
            .with(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,melon=debug")),
            )
            .with(tracing_subscriber::fmt::layer())
            .try_init();

        Self {
            config: ServerConfig::default(),
            server: ServerEnvironment::new(),
            admin: AdminEnvironment::new(),
        }
    }

    /// Create an application configured from `MELON_*` variables and `.env`
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = ServerConfig::from_env()?;
        Ok(Self::new().config(config))
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Add an application filter; filters run in the order added
    pub fn filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.server.add_filter(filter);
        self
    }

    /// Add a plain route; `method` may be `*`
    pub fn route<H, T>(mut self, method: &str, pattern: &str, handler: H) -> Self
    where
        H: Handler<T>,
        T: 'static,
    {
        self.server.handle(method, pattern, handler);
        self
    }

    /// Register a resource under the root path
    pub fn resource<R: Resource>(mut self, resource: R) -> Self {
        self.server.register(resource);
        self
    }

    /// Add a provider after the built-in JSON and XML providers
    pub fn provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.server.add_provider(provider);
        self
    }

    pub fn health_check<F, Fut>(mut self, name: impl Into<String>, check: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HealthStatus> + Send + 'static,
    {
        self.admin.register_health_check(name, check);
        self
    }

    pub fn task(mut self, task: Task) -> Self {
        self.admin.add_task(task);
        self
    }

    pub fn admin_handler(mut self, handler: AdminHandler) -> Self {
        self.admin.add_handler(handler);
        self
    }

    /// Validate the configuration and build both routers
    pub fn build(self) -> Result<Server, StartupError> {
        let config = self.config.validate()?;
        let (app_prefix, admin_prefix) = mount_points(&config);

        let application = self.server.start(&app_prefix)?;
        let admin = self.admin.start(&admin_prefix)?;

        tracing::info!(
            target: "melon::server",
            server_type = ?config.server_type,
            application = application.path_prefix(),
            admin = admin.path_prefix(),
            "Starting"
        );
        Ok(Server::new(config, application, admin))
    }

    /// Build and serve until Ctrl-C
    pub async fn run(self) -> Result<(), StartupError> {
        let server = self.build()?;
        server.run().await
    }
}

impl std::fmt::Debug for Melon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Melon")
            .field("config", &self.config)
            .field("server", &self.server)
            .field("admin", &self.admin)
            .finish()
    }
}

/// Application and admin prefixes for the configured connector layout
fn mount_points(config: &ServerConfig) -> (String, String) {
    match config.server_type {
        ServerType::Default => (config.root_path.clone(), "/".to_string()),
        ServerType::Simple => (
            join_path(&config.application_context_path, &config.root_path),
            config.admin_context_path.clone(),
        ),
    }
}
