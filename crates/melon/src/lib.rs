//! # Melon
//!
//! An application server framework. One process serves two surfaces:
//!
//! - the **application**: plain routes and REST resources, dispatched through
//!   a path-pattern router and a filter chain whose outermost link isolates
//!   panics, with responses encoded by content negotiation (JSON and XML
//!   built in)
//! - the **admin** surface: an operational menu with ping, runtime details,
//!   health checks and tasks
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use melon::prelude::*;
//!
//! #[derive(Serialize)]
//! struct User {
//!     name: String,
//! }
//!
//! struct UserResource;
//!
//! #[async_trait]
//! impl Get for UserResource {
//!     async fn get(&self, ctx: RequestContext) -> std::result::Result<Entity, BoxError> {
//!         let name = ctx.param("name").unwrap_or_default().to_string();
//!         Ok(Entity::new(User { name }))
//!     }
//! }
//!
//! impl Resource for UserResource {
//!     fn path(&self) -> &str {
//!         "/users/:name"
//!     }
//!
//!     fn as_get(self: Arc<Self>) -> Option<VerbHandler> {
//!         Some(VerbHandler::get(self))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), StartupError> {
//!     Melon::new().resource(UserResource).run().await
//! }
//! ```
//!
//! ## Configuration
//!
//! [`Melon::from_env`] reads `MELON_*` variables (and `.env`), see
//! [`config`] for the list.

// Re-export core functionality
pub use melon_core::*;

// Re-export for the resource traits
pub use async_trait::async_trait;

// Re-exports so applications can match the framework's versions
pub use serde_json;
pub use tokio;
pub use tracing;

/// Prelude module - import everything you need with `use melon::prelude::*`
pub mod prelude {
    pub use melon_core::{
        // Admin
        AdminHandler,
        // Error handling
        ApiError,
        BoxError,
        // Resources
        Delete,
        Entity,
        // Filters
        filter_fn,
        Filter,
        Get,
        HealthStatus,
        Html,
        // Response types
        IntoResponse,
        // App builder
        Melon,
        Next,
        Patch,
        Post,
        Put,
        // Request context
        Request,
        RequestContext,
        Resource,
        Response,
        Result,
        // Router
        Router,
        ServerConfig,
        StartupError,
        Task,
        VerbHandler,
    };

    pub use async_trait::async_trait;
    pub use serde::{Deserialize, Serialize};
    pub use std::sync::Arc;
    pub use tracing::{debug, error, info, trace, warn};
}

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn prelude_imports_work() {
        let _: fn() -> Result<()> = || Ok(());
        let _ = Melon::new();
    }
}
