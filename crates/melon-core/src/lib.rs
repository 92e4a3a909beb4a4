//! # Melon Core
//!
//! Core engine of the Melon application server: router, filter chain,
//! content negotiation, resource adaptation, the admin surface and the
//! hyper-based server.
//!
//! This crate is not meant to be used directly. Use `melon` instead.

pub mod admin;
mod app;
pub mod config;
mod environment;
mod error;
pub mod filter;
mod handler;
pub mod health;
mod path_params;
mod request;
mod response;
pub mod rest;
mod router;
mod server;
#[cfg(any(test, feature = "test-utils"))]
mod test_client;

// Public API
pub use admin::{AdminEnvironment, AdminHandler, Task};
pub use app::Melon;
pub use config::{ConfigError, ServerConfig, ServerType};
pub use environment::{Endpoint, ServerEnvironment};
pub use error::{ApiError, BoxError, Result, RouteError, StartupError};
pub use filter::{filter_fn, Chain, Filter, FilterStack, Next, RecoveryFilter};
pub use handler::{into_boxed_handler, BoxedHandler, Handler};
pub use health::{HealthRegistry, HealthStatus};
pub use path_params::PathParams;
pub use request::Request;
pub use response::{Html, IntoResponse, Response};
pub use rest::{
    Delete, Entity, Get, JsonProvider, Patch, Post, Provider, ProviderRegistry, Put,
    RequestContext, Resource, ResourceAdapter, VerbHandler, XmlProvider,
};
pub use router::{join_path, normalize_prefix, Pattern, RouteInfo, RouteMatch, Router, ANY_METHOD};
pub use server::{BoundServer, Connector, Server};
#[cfg(any(test, feature = "test-utils"))]
pub use test_client::{TestClient, TestRequest, TestResponse};
