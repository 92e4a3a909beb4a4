//! REST resources and content negotiation
//!
//! - [`Provider`] / [`ProviderRegistry`]: serializers and their selection
//! - [`Resource`] and the verb traits: domain objects served over HTTP
//! - [`ResourceAdapter`]: turns a resource's verbs into routes

mod adapter;
mod json;
mod negotiate;
mod provider;
mod resource;
mod xml;

pub use adapter::ResourceAdapter;
pub use json::JsonProvider;
pub use negotiate::{
    essence, AcceptHeader, MediaRange, NegotiationError, JSON_CONTENT_TYPE, XML_CONTENT_TYPE,
};
pub use provider::{DecodeVisitor, Provider, ProviderError, ProviderRegistry, Selected};
pub use resource::{
    discover_verbs, Delete, Entity, Get, Patch, Post, Put, RequestContext, Resource, VerbHandler,
};
pub use xml::{XmlProvider, XML_ROOT};
