//! Domain objects exposed as HTTP resources
//!
//! A resource declares a path and implements one trait per HTTP verb it
//! supports ([`Get`], [`Post`], [`Put`], [`Patch`], [`Delete`]). Which verbs
//! exist is answered once, at registration, through the capability hooks on
//! [`Resource`]; each hook that returns a [`VerbHandler`] becomes a route.
//!
//! # Example
//!
//! ```rust,ignore
//! use melon_core::rest::{Entity, Get, RequestContext, Resource, VerbHandler};
//! use melon_core::BoxError;
//! use std::sync::Arc;
//!
//! struct Items;
//!
//! #[async_trait::async_trait]
//! impl Get for Items {
//!     async fn get(&self, ctx: RequestContext) -> Result<Entity, BoxError> {
//!         Ok(Entity::new(serde_json::json!({ "id": ctx.param("id") })))
//!     }
//! }
//!
//! impl Resource for Items {
//!     fn path(&self) -> &str {
//!         "/items/:id"
//!     }
//!
//!     fn as_get(self: Arc<Self>) -> Option<VerbHandler> {
//!         Some(VerbHandler::get(self))
//!     }
//! }
//! ```

use super::provider::{Provider, ProviderError};
use crate::error::BoxError;
use crate::path_params::PathParams;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::future::BoxFuture;
use http::{request::Parts, Extensions, HeaderMap, Method, Uri};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// A verb method's result, serialized later by the negotiated provider
pub struct Entity(Box<dyn erased_serde::Serialize + Send + Sync>);

impl Entity {
    pub fn new<T>(value: T) -> Self
    where
        T: Serialize + Send + Sync + 'static,
    {
        Self(Box::new(value))
    }

    pub fn as_serialize(&self) -> &dyn erased_serde::Serialize {
        &*self.0
    }
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Entity(..)")
    }
}

/// Per-request data handed to verb methods
///
/// Owns copies of the request head and the captured path parameters; it
/// lives only for the duration of one call.
#[derive(Debug)]
pub struct RequestContext {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    extensions: Extensions,
    params: PathParams,
}

impl RequestContext {
    pub(crate) fn new(parts: Parts, params: PathParams) -> Self {
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            extensions: parts.extensions,
            params,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    /// Query string, if any
    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    /// A captured path parameter
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }
}

/// Resource supporting `GET`
#[async_trait]
pub trait Get: Send + Sync + 'static {
    async fn get(&self, ctx: RequestContext) -> Result<Entity, BoxError>;
}

/// Resource supporting `DELETE`
#[async_trait]
pub trait Delete: Send + Sync + 'static {
    async fn delete(&self, ctx: RequestContext) -> Result<Entity, BoxError>;
}

/// Resource supporting `POST`
#[async_trait]
pub trait Post: Send + Sync + 'static {
    /// Type the request body is decoded into
    type Body: DeserializeOwned + Send + 'static;

    async fn post(&self, ctx: RequestContext, body: Self::Body) -> Result<Entity, BoxError>;
}

/// Resource supporting `PUT`
#[async_trait]
pub trait Put: Send + Sync + 'static {
    type Body: DeserializeOwned + Send + 'static;

    async fn put(&self, ctx: RequestContext, body: Self::Body) -> Result<Entity, BoxError>;
}

/// Resource supporting `PATCH`
#[async_trait]
pub trait Patch: Send + Sync + 'static {
    type Body: DeserializeOwned + Send + 'static;

    async fn patch(&self, ctx: RequestContext, body: Self::Body) -> Result<Entity, BoxError>;
}

/// Raw body plus the provider negotiated to read it
pub(crate) struct BodyInput {
    pub provider: Arc<dyn Provider>,
    pub bytes: Bytes,
}

/// Why a verb call produced no entity
#[derive(Debug)]
pub(crate) enum VerbFailure {
    /// The body could not be decoded; the method was not invoked
    Decode(ProviderError),
    /// The method returned an error
    Domain(BoxError),
}

type VerbFn = Arc<
    dyn Fn(RequestContext, Option<BodyInput>) -> BoxFuture<'static, Result<Entity, VerbFailure>>
        + Send
        + Sync,
>;

/// One verb method bound to one resource instance
#[derive(Clone)]
pub struct VerbHandler {
    method: Method,
    takes_body: bool,
    call: VerbFn,
}

impl VerbHandler {
    pub fn get<R: Get>(resource: Arc<R>) -> Self {
        Self::without_body(Method::GET, move |ctx| {
            let resource = resource.clone();
            Box::pin(async move { resource.get(ctx).await })
        })
    }

    pub fn delete<R: Delete>(resource: Arc<R>) -> Self {
        Self::without_body(Method::DELETE, move |ctx| {
            let resource = resource.clone();
            Box::pin(async move { resource.delete(ctx).await })
        })
    }

    pub fn post<R: Post>(resource: Arc<R>) -> Self {
        Self::with_body::<R::Body, _>(Method::POST, move |ctx, body| {
            let resource = resource.clone();
            Box::pin(async move { resource.post(ctx, body).await })
        })
    }

    pub fn put<R: Put>(resource: Arc<R>) -> Self {
        Self::with_body::<R::Body, _>(Method::PUT, move |ctx, body| {
            let resource = resource.clone();
            Box::pin(async move { resource.put(ctx, body).await })
        })
    }

    pub fn patch<R: Patch>(resource: Arc<R>) -> Self {
        Self::with_body::<R::Body, _>(Method::PATCH, move |ctx, body| {
            let resource = resource.clone();
            Box::pin(async move { resource.patch(ctx, body).await })
        })
    }

    fn without_body<F>(method: Method, f: F) -> Self
    where
        F: Fn(RequestContext) -> BoxFuture<'static, Result<Entity, BoxError>> + Send + Sync + 'static,
    {
        let call: VerbFn = Arc::new(
            move |ctx: RequestContext,
                  _body: Option<BodyInput>|
                  -> BoxFuture<'static, Result<Entity, VerbFailure>> {
                let fut = f(ctx);
                Box::pin(async move { fut.await.map_err(VerbFailure::Domain) })
            },
        );
        Self {
            method,
            takes_body: false,
            call,
        }
    }

    fn with_body<B, F>(method: Method, f: F) -> Self
    where
        B: DeserializeOwned + Send + 'static,
        F: Fn(RequestContext, B) -> BoxFuture<'static, Result<Entity, BoxError>>
            + Send
            + Sync
            + 'static,
    {
        let f = Arc::new(f);
        let call: VerbFn = Arc::new(
            move |ctx: RequestContext,
                  body: Option<BodyInput>|
                  -> BoxFuture<'static, Result<Entity, VerbFailure>> {
                let decoded = match body {
                    Some(input) => input.provider.decode_as::<B>(&input.bytes),
                    None => Err(ProviderError::Decode("request body is missing".to_string())),
                };
                let f = f.clone();
                Box::pin(async move {
                    let body = decoded.map_err(VerbFailure::Decode)?;
                    f(ctx, body).await.map_err(VerbFailure::Domain)
                })
            },
        );
        Self {
            method,
            takes_body: true,
            call,
        }
    }

    /// The HTTP method this handler serves
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Whether the verb decodes a request body
    pub fn takes_body(&self) -> bool {
        self.takes_body
    }

    pub(crate) fn invoke(
        &self,
        ctx: RequestContext,
        body: Option<BodyInput>,
    ) -> BoxFuture<'static, Result<Entity, VerbFailure>> {
        (self.call)(ctx, body)
    }
}

impl std::fmt::Debug for VerbHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerbHandler")
            .field("method", &self.method)
            .field("takes_body", &self.takes_body)
            .finish()
    }
}

/// A domain object served under a path pattern
///
/// Override the `as_*` hook of every verb the type implements. The hooks are
/// consulted once, when the resource is registered.
pub trait Resource: Send + Sync + 'static {
    /// Path pattern, relative to the application router's prefix
    fn path(&self) -> &str;

    /// Component name shown in the endpoint log
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn as_get(self: Arc<Self>) -> Option<VerbHandler> {
        None
    }

    fn as_post(self: Arc<Self>) -> Option<VerbHandler> {
        None
    }

    fn as_put(self: Arc<Self>) -> Option<VerbHandler> {
        None
    }

    fn as_patch(self: Arc<Self>) -> Option<VerbHandler> {
        None
    }

    fn as_delete(self: Arc<Self>) -> Option<VerbHandler> {
        None
    }
}

/// Build the verb table of a resource
pub fn discover_verbs(resource: &Arc<dyn Resource>) -> Vec<VerbHandler> {
    [
        resource.clone().as_get(),
        resource.clone().as_post(),
        resource.clone().as_put(),
        resource.clone().as_patch(),
        resource.clone().as_delete(),
    ]
    .into_iter()
    .flatten()
    .collect()
}
