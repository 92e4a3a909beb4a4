//! Bridges resources into the router
//!
//! Every verb discovered on a resource becomes one route whose terminal
//! handler is bound to that verb. Per request the handler:
//!
//! 1. moves the path parameters into a [`RequestContext`]
//! 2. for body verbs, negotiates a reader on `Content-Type` (415) and decodes
//!    the body (400, the method is not invoked)
//! 3. invokes the verb; an error is rendered directly, with its own status
//!    if it is an [`ApiError`] and as 500 otherwise
//! 4. negotiates a writer on `Accept` (406) and encodes the entity (500)
//! 5. responds 200 with the negotiated `Content-Type`

use super::negotiate::NegotiationError;
use super::provider::ProviderRegistry;
use super::resource::{discover_verbs, BodyInput, RequestContext, Resource, VerbFailure, VerbHandler};
use crate::environment::Endpoint;
use crate::error::{ApiError, BoxError, RouteError};
use crate::handler::BoxedHandler;
use crate::request::Request;
use crate::response::{IntoResponse, Response};
use crate::router::{join_path, Pattern, Router};
use bytes::Bytes;
use futures_util::future::BoxFuture;
use http::{header, HeaderValue};
use http_body_util::Full;
use std::sync::Arc;

/// Registers resources on a router, negotiating through one provider registry
#[derive(Clone)]
pub struct ResourceAdapter {
    providers: Arc<ProviderRegistry>,
}

impl ResourceAdapter {
    pub fn new(providers: Arc<ProviderRegistry>) -> Self {
        Self { providers }
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    /// Register one route per verb the resource implements
    ///
    /// A resource without verbs registers nothing and is not an error.
    pub fn register(
        &self,
        router: &mut Router,
        resource: Arc<dyn Resource>,
    ) -> Result<Vec<Endpoint>, RouteError> {
        let verbs = discover_verbs(&resource);
        if verbs.is_empty() {
            tracing::warn!(
                target: "melon::rest",
                resource = resource.name(),
                path = resource.path(),
                "Resource has no verb methods, nothing registered"
            );
            return Ok(Vec::new());
        }

        let mut endpoints = Vec::with_capacity(verbs.len());
        for verb in verbs {
            let method = verb.method().clone();
            router.handle_boxed(method.as_str(), resource.path(), self.bind(verb))?;

            let pattern = Pattern::parse(resource.path())?;
            endpoints.push(Endpoint {
                method: method.to_string(),
                path: join_path(router.path_prefix(), pattern.as_str()),
                component: resource.name().to_string(),
            });
        }

        tracing::debug!(
            target: "melon::rest",
            resource = resource.name(),
            path = resource.path(),
            verbs = endpoints.len(),
            "Resource registered"
        );
        Ok(endpoints)
    }

    /// Terminal handler bound to one verb
    fn bind(&self, verb: VerbHandler) -> BoxedHandler {
        let providers = self.providers.clone();
        Arc::new(move |req: Request| -> BoxFuture<'static, Response> {
            let providers = providers.clone();
            let verb = verb.clone();
            Box::pin(async move { dispatch(&providers, &verb, req).await })
        })
    }
}

impl std::fmt::Debug for ResourceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceAdapter")
            .field("providers", &self.providers)
            .finish()
    }
}

async fn dispatch(providers: &ProviderRegistry, verb: &VerbHandler, req: Request) -> Response {
    let (parts, body, params) = req.into_parts();
    let accept = header_str(&parts.headers, header::ACCEPT);

    let input = if verb.takes_body() {
        let reader = body_content_type(&parts.headers)
            .and_then(|content_type| providers.select_reader(content_type.as_deref()));
        match reader {
            Ok(provider) => Some(BodyInput {
                provider,
                bytes: body.unwrap_or_default(),
            }),
            Err(err) => return ApiError::from(err).into_response(),
        }
    } else {
        None
    };

    let ctx = RequestContext::new(parts, params);
    let entity = match verb.invoke(ctx, input).await {
        Ok(entity) => entity,
        Err(VerbFailure::Decode(err)) => {
            tracing::debug!(target: "melon::rest", error = %err, "Request body rejected");
            return ApiError::bad_request("Malformed request body").into_response();
        }
        Err(VerbFailure::Domain(err)) => return domain_error(err).into_response(),
    };

    let selected = match providers.select_writer(accept.as_deref()) {
        Ok(selected) => selected,
        Err(err) => return ApiError::from(err).into_response(),
    };

    let encoded = match selected.provider.encode(entity.as_serialize()) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::error!(
                target: "melon::rest",
                provider = selected.provider.name(),
                error = %err,
                "Failed to encode response entity"
            );
            return ApiError::internal("Internal Server Error")
                .with_internal(err.to_string())
                .into_response();
        }
    };

    entity_response(encoded, selected.media_type)
}

/// Render a verb error; an `ApiError` inside keeps its status
fn domain_error(err: BoxError) -> ApiError {
    match err.downcast::<ApiError>() {
        Ok(api) => {
            if let Some(details) = api.internal_details() {
                tracing::warn!(target: "melon::rest", status = %api.status, details, "Resource error");
            }
            *api
        }
        Err(other) => {
            tracing::error!(target: "melon::rest", error = %other, "Resource method failed");
            ApiError::internal("Internal Server Error").with_internal(other.to_string())
        }
    }
}

fn entity_response(body: Bytes, media_type: &'static str) -> Response {
    let mut response = Response::new(Full::new(body));
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(media_type));
    response
}

/// The request's `Content-Type`; a value that is not visible ASCII names no
/// media type any provider reads
fn body_content_type(headers: &http::HeaderMap) -> Result<Option<String>, NegotiationError> {
    let Some(value) = headers.get(header::CONTENT_TYPE) else {
        return Ok(None);
    };
    match value.to_str() {
        Ok(content_type) => Ok(Some(content_type.to_string())),
        Err(_) => Err(NegotiationError::UnsupportedMediaType(
            String::from_utf8_lossy(value.as_bytes()).into_owned(),
        )),
    }
}

fn header_str(headers: &http::HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
