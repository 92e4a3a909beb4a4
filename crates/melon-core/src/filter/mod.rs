//! Filters wrapped around every route handler
//!
//! A [`Filter`] sees the request before the handler and the response after
//! it. It receives a [`Next`] continuation and decides whether to call it;
//! returning without calling `next` short-circuits the rest of the chain.
//!
//! # Example
//!
//! ```rust,ignore
//! use melon_core::filter::{filter_fn, Next};
//! use melon_core::{ApiError, IntoResponse, Request};
//!
//! let auth = filter_fn("auth", |req: Request, next: Next| async move {
//!     if req.headers().contains_key("authorization") {
//!         next.run(req).await
//!     } else {
//!         ApiError::unauthorized("missing credentials").into_response()
//!     }
//! });
//! ```

mod chain;
mod recovery;

pub use chain::{Chain, FilterStack};
pub use recovery::{RecoveryFilter, RECOVERY_BODY};

use crate::handler::BoxedHandler;
use crate::request::Request;
use crate::response::Response;
use futures_util::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

/// A pipeline stage wrapped around a terminal handler
pub trait Filter: Send + Sync + 'static {
    /// Name used in diagnostics
    fn name(&self) -> &str;

    /// Process a request, calling `next` to continue the chain
    fn process(&self, req: Request, next: Next) -> BoxFuture<'static, Response>;
}

/// The rest of the chain, as seen from inside a filter
#[derive(Clone)]
pub struct Next {
    inner: BoxedHandler,
}

impl Next {
    pub(crate) fn new(inner: BoxedHandler) -> Self {
        Self { inner }
    }

    /// Run the remaining filters and the terminal handler
    pub fn run(self, req: Request) -> BoxFuture<'static, Response> {
        (self.inner)(req)
    }
}

/// Filter built from a closure, see [`filter_fn`]
pub struct FnFilter<F> {
    name: String,
    f: F,
}

impl<F, Fut> Filter for FnFilter<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&self, req: Request, next: Next) -> BoxFuture<'static, Response> {
        Box::pin((self.f)(req, next))
    }
}

/// Create a filter from an async closure
pub fn filter_fn<F, Fut>(name: impl Into<String>, f: F) -> Arc<dyn Filter>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    Arc::new(FnFilter {
        name: name.into(),
        f,
    })
}
