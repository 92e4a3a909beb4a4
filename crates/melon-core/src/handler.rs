//! Handler trait and utilities
//!
//! A handler is the terminal of a filter chain: an async function that
//! receives the request and produces something convertible into a response.
//! Two shapes are accepted, with no arguments or with the whole [`Request`].

use crate::request::Request;
use crate::response::{IntoResponse, Response};
use futures_util::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

/// Trait representing an async handler function
pub trait Handler<T>: Clone + Send + Sync + Sized + 'static {
    /// Call the handler with the request
    fn call(self, req: Request) -> BoxFuture<'static, Response>;
}

impl<F, Fut, Res> Handler<()> for F
where
    F: FnOnce() -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Res> + Send + 'static,
    Res: IntoResponse,
{
    fn call(self, _req: Request) -> BoxFuture<'static, Response> {
        Box::pin(async move { self().await.into_response() })
    }
}

impl<F, Fut, Res> Handler<(Request,)> for F
where
    F: FnOnce(Request) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Res> + Send + 'static,
    Res: IntoResponse,
{
    fn call(self, req: Request) -> BoxFuture<'static, Response> {
        Box::pin(async move { self(req).await.into_response() })
    }
}

/// Type-erased handler stored at the end of a chain
pub type BoxedHandler = Arc<dyn Fn(Request) -> BoxFuture<'static, Response> + Send + Sync>;

/// Create a boxed handler from any Handler
pub fn into_boxed_handler<H, T>(handler: H) -> BoxedHandler
where
    H: Handler<T>,
    T: 'static,
{
    Arc::new(move |req: Request| handler.clone().call(req))
}
