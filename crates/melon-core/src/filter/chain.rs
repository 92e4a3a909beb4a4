//! Filter chain construction
//!
//! A [`FilterStack`] is the ordered list of filters a router applies to every
//! route. Registering a route turns the stack plus the route's handler into a
//! [`Chain`]: the continuations are composed once, from the inside out, so
//! serving a request allocates nothing beyond the futures themselves.

use super::{Filter, Next};
use crate::handler::BoxedHandler;
use crate::request::Request;
use crate::response::Response;
use futures_util::future::BoxFuture;
use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::Service;

/// An ordered list of filters
#[derive(Clone, Default)]
pub struct FilterStack {
    filters: Vec<Arc<dyn Filter>>,
}

impl FilterStack {
    /// Create a new empty filter stack
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
        }
    }

    /// Add a filter to the stack
    ///
    /// Filters run in the order they are added (first added is outermost).
    pub fn push(&mut self, filter: Arc<dyn Filter>) {
        self.filters.push(filter);
    }

    /// Add a filter to the beginning of the stack, making it outermost
    pub fn prepend(&mut self, filter: Arc<dyn Filter>) {
        self.filters.insert(0, filter);
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Filter names, outermost first
    pub fn names(&self) -> Vec<String> {
        self.filters.iter().map(|f| f.name().to_string()).collect()
    }

    /// Build a chain ending in `terminal`
    pub fn chain(&self, terminal: BoxedHandler) -> Chain {
        Chain::new(self.filters.iter().cloned(), terminal)
    }
}

impl std::fmt::Debug for FilterStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Filters plus exactly one terminal handler, composed and immutable
#[derive(Clone)]
pub struct Chain {
    entry: BoxedHandler,
    names: Arc<[String]>,
}

impl Chain {
    /// Compose `filters` (outermost first) around `terminal`
    pub fn new<I>(filters: I, terminal: BoxedHandler) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Filter>>,
    {
        let filters: Vec<Arc<dyn Filter>> = filters.into_iter().collect();
        let names = filters.iter().map(|f| f.name().to_string()).collect();

        // Build the chain from inside out
        let mut entry = terminal;
        for filter in filters.into_iter().rev() {
            let next = Next::new(entry);
            entry = Arc::new(move |req: Request| filter.process(req, next.clone()));
        }

        Self { entry, names }
    }

    /// Run the request through every filter and the terminal handler
    pub fn serve(&self, req: Request) -> BoxFuture<'static, Response> {
        (self.entry)(req)
    }

    /// Filter names, outermost first
    pub fn filter_names(&self) -> &[String] {
        &self.names
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain").field("filters", &self.names).finish()
    }
}

impl Service<Request> for Chain {
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let fut = self.serve(req);
        Box::pin(async move { Ok(fut.await) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::filter_fn;
    use crate::handler::into_boxed_handler;
    use crate::response::IntoResponse;
    use bytes::Bytes;
    use http::StatusCode;
    use proptest::prelude::*;
    use proptest::test_runner::TestCaseError;
    use std::sync::Mutex;
    use tower::ServiceExt;

    type Log = Arc<Mutex<Vec<(usize, &'static str)>>>;

    fn request() -> Request {
        http::Request::builder()
            .uri("/test")
            .body(Bytes::new())
            .unwrap()
            .into()
    }

    fn tracking(id: usize, log: Log) -> Arc<dyn Filter> {
        filter_fn(format!("track-{id}"), move |req, next: Next| {
            let log = log.clone();
            async move {
                log.lock().unwrap().push((id, "pre"));
                let response = next.run(req).await;
                log.lock().unwrap().push((id, "post"));
                response
            }
        })
    }

    fn ok_terminal(log: Log) -> BoxedHandler {
        into_boxed_handler(move || {
            let log = log.clone();
            async move {
                log.lock().unwrap().push((usize::MAX, "handler"));
                StatusCode::OK
            }
        })
    }

    // **Feature: filter-chain, Property 1: Filters run in registration order**
    //
    // For any sequence of filters [F1..Fn], requests pass F1 -> ... -> Fn ->
    // handler and responses pass back Fn -> ... -> F1.
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_filters_run_in_registration_order(num_filters in 0usize..10usize) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let result: Result<(), TestCaseError> = rt.block_on(async {
                let log: Log = Arc::new(Mutex::new(Vec::new()));
                let mut stack = FilterStack::new();
                for i in 0..num_filters {
                    stack.push(tracking(i, log.clone()));
                }

                let chain = stack.chain(ok_terminal(log.clone()));
                let response = chain.serve(request()).await;
                prop_assert_eq!(response.status(), StatusCode::OK);

                let order = log.lock().unwrap();
                prop_assert_eq!(order.len(), num_filters * 2 + 1);
                for i in 0..num_filters {
                    prop_assert_eq!(order[i], (i, "pre"));
                    prop_assert_eq!(order[num_filters + 1 + i], (num_filters - 1 - i, "post"));
                }
                prop_assert_eq!(order[num_filters], (usize::MAX, "handler"));
                Ok(())
            });
            result?;
        }
    }

    #[tokio::test]
    async fn short_circuit_skips_the_terminal() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let deny = filter_fn("deny", |_req, _next: Next| async {
            StatusCode::FORBIDDEN.into_response()
        });

        let chain = Chain::new(vec![tracking(0, log.clone()), deny], ok_terminal(log.clone()));
        let response = chain.serve(request()).await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(*log.lock().unwrap(), vec![(0, "pre"), (0, "post")]);
    }

    #[tokio::test]
    async fn filter_can_rewrite_the_response() {
        let teapot = filter_fn("teapot", |req, next: Next| async move {
            let mut response = next.run(req).await;
            *response.status_mut() = StatusCode::IM_A_TEAPOT;
            response
        });
        let chain = Chain::new(vec![teapot], into_boxed_handler(|| async { "brew" }));
        assert_eq!(chain.serve(request()).await.status(), StatusCode::IM_A_TEAPOT);
    }

    #[tokio::test]
    async fn chain_is_a_tower_service() {
        let chain = Chain::new(Vec::new(), into_boxed_handler(|| async { StatusCode::ACCEPTED }));
        let response = chain.oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[test]
    fn prepend_makes_a_filter_outermost() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let mut stack = FilterStack::new();
        stack.push(tracking(1, log.clone()));
        stack.prepend(tracking(0, log));
        assert_eq!(stack.names(), vec!["track-0", "track-1"]);

        let chain = stack.chain(into_boxed_handler(|| async {}));
        assert_eq!(chain.filter_names(), ["track-0".to_string(), "track-1".to_string()]);
    }
}
