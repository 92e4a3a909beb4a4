//! Panic isolation at the chain boundary
//!
//! Routers install [`RecoveryFilter`] as the outermost filter of every chain.
//! A panic anywhere below it, in another filter, the resource adapter or
//! domain code, unwinds to this point and is turned into a fixed 500 response.
//! Responses are values returned up the chain, so there is never a partially
//! written response to worry about; whatever the inner layers built is simply
//! dropped.

use super::{Filter, Next};
use crate::request::Request;
use crate::response::{Response, TEXT_PLAIN_UTF8};
use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use http::{header, HeaderValue, Method, StatusCode, Uri};
use http_body_util::Full;
use std::any::Any;
use std::backtrace::Backtrace;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Body written for every recovered failure
pub const RECOVERY_BODY: &str = "Internal Server Error";

/// Converts downstream panics into a 500 response
#[derive(Debug, Clone, Copy, Default)]
pub struct RecoveryFilter;

impl RecoveryFilter {
    pub fn new() -> Self {
        Self
    }
}

impl Filter for RecoveryFilter {
    fn name(&self) -> &str {
        "recovery"
    }

    fn process(&self, req: Request, next: Next) -> BoxFuture<'static, Response> {
        let method = req.method().clone();
        let uri = req.uri().clone();

        // The synchronous part of the inner filters runs here
        let inner = match catch_unwind(AssertUnwindSafe(|| next.run(req))) {
            Ok(fut) => fut,
            Err(payload) => {
                let response = recover(&method, &uri, payload);
                return Box::pin(async move { response });
            }
        };

        Box::pin(async move {
            match AssertUnwindSafe(inner).catch_unwind().await {
                Ok(response) => response,
                Err(payload) => recover(&method, &uri, payload),
            }
        })
    }
}

fn recover(method: &Method, uri: &Uri, payload: Box<dyn Any + Send>) -> Response {
    let panic_message = panic_message(payload.as_ref());
    let backtrace = Backtrace::capture();

    tracing::error!(
        target: "melon::recovery",
        method = %method,
        path = %uri.path(),
        panic_message = %panic_message,
        backtrace = %backtrace,
        "Handler panicked, responding with 500"
    );

    let mut response = Response::new(Full::new(Bytes::from_static(RECOVERY_BODY.as_bytes())));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN_UTF8));
    response
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
