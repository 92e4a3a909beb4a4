//! In-process client for driving routers in tests
//!
//! Requests go through the same router, filter chain and handlers as they
//! would behind a listener; only the socket is missing.
//!
//! # Example
//!
//! ```rust,ignore
//! use melon_core::{Router, TestClient};
//!
//! #[tokio::test]
//! async fn ping() {
//!     let mut router = Router::new("/");
//!     router.handle("*", "/ping", || async { "pong\n" }).unwrap();
//!
//!     let reply = TestClient::new(router).get("/ping").await;
//!     reply.assert_status(StatusCode::OK);
//!     assert_eq!(reply.text(), "pong\n");
//! }
//! ```

use crate::config::DEFAULT_MAX_BODY_SIZE;
use crate::error::ApiError;
use crate::request::Request;
use crate::response::{IntoResponse, Response};
use crate::router::Router;
use crate::server::Server;
use bytes::Bytes;
use http::header::{HeaderName, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Sends requests straight into a [`Router`]
pub struct TestClient {
    router: Arc<Router>,
    body_limit: usize,
}

impl TestClient {
    pub fn new(router: Router) -> Self {
        Self::over(Arc::new(router))
    }

    /// Client for the application router of a built server
    pub fn application(server: &Server) -> Self {
        Self::over(server.application.clone())
    }

    /// Client for the admin router of a built server
    pub fn admin(server: &Server) -> Self {
        Self::over(server.admin.clone())
    }

    fn over(router: Arc<Router>) -> Self {
        Self {
            router,
            body_limit: DEFAULT_MAX_BODY_SIZE,
        }
    }

    /// Reject bodies larger than `limit` with 413, as the server does
    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.request(TestRequest::get(path)).await
    }

    /// POST `body` encoded as JSON
    pub async fn post_json<T: Serialize>(&self, path: &str, body: &T) -> TestResponse {
        self.request(TestRequest::post(path).json(body)).await
    }

    pub async fn request(&self, req: TestRequest) -> TestResponse {
        let TestRequest {
            method,
            path,
            headers,
            body,
        } = req;
        let body = body.unwrap_or_default();

        let response = if body.len() > self.body_limit {
            ApiError::payload_too_large(format!("Request body exceeds {} bytes", self.body_limit))
                .into_response()
        } else {
            let mut outgoing = http::Request::new(body);
            *outgoing.method_mut() = method;
            *outgoing.uri_mut() = path.parse().unwrap_or_else(|_| Uri::from_static("/"));
            *outgoing.headers_mut() = headers;
            self.router.serve(Request::from(outgoing)).await
        };
        TestResponse::collect(response).await
    }
}

/// A request under construction
#[derive(Debug, Clone)]
pub struct TestRequest {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl TestRequest {
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_owned(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(path: &str) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: &str) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: &str) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: &str) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: &str) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Set a header; names or values that are not valid HTTP are skipped
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (name.parse::<HeaderName>(), HeaderValue::from_str(value)) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn accept(self, media_type: &str) -> Self {
        self.header("accept", media_type)
    }

    pub fn content_type(self, media_type: &str) -> Self {
        self.header("content-type", media_type)
    }

    /// Body encoded as JSON, with the matching `Content-Type`
    pub fn json<T: Serialize>(mut self, value: &T) -> Self {
        if let Ok(encoded) = serde_json::to_vec(value) {
            self.headers
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            self.body = Some(encoded.into());
        }
        self
    }

    /// Raw body; set the content type separately
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// A fully collected response
#[derive(Debug)]
pub struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl TestResponse {
    async fn collect(response: Response) -> Self {
        let (parts, body) = response.into_parts();
        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(never) => match never {},
        };
        Self {
            status: parts.status,
            headers: parts.headers,
            body,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value, if present and visible ASCII
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body decoded lossily as UTF-8
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// # Panics
    ///
    /// When the status differs; the body is included in the message.
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status,
            expected,
            "status mismatch, body was: {}",
            self.text()
        );
        self
    }

    /// # Panics
    ///
    /// When the header is missing or has another value.
    pub fn assert_header(&self, name: &str, expected: &str) -> &Self {
        assert_eq!(
            self.header(name),
            Some(expected),
            "header {name} mismatch"
        );
        self
    }

    /// # Panics
    ///
    /// When the body is not JSON for `T` or decodes to another value.
    pub fn assert_json<T: DeserializeOwned + PartialEq + std::fmt::Debug>(
        &self,
        expected: &T,
    ) -> &Self {
        let actual: T = self
            .json()
            .unwrap_or_else(|err| panic!("body is not the expected JSON ({err}): {}", self.text()));
        assert_eq!(&actual, expected);
        self
    }

    /// # Panics
    ///
    /// When `needle` does not occur in the body.
    pub fn assert_body_contains(&self, needle: &str) -> &Self {
        let text = self.text();
        assert!(text.contains(needle), "{needle:?} not found in body: {text}");
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Melon;
    use crate::config::{ServerConfig, ServerType};
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct TestData {
        message: String,
        count: i32,
    }

    fn router() -> Router {
        let mut router = Router::new("/");
        router.handle("GET", "/", || async { "Hello, World!" }).unwrap();
        router
            .handle("POST", "/echo", |mut req: Request| async move {
                let body = req.take_body().unwrap_or_default();
                String::from_utf8_lossy(&body).into_owned()
            })
            .unwrap();
        router
    }

    #[tokio::test]
    async fn get_request() {
        let client = TestClient::new(router());
        let response = client.get("/").await;
        response.assert_status(StatusCode::OK);
        assert_eq!(response.text(), "Hello, World!");
    }

    #[tokio::test]
    async fn not_found() {
        let client = TestClient::new(router());
        client.get("/nonexistent").await.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn post_json_round_trip() {
        let client = TestClient::new(router());
        let input = TestData {
            message: "hello".to_string(),
            count: 123,
        };

        let response = client.post_json("/echo", &input).await;
        response.assert_status(StatusCode::OK);
        response.assert_json(&input);
    }

    #[tokio::test]
    async fn body_limit_is_enforced() {
        let client = TestClient::new(router()).with_body_limit(4);
        let response = client
            .request(TestRequest::post("/echo").body("too long"))
            .await;
        response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn clients_for_a_built_server() {
        let server = Melon::new()
            .config(ServerConfig {
                server_type: ServerType::Simple,
                ..ServerConfig::default()
            })
            .route("GET", "/hello", || async { "hi" })
            .build()
            .unwrap();

        TestClient::application(&server)
            .get("/application/hello")
            .await
            .assert_status(StatusCode::OK);
        TestClient::admin(&server)
            .get("/admin/ping")
            .await
            .assert_status(StatusCode::OK)
            .assert_header("cache-control", "must-revalidate,no-cache,no-store");
    }

    #[test]
    fn request_builder_sets_headers() {
        let req = TestRequest::put("/x")
            .accept("application/xml")
            .content_type("text/plain")
            .header("bad header", "ignored");
        assert_eq!(req.method, Method::PUT);
        assert_eq!(req.headers.get("accept").unwrap(), "application/xml");
        assert_eq!(req.headers.get("content-type").unwrap(), "text/plain");
        assert_eq!(req.headers.len(), 2);
    }
}
