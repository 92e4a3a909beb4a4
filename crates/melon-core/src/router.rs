//! Path-pattern router
//!
//! Routes map an HTTP method and a path pattern to a [`Chain`]. Patterns are
//! sequences of literal and parameter segments:
//!
//! - `/users` - Static path
//! - `/users/:name` - Single parameter
//! - `/users/{user_id}/posts/{post_id}` - Brace form, normalised to `:user_id`
//!
//! # Matching
//!
//! A request path is split into segments and compared against patterns with
//! the same segment count. Literal segments must match exactly; parameter
//! segments match any non-empty segment and capture its percent-decoded
//! value. When several patterns match, the one with the fewest parameters
//! wins. Two patterns with the same number of parameters that can match the
//! same path are rejected at registration time, so matching never has to
//! break a tie.
//!
//! Methods fall through by specificity: the most specific matching pattern
//! that serves the method (exactly, or through a `*` registration) handles
//! the request. If patterns match but none serves the method the outcome is
//! 405 with the union of their methods.
//!
//! # Example
//!
//! ```rust,ignore
//! use melon_core::Router;
//!
//! let mut router = Router::new("/api");
//! router.handle("GET", "/users/:name", |req: Request| async move {
//!     format!("hello {}", req.path_param("name").unwrap_or("stranger"))
//! })?;
//! router.handle("GET", "/users/admin", || async { "the admin" })?;
//! ```

use crate::error::{ApiError, RouteError};
use crate::filter::{Chain, FilterStack, RecoveryFilter};
use crate::handler::{into_boxed_handler, BoxedHandler, Handler};
use crate::path_params::PathParams;
use crate::request::Request;
use crate::response::{IntoResponse, Response};
use http::{header, HeaderValue, Method};
use std::collections::HashMap;
use std::sync::Arc;

/// Method string that matches any request method
pub const ANY_METHOD: &str = "*";

/// Information about a registered route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteInfo {
    /// `*` or the HTTP method
    pub method: String,
    /// Normalised pattern, relative to the router prefix
    pub pattern: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A parsed path pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    raw: String,
    segments: Vec<Segment>,
}

impl Pattern {
    /// Parse and normalise a pattern
    pub fn parse(pattern: &str) -> Result<Self, RouteError> {
        let malformed = |reason: &str| RouteError::MalformedPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        if !pattern.starts_with('/') {
            return Err(malformed("pattern must start with '/'"));
        }

        let mut segments = Vec::new();
        for part in pattern.split('/').filter(|s| !s.is_empty()) {
            let segment = if let Some(name) = part.strip_prefix(':') {
                Segment::Param(name.to_string())
            } else if let Some(name) = part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                Segment::Param(name.to_string())
            } else if part.contains('{') || part.contains('}') {
                return Err(malformed("unbalanced braces in segment"));
            } else {
                Segment::Literal(part.to_string())
            };

            if let Segment::Param(name) = &segment {
                if name.is_empty() {
                    return Err(malformed("parameter name must not be empty"));
                }
                if name.contains(['{', '}', ':']) {
                    return Err(malformed("parameter name contains a marker character"));
                }
                let repeated = segments
                    .iter()
                    .any(|s| matches!(s, Segment::Param(existing) if existing == name));
                if repeated {
                    return Err(malformed("parameter names must be unique"));
                }
            }
            segments.push(segment);
        }

        let mut raw = String::with_capacity(pattern.len());
        for segment in &segments {
            raw.push('/');
            match segment {
                Segment::Literal(s) => raw.push_str(s),
                Segment::Param(name) => {
                    raw.push(':');
                    raw.push_str(name);
                }
            }
        }
        if raw.is_empty() {
            raw.push('/');
        }

        Ok(Self { raw, segments })
    }

    /// Normalised form, parameters written as `:name`
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of parameter segments; fewer means more specific
    pub fn param_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Param(_)))
            .count()
    }

    /// Whether some path is matched by both patterns
    fn overlaps(&self, other: &Pattern) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|pair| match pair {
                    (Segment::Literal(a), Segment::Literal(b)) => a == b,
                    _ => true,
                })
    }

    fn matches(&self, path: &[&str]) -> bool {
        self.segments.len() == path.len()
            && self.segments.iter().zip(path).all(|(segment, value)| match segment {
                Segment::Literal(lit) => lit.as_str() == *value,
                Segment::Param(_) => !value.is_empty(),
            })
    }

    fn capture(&self, path: &[&str]) -> PathParams {
        let mut params = PathParams::with_capacity(self.param_count());
        for (segment, value) in self.segments.iter().zip(path) {
            if let Segment::Param(name) = segment {
                let decoded = urlencoding::decode(value)
                    .map(|v| v.into_owned())
                    .unwrap_or_else(|_| (*value).to_string());
                params.insert(name.clone(), decoded);
            }
        }
        params
    }
}

/// Routes sharing one pattern
struct RouteEntry {
    pattern: Pattern,
    methods: Vec<(Method, Chain)>,
    any: Option<Chain>,
}

impl RouteEntry {
    fn chain_for(&self, method: &Method) -> Option<&Chain> {
        self.methods
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, chain)| chain)
            .or(self.any.as_ref())
    }
}

/// Result of route matching
pub enum RouteMatch<'a> {
    Found {
        chain: &'a Chain,
        params: PathParams,
        pattern: &'a str,
    },
    NotFound,
    MethodNotAllowed {
        allowed: Vec<Method>,
    },
}

impl std::fmt::Debug for RouteMatch<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteMatch::Found { params, pattern, .. } => f
                .debug_struct("Found")
                .field("pattern", pattern)
                .field("params", params)
                .finish(),
            RouteMatch::NotFound => f.write_str("NotFound"),
            RouteMatch::MethodNotAllowed { allowed } => f
                .debug_struct("MethodNotAllowed")
                .field("allowed", allowed)
                .finish(),
        }
    }
}

/// Main router
///
/// Built during the single-threaded registration phase and read-only once
/// serving starts. Every chain begins with a [`RecoveryFilter`].
pub struct Router {
    prefix: String,
    filters: FilterStack,
    // keyed by segment count, each list ordered by ascending parameter count
    routes: HashMap<usize, Vec<RouteEntry>>,
    registered: Vec<RouteInfo>,
}

impl Router {
    /// Create a router mounted at `prefix`
    pub fn new(prefix: &str) -> Self {
        Self::with_filters(prefix, FilterStack::new())
    }

    /// Create a router whose chains run `filters` after the recovery filter
    pub fn with_filters(prefix: &str, mut filters: FilterStack) -> Self {
        filters.prepend(Arc::new(RecoveryFilter::new()));
        Self {
            prefix: normalize_prefix(prefix),
            filters,
            routes: HashMap::new(),
            registered: Vec::new(),
        }
    }

    /// The mount path prepended to every route
    pub fn path_prefix(&self) -> &str {
        &self.prefix
    }

    /// Names of the filters wrapped around each route, outermost first
    pub fn filter_names(&self) -> Vec<String> {
        self.filters.names()
    }

    /// Register a handler for `method` (or `*`) on `pattern`
    pub fn handle<H, T>(&mut self, method: &str, pattern: &str, handler: H) -> Result<(), RouteError>
    where
        H: Handler<T>,
        T: 'static,
    {
        self.handle_boxed(method, pattern, into_boxed_handler(handler))
    }

    /// Register an already type-erased handler
    pub fn handle_boxed(
        &mut self,
        method: &str,
        pattern: &str,
        handler: BoxedHandler,
    ) -> Result<(), RouteError> {
        let method = parse_method(method)?;
        let pattern = Pattern::parse(pattern)?;
        let entries = self.routes.entry(pattern.len()).or_default();

        let mut same = None;
        for (i, entry) in entries.iter().enumerate() {
            if entry.pattern == pattern {
                same = Some(i);
                break;
            }
            if entry.pattern.param_count() == pattern.param_count()
                && entry.pattern.overlaps(&pattern)
            {
                return Err(RouteError::Ambiguous {
                    existing: entry.pattern.as_str().to_string(),
                    new: pattern.as_str().to_string(),
                });
            }
        }

        let index = match same {
            Some(i) => i,
            None => {
                let at = entries.partition_point(|e| e.pattern.param_count() <= pattern.param_count());
                entries.insert(
                    at,
                    RouteEntry {
                        pattern: pattern.clone(),
                        methods: Vec::new(),
                        any: None,
                    },
                );
                at
            }
        };

        let entry = &mut entries[index];
        let duplicate = match &method {
            None => entry.any.is_some(),
            Some(m) => entry.methods.iter().any(|(existing, _)| existing == m),
        };
        if duplicate {
            return Err(RouteError::Duplicate {
                method: method_label(method.as_ref()).to_string(),
                pattern: pattern.as_str().to_string(),
            });
        }

        let chain = self.filters.chain(handler);
        match &method {
            None => entry.any = Some(chain),
            Some(m) => entry.methods.push((m.clone(), chain)),
        }

        tracing::trace!(
            method = method_label(method.as_ref()),
            pattern = pattern.as_str(),
            "Route registered"
        );
        self.registered.push(RouteInfo {
            method: method_label(method.as_ref()).to_string(),
            pattern: pattern.as_str().to_string(),
        });
        Ok(())
    }

    /// Registered routes in registration order
    pub fn routes(&self) -> &[RouteInfo] {
        &self.registered
    }

    /// Match a request path (including the prefix)
    pub fn match_route(&self, method: &Method, path: &str) -> RouteMatch<'_> {
        let Some(relative) = self.strip_prefix(path) else {
            return RouteMatch::NotFound;
        };
        let segments: Vec<&str> = relative.split('/').filter(|s| !s.is_empty()).collect();
        let Some(entries) = self.routes.get(&segments.len()) else {
            return RouteMatch::NotFound;
        };

        let mut allowed: Vec<Method> = Vec::new();
        let mut matched = false;
        for entry in entries.iter().filter(|e| e.pattern.matches(&segments)) {
            if let Some(chain) = entry.chain_for(method) {
                return RouteMatch::Found {
                    chain,
                    params: entry.pattern.capture(&segments),
                    pattern: entry.pattern.as_str(),
                };
            }
            matched = true;
            for (m, _) in &entry.methods {
                if !allowed.contains(m) {
                    allowed.push(m.clone());
                }
            }
        }

        if matched {
            RouteMatch::MethodNotAllowed { allowed }
        } else {
            RouteMatch::NotFound
        }
    }

    /// Dispatch a request through the matching chain
    pub async fn serve(&self, mut req: Request) -> Response {
        match self.match_route(req.method(), req.path()) {
            RouteMatch::Found { chain, params, .. } => {
                req.set_path_params(params);
                chain.serve(req).await
            }
            RouteMatch::NotFound => {
                ApiError::not_found(format!("No route for {}", req.path())).into_response()
            }
            RouteMatch::MethodNotAllowed { allowed } => {
                let allow = allowed
                    .iter()
                    .map(Method::as_str)
                    .collect::<Vec<_>>()
                    .join(", ");
                let mut response = ApiError::method_not_allowed(format!(
                    "Method {} not allowed for {}",
                    req.method(),
                    req.path()
                ))
                .into_response();
                if let Ok(value) = HeaderValue::from_str(&allow) {
                    response.headers_mut().insert(header::ALLOW, value);
                }
                response
            }
        }
    }

    /// Whether `path` lies under this router's prefix
    pub fn covers(&self, path: &str) -> bool {
        self.strip_prefix(path).is_some()
    }

    fn strip_prefix<'p>(&self, path: &'p str) -> Option<&'p str> {
        if self.prefix == "/" {
            return Some(path);
        }
        let rest = path.strip_prefix(self.prefix.as_str())?;
        if rest.is_empty() || rest.starts_with('/') {
            Some(rest)
        } else {
            None
        }
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("prefix", &self.prefix)
            .field("filters", &self.filters)
            .field("routes", &self.registered)
            .finish()
    }
}

/// `None` stands for `*`
fn parse_method(method: &str) -> Result<Option<Method>, RouteError> {
    if method == ANY_METHOD {
        return Ok(None);
    }
    Method::from_bytes(method.as_bytes())
        .map(Some)
        .map_err(|_| RouteError::InvalidMethod(method.to_string()))
}

fn method_label(method: Option<&Method>) -> &str {
    method.map(Method::as_str).unwrap_or(ANY_METHOD)
}

/// Normalize a mount prefix.
///
/// Ensures a single leading slash, no trailing slash (unless it is just
/// "/") and no double slashes.
pub fn normalize_prefix(prefix: &str) -> String {
    let segments: Vec<&str> = prefix.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return "/".to_string();
    }

    let mut result = String::with_capacity(prefix.len() + 1);
    for segment in segments {
        result.push('/');
        result.push_str(segment);
    }
    result
}

/// Join a normalised prefix and a normalised pattern
pub fn join_path(prefix: &str, pattern: &str) -> String {
    match (prefix, pattern) {
        ("/", p) => p.to_string(),
        (pre, "/") => pre.to_string(),
        (pre, p) => format!("{pre}{p}"),
    }
}
