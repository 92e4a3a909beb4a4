//! Built-in admin endpoints

use super::AdminHandler;
use crate::error::ApiError;
use crate::health::HealthRegistry;
use crate::response::{Html, IntoResponse, Response};
use bytes::Bytes;
use http::{header, HeaderValue, StatusCode};
use http_body_util::Full;
use std::sync::Arc;
use std::time::Instant;

pub const PING_PATH: &str = "/ping";
pub const RUNTIME_PATH: &str = "/runtime";
pub const HEALTHCHECK_PATH: &str = "/healthcheck";

/// Body of `/healthcheck` when nothing is registered
pub const NO_HEALTH_CHECKS: &str = "No health checks registered.";

const INDEX_HEAD: &str = "<!DOCTYPE html>\n<html>\n<head>\n\t<title>Operational Menu</title>\n</head>\n<body>\n\t<h1>Operational Menu</h1>\n\t<ul>";
const INDEX_TAIL: &str = "</ul>\n</body>\n</html>\n";

pub(super) fn ping() -> AdminHandler {
    AdminHandler::new(PING_PATH, "Ping", || async { "pong\n" })
}

pub(super) fn runtime(started: Instant) -> AdminHandler {
    AdminHandler::new(RUNTIME_PATH, "Runtime", move || async move {
        runtime_report(started)
    })
}

pub(super) fn healthcheck(registry: Arc<HealthRegistry>) -> AdminHandler {
    AdminHandler::new(HEALTHCHECK_PATH, "Healthcheck", move || {
        let registry = registry.clone();
        async move { health_response(&registry).await }
    })
}

/// The operational menu, one link per admin handler
pub(super) fn index_page(prefix: &str, handlers: &[(String, String)]) -> Html<String> {
    let base = if prefix == "/" { "" } else { prefix };
    let mut page = String::from(INDEX_HEAD);
    for (path, name) in handlers {
        page.push_str("<li><a href=\"");
        push_escaped(&mut page, base);
        push_escaped(&mut page, path);
        page.push_str("\">");
        push_escaped(&mut page, name);
        page.push_str("</a></li>");
    }
    page.push_str(INDEX_TAIL);
    Html(page)
}

/// Append `text` with the HTML special characters replaced by entities
fn push_escaped(page: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => page.push_str("&amp;"),
            '<' => page.push_str("&lt;"),
            '>' => page.push_str("&gt;"),
            '"' => page.push_str("&quot;"),
            '\'' => page.push_str("&#x27;"),
            _ => page.push(c),
        }
    }
}

fn runtime_report(started: Instant) -> String {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    format!(
        "ARCH: {}\nOS: {}\nFAMILY: {}\nVersion: {}\nNumCPU: {}\nPID: {}\nUptime: {}s\n",
        std::env::consts::ARCH,
        std::env::consts::OS,
        std::env::consts::FAMILY,
        env!("CARGO_PKG_VERSION"),
        cpus,
        std::process::id(),
        started.elapsed().as_secs(),
    )
}

async fn health_response(registry: &HealthRegistry) -> Response {
    if registry.is_empty() {
        return (StatusCode::NOT_IMPLEMENTED, NO_HEALTH_CHECKS).into_response();
    }

    let report = registry.run_checks().await;
    let status = if report.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    let body = match serde_json::to_vec(&report.to_map()) {
        Ok(body) => body,
        Err(err) => {
            tracing::error!(target: "melon::admin", error = %err, "Could not encode health report");
            return ApiError::internal("Could not encode health report").into_response();
        }
    };

    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::HealthStatus;
    use http_body_util::BodyExt;

    async fn body_string(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn index_links_carry_the_prefix() {
        let handlers = vec![
            ("/ping".to_string(), "Ping".to_string()),
            ("/runtime".to_string(), "Runtime".to_string()),
        ];
        let Html(page) = index_page("/admin", &handlers);
        assert!(page.contains("<title>Operational Menu</title>"));
        assert!(page.contains("<li><a href=\"/admin/ping\">Ping</a></li>"));
        assert!(page.contains("<li><a href=\"/admin/runtime\">Runtime</a></li>"));

        let Html(root) = index_page("/", &handlers);
        assert!(root.contains("<a href=\"/ping\">"));
    }

    #[test]
    fn index_escapes_handler_names_and_paths() {
        let handlers = vec![(
            "/report?a=1&b=\"2\"".to_string(),
            "<script>alert('x')</script>".to_string(),
        )];
        let Html(page) = index_page("/", &handlers);
        assert!(page.contains(
            "<li><a href=\"/report?a=1&amp;b=&quot;2&quot;\">\
             &lt;script&gt;alert(&#x27;x&#x27;)&lt;/script&gt;</a></li>"
        ));
        assert!(!page.contains("<script>"));
    }

    #[test]
    fn runtime_report_lists_platform_details() {
        let report = runtime_report(Instant::now());
        assert!(report.contains(&format!("ARCH: {}", std::env::consts::ARCH)));
        assert!(report.contains(&format!("PID: {}", std::process::id())));
        assert!(report.contains("NumCPU: "));
    }

    #[tokio::test]
    async fn no_checks_is_not_implemented() {
        let response = health_response(&HealthRegistry::new()).await;
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(body_string(response).await, NO_HEALTH_CHECKS);
    }

    #[tokio::test]
    async fn unhealthy_check_is_a_server_error() {
        let mut registry = HealthRegistry::new();
        registry.register("db", || async { HealthStatus::healthy() });
        registry.register("queue", || async { HealthStatus::unhealthy("backlog") });

        let response = health_response(&registry).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["queue"]["healthy"], false);
        assert_eq!(json["queue"]["message"], "backlog");
        assert_eq!(json["db"]["healthy"], true);
    }

    #[tokio::test]
    async fn degraded_check_still_passes() {
        let mut registry = HealthRegistry::new();
        registry.register("cache", || async { HealthStatus::degraded("cold") });
        let response = health_response(&registry).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
