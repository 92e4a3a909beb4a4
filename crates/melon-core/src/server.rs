//! HTTP server
//!
//! One hyper HTTP/1 connection task per accepted socket. The routers are
//! shared read-only behind `Arc`s, so requests never contend on them.
//!
//! - [`ServerType::Default`]: the application and admin routers each get a
//!   listener of their own.
//! - [`ServerType::Simple`]: one listener; a request goes to the admin router
//!   when its path lies under the admin prefix, otherwise to the application.

use crate::config::{ServerConfig, ServerType};
use crate::error::{ApiError, StartupError};
use crate::request::Request;
use crate::response::{IntoResponse, Response};
use crate::router::Router;
use http::{Method, StatusCode};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Routers a listener dispatches to
#[derive(Clone)]
enum Target {
    One(Arc<Router>),
    Shared {
        application: Arc<Router>,
        admin: Arc<Router>,
    },
}

impl Target {
    fn router_for(&self, path: &str) -> &Router {
        match self {
            Target::One(router) => router,
            Target::Shared { application, admin } => {
                if admin.covers(path) {
                    admin
                } else {
                    application
                }
            }
        }
    }
}

/// A configured server, not yet bound
pub struct Server {
    config: ServerConfig,
    pub(crate) application: Arc<Router>,
    pub(crate) admin: Arc<Router>,
}

impl Server {
    pub fn new(config: ServerConfig, application: Router, admin: Router) -> Self {
        Self {
            config,
            application: Arc::new(application),
            admin: Arc::new(admin),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn application(&self) -> &Router {
        &self.application
    }

    pub fn admin(&self) -> &Router {
        &self.admin
    }

    /// Dispatch a request as the configured listeners would, without a socket
    pub async fn handle(&self, req: Request, connector: Connector) -> Response {
        let target = self.target(connector);
        let path = req.path().to_string();
        target.router_for(&path).serve(req).await
    }

    /// Bind every listener the configuration asks for
    pub async fn bind(self) -> Result<BoundServer, StartupError> {
        let mut connectors = Vec::new();
        match self.config.server_type {
            ServerType::Default => {
                let app_addr = self.config.application_socket()?;
                let admin_addr = self.config.admin_socket()?;
                connectors.push(
                    Listener::bind("application", app_addr, self.target(Connector::Application))
                        .await?,
                );
                connectors.push(
                    Listener::bind("admin", admin_addr, self.target(Connector::Admin)).await?,
                );
            }
            ServerType::Simple => {
                let addr = self.config.application_socket()?;
                connectors.push(Listener::bind("simple", addr, self.target(Connector::Simple)).await?);
            }
        }

        Ok(BoundServer {
            listeners: connectors,
            max_body_size: self.config.max_body_size,
        })
    }

    /// Bind and serve until Ctrl-C
    pub async fn run(self) -> Result<(), StartupError> {
        let bound = self.bind().await?;
        bound
            .serve_with_shutdown(async {
                if let Err(err) = tokio::signal::ctrl_c().await {
                    error!(target: "melon::server", error = %err, "Could not listen for Ctrl-C");
                    std::future::pending::<()>().await;
                }
            })
            .await;
        Ok(())
    }

    fn target(&self, connector: Connector) -> Target {
        match connector {
            Connector::Application => Target::One(self.application.clone()),
            Connector::Admin => Target::One(self.admin.clone()),
            Connector::Simple => Target::Shared {
                application: self.application.clone(),
                admin: self.admin.clone(),
            },
        }
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("application", &self.application)
            .field("admin", &self.admin)
            .finish()
    }
}

/// Which listener a request arrives on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    Application,
    Admin,
    /// The single listener of [`ServerType::Simple`]
    Simple,
}

struct Listener {
    name: &'static str,
    listener: TcpListener,
    target: Target,
}

impl Listener {
    async fn bind(name: &'static str, addr: SocketAddr, target: Target) -> Result<Self, StartupError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| StartupError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        Ok(Self {
            name,
            listener,
            target,
        })
    }
}

/// A server whose sockets are bound
pub struct BoundServer {
    listeners: Vec<Listener>,
    max_body_size: usize,
}

impl BoundServer {
    /// Bound addresses as `(connector name, address)`
    pub fn local_addrs(&self) -> Vec<(&'static str, SocketAddr)> {
        self.listeners
            .iter()
            .filter_map(|l| l.listener.local_addr().ok().map(|addr| (l.name, addr)))
            .collect()
    }

    /// Accept connections until `shutdown` completes
    ///
    /// Connections already accepted are left to finish on their own.
    pub async fn serve_with_shutdown<F>(self, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut loops = Vec::with_capacity(self.listeners.len());
        for listener in self.listeners {
            if let Ok(addr) = listener.listener.local_addr() {
                info!(target: "melon::server", connector = listener.name, "Listening on http://{}", addr);
            }
            loops.push(tokio::spawn(accept_loop(
                listener,
                self.max_body_size,
                stop_rx.clone(),
            )));
        }

        shutdown.await;
        info!(target: "melon::server", "Shutting down");
        let _ = stop_tx.send(true);
        for handle in loops {
            let _ = handle.await;
        }
    }
}

async fn accept_loop(listener: Listener, max_body_size: usize, mut stop: watch::Receiver<bool>) {
    loop {
        let accepted = tokio::select! {
            accepted = listener.listener.accept() => accepted,
            _ = stop.changed() => break,
        };

        let (stream, remote_addr) = match accepted {
            Ok(conn) => conn,
            Err(err) => {
                warn!(target: "melon::server", connector = listener.name, error = %err, "Accept failed");
                continue;
            }
        };

        let io = TokioIo::new(stream);
        let target = listener.target.clone();
        tokio::spawn(async move {
            let service = service_fn(move |req: hyper::Request<Incoming>| {
                let target = target.clone();
                async move {
                    let response = handle_request(&target, req, max_body_size).await;
                    Ok::<_, Infallible>(response)
                }
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                error!(target: "melon::server", remote = %remote_addr, "Connection error: {}", err);
            }
        });
    }
}

/// Read the body up to the limit, then dispatch
async fn handle_request(
    target: &Target,
    req: hyper::Request<Incoming>,
    max_body_size: usize,
) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();

    let (parts, body) = req.into_parts();
    let body = match Limited::new(body, max_body_size).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            let response = if err.downcast_ref::<LengthLimitError>().is_some() {
                ApiError::payload_too_large(format!(
                    "Request body exceeds {max_body_size} bytes"
                ))
            } else {
                ApiError::bad_request("Could not read request body").with_internal(err.to_string())
            }
            .into_response();
            log_request(&method, &path, response.status(), start);
            return response;
        }
    };

    let request = Request::new(parts, body);
    let response = target.router_for(&path).serve(request).await;
    log_request(&method, &path, response.status(), start);
    response
}

/// Log request completion
fn log_request(method: &Method, path: &str, status: StatusCode, start: Instant) {
    let elapsed = start.elapsed();

    if status.is_success() {
        info!(
            target: "melon::server",
            method = %method,
            path = %path,
            status = %status.as_u16(),
            duration_ms = %elapsed.as_millis(),
            "Request completed"
        );
    } else {
        warn!(
            target: "melon::server",
            method = %method,
            path = %path,
            status = %status.as_u16(),
            duration_ms = %elapsed.as_millis(),
            "Request failed"
        );
    }
}
