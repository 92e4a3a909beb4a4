//! Server configuration loaded from `MELON_`-prefixed environment variables
//!
//! Every field has a default, so an empty environment yields a usable
//! configuration. A `.env` file in the working directory is read first when
//! present; variables already set in the process take precedence.
//!
//! | Variable                          | Default         |
//! |-----------------------------------|-----------------|
//! | `MELON_SERVER_TYPE`               | `default`       |
//! | `MELON_APPLICATION_ADDR`          | `0.0.0.0:8080`  |
//! | `MELON_ADMIN_ADDR`                | `0.0.0.0:8081`  |
//! | `MELON_APPLICATION_CONTEXT_PATH`  | `/application`  |
//! | `MELON_ADMIN_CONTEXT_PATH`        | `/admin`        |
//! | `MELON_ROOT_PATH`                 | `/`             |
//! | `MELON_MAX_BODY_SIZE`             | `1048576`       |

use crate::router::normalize_prefix;
use serde::Deserialize;
use std::net::SocketAddr;

/// Prefix shared by every configuration variable
pub const ENV_PREFIX: &str = "MELON_";

/// Default request body limit (1 MiB)
pub const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

/// Error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable deserialization failed
    #[error("configuration error: {0}")]
    Env(#[from] envy::Error),

    /// An address setting is not a valid socket address
    #[error("invalid {field} {value:?}: {reason}")]
    InvalidAddr {
        field: &'static str,
        value: String,
        reason: String,
    },

    /// Application and admin connectors would share a listener
    #[error("application and admin connectors cannot both bind {0}")]
    AddrConflict(SocketAddr),

    /// Simple mode needs distinct context paths to tell the surfaces apart
    #[error("application and admin context paths must differ, both are {0:?}")]
    ContextConflict(String),
}

/// Connector layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerType {
    /// Separate listeners for the application and the admin surface
    #[default]
    Default,
    /// One listener; application and admin are told apart by context path
    Simple,
}

/// Server settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server_type: ServerType,
    pub application_addr: String,
    pub admin_addr: String,
    pub application_context_path: String,
    pub admin_context_path: String,
    /// Base path of the REST resources
    pub root_path: String,
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_type: ServerType::Default,
            application_addr: "0.0.0.0:8080".to_string(),
            admin_addr: "0.0.0.0:8081".to_string(),
            application_context_path: "/application".to_string(),
            admin_context_path: "/admin".to_string(),
            root_path: "/".to_string(),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

impl ServerConfig {
    /// Load from the process environment, reading `.env` first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        load_dotenv();
        let config: Self = envy::prefixed(ENV_PREFIX).from_env()?;
        config.validate()
    }

    /// Load from an explicit set of variables instead of the process environment.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars = vars.into_iter().map(|(k, v)| (k.into(), v.into()));
        let config: Self = envy::prefixed(ENV_PREFIX).from_iter(vars)?;
        config.validate()
    }

    /// Check addresses and normalise every path setting.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        let app = parse_addr("application_addr", &self.application_addr)?;
        let admin = parse_addr("admin_addr", &self.admin_addr)?;

        self.application_context_path = normalize_prefix(&self.application_context_path);
        self.admin_context_path = normalize_prefix(&self.admin_context_path);
        self.root_path = normalize_prefix(&self.root_path);

        match self.server_type {
            ServerType::Default if app == admin => return Err(ConfigError::AddrConflict(app)),
            ServerType::Simple if self.application_context_path == self.admin_context_path => {
                return Err(ConfigError::ContextConflict(
                    self.application_context_path.clone(),
                ))
            }
            _ => {}
        }

        Ok(self)
    }

    pub fn application_socket(&self) -> Result<SocketAddr, ConfigError> {
        parse_addr("application_addr", &self.application_addr)
    }

    pub fn admin_socket(&self) -> Result<SocketAddr, ConfigError> {
        parse_addr("admin_addr", &self.admin_addr)
    }
}

/// Load environment variables from a `.env` file, if one exists.
///
/// Existing variables are not overridden.
pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
}

fn parse_addr(field: &'static str, value: &str) -> Result<SocketAddr, ConfigError> {
    value.parse().map_err(|e: std::net::AddrParseError| ConfigError::InvalidAddr {
        field,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_environment_gives_defaults() {
        let config = ServerConfig::from_vars(Vec::<(String, String)>::new()).unwrap();
        assert_eq!(config.server_type, ServerType::Default);
        assert_eq!(config.application_addr, "0.0.0.0:8080");
        assert_eq!(config.admin_addr, "0.0.0.0:8081");
        assert_eq!(config.application_context_path, "/application");
        assert_eq!(config.admin_context_path, "/admin");
        assert_eq!(config.root_path, "/");
        assert_eq!(config.max_body_size, DEFAULT_MAX_BODY_SIZE);
    }

    #[test]
    fn prefixed_variables_override_defaults() {
        let config = ServerConfig::from_vars([
            ("MELON_SERVER_TYPE", "simple"),
            ("MELON_APPLICATION_ADDR", "127.0.0.1:9000"),
            ("MELON_ROOT_PATH", "api/"),
            ("MELON_MAX_BODY_SIZE", "2048"),
            ("UNRELATED", "ignored"),
        ])
        .unwrap();

        assert_eq!(config.server_type, ServerType::Simple);
        assert_eq!(config.application_socket().unwrap().port(), 9000);
        assert_eq!(config.root_path, "/api");
        assert_eq!(config.max_body_size, 2048);
    }

    #[test]
    fn invalid_address_is_rejected() {
        let err = ServerConfig::from_vars([("MELON_ADMIN_ADDR", "not-an-address")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAddr { field: "admin_addr", .. }));
    }

    #[test]
    fn unparseable_number_is_an_env_error() {
        let err = ServerConfig::from_vars([("MELON_MAX_BODY_SIZE", "lots")]).unwrap_err();
        assert!(matches!(err, ConfigError::Env(_)));
    }

    #[test]
    fn default_mode_rejects_a_shared_address() {
        let err = ServerConfig::from_vars([
            ("MELON_APPLICATION_ADDR", "127.0.0.1:8080"),
            ("MELON_ADMIN_ADDR", "127.0.0.1:8080"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::AddrConflict(_)));
    }

    #[test]
    fn simple_mode_allows_a_shared_address_but_not_a_shared_path() {
        let ok = ServerConfig::from_vars([
            ("MELON_SERVER_TYPE", "simple"),
            ("MELON_APPLICATION_ADDR", "127.0.0.1:8080"),
            ("MELON_ADMIN_ADDR", "127.0.0.1:8080"),
        ]);
        assert!(ok.is_ok());

        let err = ServerConfig::from_vars([
            ("MELON_SERVER_TYPE", "simple"),
            ("MELON_APPLICATION_CONTEXT_PATH", "/x/"),
            ("MELON_ADMIN_CONTEXT_PATH", "x"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::ContextConflict(path) if path == "/x"));
    }
}
