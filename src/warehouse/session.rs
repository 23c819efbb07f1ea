use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::config::Config;

/// OAuth token file mounted by the platform when running inside Snowflake
const AMBIENT_TOKEN_PATH: &str = "/snowflake/session/token";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Connections file not found: {path}")]
    ConnectionsFileMissing { path: PathBuf },

    #[error("Failed to read connections file: {path}")]
    ConnectionsFileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse connections file: {path}")]
    ConnectionsFileParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Connection profile '{name}' not found in {path}")]
    ProfileNotFound { name: String, path: PathBuf },

    #[error("Connection profile '{name}' is missing required field '{field}'")]
    ProfileIncomplete { name: String, field: &'static str },

    #[error(
        "Connection profile '{name}' has no token; the SQL API needs a \
         programmatic access token or OAuth token (password auth is not supported)"
    )]
    UnsupportedAuth { name: String },

    #[error("Cannot determine home directory")]
    NoHomeDir,
}

/// How the bearer token should be presented to the SQL API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Oauth,
    ProgrammaticAccessToken,
}

impl TokenKind {
    pub fn header_value(self) -> &'static str {
        match self {
            TokenKind::Oauth => "OAUTH",
            TokenKind::ProgrammaticAccessToken => "PROGRAMMATIC_ACCESS_TOKEN",
        }
    }
}

/// A live handle to the warehouse: everything the SQL API client needs,
/// plus a stable identity string used to key the usage cache.
///
/// Acquired once at process start and threaded explicitly through the app
/// state; there is no global session singleton.
#[derive(Debug, Clone)]
pub struct WarehouseSession {
    host: String,
    token: String,
    token_kind: TokenKind,
    identity: String,
}

impl WarehouseSession {
    /// Obtain a session, preferring the ambient host-managed one (token file
    /// plus env vars injected when hosted inside Snowflake), falling back to
    /// the named profile in connections.toml. Both paths failing is fatal to
    /// the caller.
    pub fn acquire(config: &Config) -> Result<Self, SessionError> {
        if let Some(session) = Self::from_ambient() {
            return Ok(session);
        }
        let path = connections_file_path(config)?;
        Self::from_profile_file(&path, &config.connection.profile)
    }

    /// Ambient path: Snowpark Container Services mounts an OAuth token and
    /// injects SNOWFLAKE_HOST / SNOWFLAKE_ACCOUNT. Any missing piece means
    /// we are not hosted and the profile path applies instead.
    fn from_ambient() -> Option<Self> {
        let host = std::env::var("SNOWFLAKE_HOST").ok()?;
        let account = std::env::var("SNOWFLAKE_ACCOUNT").ok()?;
        let token = std::fs::read_to_string(AMBIENT_TOKEN_PATH).ok()?;
        let token = token.trim().to_string();
        if token.is_empty() {
            return None;
        }
        Some(Self {
            host,
            token,
            token_kind: TokenKind::Oauth,
            identity: format!("{}/container", account),
        })
    }

    /// Build a session from one named profile in a connections.toml file
    pub fn from_profile_file(path: &Path, name: &str) -> Result<Self, SessionError> {
        let profiles = load_profiles(path)?;
        let profile = profiles
            .get(name)
            .ok_or_else(|| SessionError::ProfileNotFound {
                name: name.to_string(),
                path: path.to_path_buf(),
            })?;

        let account = profile
            .account
            .as_deref()
            .ok_or(SessionError::ProfileIncomplete {
                name: name.to_string(),
                field: "account",
            })?;
        let user = profile
            .user
            .as_deref()
            .ok_or(SessionError::ProfileIncomplete {
                name: name.to_string(),
                field: "user",
            })?;
        let token = profile
            .token
            .as_deref()
            .ok_or(SessionError::UnsupportedAuth {
                name: name.to_string(),
            })?;

        let host = profile
            .host
            .clone()
            .unwrap_or_else(|| format!("{}.snowflakecomputing.com", account));

        Ok(Self {
            host,
            token: token.to_string(),
            token_kind: TokenKind::ProgrammaticAccessToken,
            identity: format!("{}/{}", account, user),
        })
    }

    /// Stable identity used as the cache key (account-qualified user)
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn statements_url(&self) -> String {
        format!("https://{}/api/v2/statements", self.host)
    }

    pub fn statement_url(&self, handle: &str) -> String {
        format!("https://{}/api/v2/statements/{}", self.host, handle)
    }

    pub fn bearer_token(&self) -> &str {
        &self.token
    }

    pub fn token_kind(&self) -> TokenKind {
        self.token_kind
    }
}

/// One entry of connections.toml. Unknown keys (database, warehouse, role)
/// are tolerated and ignored.
#[derive(Debug, Clone, Deserialize)]
struct ConnectionProfile {
    account: Option<String>,
    user: Option<String>,
    host: Option<String>,
    token: Option<String>,
}

fn load_profiles(path: &Path) -> Result<BTreeMap<String, ConnectionProfile>, SessionError> {
    if !path.exists() {
        return Err(SessionError::ConnectionsFileMissing {
            path: path.to_path_buf(),
        });
    }
    let content =
        std::fs::read_to_string(path).map_err(|source| SessionError::ConnectionsFileRead {
            path: path.to_path_buf(),
            source,
        })?;
    toml::from_str(&content).map_err(|source| SessionError::ConnectionsFileParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolve the connections.toml location: config override (with `~`
/// expansion), then $SNOWFLAKE_HOME, then ~/.snowflake/connections.toml
pub fn connections_file_path(config: &Config) -> Result<PathBuf, SessionError> {
    if let Some(ref override_path) = config.connection.connections_file {
        let expanded = shellexpand::tilde(override_path);
        return Ok(PathBuf::from(expanded.as_ref()));
    }
    if let Ok(home) = std::env::var("SNOWFLAKE_HOME") {
        return Ok(PathBuf::from(home).join("connections.toml"));
    }
    let home = dirs::home_dir().ok_or(SessionError::NoHomeDir)?;
    Ok(home.join(".snowflake").join("connections.toml"))
}

/// List profile names available in the resolved connections file, sorted.
/// Used by the init command's interactive picker.
pub fn list_profiles(config: &Config) -> Result<Vec<String>, SessionError> {
    let path = connections_file_path(config)?;
    let profiles = load_profiles(&path)?;
    Ok(profiles.keys().cloned().collect())
}
