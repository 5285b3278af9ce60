use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use custody_types::Identity;
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// Server configuration.
///
/// Sources, lowest precedence first: built-in defaults, an optional TOML
/// file, environment variables (`PORT`, `CUSTODY_BIND`, `CUSTODY_OWNER`,
/// `CUSTODY_SNAPSHOT`), then command-line flags applied by the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Authorized writer for a new ledger. When a snapshot is loaded it must
    /// match the snapshot's owner, if set.
    pub owner: Option<Identity>,
    pub auth: AuthConfig,
    /// Loaded at startup if present, written on graceful shutdown.
    pub snapshot_path: Option<PathBuf>,
    pub event_channel_capacity: usize,
}

/// How request callers are identified.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AuthConfig {
    /// Every request acts as the ledger owner.
    #[default]
    Operator,
    /// Bearer tokens mapped to identities.
    Tokens { tokens: HashMap<String, Identity> },
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            owner: None,
            auth: AuthConfig::Operator,
            snapshot_path: None,
            event_channel_capacity: 1024,
        }
    }
}

impl ServerConfig {
    pub fn from_toml_str(s: &str) -> ServerResult<Self> {
        toml::from_str(s).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Defaults, overlaid by `path` when given, overlaid by the process
    /// environment.
    pub fn load(path: Option<&Path>) -> ServerResult<Self> {
        Self::load_from(path, |key| std::env::var(key).ok())
    }

    /// [`load`](Self::load) with environment lookups supplied by the caller.
    pub fn load_from<F>(path: Option<&Path>, lookup: F) -> ServerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    ServerError::Config(format!("cannot read {}: {e}", path.display()))
                })?;
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        config.with_env(lookup)
    }

    /// Apply environment overrides read through `lookup`.
    pub fn with_env<F>(mut self, lookup: F) -> ServerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("CUSTODY_BIND") {
            self.bind_addr = bind
                .parse()
                .map_err(|e| ServerError::Config(format!("CUSTODY_BIND={bind}: {e}")))?;
        }
        if let Some(port) = lookup("PORT") {
            let port = port
                .parse()
                .map_err(|e| ServerError::Config(format!("PORT={port}: {e}")))?;
            self.bind_addr.set_port(port);
        }
        if let Some(owner) = lookup("CUSTODY_OWNER") {
            self.owner = Some(
                owner
                    .parse()
                    .map_err(|e| ServerError::Config(format!("CUSTODY_OWNER: {e}")))?,
            );
        }
        if let Some(path) = lookup("CUSTODY_SNAPSHOT") {
            self.snapshot_path = Some(PathBuf::from(path));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn default_config() {
        let c = ServerConfig::default();
        assert_eq!(c.bind_addr, "127.0.0.1:3000".parse::<SocketAddr>().unwrap());
        assert_eq!(c.auth, AuthConfig::Operator);
        assert_eq!(c.event_channel_capacity, 1024);
        assert!(c.owner.is_none());
        assert!(c.snapshot_path.is_none());
    }

    #[test]
    fn toml_overrides_defaults() {
        let owner = format!("0x{}", "ab".repeat(20));
        let c = ServerConfig::from_toml_str(&format!(
            r#"
            bind_addr = "0.0.0.0:8080"
            owner = "{owner}"
            snapshot_path = "/var/lib/custody/ledger.json"

            [auth]
            mode = "tokens"
            [auth.tokens]
            secret = "{owner}"
            "#
        ))
        .unwrap();

        assert_eq!(c.bind_addr.port(), 8080);
        assert_eq!(c.owner, Some(owner.parse().unwrap()));
        assert_eq!(c.event_channel_capacity, 1024);
        match c.auth {
            AuthConfig::Tokens { tokens } => assert!(tokens.contains_key("secret")),
            other => panic!("unexpected auth config {other:?}"),
        }
    }

    #[test]
    fn bad_owner_is_a_config_error() {
        let err = ServerConfig::from_toml_str(r#"owner = "nope""#).unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }

    #[test]
    fn env_overrides_file() {
        let owner = format!("0x{}", "cd".repeat(20));
        let c = ServerConfig::default()
            .with_env(env(&[
                ("CUSTODY_BIND", "0.0.0.0:9000"),
                ("PORT", "4000"),
                ("CUSTODY_OWNER", owner.as_str()),
                ("CUSTODY_SNAPSHOT", "ledger.json"),
            ]))
            .unwrap();
        assert_eq!(c.bind_addr, "0.0.0.0:4000".parse::<SocketAddr>().unwrap());
        assert_eq!(c.owner.unwrap().to_hex(), owner);
        assert_eq!(c.snapshot_path, Some(PathBuf::from("ledger.json")));
    }

    #[test]
    fn bad_port_is_rejected() {
        let err = ServerConfig::default()
            .with_env(env(&[("PORT", "eighty")]))
            .unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custody.toml");
        std::fs::write(&path, "event_channel_capacity = 16\n").unwrap();
        let c = ServerConfig::load_from(Some(&path), |_| None).unwrap();
        assert_eq!(c.event_channel_capacity, 16);

        let missing =
            ServerConfig::load_from(Some(&dir.path().join("absent.toml")), |_| None).unwrap_err();
        assert!(matches!(missing, ServerError::Config(_)));
    }
}
