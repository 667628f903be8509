// src/config/app.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::{env, fs};

use crate::store::DEFAULT_NAMESPACE;

pub const ENV_CONFIG_PATH: &str = "CIRRHOSIS_CONFIG_PATH";

fn default_app_id() -> String {
    "default-app-id".to_string()
}
fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}
fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}
fn default_latency_ms() -> u64 {
    2000
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application id, part of every storage scope path.
    #[serde(default = "default_app_id")]
    pub app_id: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Simulated model latency per prediction.
    #[serde(default = "default_latency_ms")]
    pub latency_ms: u64,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    /// Expose `/metrics` (Prometheus).
    #[serde(default = "default_true")]
    pub metrics: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoreConfig {
    #[default]
    Memory,
    File {
        dir: PathBuf,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Identity to start signed in as (e.g. handed over by a host page).
    #[serde(default)]
    pub initial_identity: Option<String>,
    /// When false, anonymous sign-in fails and the session runs degraded.
    #[serde(default = "default_true")]
    pub allow_anonymous: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            initial_identity: None,
            allow_anonymous: true,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_id: default_app_id(),
            namespace: default_namespace(),
            bind_addr: default_bind_addr(),
            latency_ms: default_latency_ms(),
            store: StoreConfig::default(),
            auth: AuthConfig::default(),
            metrics: true,
        }
    }
}

impl AppConfig {
    /// Load from an explicit path. TOML or JSON, chosen by extension.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let mut cfg: AppConfig = match ext.as_str() {
            "json" => serde_json::from_str(&data)
                .with_context(|| format!("parsing JSON config {}", path.display()))?,
            _ => toml::from_str(&data)
                .with_context(|| format!("parsing TOML config {}", path.display()))?,
        };
        cfg.sanitize();
        Ok(cfg)
    }

    /// Resolve config using env var + fallbacks, then apply env overrides:
    /// 1) $CIRRHOSIS_CONFIG_PATH
    /// 2) config/app.toml
    /// 3) config/app.json
    /// 4) built-in defaults
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{} points to non-existent path", ENV_CONFIG_PATH));
            }
            Self::load_from_file(&pb)?
        } else if Path::new("config/app.toml").exists() {
            Self::load_from_file("config/app.toml")?
        } else if Path::new("config/app.json").exists() {
            Self::load_from_file("config/app.json")?
        } else {
            Self::default()
        };
        cfg.apply_env_overrides()?;
        Ok(cfg)
    }

    /// `APP_ID`, `BIND_ADDR`, `PREDICT_LATENCY_MS`, `STORE_DIR`, `INITIAL_AUTH_IDENTITY`.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(v) = env::var("APP_ID") {
            self.app_id = v;
        }
        if let Ok(v) = env::var("BIND_ADDR") {
            self.bind_addr = v;
        }
        if let Ok(v) = env::var("PREDICT_LATENCY_MS") {
            self.latency_ms = v
                .trim()
                .parse()
                .with_context(|| format!("PREDICT_LATENCY_MS is not a number: {v:?}"))?;
        }
        if let Ok(v) = env::var("STORE_DIR") {
            self.store = StoreConfig::File { dir: v.into() };
        }
        if let Ok(v) = env::var("INITIAL_AUTH_IDENTITY") {
            self.auth.initial_identity = Some(v);
        }
        self.sanitize();
        Ok(())
    }

    fn sanitize(&mut self) {
        self.app_id = self.app_id.trim().to_string();
        if self.app_id.is_empty() || self.app_id.contains('/') {
            self.app_id = default_app_id();
        }
        self.namespace = self.namespace.trim().trim_matches('/').to_string();
        if self.namespace.is_empty() {
            self.namespace = default_namespace();
        }
        // Blank identity behaves like "not signed in".
        if let Some(id) = &self.auth.initial_identity {
            if id.trim().is_empty() {
                self.auth.initial_identity = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let cfg: AppConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.latency_ms, 2000);
        assert_eq!(cfg.store, StoreConfig::Memory);
        assert!(cfg.auth.allow_anonymous);
    }

    #[test]
    fn toml_file_store_and_auth() {
        let src = r#"
            app_id = "liver-app"
            latency_ms = 0

            [store]
            kind = "file"
            dir = "data"

            [auth]
            allow_anonymous = false
        "#;
        let cfg: AppConfig = toml::from_str(src).unwrap();
        assert_eq!(cfg.app_id, "liver-app");
        assert_eq!(
            cfg.store,
            StoreConfig::File {
                dir: PathBuf::from("data")
            }
        );
        assert!(!cfg.auth.allow_anonymous);
    }

    #[test]
    fn json_file_is_loaded_by_extension() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("app.json");
        fs::write(&p, r#"{"app_id":"  ","namespace":"/sandbox/","metrics":false}"#).unwrap();
        let cfg = AppConfig::load_from_file(&p).unwrap();
        assert_eq!(cfg.app_id, "default-app-id");
        assert_eq!(cfg.namespace, "sandbox");
        assert!(!cfg.metrics);
    }

    #[serial_test::serial]
    #[test]
    fn env_overrides_win() {
        env::set_var("PREDICT_LATENCY_MS", "15");
        env::set_var("STORE_DIR", "/var/lib/predictions");
        env::set_var("INITIAL_AUTH_IDENTITY", "host-user");

        let mut cfg = AppConfig::default();
        cfg.apply_env_overrides().unwrap();

        env::remove_var("PREDICT_LATENCY_MS");
        env::remove_var("STORE_DIR");
        env::remove_var("INITIAL_AUTH_IDENTITY");

        assert_eq!(cfg.latency_ms, 15);
        assert_eq!(
            cfg.store,
            StoreConfig::File {
                dir: PathBuf::from("/var/lib/predictions")
            }
        );
        assert_eq!(cfg.auth.initial_identity.as_deref(), Some("host-user"));
    }

    #[serial_test::serial]
    #[test]
    fn bad_latency_override_is_an_error() {
        env::set_var("PREDICT_LATENCY_MS", "soon");
        let mut cfg = AppConfig::default();
        let res = cfg.apply_env_overrides();
        env::remove_var("PREDICT_LATENCY_MS");
        assert!(res.is_err());
    }
}
