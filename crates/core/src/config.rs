use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TracelensError};

/// Process-wide settings, built once at startup and shared read-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub http_addr: String,
    pub prom_url: String,
    pub vlogs_url: String,
    pub ch_url: String,
    pub ch_user: String,
    pub ch_password: Option<String>,
    pub ch_database: String,
    pub upstream_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0:8080".to_string(),
            prom_url: "http://localhost:9090".to_string(),
            vlogs_url: "http://localhost:9428".to_string(),
            ch_url: "http://localhost:8123".to_string(),
            ch_user: "default".to_string(),
            ch_password: None,
            ch_database: "default".to_string(),
            upstream_timeout: Duration::from_secs(20),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut cfg = Self::default();
        let config_path = config_file_path();
        if let Some(file_overrides) = load_file_overrides(&config_path)? {
            apply_overrides(&mut cfg, file_overrides, "config file")?;
        }
        let env_overrides = load_env_overrides();
        apply_overrides(&mut cfg, env_overrides, "environment")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("ch_url", &self.ch_url),
            ("prom_url", &self.prom_url),
            ("vlogs_url", &self.vlogs_url),
        ] {
            if !(value.starts_with("http://") || value.starts_with("https://")) {
                return Err(TracelensError::Config(format!(
                    "{name} must be an http(s) URL (value={value})"
                )));
            }
        }
        if !is_identifier(&self.ch_database) {
            return Err(TracelensError::Config(format!(
                "ch_database must be a plain identifier (value={})",
                self.ch_database
            )));
        }
        if self.upstream_timeout.is_zero() {
            return Err(TracelensError::Config(
                "upstream_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Listen address with the `:8080` shorthand expanded to all interfaces.
    pub fn listen_addr(&self) -> String {
        if self.http_addr.starts_with(':') {
            format!("0.0.0.0{}", self.http_addr)
        } else {
            self.http_addr.clone()
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigOverrides {
    http_addr: Option<String>,
    prom_url: Option<String>,
    vlogs_url: Option<String>,
    ch_url: Option<String>,
    ch_user: Option<String>,
    ch_password: Option<String>,
    ch_database: Option<String>,
    upstream_timeout: Option<String>,
}

fn config_file_path() -> PathBuf {
    if let Ok(path) = env::var("TRACELENS_CONFIG") {
        return PathBuf::from(path);
    }

    let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let config_home = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(home).join(".config"));
    config_home.join("tracelens/config.toml")
}

fn load_file_overrides(path: &Path) -> Result<Option<ConfigOverrides>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| TracelensError::Config(format!("failed reading {}: {e}", path.display())))?;
    let parsed: ConfigOverrides = toml::from_str(&raw)
        .map_err(|e| TracelensError::Config(format!("failed parsing {}: {e}", path.display())))?;
    Ok(Some(parsed))
}

// Empty variables count as unset, matching how the deployment manifests blank them out.
fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn load_env_overrides() -> ConfigOverrides {
    ConfigOverrides {
        http_addr: non_empty_var("HTTP_ADDR"),
        prom_url: non_empty_var("PROM_URL"),
        vlogs_url: non_empty_var("VLOGS_URL"),
        ch_url: non_empty_var("CH_HTTP_URL"),
        ch_user: non_empty_var("CH_USER"),
        ch_password: non_empty_var("CH_PASS"),
        ch_database: non_empty_var("CH_DATABASE"),
        upstream_timeout: non_empty_var("TRACELENS_UPSTREAM_TIMEOUT"),
    }
}

fn apply_overrides(cfg: &mut Config, overrides: ConfigOverrides, source: &str) -> Result<()> {
    if let Some(v) = overrides.http_addr {
        cfg.http_addr = v;
    }
    if let Some(v) = overrides.prom_url {
        cfg.prom_url = trim_url(v);
    }
    if let Some(v) = overrides.vlogs_url {
        cfg.vlogs_url = trim_url(v);
    }
    if let Some(v) = overrides.ch_url {
        cfg.ch_url = trim_url(v);
    }
    if let Some(v) = overrides.ch_user {
        cfg.ch_user = v;
    }
    if let Some(v) = overrides.ch_password {
        cfg.ch_password = Some(v);
    }
    if let Some(v) = overrides.ch_database {
        cfg.ch_database = v;
    }
    if let Some(v) = overrides.upstream_timeout {
        cfg.upstream_timeout = humantime::parse_duration(&v).map_err(|e| {
            TracelensError::Config(format!("bad upstream_timeout in {source}: {e} (value={v})"))
        })?;
    }
    Ok(())
}

fn trim_url(v: String) -> String {
    v.trim_end_matches('/').to_string()
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
