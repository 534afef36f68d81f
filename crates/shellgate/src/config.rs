//! Shell configuration with deployment defaults.
//!
//! [`ShellConfig`] gathers the collaborator endpoints, the gate's bypass
//! list, the persisted chrome cache location and the routing constants.
//! Every field has a default, so an empty (or missing) TOML file yields a
//! working configuration pointed at a backend on `http://localhost`.
//!
//! ```toml
//! login_path = "/login"
//! home_content_key = "home/index_for_all"
//!
//! [backend]
//! base_url = "http://api.internal"
//! timeout_secs = 10
//!
//! [backend.tenants."agrovid.example.com"]
//! api_base_url = "http://agrovid-api.internal"
//!
//! [cache]
//! dir = "/var/lib/shellgate"
//!
//! [[gate.bypass]]
//! prefix = "/assets"
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::gate::BypassRule;

/// Environment variable overriding [`BackendConfig::base_url`].
pub const API_BASE_URL_ENV: &str = "SHELLGATE_API_BASE_URL";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Route that starts a session. Default: `"/login"`.
    pub login_path: String,
    /// Content key requested for the root path. Default: `"home/index_for_all"`.
    pub home_content_key: String,
    pub backend: BackendConfig,
    pub gate: GateConfig,
    pub cache: CacheConfig,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            login_path: crate::LOGIN_PATH.to_string(),
            home_content_key: crate::DEFAULT_HOME_KEY.to_string(),
            backend: BackendConfig::default(),
            gate: GateConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl ShellConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    ///
    /// The [`API_BASE_URL_ENV`] variable, when set, overrides the default
    /// backend base URL after the file is read.
    pub fn load(path: &Path) -> Result<Self, String> {
        let config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;
            Self::from_toml(&content)?
        } else {
            debug!("No config file at {}, using defaults", path.display());
            Self::default()
        };
        Ok(match std::env::var(API_BASE_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => config.with_base_url(url.trim()),
            _ => config,
        })
    }

    /// Parse a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| format!("Failed to parse config: {e}"))
    }

    /// Replace the default backend base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.backend.base_url = url.into();
        self
    }
}

/// Collaborator endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL used when the request host has no tenant override.
    pub base_url: String,
    /// Session-validation endpoint path.
    pub validate_path: String,
    /// Template (chrome) endpoint path.
    pub template_path: String,
    /// Prefix under which content keys are resolved.
    pub content_prefix: String,
    /// Credential submission endpoint path.
    pub authenticate_path: String,
    /// Per-request timeout in seconds. Default: `15`.
    pub timeout_secs: u64,
    /// Per-hostname API overrides.
    pub tenants: HashMap<String, TenantOverride>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost".to_string(),
            validate_path: "/xcctechpeople/xcc/system/users/validate_session_public".to_string(),
            template_path: "/xcctechpeople/tools/sandbox/template_public".to_string(),
            content_prefix: "/xcctechpeople/xcc".to_string(),
            authenticate_path: "/xcctechpeople/xcc/system/users/authenticate_public".to_string(),
            timeout_secs: 15,
            tenants: HashMap::new(),
        }
    }
}

/// Settings for a single tenant hostname.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantOverride {
    pub api_base_url: String,
}

impl BackendConfig {
    /// Base URL for a request host (`"agrovid.example.com:8080"` or bare).
    pub fn base_url_for(&self, host: Option<&str>) -> &str {
        host.map(strip_port)
            .and_then(|h| self.tenants.get(h))
            .map(|t| t.api_base_url.as_str())
            .unwrap_or(&self.base_url)
    }

    pub fn validate_url(&self, host: Option<&str>) -> String {
        join_url(self.base_url_for(host), &self.validate_path)
    }

    pub fn template_url(&self, host: Option<&str>) -> String {
        join_url(self.base_url_for(host), &self.template_path)
    }

    pub fn authenticate_url(&self, host: Option<&str>) -> String {
        join_url(self.base_url_for(host), &self.authenticate_path)
    }

    /// URL for a content key such as `"reports"` or `"home/index_for_all"`.
    pub fn content_url(&self, host: Option<&str>, key: &str) -> String {
        let prefix = join_url(self.base_url_for(host), &self.content_prefix);
        join_url(&prefix, key)
    }
}

/// Session gate settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub bypass: Vec<BypassRule>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            bypass: BypassRule::defaults(),
        }
    }
}

/// Persisted chrome cache location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding `template_data.json`. `None` keeps the cache in memory.
    pub dir: Option<PathBuf>,
}

fn strip_port(host: &str) -> &str {
    match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => {
            name
        }
        _ => host,
    }
}

fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_localhost() {
        let config = ShellConfig::default();
        assert_eq!(config.login_path, "/login");
        assert_eq!(config.home_content_key, "home/index_for_all");
        assert_eq!(
            config.backend.validate_url(None),
            "http://localhost/xcctechpeople/xcc/system/users/validate_session_public"
        );
        assert_eq!(
            config.backend.content_url(None, "reports"),
            "http://localhost/xcctechpeople/xcc/reports"
        );
        assert!(config.cache.dir.is_none());
        assert!(!config.gate.bypass.is_empty());
    }

    #[test]
    fn tenant_override_selected_by_host() {
        let config = ShellConfig::from_toml(
            r#"
            [backend]
            base_url = "http://default.internal"

            [backend.tenants."agrovid.example.com"]
            api_base_url = "http://agrovid.internal/"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.backend.base_url_for(Some("agrovid.example.com:8443")),
            "http://agrovid.internal/"
        );
        assert_eq!(
            config.backend.template_url(Some("agrovid.example.com")),
            "http://agrovid.internal/xcctechpeople/tools/sandbox/template_public"
        );
        assert_eq!(
            config.backend.base_url_for(Some("other.example.com")),
            "http://default.internal"
        );
        assert_eq!(config.backend.base_url_for(None), "http://default.internal");
    }

    #[test]
    fn empty_toml_is_default() {
        let config = ShellConfig::from_toml("").unwrap();
        assert_eq!(config.backend.timeout_secs, 15);
        assert_eq!(config.gate.bypass.len(), BypassRule::defaults().len());
    }

    #[test]
    fn bypass_rules_from_toml() {
        let config = ShellConfig::from_toml(
            r#"
            [[gate.bypass]]
            prefix = "/static"

            [[gate.bypass]]
            suffix = "/login"

            [[gate.bypass]]
            prefix_from_referer = { prefix = "/_server", referer_contains = "/login" }
            "#,
        )
        .unwrap();
        assert_eq!(config.gate.bypass.len(), 3);
        assert_eq!(config.gate.bypass[0], BypassRule::Prefix("/static".into()));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ShellConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.login_path, "/login");
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shell.toml");
        std::fs::write(&path, "home_content_key = \"home_public\"\n").unwrap();
        let config = ShellConfig::load(&path).unwrap();
        assert_eq!(config.home_content_key, "home_public");
    }

    #[test]
    fn invalid_toml_is_reported() {
        let err = ShellConfig::from_toml("login_path = [").unwrap_err();
        assert!(err.contains("Failed to parse config"));
    }

    #[test]
    fn url_joining_normalizes_slashes() {
        assert_eq!(join_url("http://a/", "/b"), "http://a/b");
        assert_eq!(join_url("http://a", "b/c"), "http://a/b/c");
        assert_eq!(join_url("http://a/", ""), "http://a");
    }
}
