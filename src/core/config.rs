//! Scan configuration
//!
//! Everything here is plain data: loaded from TOML, overlaid by CLI flags, and
//! compiled into live structures (`Scope`, `HttpClient`, the coverage set) by
//! `ScanContext::new`.

use crate::lookup::EvictionPolicy;
use crate::validation::timing::TimingOptions;
use crate::validation::verdict::RdiffThresholds;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub scope: ScopeConfig,
    pub http: HttpConfig,
    pub audit: AuditConfig,
}

impl ScanConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;

        let config: ScanConfig =
            toml::from_str(&contents).with_context(|| "Failed to parse configuration file")?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Inputs to the scope filter. Path patterns are regexes matched against the full URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    pub exclude_file_extensions: Vec<String>,
    pub exclude_path_patterns: Vec<String>,
    pub include_path_patterns: Vec<String>,
    pub directory_depth_limit: Option<usize>,
    pub include_subdomains: bool,
    pub https_only: bool,
    /// pattern -> how many matching URLs may still pass
    pub redundant_path_patterns: IndexMap<String, usize>,
    /// how many times a (path, parameter names) combination may pass
    pub auto_redundant_paths: Option<usize>,
    /// pages whose body matches any of these are not audited
    pub exclude_page_patterns: Vec<String>,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            exclude_file_extensions: [
                "jpg", "jpeg", "png", "gif", "ico", "svg", "webp", "css", "woff", "woff2", "ttf",
                "eot", "pdf", "zip", "gz", "tar", "mp3", "mp4", "avi", "mov",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            exclude_path_patterns: Vec::new(),
            include_path_patterns: Vec::new(),
            directory_depth_limit: None,
            include_subdomains: false,
            https_only: false,
            redundant_path_patterns: IndexMap::new(),
            auto_redundant_paths: None,
            exclude_page_patterns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub max_concurrency: usize,
    /// 0 disables pacing
    pub requests_per_second: u32,
    pub timeout_ms: u64,
    pub user_agent: String,
    pub headers: HashMap<String, String>,
    pub cookies: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 20,
            requests_per_second: 0,
            timeout_ms: 10_000,
            user_agent: format!("gauntlet/{}", env!("CARGO_PKG_VERSION")),
            headers: HashMap::new(),
            cookies: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageConfig {
    /// `None` keeps an exact set, `Some(n)` a best-effort cache of n entries
    pub capacity: Option<usize>,
    pub eviction: EvictionPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub coverage: CoverageConfig,
    pub timing: TimingOptions,
    pub rdiff: RdiffThresholds,
    /// request headers turned into Header elements, with the value to start from
    pub audit_headers: IndexMap<String, String>,
    /// regexes with named groups; matching links become LinkTemplate elements
    pub link_templates: Vec<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        let mut audit_headers = IndexMap::new();
        audit_headers.insert("User-Agent".to_string(), HttpConfig::default().user_agent);
        audit_headers.insert("Referer".to_string(), String::new());

        Self {
            coverage: CoverageConfig::default(),
            timing: TimingOptions::default(),
            rdiff: RdiffThresholds::default(),
            audit_headers,
            link_templates: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ScanConfig = toml::from_str(
            r#"
            [scope]
            auto_redundant_paths = 3
            exclude_path_patterns = ["logout"]

            [scope.redundant_path_patterns]
            "calendar" = 5

            [http]
            max_concurrency = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.scope.auto_redundant_paths, Some(3));
        assert_eq!(config.scope.redundant_path_patterns.get("calendar"), Some(&5));
        assert_eq!(config.http.max_concurrency, 4);
        assert_eq!(config.http.timeout_ms, 10_000);
        assert!(config.scope.exclude_file_extensions.contains(&"png".to_string()));
        assert!(config.audit.coverage.capacity.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[audit.coverage]\ncapacity = 1000\neviction = \"lru\"").unwrap();

        let config = ScanConfig::load(file.path()).unwrap();
        assert_eq!(config.audit.coverage.capacity, Some(1000));
        assert_eq!(config.audit.coverage.eviction, EvictionPolicy::Lru);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(ScanConfig::load("/nonexistent/gauntlet.toml").is_err());
    }

    #[test]
    fn test_round_trip_toml() {
        let config = ScanConfig::default();
        let text = config.to_toml().unwrap();
        let parsed: ScanConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.http.max_concurrency, config.http.max_concurrency);
    }
}
