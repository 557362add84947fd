//! Scope filter
//!
//! A candidate URL goes through eight predicates in a fixed order and the
//! first rejection wins:
//!
//! 1. excluded file extension
//! 2. exclude path patterns
//! 3. include path patterns (only when some are configured)
//! 4. directory depth
//! 5. domain (exact host, or registrable domain when following subdomains)
//! 6. protocol (HTTPS-only seeds refuse plain HTTP)
//! 7. redundant path patterns (per-pattern budgets)
//! 8. auto-redundancy (path + sorted parameter names seen too often)
//!
//! Steps 7 and 8 read shared counters. Their budgets are only consumed in
//! `CounterMode::Commit` and only when the URL is admitted, so a rejection
//! never has side effects.

use crate::core::config::ScopeConfig;
use crate::error::{compile_pattern, Result};
use crate::fingerprint::persistent_hash_parts;
use parking_lot::Mutex;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::fmt;
use url::{Host, Url};

/// Whether a scope check may spend redundancy budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterMode {
    Commit,
    ReadOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeRejection {
    ExcludedExtension,
    ExcludedPath,
    NotIncluded,
    TooDeep,
    OutOfDomain,
    Protocol,
    Redundant,
    AutoRedundant,
}

impl fmt::Display for ScopeRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            ScopeRejection::ExcludedExtension => "excluded file extension",
            ScopeRejection::ExcludedPath => "matches exclude pattern",
            ScopeRejection::NotIncluded => "matches no include pattern",
            ScopeRejection::TooDeep => "exceeds directory depth",
            ScopeRejection::OutOfDomain => "outside target domain",
            ScopeRejection::Protocol => "protocol not followed",
            ScopeRejection::Redundant => "redundant path budget exhausted",
            ScopeRejection::AutoRedundant => "auto-redundancy threshold reached",
        };
        f.write_str(reason)
    }
}

/// Per-scan counters for the redundancy rules.
#[derive(Debug, Clone, Default)]
pub struct ScopeRecord {
    redundant_remaining: Vec<usize>,
    auto_redundant: HashMap<u64, usize>,
}

pub struct Scope {
    seed_host: String,
    seed_is_ip: bool,
    seed_https: bool,
    exclude_extensions: HashSet<String>,
    exclude: Vec<Regex>,
    include: Vec<Regex>,
    depth_limit: Option<usize>,
    include_subdomains: bool,
    https_only: bool,
    redundant: Vec<(Regex, usize)>,
    auto_redundant_limit: Option<usize>,
    exclude_pages: Vec<Regex>,
    record: Mutex<ScopeRecord>,
}

impl Scope {
    pub fn new(seed: &Url, config: &ScopeConfig) -> Result<Self> {
        let seed_host = seed
            .host_str()
            .ok_or_else(|| crate::error::AuditError::config("seed URL has no host"))?
            .to_ascii_lowercase();

        let compile_all = |patterns: &[String]| -> Result<Vec<Regex>> {
            patterns.iter().map(|p| compile_pattern(p)).collect()
        };

        let mut redundant = Vec::with_capacity(config.redundant_path_patterns.len());
        for (pattern, count) in &config.redundant_path_patterns {
            redundant.push((compile_pattern(pattern)?, *count));
        }

        let record = ScopeRecord {
            redundant_remaining: redundant.iter().map(|(_, c)| *c).collect(),
            auto_redundant: HashMap::new(),
        };

        Ok(Self {
            seed_host,
            seed_is_ip: !matches!(seed.host(), Some(Host::Domain(_))),
            seed_https: seed.scheme() == "https",
            exclude_extensions: config
                .exclude_file_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            exclude: compile_all(&config.exclude_path_patterns)?,
            include: compile_all(&config.include_path_patterns)?,
            depth_limit: config.directory_depth_limit,
            include_subdomains: config.include_subdomains,
            https_only: config.https_only,
            redundant,
            auto_redundant_limit: config.auto_redundant_paths,
            exclude_pages: compile_all(&config.exclude_page_patterns)?,
            record: Mutex::new(record),
        })
    }

    pub fn in_scope(&self, url: &Url, mode: CounterMode) -> bool {
        self.check(url, mode).is_ok()
    }

    /// Page admission: spends redundancy budget when the URL gets in.
    pub fn admit(&self, url: &Url) -> bool {
        self.in_scope(url, CounterMode::Commit)
    }

    pub fn check(&self, url: &Url, mode: CounterMode) -> std::result::Result<(), ScopeRejection> {
        if self.exclude_file_extension(url) {
            return Err(ScopeRejection::ExcludedExtension);
        }
        if self.exclude_path(url) {
            return Err(ScopeRejection::ExcludedPath);
        }
        if !self.include_path(url) {
            return Err(ScopeRejection::NotIncluded);
        }
        if self.too_deep(url) {
            return Err(ScopeRejection::TooDeep);
        }
        if !self.in_domain(url) {
            return Err(ScopeRejection::OutOfDomain);
        }
        if !self.follow_protocol(url) {
            return Err(ScopeRejection::Protocol);
        }
        self.check_redundancy(url, mode)
    }

    pub fn exclude_file_extension(&self, url: &Url) -> bool {
        if self.exclude_extensions.is_empty() {
            return false;
        }
        let last = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or("");
        match last.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => {
                self.exclude_extensions.contains(&ext.to_ascii_lowercase())
            }
            _ => false,
        }
    }

    pub fn exclude_path(&self, url: &Url) -> bool {
        self.exclude.iter().any(|r| r.is_match(url.as_str()))
    }

    pub fn include_path(&self, url: &Url) -> bool {
        self.include.is_empty() || self.include.iter().any(|r| r.is_match(url.as_str()))
    }

    pub fn too_deep(&self, url: &Url) -> bool {
        match self.depth_limit {
            Some(limit) => path_depth(url) > limit,
            None => false,
        }
    }

    pub fn in_domain(&self, url: &Url) -> bool {
        let host = match url.host_str() {
            Some(h) => h.to_ascii_lowercase(),
            None => return false,
        };
        if host == self.seed_host {
            return true;
        }
        if !self.include_subdomains || self.seed_is_ip || !matches!(url.host(), Some(Host::Domain(_))) {
            return false;
        }
        registrable_domain(&host) == registrable_domain(&self.seed_host)
    }

    pub fn follow_protocol(&self, url: &Url) -> bool {
        !(self.https_only && self.seed_https && url.scheme() == "http")
    }

    pub fn page_excluded(&self, body: &str) -> bool {
        self.exclude_pages.iter().any(|r| r.is_match(body))
    }

    fn check_redundancy(&self, url: &Url, mode: CounterMode) -> std::result::Result<(), ScopeRejection> {
        let matched: Vec<usize> = self
            .redundant
            .iter()
            .enumerate()
            .filter(|(_, (r, _))| r.is_match(url.as_str()))
            .map(|(i, _)| i)
            .collect();

        let auto_key = match self.auto_redundant_limit {
            Some(_) if url.query().is_some_and(|q| !q.is_empty()) => Some(auto_redundancy_key(url)),
            _ => None,
        };

        if matched.is_empty() && auto_key.is_none() {
            return Ok(());
        }

        let mut record = self.record.lock();

        if matched.iter().any(|&i| record.redundant_remaining[i] == 0) {
            return Err(ScopeRejection::Redundant);
        }

        if let (Some(key), Some(limit)) = (auto_key, self.auto_redundant_limit) {
            if record.auto_redundant.get(&key).copied().unwrap_or(0) >= limit {
                return Err(ScopeRejection::AutoRedundant);
            }
        }

        if mode == CounterMode::Commit {
            for &i in &matched {
                record.redundant_remaining[i] -= 1;
            }
            if let Some(key) = auto_key {
                *record.auto_redundant.entry(key).or_insert(0) += 1;
            }
        }

        Ok(())
    }

    /// Remaining budget per redundant pattern, in configuration order.
    pub fn redundant_remaining(&self) -> Vec<usize> {
        self.record.lock().redundant_remaining.clone()
    }

    /// Restore counters to their configured values for a fresh scan.
    pub fn reset(&self) {
        let mut record = self.record.lock();
        record.redundant_remaining = self.redundant.iter().map(|(_, c)| *c).collect();
        record.auto_redundant.clear();
    }
}

fn path_depth(url: &Url) -> usize {
    url.path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).count())
        .unwrap_or(0)
}

fn auto_redundancy_key(url: &Url) -> u64 {
    let mut names: Vec<String> = url.query_pairs().map(|(k, _)| k.into_owned()).collect();
    names.sort();
    names.dedup();
    persistent_hash_parts([url.path().to_string(), names.join("&")])
}

// Second-level labels commonly used under country code TLDs.
const SECOND_LEVEL_LABELS: &[&str] = &["ac", "co", "com", "edu", "gov", "net", "org", "ne", "or"];

fn registrable_domain(host: &str) -> String {
    let labels: Vec<&str> = host.trim_end_matches('.').split('.').collect();
    if labels.len() <= 2 {
        return labels.join(".");
    }
    let tld = labels[labels.len() - 1];
    let second = labels[labels.len() - 2];
    let keep = if tld.len() == 2 && SECOND_LEVEL_LABELS.contains(&second) {
        3
    } else {
        2
    };
    labels[labels.len() - keep..].join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn scope(config: ScopeConfig) -> Scope {
        Scope::new(&url("http://example.com/"), &config).unwrap()
    }

    #[test]
    fn test_extension_exclusion() {
        let s = scope(ScopeConfig::default());
        assert_eq!(
            s.check(&url("http://example.com/logo.PNG"), CounterMode::ReadOnly),
            Err(ScopeRejection::ExcludedExtension)
        );
        assert!(s.in_scope(&url("http://example.com/index.php"), CounterMode::ReadOnly));
        assert!(s.in_scope(&url("http://example.com/.png"), CounterMode::ReadOnly));
    }

    #[test]
    fn test_include_patterns() {
        let s = scope(ScopeConfig {
            include_path_patterns: vec!["/shop/".into()],
            ..Default::default()
        });
        assert!(s.in_scope(&url("http://example.com/shop/cart"), CounterMode::ReadOnly));
        assert_eq!(
            s.check(&url("http://example.com/blog/"), CounterMode::ReadOnly),
            Err(ScopeRejection::NotIncluded)
        );
    }

    #[test]
    fn test_depth_limit() {
        let s = scope(ScopeConfig {
            directory_depth_limit: Some(2),
            ..Default::default()
        });
        assert!(s.in_scope(&url("http://example.com/a/b"), CounterMode::ReadOnly));
        assert_eq!(
            s.check(&url("http://example.com/a/b/c"), CounterMode::ReadOnly),
            Err(ScopeRejection::TooDeep)
        );
    }

    #[test]
    fn test_domain_rules() {
        let strict = scope(ScopeConfig::default());
        assert!(!strict.in_scope(&url("http://www.example.com/"), CounterMode::ReadOnly));
        assert!(!strict.in_scope(&url("http://other.org/"), CounterMode::ReadOnly));

        let loose = scope(ScopeConfig {
            include_subdomains: true,
            ..Default::default()
        });
        assert!(loose.in_scope(&url("http://www.example.com/"), CounterMode::ReadOnly));
        assert!(!loose.in_scope(&url("http://example.org/"), CounterMode::ReadOnly));
    }

    #[test]
    fn test_registrable_domain() {
        assert_eq!(registrable_domain("a.b.example.co.uk"), "example.co.uk");
        assert_eq!(registrable_domain("shop.example.com"), "example.com");
        assert_eq!(registrable_domain("localhost"), "localhost");
    }

    #[test]
    fn test_https_only() {
        let config = ScopeConfig {
            https_only: true,
            ..Default::default()
        };
        let s = Scope::new(&url("https://example.com/"), &config).unwrap();
        assert_eq!(
            s.check(&url("http://example.com/"), CounterMode::ReadOnly),
            Err(ScopeRejection::Protocol)
        );
        assert!(s.in_scope(&url("https://example.com/"), CounterMode::ReadOnly));

        // an HTTP seed is not restricted
        let s = Scope::new(&url("http://example.com/"), &config).unwrap();
        assert!(s.in_scope(&url("http://example.com/"), CounterMode::ReadOnly));
    }

    #[test]
    fn test_redundant_budget() {
        let mut patterns = indexmap::IndexMap::new();
        patterns.insert("calendar".to_string(), 2);
        let s = scope(ScopeConfig {
            redundant_path_patterns: patterns,
            ..Default::default()
        });

        let u = url("http://example.com/calendar?day=1");
        assert!(s.admit(&u));
        assert!(s.admit(&u));
        assert_eq!(s.check(&u, CounterMode::Commit), Err(ScopeRejection::Redundant));
        assert_eq!(s.redundant_remaining(), vec![0]);

        s.reset();
        assert_eq!(s.redundant_remaining(), vec![2]);
    }

    #[test]
    fn test_read_only_does_not_consume() {
        let mut patterns = indexmap::IndexMap::new();
        patterns.insert("calendar".to_string(), 1);
        let s = scope(ScopeConfig {
            redundant_path_patterns: patterns,
            auto_redundant_paths: Some(1),
            ..Default::default()
        });

        let u = url("http://example.com/calendar?day=1");
        for _ in 0..5 {
            assert!(s.in_scope(&u, CounterMode::ReadOnly));
        }
        assert_eq!(s.redundant_remaining(), vec![1]);
        assert!(s.admit(&u));
        assert!(!s.in_scope(&u, CounterMode::ReadOnly));
    }

    #[test]
    fn test_exclusion_short_circuits_counters() {
        let mut patterns = indexmap::IndexMap::new();
        patterns.insert("calendar".to_string(), 3);
        let s = scope(ScopeConfig {
            exclude_path_patterns: vec!["calendar/private".into()],
            redundant_path_patterns: patterns,
            ..Default::default()
        });

        let u = url("http://example.com/calendar/private?day=1");
        assert_eq!(s.check(&u, CounterMode::Commit), Err(ScopeRejection::ExcludedPath));
        assert_eq!(s.redundant_remaining(), vec![3]);
    }

    #[test]
    fn test_auto_redundancy_cap() {
        let s = scope(ScopeConfig {
            auto_redundant_paths: Some(3),
            ..Default::default()
        });

        assert!(s.admit(&url("http://example.com/x?p=1")));
        assert!(s.admit(&url("http://example.com/x?p=2")));
        assert!(s.admit(&url("http://example.com/x?p=3")));
        assert_eq!(
            s.check(&url("http://example.com/x?p=4"), CounterMode::Commit),
            Err(ScopeRejection::AutoRedundant)
        );

        // different parameter names are a different combination
        assert!(s.admit(&url("http://example.com/x?q=1")));
        // parameter order does not matter
        assert!(s.admit(&url("http://example.com/y?a=1&b=2")));
        assert!(s.admit(&url("http://example.com/y?b=1&a=2")));
        // no query, no auto-redundancy
        for _ in 0..5 {
            assert!(s.admit(&url("http://example.com/x")));
        }
    }

    #[test]
    fn test_rejected_url_spends_nothing() {
        let mut patterns = indexmap::IndexMap::new();
        patterns.insert("/x".to_string(), 10);
        let s = scope(ScopeConfig {
            redundant_path_patterns: patterns,
            auto_redundant_paths: Some(1),
            ..Default::default()
        });

        assert!(s.admit(&url("http://example.com/x?p=1")));
        assert_eq!(s.redundant_remaining(), vec![9]);
        assert!(!s.admit(&url("http://example.com/x?p=2")));
        assert_eq!(s.redundant_remaining(), vec![9]);
    }

    #[test]
    fn test_page_exclusion() {
        let s = scope(ScopeConfig {
            exclude_page_patterns: vec!["(?i)under maintenance".into()],
            ..Default::default()
        });
        assert!(s.page_excluded("<h1>Under Maintenance</h1>"));
        assert!(!s.page_excluded("<h1>Welcome</h1>"));
    }

    #[test]
    fn test_invalid_pattern_fails_fast() {
        let config = ScopeConfig {
            exclude_path_patterns: vec!["(unclosed".into()],
            ..Default::default()
        };
        let err = Scope::new(&url("http://example.com/"), &config).err().unwrap();
        assert!(err.is_configuration());
    }
}
