//! Configuration schema (ddlcompare.toml)

use serde::{Deserialize, Serialize};

/// Type equivalence mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeMatching {
    /// Same family, identical dimensions when both bounded
    Strict,

    /// Same coarse type class only
    Family,
}

impl Default for TypeMatching {
    fn default() -> Self {
        Self::Strict
    }
}

/// Run-level settings for the batch orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Number of concurrent workers
    pub workers: usize,

    /// Timeout for every connect/fetch/list call (milliseconds)
    pub timeout_ms: u64,

    /// Retry connection errors once before failing the object
    pub retry_connection: bool,

    /// Delay before the retry (milliseconds)
    pub retry_backoff_ms: u64,

    /// Number of mismatches listed in a row comment
    pub comment_limit: usize,

    /// Maximum dependency depth in extraction mode
    pub dependency_depth: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            timeout_ms: 30_000,
            retry_connection: true,
            retry_backoff_ms: 500,
            comment_limit: 5,
            dependency_depth: 10,
        }
    }
}

/// Comparator settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareConfig {
    /// Strict or family-only type matching
    pub type_matching: TypeMatching,

    /// Compare normalized view bodies, not just presence
    pub compare_view_bodies: bool,

    /// Skip the collation dimension
    pub ignore_collation: bool,
}

/// Rewrite applied to default expressions before comparing them
///
/// `pattern` is a regular expression matched against the normalized
/// (lower-cased) expression; `replacement` may use `$1`-style groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultRule {
    pub pattern: String,
    pub replacement: String,
}

/// Allowlist rules for specific objects or patterns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllowlistRules {
    /// Objects dropped from the worklist (glob patterns)
    #[serde(default)]
    pub skip_objects: Vec<String>,

    /// Objects whose default expressions are not compared (glob patterns)
    #[serde(default)]
    pub ignore_defaults: Vec<String>,
}

impl AllowlistRules {
    /// Check if an object matches any pattern in the list
    fn matches_pattern(object: &str, patterns: &[String]) -> bool {
        patterns.iter().any(|pattern| {
            if pattern.contains('*') {
                glob_match(pattern, object)
            } else {
                pattern == object
            }
        })
    }

    /// Check if an object should be skipped
    pub fn is_object_skipped(&self, object: &str) -> bool {
        Self::matches_pattern(object, &self.skip_objects)
    }

    /// Check if default expressions are ignored for an object
    pub fn are_defaults_ignored(&self, object: &str) -> bool {
        Self::matches_pattern(object, &self.ignore_defaults)
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Extra regexes marking a differing default pair as ambiguous
    #[serde(default)]
    pub ambiguous_defaults: Vec<String>,

    /// Batch settings
    #[serde(default)]
    pub run: RunConfig,

    /// Comparator settings
    #[serde(default)]
    pub compare: CompareConfig,

    /// Default-expression rewrite rules, applied in order
    #[serde(default)]
    pub default_rules: Vec<DefaultRule>,

    /// Allowlist rules
    #[serde(default)]
    pub allowlist: AllowlistRules,
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Self::from_toml(&contents)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }
}

/// Simple glob matching (supports a single * wildcard)
fn glob_match(pattern: &str, text: &str) -> bool {
    if pattern == "*" || pattern == "**" {
        return true;
    }

    if let Some(star_pos) = pattern.find('*') {
        let prefix = &pattern[..star_pos];
        let suffix = &pattern[star_pos + 1..];

        text.len() >= prefix.len() + suffix.len() && text.starts_with(prefix) && text.ends_with(suffix)
    } else {
        pattern == text
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.run.workers, 10);
        assert_eq!(config.compare.type_matching, TypeMatching::Strict);
        assert!(config.default_rules.is_empty());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [run]
            workers = 4

            [compare]
            type_matching = "family"

            [[default_rules]]
            pattern = "^nvl\\((.*)\\)$"
            replacement = "coalesce($1)"
            "#,
        )
        .unwrap();

        assert_eq!(config.run.workers, 4);
        assert_eq!(config.run.timeout_ms, 30_000);
        assert_eq!(config.compare.type_matching, TypeMatching::Family);
        assert_eq!(config.default_rules.len(), 1);
    }

    #[test]
    fn allowlist_pattern_matching() {
        let rules = AllowlistRules {
            skip_objects: vec!["staging.*".to_string()],
            ignore_defaults: vec!["sales.audit_log".to_string()],
        };

        assert!(rules.is_object_skipped("staging.users"));
        assert!(!rules.is_object_skipped("prod.users"));
        assert!(rules.are_defaults_ignored("sales.audit_log"));
        assert!(!rules.are_defaults_ignored("sales.orders"));
    }

    #[test]
    fn config_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ddlcompare.toml");

        let mut config = Config::default();
        config.run.workers = 3;
        config.ambiguous_defaults.push("sysdate".to_string());
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let err = Config::from_toml("[run\nworkers = 2").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn glob_matching() {
        assert!(glob_match("*", "anything"));
        assert!(glob_match("staging.*", "staging.users"));
        assert!(glob_match("*.orders", "sales.orders"));
        assert!(!glob_match("staging.*", "prod.users"));
        assert!(!glob_match("ab*ba", "aba"));
    }
}
