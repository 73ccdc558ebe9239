//! Build configuration for docloom.
//!
//! Parses `docloom.toml` with serde and provides auto-discovery of config
//! files in parent directories. Relative paths are resolved against the
//! config file's directory after parsing; validation runs last and compiles
//! every doctest filter pattern.
//!
//! The strict policy accepts either a boolean or an array of diagnostic
//! category names:
//!
//! ```toml
//! [build]
//! strict = ["doctest", "cross_references"]
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "docloom.toml";

/// Strict-gate policy: a blanket switch or an explicit category set.
///
/// Category names are plain strings here; the engine maps them onto the
/// closed diagnostic category set at build start and rejects unknown names.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum StrictPolicy {
    /// `true` gates every category, `false` gates none.
    All(bool),
    /// Gate exactly the named categories.
    Categories(Vec<String>),
}

impl Default for StrictPolicy {
    fn default() -> Self {
        Self::All(false)
    }
}

impl StrictPolicy {
    /// True if the policy can never fail a build.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        match self {
            Self::All(enabled) => !enabled,
            Self::Categories(names) => names.is_empty(),
        }
    }
}

/// Doctest stage mode.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DoctestMode {
    /// Run doctests as part of the full pipeline.
    #[default]
    Full,
    /// Run only doctest-relevant stages; mismatches are always fatal.
    Only,
    /// Rewrite recorded expectations in place instead of failing.
    Fix,
    /// Skip doctest execution entirely.
    Off,
}

/// One doctest output filter.
///
/// The pattern is applied to both expected and actual text before
/// comparison, replacing every match with `replacement`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct FilterRule {
    /// Regex pattern.
    pub pattern: String,
    /// Replacement text (empty strips the match).
    #[serde(default)]
    pub replacement: String,
}

/// Working-directory policy for code evaluation contexts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WorkdirPolicy {
    /// Derive a directory per page from the page source path.
    #[default]
    PerPage,
    /// Every context runs in one fixed directory.
    Fixed(PathBuf),
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
}

/// Resolved build configuration. One per build, read-only once handed to
/// the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    /// Discovery root for page sources.
    pub source_dir: PathBuf,
    /// Strict-gate policy.
    pub strict: StrictPolicy,
    /// Distribute per-page work over worker threads.
    pub parallel: bool,
    /// Doctest stage mode.
    pub doctest_mode: DoctestMode,
    /// Output filters, applied in order.
    pub doctest_filters: Vec<FilterRule>,
    /// Pages expanded first, in the given order (paths relative to
    /// `source_dir`).
    pub page_priority: Vec<PathBuf>,
    /// Highlight language applied to unlabeled leading code blocks.
    pub plain_block_language: Option<String>,
    /// Working-directory policy for evaluation contexts.
    pub workdir: WorkdirPolicy,
    /// Path the configuration was loaded from (set after loading).
    pub config_path: Option<PathBuf>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Raw file contents as parsed from TOML (paths as strings).
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    build: BuildSection,
    doctest: DoctestSection,
    expand: ExpandSection,
    workdir: WorkdirSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BuildSection {
    source_dir: Option<String>,
    strict: Option<StrictPolicy>,
    parallel: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DoctestSection {
    mode: Option<DoctestMode>,
    filters: Vec<FilterRule>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ExpandSection {
    page_priority: Vec<String>,
    plain_block_language: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WorkdirSection {
    policy: Option<String>,
    path: Option<String>,
}

impl BuildConfig {
    /// Load configuration.
    ///
    /// If `config_path` is provided, loads from that file. Otherwise
    /// searches for `docloom.toml` in the current directory and parents,
    /// falling back to defaults when nothing is found.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit `config_path` doesn't exist, parsing
    /// fails, or validation rejects the result.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            return Self::load_from_file(path);
        }
        match Self::discover_config() {
            Some(discovered) => Self::load_from_file(&discovered),
            None => Ok(Self::default_with_cwd()),
        }
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O, parse or validation failure.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let file: ConfigFile = toml::from_str(&content)?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        let mut config = Self::resolve(file, config_dir)?;
        config.config_path = Some(path.to_path_buf());
        config.validate()?;
        Ok(config)
    }

    /// Search for a config file in the current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Default config with paths relative to the current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Default config with paths relative to the given base directory.
    #[must_use]
    pub fn default_with_base(base: &Path) -> Self {
        Self {
            source_dir: base.join("docs"),
            strict: StrictPolicy::default(),
            parallel: true,
            doctest_mode: DoctestMode::default(),
            doctest_filters: Vec::new(),
            page_priority: Vec::new(),
            plain_block_language: None,
            workdir: WorkdirPolicy::default(),
            config_path: None,
        }
    }

    /// Resolve raw file contents against the config directory.
    fn resolve(file: ConfigFile, config_dir: &Path) -> Result<Self, ConfigError> {
        let workdir = match file.workdir.policy.as_deref() {
            None | Some("per-page") => WorkdirPolicy::PerPage,
            Some("fixed") => {
                let path = file.workdir.path.ok_or_else(|| {
                    ConfigError::Validation(
                        "workdir.policy = \"fixed\" requires workdir.path".to_owned(),
                    )
                })?;
                WorkdirPolicy::Fixed(config_dir.join(path))
            }
            Some(other) => {
                return Err(ConfigError::Validation(format!(
                    "unknown workdir.policy '{other}' (expected \"per-page\" or \"fixed\")"
                )));
            }
        };

        Ok(Self {
            source_dir: config_dir.join(file.build.source_dir.as_deref().unwrap_or("docs")),
            strict: file.build.strict.unwrap_or_default(),
            parallel: file.build.parallel.unwrap_or(true),
            doctest_mode: file.doctest.mode.unwrap_or_default(),
            doctest_filters: file.doctest.filters,
            page_priority: file.expand.page_priority.into_iter().map(PathBuf::from).collect(),
            plain_block_language: file.expand.plain_block_language,
            workdir,
            config_path: None,
        })
    }

    /// Validate configuration values.
    ///
    /// Called automatically after loading from file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if a filter pattern doesn't
    /// compile, a fixed workdir path is empty, or the highlight language is
    /// blank.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for rule in &self.doctest_filters {
            regex::Regex::new(&rule.pattern).map_err(|e| {
                ConfigError::Validation(format!(
                    "doctest.filters pattern '{}' does not compile: {e}",
                    rule.pattern
                ))
            })?;
        }

        if let WorkdirPolicy::Fixed(path) = &self.workdir
            && path.as_os_str().is_empty()
        {
            return Err(ConfigError::Validation(
                "workdir.path cannot be empty".to_owned(),
            ));
        }

        if let Some(lang) = &self.plain_block_language
            && lang.trim().is_empty()
        {
            return Err(ConfigError::Validation(
                "expand.plain_block_language cannot be blank".to_owned(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn parse(toml: &str) -> BuildConfig {
        let file: ConfigFile = toml::from_str(toml).unwrap();
        BuildConfig::resolve(file, Path::new("/project")).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = BuildConfig::default_with_base(Path::new("/test"));
        assert_eq!(config.source_dir, PathBuf::from("/test/docs"));
        assert_eq!(config.strict, StrictPolicy::All(false));
        assert!(config.parallel);
        assert_eq!(config.doctest_mode, DoctestMode::Full);
        assert_eq!(config.workdir, WorkdirPolicy::PerPage);
    }

    #[test]
    fn test_parse_minimal_config() {
        let config = parse("");
        assert_eq!(config.source_dir, PathBuf::from("/project/docs"));
        assert!(config.doctest_filters.is_empty());
    }

    #[test]
    fn test_parse_build_section() {
        let config = parse(
            r#"
[build]
source_dir = "documentation"
parallel = false
"#,
        );
        assert_eq!(config.source_dir, PathBuf::from("/project/documentation"));
        assert!(!config.parallel);
    }

    #[test]
    fn test_strict_accepts_boolean() {
        let config = parse("[build]\nstrict = true");
        assert_eq!(config.strict, StrictPolicy::All(true));
        assert!(!config.strict.is_disabled());
    }

    #[test]
    fn test_strict_accepts_category_list() {
        let config = parse(r#"[build]
strict = ["doctest", "cross_references"]"#);
        assert_eq!(
            config.strict,
            StrictPolicy::Categories(vec![
                "doctest".to_owned(),
                "cross_references".to_owned()
            ])
        );
    }

    #[test]
    fn test_strict_empty_list_is_disabled() {
        let config = parse("[build]\nstrict = []");
        assert!(config.strict.is_disabled());
    }

    #[test]
    fn test_parse_doctest_section() {
        let config = parse(
            r#"
[doctest]
mode = "fix"
filters = [
    { pattern = '0x[0-9a-f]+', replacement = "0xADDR" },
    { pattern = 'elapsed .*' },
]
"#,
        );
        assert_eq!(config.doctest_mode, DoctestMode::Fix);
        assert_eq!(config.doctest_filters.len(), 2);
        assert_eq!(config.doctest_filters[0].replacement, "0xADDR");
        assert_eq!(config.doctest_filters[1].replacement, "");
    }

    #[test]
    fn test_parse_expand_section() {
        let config = parse(
            r#"
[expand]
page_priority = ["index.md", "guide.md"]
plain_block_language = "text"
"#,
        );
        assert_eq!(
            config.page_priority,
            vec![PathBuf::from("index.md"), PathBuf::from("guide.md")]
        );
        assert_eq!(config.plain_block_language.as_deref(), Some("text"));
    }

    #[test]
    fn test_workdir_fixed_resolves_path() {
        let config = parse(
            r#"
[workdir]
policy = "fixed"
path = "work"
"#,
        );
        assert_eq!(
            config.workdir,
            WorkdirPolicy::Fixed(PathBuf::from("/project/work"))
        );
    }

    #[test]
    fn test_workdir_fixed_requires_path() {
        let file: ConfigFile = toml::from_str("[workdir]\npolicy = \"fixed\"").unwrap();
        let err = BuildConfig::resolve(file, Path::new("/project")).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("workdir.path"));
    }

    #[test]
    fn test_workdir_unknown_policy_rejected() {
        let file: ConfigFile = toml::from_str("[workdir]\npolicy = \"shared\"").unwrap();
        let err = BuildConfig::resolve(file, Path::new("/project")).unwrap_err();
        assert!(err.to_string().contains("shared"));
    }

    #[test]
    fn test_validate_rejects_bad_filter_pattern() {
        let mut config = BuildConfig::default_with_base(Path::new("/test"));
        config.doctest_filters.push(FilterRule {
            pattern: "(unclosed".to_owned(),
            replacement: String::new(),
        });
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("(unclosed"));
    }

    #[test]
    fn test_validate_rejects_blank_language() {
        let mut config = BuildConfig::default_with_base(Path::new("/test"));
        config.plain_block_language = Some("  ".to_owned());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_default_passes() {
        assert!(BuildConfig::default_with_base(Path::new("/test")).validate().is_ok());
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let err = BuildConfig::load(Some(Path::new("/nonexistent/docloom.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }
}
