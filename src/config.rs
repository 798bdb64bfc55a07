use crate::cli::{Cli, OutputFormat, VerbosityLevel};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Trait for abstracting environment variable access
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable error: {0}")]
    Environment(String),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// File names searched for, in order, in each configuration directory
pub const CONFIG_FILE_NAMES: [&str; 4] = [
    "validate-openapi.toml",
    "validate-openapi.json",
    ".validate-openapi.toml",
    ".validate-openapi.json",
];

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub checks: ChecksConfig,
    pub revision: RevisionConfig,
    pub rules: RulesConfig,
    pub output: OutputConfig,
}

impl Config {
    /// The breaking-change check runs only with a base revision to compare against
    pub fn breaking_changes_enabled(&self) -> bool {
        self.checks.breaking_changes && self.revision.base.is_some()
    }

    /// Path of the document inside the repository, defaulting to the path given
    pub fn spec_path_or(&self, spec: &Path) -> String {
        self.revision
            .spec_path
            .clone()
            .unwrap_or_else(|| spec.to_string_lossy().into_owned())
    }
}

/// Which checks a suite includes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChecksConfig {
    pub validation: bool,
    pub circular_references: bool,
    pub breaking_changes: bool,
}

/// Where the prior revision comes from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RevisionConfig {
    /// Revision to compare against (commit, tag, branch)
    pub base: Option<String>,
    /// Path of the document inside the repository
    pub spec_path: Option<String>,
    /// Working directory of the repository
    pub repo_dir: PathBuf,
}

/// Soft structural rules that only ever produce warnings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RulesConfig {
    pub warn_missing_summary: bool,
    pub warn_missing_description: bool,
    pub warn_missing_examples: bool,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// Output format
    pub format: OutputFormatConfig,
    /// Verbose output
    pub verbose: bool,
    /// Quiet mode (errors only)
    pub quiet: bool,
}

/// Output format configuration (serializable version of CLI OutputFormat)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormatConfig {
    #[default]
    Human,
    Json,
    Summary,
}

impl From<OutputFormat> for OutputFormatConfig {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Human => OutputFormatConfig::Human,
            OutputFormat::Json => OutputFormatConfig::Json,
            OutputFormat::Summary => OutputFormatConfig::Summary,
        }
    }
}

impl From<OutputFormatConfig> for OutputFormat {
    fn from(format: OutputFormatConfig) -> Self {
        match format {
            OutputFormatConfig::Human => OutputFormat::Human,
            OutputFormatConfig::Json => OutputFormat::Json,
            OutputFormatConfig::Summary => OutputFormat::Summary,
        }
    }
}

impl Default for ChecksConfig {
    fn default() -> Self {
        Self {
            validation: true,
            circular_references: true,
            breaking_changes: true,
        }
    }
}

impl Default for RevisionConfig {
    fn default() -> Self {
        Self {
            base: None,
            spec_path: None,
            repo_dir: PathBuf::from("."),
        }
    }
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            warn_missing_summary: true,
            warn_missing_description: true,
            warn_missing_examples: false,
        }
    }
}

impl OutputConfig {
    pub fn verbosity(&self) -> VerbosityLevel {
        if self.quiet {
            VerbosityLevel::Quiet
        } else if self.verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormatConfig::Human,
            verbose: false,
            quiet: false,
        }
    }
}

/// Configuration manager for loading and merging configurations
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration with precedence: defaults -> file -> environment -> CLI
    pub fn load_config(cli: &Cli) -> Result<Config> {
        Self::load_config_with(cli, &SystemEnvProvider)
    }

    /// Load configuration reading environment overrides from `env`
    pub fn load_config_with(cli: &Cli, env: &impl EnvProvider) -> Result<Config> {
        let mut config = Config::default();

        if let Some(config_path) = &cli.config {
            let file_config = Self::load_from_file(config_path)?;
            config = Self::merge_configs(config, file_config);
        } else if let Some(found_config) = Self::find_config_file()? {
            config = Self::merge_configs(config, found_config);
        }

        config = Self::apply_environment_overrides_with(env, config)?;
        config = Self::merge_with_cli(config, cli);
        Self::validate_config(&config)?;

        debug!(?config, "Configuration loaded");
        Ok(config)
    }

    /// Load configuration from a file (TOML or JSON)
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let content = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), "Reading configuration file");

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => {
                // Try to parse as TOML first, then JSON
                if let Ok(config) = toml::from_str::<Config>(&content) {
                    Ok(config)
                } else {
                    Ok(serde_json::from_str(&content)?)
                }
            }
        }
    }

    /// Find configuration file in the current directory, then the user config directory
    pub fn find_config_file() -> Result<Option<Config>> {
        if let Some(config) = Self::find_config_file_in(Path::new("."))? {
            return Ok(Some(config));
        }
        match dirs::config_dir() {
            Some(config_dir) => Self::find_config_file_in(&config_dir.join("validate-openapi")),
            None => Ok(None),
        }
    }

    /// Load the first of [`CONFIG_FILE_NAMES`] present in `dir`
    pub fn find_config_file_in(dir: &Path) -> Result<Option<Config>> {
        for name in CONFIG_FILE_NAMES {
            let path = dir.join(name);
            if path.exists() {
                return Ok(Some(Self::load_from_file(&path)?));
            }
        }
        Ok(None)
    }

    /// Apply environment variable overrides using the system environment
    pub fn apply_environment_overrides(config: Config) -> Result<Config> {
        Self::apply_environment_overrides_with(&SystemEnvProvider, config)
    }

    /// Apply environment variable overrides with a custom environment provider
    pub fn apply_environment_overrides_with(
        env: &impl EnvProvider,
        mut config: Config,
    ) -> Result<Config> {
        // Revision settings
        if let Some(base) = env.get("VALIDATE_OPENAPI_BASE") {
            config.revision.base = Some(base);
        }

        if let Some(spec_path) = env.get("VALIDATE_OPENAPI_SPEC_PATH") {
            config.revision.spec_path = Some(spec_path);
        }

        if let Some(repo_dir) = env.get("VALIDATE_OPENAPI_REPO_DIR") {
            config.revision.repo_dir = PathBuf::from(repo_dir);
        }

        // Output settings
        if let Some(verbose) = env.get("VALIDATE_OPENAPI_VERBOSE") {
            config.output.verbose = parse_flag("VALIDATE_OPENAPI_VERBOSE", &verbose)?;
        }

        if let Some(quiet) = env.get("VALIDATE_OPENAPI_QUIET") {
            config.output.quiet = parse_flag("VALIDATE_OPENAPI_QUIET", &quiet)?;
        }

        if let Some(format) = env.get("VALIDATE_OPENAPI_FORMAT") {
            config.output.format = match format.to_lowercase().as_str() {
                "human" => OutputFormatConfig::Human,
                "json" => OutputFormatConfig::Json,
                "summary" => OutputFormatConfig::Summary,
                _ => {
                    return Err(ConfigError::Environment(format!(
                        "Invalid VALIDATE_OPENAPI_FORMAT value: {}",
                        format
                    )));
                }
            };
        }

        // Check selection
        if let Some(skip) = env.get("VALIDATE_OPENAPI_SKIP_VALIDATION") {
            config.checks.validation = !parse_flag("VALIDATE_OPENAPI_SKIP_VALIDATION", &skip)?;
        }

        if let Some(skip) = env.get("VALIDATE_OPENAPI_SKIP_CIRCULAR") {
            config.checks.circular_references = !parse_flag("VALIDATE_OPENAPI_SKIP_CIRCULAR", &skip)?;
        }

        if let Some(skip) = env.get("VALIDATE_OPENAPI_SKIP_BREAKING") {
            config.checks.breaking_changes = !parse_flag("VALIDATE_OPENAPI_SKIP_BREAKING", &skip)?;
        }

        Ok(config)
    }

    /// Merge CLI arguments with configuration (CLI takes precedence)
    pub fn merge_with_cli(mut config: Config, cli: &Cli) -> Config {
        // Revision settings
        if let Some(against) = &cli.against {
            config.revision.base = Some(against.clone());
        }
        if let Some(repo) = &cli.repo {
            config.revision.repo_dir = repo.clone();
        }
        if let Some(spec_path) = &cli.spec_path {
            config.revision.spec_path = Some(spec_path.clone());
        }

        // Check selection
        if cli.skip_validation {
            config.checks.validation = false;
        }
        if cli.skip_circular {
            config.checks.circular_references = false;
        }

        // Output settings
        if let Some(format) = cli.format {
            config.output.format = format.into();
        }
        if cli.verbose {
            config.output.verbose = true;
            config.output.quiet = false;
        }
        if cli.quiet {
            config.output.quiet = true;
            config.output.verbose = false;
        }

        config
    }

    /// Merge two configurations (second takes precedence for set values)
    pub fn merge_configs(mut base: Config, override_config: Config) -> Config {
        base.checks = override_config.checks;

        if override_config.revision.base.is_some() {
            base.revision.base = override_config.revision.base;
        }
        if override_config.revision.spec_path.is_some() {
            base.revision.spec_path = override_config.revision.spec_path;
        }
        base.revision.repo_dir = override_config.revision.repo_dir;

        base.rules = override_config.rules;
        base.output = override_config.output;

        base
    }

    /// Validate configuration values
    pub fn validate_config(config: &Config) -> Result<()> {
        if config.output.verbose && config.output.quiet {
            return Err(ConfigError::Validation(
                "Cannot enable both verbose and quiet modes".to_string(),
            ));
        }

        if !config.checks.validation
            && !config.checks.circular_references
            && !config.checks.breaking_changes
        {
            return Err(ConfigError::Validation(
                "At least one check must be enabled".to_string(),
            ));
        }

        if let Some(spec_path) = &config.revision.spec_path {
            if spec_path.is_empty() {
                return Err(ConfigError::Validation(
                    "Revision spec_path must not be empty".to_string(),
                ));
            }
            if Path::new(spec_path).is_absolute() {
                return Err(ConfigError::Validation(format!(
                    "Revision spec_path must be relative to the repository: {}",
                    spec_path
                )));
            }
        }

        if let Some(base) = &config.revision.base
            && base.trim().is_empty()
        {
            return Err(ConfigError::Validation(
                "Base revision must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(ConfigError::Environment(format!(
            "Invalid {} value: {}",
            name, value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    /// Mock environment variable provider for testing
    #[derive(Default)]
    struct MockEnvProvider {
        vars: HashMap<String, String>,
    }

    impl MockEnvProvider {
        fn new() -> Self {
            Self {
                vars: HashMap::new(),
            }
        }

        fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
            self.vars.insert(key.into(), value.into());
        }
    }

    impl EnvProvider for MockEnvProvider {
        fn get(&self, key: &str) -> Option<String> {
            self.vars.get(key).cloned()
        }
    }

    fn cli(args: &[&str]) -> Cli {
        let mut full = vec!["validate-openapi"];
        full.extend_from_slice(args);
        Cli::try_parse_from(full).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.checks.validation);
        assert!(config.checks.circular_references);
        assert!(config.checks.breaking_changes);

        assert_eq!(config.revision.base, None);
        assert_eq!(config.revision.spec_path, None);
        assert_eq!(config.revision.repo_dir, PathBuf::from("."));

        assert!(config.rules.warn_missing_summary);
        assert!(config.rules.warn_missing_description);
        assert!(!config.rules.warn_missing_examples);

        assert_eq!(config.output.format, OutputFormatConfig::Human);
        assert!(!config.output.verbose);
        assert!(!config.output.quiet);

        assert!(!config.breaking_changes_enabled());
    }

    #[test]
    fn test_load_toml_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let toml_content = r#"
[checks]
circular_references = false

[revision]
base = "origin/main"
spec_path = "api/openapi.yaml"
repo_dir = "/srv/repo"

[rules]
warn_missing_examples = true

[output]
format = "json"
verbose = true
"#;

        fs::write(&config_path, toml_content).unwrap();

        let config = ConfigManager::load_from_file(&config_path).unwrap();

        assert!(config.checks.validation);
        assert!(!config.checks.circular_references);
        assert_eq!(config.revision.base.as_deref(), Some("origin/main"));
        assert_eq!(config.revision.spec_path.as_deref(), Some("api/openapi.yaml"));
        assert_eq!(config.revision.repo_dir, PathBuf::from("/srv/repo"));
        assert!(config.rules.warn_missing_summary);
        assert!(config.rules.warn_missing_examples);
        assert_eq!(config.output.format, OutputFormatConfig::Json);
        assert!(config.output.verbose);
        assert!(config.breaking_changes_enabled());
    }

    #[test]
    fn test_load_json_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let json_content = r#"{
  "checks": {"breaking_changes": false},
  "revision": {"base": "v1.2.0"},
  "output": {"format": "summary", "quiet": true}
}"#;

        fs::write(&config_path, json_content).unwrap();

        let config = ConfigManager::load_from_file(&config_path).unwrap();

        assert!(!config.checks.breaking_changes);
        assert_eq!(config.revision.base.as_deref(), Some("v1.2.0"));
        assert_eq!(config.output.format, OutputFormatConfig::Summary);
        assert!(config.output.quiet);
        assert!(!config.breaking_changes_enabled());
    }

    #[test]
    fn test_unsupported_file_format() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        fs::write(&config_path, "invalid: yaml").unwrap();

        match ConfigManager::load_from_file(&config_path) {
            Err(ConfigError::UnsupportedFormat(ext)) => assert_eq!(ext, "yaml"),
            _ => panic!("Expected UnsupportedFormat error"),
        }
    }

    #[test]
    fn test_invalid_toml_and_json() {
        let temp_dir = TempDir::new().unwrap();
        let toml_path = temp_dir.path().join("config.toml");
        fs::write(&toml_path, "invalid toml [[[").unwrap();
        assert!(matches!(
            ConfigManager::load_from_file(&toml_path),
            Err(ConfigError::TomlParsing(_))
        ));

        let json_path = temp_dir.path().join("config.json");
        fs::write(&json_path, "{ invalid json }").unwrap();
        assert!(matches!(
            ConfigManager::load_from_file(&json_path),
            Err(ConfigError::JsonParsing(_))
        ));
    }

    #[test]
    fn test_extensionless_file_is_sniffed() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("openapi-config");
        fs::write(&config_path, r#"{"revision": {"base": "HEAD~1"}}"#).unwrap();

        let config = ConfigManager::load_from_file(&config_path).unwrap();
        assert_eq!(config.revision.base.as_deref(), Some("HEAD~1"));
    }

    #[test]
    fn test_find_config_file_in_directory() {
        let temp_dir = TempDir::new().unwrap();
        assert!(ConfigManager::find_config_file_in(temp_dir.path()).unwrap().is_none());

        fs::write(
            temp_dir.path().join(".validate-openapi.json"),
            r#"{"output": {"format": "json"}}"#,
        )
        .unwrap();
        fs::write(
            temp_dir.path().join("validate-openapi.toml"),
            "[output]\nformat = \"summary\"\n",
        )
        .unwrap();

        // The plain TOML name is searched first
        let config = ConfigManager::find_config_file_in(temp_dir.path())
            .unwrap()
            .unwrap();
        assert_eq!(config.output.format, OutputFormatConfig::Summary);
    }

    #[test]
    fn test_environment_overrides() {
        let mut env = MockEnvProvider::new();
        env.set("VALIDATE_OPENAPI_BASE", "abc123");
        env.set("VALIDATE_OPENAPI_SPEC_PATH", "spec/api.json");
        env.set("VALIDATE_OPENAPI_REPO_DIR", "/work");
        env.set("VALIDATE_OPENAPI_FORMAT", "JSON");
        env.set("VALIDATE_OPENAPI_VERBOSE", "true");
        env.set("VALIDATE_OPENAPI_SKIP_CIRCULAR", "1");

        let config = ConfigManager::apply_environment_overrides_with(&env, Config::default()).unwrap();

        assert_eq!(config.revision.base.as_deref(), Some("abc123"));
        assert_eq!(config.revision.spec_path.as_deref(), Some("spec/api.json"));
        assert_eq!(config.revision.repo_dir, PathBuf::from("/work"));
        assert_eq!(config.output.format, OutputFormatConfig::Json);
        assert!(config.output.verbose);
        assert!(config.checks.validation);
        assert!(!config.checks.circular_references);
    }

    #[test]
    fn test_invalid_environment_values() {
        let mut env = MockEnvProvider::new();
        env.set("VALIDATE_OPENAPI_QUIET", "sometimes");
        match ConfigManager::apply_environment_overrides_with(&env, Config::default()) {
            Err(ConfigError::Environment(message)) => {
                assert!(message.contains("VALIDATE_OPENAPI_QUIET"))
            }
            _ => panic!("Expected Environment error"),
        }

        let mut env = MockEnvProvider::new();
        env.set("VALIDATE_OPENAPI_FORMAT", "xml");
        assert!(matches!(
            ConfigManager::apply_environment_overrides_with(&env, Config::default()),
            Err(ConfigError::Environment(_))
        ));
    }

    #[test]
    fn test_merge_with_cli() {
        let mut config = Config::default();
        config.output.quiet = true;
        config.revision.base = Some("from-file".to_string());

        let cli = cli(&[
            "api.yaml",
            "--against",
            "v2",
            "--repo",
            "/repo",
            "--spec-path",
            "docs/api.yaml",
            "--skip-validation",
            "--format",
            "json",
            "-v",
        ]);
        let merged = ConfigManager::merge_with_cli(config, &cli);

        assert_eq!(merged.revision.base.as_deref(), Some("v2"));
        assert_eq!(merged.revision.repo_dir, PathBuf::from("/repo"));
        assert_eq!(merged.revision.spec_path.as_deref(), Some("docs/api.yaml"));
        assert!(!merged.checks.validation);
        assert!(merged.checks.circular_references);
        assert_eq!(merged.output.format, OutputFormatConfig::Json);
        assert!(merged.output.verbose);
        assert!(!merged.output.quiet);
        assert_eq!(merged.output.verbosity(), VerbosityLevel::Verbose);
    }

    #[test]
    fn test_cli_without_flags_keeps_configuration() {
        let mut config = Config::default();
        config.output.format = OutputFormatConfig::Summary;
        config.checks.circular_references = false;

        let merged = ConfigManager::merge_with_cli(config.clone(), &cli(&["api.yaml"]));
        assert_eq!(merged, config);
    }

    #[test]
    fn test_merge_configs() {
        let mut base = Config::default();
        base.revision.base = Some("main".to_string());

        let mut file = Config::default();
        file.rules.warn_missing_examples = true;
        file.output.format = OutputFormatConfig::Json;

        let merged = ConfigManager::merge_configs(base, file);
        assert_eq!(merged.revision.base.as_deref(), Some("main"));
        assert!(merged.rules.warn_missing_examples);
        assert_eq!(merged.output.format, OutputFormatConfig::Json);
    }

    #[test]
    fn test_config_validation() {
        assert!(ConfigManager::validate_config(&Config::default()).is_ok());

        let mut config = Config::default();
        config.output.verbose = true;
        config.output.quiet = true;
        assert!(matches!(
            ConfigManager::validate_config(&config),
            Err(ConfigError::Validation(_))
        ));

        let mut config = Config::default();
        config.checks = ChecksConfig {
            validation: false,
            circular_references: false,
            breaking_changes: false,
        };
        assert!(ConfigManager::validate_config(&config).is_err());

        let mut config = Config::default();
        config.revision.spec_path = Some("/abs/api.yaml".to_string());
        assert!(ConfigManager::validate_config(&config).is_err());

        let mut config = Config::default();
        config.revision.base = Some("  ".to_string());
        assert!(ConfigManager::validate_config(&config).is_err());
    }

    #[test]
    fn test_load_config_integration() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");
        fs::write(
            &config_path,
            "[revision]\nbase = \"file-rev\"\n\n[output]\nformat = \"summary\"\n",
        )
        .unwrap();

        let mut env = MockEnvProvider::new();
        env.set("VALIDATE_OPENAPI_BASE", "env-rev");

        let config_arg = config_path.to_string_lossy().into_owned();
        let cli = cli(&["api.yaml", "--config", &config_arg, "--format", "json"]);
        let config = ConfigManager::load_config_with(&cli, &env).unwrap();

        assert_eq!(config.revision.base.as_deref(), Some("env-rev"));
        assert_eq!(config.output.format, OutputFormatConfig::Json);
        assert_eq!(config.spec_path_or(Path::new("api.yaml")), "api.yaml");
    }

    #[test]
    fn test_output_format_conversion() {
        assert_eq!(OutputFormatConfig::from(OutputFormat::Json), OutputFormatConfig::Json);
        assert_eq!(OutputFormat::from(OutputFormatConfig::Summary), OutputFormat::Summary);
        assert_eq!(OutputFormat::from(OutputFormatConfig::Human), OutputFormat::Human);
    }
}
