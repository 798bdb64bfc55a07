use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::loader::DocumentFormat;

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum VerbosityLevel {
    /// Only show failing checks and fatal errors
    Quiet,
    /// Show standard information
    #[default]
    Normal,
    /// Show detailed information
    Verbose,
    /// Show all available debugging information
    Debug,
}

impl VerbosityLevel {
    /// Default tracing filter directive for this verbosity
    pub fn log_level(&self) -> &'static str {
        match self {
            VerbosityLevel::Quiet => "warn",
            VerbosityLevel::Normal => "info",
            VerbosityLevel::Verbose | VerbosityLevel::Debug => "debug",
        }
    }
}

/// Report rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
    Summary,
}

/// Serialization format of the input document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum InputFormat {
    /// Decide from the file extension, then the content
    #[default]
    Auto,
    Json,
    Yaml,
}

impl From<InputFormat> for DocumentFormat {
    fn from(format: InputFormat) -> Self {
        match format {
            InputFormat::Auto => DocumentFormat::Auto,
            InputFormat::Json => DocumentFormat::Json,
            InputFormat::Yaml => DocumentFormat::Yaml,
        }
    }
}

/// OpenAPI 3.0 governance checks
#[derive(Parser, Debug, Clone)]
#[command(name = "validate-openapi")]
#[command(
    about = "Validate an OpenAPI 3.0 document, detect circular schema references and breaking changes"
)]
#[command(version)]
pub struct Cli {
    /// OpenAPI document to check
    #[arg(help = "OpenAPI document (JSON or YAML)")]
    pub spec: PathBuf,

    /// Revision to compare against
    #[arg(
        long = "against",
        value_name = "REV",
        help = "Compare against this revision (commit, tag or branch)"
    )]
    pub against: Option<String>,

    /// Repository holding prior revisions
    #[arg(long = "repo", value_name = "DIR", help = "Repository working directory")]
    pub repo: Option<PathBuf>,

    /// Path of the document inside the repository
    #[arg(
        long = "spec-path",
        value_name = "PATH",
        help = "Path of the document inside the repository (defaults to SPEC)"
    )]
    pub spec_path: Option<String>,

    #[arg(long = "input-format", value_enum, default_value_t = InputFormat::Auto)]
    pub input_format: InputFormat,

    #[arg(long = "skip-validation", help = "Skip structural validation")]
    pub skip_validation: bool,

    #[arg(long = "skip-circular", help = "Skip circular reference detection")]
    pub skip_circular: bool,

    /// Configuration file (TOML or JSON)
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[arg(long = "format", value_enum, help = "Report format")]
    pub format: Option<OutputFormat>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", help = "Enable verbose output")]
    pub verbose: bool,

    /// Enable quiet mode (failures only)
    #[arg(
        short = 'q',
        long = "quiet",
        help = "Quiet mode",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.spec.is_file() {
            return Err(format!("Document does not exist: {}", self.spec.display()));
        }
        if let Some(config) = &self.config
            && !config.is_file()
        {
            return Err(format!(
                "Configuration file does not exist: {}",
                config.display()
            ));
        }
        Ok(())
    }

    pub fn document_format(&self) -> DocumentFormat {
        self.input_format.into()
    }

    /// Verbosity requested on the command line alone
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

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_basic_cli_parsing() {
        let args = vec!["validate-openapi", "openapi.yaml"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.spec, PathBuf::from("openapi.yaml"));
        assert_eq!(cli.against, None);
        assert_eq!(cli.input_format, InputFormat::Auto);
        assert_eq!(cli.format, None);
        assert_eq!(cli.verbosity(), VerbosityLevel::Normal);
    }

    #[test]
    fn test_full_cli_parsing() {
        let cli = Cli::try_parse_from([
            "validate-openapi",
            "api.json",
            "--against",
            "origin/main",
            "--repo",
            "/srv/api",
            "--spec-path",
            "spec/api.json",
            "--input-format",
            "json",
            "--skip-validation",
            "--skip-circular",
            "--format",
            "summary",
            "-q",
        ])
        .unwrap();

        assert_eq!(cli.against.as_deref(), Some("origin/main"));
        assert_eq!(cli.repo, Some(PathBuf::from("/srv/api")));
        assert_eq!(cli.spec_path.as_deref(), Some("spec/api.json"));
        assert_eq!(cli.document_format(), DocumentFormat::Json);
        assert!(cli.skip_validation);
        assert!(cli.skip_circular);
        assert_eq!(cli.format, Some(OutputFormat::Summary));
        assert_eq!(cli.verbosity(), VerbosityLevel::Quiet);
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["validate-openapi", "a.yaml", "-v", "-q"]).is_err());
    }

    #[test]
    fn test_unknown_format_rejected() {
        assert!(Cli::try_parse_from(["validate-openapi", "a.yaml", "--format", "xml"]).is_err());
        assert!(Cli::try_parse_from(["validate-openapi", "a.yaml", "--input-format", "toml"]).is_err());
    }

    #[test]
    fn test_missing_document_fails_validation() {
        let cli = Cli::try_parse_from(["validate-openapi", "/definitely/not/here.yaml"]).unwrap();
        assert!(cli.validate().unwrap_err().contains("does not exist"));
    }

    #[test]
    fn test_log_levels() {
        assert_eq!(VerbosityLevel::Quiet.log_level(), "warn");
        assert_eq!(VerbosityLevel::Normal.log_level(), "info");
        assert_eq!(VerbosityLevel::Verbose.log_level(), "debug");
    }
}
