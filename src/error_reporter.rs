use crate::cli::VerbosityLevel;
use crate::config::ConfigError;
use crate::error::SpecError;

/// Reports fatal errors to stderr with configurable verbosity
pub struct ErrorReporter {
    verbosity: VerbosityLevel,
    show_timestamps: bool,
}

impl ErrorReporter {
    /// Create a new error reporter with specified verbosity
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            show_timestamps: false,
        }
    }

    /// Create a new error reporter with additional options
    pub fn with_options(verbosity: VerbosityLevel, show_timestamps: bool) -> Self {
        Self {
            verbosity,
            show_timestamps,
        }
    }

    /// Report an error that stops the run before any check completes
    pub fn report_spec_error(&self, error: &SpecError) {
        eprintln!("{}", self.format_spec_error(error));
    }

    /// Report a configuration error
    pub fn report_config_error(&self, error: &ConfigError) {
        eprintln!("{}", self.format_config_error(error));
    }

    pub fn format_spec_error(&self, error: &SpecError) -> String {
        match self.verbosity {
            VerbosityLevel::Quiet => format!("ERROR: {}", error),
            VerbosityLevel::Normal => self.format_error_normal(error),
            VerbosityLevel::Verbose => self.format_error_verbose(error),
            VerbosityLevel::Debug => self.format_error_debug(error),
        }
    }

    pub fn format_config_error(&self, error: &ConfigError) -> String {
        match self.verbosity {
            VerbosityLevel::Quiet => format!("Config error: {}", error),
            VerbosityLevel::Normal | VerbosityLevel::Verbose => {
                format!("Configuration Error: {}\n{}", error, config_help(error))
            }
            VerbosityLevel::Debug => format!(
                "Configuration Error: {}\nDebug: {:?}\n{}",
                error,
                error,
                config_help(error)
            ),
        }
    }

    /// Format error for normal output
    fn format_error_normal(&self, error: &SpecError) -> String {
        let timestamp = if self.show_timestamps {
            format!("[{}] ", chrono::Utc::now().format("%H:%M:%S"))
        } else {
            String::new()
        };

        format!("{}Error: {}", timestamp, error)
    }

    /// Format error for verbose output
    fn format_error_verbose(&self, error: &SpecError) -> String {
        let mut output = self.format_error_normal(error);
        if let Some(suggestion) = suggestion(error) {
            output.push_str("\nSuggestion: ");
            output.push_str(suggestion);
        }
        output
    }

    /// Format error for debug output
    fn format_error_debug(&self, error: &SpecError) -> String {
        let mut output = self.format_error_verbose(error);
        output.push_str(&format!("\nDebug Info: {:?}", error));

        output.push_str("\nError Chain:");
        let mut current_error: &dyn std::error::Error = error;
        let mut level = 0;
        while let Some(source) = current_error.source() {
            output.push_str(&format!("\n  {}: {}", level + 1, source));
            current_error = source;
            level += 1;
        }

        output
    }
}

fn suggestion(error: &SpecError) -> Option<&'static str> {
    match error {
        SpecError::Io(_) => Some("Check that the document path exists and is readable"),
        SpecError::Parse { .. } => {
            Some("Check the document syntax, or pass --input-format to force JSON or YAML")
        }
        SpecError::SchemaShape { .. } => {
            Some("An OpenAPI document needs top-level 'info' and 'paths' objects")
        }
        SpecError::UnresolvedReference { .. } => {
            Some("Only local references of the form '#/components/<section>/<name>' are supported")
        }
        SpecError::RevisionUnavailable { .. } => {
            Some("Check --against and --spec-path, and that --repo points at a git working tree")
        }
        SpecError::Config(_) | SpecError::Cancelled => None,
    }
}

/// Get helpful suggestions for configuration errors
fn config_help(error: &ConfigError) -> String {
    match error {
        ConfigError::Io(_) => "Check that the configuration file exists and is readable".to_string(),
        ConfigError::TomlParsing(_) | ConfigError::JsonParsing(_) => {
            "Check the configuration file syntax (TOML/JSON format expected)".to_string()
        }
        ConfigError::Validation(_) => {
            "Resolve conflicting configuration values between file, environment, and CLI"
                .to_string()
        }
        ConfigError::Environment(_) => {
            "Fix the VALIDATE_OPENAPI_* environment variable named above".to_string()
        }
        ConfigError::UnsupportedFormat(ext) => {
            format!("Rename the '.{}' configuration file to .toml or .json", ext)
        }
    }
}
