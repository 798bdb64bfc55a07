use thiserror::Error;

use crate::config::ConfigError;
use crate::loader::DocumentFormat;

/// Main library error type covering every failure that aborts a check
#[derive(Error, Debug)]
pub enum SpecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error in {format} document{}: {details}", format_location(.line, .column))]
    Parse {
        format: DocumentFormat,
        line: Option<usize>,
        column: Option<usize>,
        details: String,
    },

    #[error("Schema shape error: missing required top-level key '{key}'")]
    SchemaShape { key: String },

    #[error("Unresolved reference: {reference} - {reason}")]
    UnresolvedReference { reference: String, reason: String },

    #[error("Prior revision unavailable: {revision}:{path} - {reason}")]
    RevisionUnavailable {
        revision: String,
        path: String,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl SpecError {
    /// Line/column carried by the error, if any
    pub fn location(&self) -> (Option<usize>, Option<usize>) {
        match self {
            SpecError::Parse { line, column, .. } => (*line, *column),
            _ => (None, None),
        }
    }
}

/// Failure modes of the injected "fetch file at revision" capability
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("not found: {path} at revision {revision}")]
    NotFound { revision: String, path: String },

    #[error("fetch failed for {path} at revision {revision}: {reason}")]
    Failed {
        revision: String,
        path: String,
        reason: String,
    },

    #[error("fetch timed out for {path} at revision {revision}")]
    TimedOut { revision: String, path: String },
}

impl FetchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound { .. })
    }
}

impl From<FetchError> for SpecError {
    fn from(err: FetchError) -> Self {
        let reason = err.to_string();
        match err {
            FetchError::NotFound { revision, path }
            | FetchError::Failed { revision, path, .. }
            | FetchError::TimedOut { revision, path } => SpecError::RevisionUnavailable {
                revision,
                path,
                reason,
            },
        }
    }
}

impl From<ConfigError> for SpecError {
    fn from(err: ConfigError) -> Self {
        SpecError::Config(err.to_string())
    }
}

fn format_location(line: &Option<usize>, column: &Option<usize>) -> String {
    match (*line, *column) {
        (Some(line), Some(column)) => format!(" at line {}, column {}", line, column),
        (Some(line), None) => format!(" at line {}", line),
        _ => String::new(),
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, SpecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display_with_location() {
        let error = SpecError::Parse {
            format: DocumentFormat::Yaml,
            line: Some(4),
            column: Some(7),
            details: "mapping values are not allowed here".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("YAML"));
        assert!(message.contains("line 4, column 7"));
        assert!(message.contains("mapping values"));
        assert_eq!(error.location(), (Some(4), Some(7)));
    }

    #[test]
    fn test_parse_error_display_without_location() {
        let error = SpecError::Parse {
            format: DocumentFormat::Json,
            line: None,
            column: None,
            details: "document root must be an object".to_string(),
        };
        assert!(!error.to_string().contains("line"));
    }

    #[test]
    fn test_schema_shape_error_display() {
        let error = SpecError::SchemaShape {
            key: "paths".to_string(),
        };
        assert!(error.to_string().contains("'paths'"));
    }

    #[test]
    fn test_fetch_error_conversion() {
        let fetch_error = FetchError::NotFound {
            revision: "v1.2.0".to_string(),
            path: "openapi.yaml".to_string(),
        };
        assert!(fetch_error.is_not_found());

        let spec_error: SpecError = fetch_error.into();
        match spec_error {
            SpecError::RevisionUnavailable {
                revision,
                path,
                reason,
            } => {
                assert_eq!(revision, "v1.2.0");
                assert_eq!(path, "openapi.yaml");
                assert!(reason.contains("not found"));
            }
            _ => panic!("Expected SpecError::RevisionUnavailable"),
        }
    }

    #[test]
    fn test_timeout_maps_like_not_found() {
        let spec_error: SpecError = FetchError::TimedOut {
            revision: "main".to_string(),
            path: "api.json".to_string(),
        }
        .into();
        assert!(matches!(spec_error, SpecError::RevisionUnavailable { .. }));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let spec_error: SpecError = io_error.into();

        match spec_error {
            SpecError::Io(_) => (),
            _ => panic!("Expected SpecError::Io"),
        }
    }

    #[test]
    fn test_error_source_chain() {
        use std::error::Error;

        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let spec_error = SpecError::Io(io_error);

        let source = spec_error.source().unwrap();
        assert_eq!(source.to_string(), "File not found");
    }
}
