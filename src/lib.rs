//! # validate-openapi Library
//!
//! Governance checks for OpenAPI 3.0 documents: structural validation,
//! circular schema reference detection, breaking-change detection against a
//! prior revision, and validation of concrete values against the document's
//! schemas. Checks compose into a [`Suite`] whose [`SuiteReport`] is suitable
//! for CI.

pub mod cancel;
pub mod cli;
pub mod compare;
pub mod config;
pub mod cycles;
pub mod data_validation;
pub mod error;
pub mod error_reporter;
pub mod findings;
pub mod formats;
pub mod loader;
pub mod model;
pub mod output;
pub mod resolver;
pub mod revision;
pub mod suite;
pub mod validator;

pub use cancel::CancellationToken;
pub use cli::{Cli, OutputFormat, VerbosityLevel};
pub use compare::{compare_against_revision, diff_documents};
pub use config::{Config, ConfigError, ConfigManager, RulesConfig};
pub use cycles::{detect_cycles, detect_cycles_with_cancel};
pub use data_validation::{DataValidator, ValueValidation, validate_value_against_schema};
pub use error::{FetchError, Result, SpecError};
pub use findings::{
    BreakingChange, ChangeKind, CheckResult, CircularReference, Impact, Severity, ValidationIssue,
};
pub use formats::FormatRegistry;
pub use loader::{DocumentFormat, load, load_file};
pub use model::{HttpMethod, SpecDocument};
pub use output::Output;
pub use revision::{FnRevisionSource, GitRevisionSource, InMemoryRevisionSource, RevisionSource};
pub use suite::{
    BreakingChangeCheck, Check, CircularReferenceCheck, Suite, SuiteBuilder, SuiteReport,
    ValidationCheck,
};
pub use validator::{Validator, validate};
