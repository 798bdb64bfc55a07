use std::process::ExitCode;

use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use validate_openapi::cli::{Cli, OutputFormat, VerbosityLevel};
use validate_openapi::config::{Config, ConfigManager};
use validate_openapi::error::SpecError;
use validate_openapi::error_reporter::ErrorReporter;
use validate_openapi::loader::load_file;
use validate_openapi::output::Output;
use validate_openapi::suite::SuiteBuilder;

/// At least one check failed
const FAILURE_EXIT_CODE: u8 = 1;
/// The run could not complete: unreadable input, bad document or bad configuration
const FATAL_EXIT_CODE: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse_args();

    let config = match ConfigManager::load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            ErrorReporter::new(cli.verbosity()).report_config_error(&e);
            return ExitCode::from(FATAL_EXIT_CODE);
        }
    };

    let verbosity = config.output.verbosity();
    init_logging(verbosity);

    if let Err(message) = cli.validate() {
        eprintln!("Error: {}", message);
        return ExitCode::from(FATAL_EXIT_CODE);
    }

    match run(&cli, &config, verbosity) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(FAILURE_EXIT_CODE),
        Err(error) => {
            match error.downcast_ref::<SpecError>() {
                Some(spec_error) => ErrorReporter::new(verbosity).report_spec_error(spec_error),
                None => eprintln!("Error: {:#}", error),
            }
            ExitCode::from(FATAL_EXIT_CODE)
        }
    }
}

fn init_logging(verbosity: VerbosityLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Load the document, run the configured suite and print the report
fn run(cli: &Cli, config: &Config, verbosity: VerbosityLevel) -> anyhow::Result<bool> {
    let doc = load_file(&cli.spec, cli.document_format())?;
    if !config.checks.validation {
        // Load notices are otherwise reported by the validation check
        for notice in &doc.notices {
            warn!(path = %notice.path, "{}", notice.message);
        }
    }

    let suite = SuiteBuilder::from_config(config, &cli.spec).build();
    debug!(checks = ?suite.check_names(), "Suite configured");
    if suite.is_empty() {
        anyhow::bail!("No checks selected");
    }

    let report = suite.run(&doc);
    let output = Output::new(verbosity, OutputFormat::from(config.output.format));
    print!("{}", output.render(&report)?);

    Ok(report.passed)
}
