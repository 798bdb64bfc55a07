//! Report rendering
//!
//! Turns a [`SuiteReport`] into human-readable text, a one-line-per-check
//! summary, or JSON.

use crate::cli::{OutputFormat, VerbosityLevel};
use crate::findings::CheckResult;
use crate::suite::SuiteReport;

/// Output formatter for suite reports
pub struct Output {
    verbosity: VerbosityLevel,
    format: OutputFormat,
    show_colors: bool,
}

impl Output {
    pub fn new(verbosity: VerbosityLevel, format: OutputFormat) -> Self {
        Self {
            verbosity,
            format,
            show_colors: atty::is(atty::Stream::Stdout),
        }
    }

    pub fn with_colors(mut self, show_colors: bool) -> Self {
        self.show_colors = show_colors;
        self
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if self.show_colors {
            format!("\x1b[{}m{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    /// Render `report` in the configured format
    pub fn render(&self, report: &SuiteReport) -> serde_json::Result<String> {
        match self.format {
            OutputFormat::Json => {
                let mut json = serde_json::to_string_pretty(report)?;
                json.push('\n');
                Ok(json)
            }
            OutputFormat::Summary => Ok(self.format_summary(report)),
            OutputFormat::Human => Ok(self.format_report(report)),
        }
    }

    pub fn format_report(&self, report: &SuiteReport) -> String {
        let mut output = String::new();

        if self.verbosity == VerbosityLevel::Debug {
            output.push_str(&format!("Run {} started {}\n", report.run_id, report.started_at.to_rfc3339()));
        }

        match self.verbosity {
            VerbosityLevel::Quiet => {
                for result in report.failed_checks() {
                    output.push_str(&self.format_check(result));
                    output.push('\n');
                }
            }
            VerbosityLevel::Normal | VerbosityLevel::Verbose | VerbosityLevel::Debug => {
                for result in &report.results {
                    output.push_str(&self.format_check(result));
                    output.push('\n');
                }
                output.push('\n');
                output.push_str(&self.format_totals(report));
            }
        }

        output
    }

    pub fn format_check(&self, result: &CheckResult) -> String {
        let status = if result.passed {
            self.colorize("✓ PASSED", "32")
        } else {
            self.colorize("✗ FAILED", "31")
        };
        let mut output = format!("{}  {} - {}", status, result.name, result.summary);

        for error in &result.errors {
            output.push_str(&format!("\n    {} {}", self.colorize("error:", "31"), error));
        }

        if self.verbosity >= VerbosityLevel::Normal {
            if self.verbosity >= VerbosityLevel::Verbose {
                for warning in &result.warnings {
                    output.push_str(&format!("\n    {} {}", self.colorize("warning:", "33"), warning));
                }
            } else if !result.warnings.is_empty() {
                output.push_str(&format!(
                    "\n    {} warning{} (use --verbose to list)",
                    result.warnings.len(),
                    plural(result.warnings.len())
                ));
            }
        }

        if self.verbosity >= VerbosityLevel::Verbose {
            for cycle in &result.cycles {
                output.push_str(&format!("\n    {} {}", self.colorize("cycle:", "36"), cycle.description));
            }
            for diagnostic in &result.diagnostics {
                output.push_str(&format!("\n    {}", diagnostic));
            }
        }

        output
    }

    fn format_totals(&self, report: &SuiteReport) -> String {
        let failed = report.failed_checks().count();
        let mut output = String::new();
        output.push_str("Check Summary:\n");
        output.push_str(&format!("  Checks run: {}\n", report.results.len()));
        output.push_str(&format!(
            "  {} {}\n",
            self.colorize("Passed:", "32"),
            report.results.len() - failed
        ));
        if failed > 0 {
            output.push_str(&format!("  {} {}\n", self.colorize("Failed:", "31"), failed));
        }
        output.push_str(&format!("  Errors: {}\n", report.total_errors()));
        output.push_str(&format!("  Warnings: {}\n", report.total_warnings()));
        output
    }

    /// One line per check followed by the overall verdict
    pub fn format_summary(&self, report: &SuiteReport) -> String {
        let mut output = String::new();
        for result in &report.results {
            output.push_str(&format!(
                "{}: {} ({} error{}, {} warning{})\n",
                result.name,
                if result.passed { "passed" } else { "failed" },
                result.error_count(),
                plural(result.error_count()),
                result.warning_count(),
                plural(result.warning_count())
            ));
        }
        let verdict = if report.passed {
            self.colorize("PASSED", "32")
        } else {
            self.colorize("FAILED", "31")
        };
        output.push_str(&verdict);
        output.push('\n');
        output
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "" } else { "s" }
}
