mod common;

use std::path::Path;
use std::sync::Arc;

use common::{fixture_text, load_fixture};
use validate_openapi::compare::BREAKING_CHECK;
use validate_openapi::cycles::CIRCULAR_CHECK;
use validate_openapi::validator::VALIDATION_CHECK;
use validate_openapi::{
    BreakingChangeCheck, Config, InMemoryRevisionSource, RevisionSource, SuiteBuilder, SuiteReport,
};

fn prior_source() -> Arc<dyn RevisionSource> {
    Arc::new(InMemoryRevisionSource::new().with_file(
        "v1.0.0",
        "petstore.yaml",
        fixture_text("petstore.yaml"),
    ))
}

#[test]
fn test_default_suite_on_valid_document() {
    let report = SuiteBuilder::with_defaults()
        .build()
        .run(&load_fixture("petstore.yaml"));

    assert!(report.passed);
    assert_eq!(report.total_errors(), 0);
    assert_eq!(report.failed_checks().count(), 0);
}

#[test]
fn test_cycles_fail_only_their_check() {
    let report = SuiteBuilder::with_defaults()
        .build()
        .run(&load_fixture("circular.json"));

    assert!(!report.passed);
    assert!(report.result(VALIDATION_CHECK).unwrap().passed);
    let circular = report.result(CIRCULAR_CHECK).unwrap();
    assert!(!circular.passed);
    assert_eq!(circular.cycles.len(), 1);
}

#[test]
fn test_full_suite_with_breaking_changes() {
    let suite = SuiteBuilder::with_defaults()
        .breaking_changes(BreakingChangeCheck::new("v1.0.0", "petstore.yaml", prior_source()))
        .build();
    assert_eq!(
        suite.check_names(),
        vec![VALIDATION_CHECK, CIRCULAR_CHECK, BREAKING_CHECK]
    );

    let compatible = suite.run(&load_fixture("petstore_v2_compatible.yaml"));
    assert!(compatible.passed);

    let breaking = suite.run(&load_fixture("petstore_v2_breaking.yaml"));
    assert!(!breaking.passed);
    let failed: Vec<&str> = breaking.failed_checks().map(|r| r.name.as_str()).collect();
    assert_eq!(failed, vec![BREAKING_CHECK]);
    assert_eq!(breaking.total_errors(), 2);
}

#[test]
fn test_suite_from_configuration() {
    let mut config = Config::default();
    config.revision.base = Some("v1.0.0".to_string());
    config.checks.circular_references = false;

    let suite = SuiteBuilder::from_config_with_source(&config, Path::new("petstore.yaml"), prior_source())
        .build();
    assert_eq!(suite.check_names(), vec![VALIDATION_CHECK, BREAKING_CHECK]);
    assert!(!suite.run(&load_fixture("petstore_v2_breaking.yaml")).passed);
}

#[test]
fn test_report_round_trips_through_json() {
    let report = SuiteBuilder::with_defaults()
        .build()
        .run(&load_fixture("circular.json"));
    let json = serde_json::to_string(&report).unwrap();
    let parsed: SuiteReport = serde_json::from_str(&json).unwrap();

    assert_eq!(parsed, report);
}
