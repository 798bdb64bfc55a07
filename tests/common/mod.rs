#![allow(dead_code)]

use std::path::PathBuf;

use validate_openapi::{DocumentFormat, SpecDocument, load_file};

pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

pub fn fixture_path(name: &str) -> PathBuf {
    fixtures_dir().join(name)
}

pub fn fixture_text(name: &str) -> String {
    std::fs::read_to_string(fixture_path(name)).expect("Failed to read fixture")
}

pub fn load_fixture(name: &str) -> SpecDocument {
    load_file(&fixture_path(name), DocumentFormat::Auto).expect("Failed to load fixture")
}
