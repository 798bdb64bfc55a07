mod common;

use common::load_fixture;
use serde_json::json;
use validate_openapi::{DataValidator, FormatRegistry, HttpMethod, validate_value_against_schema};

#[test]
fn test_query_parameter_bounds() {
    let doc = load_fixture("petstore.yaml");
    let validator = DataValidator::new(&doc);

    assert!(validator.validate_parameter(HttpMethod::Get, "/pets", "limit", "25").ok);

    let too_small = validator.validate_parameter(HttpMethod::Get, "/pets", "limit", "0");
    assert!(!too_small.ok);
    assert_eq!(too_small.errors.len(), 1);

    let not_a_number = validator.validate_parameter(HttpMethod::Get, "/pets", "limit", "many");
    assert!(!not_a_number.ok);
    assert!(not_a_number.errors[0].starts_with("$:"));
}

#[test]
fn test_path_parameter_on_concrete_path() {
    let doc = load_fixture("petstore.yaml");
    let validator = DataValidator::new(&doc);

    assert!(validator.validate_parameter(HttpMethod::Delete, "/pets/42", "petId", "42").ok);
    assert!(!validator.validate_parameter(HttpMethod::Delete, "/pets/42", "petId", "4.2").ok);

    let unknown = validator.validate_parameter(HttpMethod::Patch, "/pets/42", "petId", "42");
    assert!(unknown.errors[0].contains("no operation PATCH /pets/42"));
}

#[test]
fn test_response_bodies() {
    let doc = load_fixture("petstore.yaml");
    let validator = DataValidator::new(&doc);

    let pets = json!([
        {"id": 1, "name": "Rex", "status": "available"},
        {"id": 2, "name": "Tom", "tag": "cat"}
    ]);
    let result = validator.validate_response_shape(HttpMethod::Get, "/pets", 200, &pets);
    assert!(result.ok, "{:?}", result.errors);

    let broken = json!([
        {"id": "1", "name": "Rex"},
        {"id": 2, "name": "", "status": "lost"}
    ]);
    let result = validator.validate_response_shape(HttpMethod::Get, "/pets", 200, &broken);
    assert!(!result.ok);
    assert_eq!(result.errors.len(), 3, "{:?}", result.errors);
    assert!(result.errors.iter().any(|e| e.starts_with("$[0].id")));
    assert!(result.errors.iter().any(|e| e.starts_with("$[1].name")));
    assert!(result.errors.iter().any(|e| e.starts_with("$[1].status")));
}

#[test]
fn test_default_response_covers_other_statuses() {
    let doc = load_fixture("petstore.yaml");
    let validator = DataValidator::new(&doc);

    let error = json!({"code": 500, "message": "boom"});
    assert!(validator.validate_response_shape(HttpMethod::Get, "/pets", 500, &error).ok);

    let missing = validator.validate_response_shape(HttpMethod::Get, "/pets", 503, &json!({"code": 503}));
    assert_eq!(missing.errors, vec!["$: missing required property 'message'".to_string()]);
}

#[test]
fn test_response_without_content_accepts_any_body() {
    let doc = load_fixture("petstore.yaml");
    let validator = DataValidator::new(&doc);
    assert!(validator.validate_response_shape(HttpMethod::Get, "/pets/7", 404, &json!({"x": 1})).ok);
}

#[test]
fn test_standalone_schema_validation() {
    let doc = load_fixture("petstore.yaml");
    let schema = doc.components.schema("NewPet").unwrap();

    assert!(validate_value_against_schema(&json!({"name": "Rex"}), schema).ok);
    let result = validate_value_against_schema(&json!({"tag": 3}), schema);
    assert_eq!(result.errors.len(), 2, "{:?}", result.errors);
}

#[test]
fn test_custom_format_is_applied() {
    let doc = load_fixture("petstore.yaml");
    let mut formats = FormatRegistry::with_defaults();
    formats.register("int64", |value| value.as_i64().is_some_and(|id| id > 0));
    let validator = DataValidator::new(&doc).with_formats(formats);

    assert!(validator.validate_parameter(HttpMethod::Get, "/pets/1", "petId", "1").ok);
    assert!(!validator.validate_parameter(HttpMethod::Get, "/pets/1", "petId", "-1").ok);
}
