use divan::Bencher;
use serde_json::{Value, json};
use validate_openapi::{
    CancellationToken, DocumentFormat, SpecDocument, Validator, detect_cycles, diff_documents, load,
};

fn main() {
    divan::main();
}

/// A document with `size` paths and `size` schemas; every tenth schema closes a cycle
fn generated_document(size: usize, required_extra: bool) -> SpecDocument {
    let mut paths = serde_json::Map::new();
    let mut schemas = serde_json::Map::new();

    for i in 0..size {
        let mut parameters = vec![json!({
            "name": "id", "in": "path", "required": true,
            "schema": {"type": "integer", "format": "int64"}
        })];
        if required_extra && i % 2 == 0 {
            parameters.push(json!({
                "name": "tenant", "in": "query", "required": true,
                "schema": {"type": "string"}
            }));
        }
        paths.insert(
            format!("/resource{}/{{id}}", i),
            json!({
                "get": {
                    "operationId": format!("getResource{}", i),
                    "summary": "Fetch a resource",
                    "description": "Returns one resource",
                    "parameters": parameters,
                    "responses": {
                        "200": {
                            "description": "The resource",
                            "content": {"application/json": {
                                "schema": {"$ref": format!("#/components/schemas/Model{}", i)}
                            }}
                        }
                    }
                }
            }),
        );

        let next = if i % 10 == 9 { i - 9 } else { (i + 1) % size };
        schemas.insert(
            format!("Model{}", i),
            json!({
                "type": "object",
                "required": ["name"],
                "properties": {
                    "name": {"type": "string", "maxLength": 64},
                    "next": {"$ref": format!("#/components/schemas/Model{}", next)}
                }
            }),
        );
    }

    let document = json!({
        "openapi": "3.0.3",
        "info": {"title": "Generated", "version": "1.0.0", "description": "Benchmark document"},
        "paths": Value::Object(paths),
        "components": {"schemas": Value::Object(schemas)}
    });
    let text = serde_json::to_string(&document).expect("Failed to serialize document");
    load(text.as_bytes(), DocumentFormat::Json).expect("Failed to load generated document")
}

#[divan::bench(args = [10, 100, 1000])]
fn detect_circular_references(bencher: Bencher, size: usize) {
    let doc = generated_document(size, false);
    bencher.bench_local(move || detect_cycles(&doc));
}

#[divan::bench(args = [10, 100, 1000])]
fn structural_validation(bencher: Bencher, size: usize) {
    let doc = generated_document(size, false);
    let validator = Validator::new();
    bencher.bench_local(move || validator.validate(&doc));
}

#[divan::bench(args = [10, 100, 1000])]
fn diff_revisions(bencher: Bencher, size: usize) {
    let old = generated_document(size, false);
    let new = generated_document(size, true);
    let cancel = CancellationToken::new();
    bencher.bench_local(move || diff_documents(&old, &new, &cancel).expect("Diff failed"));
}

#[divan::bench]
fn load_document(bencher: Bencher) {
    let text = std::fs::read_to_string(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/tests/fixtures/petstore.yaml"
    ))
    .expect("Failed to read fixture");
    bencher.bench_local(move || load(text.as_bytes(), DocumentFormat::Yaml).expect("Failed to load"));
}
