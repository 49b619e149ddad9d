use proto_schema::{Error, ProtoSchema};
use std::fs;

#[test]
fn test_from_file_resolves_imports_next_to_input() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");

    fs::write(
        dir.path().join("common.proto"),
        r#"
            syntax = "proto3";
            package common;

            message Money {
                string currency = 1;
                int64 units = 2;
            }
        "#,
    )
    .expect("Failed to write common.proto");

    let invoice_path = dir.path().join("invoice.proto");
    fs::write(
        &invoice_path,
        r#"
            syntax = "proto3";
            package billing;

            import "common.proto";
            import "google/protobuf/timestamp.proto";

            message Invoice {
                string id = 1;
                common.Money total = 2;
                google.protobuf.Timestamp issued_at = 3;
            }
        "#,
    )
    .expect("Failed to write invoice.proto");

    let schema = ProtoSchema::from_file(&invoice_path).expect("Failed to load invoice.proto");

    let invoice = schema
        .get_message("billing.Invoice")
        .expect("Invoice not found");
    assert_eq!(invoice.fields().count(), 3);

    let money = schema.get_message("Money").expect("Money not found");
    assert_eq!(money.full_name(), "common.Money");

    // Dependencies are linked before the files that import them
    let names: Vec<&str> = schema.files().iter().map(|f| f.proto().name()).collect();
    let common_pos = names
        .iter()
        .position(|n| *n == "common.proto")
        .expect("common.proto not linked");
    let invoice_pos = names
        .iter()
        .position(|n| *n == "invoice.proto")
        .expect("invoice.proto not linked");
    assert!(common_pos < invoice_pos);
}

#[test]
fn test_from_files_with_include_dir() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let nested = dir.path().join("protos");
    fs::create_dir_all(&nested).expect("Failed to create protos dir");

    let path = nested.join("metrics.proto");
    fs::write(
        &path,
        r#"
            syntax = "proto2";

            message Sample {
                required string name = 1;
                optional double value = 2 [default = 1.5];
            }
        "#,
    )
    .expect("Failed to write metrics.proto");

    let schema =
        ProtoSchema::from_files(&[&path], &[&nested]).expect("Failed to load metrics.proto");
    let sample = schema.get_message("Sample").expect("Sample not found");
    let value = sample.field_by_name("value").expect("value field not found");
    assert_eq!(value.proto().default_value(), "1.5");
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let result = ProtoSchema::from_file(dir.path().join("absent.proto"));
    assert!(matches!(result, Err(Error::ProtobufParse(_))));
}
