//! # Transform Stage Tests
//!
//! Checks the field mapping, both validation policies, and that every
//! transformed character traces back to exactly one raw record.

use anyhow::Result;
use hpetl::snapshot::{read_snapshot, write_snapshot};
use hpetl::{Character, EtlError, RawRecord, Stage, ValidationPolicy};
use hpetl_test_utils::sample_raw_records;
use hpetl_transform::{CharacterTransformer, TransformStage, ValidationError};
use serde_json::json;
use std::collections::HashSet;
use tempfile::tempdir;

fn raw(value: serde_json::Value) -> RawRecord {
    serde_json::from_value(value).unwrap()
}

#[test]
fn test_transform_renames_and_cleans_fields() {
    let transformer = CharacterTransformer::default();
    let records = sample_raw_records();

    let harry = transformer.transform_record(&records[0]).unwrap();
    assert_eq!(harry.id, "9e3f7ce4-b9a7-4244-b709-dae5c1f1d4a8");
    assert_eq!(harry.name, "Harry Potter");
    assert_eq!(harry.year_of_birth, Some(1980.0));
    assert_eq!(harry.hogwarts_student, Some(true));
    assert_eq!(harry.hogwarts_staff, Some(false));
    assert_eq!(harry.eye_colour.as_deref(), Some("green"));
    assert_eq!(harry.date_of_birth.as_deref(), Some("31-07-1980"));
    assert_eq!(harry.wand.core.as_deref(), Some("phoenix tail feather"));
    assert_eq!(harry.wand.length, Some(11.0));
    assert_eq!(harry.alternate_names.len(), 2);

    let hermione = transformer.transform_record(&records[1]).unwrap();
    assert_eq!(hermione.wand.length, None);
    assert_eq!(hermione.image, None);

    let ron = transformer.transform_record(&records[2]).unwrap();
    assert_eq!(ron.year_of_birth, Some(1980.0));
    assert_eq!(ron.wand.length, Some(14.0));
}

#[test]
fn test_transformed_json_uses_snake_case_keys() {
    let character = CharacterTransformer::default()
        .transform_record(&sample_raw_records()[0])
        .unwrap();
    let value = serde_json::to_value(&character).unwrap();

    assert!(value.get("year_of_birth").is_some());
    assert!(value.get("hogwarts_student").is_some());
    assert!(value.get("yearOfBirth").is_none());
    assert_eq!(value["wand"]["wood"], json!("holly"));
}

#[test]
fn test_missing_name_and_id_are_rejected() {
    let transformer = CharacterTransformer::default();

    assert_eq!(
        transformer.transform_record(&raw(json!({"id": "x"}))),
        Err(ValidationError::MissingField("name"))
    );
    assert_eq!(
        transformer.transform_record(&raw(json!({"id": "x", "name": "  "}))),
        Err(ValidationError::MissingField("name"))
    );
    assert_eq!(
        transformer.transform_record(&raw(json!({"name": "Harry"}))),
        Err(ValidationError::MissingField("id"))
    );
    assert!(matches!(
        transformer.transform_record(&raw(json!({"id": "x", "name": 7}))),
        Err(ValidationError::InvalidType { field: "name", .. })
    ));
}

#[test]
fn test_skip_policy_drops_exactly_the_invalid_record() {
    let mut records = sample_raw_records();
    records.insert(1, raw(json!({"id": "no-name", "house": "Slytherin"})));
    let transformer = CharacterTransformer::new(ValidationPolicy::Skip);

    let outcome = transformer.transform_all(&records).unwrap();

    assert_eq!(outcome.characters.len(), records.len() - 1);
    assert_eq!(outcome.rejected.len(), 1);
    assert_eq!(outcome.rejected[0].index, 1);
    assert_eq!(outcome.rejected[0].id.as_deref(), Some("no-name"));
}

#[test]
fn test_abort_policy_fails_on_first_invalid_record() {
    let mut records = sample_raw_records();
    records.push(raw(json!({"id": "no-name"})));
    let transformer = CharacterTransformer::new(ValidationPolicy::Abort);

    let result = transformer.transform_all(&records);

    match result {
        Err(EtlError::Validation(message)) => assert!(message.contains("no-name")),
        other => panic!("expected a validation error, got {other:?}"),
    }
}

#[test]
fn test_duplicate_ids_keep_only_the_first_record() {
    let records = vec![
        raw(json!({"id": "dup", "name": "First"})),
        raw(json!({"id": "dup", "name": "Second"})),
    ];

    let outcome = CharacterTransformer::default()
        .transform_all(&records)
        .unwrap();

    assert_eq!(outcome.characters.len(), 1);
    assert_eq!(outcome.characters[0].name, "First");
    assert_eq!(
        outcome.rejected[0].error,
        ValidationError::DuplicateId("dup".to_string())
    );
}

#[test]
fn test_every_transformed_record_traces_to_one_raw_record() {
    let mut records = sample_raw_records();
    records.push(raw(json!({"id": "", "name": "Nameless"})));
    records.push(raw(json!({"id": 7, "name": "Numbered"})));

    let outcome = CharacterTransformer::default()
        .transform_all(&records)
        .unwrap();

    assert!(outcome.characters.len() <= records.len());
    let raw_ids: Vec<String> = records.iter().filter_map(RawRecord::id).collect();
    let mut seen = HashSet::new();
    for character in &outcome.characters {
        assert_eq!(
            raw_ids.iter().filter(|id| **id == character.id).count(),
            1,
            "character '{}' must map to exactly one raw record",
            character.id
        );
        assert!(seen.insert(character.id.clone()));
    }
}

#[tokio::test]
async fn test_transform_stage_reads_and_writes_snapshots() -> Result<()> {
    // --- Arrange ---
    let dir = tempdir()?;
    let input = dir.path().join("1.raw_data.json");
    let output = dir.path().join("2.transformed_data.json");
    write_snapshot(&input, &sample_raw_records())?;
    let stage = TransformStage {
        transformer: CharacterTransformer::default(),
        input: input.clone(),
        output: output.clone(),
    };

    // --- Act ---
    let report = stage.run().await?;

    // --- Assert ---
    assert_eq!(report.records_read, 3);
    assert_eq!(report.records_written, 3);
    assert_eq!(report.records_skipped, 0);
    let characters: Vec<Character> = read_snapshot(&output)?;
    assert_eq!(characters[2].name, "Ron Weasley");
    Ok(())
}

#[test]
fn test_transform_without_raw_snapshot_fails_fast() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("2.transformed_data.json");

    let result = CharacterTransformer::default()
        .transform_file(&dir.path().join("1.raw_data.json"), &output);

    assert!(matches!(result, Err(EtlError::Precondition(_))));
    assert!(!output.exists());
}

#[test]
fn test_abort_policy_leaves_no_transformed_snapshot() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("1.raw_data.json");
    let output = dir.path().join("2.transformed_data.json");
    write_snapshot(&input, &[raw(json!({"id": "1"}))]).unwrap();

    let result = CharacterTransformer::new(ValidationPolicy::Abort).transform_file(&input, &output);

    assert!(matches!(result, Err(EtlError::Validation(_))));
    assert!(!output.exists());
}

#[test]
fn test_non_object_element_is_skipped_under_skip_policy() -> Result<()> {
    // --- Arrange ---
    let dir = tempdir()?;
    let input = dir.path().join("1.raw_data.json");
    let output = dir.path().join("2.transformed_data.json");
    write_snapshot(
        &input,
        &[
            json!({"id": "1", "name": "Harry Potter"}),
            json!(42),
            json!({"id": "3", "name": "Ron Weasley"}),
        ],
    )?;

    // --- Act ---
    let report = CharacterTransformer::new(ValidationPolicy::Skip).transform_file(&input, &output)?;

    // --- Assert ---
    assert_eq!(report.records_read, 3);
    assert_eq!(report.records_written, 2);
    assert_eq!(report.records_skipped, 1);
    let characters: Vec<Character> = read_snapshot(&output)?;
    assert_eq!(characters[1].name, "Ron Weasley");
    Ok(())
}

#[test]
fn test_non_object_element_is_rejected_by_either_policy() {
    let outcome = CharacterTransformer::new(ValidationPolicy::Skip)
        .transform_values(&[json!("not a record")])
        .unwrap();
    assert_eq!(outcome.rejected[0].error, ValidationError::NotAnObject);
    assert_eq!(outcome.rejected[0].id, None);

    let result =
        CharacterTransformer::new(ValidationPolicy::Abort).transform_values(&[json!(null)]);
    assert!(matches!(result, Err(EtlError::Validation(_))));
}
