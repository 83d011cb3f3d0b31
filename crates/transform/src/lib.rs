//! # `hpetl-transform`: Character Transformation Stage
//!
//! Reads the raw snapshot, maps each API record onto a typed `Character`
//! (snake_case fields, numeric parsing, blank-to-null cleanup), validates the
//! required fields and writes the transformed snapshot.
//!
//! Invalid records are handled according to `ValidationPolicy`: `Skip` drops
//! them with a warning, `Abort` fails the stage on the first one.

pub mod mapping;

use async_trait::async_trait;
use hpetl::{
    snapshot, Character, EtlError, RawRecord, Stage, StageKind, StageReport, ValidationPolicy,
    Wand,
};
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::mapping::{boolean, clean_string, parse_numeric, string_list};

/// Why a single raw record could not become a `Character`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("required field '{0}' is missing or blank")]
    MissingField(&'static str),
    #[error("field '{field}' must be {expected}")]
    InvalidType {
        field: &'static str,
        expected: &'static str,
    },
    #[error("identifier '{0}' appears more than once")]
    DuplicateId(String),
    #[error("record is not a JSON object")]
    NotAnObject,
}

/// A raw record dropped under the `Skip` policy.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    /// Position of the record in the raw snapshot.
    pub index: usize,
    pub id: Option<String>,
    pub error: ValidationError,
}

#[derive(Debug, Clone, Default)]
pub struct TransformOutcome {
    pub characters: Vec<Character>,
    pub rejected: Vec<Rejection>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CharacterTransformer {
    policy: ValidationPolicy,
}

impl CharacterTransformer {
    pub fn new(policy: ValidationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ValidationPolicy {
        self.policy
    }

    /// Maps one raw record, without any cross-record checks.
    pub fn transform_record(&self, raw: &RawRecord) -> Result<Character, ValidationError> {
        let id = raw.id().ok_or(ValidationError::MissingField("id"))?;
        let name = match raw.get("name") {
            None | Some(Value::Null) => return Err(ValidationError::MissingField("name")),
            Some(Value::String(_)) => {
                clean_string(raw.get("name")).ok_or(ValidationError::MissingField("name"))?
            }
            Some(_) => {
                return Err(ValidationError::InvalidType {
                    field: "name",
                    expected: "a string",
                })
            }
        };

        let wand = raw.get("wand");
        let wand_field = |key: &str| wand.and_then(|w| w.get(key));

        Ok(Character {
            id,
            name,
            alternate_names: string_list(raw.get("alternate_names")),
            house: clean_string(raw.get("house")),
            year_of_birth: parse_numeric(raw.get("yearOfBirth")),
            ancestry: clean_string(raw.get("ancestry")),
            gender: clean_string(raw.get("gender")),
            species: clean_string(raw.get("species")),
            wizard: boolean(raw.get("wizard")),
            wand: Wand {
                wood: clean_string(wand_field("wood")),
                core: clean_string(wand_field("core")),
                length: parse_numeric(wand_field("length")),
            },
            patronus: clean_string(raw.get("patronus")),
            hogwarts_student: boolean(raw.get("hogwartsStudent")),
            hogwarts_staff: boolean(raw.get("hogwartsStaff")),
            actor: clean_string(raw.get("actor")),
            alternate_actors: string_list(raw.get("alternate_actors")),
            alive: boolean(raw.get("alive")),
            image: clean_string(raw.get("image")),
            eye_colour: clean_string(raw.get("eyeColour")),
            hair_colour: clean_string(raw.get("hairColour")),
            date_of_birth: clean_string(raw.get("dateOfBirth")),
        })
    }

    /// Maps every record in order, applying the validation policy.
    ///
    /// The second and later occurrences of an identifier are rejected so each
    /// character traces back to exactly one raw record.
    pub fn transform_all(&self, raw: &[RawRecord]) -> Result<TransformOutcome, EtlError> {
        info!("Transforming {} characters...", raw.len());
        self.transform_each(raw.iter().cloned().map(Ok))
    }

    /// Like `transform_all`, for snapshot elements that may not be objects.
    /// A non-object element is an invalid record under the active policy.
    pub fn transform_values(&self, elements: &[Value]) -> Result<TransformOutcome, EtlError> {
        info!("Transforming {} characters...", elements.len());
        self.transform_each(elements.iter().map(|element| match element {
            Value::Object(map) => Ok(RawRecord::from(map.clone())),
            _ => Err(ValidationError::NotAnObject),
        }))
    }

    fn transform_each<I>(&self, records: I) -> Result<TransformOutcome, EtlError>
    where
        I: IntoIterator<Item = Result<RawRecord, ValidationError>>,
    {
        let mut outcome = TransformOutcome::default();
        let mut seen = HashSet::new();

        for (index, record) in records.into_iter().enumerate() {
            let id = record.as_ref().ok().and_then(RawRecord::id);
            let result = record
                .and_then(|raw| self.transform_record(&raw))
                .and_then(|character| {
                    if seen.insert(character.id.clone()) {
                        Ok(character)
                    } else {
                        Err(ValidationError::DuplicateId(character.id))
                    }
                });

            match result {
                Ok(character) => outcome.characters.push(character),
                Err(error) => {
                    if self.policy == ValidationPolicy::Abort {
                        return Err(EtlError::Validation(format!(
                            "record {index} (id: {}): {error}",
                            id.as_deref().unwrap_or("<none>")
                        )));
                    }
                    warn!(
                        "Skipping record {index} (id: {}): {error}",
                        id.as_deref().unwrap_or("<none>")
                    );
                    outcome.rejected.push(Rejection { index, id, error });
                }
            }
        }

        info!(
            "Characters transformed: {} ({} skipped)",
            outcome.characters.len(),
            outcome.rejected.len()
        );
        Ok(outcome)
    }

    /// Reads the raw snapshot at `input` and writes the transformed one to
    /// `output`.
    pub fn transform_file(&self, input: &Path, output: &Path) -> Result<StageReport, EtlError> {
        let raw: Vec<Value> = snapshot::read_snapshot(input)?;
        let outcome = self.transform_values(&raw)?;
        snapshot::write_snapshot(output, &outcome.characters)?;

        let mut report = StageReport::new(
            StageKind::Transform,
            input.display().to_string(),
            output.display().to_string(),
        );
        report.records_read = raw.len();
        report.records_written = outcome.characters.len();
        report.records_skipped = outcome.rejected.len();
        Ok(report)
    }
}

/// The transform stage bound to its input and output paths.
pub struct TransformStage {
    pub transformer: CharacterTransformer,
    pub input: PathBuf,
    pub output: PathBuf,
}

#[async_trait]
impl Stage for TransformStage {
    fn kind(&self) -> StageKind {
        StageKind::Transform
    }

    async fn run(&self) -> Result<StageReport, EtlError> {
        self.transformer.transform_file(&self.input, &self.output)
    }
}
