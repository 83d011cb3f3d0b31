//! # Pipeline Records
//!
//! The two record shapes that flow through the pipeline: the untyped
//! `RawRecord` exactly as the API returned it, and the typed `Character`
//! produced by the transform stage.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::ID_FIELD;

/// One entity as returned by the source API.
///
/// The record is kept as an untyped JSON object so the extract stage never
/// loses fields the transform stage does not know about yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(pub Map<String, Value>);

impl RawRecord {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns the stable identifier, rendering numeric ids as strings.
    ///
    /// Surrounding whitespace is trimmed. Blank strings, nulls and non-scalar
    /// values yield `None`.
    pub fn id(&self) -> Option<String> {
        match self.0.get(ID_FIELD)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

impl From<Map<String, Value>> for RawRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Wand details nested inside a character.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Wand {
    pub wood: Option<String>,
    pub core: Option<String>,
    pub length: Option<f64>,
}

/// A cleaned, typed character ready to be loaded into the store.
///
/// `id` is the raw record's identifier as returned by `RawRecord::id` (trimmed,
/// numbers rendered as strings) and is the upsert key in the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub alternate_names: Vec<String>,
    pub house: Option<String>,
    pub year_of_birth: Option<f64>,
    pub ancestry: Option<String>,
    pub gender: Option<String>,
    pub species: Option<String>,
    pub wizard: Option<bool>,
    #[serde(default)]
    pub wand: Wand,
    pub patronus: Option<String>,
    pub hogwarts_student: Option<bool>,
    pub hogwarts_staff: Option<bool>,
    pub actor: Option<String>,
    #[serde(default)]
    pub alternate_actors: Vec<String>,
    pub alive: Option<bool>,
    pub image: Option<String>,
    pub eye_colour: Option<String>,
    pub hair_colour: Option<String>,
    pub date_of_birth: Option<String>,
}
