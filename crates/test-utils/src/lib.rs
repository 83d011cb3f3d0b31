use async_trait::async_trait;
use hpetl::{Document, DocumentStore, EtlError, IndexSpec, RawRecord, UpsertOutcome};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

// --- In-Memory Document Store ---

#[derive(Debug, Default)]
struct CollectionState {
    documents: Vec<Document>,
    indexes: Vec<IndexSpec>,
}

#[derive(Debug, Default)]
struct StoreState {
    collections: BTreeMap<String, CollectionState>,
    unreachable: bool,
    failing_ids: HashSet<String>,
    transient_failures: usize,
    closed: bool,
    index_creations: usize,
    upsert_calls: usize,
    writes: usize,
}

/// A `DocumentStore` kept entirely in memory.
///
/// Clones share the same state, so a test can hand one clone to the code
/// under test and inspect the other afterwards.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every operation fails with `StoreConnection`.
    pub fn unreachable() -> Self {
        let store = Self::new();
        store.state.lock().unwrap().unreachable = true;
        store
    }

    /// Makes upserts of the document with this `id` fail with `StoreWrite`.
    pub fn fail_writes_for(&self, id: &str) {
        self.state.lock().unwrap().failing_ids.insert(id.to_string());
    }

    /// Makes the next `count` upserts fail with `StoreWrite`, whatever the id.
    pub fn fail_next_writes(&self, count: usize) {
        self.state.lock().unwrap().transient_failures = count;
    }

    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.state
            .lock()
            .unwrap()
            .collections
            .get(collection)
            .map(|c| c.documents.clone())
            .unwrap_or_default()
    }

    pub fn index_names(&self, collection: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .collections
            .get(collection)
            .map(|c| c.indexes.iter().map(IndexSpec::name).collect())
            .unwrap_or_default()
    }

    pub fn collection_names(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .collections
            .keys()
            .cloned()
            .collect()
    }

    /// How many `create_index` calls actually added an index.
    pub fn index_creations(&self) -> usize {
        self.state.lock().unwrap().index_creations
    }

    /// How many times `upsert` was called, failed attempts included.
    pub fn upsert_calls(&self) -> usize {
        self.state.lock().unwrap().upsert_calls
    }

    /// Whether `close` was called. A closed store keeps serving calls so a
    /// test can run the pipeline against it again.
    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    /// How many upserts changed the stored data.
    pub fn write_count(&self) -> usize {
        self.state.lock().unwrap().writes
    }

    fn check_reachable(state: &StoreState) -> Result<(), EtlError> {
        if state.unreachable {
            Err(EtlError::StoreConnection(
                "memory store is configured as unreachable".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn ping(&self) -> Result<(), EtlError> {
        Self::check_reachable(&self.state.lock().unwrap())
    }

    async fn list_collections(&self) -> Result<Vec<String>, EtlError> {
        let state = self.state.lock().unwrap();
        Self::check_reachable(&state)?;
        Ok(state.collections.keys().cloned().collect())
    }

    async fn create_collection(&self, name: &str) -> Result<(), EtlError> {
        let mut state = self.state.lock().unwrap();
        Self::check_reachable(&state)?;
        if state.collections.contains_key(name) {
            return Err(EtlError::StoreWrite(format!(
                "collection '{name}' already exists"
            )));
        }
        state.collections.insert(name.to_string(), CollectionState::default());
        Ok(())
    }

    async fn list_indexes(&self, collection: &str) -> Result<Vec<String>, EtlError> {
        let state = self.state.lock().unwrap();
        Self::check_reachable(&state)?;
        let coll = state
            .collections
            .get(collection)
            .ok_or_else(|| EtlError::StoreWrite(format!("no collection '{collection}'")))?;
        Ok(coll.indexes.iter().map(IndexSpec::name).collect())
    }

    async fn create_index(&self, collection: &str, index: &IndexSpec) -> Result<(), EtlError> {
        let mut state = self.state.lock().unwrap();
        Self::check_reachable(&state)?;
        let coll = state.collections.entry(collection.to_string()).or_default();
        if coll.indexes.iter().any(|i| i.name() == index.name()) {
            return Ok(());
        }
        coll.indexes.push(index.clone());
        state.index_creations += 1;
        Ok(())
    }

    async fn upsert(
        &self,
        collection: &str,
        key_field: &str,
        document: Document,
    ) -> Result<UpsertOutcome, EtlError> {
        let mut state = self.state.lock().unwrap();
        Self::check_reachable(&state)?;
        state.upsert_calls += 1;
        if state.transient_failures > 0 {
            state.transient_failures -= 1;
            return Err(EtlError::StoreWrite("transient write failure".to_string()));
        }

        let key = document
            .get(key_field)
            .cloned()
            .ok_or_else(|| EtlError::StoreWrite(format!("document has no '{key_field}'")))?;
        if let Value::String(id) = &key {
            if state.failing_ids.contains(id) {
                return Err(EtlError::StoreWrite(format!("rejected write for '{id}'")));
            }
        }

        let coll = state.collections.entry(collection.to_string()).or_default();
        let outcome = match coll
            .documents
            .iter_mut()
            .find(|existing| existing.get(key_field) == Some(&key))
        {
            Some(existing) if *existing == document => UpsertOutcome::Unchanged,
            Some(existing) => {
                *existing = document;
                UpsertOutcome::Updated
            }
            None => {
                coll.documents.push(document);
                UpsertOutcome::Inserted
            }
        };
        if outcome != UpsertOutcome::Unchanged {
            state.writes += 1;
        }
        Ok(outcome)
    }

    async fn delete_all(&self, collection: &str) -> Result<u64, EtlError> {
        let mut state = self.state.lock().unwrap();
        Self::check_reachable(&state)?;
        Ok(state
            .collections
            .get_mut(collection)
            .map(|c| std::mem::take(&mut c.documents).len() as u64)
            .unwrap_or(0))
    }

    async fn count(&self, collection: &str) -> Result<u64, EtlError> {
        let state = self.state.lock().unwrap();
        Self::check_reachable(&state)?;
        Ok(state
            .collections
            .get(collection)
            .map(|c| c.documents.len() as u64)
            .unwrap_or(0))
    }

    async fn drop_collection(&self, collection: &str) -> Result<(), EtlError> {
        let mut state = self.state.lock().unwrap();
        Self::check_reachable(&state)?;
        state.collections.remove(collection);
        Ok(())
    }

    async fn close(&self) {
        self.state.lock().unwrap().closed = true;
    }
}

// --- Fixtures ---

/// Three characters shaped like the public Harry Potter API returns them.
pub fn sample_api_characters() -> Vec<Value> {
    vec![
        json!({
            "id": "9e3f7ce4-b9a7-4244-b709-dae5c1f1d4a8",
            "name": "Harry Potter",
            "alternate_names": ["The Boy Who Lived", "The Chosen One"],
            "species": "human",
            "gender": "male",
            "house": "Gryffindor",
            "dateOfBirth": "31-07-1980",
            "yearOfBirth": 1980,
            "wizard": true,
            "ancestry": "half-blood",
            "eyeColour": "green",
            "hairColour": "black",
            "wand": {"wood": "holly", "core": "phoenix tail feather", "length": 11},
            "patronus": "stag",
            "hogwartsStudent": true,
            "hogwartsStaff": false,
            "actor": "Daniel Radcliffe",
            "alternate_actors": [],
            "alive": true,
            "image": "https://ik.imagekit.io/hpapi/harry.jpg"
        }),
        json!({
            "id": "4c7e6819-a91a-45b2-a454-f931e4a7cce3",
            "name": "Hermione Granger",
            "alternate_names": [],
            "species": "human",
            "gender": "female",
            "house": "Gryffindor",
            "dateOfBirth": "19-09-1979",
            "yearOfBirth": 1979,
            "wizard": true,
            "ancestry": "muggleborn",
            "eyeColour": "brown",
            "hairColour": "brown",
            "wand": {"wood": "vine", "core": "dragon heartstring", "length": ""},
            "patronus": "otter",
            "hogwartsStudent": true,
            "hogwartsStaff": false,
            "actor": "Emma Watson",
            "alternate_actors": [],
            "alive": true,
            "image": ""
        }),
        json!({
            "id": "c3b1f9a5-b87b-48bf-b00d-95b093ea6390",
            "name": "Ron Weasley",
            "alternate_names": ["Dragomir Despard"],
            "species": "human",
            "gender": "male",
            "house": "Gryffindor",
            "dateOfBirth": "01-03-1980",
            "yearOfBirth": "1980",
            "wizard": true,
            "ancestry": "pure-blood",
            "eyeColour": "blue",
            "hairColour": "red",
            "wand": {"wood": "willow", "core": "unicorn tail-hair", "length": "14"},
            "patronus": "Jack Russell terrier",
            "hogwartsStudent": true,
            "hogwartsStaff": false,
            "actor": "Rupert Grint",
            "alternate_actors": [],
            "alive": true,
            "image": ""
        }),
    ]
}

pub fn sample_raw_records() -> Vec<RawRecord> {
    sample_api_characters()
        .into_iter()
        .map(|value| serde_json::from_value(value).unwrap())
        .collect()
}
