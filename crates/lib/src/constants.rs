//! # Shared Constants
//!
//! File names, defaults and store identifiers used by more than one crate in
//! the workspace.

/// The raw snapshot written by the extract stage.
pub const RAW_SNAPSHOT_FILE: &str = "1.raw_data.json";

/// The transformed snapshot written by the transform stage.
pub const TRANSFORMED_SNAPSHOT_FILE: &str = "2.transformed_data.json";

/// The directory holding both snapshots when nothing else is configured.
pub const DEFAULT_DATA_DIR: &str = "data";

pub const DEFAULT_API_BASE_URL: &str = "https://hp-api.onrender.com/api";

pub const DEFAULT_RESOURCE: &str = "characters";

pub const DEFAULT_MONGO_CONNECTION: &str = "mongodb://localhost:27017/";

pub const DEFAULT_DATABASE: &str = "harry_potter";

/// The collection characters are loaded into.
pub const CHARACTERS_COLLECTION: &str = "characters";

/// The stable identifier shared by raw, transformed and stored records.
pub const ID_FIELD: &str = "id";

/// The default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "hpetl.yml";
