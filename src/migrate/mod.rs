//! Versioned schema upgrades.
//!
//! The catalogue is split across `parts/`; the pieces are `include!`'d so
//! every step function lives in `crate::migrate` next to the engine.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use anyhow::{anyhow, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{json, Map, Value};

use crate::db::{
    enable_fts5_secure_delete, ensure_message_insert_triggers_are_enabled, in_transaction,
    schema_version, set_user_version, sqlite_version, user_version,
};
use crate::error::StoreError;

include!("parts/01_engine.rs");
include!("parts/02_v0001_v0015.rs");
include!("parts/03_v0016_v0020.rs");
include!("parts/04_v0021_v0040.rs");
include!("parts/05_v0041_uuid_keys.rs");
include!("parts/06_v0042_v0043.rs");
include!("parts/07_v1040_attachment_downloads.rs");
include!("parts/08_v1060_v1420.rs");
include!("parts/09_catalogue.rs");
