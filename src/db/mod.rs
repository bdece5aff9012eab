//! Storage primitives over a single SQLite connection.
//!
//! Every function takes the `Connection` it runs on. Scheduling, locking and
//! lifecycle live in [`crate::queue`] and [`crate::store`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Result};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde_json::{json, Value};

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::model::{
    Attachment, AttachmentThumbnail, AttachmentType, ContactAvatar, MessageAttributes, MessageRow,
    Slots, SlotsMut, ROOT_EDIT_HISTORY_INDEX,
};
use crate::sql::{
    batch_multi_var_query, bind, sql_join, IntoSqlValue, MAX_VARIABLE_COUNT,
};

include!("parts/01_connection.rs");
include!("parts/02_items_and_triggers.rs");
include!("parts/03_messages.rs");
include!("parts/04_message_attachments.rs");
include!("parts/05_attachment_downloads.rs");
include!("parts/06_sync_tasks.rs");

#[cfg(test)]
mod attachment_downloads_tests;
#[cfg(test)]
mod message_attachments_tests;
#[cfg(test)]
mod messages_tests;
#[cfg(test)]
mod sync_tasks_tests;
