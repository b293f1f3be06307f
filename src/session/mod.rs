//! SQLite-backed review session: the drawn sample, the reviewer's cursor and
//! the corrections submitted so far.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;

use crate::error::ReviewError;
use crate::sampling::SamplingMethod;
use crate::util::now_utc_string;

pub const DB_SCHEMA_VERSION: &str = "0.1.0";
pub const DB_FILENAME: &str = "codeval_review.sqlite";

mod db_setup;
mod store;
mod types;

pub use db_setup::{open_store, open_store_read_only};
pub use store::{
    active_session_id, create_session, load_records, load_session, reviewed_records,
    set_current_index, submit_label, unique_session_id,
};
pub use types::{LabeledRecord, NewRecord, NewSession, SessionSummary, SubmitOutcome};

use db_setup::*;
