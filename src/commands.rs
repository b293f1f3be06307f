pub mod codebook;
pub mod export;
pub mod profile;
pub mod report;
pub mod review;
pub mod sample;
pub mod status;

use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::cli::StoreArgs;
use crate::session::{self, SessionSummary};
use crate::util::resolve_db_path;

/// Opens the session store and loads whichever session `sample` made active.
pub(crate) fn open_active_session(store: &StoreArgs) -> Result<(Connection, SessionSummary)> {
    let db_path = resolve_db_path(&store.cache_root, store.db_path.as_deref());
    if !db_path.exists() {
        anyhow::bail!(
            "no session store at {}; run `codeval sample` first",
            db_path.display()
        );
    }

    let connection = session::open_store(&db_path)?;
    let session_id = session::active_session_id(&connection)?
        .context("no active review session; run `codeval sample` first")?;
    let summary = session::load_session(&connection, &session_id)?;
    Ok((connection, summary))
}
