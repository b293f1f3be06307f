use std::fs;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::session;
use crate::util::{manifest_dir, resolve_db_path};

pub fn run(args: StatusArgs) -> Result<()> {
    let cache_root = &args.store.cache_root;
    let db_path = resolve_db_path(cache_root, args.store.db_path.as_deref());
    let manifests = manifest_dir(cache_root);

    info!(cache_root = %cache_root.display(), "status requested");

    if manifests.exists() {
        let mut session_manifests = fs::read_dir(&manifests)
            .with_context(|| format!("failed to read {}", manifests.display()))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with("review_session-") && name.ends_with(".json"))
            .collect::<Vec<_>>();
        session_manifests.sort();
        info!(
            path = %manifests.display(),
            count = session_manifests.len(),
            latest = %session_manifests.last().cloned().unwrap_or_default(),
            "session manifests"
        );
    } else {
        warn!(path = %manifests.display(), "manifest directory missing");
    }

    if !db_path.exists() {
        warn!(path = %db_path.display(), "session store missing");
        return Ok(());
    }

    let connection = session::open_store_read_only(&db_path)?;
    let Some(session_id) = session::active_session_id(&connection)? else {
        warn!(path = %db_path.display(), "no active review session");
        return Ok(());
    };
    let summary = session::load_session(&connection, &session_id)?;

    info!(
        session_id = %summary.session_id,
        created_at = %summary.created_at,
        dataset = %summary.dataset_path,
        dataset_sha256 = %summary.dataset_sha256,
        text_column = %summary.text_column,
        label_column = %summary.label_column,
        method = %summary.method,
        seed = summary.seed,
        labels = summary.labels.len(),
        current = summary.current_index + 1,
        reviewed = summary.reviewed_count,
        total = summary.record_count,
        complete = summary.is_complete(),
        "active review session"
    );

    Ok(())
}
