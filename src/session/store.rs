use super::*;

const ACTIVE_SESSION_KEY: &str = "active_session_id";

/// Persists a freshly drawn sample and makes it the active session.
pub fn create_session(connection: &mut Connection, session: &NewSession) -> Result<()> {
    if session.records.is_empty() {
        return Err(ReviewError::EmptyDataset).context("sample has no records to review");
    }
    if session.labels.is_empty() {
        bail!("session label set is empty");
    }

    let created_at = now_utc_string();
    let extra_columns_json = serde_json::to_string(&session.extra_columns)
        .context("failed to serialize extra column names")?;

    let tx = connection.transaction()?;
    tx.execute(
        "
        INSERT INTO sessions(
          session_id, created_at, dataset_path, dataset_sha256, text_column,
          label_column, extra_columns_json, method, seed, current_index
        )
        VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0)
        ",
        params![
            &session.session_id,
            created_at,
            &session.dataset_path,
            &session.dataset_sha256,
            &session.text_column,
            &session.label_column,
            extra_columns_json,
            session.method.as_str(),
            session.seed as i64,
        ],
    )
    .with_context(|| format!("failed to insert session {}", session.session_id))?;

    {
        let mut statement = tx.prepare(
            "INSERT INTO session_labels(session_id, label_order, label) VALUES(?1, ?2, ?3)",
        )?;
        for (order, label) in session.labels.iter().enumerate() {
            statement
                .execute(params![&session.session_id, order as i64, label])
                .with_context(|| format!("failed to insert label {label}"))?;
        }
    }

    {
        let mut statement = tx.prepare(
            "
            INSERT INTO sample_records(
              session_id, position, source_row, text, predicted_label, extras_json
            )
            VALUES(?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )?;
        for (position, record) in session.records.iter().enumerate() {
            let extras_json = serde_json::to_string(&record.extras)
                .context("failed to serialize extra column values")?;
            statement.execute(params![
                &session.session_id,
                position as i64,
                record.source_row as i64,
                &record.text,
                &record.predicted_label,
                extras_json,
            ])?;
        }
    }

    write_metadata(&tx, ACTIVE_SESSION_KEY, &session.session_id)?;
    tx.commit()?;
    Ok(())
}

/// `base`, or `base-2`, `base-3`, ... when a session already has that id.
pub fn unique_session_id(connection: &Connection, base: &str) -> Result<String> {
    let mut candidate = base.to_string();
    let mut suffix = 2_u32;
    while session_exists(connection, &candidate)? {
        candidate = format!("{base}-{suffix}");
        suffix += 1;
    }
    Ok(candidate)
}

fn session_exists(connection: &Connection, session_id: &str) -> Result<bool> {
    connection
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sessions WHERE session_id = ?1)",
            [session_id],
            |row| row.get::<_, bool>(0),
        )
        .with_context(|| format!("failed to look up session {session_id}"))
}

pub fn active_session_id(connection: &Connection) -> Result<Option<String>> {
    read_metadata(connection, ACTIVE_SESSION_KEY)
}

pub fn load_session(connection: &Connection, session_id: &str) -> Result<SessionSummary> {
    let row = connection
        .query_row(
            "
            SELECT
              created_at, dataset_path, dataset_sha256, text_column, label_column,
              extra_columns_json, method, seed, current_index,
              (SELECT COUNT(*) FROM sample_records r WHERE r.session_id = s.session_id),
              (SELECT COUNT(*) FROM sample_records r
                 WHERE r.session_id = s.session_id AND r.manual_label IS NOT NULL)
            FROM sessions s
            WHERE session_id = ?1
            ",
            [session_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, i64>(7)?,
                    row.get::<_, i64>(8)?,
                    row.get::<_, i64>(9)?,
                    row.get::<_, i64>(10)?,
                ))
            },
        )
        .optional()
        .with_context(|| format!("failed to load session {session_id}"))?;

    let Some((
        created_at,
        dataset_path,
        dataset_sha256,
        text_column,
        label_column,
        extra_columns_json,
        method,
        seed,
        current_index,
        record_count,
        reviewed_count,
    )) = row
    else {
        bail!("review session not found: {session_id}");
    };

    let method = SamplingMethod::parse(&method)
        .with_context(|| format!("session {session_id} has unknown sampling method {method}"))?;
    let extra_columns: Vec<String> = serde_json::from_str(&extra_columns_json)
        .with_context(|| format!("session {session_id} has malformed extra columns"))?;

    Ok(SessionSummary {
        session_id: session_id.to_string(),
        created_at,
        dataset_path,
        dataset_sha256,
        text_column,
        label_column,
        extra_columns,
        method,
        seed: seed as u64,
        current_index: current_index as usize,
        record_count: record_count as usize,
        reviewed_count: reviewed_count as usize,
        labels: load_labels(connection, session_id)?,
    })
}

fn load_labels(connection: &Connection, session_id: &str) -> Result<Vec<String>> {
    let mut statement = connection.prepare(
        "SELECT label FROM session_labels WHERE session_id = ?1 ORDER BY label_order",
    )?;
    let labels = statement
        .query_map([session_id], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(labels)
}

/// Every record of the sample, in draw order.
pub fn load_records(connection: &Connection, session_id: &str) -> Result<Vec<LabeledRecord>> {
    query_records(
        connection,
        session_id,
        "
        SELECT position, source_row, text, predicted_label, manual_label, reviewed_at, extras_json
        FROM sample_records
        WHERE session_id = ?1
        ORDER BY position
        ",
    )
}

/// Reviewed records in the order their labels were submitted.
pub fn reviewed_records(connection: &Connection, session_id: &str) -> Result<Vec<LabeledRecord>> {
    query_records(
        connection,
        session_id,
        "
        SELECT position, source_row, text, predicted_label, manual_label, reviewed_at, extras_json
        FROM sample_records
        WHERE session_id = ?1 AND manual_label IS NOT NULL
        ORDER BY reviewed_seq
        ",
    )
}

fn query_records(connection: &Connection, session_id: &str, sql: &str) -> Result<Vec<LabeledRecord>> {
    let mut statement = connection.prepare(sql)?;
    let mut rows = statement.query([session_id])?;

    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        let extras_json: String = row.get(6)?;
        let extras = serde_json::from_str(&extras_json)
            .with_context(|| format!("malformed extras for session {session_id}"))?;
        records.push(LabeledRecord {
            position: row.get::<_, i64>(0)? as usize,
            source_row: row.get::<_, i64>(1)? as usize,
            text: row.get(2)?,
            predicted_label: row.get(3)?,
            manual_label: row.get(4)?,
            reviewed_at: row.get(5)?,
            extras,
        });
    }

    Ok(records)
}

pub fn set_current_index(connection: &Connection, session_id: &str, index: usize) -> Result<()> {
    let updated = connection.execute(
        "UPDATE sessions SET current_index = ?2 WHERE session_id = ?1",
        params![session_id, index as i64],
    )?;
    if updated == 0 {
        bail!("review session not found: {session_id}");
    }
    Ok(())
}

/// Records the reviewer's label for the record at `position`.
///
/// A record takes exactly one label, which must be one of the session's
/// labels. The cursor moves to the next record unless this is the last one.
pub fn submit_label(
    connection: &mut Connection,
    session_id: &str,
    position: usize,
    label: &str,
) -> Result<SubmitOutcome> {
    let session = load_session(connection, session_id)?;
    if !session.labels.iter().any(|known| known == label) {
        return Err(ReviewError::invalid(format!(
            "label '{label}' is not one of the session labels"
        ))
        .into());
    }

    let tx = connection.transaction()?;
    let existing = tx
        .query_row(
            "
            SELECT predicted_label, manual_label
            FROM sample_records
            WHERE session_id = ?1 AND position = ?2
            ",
            params![session_id, position as i64],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?)),
        )
        .optional()?;

    let Some((predicted_label, manual_label)) = existing else {
        return Err(ReviewError::invalid(format!(
            "record {} is outside the sample of {}",
            position + 1,
            session.record_count
        ))
        .into());
    };
    if manual_label.is_some() {
        return Err(ReviewError::invalid(format!(
            "record {} has already been reviewed",
            position + 1
        ))
        .into());
    }

    let next_seq: i64 = tx.query_row(
        "SELECT COALESCE(MAX(reviewed_seq), 0) + 1 FROM sample_records WHERE session_id = ?1",
        [session_id],
        |row| row.get(0),
    )?;
    tx.execute(
        "
        UPDATE sample_records
        SET manual_label = ?3, reviewed_seq = ?4, reviewed_at = ?5
        WHERE session_id = ?1 AND position = ?2
        ",
        params![session_id, position as i64, label, next_seq, now_utc_string()],
    )?;

    let last = session.record_count.saturating_sub(1);
    let next_index = if position < last { position + 1 } else { position };
    tx.execute(
        "UPDATE sessions SET current_index = ?2 WHERE session_id = ?1",
        params![session_id, next_index as i64],
    )?;
    tx.commit()?;

    Ok(SubmitOutcome {
        position,
        corrected: predicted_label != label,
        next_index,
        completed: session.reviewed_count + 1 == session.record_count,
    })
}
