use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use crate::cli::SampleArgs;
use crate::commands::profile::ProfiledDataset;
use crate::metrics::{class_distribution, unique_labels};
use crate::model::{SamplingPlan, SessionManifest};
use crate::sampling::{
    DEFAULT_EXPECTED_PROPORTION, SamplingMethod, calculate_sample_size, random_sample,
    sample_size_classes, stratified_sample,
};
use crate::session::{self, NewRecord, NewSession};
use crate::util::{
    manifest_dir, now_utc_string, resolve_db_path, sha256_file, utc_compact_string,
    write_json_pretty,
};

pub fn run(args: SampleArgs) -> Result<()> {
    let started_ts = Utc::now();

    let profiled = ProfiledDataset::load(&args.dataset, &args.extra_columns)?;
    let method = args
        .method
        .map(SamplingMethod::from)
        .unwrap_or(profiled.suggested_method);
    if method != profiled.suggested_method {
        warn!(
            suggested = %profiled.suggested_method,
            chosen = %method,
            "overriding suggested sampling method"
        );
    }

    let (rows, plan) = draw_rows(&args, &profiled, method)?;
    let records = build_records(&profiled, &rows);
    let labels = unique_labels(profiled.dataset.column_values(profiled.selection.label));
    let sample_distribution =
        class_distribution(records.iter().map(|record| record.predicted_label.as_str()))
            .context("sample drew no records")?;

    let db_path = resolve_db_path(&args.store.cache_root, args.store.db_path.as_deref());
    let mut connection = session::open_store(&db_path)?;
    let session_id = session::unique_session_id(
        &connection,
        &format!("session-{}", utc_compact_string(started_ts)),
    )?;

    let dataset_sha256 = sha256_file(&args.dataset.dataset)?;
    let new_session = NewSession {
        session_id: session_id.clone(),
        dataset_path: args.dataset.dataset.display().to_string(),
        dataset_sha256,
        text_column: profiled.text_column().to_string(),
        label_column: profiled.label_column().to_string(),
        extra_columns: profiled.extra_columns(),
        method,
        seed: args.seed,
        labels,
        records,
    };

    session::create_session(&mut connection, &new_session)?;
    info!(
        session_id = %session_id,
        method = %method,
        records = new_session.records.len(),
        db_path = %db_path.display(),
        "review session created"
    );

    let manifest = SessionManifest {
        manifest_version: 1,
        session_id: session_id.clone(),
        generated_at: now_utc_string(),
        dataset_path: new_session.dataset_path.clone(),
        dataset_sha256: new_session.dataset_sha256.clone(),
        dataset_rows: profiled.dataset.len(),
        text_column: new_session.text_column.clone(),
        label_column: new_session.label_column.clone(),
        extra_columns: new_session.extra_columns.clone(),
        plan,
        sample_count: new_session.records.len(),
        sample_distribution,
        labels: new_session.labels.clone(),
        db_path: db_path.display().to_string(),
    };
    let manifest_path = args
        .manifest_path
        .clone()
        .unwrap_or_else(|| default_manifest_path(&args.store.cache_root, &session_id));
    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote session manifest");

    Ok(())
}

/// Source rows for the chosen method, plus the plan that produced them.
fn draw_rows(
    args: &SampleArgs,
    profiled: &ProfiledDataset,
    method: SamplingMethod,
) -> Result<(Vec<usize>, SamplingPlan)> {
    let mut plan = SamplingPlan {
        suggested_method: profiled.suggested_method,
        method,
        seed: args.seed,
        confidence_level: None,
        margin_of_error: None,
        calculated_sample_size: None,
        min_per_class: None,
        max_per_class: None,
    };

    let rows = match method {
        SamplingMethod::Binary | SamplingMethod::MultiClass => {
            let sample_size = calculate_sample_size(
                args.confidence,
                args.margin,
                sample_size_classes(method, profiled.num_classes()),
                DEFAULT_EXPECTED_PROPORTION,
            )?;
            plan.confidence_level = Some(args.confidence);
            plan.margin_of_error = Some(args.margin);
            plan.calculated_sample_size = Some(sample_size);

            if sample_size > profiled.dataset.len() {
                info!(
                    sample_size,
                    rows = profiled.dataset.len(),
                    "sample size exceeds dataset; reviewing every row"
                );
            }
            random_sample(profiled.dataset.len(), sample_size, args.seed)
        }
        SamplingMethod::Stratified => {
            let labels = profiled
                .dataset
                .column_values(profiled.selection.label)
                .collect::<Vec<_>>();
            plan.min_per_class = Some(args.min_per_class);
            plan.max_per_class = Some(args.max_per_class);
            stratified_sample(
                &labels,
                &profiled.distribution,
                args.min_per_class,
                args.max_per_class,
                args.seed,
            )?
        }
    };

    Ok((rows, plan))
}

fn build_records(profiled: &ProfiledDataset, rows: &[usize]) -> Vec<NewRecord> {
    let columns = profiled.dataset.columns();
    rows.iter()
        .filter_map(|row_index| {
            let row = profiled.dataset.row(*row_index)?;
            let extras = profiled
                .selection
                .extras
                .iter()
                .map(|column| (columns[*column].clone(), row[*column].clone()))
                .collect::<BTreeMap<_, _>>();
            Some(NewRecord {
                source_row: *row_index,
                text: row[profiled.selection.text].clone(),
                predicted_label: row[profiled.selection.label].clone(),
                extras,
            })
        })
        .collect()
}

fn default_manifest_path(cache_root: &Path, session_id: &str) -> PathBuf {
    manifest_dir(cache_root).join(format!("review_{session_id}.json"))
}
