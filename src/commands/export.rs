use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use csv::Writer;
use tracing::info;

use crate::cli::{ExportArgs, ExportFormat};
use crate::commands::open_active_session;
use crate::commands::report::build_review_report;
use crate::model::{ExportDocument, ExportRecord, LabelUniverseMode};
use crate::session::{self, LabeledRecord, SessionSummary};
use crate::util::{ensure_directory, now_utc_string, write_json_pretty};

const EXPORT_BASENAME: &str = "manually_coded_sample";

pub fn run(args: ExportArgs) -> Result<()> {
    let (connection, summary) = open_active_session(&args.store)?;
    let reviewed = session::reviewed_records(&connection, &summary.session_id)?;
    if reviewed.is_empty() {
        bail!(
            "session {} has no reviewed records to export",
            summary.session_id
        );
    }

    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&args.store.cache_root, args.format));

    match args.format {
        ExportFormat::Csv => write_csv(&output_path, &summary, &reviewed)?,
        ExportFormat::Json => {
            let mode = if args.lenient {
                LabelUniverseMode::Lenient
            } else {
                LabelUniverseMode::Strict
            };
            let document = build_document(&summary, &reviewed, mode)?;
            write_json_pretty(&output_path, &document)?;
        }
    }

    info!(
        path = %output_path.display(),
        format = args.format.as_str(),
        records = reviewed.len(),
        "results exported"
    );
    Ok(())
}

fn export_record(record: &LabeledRecord) -> ExportRecord {
    ExportRecord {
        text: record.text.clone(),
        predicted_label: record.predicted_label.clone(),
        manual_label: record.true_label().to_string(),
        extras: record.extras.clone(),
    }
}

fn build_document(
    summary: &SessionSummary,
    reviewed: &[LabeledRecord],
    mode: LabelUniverseMode,
) -> Result<ExportDocument> {
    let report = build_review_report(summary, reviewed, mode)?;
    Ok(ExportDocument {
        manifest_version: 1,
        session_id: summary.session_id.clone(),
        exported_at: now_utc_string(),
        dataset_path: summary.dataset_path.clone(),
        dataset_sha256: summary.dataset_sha256.clone(),
        records: reviewed.iter().map(export_record).collect(),
        metrics: report.metrics,
        confusion_matrix: report.confusion_matrix,
    })
}

/// Reviewed records as CSV: text, predicted label, manual label, then the
/// session's extra columns in the order they were selected.
fn write_csv(path: &Path, summary: &SessionSummary, reviewed: &[LabeledRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }

    let mut writer =
        Writer::from_path(path).with_context(|| format!("failed to create {}", path.display()))?;

    let mut header = vec!["text", "predicted_label", "manual_label"];
    header.extend(summary.extra_columns.iter().map(String::as_str));
    writer.write_record(&header)?;

    for record in reviewed {
        let mut row = vec![
            record.text.as_str(),
            record.predicted_label.as_str(),
            record.true_label(),
        ];
        row.extend(
            summary
                .extra_columns
                .iter()
                .map(|column| record.extras.get(column).map(String::as_str).unwrap_or("")),
        );
        writer
            .write_record(&row)
            .with_context(|| format!("failed to write record {}", record.position + 1))?;
    }

    writer
        .flush()
        .with_context(|| format!("failed to flush {}", path.display()))?;
    Ok(())
}

fn default_output_path(cache_root: &Path, format: ExportFormat) -> PathBuf {
    cache_root
        .join("exports")
        .join(format!("{EXPORT_BASENAME}.{}", format.as_str()))
}
