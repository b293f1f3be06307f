use std::io::{self, BufWriter, Write};

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::{OutputFormat, ReportArgs};
use crate::codebook::{Codebook, label_to_code_mapping};
use crate::commands::open_active_session;
use crate::metrics::{
    ConfusionMatrix, MetricsSnapshot, classification_metrics, confusion_matrix,
    confusion_matrix_strict,
};
use crate::model::{LabelUniverseMode, ReviewReport};
use crate::session::{self, LabeledRecord, SessionSummary};
use crate::util::print_json;

pub fn run(args: ReportArgs) -> Result<()> {
    let codebook = Codebook::load_or_builtin(args.codebook.codebook.as_deref())?;
    let (connection, summary) = open_active_session(&args.store)?;
    let reviewed = session::reviewed_records(&connection, &summary.session_id)?;

    let mode = if args.lenient {
        LabelUniverseMode::Lenient
    } else {
        LabelUniverseMode::Strict
    };
    let report = build_review_report(&summary, &reviewed, mode)?;

    match args.format {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Text => write_text_report(&report, &codebook),
    }
}

/// Metrics over every submitted label, recomputed from scratch.
///
/// Reviewer labels are the truth and the original predictions are scored
/// against them.
pub(crate) fn build_review_report(
    summary: &SessionSummary,
    reviewed: &[LabeledRecord],
    mode: LabelUniverseMode,
) -> Result<ReviewReport> {
    let mut report = ReviewReport {
        session_id: summary.session_id.clone(),
        reviewed: reviewed.len(),
        total: summary.record_count,
        progress: summary.progress(),
        corrections: reviewed
            .iter()
            .filter(|record| record.true_label() != record.predicted_label)
            .count(),
        label_universe_mode: mode,
        metrics: None,
        confusion_matrix: None,
    };
    if reviewed.is_empty() {
        return Ok(report);
    }

    let (metrics, matrix) = score(reviewed, &summary.labels, mode)?;
    report.metrics = Some(metrics);
    report.confusion_matrix = Some(matrix);
    Ok(report)
}

fn score(
    reviewed: &[LabeledRecord],
    labels: &[String],
    mode: LabelUniverseMode,
) -> Result<(MetricsSnapshot, ConfusionMatrix)> {
    let true_labels = reviewed
        .iter()
        .map(|record| record.true_label().to_string())
        .collect::<Vec<_>>();
    let predicted_labels = reviewed
        .iter()
        .map(|record| record.predicted_label.clone())
        .collect::<Vec<_>>();

    let metrics = classification_metrics(&true_labels, &predicted_labels)
        .context("failed to compute review metrics")?;
    let matrix = match mode {
        LabelUniverseMode::Strict => confusion_matrix_strict(&true_labels, &predicted_labels, labels),
        LabelUniverseMode::Lenient => confusion_matrix(&true_labels, &predicted_labels, labels),
    }
    .context("failed to build confusion matrix")?;

    info!(
        reviewed = reviewed.len(),
        accuracy = metrics.accuracy,
        f1 = metrics.f1,
        "metrics recomputed"
    );
    Ok((metrics, matrix))
}

pub(crate) fn write_metrics_block<W: Write>(output: &mut W, report: &ReviewReport) -> Result<()> {
    writeln!(
        output,
        "Reviewed: {}/{} ({:.0}%), corrections: {}",
        report.reviewed,
        report.total,
        report.progress * 100.0,
        report.corrections
    )?;

    let Some(metrics) = report.metrics else {
        writeln!(output, "No labels submitted yet.")?;
        return Ok(());
    };
    writeln!(output, "Accuracy:           {:.2}", metrics.accuracy)?;
    writeln!(output, "Weighted Precision: {:.2}", metrics.precision)?;
    writeln!(output, "Weighted Recall:    {:.2}", metrics.recall)?;
    writeln!(output, "Weighted F1 Score:  {:.2}", metrics.f1)?;
    Ok(())
}

fn write_text_report(report: &ReviewReport, codebook: &Codebook) -> Result<()> {
    let mut output = BufWriter::new(io::stdout().lock());
    writeln!(output, "Session: {}", report.session_id)?;
    write_metrics_block(&mut output, report)?;

    if let Some(matrix) = &report.confusion_matrix {
        writeln!(output)?;
        writeln!(
            output,
            "Confusion matrix (rows = true label, columns = predicted label, {} label set):",
            match report.label_universe_mode {
                LabelUniverseMode::Strict => "strict",
                LabelUniverseMode::Lenient => "lenient",
            }
        )?;
        write_confusion_matrix(&mut output, matrix, codebook)?;
        if matrix.total() < report.reviewed {
            writeln!(
                output,
                "{} of {} reviewed pairs fall outside the label set and were skipped.",
                report.reviewed - matrix.total(),
                report.reviewed
            )?;
        }
    }

    output.flush()?;
    Ok(())
}

fn write_confusion_matrix<W: Write>(
    output: &mut W,
    matrix: &ConfusionMatrix,
    codebook: &Codebook,
) -> Result<()> {
    let width = matrix
        .labels
        .iter()
        .map(|label| label.chars().count())
        .max()
        .unwrap_or(0)
        .max(5);

    write!(output, "{:<width$}", "")?;
    for label in &matrix.labels {
        write!(output, " {label:>width$}")?;
    }
    writeln!(output, " {:>width$}", "Total")?;

    let rows = matrix.labels.iter().zip(&matrix.counts);
    for ((label, row), row_total) in rows.zip(matrix.row_sums()) {
        write!(output, "{label:<width$}")?;
        for count in row {
            write!(output, " {count:>width$}")?;
        }
        writeln!(output, " {row_total:>width$}")?;
    }

    let mapping = label_to_code_mapping(matrix.labels.iter().map(String::as_str), codebook)?;
    let named = mapping
        .iter()
        .filter_map(|(label, entry)| entry.as_ref().map(|entry| (label, entry)))
        .collect::<Vec<_>>();
    if !named.is_empty() {
        writeln!(output)?;
        for (label, entry) in named {
            writeln!(output, "  {label}: {} {} ({})", entry.code, entry.name, entry.domain)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::sampling::SamplingMethod;

    fn summary(labels: &[&str], record_count: usize, reviewed_count: usize) -> SessionSummary {
        SessionSummary {
            session_id: "session-test".to_string(),
            created_at: "2026-01-01T00:00:00Z".to_string(),
            dataset_path: "data.csv".to_string(),
            dataset_sha256: "abc".to_string(),
            text_column: "text".to_string(),
            label_column: "class".to_string(),
            extra_columns: Vec::new(),
            method: SamplingMethod::MultiClass,
            seed: 42,
            current_index: 0,
            record_count,
            reviewed_count,
            labels: labels.iter().map(|label| label.to_string()).collect(),
        }
    }

    fn reviewed(pairs: &[(&str, &str)]) -> Vec<LabeledRecord> {
        pairs
            .iter()
            .enumerate()
            .map(|(position, (truth, predicted))| LabeledRecord {
                position,
                source_row: position,
                text: format!("text {position}"),
                predicted_label: predicted.to_string(),
                manual_label: Some(truth.to_string()),
                reviewed_at: Some("2026-01-01T00:00:00Z".to_string()),
                extras: BTreeMap::new(),
            })
            .collect()
    }

    #[test]
    fn report_scores_predictions_against_reviewer_labels() {
        let records = reviewed(&[("cat", "cat"), ("dog", "cat"), ("dog", "dog")]);
        let report = build_review_report(
            &summary(&["cat", "dog"], 4, 3),
            &records,
            LabelUniverseMode::Strict,
        )
        .expect("report should build");

        let metrics = report.metrics.expect("metrics should be present");
        assert!((metrics.accuracy - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(
            report.confusion_matrix.map(|matrix| matrix.counts),
            Some(vec![vec![1, 0], vec![1, 1]])
        );
        assert_eq!(report.corrections, 1);
        assert_eq!(report.total, 4);
        assert!((report.progress - 0.75).abs() < 1e-9);
    }

    #[test]
    fn report_without_reviews_only_tracks_progress() {
        let report = build_review_report(&summary(&["a"], 3, 0), &[], LabelUniverseMode::Strict)
            .expect("report should build");
        assert!(report.metrics.is_none());
        assert!(report.confusion_matrix.is_none());
        assert_eq!(report.reviewed, 0);
    }

    #[test]
    fn strict_mode_fails_on_predictions_outside_label_set() {
        let records = reviewed(&[("a", "a"), ("a", "legacy")]);
        let session = summary(&["a", "b"], 2, 2);

        let error = build_review_report(&session, &records, LabelUniverseMode::Strict)
            .expect_err("unknown prediction should fail in strict mode");
        assert!(
            format!("{error:#}").contains("legacy"),
            "unexpected error: {error:#}"
        );

        let report = build_review_report(&session, &records, LabelUniverseMode::Lenient)
            .expect("lenient mode should skip the unknown label");
        let matrix = report.confusion_matrix.expect("matrix should be present");
        assert_eq!(matrix.total(), 1);
    }

    #[test]
    fn confusion_matrix_text_has_row_totals_and_names() {
        let matrix = ConfusionMatrix {
            labels: vec!["per104".to_string(), "per105".to_string()],
            counts: vec![vec![2, 1], vec![0, 3]],
        };
        let codebook = Codebook::builtin().expect("built-in codebook");

        let mut buffer = Vec::new();
        write_confusion_matrix(&mut buffer, &matrix, &codebook).expect("matrix should render");
        let text = String::from_utf8(buffer).expect("utf-8 output");
        let lines = text.lines().collect::<Vec<_>>();

        assert!(lines[0].trim_end().ends_with("Total"), "{text}");
        assert_eq!(
            lines[1].split_whitespace().collect::<Vec<_>>(),
            vec!["per104", "2", "1", "3"]
        );
        assert!(text.contains("per104: per104 Military: Positive"), "{text}");
    }

    #[test]
    fn metrics_block_formats_two_decimals() {
        let records = reviewed(&[("a", "a"), ("b", "a")]);
        let report = build_review_report(
            &summary(&["a", "b"], 2, 2),
            &records,
            LabelUniverseMode::Strict,
        )
        .expect("report should build");

        let mut buffer = Vec::new();
        write_metrics_block(&mut buffer, &report).expect("block should render");
        let text = String::from_utf8(buffer).expect("utf-8 output");
        assert!(text.contains("Reviewed: 2/2 (100%), corrections: 1"), "{text}");
        assert!(text.contains("Accuracy:           0.50"), "{text}");
    }
}
