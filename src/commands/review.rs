use std::io::{self, BufWriter, Write};

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::{info, warn};

use crate::cli::{ReviewAction, ReviewArgs};
use crate::codebook::{Codebook, digit_pattern};
use crate::commands::open_active_session;
use crate::commands::report::{build_review_report, write_metrics_block};
use crate::model::LabelUniverseMode;
use crate::session::{self, LabeledRecord, SessionSummary};

pub fn run(args: ReviewArgs) -> Result<()> {
    let codebook = Codebook::load_or_builtin(args.codebook.codebook.as_deref())?;
    let (mut connection, summary) = open_active_session(&args.store)?;

    match args.action {
        ReviewAction::Show => {}
        ReviewAction::Submit { label } => {
            submit_current(&mut connection, &summary, Some(&label))?;
        }
        ReviewAction::Accept => {
            submit_current(&mut connection, &summary, None)?;
        }
        ReviewAction::Next => {
            let index = step(&summary, Direction::Forward);
            session::set_current_index(&connection, &summary.session_id, index)?;
        }
        ReviewAction::Previous => {
            let index = step(&summary, Direction::Backward);
            session::set_current_index(&connection, &summary.session_id, index)?;
        }
    }

    let summary = session::load_session(&connection, &summary.session_id)?;
    show_current(&connection, &summary, &codebook)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

/// Cursor after one navigation step, clamped to the sample.
fn step(summary: &SessionSummary, direction: Direction) -> usize {
    let last = summary.record_count.saturating_sub(1);
    match direction {
        Direction::Forward => (summary.current_index + 1).min(last),
        Direction::Backward => summary.current_index.saturating_sub(1),
    }
}

/// Records a label for the record under the cursor; `None` accepts the
/// prediction as correct.
fn submit_current(
    connection: &mut Connection,
    summary: &SessionSummary,
    label: Option<&str>,
) -> Result<()> {
    let records = session::load_records(connection, &summary.session_id)?;
    let record = records
        .get(summary.current_index)
        .with_context(|| format!("cursor {} is outside the sample", summary.current_index + 1))?;
    let label = label.unwrap_or(&record.predicted_label);

    let outcome = session::submit_label(connection, &summary.session_id, record.position, label)
        .with_context(|| format!("failed to submit label for record {}", record.position + 1))?;
    if outcome.corrected {
        info!(
            record = outcome.position + 1,
            predicted = %record.predicted_label,
            corrected = %label,
            "label corrected"
        );
    } else {
        info!(record = outcome.position + 1, label = %label, "prediction confirmed");
    }

    let summary = session::load_session(connection, &summary.session_id)?;
    let reviewed = session::reviewed_records(connection, &summary.session_id)?;
    match build_review_report(&summary, &reviewed, LabelUniverseMode::Strict) {
        Ok(report) => {
            let mut output = BufWriter::new(io::stdout().lock());
            write_metrics_block(&mut output, &report)?;
            writeln!(output)?;
            output.flush()?;
        }
        Err(err) => warn!(error = %format!("{err:#}"), "running metrics unavailable"),
    }

    if outcome.completed {
        info!(session_id = %summary.session_id, "review completed");
    } else {
        info!(next = outcome.next_index + 1, total = summary.record_count, "cursor advanced");
    }
    Ok(())
}

fn show_current(connection: &Connection, summary: &SessionSummary, codebook: &Codebook) -> Result<()> {
    let records = session::load_records(connection, &summary.session_id)?;
    let record = records
        .get(summary.current_index)
        .with_context(|| format!("cursor {} is outside the sample", summary.current_index + 1))?;

    let mut output = BufWriter::new(io::stdout().lock());
    write_record(&mut output, summary, record, codebook)?;
    output.flush()?;
    Ok(())
}

fn write_record<W: Write>(
    output: &mut W,
    summary: &SessionSummary,
    record: &LabeledRecord,
    codebook: &Codebook,
) -> Result<()> {
    let digits = digit_pattern()?;
    let describe = |label: &str| match codebook.resolve_label(label, &digits) {
        Some(entry) => format!("{label} ({} {})", entry.code, entry.name),
        None => label.to_string(),
    };

    writeln!(
        output,
        "Text to code ({}/{}):",
        record.position + 1,
        summary.record_count
    )?;
    writeln!(output, "{}", record.text)?;
    if !record.extras.is_empty() {
        writeln!(output)?;
        writeln!(output, "Additional information:")?;
        for (column, value) in &record.extras {
            writeln!(output, "  {column}: {value}")?;
        }
    }
    writeln!(output)?;
    writeln!(output, "Predicted label: {}", describe(&record.predicted_label))?;
    match &record.manual_label {
        Some(label) => writeln!(output, "Manual label:    {}", describe(label))?,
        None => writeln!(output, "Manual label:    (not reviewed)")?,
    }
    writeln!(
        output,
        "Progress: {}/{} reviewed",
        summary.reviewed_count, summary.record_count
    )?;
    if summary.is_complete() {
        writeln!(output, "Coding completed!")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::sampling::SamplingMethod;

    fn summary(current_index: usize, record_count: usize) -> SessionSummary {
        SessionSummary {
            session_id: "session-test".to_string(),
            created_at: "2026-01-01T00:00:00Z".to_string(),
            dataset_path: "data.csv".to_string(),
            dataset_sha256: "abc".to_string(),
            text_column: "text".to_string(),
            label_column: "class".to_string(),
            extra_columns: vec!["speaker".to_string()],
            method: SamplingMethod::Binary,
            seed: 42,
            current_index,
            record_count,
            reviewed_count: 0,
            labels: vec!["per104".to_string(), "per105".to_string()],
        }
    }

    #[test]
    fn navigation_is_clamped_to_the_sample() {
        assert_eq!(step(&summary(0, 3), Direction::Backward), 0);
        assert_eq!(step(&summary(0, 3), Direction::Forward), 1);
        assert_eq!(step(&summary(2, 3), Direction::Forward), 2);
        assert_eq!(step(&summary(2, 3), Direction::Backward), 1);
    }

    #[test]
    fn record_view_shows_codebook_names_and_extras() {
        let record = LabeledRecord {
            position: 1,
            source_row: 17,
            text: "Our armed forces need modern equipment".to_string(),
            predicted_label: "per104".to_string(),
            manual_label: None,
            reviewed_at: None,
            extras: BTreeMap::from([("speaker".to_string(), "Minister".to_string())]),
        };
        let codebook = Codebook::builtin().expect("built-in codebook");

        let mut buffer = Vec::new();
        write_record(&mut buffer, &summary(1, 3), &record, &codebook).expect("record should render");
        let text = String::from_utf8(buffer).expect("utf-8 output");

        assert!(text.contains("Text to code (2/3):"), "{text}");
        assert!(text.contains("speaker: Minister"), "{text}");
        assert!(
            text.contains("Predicted label: per104 (per104 Military: Positive)"),
            "{text}"
        );
        assert!(text.contains("(not reviewed)"), "{text}");
    }
}
