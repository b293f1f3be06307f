//! Class distribution, weighted classification metrics and confusion matrices.
//!
//! Everything here is a pure function over borrowed label slices, so callers
//! can recompute from scratch after every correction.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{ReviewError, ReviewResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDistributionEntry {
    pub label: String,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Square count matrix; rows are true labels, columns predicted labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub labels: Vec<String>,
    pub counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    pub fn row_sums(&self) -> Vec<usize> {
        self.counts.iter().map(|row| row.iter().sum()).collect()
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }
}

/// Counts each label and its share of the total.
///
/// Entries are ordered by count descending, ties by label ascending.
pub fn class_distribution<'a, I>(labels: I) -> ReviewResult<Vec<ClassDistributionEntry>>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts = HashMap::<&str, usize>::new();
    let mut total = 0_usize;
    for label in labels {
        *counts.entry(label).or_insert(0) += 1;
        total += 1;
    }

    if total == 0 {
        return Err(ReviewError::EmptyDataset);
    }

    let mut entries = counts
        .into_iter()
        .map(|(label, count)| ClassDistributionEntry {
            label: label.to_string(),
            count,
            percentage: count as f64 / total as f64 * 100.0,
        })
        .collect::<Vec<_>>();
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));

    Ok(entries)
}

/// Accuracy plus support-weighted precision, recall and F1.
///
/// A label whose precision, recall or F1 denominator is zero contributes 0
/// to that average.
pub fn classification_metrics<S: AsRef<str>>(
    true_labels: &[S],
    predicted_labels: &[S],
) -> ReviewResult<MetricsSnapshot> {
    ensure_same_length(true_labels.len(), predicted_labels.len())?;
    if true_labels.is_empty() {
        return Err(ReviewError::EmptyDataset);
    }

    let mut tallies = BTreeMap::<&str, LabelTally>::new();
    let mut correct = 0_usize;
    for (truth, predicted) in true_labels.iter().zip(predicted_labels) {
        let truth = truth.as_ref();
        let predicted = predicted.as_ref();

        tallies.entry(truth).or_default().support += 1;
        tallies.entry(predicted).or_default().predicted += 1;
        if truth == predicted {
            correct += 1;
            tallies.entry(truth).or_default().true_positives += 1;
        }
    }

    let total = true_labels.len() as f64;
    let mut precision = 0.0_f64;
    let mut recall = 0.0_f64;
    let mut f1 = 0.0_f64;
    for tally in tallies.values() {
        let weight = tally.support as f64;
        precision += weight * safe_ratio(tally.true_positives, tally.predicted);
        recall += weight * safe_ratio(tally.true_positives, tally.support);
        f1 += weight * tally.f1();
    }

    Ok(MetricsSnapshot {
        accuracy: correct as f64 / total,
        precision: precision / total,
        recall: recall / total,
        f1: f1 / total,
    })
}

/// Confusion matrix over `label_universe`, silently skipping any pair whose
/// true or predicted label is outside it.
pub fn confusion_matrix<S: AsRef<str>>(
    true_labels: &[S],
    predicted_labels: &[S],
    label_universe: &[S],
) -> ReviewResult<ConfusionMatrix> {
    build_confusion_matrix(true_labels, predicted_labels, label_universe, false)
}

/// Like [`confusion_matrix`], but a label outside `label_universe` is an error.
pub fn confusion_matrix_strict<S: AsRef<str>>(
    true_labels: &[S],
    predicted_labels: &[S],
    label_universe: &[S],
) -> ReviewResult<ConfusionMatrix> {
    build_confusion_matrix(true_labels, predicted_labels, label_universe, true)
}

fn build_confusion_matrix<S: AsRef<str>>(
    true_labels: &[S],
    predicted_labels: &[S],
    label_universe: &[S],
    strict: bool,
) -> ReviewResult<ConfusionMatrix> {
    ensure_same_length(true_labels.len(), predicted_labels.len())?;
    if label_universe.is_empty() {
        return Err(ReviewError::invalid("label universe is empty"));
    }

    let mut index = HashMap::<&str, usize>::with_capacity(label_universe.len());
    for (position, label) in label_universe.iter().enumerate() {
        if index.insert(label.as_ref(), position).is_some() {
            return Err(ReviewError::invalid(format!(
                "label universe contains duplicate label: {}",
                label.as_ref()
            )));
        }
    }

    let size = label_universe.len();
    let mut counts = vec![vec![0_usize; size]; size];
    for (truth, predicted) in true_labels.iter().zip(predicted_labels) {
        let row = index.get(truth.as_ref());
        let col = index.get(predicted.as_ref());
        match (row, col) {
            (Some(&row), Some(&col)) => counts[row][col] += 1,
            _ if strict => {
                let unknown = if row.is_none() { truth } else { predicted };
                return Err(ReviewError::invalid(format!(
                    "label not in label universe: {}",
                    unknown.as_ref()
                )));
            }
            _ => {}
        }
    }

    Ok(ConfusionMatrix {
        labels: label_universe
            .iter()
            .map(|label| label.as_ref().to_string())
            .collect(),
        counts,
    })
}

/// Sorted, de-duplicated labels.
pub fn unique_labels<'a, I>(labels: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    labels
        .into_iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(ToOwned::to_owned)
        .collect()
}

#[derive(Debug, Default)]
struct LabelTally {
    true_positives: usize,
    predicted: usize,
    support: usize,
}

impl LabelTally {
    fn f1(&self) -> f64 {
        let false_positives = self.predicted - self.true_positives;
        let false_negatives = self.support - self.true_positives;
        safe_ratio(
            2 * self.true_positives,
            2 * self.true_positives + false_positives + false_negatives,
        )
    }
}

fn safe_ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn ensure_same_length(true_len: usize, predicted_len: usize) -> ReviewResult<()> {
    if true_len != predicted_len {
        return Err(ReviewError::LengthMismatch {
            true_len,
            predicted_len,
        });
    }
    Ok(())
}
