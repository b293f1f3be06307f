use super::*;

/// One drawn record waiting for review.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub source_row: usize,
    pub text: String,
    pub predicted_label: String,
    pub extras: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct NewSession {
    pub session_id: String,
    pub dataset_path: String,
    pub dataset_sha256: String,
    pub text_column: String,
    pub label_column: String,
    pub extra_columns: Vec<String>,
    pub method: SamplingMethod,
    pub seed: u64,
    /// Sorted choices offered to the reviewer; also the confusion matrix axis.
    pub labels: Vec<String>,
    pub records: Vec<NewRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub created_at: String,
    pub dataset_path: String,
    pub dataset_sha256: String,
    pub text_column: String,
    pub label_column: String,
    pub extra_columns: Vec<String>,
    pub method: SamplingMethod,
    pub seed: u64,
    pub current_index: usize,
    pub record_count: usize,
    pub reviewed_count: usize,
    pub labels: Vec<String>,
}

impl SessionSummary {
    pub fn is_complete(&self) -> bool {
        self.record_count > 0 && self.reviewed_count == self.record_count
    }

    pub fn progress(&self) -> f64 {
        if self.record_count == 0 {
            0.0
        } else {
            self.reviewed_count as f64 / self.record_count as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabeledRecord {
    pub position: usize,
    pub source_row: usize,
    pub text: String,
    pub predicted_label: String,
    pub manual_label: Option<String>,
    pub reviewed_at: Option<String>,
    pub extras: BTreeMap<String, String>,
}

impl LabeledRecord {
    /// The reviewer's label, or the prediction until one is submitted.
    pub fn true_label(&self) -> &str {
        self.manual_label.as_deref().unwrap_or(&self.predicted_label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub position: usize,
    pub corrected: bool,
    pub next_index: usize,
    pub completed: bool,
}
