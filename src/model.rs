use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::codebook::CodebookEntry;
use crate::metrics::{ClassDistributionEntry, ConfusionMatrix, MetricsSnapshot};
use crate::sampling::SamplingMethod;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeRef {
    pub code: String,
    pub name: String,
    pub domain: String,
}

impl From<&CodebookEntry> for CodeRef {
    fn from(entry: &CodebookEntry) -> Self {
        Self {
            code: entry.code.clone(),
            name: entry.name.clone(),
            domain: entry.domain.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfiledClass {
    #[serde(flatten)]
    pub entry: ClassDistributionEntry,
    pub codebook: Option<CodeRef>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SampleSizeEstimate {
    pub method: SamplingMethod,
    pub confidence_level: f64,
    pub margin_of_error: f64,
    pub sample_size: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileReport {
    pub dataset_path: String,
    pub rows: usize,
    pub text_column: String,
    pub label_column: String,
    pub num_classes: usize,
    pub suggested_method: SamplingMethod,
    pub sample_sizes: Vec<SampleSizeEstimate>,
    pub class_distribution: Vec<ProfiledClass>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SamplingPlan {
    pub suggested_method: SamplingMethod,
    pub method: SamplingMethod,
    pub seed: u64,
    pub confidence_level: Option<f64>,
    pub margin_of_error: Option<f64>,
    pub calculated_sample_size: Option<usize>,
    pub min_per_class: Option<usize>,
    pub max_per_class: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionManifest {
    pub manifest_version: u32,
    pub session_id: String,
    pub generated_at: String,
    pub dataset_path: String,
    pub dataset_sha256: String,
    pub dataset_rows: usize,
    pub text_column: String,
    pub label_column: String,
    pub extra_columns: Vec<String>,
    pub plan: SamplingPlan,
    pub sample_count: usize,
    pub sample_distribution: Vec<ClassDistributionEntry>,
    pub labels: Vec<String>,
    pub db_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelUniverseMode {
    Strict,
    Lenient,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewReport {
    pub session_id: String,
    pub reviewed: usize,
    pub total: usize,
    pub progress: f64,
    pub corrections: usize,
    pub label_universe_mode: LabelUniverseMode,
    pub metrics: Option<MetricsSnapshot>,
    pub confusion_matrix: Option<ConfusionMatrix>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportRecord {
    pub text: String,
    pub predicted_label: String,
    pub manual_label: String,
    #[serde(flatten)]
    pub extras: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportDocument {
    pub manifest_version: u32,
    pub session_id: String,
    pub exported_at: String,
    pub dataset_path: String,
    pub dataset_sha256: String,
    pub records: Vec<ExportRecord>,
    pub metrics: Option<MetricsSnapshot>,
    pub confusion_matrix: Option<ConfusionMatrix>,
}
