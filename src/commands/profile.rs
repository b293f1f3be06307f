use std::io::{self, BufWriter, Write};

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::{DatasetArgs, OutputFormat, ProfileArgs};
use crate::codebook::{Codebook, label_to_code_mapping};
use crate::dataset::{ColumnSelection, Dataset};
use crate::error::ReviewError;
use crate::metrics::{ClassDistributionEntry, class_distribution};
use crate::model::{CodeRef, ProfileReport, ProfiledClass, SampleSizeEstimate};
use crate::sampling::{
    DEFAULT_EXPECTED_PROPORTION, SamplingMethod, calculate_sample_size, sample_size_classes,
    suggest_sampling_method,
};
use crate::util::print_json;

/// A loaded dataset with its label column summarized.
pub(crate) struct ProfiledDataset {
    pub dataset: Dataset,
    pub selection: ColumnSelection,
    pub distribution: Vec<ClassDistributionEntry>,
    pub suggested_method: SamplingMethod,
}

impl ProfiledDataset {
    pub fn load(args: &DatasetArgs, extra_columns: &[String]) -> Result<Self> {
        let dataset = Dataset::load_csv(&args.dataset)?;
        if dataset.is_empty() {
            return Err(ReviewError::EmptyDataset)
                .with_context(|| format!("{} has no data rows", args.dataset.display()));
        }
        let selection = dataset
            .select_columns(
                args.text_column.as_deref(),
                args.label_column.as_deref(),
                extra_columns,
            )
            .context("failed to resolve dataset columns")?;

        let distribution = class_distribution(dataset.column_values(selection.label))
            .with_context(|| format!("cannot profile {}", args.dataset.display()))?;
        let suggested_method = suggest_sampling_method(distribution.len(), &distribution)
            .context("failed to suggest a sampling method")?;

        info!(
            rows = dataset.len(),
            label_column = %dataset.columns()[selection.label],
            classes = distribution.len(),
            suggested = %suggested_method,
            "dataset profiled"
        );

        Ok(Self {
            dataset,
            selection,
            distribution,
            suggested_method,
        })
    }

    pub fn text_column(&self) -> &str {
        &self.dataset.columns()[self.selection.text]
    }

    pub fn label_column(&self) -> &str {
        &self.dataset.columns()[self.selection.label]
    }

    /// Selected extra column names, de-duplicated, in selection order.
    pub fn extra_columns(&self) -> Vec<String> {
        let columns = self.dataset.columns();
        self.selection
            .extras
            .iter()
            .map(|index| columns[*index].clone())
            .collect()
    }

    pub fn num_classes(&self) -> usize {
        self.distribution.len()
    }
}

pub fn run(args: ProfileArgs) -> Result<()> {
    let codebook = Codebook::load_or_builtin(args.codebook.codebook.as_deref())?;
    let profiled = ProfiledDataset::load(&args.dataset, &[])?;
    let report = build_report(&args, &profiled, &codebook)?;

    match args.format {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Text => write_text_report(&report),
    }
}

fn build_report(
    args: &ProfileArgs,
    profiled: &ProfiledDataset,
    codebook: &Codebook,
) -> Result<ProfileReport> {
    let mut sample_sizes = Vec::with_capacity(2);
    for method in [SamplingMethod::Binary, SamplingMethod::MultiClass] {
        let sample_size = calculate_sample_size(
            args.confidence,
            args.margin,
            sample_size_classes(method, profiled.num_classes()),
            DEFAULT_EXPECTED_PROPORTION,
        )?;
        sample_sizes.push(SampleSizeEstimate {
            method,
            confidence_level: args.confidence,
            margin_of_error: args.margin,
            sample_size,
        });
    }

    let mapping = label_to_code_mapping(
        profiled.distribution.iter().map(|entry| entry.label.as_str()),
        codebook,
    )?;
    let class_distribution = profiled
        .distribution
        .iter()
        .map(|entry| ProfiledClass {
            entry: entry.clone(),
            codebook: mapping
                .get(&entry.label)
                .and_then(Option::as_ref)
                .map(CodeRef::from),
        })
        .collect();

    Ok(ProfileReport {
        dataset_path: args.dataset.dataset.display().to_string(),
        rows: profiled.dataset.len(),
        text_column: profiled.text_column().to_string(),
        label_column: profiled.label_column().to_string(),
        num_classes: profiled.num_classes(),
        suggested_method: profiled.suggested_method,
        sample_sizes,
        class_distribution,
    })
}

fn write_text_report(report: &ProfileReport) -> Result<()> {
    let mut output = BufWriter::new(io::stdout().lock());

    writeln!(output, "Dataset: {} ({} rows)", report.dataset_path, report.rows)?;
    writeln!(
        output,
        "Columns: text={} label={}",
        report.text_column, report.label_column
    )?;
    writeln!(output, "Classes: {}", report.num_classes)?;
    writeln!(output)?;
    writeln!(output, "{:<24} {:>8} {:>8}  Codebook", "Label", "Count", "Share")?;
    for class in &report.class_distribution {
        let codebook = class
            .codebook
            .as_ref()
            .map(|code| format!("{} {}", code.code, code.name))
            .unwrap_or_else(|| "-".to_string());
        writeln!(
            output,
            "{:<24} {:>8} {:>7.1}%  {}",
            class.entry.label, class.entry.count, class.entry.percentage, codebook
        )?;
    }
    writeln!(output)?;
    writeln!(output, "Suggested sampling method: {}", report.suggested_method)?;
    for estimate in &report.sample_sizes {
        writeln!(
            output,
            "Sample size ({}, confidence={:.0}%, margin={:.2}): {}",
            estimate.method,
            estimate.confidence_level * 100.0,
            estimate.margin_of_error,
            estimate.sample_size
        )?;
    }

    output.flush()?;
    Ok(())
}
