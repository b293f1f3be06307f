use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, bail};
use csv::ReaderBuilder;
use tracing::info;

use crate::error::ReviewError;

const LABEL_COLUMN_HINT: &str = "class";

/// Headered table held in memory; every row has one value per column.
#[derive(Debug, Clone)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

/// Column positions the review workflow reads from.
#[derive(Debug, Clone)]
pub struct ColumnSelection {
    pub text: usize,
    pub label: usize,
    pub extras: Vec<usize>,
}

impl Dataset {
    pub fn load_csv(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        let dataset = Self::from_reader(file)
            .with_context(|| format!("failed to read csv {}", path.display()))?;

        info!(
            path = %path.display(),
            rows = dataset.len(),
            columns = dataset.columns.len(),
            "dataset loaded"
        );
        Ok(dataset)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(reader);
        let columns = reader
            .headers()
            .context("failed to read csv header")?
            .iter()
            .map(|name| name.trim().to_string())
            .collect::<Vec<_>>();
        if columns.is_empty() {
            bail!("csv has no columns");
        }

        let mut rows: Vec<Vec<String>> = Vec::new();
        for (index, record) in reader.records().enumerate() {
            // csv rejects ragged rows unless the reader is flexible.
            let record = record.with_context(|| format!("failed to parse csv row {}", index + 1))?;
            rows.push(record.iter().map(ToOwned::to_owned).collect());
        }

        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<&[String]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    pub fn column_index(&self, name: &str) -> Result<usize, ReviewError> {
        self.columns
            .iter()
            .position(|column| column == name)
            .ok_or_else(|| {
                ReviewError::invalid(format!(
                    "unknown column '{name}'; available: {}",
                    self.columns.join(", ")
                ))
            })
    }

    pub fn column_values(&self, column: usize) -> impl Iterator<Item = &str> {
        self.rows.iter().map(move |row| row[column].as_str())
    }

    /// Explicit names win; otherwise text is the first column and the label
    /// is the first column whose name mentions "class".
    pub fn select_columns(
        &self,
        text_column: Option<&str>,
        label_column: Option<&str>,
        extra_columns: &[String],
    ) -> Result<ColumnSelection, ReviewError> {
        let text = match text_column {
            Some(name) => self.column_index(name)?,
            None => 0,
        };
        let label = match label_column {
            Some(name) => self.column_index(name)?,
            None => self
                .columns
                .iter()
                .position(|column| column.to_lowercase().contains(LABEL_COLUMN_HINT))
                .ok_or_else(|| {
                    ReviewError::invalid(
                        "no column name contains 'class'; pass --label-column explicitly",
                    )
                })?,
        };

        let mut extras = Vec::with_capacity(extra_columns.len());
        for name in extra_columns {
            let index = self.column_index(name)?;
            if index == text || index == label {
                return Err(ReviewError::invalid(format!(
                    "extra column '{name}' is already the text or label column"
                )));
            }
            if !extras.contains(&index) {
                extras.push(index);
            }
        }

        Ok(ColumnSelection {
            text,
            label,
            extras,
        })
    }
}
