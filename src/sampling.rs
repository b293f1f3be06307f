//! Sampling method suggestion, sample sizing and seeded sample draws.

use std::fmt;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index;
use serde::{Deserialize, Serialize};

use crate::error::{ReviewError, ReviewResult};
use crate::metrics::ClassDistributionEntry;

pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_EXPECTED_PROPORTION: f64 = 0.5;

const STRATIFY_ABOVE_CLASS_COUNT: usize = 10;
const STRATIFY_BELOW_PERCENTAGE: f64 = 1.0;
const Z_SCORE_95: f64 = 1.96;
const Z_SCORE_99: f64 = 2.576;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SamplingMethod {
    Binary,
    MultiClass,
    Stratified,
}

impl SamplingMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Binary => "binary",
            Self::MultiClass => "multi-class",
            Self::Stratified => "stratified",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "binary" => Some(Self::Binary),
            "multi-class" | "multiclass" => Some(Self::MultiClass),
            "stratified" => Some(Self::Stratified),
            _ => None,
        }
    }
}

impl fmt::Display for SamplingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Advisory strategy for a dataset with `num_classes` labels.
///
/// Two classes are always binary. More than ten classes, or any class under
/// one percent of the data, calls for stratification.
pub fn suggest_sampling_method(
    num_classes: usize,
    distribution: &[ClassDistributionEntry],
) -> ReviewResult<SamplingMethod> {
    if num_classes == 0 {
        return Err(ReviewError::invalid("number of classes must be positive"));
    }
    if num_classes == 2 {
        return Ok(SamplingMethod::Binary);
    }
    if num_classes > STRATIFY_ABOVE_CLASS_COUNT {
        return Ok(SamplingMethod::Stratified);
    }

    let min_percentage = distribution
        .iter()
        .map(|entry| entry.percentage)
        .min_by(|a, b| a.total_cmp(b))
        .ok_or_else(|| ReviewError::invalid("class distribution is empty"))?;

    if min_percentage < STRATIFY_BELOW_PERCENTAGE {
        Ok(SamplingMethod::Stratified)
    } else {
        Ok(SamplingMethod::MultiClass)
    }
}

pub fn z_score(confidence_level: f64) -> ReviewResult<f64> {
    if (confidence_level - 0.95).abs() < 1e-9 {
        Ok(Z_SCORE_95)
    } else if (confidence_level - 0.99).abs() < 1e-9 {
        Ok(Z_SCORE_99)
    } else {
        Err(ReviewError::invalid(format!(
            "unsupported confidence level {confidence_level}; expected 0.95 or 0.99"
        )))
    }
}

/// Records needed to estimate a proportion within `margin_of_error`,
/// scaled by the number of classes.
pub fn calculate_sample_size(
    confidence_level: f64,
    margin_of_error: f64,
    num_classes: usize,
    expected_proportion: f64,
) -> ReviewResult<usize> {
    let z = z_score(confidence_level)?;
    if !(margin_of_error > 0.0 && margin_of_error < 1.0) {
        return Err(ReviewError::invalid(format!(
            "margin of error must be between 0 and 1, got {margin_of_error}"
        )));
    }
    if !(expected_proportion > 0.0 && expected_proportion < 1.0) {
        return Err(ReviewError::invalid(format!(
            "expected proportion must be between 0 and 1, got {expected_proportion}"
        )));
    }
    if num_classes == 0 {
        return Err(ReviewError::invalid("number of classes must be positive"));
    }

    let size = z.powi(2) * expected_proportion * (1.0 - expected_proportion) * num_classes as f64
        / margin_of_error.powi(2);
    Ok(size.ceil() as usize)
}

/// Classes the sample size formula should scale by for `method`.
pub fn sample_size_classes(method: SamplingMethod, num_classes: usize) -> usize {
    match method {
        SamplingMethod::MultiClass => num_classes,
        SamplingMethod::Binary | SamplingMethod::Stratified => 2,
    }
}

/// Up to `sample_size` distinct row indices out of `population`.
pub fn random_sample(population: usize, sample_size: usize, seed: u64) -> Vec<usize> {
    let mut rng = StdRng::seed_from_u64(seed);
    index::sample(&mut rng, population, sample_size.min(population)).into_vec()
}

/// Per-class draws, concatenated in distribution order.
///
/// The floor is lowered to the smallest class count; each class then takes
/// `min(max(floor, count), max_per_class)` rows.
pub fn stratified_sample<S: AsRef<str>>(
    labels: &[S],
    distribution: &[ClassDistributionEntry],
    min_per_class: usize,
    max_per_class: usize,
    seed: u64,
) -> ReviewResult<Vec<usize>> {
    if min_per_class == 0 {
        return Err(ReviewError::invalid("minimum samples per class must be at least 1"));
    }
    if max_per_class < min_per_class {
        return Err(ReviewError::invalid(format!(
            "maximum samples per class ({max_per_class}) is below the minimum ({min_per_class})"
        )));
    }

    let smallest_class = distribution
        .iter()
        .map(|entry| entry.count)
        .min()
        .ok_or(ReviewError::EmptyDataset)?;
    let floor = min_per_class.min(smallest_class);

    let mut rng = StdRng::seed_from_u64(seed);
    let mut sampled = Vec::new();
    for entry in distribution {
        let rows = labels
            .iter()
            .enumerate()
            .filter(|(_, label)| label.as_ref() == entry.label)
            .map(|(row, _)| row)
            .collect::<Vec<_>>();
        if rows.len() != entry.count {
            return Err(ReviewError::invalid(format!(
                "class distribution lists {} rows for '{}' but the dataset has {}",
                entry.count,
                entry.label,
                rows.len()
            )));
        }

        let size = floor.max(entry.count).min(max_per_class);
        sampled.extend(
            index::sample(&mut rng, rows.len(), size)
                .into_iter()
                .map(|position| rows[position]),
        );
    }

    Ok(sampled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::class_distribution;

    fn entries(percentages: &[f64]) -> Vec<ClassDistributionEntry> {
        percentages
            .iter()
            .enumerate()
            .map(|(index, percentage)| ClassDistributionEntry {
                label: format!("class-{index}"),
                count: (*percentage * 10.0) as usize,
                percentage: *percentage,
            })
            .collect()
    }

    #[test]
    fn two_classes_are_always_binary() {
        assert_eq!(
            suggest_sampling_method(2, &entries(&[0.1, 99.9])).expect("suggestion"),
            SamplingMethod::Binary
        );
        assert_eq!(
            suggest_sampling_method(2, &[]).expect("suggestion"),
            SamplingMethod::Binary
        );
    }

    #[test]
    fn many_classes_are_stratified() {
        // Every class is above one percent, so only the class count decides.
        let balanced = entries(&[100.0 / 12.0; 12]);
        assert_eq!(
            suggest_sampling_method(12, &balanced).expect("suggestion"),
            SamplingMethod::Stratified
        );
        let balanced = entries(&[10.0; 10]);
        assert_eq!(
            suggest_sampling_method(10, &balanced).expect("suggestion"),
            SamplingMethod::MultiClass
        );
    }

    #[test]
    fn rare_class_triggers_stratification() {
        assert_eq!(
            suggest_sampling_method(5, &entries(&[0.5, 99.5, 0.0, 0.0, 0.0])).expect("suggestion"),
            SamplingMethod::Stratified
        );
    }

    #[test]
    fn balanced_classes_use_multi_class() {
        assert_eq!(
            suggest_sampling_method(5, &entries(&[20.0; 5])).expect("suggestion"),
            SamplingMethod::MultiClass
        );
        assert_eq!(
            suggest_sampling_method(1, &entries(&[100.0])).expect("suggestion"),
            SamplingMethod::MultiClass
        );
    }

    #[test]
    fn exactly_one_percent_is_not_rare() {
        let distribution = entries(&[1.0, 49.5, 49.5]);
        assert_eq!(
            suggest_sampling_method(3, &distribution).expect("suggestion"),
            SamplingMethod::MultiClass
        );
    }

    #[test]
    fn zero_classes_fail_fast() {
        let error = suggest_sampling_method(0, &[]).expect_err("zero classes should fail");
        assert!(matches!(error, ReviewError::InvalidInput(_)));
        assert!(suggest_sampling_method(4, &[]).is_err());
    }

    #[test]
    fn sample_size_matches_reference_values() {
        assert_eq!(calculate_sample_size(0.95, 0.05, 2, 0.5).expect("size"), 769);
        assert_eq!(calculate_sample_size(0.99, 0.05, 2, 0.5).expect("size"), 1328);
        assert_eq!(calculate_sample_size(0.95, 0.05, 5, 0.5).expect("size"), 1921);
        assert_eq!(calculate_sample_size(0.95, 0.10, 2, 0.5).expect("size"), 193);
    }

    #[test]
    fn sample_size_rejects_unsupported_inputs() {
        assert!(calculate_sample_size(0.90, 0.05, 2, 0.5).is_err());
        assert!(calculate_sample_size(0.95, 0.0, 2, 0.5).is_err());
        assert!(calculate_sample_size(0.95, 0.05, 0, 0.5).is_err());
        assert!(calculate_sample_size(0.95, 0.05, 2, 1.0).is_err());
    }

    #[test]
    fn random_sample_is_deterministic_and_bounded() {
        let first = random_sample(100, 10, DEFAULT_SEED);
        let second = random_sample(100, 10, DEFAULT_SEED);
        assert_eq!(first, second, "same seed should draw the same rows");
        assert_eq!(first.len(), 10);
        assert!(first.iter().all(|row| *row < 100));

        let mut unique = first.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), first.len(), "rows should be distinct");

        assert_eq!(random_sample(3, 10, DEFAULT_SEED).len(), 3);
    }

    #[test]
    fn stratified_sample_caps_each_class() {
        let mut labels = vec!["a"; 50];
        labels.extend(vec!["b"; 8]);
        labels.extend(vec!["c"; 2]);
        let distribution = class_distribution(labels.iter().copied()).expect("distribution");

        let rows = stratified_sample(&labels, &distribution, 5, 30, DEFAULT_SEED)
            .expect("stratified sample");
        let count = |label: &str| rows.iter().filter(|row| labels[**row] == label).count();

        assert_eq!(count("a"), 30);
        assert_eq!(count("b"), 8);
        assert_eq!(count("c"), 2);
        // Draws are grouped by class in distribution order.
        assert!(rows[..30].iter().all(|row| labels[*row] == "a"));
    }

    #[test]
    fn stratified_sample_validates_bounds() {
        let labels = ["a", "b"];
        let distribution = class_distribution(labels).expect("distribution");
        assert!(stratified_sample(&labels, &distribution, 0, 5, DEFAULT_SEED).is_err());
        assert!(stratified_sample(&labels, &distribution, 5, 4, DEFAULT_SEED).is_err());
        assert_eq!(
            stratified_sample(&labels, &[], 1, 5, DEFAULT_SEED),
            Err(ReviewError::EmptyDataset)
        );
    }

    #[test]
    fn method_names_round_trip_through_parse() {
        for method in [
            SamplingMethod::Binary,
            SamplingMethod::MultiClass,
            SamplingMethod::Stratified,
        ] {
            assert_eq!(SamplingMethod::parse(method.as_str()), Some(method));
        }
        assert_eq!(SamplingMethod::parse("random"), None);
    }
}
