use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::similarity::closest_match;

const DEFAULT_CODEBOOK_JSON: &str = include_str!("../assets/default_codebook.json");
const CODE_PREFIX: &str = "per";
const CODE_DIGITS: usize = 3;
const CLOSE_MATCH_CUTOFF: f64 = 0.6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodebookEntry {
    pub code: String,
    pub name: String,
    pub description: String,
    pub domain: String,
}

#[derive(Debug, Deserialize)]
struct CodebookFile {
    codebook_version: u32,
    entries: Vec<CodebookEntry>,
}

/// Read-only category reference, loaded once per invocation and passed by
/// reference to whatever needs it.
#[derive(Debug, Clone)]
pub struct Codebook {
    entries: Vec<CodebookEntry>,
    by_code: HashMap<String, usize>,
}

impl Codebook {
    pub fn builtin() -> Result<Self> {
        Self::from_json(DEFAULT_CODEBOOK_JSON).context("failed to parse built-in codebook")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self> {
        let codebook = match path {
            Some(path) => Self::load(path)?,
            None => Self::builtin()?,
        };
        if codebook.is_empty() {
            bail!(
                "codebook {} has no entries",
                path.map(|path| path.display().to_string())
                    .unwrap_or_else(|| "built-in".to_string())
            );
        }
        debug!(
            source = %path.map(|path| path.display().to_string()).unwrap_or_else(|| "built-in".to_string()),
            entries = codebook.len(),
            domains = codebook.domains().len(),
            "codebook loaded"
        );
        Ok(codebook)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let file: CodebookFile = serde_json::from_str(raw).context("invalid codebook json")?;
        if file.codebook_version != 1 {
            bail!("unsupported codebook_version {}", file.codebook_version);
        }
        Self::from_entries(file.entries)
    }

    pub fn from_entries(entries: Vec<CodebookEntry>) -> Result<Self> {
        let mut by_code = HashMap::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            if entry.code.trim().is_empty() {
                bail!("codebook entry {index} has an empty code");
            }
            if by_code.insert(entry.code.clone(), index).is_some() {
                bail!("duplicate codebook code: {}", entry.code);
            }
        }
        Ok(Self { entries, by_code })
    }

    pub fn get(&self, code: &str) -> Option<&CodebookEntry> {
        self.by_code.get(code).map(|index| &self.entries[*index])
    }

    pub fn entries(&self) -> &[CodebookEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Domains in order of first appearance.
    pub fn domains(&self) -> Vec<&str> {
        let mut domains = Vec::<&str>::new();
        for entry in &self.entries {
            if !domains.contains(&entry.domain.as_str()) {
                domains.push(&entry.domain);
            }
        }
        domains
    }

    pub fn entries_in_domain<'a>(
        &'a self,
        domain: &str,
    ) -> impl Iterator<Item = &'a CodebookEntry> {
        self.entries
            .iter()
            .filter(move |entry| entry.domain.eq_ignore_ascii_case(domain))
    }

    /// Codebook entry for a dataset label.
    ///
    /// The label's first digits form a `per###` key; when that code is
    /// missing, the most similar code above the cutoff is used instead.
    pub fn resolve_label(&self, label: &str, digits: &Regex) -> Option<&CodebookEntry> {
        let number = digits
            .find_iter(label)
            .map(|m| m.as_str())
            .collect::<String>()
            .chars()
            .take(CODE_DIGITS)
            .collect::<String>();
        let key = format!("{CODE_PREFIX}{number}");

        if let Some(entry) = self.get(&key) {
            return Some(entry);
        }
        closest_match(
            &key,
            self.entries.iter().map(|entry| entry.code.as_str()),
            CLOSE_MATCH_CUTOFF,
        )
        .and_then(|code| self.get(code))
    }
}

pub fn digit_pattern() -> Result<Regex> {
    Regex::new(r"\d+").context("failed to compile label digit regex")
}

/// Label to codebook entry, `None` where nothing is close enough.
pub fn label_to_code_mapping<'a, I>(
    labels: I,
    codebook: &Codebook,
) -> Result<BTreeMap<String, Option<CodebookEntry>>>
where
    I: IntoIterator<Item = &'a str>,
{
    let digits = digit_pattern()?;
    Ok(labels
        .into_iter()
        .map(|label| {
            (
                label.to_string(),
                codebook.resolve_label(label, &digits).cloned(),
            )
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(code: &str, domain: &str) -> CodebookEntry {
        CodebookEntry {
            code: code.to_string(),
            name: format!("name {code}"),
            description: String::new(),
            domain: domain.to_string(),
        }
    }

    #[test]
    fn builtin_codebook_has_seven_domains() {
        let codebook = Codebook::builtin().expect("built-in codebook should parse");
        assert_eq!(codebook.len(), 56);
        assert_eq!(codebook.domains().len(), 7);
        assert_eq!(
            codebook.get("per501").map(|entry| entry.name.as_str()),
            Some("Environmental Protection")
        );
        assert_eq!(codebook.entries_in_domain("economy").count(), 16);
    }

    #[test]
    fn duplicate_codes_are_rejected() {
        let error = Codebook::from_entries(vec![entry("per101", "A"), entry("per101", "B")])
            .expect_err("duplicate codes should fail");
        assert!(
            error.to_string().contains("duplicate codebook code: per101"),
            "unexpected error: {error}"
        );
    }

    #[test]
    fn empty_codebook_file_is_rejected() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let path = dir.path().join("codebook.json");
        std::fs::write(&path, r#"{ "codebook_version": 1, "entries": [] }"#)
            .expect("codebook should be written");

        let codebook = Codebook::load(&path).expect("empty codebook should parse");
        assert!(codebook.is_empty());
        let error = Codebook::load_or_builtin(Some(&path)).expect_err("empty codebook should fail");
        assert!(
            error.to_string().contains("has no entries"),
            "unexpected error: {error}"
        );
        assert!(!Codebook::builtin().expect("built-in codebook").is_empty());
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let raw = r#"{ "codebook_version": 2, "entries": [] }"#;
        assert!(Codebook::from_json(raw).is_err());
    }

    #[test]
    fn labels_map_to_codes_by_digits_then_similarity() {
        let codebook = Codebook::from_entries(vec![
            entry("per101", "External Relations"),
            entry("per501", "Welfare"),
            entry("per502", "Welfare"),
        ])
        .expect("codebook should build");

        let mapping = label_to_code_mapping(
            ["per501", "501 environment", "class_5019", "class_5", "xyz-999"],
            &codebook,
        )
        .expect("mapping should build");
        let code = |label: &str| {
            mapping[label]
                .as_ref()
                .map(|entry| entry.code.clone())
        };

        assert_eq!(code("per501").as_deref(), Some("per501"));
        assert_eq!(code("501 environment").as_deref(), Some("per501"));
        assert_eq!(code("class_5019").as_deref(), Some("per501"));
        assert_eq!(code("class_5").as_deref(), Some("per502"));
        // "per999" shares only the prefix with every code.
        assert_eq!(code("xyz-999"), None);
    }

    #[test]
    fn fuzzy_lookup_scores_candidates_against_the_label_key() {
        let codebook = Codebook::builtin().expect("built-in codebook should parse");
        let mapping = label_to_code_mapping(["124", "151", "232"], &codebook)
            .expect("mapping should build");
        let code = |label: &str| mapping[label].as_ref().map(|entry| entry.code.as_str());

        assert_eq!(code("124"), Some("per412"));
        assert_eq!(code("151"), Some("per501"));
        assert_eq!(code("232"), Some("per302"));
    }
}
