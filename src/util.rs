use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::session::DB_FILENAME;

pub fn now_utc_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn utc_compact_string(ts: DateTime<Utc>) -> String {
    ts.format("%Y%m%dT%H%M%SZ").to_string()
}

pub fn ensure_directory(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("failed to create directory: {}", path.display()))
}

pub fn manifest_dir(cache_root: &Path) -> PathBuf {
    cache_root.join("manifests")
}

pub fn resolve_db_path(cache_root: &Path, db_path: Option<&Path>) -> PathBuf {
    db_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| cache_root.join(DB_FILENAME))
}

/// Hex digest used to tie a review session to the exact dataset it sampled.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)
        .with_context(|| format!("failed to open dataset for hashing: {}", path.display()))?;

    let mut hasher = Sha256::new();
    let mut buf = [0_u8; 8192];
    loop {
        let count = file
            .read(&mut buf)
            .with_context(|| format!("failed to read dataset for hashing: {}", path.display()))?;
        if count == 0 {
            break;
        }
        hasher.update(&buf[..count]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

pub fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }

    let file = File::create(path)
        .with_context(|| format!("failed to create json file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .with_context(|| format!("failed to serialize json: {}", path.display()))?;
    writer
        .write_all(b"\n")
        .with_context(|| format!("failed to finalize json file: {}", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("failed to flush json file: {}", path.display()))?;

    Ok(())
}

/// Pretty JSON on stdout, for `--format json` command output.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let mut output = BufWriter::new(std::io::stdout().lock());
    serde_json::to_writer_pretty(&mut output, value).context("failed to serialize json output")?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_matches_known_digest() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let path = dir.path().join("data.csv");
        fs::write(&path, b"abc").expect("file should be written");

        let digest = sha256_file(&path).expect("digest should compute");
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn write_json_pretty_creates_parent_directories() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let path = dir.path().join("manifests").join("session.json");

        write_json_pretty(&path, &serde_json::json!({ "reviewed": 3 }))
            .expect("json should be written");
        let raw = fs::read_to_string(&path).expect("json should be readable");
        assert!(raw.ends_with("}\n"), "unexpected trailing content: {raw:?}");
    }

    #[test]
    fn db_path_defaults_under_cache_root() {
        let root = Path::new(".cache/codeval");
        assert_eq!(
            resolve_db_path(root, None),
            PathBuf::from(".cache/codeval/codeval_review.sqlite")
        );
        assert_eq!(
            resolve_db_path(root, Some(Path::new("/tmp/other.sqlite"))),
            PathBuf::from("/tmp/other.sqlite")
        );
    }
}
