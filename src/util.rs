use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Component, Path};

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};

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

pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)
        .with_context(|| format!("failed to open file for hashing: {}", path.display()))?;

    let mut hasher = Sha256::new();
    let mut buf = [0_u8; 8192];

    loop {
        let count = file
            .read(&mut buf)
            .with_context(|| format!("failed to read file for hashing: {}", path.display()))?;
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

    let data = serde_json::to_vec_pretty(value)
        .with_context(|| format!("failed to serialize json: {}", path.display()))?;

    let mut file = File::create(path)
        .with_context(|| format!("failed to create json file: {}", path.display()))?;
    file.write_all(&data)
        .with_context(|| format!("failed to write json file: {}", path.display()))?;
    file.write_all(b"\n")
        .with_context(|| format!("failed to finalize json file: {}", path.display()))?;

    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

/// Last normal component of a path, used to derive the video id from its
/// folder. Tolerates trailing separators and `.` segments.
pub fn trailing_path_component(path: &Path) -> Result<String> {
    path.components()
        .rev()
        .find_map(|component| match component {
            Component::Normal(name) => name.to_str().map(ToOwned::to_owned),
            _ => None,
        })
        .with_context(|| format!("cannot derive a folder name from {}", path.display()))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn trailing_path_component_ignores_trailing_separator() {
        let path = PathBuf::from("videos/adzYW5DZoWs/");
        assert_eq!(trailing_path_component(&path).unwrap(), "adzYW5DZoWs");
    }

    #[test]
    fn trailing_path_component_handles_relative_dot() {
        let path = PathBuf::from("videos/abc123/.");
        assert_eq!(trailing_path_component(&path).unwrap(), "abc123");
    }

    #[test]
    fn write_json_pretty_ends_with_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        write_json_pretty(&path, &serde_json::json!({"a": 1})).unwrap();

        let data = fs::read_to_string(&path).unwrap();
        assert!(data.ends_with('\n'));
        assert!(data.contains("\"a\": 1"));
    }
}
