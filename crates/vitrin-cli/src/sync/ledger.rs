//! JSON failure ledger.
//!
//! Products that exhaust their retries during a run are written here so a
//! later `retry` invocation can pick them up. The file is the only state the
//! pipeline keeps outside the database.

use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// One product that could not be fetched or persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureRecord {
    pub product_id: i64,
    /// Upstream category id the product was listed under.
    pub category_id: i64,
    /// Brand name as stored in the database.
    pub brand: String,
    pub error: String,
}

/// Reads the ledger. A missing file is an empty ledger; an unreadable or
/// unparsable file is an error, so a `retry` run never silently drops records.
pub fn load(path: &Path) -> anyhow::Result<Vec<FailureRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading failure ledger {}", path.display()))?;
    let records: Vec<FailureRecord> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing failure ledger {}", path.display()))?;
    Ok(records)
}

/// Writes the ledger, replacing whatever was there.
pub fn save(path: &Path, records: &[FailureRecord]) -> anyhow::Result<()> {
    let raw = serde_json::to_string_pretty(records).context("serializing failure ledger")?;
    fs::write(path, raw).with_context(|| format!("writing failure ledger {}", path.display()))?;
    Ok(())
}

/// Removes the ledger. A file that is already gone is not an error.
pub fn delete(path: &Path) -> anyhow::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => {
            Err(err).with_context(|| format!("removing failure ledger {}", path.display()))
        }
    }
}
