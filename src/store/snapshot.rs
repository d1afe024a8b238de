//! Loading a [`MemoryStore`] from a directory of JSON exports.
//!
//! Every `<path>.json` file under the root holds an array of documents for
//! the collection `<path>`, so `participants/P1/monthlyPerformance.json`
//! fills that participant's sub-collection.

use super::MemoryStore;
use crate::error::StoreError;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Reads every JSON collection file under `root`.
pub fn load_snapshot(root: &Path) -> Result<MemoryStore, StoreError> {
    if !root.is_dir() {
        return Err(StoreError::Snapshot {
            path: root.display().to_string(),
            reason: "not a directory".to_string(),
        });
    }

    let mut store = MemoryStore::new();
    let mut files = 0usize;

    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().and_then(|e| e.to_str()) != Some("json")
        {
            continue;
        }

        let Some(collection) = collection_name(root, path) else {
            continue;
        };

        let snapshot_err = |reason: String| StoreError::Snapshot {
            path: path.display().to_string(),
            reason,
        };

        let content = std::fs::read_to_string(path).map_err(|e| snapshot_err(e.to_string()))?;
        let parsed: Value =
            serde_json::from_str(&content).map_err(|e| snapshot_err(e.to_string()))?;
        let Value::Array(documents) = parsed else {
            return Err(snapshot_err("expected a JSON array of documents".to_string()));
        };

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("doc")
            .to_string();

        for (index, data) in documents.into_iter().enumerate() {
            let id = match data.get("id") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => format!("{}-{}", stem, index),
            };
            store.insert(&collection, &id, data);
        }

        debug!(
            "Loaded collection {} from {} ({} documents)",
            collection,
            path.display(),
            store.len(&collection)
        );
        files += 1;
    }

    info!(
        "Loaded {} collection files ({} collections) from {}",
        files,
        store.collection_names().count(),
        root.display()
    );
    Ok(store)
}

/// `root/a/b/c.json` becomes `a/b/c`.
fn collection_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?.with_extension("");
    let parts: Vec<&str> = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<_>>()?;
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}
