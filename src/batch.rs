use crate::config::Config;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// One page image queued for inference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// File stem; names the output directory and the ground-truth file.
    pub id: String,
    pub file_name: String,
    pub image_path: PathBuf,
}

impl Document {
    pub fn from_path(path: &Path) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?.to_string();
        let id = path.file_stem()?.to_str()?.to_string();
        Some(Self {
            id,
            file_name,
            image_path: path.to_path_buf(),
        })
    }
}

/// Lists images directly under `input_dir`, sorted by file name.
///
/// Ids are unique: when two images share a stem, the first by file name is
/// kept and the other is left out with a warning.
pub fn enumerate(cfg: &Config, input_dir: &Path) -> Result<Vec<Document>> {
    if !input_dir.is_dir() {
        return Err(anyhow!(
            "input directory does not exist: {}",
            input_dir.display()
        ));
    }

    let mut docs = Vec::new();
    let entries = std::fs::read_dir(input_dir)
        .with_context(|| format!("read_dir {}", input_dir.display()))?;
    for entry in entries {
        let path = entry
            .with_context(|| format!("read_dir entry in {}", input_dir.display()))?
            .path();
        if !path.is_file() || !has_image_extension(cfg, &path) {
            continue;
        }
        if let Some(doc) = Document::from_path(&path) {
            docs.push(doc);
        }
    }

    docs.sort_by(|a, b| a.file_name.cmp(&b.file_name));

    let mut seen: BTreeMap<String, String> = BTreeMap::new();
    docs.retain(|doc| match seen.get(&doc.id) {
        Some(kept) => {
            warn!(
                doc = %doc.id,
                "skipping {}: same document id as {}",
                doc.file_name,
                kept
            );
            false
        }
        None => {
            seen.insert(doc.id.clone(), doc.file_name.clone());
            true
        }
    });
    Ok(docs)
}

fn has_image_extension(cfg: &Config, path: &Path) -> bool {
    let Some(ext) = path.extension().and_then(|s| s.to_str()) else {
        return false;
    };
    cfg.dispatch
        .image_extensions
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(ext))
}
