use crate::normalize::collapse_whitespace;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::Path;

/// A labelled text fragment and its `[x, y, width, height]` box in image pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(rename = "annotation.text", alias = "text")]
    pub text: String,
    #[serde(rename = "annotation.bbox", alias = "bbox")]
    pub bbox: [f64; 4],
}

impl Annotation {
    pub fn new(text: impl Into<String>, bbox: [f64; 4]) -> Self {
        Self {
            text: text.into(),
            bbox,
        }
    }

    pub fn x(&self) -> f64 {
        self.bbox[0]
    }

    pub fn y(&self) -> f64 {
        self.bbox[1]
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LabelFile {
    Wrapped {
        #[serde(default)]
        annotations: Vec<Annotation>,
    },
    Bare(Vec<Annotation>),
}

/// Reads a per-document label file, either `{"annotations": [...]}` or a bare array.
pub fn load(path: &Path) -> Result<Vec<Annotation>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading ground truth: {}", path.display()))?;
    let file: LabelFile = serde_json::from_str(&raw)
        .with_context(|| format!("parsing ground truth JSON: {}", path.display()))?;
    Ok(match file {
        LabelFile::Wrapped { annotations } => annotations,
        LabelFile::Bare(annotations) => annotations,
    })
}

/// Linearizes annotations top-to-bottom, then left-to-right.
///
/// Rows sharing `y` fall back to `x`, then text, then box size, so the output
/// does not depend on the order annotations were loaded in.
pub fn reconstruct(annotations: &[Annotation]) -> String {
    let mut ordered: Vec<&Annotation> = annotations.iter().collect();
    ordered.sort_by(|a, b| reading_order(a, b));

    let joined = ordered
        .iter()
        .map(|a| a.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    collapse_whitespace(&joined)
}

fn reading_order(a: &Annotation, b: &Annotation) -> Ordering {
    a.y()
        .total_cmp(&b.y())
        .then_with(|| a.x().total_cmp(&b.x()))
        .then_with(|| a.text.cmp(&b.text))
        .then_with(|| a.bbox[2].total_cmp(&b.bbox[2]))
        .then_with(|| a.bbox[3].total_cmp(&b.bbox[3]))
}
