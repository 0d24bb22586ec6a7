use crate::{
    config::Config,
    ground_truth::{self, Annotation},
    metrics::{self, CorpusReport, ScoreRecord},
    normalize::{collapse_whitespace, nfkc, normalize},
    util::require_dir,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    MissingGroundTruth,
    UnreadableGroundTruth,
    MissingPrediction,
    UnreadablePrediction,
}

/// A document left out of both sides of the corpus totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skipped {
    pub document: String,
    pub reason: SkipReason,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub report: CorpusReport,
    pub skipped: Vec<Skipped>,
}

/// Scores every prediction directory against its `<id>.json` label file.
pub struct Evaluator {
    cfg: Config,
}

impl Evaluator {
    pub fn new(cfg: &Config) -> Self {
        Self { cfg: cfg.clone() }
    }

    pub fn run(&self, predictions_dir: &Path, ground_truth_dir: &Path) -> Result<Evaluation> {
        require_dir(predictions_dir, "predictions directory")?;
        require_dir(ground_truth_dir, "ground truth directory")?;

        let ids = list_prediction_dirs(predictions_dir)?;
        info!(
            "scoring {} prediction directories ({} variant)",
            ids.len(),
            self.cfg.engine.variant.as_str()
        );

        let artifact = self.cfg.artifact_filename();
        let mut records = Vec::new();
        let mut skipped = Vec::new();

        for id in ids {
            let pred_path = predictions_dir.join(&id).join(artifact);
            let gt_path = ground_truth_dir.join(format!("{id}.json"));
            match self.score_document(&id, &pred_path, &gt_path) {
                Ok(record) => {
                    debug!(doc = %id, "accuracy {:.2}%", record.accuracy);
                    records.push(record);
                }
                Err(skip) => {
                    warn!(doc = %skip.document, reason = ?skip.reason, "skipped: {}", skip.message);
                    skipped.push(skip);
                }
            }
        }

        let report = metrics::aggregate(records);
        info!(
            "scored {} documents, skipped {}: accuracy {:.2}% cer {:.4}",
            report.total_documents,
            skipped.len(),
            report.accuracy,
            report.cer
        );
        Ok(Evaluation { report, skipped })
    }

    pub fn score_document(
        &self,
        id: &str,
        pred_path: &Path,
        gt_path: &Path,
    ) -> std::result::Result<ScoreRecord, Skipped> {
        let skip = |reason: SkipReason, message: String| Skipped {
            document: id.to_string(),
            reason,
            message,
        };

        if !gt_path.is_file() {
            return Err(skip(
                SkipReason::MissingGroundTruth,
                format!("no ground truth at {}", gt_path.display()),
            ));
        }
        if !pred_path.is_file() {
            return Err(skip(
                SkipReason::MissingPrediction,
                format!("no prediction at {}", pred_path.display()),
            ));
        }

        let annotations = ground_truth::load(gt_path)
            .map_err(|e| skip(SkipReason::UnreadableGroundTruth, format!("{e:#}")))?;
        let raw = std::fs::read_to_string(pred_path)
            .with_context(|| format!("reading prediction: {}", pred_path.display()))
            .map_err(|e| skip(SkipReason::UnreadablePrediction, format!("{e:#}")))?;

        Ok(self.score_texts(&annotations, &raw).with_document(id))
    }

    /// Reconstructs and normalizes both sides, then scores them.
    pub fn score_texts(&self, annotations: &[Annotation], raw_prediction: &str) -> ScoreRecord {
        let variant = self.cfg.engine.variant;
        let (gt, pred) = if self.cfg.scoring.normalize_unicode {
            (
                collapse_whitespace(&nfkc(&ground_truth::reconstruct(annotations))),
                normalize(&nfkc(raw_prediction), variant),
            )
        } else {
            (
                ground_truth::reconstruct(annotations),
                normalize(raw_prediction, variant),
            )
        };
        metrics::score(&gt, &pred)
    }
}

/// Names of the per-document subdirectories, sorted.
fn list_prediction_dirs(dir: &Path) -> Result<Vec<String>> {
    let mut ids = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("read_dir {}", dir.display()))? {
        let path: PathBuf = entry
            .with_context(|| format!("read_dir entry in {}", dir.display()))?
            .path();
        if !path.is_dir() {
            continue;
        }
        match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => ids.push(name.to_string()),
            None => warn!("ignoring non UTF-8 directory name: {}", path.display()),
        }
    }
    ids.sort();
    Ok(ids)
}
