use serde::{Deserialize, Serialize};

/// Per-document CER result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    /// Empty until attached with [`ScoreRecord::with_document`].
    #[serde(default)]
    pub document: String,
    pub gt_len: usize,
    pub pred_len: usize,
    pub edit_distance: usize,
    pub cer: f64,
    pub accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusReport {
    pub total_documents: usize,
    pub total_gt_len: usize,
    pub total_edit_distance: usize,
    pub cer: f64,
    pub accuracy: f64,
    pub records: Vec<ScoreRecord>,
}

/// Character error rate of `prediction` against `ground_truth`, both already normalized.
///
/// Lengths and distances count Unicode scalar values. An empty ground truth
/// scores 100% against an empty prediction and 0% against anything else.
pub fn score(ground_truth: &str, prediction: &str) -> ScoreRecord {
    let gt_len = ground_truth.chars().count();
    let pred_len = prediction.chars().count();

    let (edit_distance, cer) = if gt_len == 0 {
        if pred_len == 0 { (0, 0.0) } else { (pred_len, 1.0) }
    } else {
        let d = strsim::levenshtein(ground_truth, prediction);
        (d, d as f64 / gt_len as f64)
    };

    ScoreRecord {
        document: String::new(),
        gt_len,
        pred_len,
        edit_distance,
        cer,
        accuracy: accuracy_from_cer(cer),
    }
}

impl ScoreRecord {
    pub fn with_document(mut self, document: impl Into<String>) -> Self {
        self.document = document.into();
        self
    }
}

/// Length-weighted corpus CER: total edits over total ground-truth characters.
///
/// A corpus whose ground truth is entirely empty reports CER 0, even when the
/// individual records carry CER 1.0.
pub fn aggregate(records: Vec<ScoreRecord>) -> CorpusReport {
    let total_gt_len: usize = records.iter().map(|r| r.gt_len).sum();
    let total_edit_distance: usize = records.iter().map(|r| r.edit_distance).sum();
    let cer = if total_gt_len > 0 {
        total_edit_distance as f64 / total_gt_len as f64
    } else {
        0.0
    };

    CorpusReport {
        total_documents: records.len(),
        total_gt_len,
        total_edit_distance,
        cer,
        accuracy: accuracy_from_cer(cer),
        records,
    }
}

pub fn accuracy_from_cer(cer: f64) -> f64 {
    ((1.0 - cer) * 100.0).max(0.0)
}
