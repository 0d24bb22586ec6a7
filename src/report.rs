use crate::{config::Config, evaluate::Skipped, metrics::CorpusReport, util::ensure_dir};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;

const HEADER_WIDTH: usize = 46;

/// Fixed-width plain-text CER report.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    pub title: String,
    pub filename_width: usize,
}

impl ReportWriter {
    pub fn new(title: impl Into<String>, filename_width: usize) -> Self {
        Self {
            title: title.into(),
            filename_width,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.report.title.clone(), cfg.report.filename_width)
    }

    /// Rows come out in the order of `report.records`.
    pub fn render(&self, report: &CorpusReport) -> String {
        let w = self.filename_width;
        let heavy = "=".repeat(HEADER_WIDTH);
        let light = "-".repeat(HEADER_WIDTH);

        let mut out = String::new();
        let _ = writeln!(out, "{heavy}");
        let _ = writeln!(out, "{}", format!("{:^width$}", self.title, width = HEADER_WIDTH).trim_end());
        let _ = writeln!(out, "{heavy}");
        let _ = writeln!(out, "Total Files Processed : {}", report.total_documents);
        let _ = writeln!(out, "Overall Average Accuracy: {:.2}%", report.accuracy);
        let _ = writeln!(out, "Overall Average CER     : {:.4}", report.cer);
        let _ = writeln!(out, "{light}");
        let _ = writeln!(out, "{:<w$} | {:<8} | {:<10}", "Filename", "CER", "Accuracy");
        let _ = writeln!(out, "{}", "-".repeat(w + 25));
        for r in &report.records {
            let _ = writeln!(
                out,
                "{:<w$} | {:<8.4} | {:<10.2}%",
                r.document, r.cer, r.accuracy
            );
        }
        out
    }

    /// Writes the report, replacing any previous file at `path`.
    pub fn write(&self, report: &CorpusReport, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_dir(parent)?;
        }
        std::fs::write(path, self.render(report))
            .with_context(|| format!("writing report: {}", path.display()))
    }
}

/// Machine-readable companion to the text report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub run_id: String,
    pub run_name: String,
    pub variant: String,
    pub started: String,
    pub finished: String,
    pub corpus: CorpusReport,
    pub skipped: Vec<Skipped>,
}
