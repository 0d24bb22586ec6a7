use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub global: Global,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub dispatch: Dispatch,
    #[serde(default)]
    pub engine: Engine,
    #[serde(default)]
    pub scoring: Scoring,
    #[serde(default)]
    pub report: Report,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub debug: Debug,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }

    /// Writes the effective config as TOML, replacing any file at `path`.
    pub fn write_effective(&self, path: &Path) -> Result<()> {
        let raw = toml::to_string(self).with_context(|| "serializing effective config")?;
        std::fs::write(path, raw)
            .with_context(|| format!("writing effective config: {}", path.display()))
    }

    /// A stable, normalization-friendly string for hashing.
    pub fn normalized_for_hash(&self) -> String {
        toml::to_string(self).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Global {
    pub run_name: String,
    pub print_summary: bool,
}
impl Default for Global {
    fn default() -> Self {
        Self {
            run_name: "default".into(),
            print_summary: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paths {
    /// Source images for `dispatch`.
    pub input_dir: String,
    /// One `<stem>.json` annotation file per document.
    pub ground_truth_dir: String,
    /// Per-document prediction directories; read back by `score`.
    pub output_dir: String,
    pub scripts_dir: String,
    /// Empty means `<output_dir>/<output.report_filename>`.
    pub report_path: String,
}
impl Default for Paths {
    fn default() -> Self {
        Self {
            input_dir: "data/images".into(),
            ground_truth_dir: "data/labels".into(),
            output_dir: "out".into(),
            scripts_dir: "scripts".into(),
            report_path: "".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionStrategy {
    /// Chunks of exactly `ceil(N/W)`, the last one possibly shorter.
    Ceil,
    /// Chunk sizes differ by at most one.
    Balanced,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dispatch {
    /// One worker slot per entry; entries must be distinct.
    pub device_ids: Vec<u32>,
    pub stagger_seconds: f64,
    pub partition: PartitionStrategy,
    pub image_extensions: Vec<String>,
    pub release_cache: bool,
}
impl Default for Dispatch {
    fn default() -> Self {
        Self {
            device_ids: vec![0, 1, 2],
            stagger_seconds: 5.0,
            partition: PartitionStrategy::Ceil,
            image_extensions: ["jpg", "jpeg", "png", "bmp", "tiff"]
                .into_iter()
                .map(String::from)
                .collect(),
            release_cache: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineVariant {
    /// Markdown/HTML output (`result.mmd`).
    Markdown,
    /// Plain text that echoes the chat prompt before the answer (`ocr_result.txt`).
    PromptEcho,
}

impl EngineVariant {
    pub fn artifact_filename(self) -> &'static str {
        match self {
            EngineVariant::Markdown => "result.mmd",
            EngineVariant::PromptEcho => "ocr_result.txt",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EngineVariant::Markdown => "markdown",
            EngineVariant::PromptEcho => "prompt_echo",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Engine {
    pub variant: EngineVariant,
    pub python_exe: String,
    pub worker_script: String,
    pub model: String,
    pub prompt: String,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}
impl Default for Engine {
    fn default() -> Self {
        Self {
            variant: EngineVariant::Markdown,
            python_exe: "python3".into(),
            worker_script: "ocr_worker.py".into(),
            model: "deepseek-ai/DeepSeek-OCR-2".into(),
            prompt: "<image>\n<|grounding|>Convert the document to markdown. ".into(),
            env: Default::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scoring {
    /// Apply NFKC to both sides before normalization.
    pub normalize_unicode: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub title: String,
    pub filename_width: usize,
}
impl Default for Report {
    fn default() -> Self {
        Self {
            title: "DeepSeek-OCR-2 CER Performance Report".into(),
            filename_width: 40,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Output {
    /// Overrides the variant's default artifact name when non-empty.
    pub artifact_filename: String,
    pub performance_filename: String,
    pub report_filename: String,
    pub write_report_json: bool,
    pub report_json_filename: String,
    pub write_summary_json: bool,
    pub summary_filename: String,
}
impl Default for Output {
    fn default() -> Self {
        Self {
            artifact_filename: "".into(),
            performance_filename: "individual_performance.txt".into(),
            report_filename: "cer_performance_report.txt".into(),
            write_report_json: true,
            report_json_filename: "cer_report.json".into(),
            write_summary_json: true,
            summary_filename: "dispatch_summary.json".into(),
        }
    }
}

impl Config {
    pub fn artifact_filename(&self) -> &str {
        if self.output.artifact_filename.is_empty() {
            self.engine.variant.artifact_filename()
        } else {
            &self.output.artifact_filename
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: true,
            file_path: "".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Debug {
    pub keep_worker_stderr: bool,
    pub dump_effective_config: bool,
}
impl Default for Debug {
    fn default() -> Self {
        Self {
            keep_worker_stderr: true,
            dump_effective_config: false,
        }
    }
}
