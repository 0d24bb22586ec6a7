use crate::{
    batch,
    chunk_plan::ChunkPlan,
    config::Config,
    dispatch::Dispatcher,
    engine::{Engine, EngineFactory, python::PythonBackend},
    evaluate::Evaluator,
    metrics::CorpusReport,
    report::{EvaluationReport, ReportWriter},
    util::{ensure_dir, now_rfc3339, open_append, require_dir, sha256_hex},
};
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "ocr-bench")]
#[command(about = "Multi-device OCR batch dispatcher and CER evaluator")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./ocr-bench.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load the model on one device and print what the worker reports.
    Doctor {
        #[arg(long)]
        device: Option<u32>,
    },
    /// Print how the input images would be split across devices.
    Plan {
        #[arg(long)]
        input_dir: Option<PathBuf>,
    },
    /// Run inference over every image, one worker per device.
    Dispatch {
        #[arg(long)]
        input_dir: Option<PathBuf>,
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Score predictions against ground truth and write the CER report.
    Score {
        #[arg(long)]
        predictions_dir: Option<PathBuf>,
        #[arg(long)]
        ground_truth_dir: Option<PathBuf>,
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg = load_config(args.config.as_deref())?;

    match &args.cmd {
        Command::Doctor { device } => {
            let _guard = init_logging(&args, &cfg, None)?;
            doctor(&cfg, *device)
        }
        Command::Plan { input_dir } => {
            let _guard = init_logging(&args, &cfg, None)?;
            plan(&cfg, &or_config(input_dir, &cfg.paths.input_dir))
        }
        Command::Dispatch {
            input_dir,
            output_dir,
        } => {
            let input_dir = or_config(input_dir, &cfg.paths.input_dir);
            require_dir(&input_dir, "input directory")?;
            let out_dir = or_config(output_dir, &cfg.paths.output_dir);
            ensure_dir(&out_dir)?;
            let log_path = resolve_log_path(&cfg, &out_dir, "dispatch");
            let _guard = init_logging(&args, &cfg, log_path.as_deref())?;
            run_dispatch(&cfg, &input_dir, &out_dir)
        }
        Command::Score {
            predictions_dir,
            ground_truth_dir,
            report,
        } => {
            let pred_dir = or_config(predictions_dir, &cfg.paths.output_dir);
            let log_path = if pred_dir.is_dir() {
                resolve_log_path(&cfg, &pred_dir, "score")
            } else {
                None
            };
            let _guard = init_logging(&args, &cfg, log_path.as_deref())?;
            run_score(
                &cfg,
                &pred_dir,
                &or_config(ground_truth_dir, &cfg.paths.ground_truth_dir),
                report.as_deref(),
            )
        }
    }
}

fn load_config(user: Option<&Path>) -> Result<Config> {
    if let Some(p) = user {
        return Config::load(p);
    }
    for candidate in ["ocr-bench.toml", "ocr-bench.example.toml"] {
        let p = Path::new(candidate);
        if p.exists() {
            return Config::load(p);
        }
    }
    Ok(Config::default())
}

fn or_config(flag: &Option<PathBuf>, configured: &str) -> PathBuf {
    flag.clone().unwrap_or_else(|| PathBuf::from(configured))
}

fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stdout_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let file = open_append(path)?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

/// Each command logs to its own file so a `score` run never touches the
/// log of the `dispatch` run it reads from.
pub fn resolve_log_path(cfg: &Config, run_dir: &Path, command: &str) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }

    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }

    Some(run_dir.join(format!("ocr-bench-{command}.log")))
}

fn doctor(cfg: &Config, device: Option<u32>) -> Result<()> {
    let device_id = match device {
        Some(d) => d,
        None => *cfg
            .dispatch
            .device_ids
            .first()
            .ok_or_else(|| anyhow!("no devices configured"))?,
    };
    let backend = PythonBackend::new(cfg)?;
    let engine = backend.init(device_id)?;
    println!("{}", serde_json::to_string_pretty(&engine.diag())?);
    Ok(())
}

fn plan(cfg: &Config, input_dir: &Path) -> Result<()> {
    let docs = batch::enumerate(cfg, input_dir)?;
    let plan = ChunkPlan::from_config(cfg, &docs)?;
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

fn run_dispatch(cfg: &Config, input_dir: &Path, out_dir: &Path) -> Result<()> {
    let docs = batch::enumerate(cfg, input_dir)?;
    if docs.is_empty() {
        warn!("no images to process in {}", input_dir.display());
        return Ok(());
    }
    info!(
        "{} images from {} -> {}",
        docs.len(),
        input_dir.display(),
        out_dir.display()
    );

    if cfg.debug.dump_effective_config {
        cfg.write_effective(&out_dir.join("effective-config-dispatch.toml"))?;
    }

    let backend = PythonBackend::new(cfg)?;
    let summary = Dispatcher::new(cfg, backend).run(&docs, out_dir)?;

    if cfg.output.write_summary_json {
        let summary_path = out_dir.join(&cfg.output.summary_filename);
        std::fs::write(&summary_path, serde_json::to_string_pretty(&summary)?)
            .with_context(|| format!("writing {}", summary_path.display()))?;
    }

    if cfg.global.print_summary {
        let status = if summary.complete { "ok" } else { "partial" };
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "output_dir": out_dir,
                "documents": summary.document_count,
                "succeeded": summary.succeeded,
                "failed": summary.failed,
                "status": status,
            }))?
        );
    }

    Ok(())
}

fn run_score(
    cfg: &Config,
    pred_dir: &Path,
    gt_dir: &Path,
    report_override: Option<&Path>,
) -> Result<()> {
    let started = now_rfc3339();
    let evaluation = Evaluator::new(cfg).run(pred_dir, gt_dir)?;

    if cfg.debug.dump_effective_config {
        cfg.write_effective(&pred_dir.join("effective-config-score.toml"))?;
    }

    if evaluation.report.total_documents == 0 {
        warn!("no documents could be scored; report not written");
        return Ok(());
    }

    let report_path = resolve_report_path(cfg, pred_dir, report_override);
    ReportWriter::from_config(cfg).write(&evaluation.report, &report_path)?;
    info!("report written: {}", report_path.display());

    if cfg.output.write_report_json {
        let json_path = report_path.with_file_name(&cfg.output.report_json_filename);
        let full = EvaluationReport {
            run_id: run_id(cfg, &evaluation.report),
            run_name: cfg.global.run_name.clone(),
            variant: cfg.engine.variant.as_str().to_string(),
            started,
            finished: now_rfc3339(),
            corpus: evaluation.report.clone(),
            skipped: evaluation.skipped.clone(),
        };
        std::fs::write(&json_path, serde_json::to_string_pretty(&full)?)
            .with_context(|| format!("writing {}", json_path.display()))?;
    }

    if cfg.global.print_summary {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "report": report_path,
                "documents": evaluation.report.total_documents,
                "skipped": evaluation.skipped.len(),
                "accuracy": format!("{:.2}", evaluation.report.accuracy),
                "cer": format!("{:.4}", evaluation.report.cer),
            }))?
        );
    }

    Ok(())
}

fn resolve_report_path(cfg: &Config, pred_dir: &Path, user: Option<&Path>) -> PathBuf {
    if let Some(p) = user {
        return p.to_path_buf();
    }
    if !cfg.paths.report_path.is_empty() {
        return PathBuf::from(&cfg.paths.report_path);
    }
    pred_dir.join(&cfg.output.report_filename)
}

/// Same config over the same scored documents gives the same id.
fn run_id(cfg: &Config, report: &CorpusReport) -> String {
    let docs = report
        .records
        .iter()
        .map(|r| r.document.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    sha256_hex(format!("{}:{}", cfg.normalized_for_hash(), docs).as_bytes())
}
