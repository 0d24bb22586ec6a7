use crate::{
    batch::Document,
    chunk_plan::{ChunkPlan, WorkerAssignment},
    config::Config,
    engine::{Engine, EngineFactory, InferIn},
    util::{bytes_to_gib, ensure_dir, now_rfc3339},
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Runs every worker slot of a batch and waits for all of them.
pub struct Dispatcher<F: EngineFactory> {
    cfg: Config,
    factory: F,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Inference,
    Io,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocFailure {
    pub document: String,
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotOutcome {
    pub slot: usize,
    pub device_id: u32,
    pub assigned: usize,
    pub succeeded: usize,
    pub failures: Vec<DocFailure>,
    /// Set when the slot never got past backend initialization.
    pub slot_error: Option<String>,
    pub cache_release_errors: usize,
}

impl SlotOutcome {
    fn new(a: &WorkerAssignment) -> Self {
        Self {
            slot: a.slot,
            device_id: a.device_id,
            assigned: a.documents.len(),
            succeeded: 0,
            failures: Vec::new(),
            slot_error: None,
            cache_release_errors: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchSummary {
    pub run_name: String,
    pub started: String,
    pub finished: String,
    pub document_count: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// False when any slot or document failed.
    pub complete: bool,
    pub slots: Vec<SlotOutcome>,
}

/// Telemetry written next to each prediction artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub worker_id: usize,
    pub device_id: u32,
    pub file_name: String,
    pub elapsed_seconds: f64,
    pub peak_memory_bytes: u64,
}

impl PerformanceRecord {
    pub fn render(&self) -> String {
        format!(
            "Worker ID: {}\nDevice ID: {}\nFile: {}\nTime: {:.4}s\nPeak Memory: {:.2}GB\n",
            self.worker_id,
            self.device_id,
            self.file_name,
            self.elapsed_seconds,
            bytes_to_gib(self.peak_memory_bytes)
        )
    }
}

impl<F: EngineFactory> Dispatcher<F> {
    pub fn new(cfg: &Config, factory: F) -> Self {
        Self {
            cfg: cfg.clone(),
            factory,
        }
    }

    pub fn run(&self, docs: &[Document], out_dir: &Path) -> Result<DispatchSummary> {
        let started = now_rfc3339();
        ensure_dir(out_dir)?;

        let plan = ChunkPlan::from_config(&self.cfg, docs)?;
        let stagger = Duration::try_from_secs_f64(self.cfg.dispatch.stagger_seconds.max(0.0))
            .with_context(|| {
                format!(
                    "invalid dispatch.stagger_seconds: {}",
                    self.cfg.dispatch.stagger_seconds
                )
            })?;
        info!(
            "dispatching {} documents over {} slots ({:?} partition)",
            docs.len(),
            plan.assignments.len(),
            plan.strategy
        );
        for a in plan.assignments.iter().filter(|a| a.documents.is_empty()) {
            debug!(slot = a.slot, device_id = a.device_id, "no documents assigned; slot not launched");
        }

        let slots = std::thread::scope(|s| {
            let mut handles = Vec::new();
            for (i, a) in plan.active().enumerate() {
                if i > 0 && !stagger.is_zero() {
                    std::thread::sleep(stagger);
                }
                handles.push((a, s.spawn(move || self.run_slot(a, out_dir))));
            }

            handles
                .into_iter()
                .map(|(a, handle)| {
                    handle.join().unwrap_or_else(|_| {
                        error!(slot = a.slot, device_id = a.device_id, "slot thread panicked");
                        let mut outcome = SlotOutcome::new(a);
                        outcome.slot_error = Some("slot thread panicked".to_string());
                        outcome
                    })
                })
                .collect::<Vec<_>>()
        });

        let succeeded: usize = slots.iter().map(|s| s.succeeded).sum();
        let failed = docs.len() - succeeded;
        let complete = slots
            .iter()
            .all(|s| s.slot_error.is_none() && s.failures.is_empty());

        if complete {
            info!("batch finished: {succeeded}/{} documents", docs.len());
        } else {
            warn!(
                "batch finished with failures: {succeeded}/{} documents succeeded",
                docs.len()
            );
        }

        Ok(DispatchSummary {
            run_name: self.cfg.global.run_name.clone(),
            started,
            finished: now_rfc3339(),
            document_count: docs.len(),
            succeeded,
            failed,
            complete,
            slots,
        })
    }

    fn run_slot(&self, a: &WorkerAssignment, out_dir: &Path) -> SlotOutcome {
        let mut outcome = SlotOutcome::new(a);
        info!(
            slot = a.slot,
            device_id = a.device_id,
            "loading model ({} documents assigned)",
            a.documents.len()
        );

        let mut engine = match self.factory.init(a.device_id) {
            Ok(engine) => engine,
            Err(err) => {
                error!(
                    slot = a.slot,
                    device_id = a.device_id,
                    "backend initialization failed; slot exits: {err:#}"
                );
                outcome.slot_error = Some(format!("{err:#}"));
                return outcome;
            }
        };

        for doc in &a.documents {
            match self.process_document(&mut engine, a, doc, out_dir) {
                Ok(perf) => {
                    outcome.succeeded += 1;
                    info!(
                        slot = a.slot,
                        doc = %doc.id,
                        "done in {:.1}s",
                        perf.elapsed_seconds
                    );
                }
                Err(failure) => {
                    warn!(
                        slot = a.slot,
                        doc = %failure.document,
                        kind = ?failure.kind,
                        "document failed: {}",
                        failure.message
                    );
                    outcome.failures.push(failure);
                }
            }

            if self.cfg.dispatch.release_cache {
                if let Err(err) = engine.release_cache() {
                    outcome.cache_release_errors += 1;
                    warn!(slot = a.slot, doc = %doc.id, "cache release failed: {err:#}");
                }
            }
        }

        outcome
    }

    fn process_document(
        &self,
        engine: &mut F::Engine,
        a: &WorkerAssignment,
        doc: &Document,
        out_dir: &Path,
    ) -> std::result::Result<PerformanceRecord, DocFailure> {
        let fail = |kind: FailureKind, err: anyhow::Error| DocFailure {
            document: doc.id.clone(),
            kind,
            message: format!("{err:#}"),
        };

        let doc_dir = out_dir.join(&doc.id);
        ensure_dir(&doc_dir).map_err(|e| fail(FailureKind::Io, e))?;

        let req = InferIn {
            document: doc.id.clone(),
            image_path: doc.image_path.display().to_string(),
            prompt: self.cfg.engine.prompt.clone(),
            variant: self.cfg.engine.variant.as_str().to_string(),
        };

        let started = Instant::now();
        let out = engine
            .infer(&req)
            .map_err(|e| fail(FailureKind::Inference, e))?;
        let elapsed = started.elapsed();

        for w in &out.warnings {
            debug!(slot = a.slot, doc = %doc.id, "engine warning: {w}");
        }

        let perf = PerformanceRecord {
            worker_id: a.slot,
            device_id: a.device_id,
            file_name: doc.file_name.clone(),
            elapsed_seconds: elapsed.as_secs_f64(),
            peak_memory_bytes: out.peak_memory_bytes,
        };
        let perf_path = doc_dir.join(&self.cfg.output.performance_filename);
        std::fs::write(&perf_path, perf.render())
            .with_context(|| format!("writing {}", perf_path.display()))
            .map_err(|e| fail(FailureKind::Io, e))?;

        // Written last so a failed document never leaves an artifact behind for scoring.
        let artifact = doc_dir.join(self.cfg.artifact_filename());
        std::fs::write(&artifact, &out.text)
            .with_context(|| format!("writing {}", artifact.display()))
            .map_err(|e| fail(FailureKind::Io, e))?;

        Ok(perf)
    }
}
