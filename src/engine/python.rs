use super::{
    Engine, EngineFactory,
    types::{Ack, EngineDiag, InferIn, InferOut, WorkerReady, WorkerRequest},
};
use crate::config::Config;
use anyhow::{Context, Result, anyhow};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Launches one long-lived Python inference worker per slot.
pub struct PythonBackend {
    cfg: Config,
    script: PathBuf,
    python_exe: PathBuf,
}

impl PythonBackend {
    pub fn new(cfg: &Config) -> Result<Self> {
        let script = PathBuf::from(&cfg.paths.scripts_dir).join(&cfg.engine.worker_script);
        if !script.exists() {
            return Err(anyhow!("missing worker script: {}", script.display()));
        }
        let python_exe = resolve_python_exe(&cfg.engine.python_exe);
        Ok(Self {
            cfg: cfg.clone(),
            script,
            python_exe,
        })
    }
}

impl EngineFactory for PythonBackend {
    type Engine = PythonWorker;

    fn init(&self, device_id: u32) -> Result<PythonWorker> {
        PythonWorker::spawn(&self.cfg, &self.python_exe, &self.script, device_id)
    }
}

fn resolve_python_exe(raw: &str) -> PathBuf {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("auto") {
        if let Ok(env_val) = std::env::var("OCR_BENCH_PYTHON") {
            let p = expand_tilde(&env_val);
            if p.exists() {
                return p;
            }
        }
        return PathBuf::from("python3");
    }
    expand_tilde(raw)
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

/// A worker process that sees exactly one accelerator through `CUDA_VISIBLE_DEVICES`.
pub struct PythonWorker {
    device_id: u32,
    ready: WorkerReady,
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    stderr_thread: Option<JoinHandle<()>>,
}

impl PythonWorker {
    fn spawn(cfg: &Config, python_exe: &Path, script: &Path, device_id: u32) -> Result<Self> {
        debug!(device_id, "spawning worker {}", script.display());
        let mut cmd = Command::new(python_exe);
        cmd.arg(script)
            .arg("--model")
            .arg(&cfg.engine.model)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (k, v) in &cfg.engine.env {
            cmd.env(k, v);
        }
        cmd.env("CUDA_VISIBLE_DEVICES", device_id.to_string());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning python worker: {}", script.display()))?;

        let stdin = child.stdin.take().ok_or_else(|| anyhow!("no stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| anyhow!("no stdout"))?;
        let stderr_thread = child.stderr.take().map(|stderr| {
            let keep = cfg.debug.keep_worker_stderr;
            std::thread::spawn(move || {
                for line in BufReader::new(stderr).lines() {
                    let Ok(line) = line else { break };
                    if keep {
                        debug!(device_id, "worker stderr: {}", line.trim_end());
                    }
                }
            })
        });

        let mut worker = Self {
            device_id,
            ready: WorkerReady {
                ok: false,
                model: None,
                device: None,
                error: None,
            },
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout),
            stderr_thread,
        };

        let ready: WorkerReady = worker
            .read_message()
            .with_context(|| format!("waiting for worker on device {device_id} to load"))?;
        if !ready.ok {
            let msg = ready
                .error
                .unwrap_or_else(|| "worker reported ok=false".to_string());
            return Err(anyhow!("model load failed on device {device_id}: {msg}"));
        }
        worker.ready = ready;
        Ok(worker)
    }

    fn send(&mut self, req: &WorkerRequest) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| anyhow!("worker stdin already closed"))?;
        let mut line = serde_json::to_vec(req)?;
        line.push(b'\n');
        stdin
            .write_all(&line)
            .with_context(|| format!("writing to worker on device {}", self.device_id))?;
        stdin.flush().ok();
        Ok(())
    }

    fn read_message<O: for<'de> serde::Deserialize<'de>>(&mut self) -> Result<O> {
        let mut line = String::new();
        let n = self
            .stdout
            .read_line(&mut line)
            .with_context(|| format!("reading from worker on device {}", self.device_id))?;
        if n == 0 {
            let status = self.child.try_wait().ok().flatten();
            return Err(anyhow!(
                "worker on device {} closed its output (status: {:?})",
                self.device_id,
                status
            ));
        }
        serde_json::from_str(line.trim_end())
            .with_context(|| format!("parsing worker JSON line: {}", line.trim_end()))
    }

    fn request<O: for<'de> serde::Deserialize<'de>>(&mut self, req: &WorkerRequest) -> Result<O> {
        self.send(req)?;
        self.read_message()
    }
}

impl Engine for PythonWorker {
    fn diag(&self) -> EngineDiag {
        EngineDiag {
            device_id: self.device_id,
            ok: self.ready.ok,
            model: self.ready.model.clone(),
            device: self.ready.device.clone(),
        }
    }

    fn infer(&mut self, req: &InferIn) -> Result<InferOut> {
        let out: InferOut = self.request(&WorkerRequest::Infer(req.clone()))?;
        if !out.ok {
            let msg = out.error.unwrap_or_else(|| "inference returned ok=false".to_string());
            return Err(anyhow!("inference failed for {}: {msg}", req.document));
        }
        Ok(out)
    }

    fn release_cache(&mut self) -> Result<()> {
        let ack: Ack = self.request(&WorkerRequest::EmptyCache)?;
        if !ack.ok {
            return Err(anyhow!(
                "empty_cache failed: {}",
                ack.error.unwrap_or_default()
            ));
        }
        Ok(())
    }
}

impl Drop for PythonWorker {
    fn drop(&mut self) {
        let _ = self.send(&WorkerRequest::Shutdown);
        // Closing stdin lets a worker blocked on readline exit on its own.
        self.stdin.take();

        let start = Instant::now();
        loop {
            match self.child.try_wait() {
                Ok(Some(_)) => break,
                Ok(None) if start.elapsed() < SHUTDOWN_GRACE => {
                    std::thread::sleep(Duration::from_millis(50));
                }
                _ => {
                    warn!(
                        device_id = self.device_id,
                        "worker did not exit after {:?}; killing", SHUTDOWN_GRACE
                    );
                    let _ = self.child.kill();
                    let _ = self.child.wait();
                    break;
                }
            }
        }

        if let Some(handle) = self.stderr_thread.take() {
            let _ = handle.join();
        }
    }
}
