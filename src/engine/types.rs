//! Line-delimited JSON messages exchanged with the inference worker process.
//!
//! The worker prints one [`WorkerReady`] line after loading its model, then
//! answers every request line with exactly one response line.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerReady {
    pub ok: bool,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum WorkerRequest {
    Infer(InferIn),
    EmptyCache,
    Shutdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferIn {
    pub document: String,
    pub image_path: String,
    pub prompt: String,
    pub variant: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InferOut {
    pub ok: bool,
    #[serde(default)]
    pub text: String,
    /// Peak accelerator memory during this request.
    #[serde(default)]
    pub peak_memory_bytes: u64,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ack {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Result of bringing a backend up on one device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineDiag {
    pub device_id: u32,
    pub ok: bool,
    pub model: Option<String>,
    pub device: Option<String>,
}
