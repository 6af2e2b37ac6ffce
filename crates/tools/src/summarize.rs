//! Summarization client adapter backed by an in-process llama.cpp model.
//!
//! The GGUF model named by `LLM` is loaded once at startup and shared across
//! requests. Generation runs on the blocking pool and is serialized by a mutex
//! gate so concurrent summarize calls cannot interleave inside the inference
//! context, while search and browser requests proceed unblocked.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use llama_cpp::standard_sampler::StandardSampler;
use llama_cpp::{LlamaModel, LlamaParams, SessionParams};
use tokio::sync::Mutex;
use toolgate_core::{Error, Result};

use crate::dispatch::SummaryBackend;

const STOP_MARKERS: &[&str] = &["\n\n", "</s>", "<|im_end|>"];

pub struct LlamaSummarizer {
    model: Arc<LlamaModel>,
    gate: Mutex<()>,
}

impl std::fmt::Debug for LlamaSummarizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlamaSummarizer").finish_non_exhaustive()
    }
}

impl LlamaSummarizer {
    /// Load the model file. A missing or unloadable file disables the
    /// capability; callers then answer `ModelUnavailable` without any I/O.
    pub fn load(model_path: &Path) -> Result<Self> {
        if !model_path.exists() {
            return Err(Error::ModelUnavailable(format!(
                "model file not found: {}",
                model_path.display()
            )));
        }

        tracing::info!(path = %model_path.display(), "loading summarization model");
        let model = LlamaModel::load_from_file(model_path, LlamaParams::default())
            .map_err(|e| Error::ModelUnavailable(format!("failed to load model: {}", e)))?;
        tracing::info!(path = %model_path.display(), "summarization model ready");

        Ok(Self {
            model: Arc::new(model),
            gate: Mutex::new(()),
        })
    }
}

#[async_trait]
impl SummaryBackend for LlamaSummarizer {
    async fn summarize(&self, text: &str, max_tokens: usize) -> Result<String> {
        ensure_nonempty(text)?;

        let prompt = build_prompt(text);
        let model = self.model.clone();

        // One completion at a time; the inference context is not reentrant.
        let _inference = self.gate.lock().await;
        let summary =
            tokio::task::spawn_blocking(move || generate(&model, &prompt, max_tokens))
                .await
                .map_err(|e| Error::ModelUnavailable(format!("inference task failed: {}", e)))??;

        Ok(summary)
    }
}

pub(crate) fn ensure_nonempty(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(Error::EmptyInput);
    }
    Ok(())
}

fn build_prompt(text: &str) -> String {
    format!(
        "Summarize the following text concisely:\n\n{}\n\nSummary:",
        text
    )
}

fn generate(model: &LlamaModel, prompt: &str, max_tokens: usize) -> Result<String> {
    let mut params = SessionParams::default();
    params.n_ctx = 2048;
    params.n_batch = 2048;

    let mut session = model
        .create_session(params)
        .map_err(|e| Error::ModelUnavailable(format!("failed to create session: {}", e)))?;

    session
        .advance_context(prompt)
        .map_err(|e| Error::ModelUnavailable(format!("failed to process prompt: {}", e)))?;

    let completions = session
        .start_completing_with(StandardSampler::default(), max_tokens)
        .map_err(|e| Error::ModelUnavailable(format!("failed to start completion: {}", e)))?
        .into_strings();

    // max_tokens is an upper bound, not a contract: stop early on blank-line
    // or end-of-turn markers the way the prompt invites.
    let mut output = String::new();
    for piece in completions {
        output.push_str(&piece);
        if STOP_MARKERS.iter().any(|m| output.contains(m)) {
            break;
        }
    }

    Ok(strip_stop_markers(&output))
}

fn strip_stop_markers(raw: &str) -> String {
    let mut out = raw;
    for marker in STOP_MARKERS {
        if let Some(idx) = out.find(marker) {
            out = &out[..idx];
        }
    }
    out.trim().to_string()
}
