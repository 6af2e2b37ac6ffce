use std::path::PathBuf;

/// Service configuration, read from the environment at startup.
///
/// A missing `LLM` or `SEARXNG_URL` disables only the corresponding capability;
/// the service still starts and serves everything else.
#[derive(Debug, Clone)]
pub struct Config {
    /// Filesystem path to a local GGUF model file (`LLM`).
    pub llm_model_path: Option<PathBuf>,
    /// Base URL of the SearXNG search backend (`SEARXNG_URL`).
    pub searxng_url: Option<String>,
    /// HTTP bind host (`TOOLGATE_HOST`, default 0.0.0.0).
    pub host: String,
    /// HTTP bind port (`TOOLGATE_PORT`, default 8000).
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Self {
        let llm_model_path = std::env::var("LLM")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let searxng_url = std::env::var("SEARXNG_URL")
            .ok()
            .and_then(|s| normalize_base_url(&s));

        let host = std::env::var("TOOLGATE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = std::env::var("TOOLGATE_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8000);

        if llm_model_path.is_none() {
            tracing::warn!("LLM not set; summarization will be unavailable");
        }
        if searxng_url.is_none() {
            tracing::warn!("SEARXNG_URL not set; web search will be unavailable");
        }

        Self {
            llm_model_path,
            searxng_url,
            host,
            port,
        }
    }
}

/// Trim whitespace and trailing slashes; blank values count as unset.
fn normalize_base_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
