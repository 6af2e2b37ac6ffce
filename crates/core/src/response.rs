//! The unified response shape and the result normalizer.
//!
//! Pure mapping, no I/O: backend-native outputs are folded into exactly one
//! populated payload variant per response.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// One ranked search hit, in the backend's relevance order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Rendered page text as produced by the browser session manager.
///
/// `wait_timed_out` is set when a requested element never appeared; the text is
/// then whatever had loaded when the wait expired (soft failure).
#[derive(Debug, Clone, PartialEq)]
pub struct PageContent {
    pub text: String,
    pub wait_timed_out: Option<WaitTimeout>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WaitTimeout {
    pub selector: String,
    pub wait_secs: u64,
}

/// Wire-level error object. `url` names the target for backend errors;
/// `content` carries best-effort page text for element-wait timeouts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Tagged result of a dispatched action. Serializes untagged, so the wire
/// body is exactly one of `{"results": ...}`, `{"content": ...}`,
/// `{"summary": ...}`, `{"pages": ...}` or `{"error": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UnifiedResponse {
    Results { results: Vec<SearchResult> },
    Content { content: String },
    Summary { summary: String },
    Pages { pages: Vec<serde_json::Value> },
    Error { error: ErrorBody },
}

impl UnifiedResponse {
    pub fn from_search(results: Vec<SearchResult>) -> Self {
        UnifiedResponse::Results { results }
    }

    /// Page output: a completed wait yields content; an expired element wait
    /// yields the timeout error with whatever content had loaded.
    pub fn from_page(page: PageContent) -> Self {
        match page.wait_timed_out {
            None => UnifiedResponse::Content { content: page.text },
            Some(timeout) => {
                let err = Error::ElementWaitTimeout {
                    selector: timeout.selector,
                    wait_secs: timeout.wait_secs,
                };
                UnifiedResponse::Error {
                    error: ErrorBody {
                        kind: err.kind().to_string(),
                        message: err.to_string(),
                        url: None,
                        content: Some(page.text),
                    },
                }
            }
        }
    }

    pub fn from_summary(summary: String) -> Self {
        UnifiedResponse::Summary { summary }
    }

    /// Crawl is a contract-valid no-op: an empty page list, nothing traversed.
    pub fn crawl_placeholder() -> Self {
        UnifiedResponse::Pages { pages: Vec::new() }
    }

    pub fn from_error(err: &Error) -> Self {
        let url = match err {
            Error::NavigationError { url, .. } => Some(url.clone()),
            _ => None,
        };
        UnifiedResponse::Error {
            error: ErrorBody {
                kind: err.kind().to_string(),
                message: err.to_string(),
                url,
                content: None,
            },
        }
    }

    pub fn error(&self) -> Option<&ErrorBody> {
        match self {
            UnifiedResponse::Error { error } => Some(error),
            _ => None,
        }
    }
}
