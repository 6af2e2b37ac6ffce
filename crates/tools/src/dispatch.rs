//! The action dispatcher: validates a unified request, routes it to exactly one
//! backend path, and folds the outcome into a [`UnifiedResponse`].
//!
//! Backends sit behind trait objects so tests can substitute counting mocks and
//! so an unconfigured capability is simply `None`.

use std::sync::Arc;

use async_trait::async_trait;
use toolgate_core::{Action, ActionRequest, Error, PageContent, Result, SearchResult, UnifiedResponse};

#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>>;
}

#[async_trait]
pub trait PageBackend: Send + Sync {
    async fn fetch(
        &self,
        url: &str,
        wait_for_element: Option<&str>,
        wait_secs: u64,
    ) -> Result<PageContent>;
}

#[async_trait]
pub trait SummaryBackend: Send + Sync {
    async fn summarize(&self, text: &str, max_tokens: usize) -> Result<String>;
}

pub struct Dispatcher {
    search: Option<Arc<dyn SearchBackend>>,
    pages: Arc<dyn PageBackend>,
    summarizer: Option<Arc<dyn SummaryBackend>>,
}

impl Dispatcher {
    pub fn new(
        search: Option<Arc<dyn SearchBackend>>,
        pages: Arc<dyn PageBackend>,
        summarizer: Option<Arc<dyn SummaryBackend>>,
    ) -> Self {
        Self {
            search,
            pages,
            summarizer,
        }
    }

    /// Validate and execute one unified action. Validation failures surface
    /// before any backend is called; every failure keeps its error kind.
    pub async fn dispatch(&self, req: &ActionRequest) -> UnifiedResponse {
        let action = match Action::parse(req) {
            Ok(action) => action,
            Err(e) => {
                tracing::debug!(action = %req.action, error = %e, "request rejected");
                return UnifiedResponse::from_error(&e);
            }
        };

        match self.run(action).await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(action = %req.action, error = %e, "action failed");
                UnifiedResponse::from_error(&e)
            }
        }
    }

    async fn run(&self, action: Action) -> Result<UnifiedResponse> {
        match action {
            Action::Search { query, max_results } => {
                // Unconfigured is its own kind: a live-backend failure is worth
                // retrying, a capability that was never configured is not.
                let backend = self.search.as_ref().ok_or_else(|| {
                    Error::SearchUnavailable("SEARXNG_URL is not configured".to_string())
                })?;
                let results = backend.search(&query, max_results).await?;
                tracing::info!(query = %query, hits = results.len(), "search completed");
                Ok(UnifiedResponse::from_search(results))
            }
            Action::GetPage {
                url,
                wait_for_element,
                wait_secs,
            } => {
                let page = self
                    .pages
                    .fetch(&url, wait_for_element.as_deref(), wait_secs)
                    .await?;
                Ok(UnifiedResponse::from_page(page))
            }
            Action::Summarize { text, max_tokens } => {
                let backend = self.summarizer.as_ref().ok_or_else(|| {
                    Error::ModelUnavailable("LLM is not configured".to_string())
                })?;
                let summary = backend.summarize(&text, max_tokens).await?;
                Ok(UnifiedResponse::from_summary(summary))
            }
            Action::Crawl { url, max_depth } => {
                // Contract-valid no-op: accept, log, return the empty page list.
                tracing::info!(url = %url, max_depth, "crawl requested (placeholder)");
                Ok(UnifiedResponse::crawl_placeholder())
            }
        }
    }
}
