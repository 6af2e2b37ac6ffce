//! The unified tool-call request model.
//!
//! Wire requests arrive as a flat JSON object discriminated by `action`. They are
//! validated into the [`Action`] enum before any backend is touched, so adding an
//! action is an exhaustive-match concern rather than stringly-typed branching.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_MAX_RESULTS: usize = 10;
pub const DEFAULT_MAX_TOKENS: usize = 200;
pub const DEFAULT_WAIT_SECS: u64 = 10;
pub const DEFAULT_MAX_DEPTH: u32 = 2;

/// Raw wire shape of a unified tool call. Optional fields take documented
/// defaults during validation; required fields are enforced per action.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionRequest {
    #[serde(default)]
    pub action: String,
    pub query: Option<String>,
    pub url: Option<String>,
    pub text: Option<String>,
    pub max_results: Option<usize>,
    pub max_tokens: Option<usize>,
    pub wait_for_element: Option<String>,
    pub wait_time: Option<u64>,
    pub max_depth: Option<u32>,
}

/// A validated tool call, ready for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Search {
        query: String,
        max_results: usize,
    },
    GetPage {
        url: String,
        wait_for_element: Option<String>,
        wait_secs: u64,
    },
    Summarize {
        text: String,
        max_tokens: usize,
    },
    /// Placeholder: accepted and answered with an empty result, never traversed.
    Crawl {
        url: String,
        max_depth: u32,
    },
}

impl Action {
    /// Validate a wire request into a typed action.
    ///
    /// Fails with `InvalidAction` for an unrecognized discriminator and
    /// `MissingField` when the action's required field is absent or empty.
    pub fn parse(req: &ActionRequest) -> Result<Self> {
        match req.action.as_str() {
            "search" => Ok(Action::Search {
                query: required(&req.query, "query")?,
                max_results: req.max_results.unwrap_or(DEFAULT_MAX_RESULTS),
            }),
            // `navigate` and `extract_content` are aliases for the same page fetch;
            // all three go through one browser path so results stay identical.
            "get_page" | "navigate" | "extract_content" => Ok(Action::GetPage {
                url: required(&req.url, "url")?,
                wait_for_element: req
                    .wait_for_element
                    .as_deref()
                    .filter(|s| !s.trim().is_empty())
                    .map(str::to_string),
                wait_secs: req.wait_time.unwrap_or(DEFAULT_WAIT_SECS),
            }),
            "summarize" => Ok(Action::Summarize {
                text: required(&req.text, "text")?,
                max_tokens: req.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            }),
            "crawl" => Ok(Action::Crawl {
                url: required(&req.url, "url")?,
                max_depth: req.max_depth.unwrap_or(DEFAULT_MAX_DEPTH),
            }),
            other => Err(Error::InvalidAction(other.to_string())),
        }
    }
}

fn required(value: &Option<String>, field: &'static str) -> Result<String> {
    match value {
        Some(s) if !s.trim().is_empty() => Ok(s.clone()),
        _ => Err(Error::MissingField(field)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(action: &str) -> ActionRequest {
        ActionRequest {
            action: action.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn search_requires_query() {
        let err = Action::parse(&req("search")).unwrap_err();
        assert!(matches!(err, Error::MissingField("query")));

        let mut r = req("search");
        r.query = Some("  ".to_string());
        assert!(matches!(
            Action::parse(&r).unwrap_err(),
            Error::MissingField("query")
        ));
    }

    #[test]
    fn search_defaults_max_results() {
        let mut r = req("search");
        r.query = Some("rust".to_string());
        let action = Action::parse(&r).unwrap();
        assert_eq!(
            action,
            Action::Search {
                query: "rust".to_string(),
                max_results: DEFAULT_MAX_RESULTS,
            }
        );
    }

    #[test]
    fn page_aliases_parse_identically() {
        for name in ["get_page", "navigate", "extract_content"] {
            let mut r = req(name);
            r.url = Some("https://example.com".to_string());
            let action = Action::parse(&r).unwrap();
            assert_eq!(
                action,
                Action::GetPage {
                    url: "https://example.com".to_string(),
                    wait_for_element: None,
                    wait_secs: DEFAULT_WAIT_SECS,
                }
            );
        }
    }

    #[test]
    fn get_page_requires_url() {
        assert!(matches!(
            Action::parse(&req("get_page")).unwrap_err(),
            Error::MissingField("url")
        ));
    }

    #[test]
    fn blank_wait_selector_is_dropped() {
        let mut r = req("get_page");
        r.url = Some("https://example.com".to_string());
        r.wait_for_element = Some("".to_string());
        match Action::parse(&r).unwrap() {
            Action::GetPage {
                wait_for_element, ..
            } => assert!(wait_for_element.is_none()),
            other => panic!("unexpected action: {:?}", other),
        }
    }

    #[test]
    fn summarize_requires_text_and_defaults_tokens() {
        assert!(matches!(
            Action::parse(&req("summarize")).unwrap_err(),
            Error::MissingField("text")
        ));

        let mut r = req("summarize");
        r.text = Some("hello world".to_string());
        assert_eq!(
            Action::parse(&r).unwrap(),
            Action::Summarize {
                text: "hello world".to_string(),
                max_tokens: DEFAULT_MAX_TOKENS,
            }
        );
    }

    #[test]
    fn crawl_parses_with_default_depth() {
        let mut r = req("crawl");
        r.url = Some("https://example.com".to_string());
        assert_eq!(
            Action::parse(&r).unwrap(),
            Action::Crawl {
                url: "https://example.com".to_string(),
                max_depth: DEFAULT_MAX_DEPTH,
            }
        );
    }

    #[test]
    fn unknown_action_rejected() {
        let err = Action::parse(&req("teleport")).unwrap_err();
        match err {
            Error::InvalidAction(name) => assert_eq!(name, "teleport"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn wire_request_deserializes_with_defaults() {
        let r: ActionRequest =
            serde_json::from_str(r#"{"action":"search","query":"llamas","max_results":3}"#)
                .unwrap();
        assert_eq!(r.action, "search");
        assert_eq!(r.max_results, Some(3));
        assert!(r.url.is_none());
    }
}
