pub mod action;
pub mod config;
pub mod error;
pub mod response;

pub use action::{Action, ActionRequest};
pub use config::Config;
pub use error::{Error, Result};
pub use response::{ErrorBody, PageContent, SearchResult, UnifiedResponse, WaitTimeout};
