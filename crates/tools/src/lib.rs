pub mod browser;
pub mod dispatch;
pub mod search;
pub mod summarize;

pub use browser::{BrowserManager, SessionGauge};
pub use dispatch::{Dispatcher, PageBackend, SearchBackend, SummaryBackend};
pub use search::SearxClient;
pub use summarize::LlamaSummarizer;
