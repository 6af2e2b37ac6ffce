//! Browser automation: per-request headless Chrome sessions over CDP.

pub mod cdp;
pub mod extract;
pub mod session;

pub use session::{BrowserManager, SessionGauge};
