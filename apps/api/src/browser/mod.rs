// Session Driver: browser backend seam, WebDriver backend, retry policy,
// per-source session limiter and page heuristics.

pub mod backend;
pub mod driver;
#[cfg(test)]
pub mod fake;
pub mod heuristics;
pub mod limiter;
pub mod locator;
pub mod retry;
pub mod webdriver;

pub use driver::{DriverError, DriverSettings, FillAborted, Session, SessionDriver, SubmitOutcome};
pub use retry::RetryPolicy;
pub use webdriver::{WebDriverBackend, WebDriverSettings};
