//! Scrape core: navigation, response interception and result assembly.

mod aggregator;
pub mod headers;
mod interceptor;
mod navigation;
mod orchestrator;
mod types;

pub use aggregator::ResultAggregator;
pub use interceptor::{CapturedData, ContentFilter, ResponseInterceptor};
pub use navigation::{NavigationController, NavigationOutcome, NAVIGATION_TIMEOUT_MESSAGE};
pub use orchestrator::ScrapeOrchestrator;
pub use types::{DataContentType, OutputFlags, ScrapeDataItem, ScrapeRequest, ScrapeResponse};
