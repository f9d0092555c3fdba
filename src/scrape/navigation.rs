use std::sync::Arc;
use std::time::Duration;

use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use crate::error::ScraperError;
use crate::traits::{BrowserSession, NetworkResponse};

pub const NAVIGATION_TIMEOUT_MESSAGE: &str = "Navigation timed out before response.";

/// How a navigation ended, short of an engine error.
pub enum NavigationOutcome {
    Response(Arc<dyn NetworkResponse>),
    /// The engine finished without a navigation response.
    NoResponse,
    /// The bound elapsed (or the engine gave up) before the page settled.
    TimedOut,
}

impl NavigationOutcome {
    pub fn response(&self) -> Option<&Arc<dyn NetworkResponse>> {
        match self {
            NavigationOutcome::Response(response) => Some(response),
            _ => None,
        }
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, NavigationOutcome::TimedOut)
    }
}

/// Drives a page to a URL and waits for network idle, bounded by `timeout`.
#[derive(Debug, Clone, Copy)]
pub struct NavigationController {
    timeout: Duration,
}

impl NavigationController {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Timeouts are soft: they come back as [`NavigationOutcome::TimedOut`].
    /// Any other engine error is returned as is.
    pub async fn navigate(
        &self,
        session: &mut dyn BrowserSession,
        url: &str,
    ) -> Result<NavigationOutcome, ScraperError> {
        debug!(url, timeout = ?self.timeout, "navigating");
        let started = Instant::now();

        match timeout(self.timeout, session.navigate(url)).await {
            Ok(Ok(Some(response))) => {
                info!(
                    url,
                    status = response.status(),
                    elapsed = ?started.elapsed(),
                    "navigation settled"
                );
                Ok(NavigationOutcome::Response(response))
            }
            Ok(Ok(None)) => {
                info!(url, elapsed = ?started.elapsed(), "navigation settled without a response");
                Ok(NavigationOutcome::NoResponse)
            }
            Ok(Err(ScraperError::Timeout(detail))) => {
                warn!(url, "engine timed out navigating: {}", detail);
                Ok(NavigationOutcome::TimedOut)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                warn!(url, "navigation did not settle within {:?}", self.timeout);
                Ok(NavigationOutcome::TimedOut)
            }
        }
    }
}
