use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tower::Service;
use tracing::debug;

use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::scrape::{ScrapeOrchestrator, ScrapeRequest, ScrapeResponse};
use crate::traits::BrowserEngine;

/// tower::Serviceを実装したスクレイパーサービス
///
/// Cloning is cheap; every call still gets its own browser session.
pub struct ScraperService<E> {
    orchestrator: Arc<ScrapeOrchestrator<E>>,
}

impl<E> Clone for ScraperService<E> {
    fn clone(&self) -> Self {
        Self {
            orchestrator: self.orchestrator.clone(),
        }
    }
}

impl<E: BrowserEngine + 'static> ScraperService<E> {
    pub fn new(engine: E, config: &ScraperConfig) -> Self {
        Self {
            orchestrator: Arc::new(ScrapeOrchestrator::new(engine, config)),
        }
    }

    pub fn orchestrator(&self) -> &ScrapeOrchestrator<E> {
        &self.orchestrator
    }

    pub async fn scrape(&self, request: ScrapeRequest) -> Result<ScrapeResponse, ScraperError> {
        self.orchestrator.scrape(&request).await
    }
}

impl<E: BrowserEngine + 'static> Service<ScrapeRequest> for ScraperService<E> {
    type Response = ScrapeResponse;
    type Error = ScraperError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ScrapeRequest) -> Self::Future {
        debug!("scrape request received: url={}", req.url);
        let orchestrator = self.orchestrator.clone();

        Box::pin(async move { orchestrator.scrape(&req).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeEngine, FakeScript};
    use tower::ServiceExt;

    fn service() -> ScraperService<FakeEngine> {
        ScraperService::new(FakeEngine::new(FakeScript::default()), &ScraperConfig::default())
    }

    #[tokio::test]
    async fn test_service_call() {
        let response = service()
            .oneshot(ScrapeRequest::new("https://example.com").with_source_document(true))
            .await
            .unwrap();

        assert!(response.navigation_successful);
        assert_eq!(response.source_document.as_deref(), Some("<html>ok</html>"));
    }

    #[tokio::test]
    async fn test_service_rejects_empty_request() {
        let service = service();
        let err = service
            .clone()
            .oneshot(ScrapeRequest::new("https://example.com"))
            .await
            .unwrap_err();

        assert!(matches!(err, ScraperError::Validation(_)));
        assert_eq!(service.orchestrator().engine().launches(), 0);
    }

    #[tokio::test]
    async fn test_clones_share_the_engine() {
        let service = service();
        let clone = service.clone();
        clone
            .scrape(ScrapeRequest::new("https://example.com").with_rendered_document(true))
            .await
            .unwrap();

        assert_eq!(service.orchestrator().engine().launches(), 1);
    }
}
