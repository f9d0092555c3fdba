use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::traits::{BrowserEngine, BrowserSession};

use super::aggregator::ResultAggregator;
use super::interceptor::{CapturedData, ContentFilter, ResponseInterceptor};
use super::navigation::{NavigationController, NavigationOutcome, NAVIGATION_TIMEOUT_MESSAGE};
use super::types::{ScrapeRequest, ScrapeResponse};

/// Runs one scrape per call, each in its own browser session.
pub struct ScrapeOrchestrator<E> {
    engine: E,
    navigation: NavigationController,
    settle_timeout: Duration,
}

impl<E: BrowserEngine> ScrapeOrchestrator<E> {
    pub fn new(engine: E, config: &ScraperConfig) -> Self {
        Self {
            engine,
            navigation: NavigationController::new(config.navigation_timeout),
            settle_timeout: config.settle_timeout,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Validation, browser-engine and unexpected failures are returned as
    /// errors. Everything else degrades into the response.
    pub async fn scrape(&self, request: &ScrapeRequest) -> Result<ScrapeResponse, ScraperError> {
        request.validate()?;

        let flags = request.outputs();
        info!(
            url = %request.url,
            source = flags.source_document,
            rendered = flags.rendered_document,
            json = flags.json_data,
            xml = flags.xml_data,
            "starting scrape"
        );

        let mut session = self.engine.launch().await?;

        let result = AssertUnwindSafe(self.run(session.as_mut(), request))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(ScraperError::Unexpected(panic_message(panic))));

        if let Err(e) = session.close().await {
            warn!(url = %request.url, "browser session teardown failed: {}", e);
        }

        match &result {
            Ok(response) => info!(
                url = %request.url,
                navigation_successful = response.navigation_successful,
                json_items = response.json_data.as_ref().map_or(0, Vec::len),
                xml_items = response.xml_data.as_ref().map_or(0, Vec::len),
                stage_errors = response.errors.len(),
                "scrape finished"
            ),
            Err(e) => error!(url = %request.url, "scrape failed: {}", e),
        }

        result
    }

    async fn run(
        &self,
        session: &mut dyn BrowserSession,
        request: &ScrapeRequest,
    ) -> Result<ScrapeResponse, ScraperError> {
        let flags = request.outputs();
        let mut aggregator = ResultAggregator::new(&request.url, flags);

        // Must be subscribed before navigation starts.
        let interceptor = if flags.intercepts() {
            let stream = session.subscribe_responses().await?;
            Some(ResponseInterceptor::attach(
                stream,
                ContentFilter::from_flags(&flags),
            ))
        } else {
            None
        };

        let navigation = self.navigation.navigate(session, &request.url).await?;
        if navigation.is_timed_out() {
            aggregator.record_error(NAVIGATION_TIMEOUT_MESSAGE);
        }

        if flags.source_document {
            match &navigation {
                NavigationOutcome::Response(response) if response.ok() => {
                    match response.text().await {
                        Ok(body) => aggregator.set_source_document(body),
                        Err(e) => aggregator
                            .record_error(format!("Error getting source document: {}.", e)),
                    }
                }
                NavigationOutcome::Response(response) => aggregator.record_error(format!(
                    "Could not get source document, navigation status: {}.",
                    response.status()
                )),
                NavigationOutcome::NoResponse => {
                    aggregator.record_error("No navigation response received.")
                }
                NavigationOutcome::TimedOut => {}
            }
        }

        if flags.rendered_document {
            match session.content().await {
                Ok(html) => aggregator.set_rendered_document(html),
                Err(e) => aggregator.record_error(format!("Error getting rendered document: {}.", e)),
            }
        }

        let captured = match &interceptor {
            Some(interceptor) => {
                if timeout(self.settle_timeout, interceptor.flush()).await.is_err() {
                    debug!(
                        url = %request.url,
                        "response bodies still loading after {:?}, taking what has arrived",
                        self.settle_timeout
                    );
                }
                interceptor.snapshot().await
            }
            None => CapturedData::default(),
        };

        Ok(aggregator.finish(captured))
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "scrape task panicked".to_string()
    }
}
