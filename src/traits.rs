//! Capability set the scrape core needs from a browser engine.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use http::HeaderMap;

use crate::error::ScraperError;

/// Page-scoped stream of network responses.
pub type ResponseStream = BoxStream<'static, Arc<dyn NetworkResponse>>;

#[async_trait]
pub trait BrowserEngine: Send + Sync {
    /// Start a fresh engine instance with its own browser, isolated context
    /// and page. Sessions are never shared.
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, ScraperError>;
}

#[async_trait]
pub trait BrowserSession: Send {
    /// Every response the page receives after this returns is delivered on
    /// the stream, until the session is closed.
    async fn subscribe_responses(&mut self) -> Result<ResponseStream, ScraperError>;

    /// Navigate the page and wait until the network is idle (no request in
    /// flight for the engine's idle window). There is no bound of its own;
    /// callers apply the timeout. `Ok(None)` means the engine produced no
    /// navigation response (e.g. same-document navigation).
    async fn navigate(&mut self, url: &str) -> Result<Option<Arc<dyn NetworkResponse>>, ScraperError>;

    /// Serialize the page's current DOM.
    async fn content(&mut self) -> Result<String, ScraperError>;

    /// Release page, context, browser and engine. Must be safe to call once
    /// after any failure.
    async fn close(&mut self) -> Result<(), ScraperError>;
}

#[async_trait]
pub trait NetworkResponse: Send + Sync {
    fn status(&self) -> u16;

    /// 2xx and 3xx.
    fn ok(&self) -> bool {
        (200..400).contains(&self.status())
    }

    /// URL of the request that produced this response.
    fn url(&self) -> &str;

    fn headers(&self) -> &HeaderMap;

    /// Headers of the originating request.
    fn request_headers(&self) -> &HeaderMap;

    async fn text(&self) -> Result<String, ScraperError>;
}
