//! Collects JSON/XML responses the page receives while a scrape runs.

use std::sync::Arc;

use futures::{FutureExt, StreamExt};
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, trace, warn};

use crate::traits::{NetworkResponse, ResponseStream};

use super::headers::header_value;
use super::types::{DataContentType, OutputFlags, ScrapeDataItem};

/// Items captured so far. Appends to both lists go through one lock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedData {
    pub json: Vec<ScrapeDataItem>,
    pub xml: Vec<ScrapeDataItem>,
}

impl CapturedData {
    fn push(&mut self, item: ScrapeDataItem) {
        if item.content_type.is_json() {
            self.json.push(item);
        } else {
            self.xml.push(item);
        }
    }
}

/// Which content types are collected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContentFilter {
    pub json: bool,
    pub xml: bool,
}

impl ContentFilter {
    pub fn from_flags(flags: &OutputFlags) -> Self {
        Self {
            json: flags.json_data,
            xml: flags.xml_data,
        }
    }

    /// JSON is checked first; `application/xml` wins over `text/xml`.
    pub fn classify(&self, content_type: &str) -> Option<DataContentType> {
        let content_type = content_type.to_ascii_lowercase();
        if self.json && content_type.contains("application/json") {
            Some(DataContentType::ApplicationJson)
        } else if self.xml && content_type.contains("application/xml") {
            Some(DataContentType::ApplicationXml)
        } else if self.xml && content_type.contains("text/xml") {
            Some(DataContentType::TextXml)
        } else {
            None
        }
    }
}

/// Handle on the background task consuming a page's response stream.
///
/// Each response is handled in its own task, so body reads run concurrently
/// with each other and with navigation. Collection stops when the
/// interceptor is dropped.
pub struct ResponseInterceptor {
    captured: Arc<Mutex<CapturedData>>,
    flushes: mpsc::UnboundedSender<oneshot::Sender<()>>,
    pump: JoinHandle<()>,
}

impl ResponseInterceptor {
    pub fn attach(stream: ResponseStream, filter: ContentFilter) -> Self {
        let captured = Arc::new(Mutex::new(CapturedData::default()));
        let (flushes, flush_rx) = mpsc::unbounded_channel();
        let pump = tokio::spawn(pump(stream, filter, captured.clone(), flush_rx));
        debug!(json = filter.json, xml = filter.xml, "response interceptor attached");
        Self {
            captured,
            flushes,
            pump,
        }
    }

    /// Wait until every response already delivered on the stream has been
    /// handled, body read included. Responses arriving later are still
    /// collected afterwards.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.flushes.send(done).is_ok() {
            let _ = wait.await;
        }
    }

    /// Copy of everything captured so far.
    pub async fn snapshot(&self) -> CapturedData {
        self.captured.lock().await.clone()
    }
}

impl Drop for ResponseInterceptor {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

async fn pump(
    mut stream: ResponseStream,
    filter: ContentFilter,
    captured: Arc<Mutex<CapturedData>>,
    mut flushes: mpsc::UnboundedReceiver<oneshot::Sender<()>>,
) {
    let mut tasks = JoinSet::new();
    let mut stream_open = true;

    loop {
        tokio::select! {
            next = stream.next(), if stream_open => match next {
                Some(response) => {
                    tasks.spawn(capture(response, filter, captured.clone()));
                }
                None => {
                    debug!("response stream closed");
                    stream_open = false;
                }
            },
            Some(done) = flushes.recv() => {
                while stream_open {
                    match stream.next().now_or_never() {
                        Some(Some(response)) => {
                            tasks.spawn(capture(response, filter, captured.clone()));
                        }
                        Some(None) => stream_open = false,
                        None => break,
                    }
                }
                while let Some(result) = tasks.join_next().await {
                    log_join(result);
                }
                let _ = done.send(());
            },
            Some(result) = tasks.join_next(), if !tasks.is_empty() => log_join(result),
            else => break,
        }
    }
}

fn log_join(result: Result<(), JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            warn!("response handler panicked: {}", e);
        }
    }
}

async fn capture(
    response: Arc<dyn NetworkResponse>,
    filter: ContentFilter,
    captured: Arc<Mutex<CapturedData>>,
) {
    if !response.ok() {
        trace!(status = response.status(), url = response.url(), "skipping non-ok response");
        return;
    }

    let content_type = header_value(response.headers(), CONTENT_TYPE).unwrap_or_default();
    let Some(kind) = filter.classify(&content_type) else {
        return;
    };
    let auth_header = header_value(response.request_headers(), AUTHORIZATION);
    let request_url = response.url().to_string();

    let item = match response.text().await {
        Ok(body) => {
            debug!(content_type = %kind, url = %request_url, bytes = body.len(), "captured response");
            ScrapeDataItem::captured(kind, request_url, auth_header, body)
        }
        Err(e) => {
            warn!(content_type = %kind, url = %request_url, "response body read failed: {}", e);
            ScrapeDataItem::failed(kind, request_url, auth_header, e.to_string())
        }
    };

    captured.lock().await.push(item);
}
