//! Scriptable in-memory browser engine for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::StreamExt;
use http::HeaderMap;

use crate::error::ScraperError;
use crate::scrape::headers::header_map;
use crate::traits::{BrowserEngine, BrowserSession, NetworkResponse, ResponseStream};

#[derive(Debug, Clone)]
pub struct FakeResponse {
    status: u16,
    url: String,
    headers: HeaderMap,
    request_headers: HeaderMap,
    body: Result<String, String>,
    body_delay: Duration,
}

impl FakeResponse {
    pub fn new(status: u16, url: impl Into<String>) -> Self {
        Self {
            status,
            url: url.into(),
            headers: HeaderMap::new(),
            request_headers: HeaderMap::new(),
            body: Ok(String::new()),
            body_delay: Duration::ZERO,
        }
    }

    pub fn json(status: u16, url: impl Into<String>, body: &str) -> Self {
        Self::new(status, url)
            .header("Content-Type", "application/json; charset=utf-8")
            .body(body)
    }

    pub fn html(status: u16, url: impl Into<String>, body: &str) -> Self {
        Self::new(status, url)
            .header("Content-Type", "text/html; charset=utf-8")
            .body(body)
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.extend(header_map([(name, value)]));
        self
    }

    pub fn request_header(mut self, name: &str, value: &str) -> Self {
        self.request_headers.extend(header_map([(name, value)]));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Ok(body.into());
        self
    }

    pub fn body_error(mut self, message: impl Into<String>) -> Self {
        self.body = Err(message.into());
        self
    }

    pub fn body_delay(mut self, delay: Duration) -> Self {
        self.body_delay = delay;
        self
    }

    pub fn into_dyn(self) -> Arc<dyn NetworkResponse> {
        Arc::new(self)
    }
}

#[async_trait]
impl NetworkResponse for FakeResponse {
    fn status(&self) -> u16 {
        self.status
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn request_headers(&self) -> &HeaderMap {
        &self.request_headers
    }

    async fn text(&self) -> Result<String, ScraperError> {
        if !self.body_delay.is_zero() {
            tokio::time::sleep(self.body_delay).await;
        }
        self.body.clone().map_err(ScraperError::ResponseBody)
    }
}

/// Sender/stream pair standing in for a page's response events.
pub fn response_stream() -> (mpsc::UnboundedSender<Arc<dyn NetworkResponse>>, ResponseStream) {
    let (tx, rx) = mpsc::unbounded();
    (tx, rx.boxed())
}

#[derive(Debug, Clone)]
pub enum FakeNavigation {
    Respond(FakeResponse),
    NoResponse,
    /// Never settles.
    Hang,
    /// The engine itself reports a timeout.
    EngineTimeout,
    Fail(String),
    Panic(String),
}

/// What every session of a [`FakeEngine`] does.
#[derive(Debug, Clone)]
pub struct FakeScript {
    pub launch_error: Option<String>,
    pub navigation: FakeNavigation,
    /// Delivered concurrently to subscribers while navigating.
    pub network: Vec<FakeResponse>,
    pub content: Result<String, String>,
    pub close_error: Option<String>,
}

impl Default for FakeScript {
    fn default() -> Self {
        Self {
            launch_error: None,
            navigation: FakeNavigation::Respond(FakeResponse::html(
                200,
                "https://example.com",
                "<html>ok</html>",
            )),
            network: Vec::new(),
            content: Ok("<html><body>rendered</body></html>".into()),
            close_error: None,
        }
    }
}

#[derive(Debug, Default)]
struct EngineLog {
    launches: AtomicUsize,
    closes: AtomicUsize,
    calls: Mutex<Vec<&'static str>>,
}

impl EngineLog {
    fn call(&self, name: &'static str) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(name);
        }
    }
}

#[derive(Debug, Clone)]
pub struct FakeEngine {
    script: Arc<FakeScript>,
    log: Arc<EngineLog>,
}

impl FakeEngine {
    pub fn new(script: FakeScript) -> Self {
        Self {
            script: Arc::new(script),
            log: Arc::new(EngineLog::default()),
        }
    }

    pub fn launches(&self) -> usize {
        self.log.launches.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.log.closes.load(Ordering::SeqCst)
    }

    /// Session calls in the order they happened, across all sessions.
    pub fn calls(&self) -> Vec<&'static str> {
        self.log.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl BrowserEngine for FakeEngine {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, ScraperError> {
        if let Some(message) = &self.script.launch_error {
            return Err(ScraperError::BrowserInit(message.clone()));
        }
        self.log.launches.fetch_add(1, Ordering::SeqCst);
        self.log.call("launch");
        Ok(Box::new(FakeSession {
            script: self.script.clone(),
            log: self.log.clone(),
            subscribers: Vec::new(),
        }))
    }
}

struct FakeSession {
    script: Arc<FakeScript>,
    log: Arc<EngineLog>,
    subscribers: Vec<mpsc::UnboundedSender<Arc<dyn NetworkResponse>>>,
}

impl FakeSession {
    async fn deliver(&self, responses: Vec<FakeResponse>) {
        let deliveries = responses.into_iter().map(|response| {
            let subscribers = self.subscribers.clone();
            tokio::spawn(async move {
                let response = response.into_dyn();
                for subscriber in subscribers {
                    let _ = subscriber.unbounded_send(response.clone());
                }
            })
        });
        let _ = futures::future::join_all(deliveries).await;
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn subscribe_responses(&mut self) -> Result<ResponseStream, ScraperError> {
        self.log.call("subscribe");
        let (tx, stream) = response_stream();
        self.subscribers.push(tx);
        Ok(stream)
    }

    async fn navigate(
        &mut self,
        _url: &str,
    ) -> Result<Option<Arc<dyn NetworkResponse>>, ScraperError> {
        self.log.call("navigate");

        let mut responses = self.script.network.clone();
        if let FakeNavigation::Respond(document) = &self.script.navigation {
            responses.push(document.clone());
        }
        self.deliver(responses).await;

        match &self.script.navigation {
            FakeNavigation::Respond(document) => Ok(Some(document.clone().into_dyn())),
            FakeNavigation::NoResponse => Ok(None),
            FakeNavigation::Hang => std::future::pending().await,
            FakeNavigation::EngineTimeout => {
                Err(ScraperError::Timeout("Request timed out.".into()))
            }
            FakeNavigation::Fail(message) => Err(ScraperError::Navigation(message.clone())),
            FakeNavigation::Panic(message) => panic!("{}", message),
        }
    }

    async fn content(&mut self) -> Result<String, ScraperError> {
        self.log.call("content");
        self.script
            .content
            .clone()
            .map_err(ScraperError::ContentExtraction)
    }

    async fn close(&mut self) -> Result<(), ScraperError> {
        self.log.call("close");
        self.log.closes.fetch_add(1, Ordering::SeqCst);
        self.subscribers.clear();
        match &self.script.close_error {
            Some(message) => Err(ScraperError::Engine(message.clone())),
            None => Ok(()),
        }
    }
}
