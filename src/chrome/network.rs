//! Per-session view of the page's network traffic, fed from CDP events.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use chromiumoxide::cdp::browser_protocol::network::{
    EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent, EventResponseReceived,
    GetResponseBodyParams, Headers, RequestId, ResourceType,
};
use chromiumoxide::Page;
use futures::channel::mpsc;
use futures::stream::{self, PollNext};
use futures::StreamExt;
use http::HeaderMap;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::error::ScraperError;
use crate::scrape::headers::header_map;
use crate::traits::{NetworkResponse, ResponseStream};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LoadState {
    Pending,
    Finished,
    Failed(String),
}

enum NetworkEvent {
    Request(Arc<EventRequestWillBeSent>),
    Response(Arc<EventResponseReceived>),
    Finished(Arc<EventLoadingFinished>),
    Failed(Arc<EventLoadingFailed>),
}

#[derive(Default)]
pub(crate) struct NetworkState {
    request_headers: HashMap<String, HeaderMap>,
    loads: HashMap<String, watch::Sender<LoadState>>,
    in_flight: HashSet<String>,
    last_activity: Option<Instant>,
    /// Document responses by loader id.
    documents: HashMap<String, Arc<ChromeResponse>>,
    subscribers: Vec<mpsc::UnboundedSender<Arc<dyn NetworkResponse>>>,
}

impl NetworkState {
    fn touch(&mut self) {
        self.last_activity = Some(Instant::now());
    }

    fn load_state(&mut self, request_id: &str) -> &watch::Sender<LoadState> {
        self.loads
            .entry(request_id.to_string())
            .or_insert_with(|| watch::channel(LoadState::Pending).0)
    }

    pub(crate) fn request_started(&mut self, request_id: &str, headers: HeaderMap) {
        self.touch();
        self.in_flight.insert(request_id.to_string());
        self.load_state(request_id);
        self.request_headers.insert(request_id.to_string(), headers);
    }

    pub(crate) fn request_finished(&mut self, request_id: &str) {
        self.touch();
        self.in_flight.remove(request_id);
        self.load_state(request_id).send_replace(LoadState::Finished);
    }

    pub(crate) fn request_failed(&mut self, request_id: &str, reason: &str) {
        self.touch();
        self.in_flight.remove(request_id);
        self.load_state(request_id)
            .send_replace(LoadState::Failed(reason.to_string()));
    }

    /// Observe the load state of a request.
    pub(crate) fn watch_load(&mut self, request_id: &str) -> watch::Receiver<LoadState> {
        self.load_state(request_id).subscribe()
    }

    fn response_received(&mut self, event: &EventResponseReceived, page: &Page) {
        self.touch();
        let request_id = event.request_id.inner().clone();
        let request_headers = self
            .request_headers
            .get(&request_id)
            .cloned()
            .or_else(|| event.response.request_headers.as_ref().map(cdp_headers))
            .unwrap_or_default();

        let response = Arc::new(ChromeResponse {
            page: page.clone(),
            request_id: event.request_id.clone(),
            status: u16::try_from(event.response.status).unwrap_or(0),
            url: event.response.url.clone(),
            headers: cdp_headers(&event.response.headers),
            request_headers,
            loading: self.watch_load(&request_id),
        });
        trace!(status = response.status, url = %response.url, "response received");

        if event.r#type == ResourceType::Document {
            self.documents
                .insert(event.loader_id.inner().clone(), response.clone());
        }

        let shared: Arc<dyn NetworkResponse> = response;
        self.subscribers
            .retain(|subscriber| subscriber.unbounded_send(shared.clone()).is_ok());
    }

    fn apply(&mut self, event: NetworkEvent, page: &Page) {
        match event {
            NetworkEvent::Request(event) => {
                self.request_started(event.request_id.inner(), cdp_headers(&event.request.headers))
            }
            NetworkEvent::Response(event) => self.response_received(&event, page),
            NetworkEvent::Finished(event) => self.request_finished(event.request_id.inner()),
            NetworkEvent::Failed(event) => {
                self.request_failed(event.request_id.inner(), &event.error_text)
            }
        }
    }

    /// No request in flight and nothing happened for `window`.
    pub(crate) fn is_idle(&self, window: Duration) -> bool {
        self.in_flight.is_empty()
            && self
                .last_activity
                .map_or(true, |last| last.elapsed() >= window)
    }

    pub(crate) fn document(&self, loader_id: &str) -> Option<Arc<ChromeResponse>> {
        self.documents.get(loader_id).cloned()
    }

    pub(crate) fn subscribe(&mut self) -> ResponseStream {
        let (tx, rx) = mpsc::unbounded();
        self.subscribers.push(tx);
        rx.boxed()
    }

    /// Ends every subscriber stream.
    pub(crate) fn close_subscribers(&mut self) {
        self.subscribers.clear();
    }
}

/// Subscribe to the page's network events and keep `state` current until
/// the returned task is aborted.
pub(crate) async fn spawn_tracker(
    page: &Page,
    state: Arc<Mutex<NetworkState>>,
) -> Result<JoinHandle<()>, ScraperError> {
    let requests = page.event_listener::<EventRequestWillBeSent>().await?;
    let responses = page.event_listener::<EventResponseReceived>().await?;
    let finished = page.event_listener::<EventLoadingFinished>().await?;
    let failed = page.event_listener::<EventLoadingFailed>().await?;

    let completions = stream::select(
        finished.map(NetworkEvent::Finished),
        failed.map(NetworkEvent::Failed),
    );
    let rest = stream::select(responses.map(NetworkEvent::Response), completions);
    // requestWillBeSent precedes everything else for a request id, so drain
    // it first to have the request headers in place for the response.
    let mut events = stream::select_with_strategy(
        requests.map(NetworkEvent::Request),
        rest,
        |_: &mut ()| PollNext::Left,
    )
    .boxed();

    let page = page.clone();
    Ok(tokio::spawn(async move {
        while let Some(event) = events.next().await {
            state.lock().await.apply(event, &page);
        }
        debug!("network event streams closed");
    }))
}

fn cdp_headers(headers: &Headers) -> HeaderMap {
    match headers.inner().as_object() {
        Some(object) => header_map(
            object
                .iter()
                .filter_map(|(name, value)| value.as_str().map(|value| (name, value))),
        ),
        None => HeaderMap::new(),
    }
}

fn decode_body(body: String, base64_encoded: bool) -> Result<String, ScraperError> {
    if !base64_encoded {
        return Ok(body);
    }
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(body.as_bytes())
        .map_err(|e| ScraperError::ResponseBody(format!("invalid base64 body: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|e| ScraperError::ResponseBody(format!("body is not valid UTF-8: {}", e)))
}

/// A response seen on the page, readable until the session closes.
pub(crate) struct ChromeResponse {
    page: Page,
    request_id: RequestId,
    status: u16,
    url: String,
    headers: HeaderMap,
    request_headers: HeaderMap,
    loading: watch::Receiver<LoadState>,
}

#[async_trait]
impl NetworkResponse for ChromeResponse {
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
        // The body is only available once loading finished.
        let mut loading = self.loading.clone();
        let state = {
            let settled = loading
                .wait_for(|state| *state != LoadState::Pending)
                .await
                .map_err(|_| {
                    ScraperError::ResponseBody(
                        "session closed before the response finished loading".into(),
                    )
                })?;
            settled.clone()
        };
        if let LoadState::Failed(reason) = state {
            return Err(ScraperError::ResponseBody(reason));
        }

        let body = self
            .page
            .execute(GetResponseBodyParams::new(self.request_id.clone()))
            .await
            .map_err(|e| ScraperError::ResponseBody(e.to_string()))?;
        let body = body.result;
        decode_body(body.body, body.base64_encoded)
    }
}
