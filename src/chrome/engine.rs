use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::traits::{BrowserEngine, BrowserSession, NetworkResponse, ResponseStream};

use super::network::{spawn_tracker, NetworkState};

/// Network idle check interval.
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Launches one dedicated Chromium process per session.
#[derive(Debug, Clone)]
pub struct ChromeEngine {
    config: ScraperConfig,
}

impl ChromeEngine {
    pub fn new(config: ScraperConfig) -> Self {
        Self { config }
    }

    fn browser_config(&self, user_data_dir: &Path) -> Result<BrowserConfig, ScraperError> {
        let mut builder = BrowserConfig::builder()
            .user_data_dir(user_data_dir)
            .window_size(1280, 800)
            .request_timeout(self.config.request_timeout);

        if let Some(path) = &self.config.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        if !self.config.headless {
            builder = builder.with_head();
        }
        if self.config.no_sandbox {
            builder = builder.no_sandbox();
        }

        builder = builder
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--no-first-run");

        builder
            .build()
            .map_err(|e| ScraperError::BrowserInit(format!("browser config: {}", e)))
    }
}

/// Fresh user data directory so no storage is shared between sessions.
fn unique_user_data_dir() -> PathBuf {
    static SEQUENCE: AtomicU64 = AtomicU64::new(0);
    let unique_id = format!(
        "{}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos(),
        SEQUENCE.fetch_add(1, Ordering::Relaxed)
    );
    std::env::temp_dir().join(format!("render-scraper-{}", unique_id))
}

#[async_trait]
impl BrowserEngine for ChromeEngine {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, ScraperError> {
        info!("Launching browser...");

        let user_data_dir = unique_user_data_dir();
        let browser_config = self.browser_config(&user_data_dir)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        // ブラウザイベントハンドラをバックグラウンドで実行
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                debug!("Browser event: {:?}", event);
            }
        });

        let mut session = ChromeSession {
            browser: Some(browser),
            handler: Some(handler),
            context_id: None,
            page: None,
            tracker: None,
            network: Arc::new(Mutex::new(NetworkState::default())),
            network_idle: self.config.network_idle,
            user_data_dir,
        };

        match session.open_page().await {
            Ok(()) => {
                info!("Browser session ready");
                Ok(Box::new(session))
            }
            Err(e) => {
                if let Err(close_err) = session.close().await {
                    warn!("Failed to release half-open browser session: {}", close_err);
                }
                Err(e)
            }
        }
    }
}

/// One browser, one isolated context, one page.
pub struct ChromeSession {
    browser: Option<Browser>,
    handler: Option<JoinHandle<()>>,
    context_id: Option<BrowserContextId>,
    page: Option<Page>,
    tracker: Option<JoinHandle<()>>,
    network: Arc<Mutex<NetworkState>>,
    network_idle: Duration,
    user_data_dir: PathBuf,
}

impl ChromeSession {
    async fn open_page(&mut self) -> Result<(), ScraperError> {
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| ScraperError::BrowserInit("browser is not running".into()))?;

        let context = browser
            .execute(CreateBrowserContextParams::default())
            .await
            .map_err(|e| ScraperError::BrowserInit(format!("browser context: {}", e)))?;
        let context_id = context.result.browser_context_id.clone();
        self.context_id = Some(context_id.clone());

        let mut target = CreateTargetParams::new("about:blank");
        target.browser_context_id = Some(context_id);
        let page = browser
            .new_page(target)
            .await
            .map_err(|e| ScraperError::BrowserInit(format!("new page: {}", e)))?;

        self.tracker = Some(spawn_tracker(&page, self.network.clone()).await?);
        self.page = Some(page);
        Ok(())
    }

    fn page(&self) -> Result<&Page, ScraperError> {
        self.page
            .as_ref()
            .ok_or_else(|| ScraperError::Engine("page is closed".into()))
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn subscribe_responses(&mut self) -> Result<ResponseStream, ScraperError> {
        self.page()?;
        Ok(self.network.lock().await.subscribe())
    }

    async fn navigate(&mut self, url: &str) -> Result<Option<Arc<dyn NetworkResponse>>, ScraperError> {
        let page = self.page()?;

        let navigation = page
            .execute(NavigateParams::new(url))
            .await
            .map_err(|e| match e {
                CdpError::Timeout => ScraperError::Timeout(format!("navigating to {}", url)),
                other => ScraperError::Navigation(other.to_string()),
            })?;
        let navigation = navigation.result;
        if let Some(error_text) = navigation.error_text {
            return Err(ScraperError::Navigation(format!("{}: {}", url, error_text)));
        }
        let loader_id = navigation.loader_id.map(|id| id.inner().clone());
        debug!(url, loader_id = ?loader_id, "navigation committed, waiting for network idle");

        let mut ticker = tokio::time::interval(IDLE_POLL_INTERVAL);
        loop {
            ticker.tick().await;
            let network = self.network.lock().await;
            let document = loader_id.as_deref().and_then(|id| network.document(id));
            let document_seen = loader_id.is_none() || document.is_some();
            if document_seen && network.is_idle(self.network_idle) {
                return Ok(document.map(|response| response as Arc<dyn NetworkResponse>));
            }
        }
    }

    async fn content(&mut self) -> Result<String, ScraperError> {
        self.page()?
            .content()
            .await
            .map_err(|e| ScraperError::ContentExtraction(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), ScraperError> {
        info!("Closing browser...");
        let mut errors = Vec::new();

        if let Some(tracker) = self.tracker.take() {
            tracker.abort();
        }
        self.network.lock().await.close_subscribers();

        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                warn!("Failed to close page: {}", e);
                errors.push(ScraperError::Engine(format!("close page: {}", e)));
            }
        }

        if let (Some(browser), Some(context_id)) = (self.browser.as_ref(), self.context_id.take()) {
            if let Err(e) = browser
                .execute(DisposeBrowserContextParams::new(context_id))
                .await
            {
                warn!("Failed to dispose browser context: {}", e);
                errors.push(ScraperError::Engine(format!("dispose context: {}", e)));
            }
        }

        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                warn!("Failed to close browser: {}", e);
                errors.push(ScraperError::Engine(format!("close browser: {}", e)));
            }
            if let Err(e) = browser.wait().await {
                warn!("Failed to reap browser process: {}", e);
                errors.push(ScraperError::FileIO(e));
            }
        }

        if let Some(handler) = self.handler.take() {
            handler.abort();
        }

        if let Err(e) = tokio::fs::remove_dir_all(&self.user_data_dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                debug!("Failed to remove {:?}: {}", self.user_data_dir, e);
            }
        }

        info!("Browser closed");
        errors.into_iter().next().map_or(Ok(()), Err)
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        // close() was never reached; the browser kills its process on drop.
        if let Some(tracker) = self.tracker.take() {
            tracker.abort();
        }
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
    }
}
