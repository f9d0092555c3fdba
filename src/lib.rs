//! レンダリングスクレイパーライブラリ
//!
//! - ページのソースHTMLとレンダリング後のDOMを取得
//! - ページが受信したJSON/XMLレスポンスを傍受して返却
//!
//! # 使用例
//!
//! ```rust,ignore
//! use render_scraper_service::{ChromeEngine, ScrapeRequest, ScraperConfig, ScraperService};
//! use tower::ServiceExt;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ScraperConfig::from_env().unwrap();
//!     let service = ScraperService::new(ChromeEngine::new(config.clone()), &config);
//!
//!     let request = ScrapeRequest::new("https://example.com")
//!         .with_rendered_document(true)
//!         .with_json_data(true);
//!
//!     let result = service.oneshot(request).await.unwrap();
//!     println!("JSON responses: {:?}", result.json_data.map(|items| items.len()));
//! }
//! ```

pub mod api;
pub mod chrome;
pub mod config;
pub mod error;
pub mod scrape;
pub mod service;
pub mod traits;

#[cfg(test)]
mod testing;

pub use chrome::ChromeEngine;
pub use config::ScraperConfig;
pub use error::ScraperError;
pub use scrape::{
    DataContentType, ScrapeDataItem, ScrapeOrchestrator, ScrapeRequest, ScrapeResponse,
};
pub use service::ScraperService;
pub use traits::{BrowserEngine, BrowserSession, NetworkResponse};
