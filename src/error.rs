use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("{0}")]
    Validation(String),

    #[error("browser initialization failed: {0}")]
    BrowserInit(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("content extraction failed: {0}")]
    ContentExtraction(String),

    #[error("response body unavailable: {0}")]
    ResponseBody(String),

    #[error("browser engine error: {0}")]
    Engine(String),

    #[error("{0}")]
    Unexpected(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    FileIO(#[from] std::io::Error),
}

impl ScraperError {
    /// Errors raised by the browser engine itself (launch, session, navigation).
    pub fn is_engine(&self) -> bool {
        matches!(
            self,
            ScraperError::BrowserInit(_) | ScraperError::Navigation(_) | ScraperError::Engine(_)
        )
    }

    /// Whether this error aborts a scrape. Everything else is absorbed into
    /// the partial result.
    pub fn is_fatal(&self) -> bool {
        match self {
            ScraperError::Timeout(_)
            | ScraperError::ContentExtraction(_)
            | ScraperError::ResponseBody(_) => false,
            _ => true,
        }
    }
}

impl From<chromiumoxide::error::CdpError> for ScraperError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        use chromiumoxide::error::CdpError;
        match err {
            CdpError::Timeout => ScraperError::Timeout(err.to_string()),
            other => ScraperError::Engine(other.to_string()),
        }
    }
}
