use tracing::warn;

use super::interceptor::CapturedData;
use super::types::{OutputFlags, ScrapeResponse};

/// Accumulates the partial outcomes of one scrape.
#[derive(Debug)]
pub struct ResultAggregator {
    url: String,
    flags: OutputFlags,
    source_document: Option<String>,
    rendered_document: Option<String>,
    errors: Vec<String>,
}

impl ResultAggregator {
    pub fn new(url: impl Into<String>, flags: OutputFlags) -> Self {
        Self {
            url: url.into(),
            flags,
            source_document: None,
            rendered_document: None,
            errors: Vec::new(),
        }
    }

    pub fn set_source_document(&mut self, document: String) {
        if self.flags.source_document {
            self.source_document = Some(document);
        }
    }

    pub fn set_rendered_document(&mut self, document: String) {
        if self.flags.rendered_document {
            self.rendered_document = Some(document);
        }
    }

    /// Record a non-fatal stage error.
    pub fn record_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(url = %self.url, "{}", message);
        self.errors.push(message);
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// True once either document has been captured.
    pub fn navigation_successful(&self) -> bool {
        self.source_document.is_some() || self.rendered_document.is_some()
    }

    pub fn finish(self, captured: CapturedData) -> ScrapeResponse {
        let navigation_successful = self.navigation_successful();
        let CapturedData { json, xml } = captured;
        ScrapeResponse {
            url: self.url,
            navigation_successful,
            source_document: self.source_document,
            rendered_document: self.rendered_document,
            json_data: self.flags.json_data.then_some(json),
            xml_data: self.flags.xml_data.then_some(xml),
            errors: self.errors,
        }
    }
}
