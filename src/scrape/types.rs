//! Request/response model for a single scrape.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ScraperError;

const ALLOWED_SCHEMES: [&str; 3] = ["http", "https", "ftp"];

/// Scrape request as received from the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeRequest {
    pub url: String,
    /// The document exactly as the server returned it.
    #[serde(default)]
    pub return_source_document: bool,
    /// The DOM after client-side scripts ran.
    #[serde(default)]
    pub return_rendered_document: bool,
    /// Every JSON response the page received while loading.
    #[serde(default)]
    pub return_json_data: bool,
    /// Every XML response the page received while loading.
    #[serde(default)]
    pub return_xml_data: bool,
}

impl ScrapeRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_source_document(mut self, enabled: bool) -> Self {
        self.return_source_document = enabled;
        self
    }

    pub fn with_rendered_document(mut self, enabled: bool) -> Self {
        self.return_rendered_document = enabled;
        self
    }

    pub fn with_json_data(mut self, enabled: bool) -> Self {
        self.return_json_data = enabled;
        self
    }

    pub fn with_xml_data(mut self, enabled: bool) -> Self {
        self.return_xml_data = enabled;
        self
    }

    pub fn outputs(&self) -> OutputFlags {
        OutputFlags {
            source_document: self.return_source_document,
            rendered_document: self.return_rendered_document,
            json_data: self.return_json_data,
            xml_data: self.return_xml_data,
        }
    }

    pub fn validate(&self) -> Result<(), ScraperError> {
        if !self.outputs().any() {
            return Err(ScraperError::Validation(
                "At least one return type (return_source_document, return_rendered_document, \
                 return_json_data, return_xml_data) must be set to true."
                    .into(),
            ));
        }
        validate_url(&self.url)
    }
}

fn validate_url(raw: &str) -> Result<(), ScraperError> {
    if raw.trim().is_empty() {
        return Err(ScraperError::Validation("URL is required.".into()));
    }
    let invalid = || ScraperError::Validation("URL must be a valid absolute URL.".into());
    let url = Url::parse(raw).map_err(|_| invalid())?;
    if !ALLOWED_SCHEMES.contains(&url.scheme()) || url.host_str().is_none() {
        return Err(invalid());
    }
    Ok(())
}

/// Which outputs a request asked for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputFlags {
    pub source_document: bool,
    pub rendered_document: bool,
    pub json_data: bool,
    pub xml_data: bool,
}

impl OutputFlags {
    pub fn any(&self) -> bool {
        self.source_document || self.rendered_document || self.json_data || self.xml_data
    }

    /// Whether network responses have to be intercepted.
    pub fn intercepts(&self) -> bool {
        self.json_data || self.xml_data
    }
}

/// Result of a scrape. Optional fields are only populated when the matching
/// request flag was set; absent fields are left out of the JSON body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeResponse {
    pub url: String,
    pub navigation_successful: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_document: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rendered_document: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_data: Option<Vec<ScrapeDataItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xml_data: Option<Vec<ScrapeDataItem>>,
    /// Non-fatal stage errors, in the order they were recorded. Not part of
    /// the wire format.
    #[serde(skip)]
    pub errors: Vec<String>,
}

/// Content type an intercepted response was classified as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataContentType {
    #[serde(rename = "application/json")]
    ApplicationJson,
    #[serde(rename = "application/xml")]
    ApplicationXml,
    #[serde(rename = "text/xml")]
    TextXml,
}

impl DataContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataContentType::ApplicationJson => "application/json",
            DataContentType::ApplicationXml => "application/xml",
            DataContentType::TextXml => "text/xml",
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self, DataContentType::ApplicationJson)
    }
}

impl fmt::Display for DataContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One intercepted network exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeDataItem {
    pub content_type: DataContentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_header: Option<String>,
    pub request_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ScrapeDataItem {
    pub fn captured(
        content_type: DataContentType,
        request_url: impl Into<String>,
        auth_header: Option<String>,
        body: String,
    ) -> Self {
        Self {
            content_type,
            auth_header,
            request_url: request_url.into(),
            response: Some(body),
            success: true,
            error_message: None,
        }
    }

    pub fn failed(
        content_type: DataContentType,
        request_url: impl Into<String>,
        auth_header: Option<String>,
        error_message: impl Into<String>,
    ) -> Self {
        let mut error_message = error_message.into();
        if error_message.is_empty() {
            error_message = "response body could not be read".to_string();
        }
        Self {
            content_type,
            auth_header,
            request_url: request_url.into(),
            response: None,
            success: false,
            error_message: Some(error_message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_defaults_missing_flags_to_false() {
        let req: ScrapeRequest = serde_json::from_value(json!({
            "url": "https://example.com",
            "return_json_data": true
        }))
        .unwrap();

        assert_eq!(req.url, "https://example.com");
        assert!(req.return_json_data);
        assert!(!req.return_source_document);
        assert!(!req.return_rendered_document);
        assert!(!req.return_xml_data);
    }

    #[test]
    fn test_request_without_url_is_rejected_by_serde() {
        let result: Result<ScrapeRequest, _> =
            serde_json::from_value(json!({ "return_json_data": true }));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_requires_a_flag() {
        let err = ScrapeRequest::new("https://example.com").validate().unwrap_err();
        assert!(matches!(err, ScraperError::Validation(msg) if msg.contains("At least one")));
    }

    #[test]
    fn test_validate_url() {
        let ok = |url: &str| ScrapeRequest::new(url).with_rendered_document(true).validate();

        assert!(ok("https://example.com/path?q=1").is_ok());
        assert!(ok("http://localhost:8080").is_ok());
        assert!(ok("ftp://files.example.com/a.xml").is_ok());

        assert!(ok("").is_err());
        assert!(ok("   ").is_err());
        assert!(ok("example.com").is_err());
        assert!(ok("/relative/path").is_err());
        assert!(ok("javascript:alert(1)").is_err());
        assert!(ok("file:///etc/passwd").is_err());
    }

    #[test]
    fn test_output_flags() {
        let req = ScrapeRequest::new("https://example.com").with_xml_data(true);
        let flags = req.outputs();
        assert!(flags.any());
        assert!(flags.intercepts());

        let req = ScrapeRequest::new("https://example.com").with_source_document(true);
        assert!(!req.outputs().intercepts());
    }

    #[test]
    fn test_response_omits_unrequested_fields() {
        let response = ScrapeResponse {
            url: "https://example.com".into(),
            navigation_successful: true,
            rendered_document: Some("<html></html>".into()),
            json_data: Some(Vec::new()),
            errors: vec!["ignored".into()],
            ..Default::default()
        };

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(
            value,
            json!({
                "url": "https://example.com",
                "navigation_successful": true,
                "rendered_document": "<html></html>",
                "json_data": []
            })
        );
    }

    #[test]
    fn test_data_item_wire_format() {
        let item = ScrapeDataItem::captured(
            DataContentType::TextXml,
            "https://example.com/feed",
            Some("Bearer X".into()),
            "<rss/>".into(),
        );
        assert_eq!(
            serde_json::to_value(&item).unwrap(),
            json!({
                "content_type": "text/xml",
                "auth_header": "Bearer X",
                "request_url": "https://example.com/feed",
                "response": "<rss/>",
                "success": true
            })
        );

        let item = ScrapeDataItem::failed(
            DataContentType::ApplicationJson,
            "https://example.com/api",
            None,
            "No resource with given identifier found",
        );
        assert_eq!(
            serde_json::to_value(&item).unwrap(),
            json!({
                "content_type": "application/json",
                "request_url": "https://example.com/api",
                "success": false,
                "error_message": "No resource with given identifier found"
            })
        );
    }

    #[test]
    fn test_failed_item_always_has_a_message() {
        let item = ScrapeDataItem::failed(DataContentType::ApplicationXml, "u", None, "");
        assert!(!item.error_message.unwrap().is_empty());
    }
}
