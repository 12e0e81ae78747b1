//! JSON-over-HTTP collaborator clients.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;

use super::wire::WireChannel;
use super::{ChannelScanner, ClassifyRequest, ContentClassifier};
use crate::config::ServiceConfig;
use crate::core::{Category, ChannelSnapshot, Classification};
use crate::error::{ClassifierError, ScanError};

/// Base URL, HTTP client and optional Basic credentials for one sidecar.
struct ServiceClient {
    url: String,
    client: Client,
    auth: Option<String>, // base64 encoded user:pass
}

impl ServiceClient {
    fn new(config: &ServiceConfig) -> Result<Self, reqwest::Error> {
        use base64::{Engine, engine::general_purpose::STANDARD};
        let auth = config.user.as_ref().map(|user| {
            let pass = config.password.as_deref().unwrap_or_default();
            STANDARD.encode(format!("{user}:{pass}"))
        });
        Ok(Self {
            url: config.url.trim_end_matches('/').to_string(),
            client: Client::builder().timeout(config.timeout()).build()?,
            auth,
        })
    }

    async fn post(&self, path: &str, body: &serde_json::Value) -> Result<reqwest::Response, reqwest::Error> {
        let mut request = self
            .client
            .post(format!("{}/{path}", self.url))
            .header("Content-Type", "application/json")
            .json(body);
        if let Some(auth) = &self.auth {
            request = request.header("Authorization", format!("Basic {auth}"));
        }
        request.send().await
    }
}

pub struct HttpScanner {
    inner: ServiceClient,
}

impl HttpScanner {
    pub fn new(config: &ServiceConfig) -> Result<Self, reqwest::Error> {
        Ok(Self { inner: ServiceClient::new(config)? })
    }
}

#[async_trait]
impl ChannelScanner for HttpScanner {
    async fn scan(&self, username: &str) -> Result<ChannelSnapshot, ScanError> {
        let resp = self
            .inner
            .post("scan", &json!({ "username": username }))
            .await
            .map_err(|e| ScanError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let retry_after = retry_after_secs(resp.headers());
            let body = resp.text().await.unwrap_or_default();
            return Err(scan_error_for(status, retry_after, body));
        }

        let body = resp.text().await.map_err(|e| ScanError::Network(e.to_string()))?;
        parse_scan_body(&body)
    }
}

/// Decode a successful scan response. An undecodable payload will not improve on retry.
pub fn parse_scan_body(body: &str) -> Result<ChannelSnapshot, ScanError> {
    let wire: WireChannel =
        serde_json::from_str(body).map_err(|e| ScanError::Invalid(format!("bad scan payload: {e}")))?;
    wire.resolve()
}

/// Map a non-success scanner status onto the error taxonomy.
pub fn scan_error_for(status: StatusCode, retry_after_secs: Option<u64>, body: String) -> ScanError {
    match status {
        StatusCode::NOT_FOUND => ScanError::NotFound,
        StatusCode::FORBIDDEN => ScanError::Private,
        StatusCode::GONE => ScanError::Removed,
        StatusCode::UNPROCESSABLE_ENTITY => ScanError::Invalid(body),
        StatusCode::TOO_MANY_REQUESTS => ScanError::RateLimited { retry_after_secs },
        other => ScanError::Network(format!("HTTP {other}: {body}")),
    }
}

fn retry_after_secs(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

pub struct HttpClassifier {
    inner: ServiceClient,
}

impl HttpClassifier {
    pub fn new(config: &ServiceConfig) -> Result<Self, reqwest::Error> {
        Ok(Self { inner: ServiceClient::new(config)? })
    }
}

/// Classifier payload. A missing category means "no answer".
#[derive(Debug, Deserialize)]
pub struct ClassifyResponse {
    pub category: Option<String>,
    pub category_secondary: Option<String>,
    pub bot_percentage: Option<f64>,
    pub ad_percentage: Option<f64>,
    pub comment_trust: Option<f64>,
}

impl ClassifyResponse {
    pub fn into_classification(self) -> Result<Option<Classification>, ClassifierError> {
        let Some(category) = self.category else {
            return Ok(None);
        };
        let parse = |raw: &str| {
            Category::from_str(raw).map_err(|e| ClassifierError::Malformed(e.to_string()))
        };
        let category = parse(&category)?;
        // An unknown secondary label is dropped rather than failing the answer.
        let category_secondary = self
            .category_secondary
            .as_deref()
            .and_then(|raw| parse(raw).ok())
            .filter(|secondary| *secondary != category);

        Ok(Some(Classification {
            category,
            category_secondary,
            bot_percentage: self.bot_percentage.map(|p| p.clamp(0.0, 100.0)),
            ad_percentage: self.ad_percentage.map(|p| p.clamp(0.0, 100.0)),
            comment_trust: self.comment_trust.map(|p| p.clamp(0.0, 100.0)),
        }))
    }
}

#[async_trait]
impl ContentClassifier for HttpClassifier {
    async fn classify(&self, request: &ClassifyRequest) -> Result<Option<Classification>, ClassifierError> {
        let body = serde_json::to_value(request).map_err(|e| ClassifierError::Malformed(e.to_string()))?;
        let resp = self
            .inner
            .post("classify", &body)
            .await
            .map_err(|e| ClassifierError::Unavailable(e.to_string()))?;

        match resp.status() {
            StatusCode::NO_CONTENT => return Ok(None),
            status if !status.is_success() => {
                return Err(ClassifierError::Unavailable(format!("HTTP {status}")));
            }
            _ => {}
        }

        let parsed: ClassifyResponse = resp
            .json()
            .await
            .map_err(|e| ClassifierError::Malformed(e.to_string()))?;
        parsed.into_classification()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn status_mapping() {
        assert_eq!(scan_error_for(StatusCode::NOT_FOUND, None, String::new()), ScanError::NotFound);
        assert_eq!(scan_error_for(StatusCode::FORBIDDEN, None, String::new()), ScanError::Private);
        assert_eq!(scan_error_for(StatusCode::GONE, None, String::new()), ScanError::Removed);
        assert_eq!(
            scan_error_for(StatusCode::UNPROCESSABLE_ENTITY, None, "bad name".into()),
            ScanError::Invalid("bad name".into())
        );
        assert_eq!(
            scan_error_for(StatusCode::TOO_MANY_REQUESTS, Some(42), String::new()),
            ScanError::RateLimited { retry_after_secs: Some(42) }
        );
        assert!(scan_error_for(StatusCode::BAD_GATEWAY, None, String::new()).is_transient());
    }

    #[test]
    fn undecodable_scan_payload_is_permanent() {
        let err = parse_scan_body(r#"{"username": 42"#).unwrap_err();
        assert!(matches!(err, ScanError::Invalid(_)));
        assert!(!err.is_transient());
        assert!(!parse_scan_body("<html>oops</html>").unwrap_err().is_transient());
    }

    #[test]
    fn parses_retry_after() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after_secs(&headers), None);
        headers.insert(RETRY_AFTER, HeaderValue::from_static("120"));
        assert_eq!(retry_after_secs(&headers), Some(120));
        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(retry_after_secs(&headers), None);
    }

    fn response(json: &str) -> ClassifyResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn classifier_answers() {
        let answer = response(
            r#"{"category": "crypto", "category_secondary": "FINANCE", "bot_percentage": 130.0, "comment_trust": 75}"#,
        )
        .into_classification()
        .unwrap()
        .unwrap();
        assert_eq!(answer.category, Category::Crypto);
        assert_eq!(answer.category_secondary, Some(Category::Finance));
        assert_eq!(answer.bot_percentage, Some(100.0));
        assert_eq!(answer.ad_percentage, None);
        assert_eq!(answer.comment_trust, Some(75.0));
    }

    #[test]
    fn missing_category_is_no_answer() {
        assert_eq!(response(r#"{"category": null}"#).into_classification().unwrap(), None);
        assert_eq!(response("{}").into_classification().unwrap(), None);
    }

    #[test]
    fn unknown_category_is_malformed() {
        let err = response(r#"{"category": "poetry"}"#).into_classification().unwrap_err();
        assert!(matches!(err, ClassifierError::Malformed(_)));
    }

    #[test]
    fn duplicate_secondary_is_dropped() {
        let answer = response(r#"{"category": "NEWS", "category_secondary": "news"}"#)
            .into_classification()
            .unwrap()
            .unwrap();
        assert_eq!(answer.category_secondary, None);
    }

    #[test]
    fn basic_auth_header() {
        let config = ServiceConfig {
            user: Some("crawler".into()),
            password: Some("secret".into()),
            ..ServiceConfig::default()
        };
        let client = ServiceClient::new(&config).unwrap();
        assert_eq!(client.auth.as_deref(), Some("Y3Jhd2xlcjpzZWNyZXQ="));
        assert!(ServiceClient::new(&ServiceConfig::default()).unwrap().auth.is_none());
    }
}
