use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur when calling the WHOIS lookup API
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error status: {0}")]
    ApiError(u16),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Lookup timed out after {0}ms")]
    Timeout(u64),
}

/// Registration status reported by the lookup API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupStatus {
    /// Raw `domain_status` value, if the API sent one
    pub status: Option<String>,
}

impl LookupStatus {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
        }
    }

    /// A name is available unless the registry reports it as active
    pub fn is_available(&self) -> bool {
        !matches!(&self.status, Some(s) if s.eq_ignore_ascii_case("active"))
    }
}

/// Opaque registration-status provider
#[async_trait]
pub trait DomainLookup: Send + Sync + 'static {
    async fn lookup(&self, full_name: &str) -> Result<LookupStatus, LookupError>;
}

/// IP2WHOIS API client
///
/// `GET {endpoint}/?key={api_key}&domain={full_name}` answers with a JSON
/// object whose `domain_status` field is `"ACTIVE"` for held names.
pub struct Ip2WhoisClient {
    base_url: String,
    api_key: String,
    client: Client,
}

impl Ip2WhoisClient {
    pub fn new(base_url: String, api_key: String) -> Result<Self, LookupError> {
        let client = Client::builder()
            .user_agent(concat!("domain-availability/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            base_url,
            api_key,
            client,
        })
    }
}

#[async_trait]
impl DomainLookup for Ip2WhoisClient {
    async fn lookup(&self, full_name: &str) -> Result<LookupStatus, LookupError> {
        let url = format!(
            "{}/?key={}&domain={}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(&self.api_key),
            urlencoding::encode(full_name)
        );

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(LookupError::ApiError(response.status().as_u16()));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| LookupError::InvalidResponse(e.to_string()))?;

        let object = json
            .as_object()
            .ok_or_else(|| LookupError::InvalidResponse("Expected a JSON object".into()))?;

        let status = object
            .get("domain_status")
            .and_then(|s| s.as_str())
            .map(str::to_string);

        tracing::trace!("Lookup {} -> {:?}", full_name, status);

        Ok(LookupStatus { status })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(!LookupStatus::new("ACTIVE").is_available());
        assert!(!LookupStatus::new("active").is_available());
        assert!(LookupStatus::new("INACTIVE").is_available());
        assert!(LookupStatus { status: None }.is_available());
    }

    #[tokio::test]
    async fn test_lookup_parses_status() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("key".into(), "secret".into()),
                mockito::Matcher::UrlEncoded("domain".into(), "taken.com".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"domain":"taken.com","domain_status":"ACTIVE"}"#)
            .create_async()
            .await;

        let client = Ip2WhoisClient::new(server.url(), "secret".into()).unwrap();
        let status = client.lookup("taken.com").await.unwrap();

        assert!(!status.is_available());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_lookup_error_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/")
            .match_query(mockito::Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let client = Ip2WhoisClient::new(server.url(), "secret".into()).unwrap();
        let err = client.lookup("any.com").await.unwrap_err();

        assert!(matches!(err, LookupError::ApiError(503)));
    }

    #[tokio::test]
    async fn test_lookup_rejects_non_json() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        let client = Ip2WhoisClient::new(server.url(), "secret".into()).unwrap();
        let err = client.lookup("any.com").await.unwrap_err();

        assert!(matches!(err, LookupError::InvalidResponse(_)));
    }
}
