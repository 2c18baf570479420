//! Catalog API client

use std::sync::Arc;

use pulpit_proto::config::ApiConfig;
use pulpit_proto::protocol::{
    ApiEnvelope, LiveSession, PublicationStatus, Sermon, SermonDraft, SessionStatus,
};
use reqwest::{Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::credentials::CredentialProvider;
use crate::error::{SourceError, SourceResult};
use crate::source::{LiveSessionSource, SermonSource};

/// HTTP client for the remote catalog API.
///
/// Reads are anonymous; every mutating call requires a bearer token from the
/// injected [`CredentialProvider`] and fails with
/// [`SourceError::AuthenticationRequired`] before touching the network when
/// there is none.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
    credentials: Arc<dyn CredentialProvider>,
}

impl ApiClient {
    pub fn new(base_url: &str, credentials: Arc<dyn CredentialProvider>) -> SourceResult<Self> {
        Self::with_client(reqwest::Client::new(), base_url, credentials)
    }

    pub fn from_config(
        config: &ApiConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> SourceResult<Self> {
        let mut builder = reqwest::Client::builder().user_agent(concat!(
            "pulpit/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        Self::with_client(builder.build()?, &config.base_url, credentials)
    }

    pub fn with_client(
        http: reqwest::Client,
        base_url: &str,
        credentials: Arc<dyn CredentialProvider>,
    ) -> SourceResult<Self> {
        let base = Url::parse(base_url.trim())
            .map_err(|e| SourceError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(SourceError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self {
            http,
            base,
            credentials,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    /// `base` + percent-encoded `segments`.
    fn endpoint(&self, segments: &[&str]) -> SourceResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| SourceError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn bearer(&self) -> SourceResult<String> {
        self.credentials
            .bearer_token()
            .ok_or(SourceError::AuthenticationRequired)
    }

    fn authed(&self, method: Method, url: Url) -> SourceResult<RequestBuilder> {
        let token = self.bearer()?;
        Ok(self.http.request(method, url).bearer_auth(token))
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        status: &str,
    ) -> SourceResult<Vec<T>> {
        let url = self.endpoint(segments)?;
        debug!("GET {} status={}", url, status);
        let response = self
            .http
            .get(url)
            .header("Accept", "application/json")
            .query(&[("status", status)])
            .send()
            .await?;
        let data: Option<Vec<T>> = read_envelope(response).await?;
        Ok(data.unwrap_or_default())
    }

    pub async fn create_sermon(&self, draft: &SermonDraft) -> SourceResult<Sermon> {
        let url = self.endpoint(&["sermons"])?;
        let response = self.authed(Method::POST, url)?.json(draft).send().await?;
        let sermon: Sermon = require_data(read_envelope(response).await?)?;
        info!("Created sermon {}", sermon.id);
        Ok(sermon)
    }

    pub async fn update_sermon(&self, id: &str, draft: &SermonDraft) -> SourceResult<Sermon> {
        let url = self.endpoint(&["sermons", id])?;
        let response = self.authed(Method::PUT, url)?.json(draft).send().await?;
        let sermon: Sermon = require_data(read_envelope(response).await?)?;
        info!("Updated sermon {}", id);
        Ok(sermon)
    }

    pub async fn delete_sermon(&self, id: &str) -> SourceResult<()> {
        let url = self.endpoint(&["sermons", id])?;
        let response = self.authed(Method::DELETE, url)?.send().await?;
        let _: Option<serde_json::Value> = read_envelope(response).await?;
        info!("Deleted sermon {}", id);
        Ok(())
    }
}

fn require_data<T>(data: Option<T>) -> SourceResult<T> {
    data.ok_or_else(|| SourceError::Rejected("response carried no data".to_string()))
}

/// Check the HTTP status, then unwrap the `{success, data, message}` envelope.
async fn read_envelope<T: DeserializeOwned>(response: Response) -> SourceResult<Option<T>> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(SourceError::Status {
            status: status.as_u16(),
            body: truncate(&body, 200),
        });
    }

    let envelope: ApiEnvelope<T> = serde_json::from_str(&body)?;
    if !envelope.success {
        return Err(SourceError::Rejected(
            envelope
                .message
                .unwrap_or_else(|| "request was not successful".to_string()),
        ));
    }
    Ok(envelope.data)
}

fn truncate(s: &str, max_chars: usize) -> String {
    let trimmed = s.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

impl LiveSessionSource for ApiClient {
    async fn list_sessions(&self, status: SessionStatus) -> SourceResult<Vec<LiveSession>> {
        self.get_list(&["live-sessions"], status.as_str()).await
    }

    async fn archive_session(&self, id: &str) -> SourceResult<()> {
        let url = self.endpoint(&["live-sessions", id, "archive"])?;
        let response = self.authed(Method::POST, url)?.send().await?;
        let _: Option<serde_json::Value> = read_envelope(response).await?;
        Ok(())
    }
}

impl SermonSource for ApiClient {
    async fn list_sermons(&self, status: PublicationStatus) -> SourceResult<Vec<Sermon>> {
        self.get_list(&["sermons"], status.as_str()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{NoCredentials, StaticCredentials};

    fn client(base: &str) -> ApiClient {
        ApiClient::new(base, Arc::new(StaticCredentials::new("t"))).unwrap()
    }

    #[test]
    fn test_endpoint_joins_segments() {
        let c = client("https://church.example.org/api");
        let url = c.endpoint(&["live-sessions", "S1", "archive"]).unwrap();
        assert_eq!(url.as_str(), "https://church.example.org/api/live-sessions/S1/archive");
    }

    #[test]
    fn test_endpoint_tolerates_trailing_slash() {
        let c = client("https://church.example.org/api/");
        let url = c.endpoint(&["sermons"]).unwrap();
        assert_eq!(url.as_str(), "https://church.example.org/api/sermons");
    }

    #[test]
    fn test_endpoint_escapes_ids() {
        let c = client("https://church.example.org/api");
        let url = c.endpoint(&["sermons", "a/b c"]).unwrap();
        assert_eq!(url.as_str(), "https://church.example.org/api/sermons/a%2Fb%20c");
    }

    #[test]
    fn test_invalid_base_url() {
        let err = ApiClient::new("not a url", Arc::new(NoCredentials)).err().unwrap();
        assert!(matches!(err, SourceError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_archive_without_credentials_fails_fast() {
        // Port 9 (discard) is never contacted: the credential check comes first.
        let c = ApiClient::new("http://127.0.0.1:9/api", Arc::new(NoCredentials)).unwrap();
        let err = c.archive_session("S1").await.unwrap_err();
        assert!(matches!(err, SourceError::AuthenticationRequired));
        let err = c.delete_sermon("1").await.unwrap_err();
        assert!(matches!(err, SourceError::AuthenticationRequired));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("  short ", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc…");
    }
}
