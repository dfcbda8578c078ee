//! HTTP client for the reputation API, used by `iprep-cli` and by services
//! that report violations.

use anyhow::{Context, Result};
use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::api::reputation::ViolationsResponse;
use crate::reputation::{ReputationEntry, ViolationReport};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the reputation service
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080/".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Serialize)]
struct ReputationBody<'a> {
    ip: &'a str,
    reputation: u8,
}

#[derive(Serialize)]
struct ViolationBody<'a> {
    #[serde(rename = "Violation")]
    violation: &'a str,
}

#[derive(Clone)]
pub struct ReputationClient {
    client: Client,
    base: Url,
}

impl ReputationClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let base = Url::parse(&config.base_url).context("Invalid service URL")?;
        if base.cannot_be_a_base() {
            return Err(anyhow::anyhow!(
                "Service URL must be hierarchical: {}",
                config.base_url
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("iprep-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, base })
    }

    /// Join path segments onto the base URL. Segments are percent-encoded, so
    /// IPv6 literals stay in the path.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Service URL cannot be a base: {}", self.base))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<StatusCode> {
        debug!(method = %method, url = %url, "Sending request");
        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await.context("Failed to send HTTP request")?;
        Ok(response.status())
    }

    fn expect_status(status: StatusCode, expected: StatusCode, action: &str) -> Result<()> {
        if status != expected {
            return Err(anyhow::anyhow!(
                "{} failed with status {}: {}",
                action,
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            ));
        }
        Ok(())
    }

    /// Look up an IP; `None` when the service has no entry
    pub async fn reputation(&self, ip: &str) -> Result<Option<ReputationEntry>> {
        let response = self
            .client
            .get(self.endpoint(&[ip])?)
            .send()
            .await
            .context("Failed to send HTTP request")?;

        match response.status() {
            StatusCode::OK => Ok(Some(
                response
                    .json()
                    .await
                    .context("Failed to decode reputation response")?,
            )),
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(anyhow::anyhow!(
                "Reputation lookup failed with status {}",
                status.as_u16()
            )),
        }
    }

    pub async fn create(&self, ip: &str, reputation: u8) -> Result<StatusCode> {
        let body = ReputationBody { ip, reputation };
        self.send(Method::POST, self.endpoint(&[""])?, Some(&body))
            .await
    }

    pub async fn update(&self, ip: &str, reputation: u8) -> Result<StatusCode> {
        let body = ReputationBody { ip, reputation };
        self.send(Method::PUT, self.endpoint(&[ip])?, Some(&body))
            .await
    }

    /// Create the entry, or overwrite it if one already exists
    pub async fn set_reputation(&self, ip: &str, reputation: u8) -> Result<()> {
        let status = self.create(ip, reputation).await?;
        if status == StatusCode::CONFLICT {
            info!(ip = %ip, "Entry exists, updating instead");
            let status = self.update(ip, reputation).await?;
            return Self::expect_status(status, StatusCode::OK, "Reputation update");
        }
        Self::expect_status(status, StatusCode::CREATED, "Reputation create")
    }

    pub async fn delete(&self, ip: &str) -> Result<()> {
        let status = self
            .send::<()>(Method::DELETE, self.endpoint(&[ip])?, None)
            .await?;
        Self::expect_status(status, StatusCode::OK, "Reputation delete")
    }

    /// Block an IP for the longest possible recovery period
    pub async fn ban(&self, ip: &str) -> Result<()> {
        self.set_reputation(ip, 0).await
    }

    /// Restore an IP to full trust
    pub async fn unban(&self, ip: &str) -> Result<()> {
        self.set_reputation(ip, 100).await
    }

    pub async fn report_violation(&self, ip: &str, violation: &str) -> Result<()> {
        let body = ViolationBody { violation };
        let status = self
            .send(
                Method::PUT,
                self.endpoint(&["violations", ip])?,
                Some(&body),
            )
            .await?;
        Self::expect_status(status, StatusCode::NO_CONTENT, "Violation report")
    }

    pub async fn report_violations(&self, entries: &[ViolationReport]) -> Result<()> {
        let status = self
            .send(
                Method::PUT,
                self.endpoint(&["violations", ""])?,
                Some(entries),
            )
            .await?;
        Self::expect_status(status, StatusCode::NO_CONTENT, "Violation batch")
    }

    pub async fn violations(&self) -> Result<ViolationsResponse> {
        let response = self
            .client
            .get(self.endpoint(&["violations"])?)
            .send()
            .await
            .context("Failed to send HTTP request")?;

        let status = response.status();
        Self::expect_status(status, StatusCode::OK, "Violation listing")?;
        response
            .json()
            .await
            .context("Failed to decode violations response")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> ReputationClient {
        ReputationClient::new(ClientConfig {
            base_url: base.to_string(),
            ..ClientConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_endpoint_paths() {
        let client = client("http://iprep.internal:8080/");
        assert_eq!(
            client.endpoint(&["192.0.2.1"]).unwrap().as_str(),
            "http://iprep.internal:8080/192.0.2.1"
        );
        assert_eq!(
            client.endpoint(&["violations", ""]).unwrap().as_str(),
            "http://iprep.internal:8080/violations/"
        );
        assert_eq!(
            client.endpoint(&[""]).unwrap().as_str(),
            "http://iprep.internal:8080/"
        );
    }

    #[test]
    fn test_ipv6_stays_in_path() {
        let client = client("http://iprep.internal:8080");
        let url = client.endpoint(&["fe80::1"]).unwrap();
        assert_eq!(url.host_str(), Some("iprep.internal"));
        assert_eq!(url.path(), "/fe80::1");
    }

    #[test]
    fn test_rejects_bad_base() {
        assert!(
            ReputationClient::new(ClientConfig {
                base_url: "not a url".to_string(),
                ..ClientConfig::default()
            })
            .is_err()
        );
        assert!(
            ReputationClient::new(ClientConfig {
                base_url: "mailto:ops@example.com".to_string(),
                ..ClientConfig::default()
            })
            .is_err()
        );
    }
}
