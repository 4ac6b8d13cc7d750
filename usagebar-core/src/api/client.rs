//! HTTP client for the web app, developer console and status page

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, COOKIE, USER_AGENT};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use super::models::{AmountResponse, OrganizationEntry, StatusPageResponse, UsageResponse};
use super::UsageSource;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::{ApiUsageSnapshot, Credentials, Organization, ServiceStatus, UsageSnapshot};

/// Client for the usage, organization, console and status endpoints
#[derive(Debug, Clone)]
pub struct ClaudeClient {
    http_client: reqwest::Client,
    web_base_url: String,
    console_base_url: String,
    status_url: String,
}

impl ClaudeClient {
    /// Create a client from configuration
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.http.user_agent)
                .map_err(|e| Error::Config(format!("invalid http.user_agent: {}", e)))?,
        );

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            web_base_url: config.api.web_base_url.trim_end_matches('/').to_string(),
            console_base_url: config.api.console_base_url.trim_end_matches('/').to_string(),
            status_url: config.api.status_url.clone(),
        })
    }

    fn session_cookie(session_key: &str) -> Result<HeaderValue> {
        HeaderValue::from_str(&format!("sessionKey={}", session_key))
            .map_err(|_| Error::Validation("session key contains invalid characters".to_string()))
    }

    /// GET `url` and decode a JSON body, mapping status codes to errors.
    async fn get_json<T: DeserializeOwned>(&self, url: &str, session_key: Option<&str>) -> Result<T> {
        let mut request = self.http_client.get(url);
        if let Some(key) = session_key {
            request = request.header(COOKIE, Self::session_cookie(key)?);
        }

        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            let body = response.bytes().await?;
            Ok(serde_json::from_slice(&body)?)
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            tracing::debug!(%url, status = status.as_u16(), "Request rejected");
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                Err(Error::Unauthorized(format!("{} ({})", error_text, status)))
            } else {
                Err(Error::Api {
                    status: status.as_u16(),
                    body: error_text,
                })
            }
        }
    }

    fn org_url(base: &str, org: &str, path: &str) -> String {
        format!(
            "{}/api/organizations/{}/{}",
            base,
            urlencoding::encode(org),
            path
        )
    }
}

#[async_trait]
impl UsageSource for ClaudeClient {
    async fn fetch_usage(&self, creds: &Credentials) -> Result<UsageSnapshot> {
        let url = Self::org_url(&self.web_base_url, &creds.organization_id, "usage");
        let response: UsageResponse = self.get_json(&url, Some(&creds.session_key)).await?;
        Ok(response.into_snapshot(Utc::now()))
    }

    async fn fetch_service_status(&self) -> Result<ServiceStatus> {
        let response: StatusPageResponse = self.get_json(&self.status_url, None).await?;
        Ok(response.into())
    }

    async fn fetch_api_usage(&self, creds: &Credentials) -> Result<ApiUsageSnapshot> {
        let credits_url = Self::org_url(
            &self.console_base_url,
            &creds.organization_id,
            "prepaid/credits",
        );
        let spend_url = Self::org_url(
            &self.console_base_url,
            &creds.organization_id,
            "current_spend",
        );

        let (remaining, used) = tokio::try_join!(
            self.get_json::<AmountResponse>(&credits_url, Some(&creds.session_key)),
            self.get_json::<AmountResponse>(&spend_url, Some(&creds.session_key)),
        )?;

        Ok(ApiUsageSnapshot::from_amounts(
            used.dollars(),
            remaining.dollars(),
            Utc::now(),
        ))
    }

    async fn fetch_organizations(&self, session_key: &str) -> Result<Vec<Organization>> {
        let url = format!("{}/api/organizations", self.web_base_url);
        let entries: Vec<OrganizationEntry> = self.get_json(&url, Some(session_key)).await?;
        Ok(entries
            .into_iter()
            .map(|e| Organization {
                uuid: e.uuid,
                name: e.name,
            })
            .collect())
    }
}
