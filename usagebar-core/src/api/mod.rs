//! Remote fetchers for usage, service status and organization data
//!
//! The refresh loop and onboarding only see the [`UsageSource`] trait, so
//! tests can swap in a scripted source without any network.

mod client;
pub mod models;

pub use client::ClaudeClient;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ApiUsageSnapshot, Credentials, Organization, ServiceStatus, UsageSnapshot};

/// Source of remote usage data.
#[async_trait]
pub trait UsageSource: Send + Sync {
    /// Fetch the subscription usage windows for one organization.
    async fn fetch_usage(&self, creds: &Credentials) -> Result<UsageSnapshot>;

    /// Fetch the public service status.
    async fn fetch_service_status(&self) -> Result<ServiceStatus>;

    /// Fetch prepaid API credit usage from the developer console.
    async fn fetch_api_usage(&self, creds: &Credentials) -> Result<ApiUsageSnapshot>;

    /// List the organizations a session key can access.
    async fn fetch_organizations(&self, session_key: &str) -> Result<Vec<Organization>>;
}
