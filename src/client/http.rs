//! Reqwest-based transport to the licensing service.
//!
//! This module only moves bytes: it posts the verification request and
//! captures the status code and body. Interpreting the reply is the
//! verifier's job.

use crate::config::LicensingConfig;
use crate::protocol::models::{ServiceReply, VerificationRequest};
use crate::LicensureError;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::Client;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Future returned by [`LicenseService::submit`].
pub type ServiceFuture =
    Pin<Box<dyn Future<Output = Result<ServiceReply, LicensureError>> + Send + 'static>>;

/// Something that can deliver a verification request to the licensing service.
///
/// The returned future owns everything it needs, so the verifier can run it
/// on its own task and abandon it on timeout.
pub trait LicenseService: Send + Sync + 'static {
    /// Post a verification request and return the raw reply.
    fn submit(&self, request: VerificationRequest) -> ServiceFuture;
}

/// Licensing service client over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpLicenseService {
    client: Client,
    url: String,
    user_agent: String,
}

impl HttpLicenseService {
    /// Create a client from config.
    ///
    /// The reqwest timeout matches the verifier bound so an abandoned
    /// request does not linger.
    pub fn new(config: &LicensingConfig) -> Result<Self, LicensureError> {
        Self::with_url(&config.service_url, config.verification_timeout, &config.version)
    }

    /// Create a client for an explicit endpoint.
    pub fn with_url(url: &str, timeout: Duration, host_version: &str) -> Result<Self, LicensureError> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            LicensureError::ServiceTransport(format!("Failed to create client: {}", e))
        })?;

        Ok(Self {
            client,
            url: url.to_string(),
            user_agent: build_user_agent(host_version),
        })
    }

    /// Get the configured endpoint.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl LicenseService for HttpLicenseService {
    fn submit(&self, request: VerificationRequest) -> ServiceFuture {
        let client = self.client.clone();
        let url = self.url.clone();
        let user_agent = self.user_agent.clone();

        Box::pin(async move {
            let response = client
                .post(&url)
                .header(USER_AGENT, user_agent)
                .header(ACCEPT, "application/json")
                .json(&request)
                .send()
                .await
                .map_err(|e| LicensureError::ServiceTransport(format!("Request failed: {}", e)))?;

            let status = response.status().as_u16();
            let body = response
                .bytes()
                .await
                .map_err(|e| {
                    LicensureError::ServiceTransport(format!("Failed to read body: {}", e))
                })?
                .to_vec();

            Ok(ServiceReply { status, body })
        })
    }
}

/// Build a User-Agent string.
///
/// Format: `licensure/<crate version> host/<host version>`
pub fn build_user_agent(host_version: &str) -> String {
    format!("licensure/{} host/{}", env!("CARGO_PKG_VERSION"), host_version)
}
