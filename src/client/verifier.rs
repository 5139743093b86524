//! Remote Verifier: one bounded call to the licensing service.
//!
//! The network call runs on its own task and reports through a oneshot
//! channel. The verifier races that channel against a timer; whichever
//! finishes first decides the outcome. The channel can be resolved only
//! once, so a reply arriving after the timer fired is dropped by the sender
//! and never touches the outcome.
//!
//! Anything other than a well-formed `status` 0 or 1 reply is
//! [`RemoteOutcome::Unreachable`]: infrastructure trouble is never mistaken
//! for a rejection.

use crate::client::http::LicenseService;
use crate::protocol::models::{parse_service_reply, RemoteOutcome, VerificationRequest};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Bounded-latency wrapper around a [`LicenseService`].
#[derive(Clone)]
pub struct RemoteVerifier {
    service: Arc<dyn LicenseService>,
    timeout: Duration,
}

impl RemoteVerifier {
    /// Wrap `service`, bounding every call by `timeout`.
    pub fn new(service: Arc<dyn LicenseService>, timeout: Duration) -> Self {
        Self { service, timeout }
    }

    /// Verify a request. Never fails; every failure is `Unreachable`.
    pub async fn verify(&self, request: VerificationRequest) -> RemoteOutcome {
        let (tx, rx) = oneshot::channel();
        let service = Arc::clone(&self.service);

        tokio::spawn(async move {
            let reply = service.submit(request).await;
            if tx.send(reply).is_err() {
                debug!("Discarding licensing reply that arrived after the timeout");
            }
        });

        let reply = tokio::select! {
            reply = rx => reply,
            _ = tokio::time::sleep(self.timeout) => {
                warn!(timeout = ?self.timeout, "Licensing service did not answer in time");
                return RemoteOutcome::Unreachable;
            }
        };

        let reply = match reply {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                warn!(error = %e, "Licensing service request failed");
                return RemoteOutcome::Unreachable;
            }
            Err(_) => {
                warn!("Licensing request task ended without a reply");
                return RemoteOutcome::Unreachable;
            }
        };

        if !reply.is_success() {
            warn!(status = reply.status, "Licensing service returned an error status");
            return RemoteOutcome::Unreachable;
        }

        match parse_service_reply(&reply.body) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "Licensing service reply not understood");
                RemoteOutcome::Unreachable
            }
        }
    }
}
