//! One-shot backend reachability probe.

use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::error::ConnectivityError;
use crate::models::ConnectivityStatus;

/// Issues a single `GET {base}/` and reports whether the backend answered.
///
/// There is no retry and no periodic re-probing.
pub struct ConnectivityProber {
    url: String,
    client: reqwest::Client,
}

impl ConnectivityProber {
    pub fn new(config: &ClientConfig) -> Self {
        // A builder failure falls back to the default client instead of panicking.
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.probe_timeout)
            .build()
            .unwrap_or_default();
        Self {
            url: config.probe_url(),
            client,
        }
    }

    /// Send the probe request.
    ///
    /// # Returns
    /// - `Ok(())` on a 2xx response with a readable body.
    /// - `Err(ConnectivityError::Connect)` on DNS, connect or timeout failure.
    /// - `Err(ConnectivityError::Http)` on a non-2xx response.
    /// - `Err(ConnectivityError::Body)` when the body cannot be read.
    pub async fn probe(&self) -> Result<(), ConnectivityError> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| ConnectivityError::Connect {
                url: self.url.clone(),
                detail: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(ConnectivityError::Http {
                status: resp.status().as_u16(),
                url: self.url.clone(),
            });
        }

        resp.text().await.map_err(|e| ConnectivityError::Body {
            url: self.url.clone(),
            detail: e.to_string(),
        })?;
        Ok(())
    }

    /// Probe and collapse the outcome into a [`ConnectivityStatus`].
    pub async fn check(&self) -> ConnectivityStatus {
        match self.probe().await {
            Ok(()) => {
                info!(url = %self.url, "backend reachable");
                ConnectivityStatus::Reachable
            }
            Err(e) => {
                warn!(error = %e, url = %self.url, "backend unreachable");
                ConnectivityStatus::Unreachable
            }
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}
