//! HTTP liveness probing for managed services.
//!
//! An HTTP success status is the sole healthy signal; response bodies are
//! never inspected. Used by boot stage 9 and by the watchdog.

use std::time::Duration;

use crate::config::ServiceProbe;
use crate::constants;

/// Result of probing one service endpoint.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProbeResult {
    pub name: String,
    pub healthy: bool,
    /// Status line or transport error, for the log only.
    pub detail: String,
}

/// Build the probe client with the fixed per-request timeout.
pub fn client() -> anyhow::Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(constants::HEALTH_PROBE_TIMEOUT_SECS))
        .build()
        .map_err(Into::into)
}

/// Probe a single endpoint.
pub fn probe(client: &reqwest::blocking::Client, target: &ServiceProbe) -> ProbeResult {
    match client.get(&target.url).send() {
        Ok(resp) => {
            let healthy = resp.status().is_success();
            ProbeResult {
                name: target.name.clone(),
                healthy,
                detail: resp.status().to_string(),
            }
        },
        Err(e) => ProbeResult {
            name: target.name.clone(),
            healthy: false,
            detail: e.to_string(),
        },
    }
}

/// Probe every configured endpoint, logging each unhealthy one.
pub fn probe_all(targets: &[ServiceProbe]) -> Vec<ProbeResult> {
    let Ok(client) = client() else {
        return targets
            .iter()
            .map(|t| ProbeResult {
                name: t.name.clone(),
                healthy: false,
                detail: "probe client unavailable".into(),
            })
            .collect();
    };

    targets
        .iter()
        .map(|t| {
            let result = probe(&client, t);
            if result.healthy {
                tracing::debug!(service = %result.name, "Service healthy");
            } else {
                tracing::warn!(service = %result.name, detail = %result.detail, "Service unhealthy");
            }
            result
        })
        .collect()
}
