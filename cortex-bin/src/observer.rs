//! Two [`Observer`] implementations for the orchestrator's fire-and-forget
//! event stream (spec §4.8, §6): one that logs through `tracing`
//! (always active), and one that POSTs events to the separate monitoring
//! dashboard process when `ENABLE_MONITORING=true`. Both are best-effort
//! — failures here must never affect orchestration.

use async_trait::async_trait;
use cortex_core::hook::{Event, Observer};

/// Logs every event at `debug` level. Cheap enough to always run.
pub struct TracingObserver;

#[async_trait]
impl Observer for TracingObserver {
    async fn notify(&self, event: &Event) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        tracing::debug!(kind = ?event.kind, session_id = %event.session_id, payload = %event.payload, "orchestration event");
        Ok(())
    }
}

/// Forwards events to the monitoring dashboard's loopback HTTP endpoint
/// (spec §6: "Transport is process-local... or loopback HTTP POST to a
/// known health-checked endpoint; observer unavailability must not fail
/// the orchestrator"). A failed POST is logged, not propagated.
pub struct HttpMonitoringObserver {
    client: reqwest::Client,
    url: String,
}

impl HttpMonitoringObserver {
    /// Build an observer that posts to `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Observer for HttpMonitoringObserver {
    async fn notify(&self, event: &Event) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if let Err(e) = self.client.post(&self.url).json(event).send().await {
            tracing::warn!(error = %e, url = %self.url, "monitoring dashboard unreachable, dropping event");
        }
        Ok(())
    }
}
