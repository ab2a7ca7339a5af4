//! # Prometheus Metrics
//!
//! Operational metrics for the node, scraped by Prometheus at `/metrics` on
//! the configured metrics port.
//!
//! All metrics live in a dedicated [`prometheus::Registry`] with the
//! `trinity` prefix so they never collide with the default global registry.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::core::Collector;
use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

use trinity_contracts::{Trinity, TrinityEvent};
use trinity_protocol::amount::WEI_PER_ETHER;

/// Holds all Prometheus metric handles for the node.
///
/// Prometheus handles are internally reference counted, so clones share
/// the same underlying series.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Calls executed, labelled by method.
    pub calls_total: IntCounterVec,
    /// Calls that reverted, labelled by error kind.
    pub calls_reverted_total: IntCounterVec,
    /// Envelopes refused before execution (bad signature, chain or nonce).
    pub envelopes_rejected_total: IntCounter,
    /// Successful employer enlistments.
    pub enlistments_total: IntCounter,
    /// Skill credentials issued.
    pub credentials_issued_total: IntCounter,
    /// Kill switch activations.
    pub kill_switch_total: IntCounter,
    /// Current size of the validator set.
    pub validators: IntGauge,
    /// Current number of staked employers.
    pub employers: IntGauge,
    /// Stake currently custodied by the ledger, in ether.
    pub total_staked_ether: Gauge,
    /// Time spent executing a call, in seconds.
    pub call_latency_seconds: Histogram,
}

fn register<C: Collector + Clone + 'static>(
    registry: &Registry,
    collector: C,
) -> Result<C, prometheus::Error> {
    registry.register(Box::new(collector.clone()))?;
    Ok(collector)
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("trinity".into()), None)?;

        let calls_total = register(
            &registry,
            IntCounterVec::new(
                Opts::new("calls_total", "Total calls executed against the ledger"),
                &["method"],
            )?,
        )?;
        let calls_reverted_total = register(
            &registry,
            IntCounterVec::new(
                Opts::new("calls_reverted_total", "Total calls that reverted"),
                &["reason"],
            )?,
        )?;
        let envelopes_rejected_total = register(
            &registry,
            IntCounter::new(
                "envelopes_rejected_total",
                "Envelopes refused before execution",
            )?,
        )?;
        let enlistments_total = register(
            &registry,
            IntCounter::new("enlistments_total", "Successful employer enlistments")?,
        )?;
        let credentials_issued_total = register(
            &registry,
            IntCounter::new("credentials_issued_total", "Skill credentials issued")?,
        )?;
        let kill_switch_total = register(
            &registry,
            IntCounter::new("kill_switch_total", "Kill switch activations")?,
        )?;
        let validators = register(
            &registry,
            IntGauge::new("validators", "Size of the validator set")?,
        )?;
        let employers = register(
            &registry,
            IntGauge::new("employers", "Number of staked employers")?,
        )?;
        let total_staked_ether = register(
            &registry,
            Gauge::new("total_staked_ether", "Stake custodied by the ledger, in ether")?,
        )?;
        let call_latency_seconds = register(
            &registry,
            Histogram::with_opts(
                HistogramOpts::new(
                    "call_latency_seconds",
                    "Call execution latency in seconds",
                )
                .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]),
            )?,
        )?;

        Ok(Self {
            registry,
            calls_total,
            calls_reverted_total,
            envelopes_rejected_total,
            enlistments_total,
            credentials_issued_total,
            kill_switch_total,
            validators,
            employers,
            total_staked_ether,
            call_latency_seconds,
        })
    }

    /// Bumps the per-event counters.
    pub fn observe_event(&self, event: &TrinityEvent) {
        match event {
            TrinityEvent::ValidatorAdded { .. } => {}
            TrinityEvent::EmployerEnlisted { .. } => self.enlistments_total.inc(),
            TrinityEvent::SkillNftIssued { .. } => self.credentials_issued_total.inc(),
            TrinityEvent::EmployersFlushed { .. } => self.kill_switch_total.inc(),
        }
    }

    /// Refreshes the gauges from the ledger.
    pub fn observe_ledger(&self, ledger: &Trinity) {
        self.validators.set(ledger.validator_count() as i64);
        self.employers.set(ledger.employer_count() as i64);
        self.total_staked_ether
            .set(ledger.total_staked() as f64 / WEI_PER_ETHER as f64);
    }

    /// Encodes all registered metrics in the Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Renders `/metrics` in Prometheus text format. Returns 500 if encoding
/// fails.
pub async fn metrics_handler(State(metrics): State<SharedMetrics>) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trinity_protocol::Address;

    #[test]
    fn metrics_are_prefixed() {
        let metrics = NodeMetrics::new().unwrap();
        metrics.calls_total.with_label_values(&["kill_switch"]).inc();
        metrics.enlistments_total.inc();
        let text = metrics.encode().unwrap();
        assert!(text.contains("trinity_calls_total{method=\"kill_switch\"} 1"));
        assert!(text.contains("trinity_enlistments_total 1"));
    }

    #[test]
    fn events_bump_counters() {
        let metrics = NodeMetrics::new().unwrap();
        metrics.observe_event(&TrinityEvent::SkillNftIssued {
            token_id: 0,
            recipient: Address::ZERO,
            issuer: Address::ZERO,
            metadata_uri: String::new(),
        });
        metrics.observe_event(&TrinityEvent::EmployersFlushed {
            owner: Address::ZERO,
            amount: 0,
            employers: 0,
        });
        assert_eq!(metrics.credentials_issued_total.get(), 1);
        assert_eq!(metrics.kill_switch_total.get(), 1);
        assert_eq!(metrics.enlistments_total.get(), 0);
    }

    #[test]
    fn gauges_follow_the_ledger() {
        let metrics = NodeMetrics::new().unwrap();
        let owner = Address::from_bytes([1; 20]);
        let mut ledger = Trinity::new(owner, 0);
        ledger.add_validator(&owner, owner).unwrap();
        metrics.observe_ledger(&ledger);
        assert_eq!(metrics.validators.get(), 1);
        assert_eq!(metrics.employers.get(), 0);
    }
}
