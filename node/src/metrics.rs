//! # Prometheus Metrics
//!
//! Operational metrics for a deployment, rendered in the Prometheus text
//! exposition format. All metrics live in a dedicated
//! [`prometheus::Registry`] under the `ppo` namespace.
//!
//! Supply figures are reported in whole tokens as floats; base-unit
//! amounts do not fit in an `i64` gauge.

use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Registry, TextEncoder};

use ppo_contracts::Amount;

use crate::ops::Outcome;
use crate::store::System;

/// Holds all metric handles.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Calls that committed.
    pub operations_applied_total: IntCounter,
    /// Calls that were rejected.
    pub operations_rejected_total: IntCounter,
    /// Total supply in whole tokens.
    pub total_supply_tokens: Gauge,
    /// Supply cap in whole tokens.
    pub cap_tokens: Gauge,
    /// Bucket allowance available right now, in whole tokens.
    pub bucket_available_tokens: Gauge,
    /// 1 once the token is finalized.
    pub finalized: IntGauge,
    /// Length of the token event log.
    pub token_events: IntGauge,
}

impl NodeMetrics {
    /// Creates and registers all metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("ppo".into()), None)?;

        let operations_applied_total =
            IntCounter::new("operations_applied_total", "Total number of calls that committed")?;
        registry.register(Box::new(operations_applied_total.clone()))?;

        let operations_rejected_total =
            IntCounter::new("operations_rejected_total", "Total number of calls that were rejected")?;
        registry.register(Box::new(operations_rejected_total.clone()))?;

        let total_supply_tokens = Gauge::new("total_supply_tokens", "Total supply in whole tokens")?;
        registry.register(Box::new(total_supply_tokens.clone()))?;

        let cap_tokens = Gauge::new("cap_tokens", "Supply cap in whole tokens")?;
        registry.register(Box::new(cap_tokens.clone()))?;

        let bucket_available_tokens = Gauge::new(
            "bucket_available_tokens",
            "Withdrawable bucket allowance in whole tokens",
        )?;
        registry.register(Box::new(bucket_available_tokens.clone()))?;

        let finalized = IntGauge::new("finalized", "1 once the token has been finalized")?;
        registry.register(Box::new(finalized.clone()))?;

        let token_events = IntGauge::new("token_events", "Number of notifications in the token log")?;
        registry.register(Box::new(token_events.clone()))?;

        Ok(Self {
            registry,
            operations_applied_total,
            operations_rejected_total,
            total_supply_tokens,
            cap_tokens,
            bucket_available_tokens,
            finalized,
            token_events,
        })
    }

    /// Counts batch outcomes.
    pub fn record_outcomes(&self, outcomes: &[Outcome]) {
        for outcome in outcomes {
            if outcome.is_ok() {
                self.operations_applied_total.inc();
            } else {
                self.operations_rejected_total.inc();
            }
        }
    }

    /// Refreshes the gauges from the current state.
    pub fn observe(&self, system: &System) {
        let token = system.token();
        let decimals = token.decimals();
        self.total_supply_tokens.set(whole_tokens(token.total_supply(), decimals));
        self.cap_tokens.set(whole_tokens(token.cap(), decimals));
        self.bucket_available_tokens
            .set(whole_tokens(system.available(), decimals));
        self.finalized.set(i64::from(token.finalized()));
        self.token_events
            .set(i64::try_from(token.events().len()).unwrap_or(i64::MAX));
    }

    /// Encodes all registered metrics into the Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

fn whole_tokens(amount: Amount, decimals: u8) -> f64 {
    amount as f64 / 10f64.powi(i32::from(decimals))
}
