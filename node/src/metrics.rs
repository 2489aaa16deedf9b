// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Prometheus Metrics
//!
//! Exposes exchange metrics, scraped by Prometheus at `/metrics` on the
//! configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] with
//! the `ethx` prefix so they do not collide with the default global registry.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounter, Registry, TextEncoder,
};
use std::sync::Arc;

use ethx_contracts::ExchangeHost;

/// A successful mutating call, for per-kind counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Deposit,
    Redemption,
    RateUpdate,
    EmergencyWithdrawal,
    Approval,
    Transfer,
}

/// Holds all Prometheus metric handles for the node.
///
/// Metric handles are reference counted internally, so clones share state.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Successful ETH to credit conversions.
    pub deposits_total: IntCounter,
    /// Successful credit to ETH redemptions.
    pub redemptions_total: IntCounter,
    /// Exchange rate changes.
    pub rate_updates_total: IntCounter,
    /// Emergency reserve withdrawals.
    pub emergency_withdrawals_total: IntCounter,
    /// Approvals and credit transfers.
    pub ledger_calls_total: IntCounter,
    /// Mutating calls the exchange rejected.
    pub rejected_calls_total: IntCounter,
    /// Reserve in whole units of native currency.
    pub reserve: Gauge,
    /// Outstanding credits in whole units.
    pub credit_supply: Gauge,
    /// Current exchange rate.
    pub exchange_rate: Gauge,
    /// Latency of mutating calls, including persistence.
    pub call_latency_seconds: Histogram,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("ethx".into()), None)?;

        let deposits_total = counter(&registry, "deposits_total", "Successful ETH to credit conversions")?;
        let redemptions_total =
            counter(&registry, "redemptions_total", "Successful credit to ETH redemptions")?;
        let rate_updates_total = counter(&registry, "rate_updates_total", "Exchange rate updates")?;
        let emergency_withdrawals_total = counter(
            &registry,
            "emergency_withdrawals_total",
            "Emergency withdrawals from the reserve",
        )?;
        let ledger_calls_total =
            counter(&registry, "ledger_calls_total", "Credit approvals and transfers")?;
        let rejected_calls_total =
            counter(&registry, "rejected_calls_total", "Mutating calls rejected by the exchange")?;

        let reserve = gauge(&registry, "reserve_eth", "Native currency held by the exchange")?;
        let credit_supply = gauge(&registry, "credit_supply", "Outstanding credits")?;
        let exchange_rate = gauge(&registry, "exchange_rate", "Credits per unit of native currency")?;

        let call_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "call_latency_seconds",
                "Mutating call latency in seconds, including persistence",
            )
            .buckets(vec![
                0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
            ]),
        )?;
        registry.register(Box::new(call_latency_seconds.clone()))?;

        Ok(Self {
            registry,
            deposits_total,
            redemptions_total,
            rate_updates_total,
            emergency_withdrawals_total,
            ledger_calls_total,
            rejected_calls_total,
            reserve,
            credit_supply,
            exchange_rate,
            call_latency_seconds,
        })
    }

    /// Counts a successful call.
    pub fn record(&self, kind: CallKind) {
        match kind {
            CallKind::Deposit => self.deposits_total.inc(),
            CallKind::Redemption => self.redemptions_total.inc(),
            CallKind::RateUpdate => self.rate_updates_total.inc(),
            CallKind::EmergencyWithdrawal => self.emergency_withdrawals_total.inc(),
            CallKind::Approval | CallKind::Transfer => self.ledger_calls_total.inc(),
        }
    }

    /// Refreshes the gauges from the current exchange state.
    pub fn observe(&self, host: &ExchangeHost) {
        self.reserve.set(host.reserve().to_f64_lossy());
        self.credit_supply.set(host.total_credit_supply().to_f64_lossy());
        self.exchange_rate.set(host.rate().to_f64_lossy());
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

fn counter(registry: &Registry, name: &str, help: &str) -> Result<IntCounter, prometheus::Error> {
    let metric = IntCounter::new(name, help)?;
    registry.register(Box::new(metric.clone()))?;
    Ok(metric)
}

fn gauge(registry: &Registry, name: &str, help: &str) -> Result<Gauge, prometheus::Error> {
    let metric = Gauge::new(name, help)?;
    registry.register(Box::new(metric.clone()))?;
    Ok(metric)
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
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
