use anyhow::Context;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use prometheus::{IntCounterVec, Opts, Registry};
use std::sync::OnceLock;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
pub static PROMETHEUS_REGISTRY: OnceLock<Registry> = OnceLock::new();
pub static LISTING_ANALYSES_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static PAYMENT_INTENTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static PAYMENT_VERIFICATIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static PLACES_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

fn counter(registry: &Registry, name: &str, help: &str, labels: &[&str]) -> anyhow::Result<IntCounterVec> {
    let counter = IntCounterVec::new(Opts::new(name, help), labels)
        .with_context(|| format!("Failed to create {name} metric"))?;
    registry
        .register(Box::new(counter.clone()))
        .with_context(|| format!("Failed to register {name}"))?;
    Ok(counter)
}

/// Install the global recorder and the service counters. Call once at startup.
pub fn init_metrics() -> anyhow::Result<()> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")?;

    if METRICS_HANDLE.set(handle).is_err() {
        anyhow::bail!("metrics already initialized");
    }

    let registry = Registry::new();

    let analyses = counter(
        &registry,
        "listing_analyses_total",
        "Listing analyses by outcome",
        &["outcome"],
    )?;
    let intents = counter(
        &registry,
        "payment_intents_total",
        "Payment intents created by outcome",
        &["outcome"],
    )?;
    let verifications = counter(
        &registry,
        "payment_verifications_total",
        "Payment verifications by processor status",
        &["status"],
    )?;
    let places = counter(
        &registry,
        "places_requests_total",
        "Places lookups by endpoint and outcome",
        &["endpoint", "outcome"],
    )?;

    // Only the first initializer wins; later calls have already bailed above.
    let _ = PROMETHEUS_REGISTRY.set(registry);
    let _ = LISTING_ANALYSES_TOTAL.set(analyses);
    let _ = PAYMENT_INTENTS_TOTAL.set(intents);
    let _ = PAYMENT_VERIFICATIONS_TOTAL.set(verifications);
    let _ = PLACES_REQUESTS_TOTAL.set(places);

    Ok(())
}

pub fn get_metrics() -> String {
    let mut output = METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string());

    if let Some(registry) = PROMETHEUS_REGISTRY.get() {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&registry.gather(), &mut buffer).ok();
        if let Ok(custom_metrics) = String::from_utf8(buffer) {
            output.push_str(&custom_metrics);
        }
    }

    output
}

fn outcome(ok: bool) -> &'static str {
    if ok { "success" } else { "error" }
}

pub fn record_analysis(ok: bool) {
    if let Some(counter) = LISTING_ANALYSES_TOTAL.get() {
        counter.with_label_values(&[outcome(ok)]).inc();
    }
}

pub fn record_payment_intent(ok: bool) {
    if let Some(counter) = PAYMENT_INTENTS_TOTAL.get() {
        counter.with_label_values(&[outcome(ok)]).inc();
    }
}

pub fn record_verification(status: &str) {
    if let Some(counter) = PAYMENT_VERIFICATIONS_TOTAL.get() {
        counter.with_label_values(&[status]).inc();
    }
}

pub fn record_places(endpoint: &str, ok: bool) {
    if let Some(counter) = PLACES_REQUESTS_TOTAL.get() {
        counter.with_label_values(&[endpoint, outcome(ok)]).inc();
    }
}
