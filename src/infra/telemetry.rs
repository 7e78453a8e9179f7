use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "certify_certificates_generated_total",
            Unit::Count,
            "Total number of certificates issued and stored."
        );
        describe_counter!(
            "certify_jobs_claimed_total",
            Unit::Count,
            "Total number of generation jobs claimed by pollers."
        );
        describe_counter!(
            "certify_jobs_completed_total",
            Unit::Count,
            "Total number of generation jobs that produced a certificate."
        );
        describe_counter!(
            "certify_jobs_failed_total",
            Unit::Count,
            "Total number of generation jobs marked as failed."
        );
        describe_counter!(
            "certify_verifications_total",
            Unit::Count,
            "Total number of public verification lookups, labelled by verdict reason."
        );
        describe_histogram!(
            "certify_render_ms",
            Unit::Milliseconds,
            "Document rendering latency in milliseconds."
        );
    });
}
