use crate::config::LogFormat;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::global;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::TracerProvider;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_DIRECTIVES: &str = "info";

/// Install the global subscriber and the W3C trace-context propagator.
///
/// Spans get OpenTelemetry ids so a caller's `traceparent` is carried into
/// the log lines, whichever output format is picked.
pub fn logger_setup(format: LogFormat) -> Result<(), SetGlobalDefaultError> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    let provider = TracerProvider::builder().build();
    let tracer = provider.tracer("image-store");
    global::set_tracer_provider(provider);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
        .with((format == LogFormat::Stackdriver).then(|| tracing_stackdriver::layer()))
        .with((format == LogFormat::Text).then(|| fmt::layer().with_target(false)));

    tracing::subscriber::set_global_default(subscriber)
}
