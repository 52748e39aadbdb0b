//! Global tracing subscriber for the `parley` binary.
//!
//! Human-readable or JSON lines on stdout, filtered by `RUST_LOG` or the
//! directive passed in, with an optional OpenTelemetry bridge that prints
//! finished spans through the stdout exporter.

use std::sync::OnceLock;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

#[derive(Debug, Clone)]
pub struct TracingOptions {
    /// Used when `RUST_LOG` is unset, e.g. `"info,parley_core=debug"`.
    pub directive: String,
    /// One JSON object per event instead of the compact text format.
    pub json: bool,
    pub otel: bool,
}

impl Default for TracingOptions {
    fn default() -> Self {
        Self {
            directive: "info".to_string(),
            json: false,
            otel: false,
        }
    }
}

pub fn build_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive))
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_tracing(options: &TracingOptions) -> Result<(), Box<dyn std::error::Error>> {
    let text = (!options.json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
    });
    let json = options.json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_events(FmtSpan::CLOSE)
    });

    let otel = options.otel.then(|| {
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
            .build();
        let tracer = provider.tracer("parley");
        let _ = TRACER_PROVIDER.set(provider.clone());
        opentelemetry::global::set_tracer_provider(provider);
        tracing_opentelemetry::layer().with_tracer(tracer)
    });

    tracing_subscriber::registry()
        .with(build_filter(&options.directive))
        .with(text)
        .with(json)
        .with(otel)
        .try_init()?;

    Ok(())
}

/// Flush spans still buffered in the OpenTelemetry provider, if one was set up.
pub fn shutdown_tracing() {
    if let Some(Err(e)) = TRACER_PROVIDER.get().map(|provider| provider.shutdown()) {
        eprintln!("warning: tracer provider shutdown failed: {e}");
    }
}
