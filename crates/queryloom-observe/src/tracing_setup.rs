//! Global tracing subscriber wiring.
//!
//! The binary decides the default verbosity (its `-v`/`-q` flags) and whether
//! the OpenTelemetry bridge is on (`QUERYLOOM_OTEL=1`); this module turns
//! those into a subscriber stack: an `EnvFilter`, a structured `fmt` layer
//! with span-close timing, and optionally an OTel layer feeding the stdout
//! span exporter (local development; swap in an OTLP exporter for real
//! deployments).
//!
//! ```no_run
//! queryloom_observe::tracing_setup::init_tracing("info,queryloom_core=debug", false).unwrap();
//! ```

use std::sync::OnceLock;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Provider kept for the shutdown flush; empty when OTel is off.
static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

/// Install the global subscriber.
///
/// `default_filter` applies only when `RUST_LOG` is unset; an explicit
/// `RUST_LOG` always wins. Fails if a global subscriber is already set.
pub fn init_tracing(
    default_filter: &str,
    enable_otel: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // Option<Layer> is itself a Layer; absent means no OTel bridge.
    let otel_layer = enable_otel.then(|| {
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
            .build();
        let tracer = provider.tracer("queryloom");

        let _ = TRACER_PROVIDER.set(provider.clone());
        opentelemetry::global::set_tracer_provider(provider);

        tracing_opentelemetry::layer().with_tracer(tracer)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_span_events(FmtSpan::CLOSE),
        )
        .with(otel_layer)
        .try_init()?;

    Ok(())
}

/// Flush buffered spans and stop the OTel provider; call once on exit.
///
/// A no-op when [`init_tracing`] ran without OTel.
pub fn shutdown_tracing() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        // The subscriber may already be torn down; log directly.
        if let Err(e) = provider.shutdown() {
            eprintln!("warning: otel provider shutdown failed: {e}");
        }
    }
}
