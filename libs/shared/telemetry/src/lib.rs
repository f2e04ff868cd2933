//! Structured tracing setup shared by the agent binary: env-filter based
//! level control, JSON output in release builds, compact output in debug
//! builds, and a panic hook that routes abrupt thread terminations
//! through the same subscriber instead of letting them vanish to stderr.

use std::panic;

use tracing::{error, info, instrument};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// Initializes the global subscriber and panic hook for `service_name`.
///
/// Panics if a global subscriber has already been installed.
#[instrument(skip_all)]
pub fn init_tracing(service_name: &str) {
    init_tracing_with_layer(service_name, None);
}

/// Same as [`init_tracing`], but additionally registers `extra_layer` on
/// the subscriber. Used to mirror events into a secondary sink, such as
/// the agent's in-memory ring log buffer, without coupling this crate to
/// that sink's type.
pub fn init_tracing_with_layer(
    service_name: &str,
    extra_layer: Option<Box<dyn Layer<Registry> + Send + Sync>>,
) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "{service_name}={level},reqwest=warn,tokio_tungstenite=warn",
            level = if cfg!(debug_assertions) { "debug" } else { "info" }
        )
        .into()
    });

    // `extra_layer` is boxed as `Layer<Registry>`, so it must be the first
    // layer stacked directly on the bare registry; every layer added after
    // it (EnvFilter, fmt) is generic over the subscriber type and happily
    // wraps the accumulated `Layered<_, Registry>` instead.
    if cfg!(debug_assertions) {
        tracing_subscriber::registry()
            .with(extra_layer)
            .with(filter)
            .with(fmt::layer().compact().with_target(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(extra_layer)
            .with(filter)
            .with(fmt::layer().json().flatten_event(true))
            .init();
    }

    let service = service_name.to_string();
    panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());

        let message = panic_info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| panic_info.payload().downcast_ref::<String>().map(String::as_str))
            .unwrap_or("unknown panic payload");

        error!(
            target: "panic",
            service = %service,
            location = %location,
            "thread panicked: {message}"
        );
    }));

    info!(service = %service_name, "tracing initialized");
}
