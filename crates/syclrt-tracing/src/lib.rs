//! Tracing setup for the `syclrt` runtime, its integration tests and its benchmarks.
//!
//! [`init_global_tracing`] installs a formatting layer filtered by explicit directives, else
//! `RUST_LOG`, else the preset's default directive, and applies the performance settings used by
//! [`perf_span!`] and friends.

pub mod config;
pub mod performance;

#[macro_use]
pub mod macros;

pub use tracing;
pub use tracing::{debug, error, info, trace, warn};

pub use config::{TracingConfig, TracingOutput, TracingProfile, TracingSink};

use tracing::Subscriber;
use tracing_subscriber::fmt::{self as tracing_fmt, MakeWriter, TestWriter};
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Registry};

/// Output layer as composed by [`subscriber_layers`].
pub type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum TracingSetupError {
    #[error("invalid tracing directives `{directives}`: {reason}")]
    InvalidFilter { directives: String, reason: String },
    #[error("could not install the tracing subscriber: {0}")]
    SubscriberInit(#[from] TryInitError),
}

/// The filter and the formatting layer, for callers composing their own registry.
pub fn subscriber_layers(config: &TracingConfig) -> Result<(EnvFilter, BoxedLayer), TracingSetupError> {
    let filter = config.filter()?;
    let layer = match config.sink {
        TracingSink::Stdout => format_layer(config, std::io::stdout),
        TracingSink::Stderr => format_layer(config, std::io::stderr),
        TracingSink::TestHarness => format_layer(config, TestWriter::default()),
    };
    Ok((filter, layer))
}

fn format_layer<W>(config: &TracingConfig, writer: W) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_fmt::layer()
        .with_writer(writer)
        .with_target(config.include_targets)
        .with_span_events(config.span_events.clone());
    match config.output {
        TracingOutput::Compact => Box::new(layer.compact().with_ansi(config.ansi)),
        TracingOutput::Pretty => Box::new(layer.pretty().with_ansi(config.ansi)),
        TracingOutput::Json => Box::new(layer.json().with_ansi(false)),
    }
}

/// Assemble a subscriber without installing it.
pub fn build_subscriber(config: &TracingConfig) -> Result<impl Subscriber + Send + Sync, TracingSetupError> {
    let (filter, layer) = subscriber_layers(config)?;
    Ok(Registry::default().with(layer).with(filter))
}

/// Install the configured subscriber as the process default.
///
/// Fails with [`TracingSetupError::SubscriberInit`] when another subscriber got there first; the
/// performance settings are left untouched in that case.
pub fn init_global_tracing(config: &TracingConfig) -> Result<(), TracingSetupError> {
    build_subscriber(config)?.try_init()?;
    performance::configure(config.enable_performance_tracing, config.performance_threshold_us);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_directives_are_reported_with_their_text() {
        let config = TracingConfig {
            directives: Some("=::nope".to_string()),
            ..TracingConfig::default()
        };
        match build_subscriber(&config) {
            Err(TracingSetupError::InvalidFilter { directives, .. }) => assert_eq!(directives, "=::nope"),
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("directives accepted"),
        }
    }

    #[test]
    fn every_output_and_sink_builds() {
        for output in [TracingOutput::Compact, TracingOutput::Pretty, TracingOutput::Json] {
            for sink in [TracingSink::Stdout, TracingSink::Stderr, TracingSink::TestHarness] {
                let config = TracingConfig {
                    directives: Some("syclrt=debug".to_string()),
                    output,
                    sink,
                    ..TracingConfig::default()
                };
                assert!(subscriber_layers(&config).is_ok(), "{output:?} to {sink:?}");
            }
        }
    }

    #[test]
    fn second_global_install_is_refused() {
        let config = TracingConfig::preset(TracingProfile::Test);
        let first = init_global_tracing(&config);
        let second = init_global_tracing(&config);
        assert!(first.is_ok());
        assert!(matches!(second, Err(TracingSetupError::SubscriberInit(_))));
    }
}
