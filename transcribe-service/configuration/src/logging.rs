use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::TranscribeConfig;

/// Install the global tracing subscriber. `RUST_LOG` takes precedence over the
/// configured level. Calling this twice keeps the first subscriber.
pub fn setup_logging(config: &TranscribeConfig) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},tower_http=debug", config.logging.level))
    });

    let installed = if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_target(true).with_line_number(true))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(true).with_line_number(true))
            .try_init()
    };

    match installed {
        Ok(()) => tracing::info!(
            level = %config.logging.level,
            json = config.logging.json,
            "logging initialized"
        ),
        Err(err) => tracing::debug!(error = %err, "tracing subscriber already installed"),
    }
}
