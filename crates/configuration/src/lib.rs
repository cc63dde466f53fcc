//! # Helmsman Configuration
//!
//! Loads the layered application configuration (TOML files plus environment
//! overrides) and owns tracing initialisation, so every binary entry point
//! boots logging the same way.

use tracing_subscriber::EnvFilter;

pub mod error;
pub mod settings;

pub use error::ConfigError;
pub use settings::{
    LoggingConfig, MarketConfig, ServerConfig, Settings, SupervisorConfig, TelegramConfig,
    VenueConfig, VenuesConfig,
};

/// Loads the application configuration.
///
/// Sources are layered, later entries winning: `config/default.toml`, an
/// optional `config/local.toml`, then environment variables prefixed with
/// `HELMSMAN_` (e.g. `HELMSMAN_SERVER__BIND=127.0.0.1:9000`).
pub fn load_settings(path: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = config::Config::builder();
    match path {
        // An explicit path replaces the default layers entirely.
        Some(path) => builder = builder.add_source(config::File::with_name(path)),
        None => {
            builder = builder
                .add_source(config::File::with_name("config/default"))
                .add_source(config::File::with_name("config/local").required(false));
        }
    }
    let builder = builder.add_source(
        config::Environment::with_prefix("HELMSMAN")
            .separator("__")
            .try_parsing(true),
    );

    let settings = builder.build()?.try_deserialize::<Settings>()?;
    settings.validate()?;
    Ok(settings)
}

/// Initialises the global tracing subscriber from the logging configuration.
///
/// Returns a guard that must be held for the lifetime of the process when
/// file logging is enabled; dropping it flushes the non-blocking writer.
pub fn init_tracing(
    logging: &LoggingConfig,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>, ConfigError> {
    let filter = EnvFilter::try_new(&logging.filter)
        .map_err(|e| ConfigError::Tracing(e.to_string()))?;

    if logging.file_logging {
        let appender = tracing_appender::rolling::daily(&logging.directory, "helmsman.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_ansi(false)
            .try_init()
            .map_err(|e| ConfigError::Tracing(e.to_string()))?;
        Ok(Some(guard))
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .try_init()
            .map_err(|e| ConfigError::Tracing(e.to_string()))?;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::settings::*;

    fn base_settings() -> Settings {
        toml::from_str::<Settings>(EXAMPLE).expect("example config parses")
    }

    const EXAMPLE: &str = r#"
        [market]
        default_symbol = "GCBUSDT"

        [venues]
        active = "a"

        [venues.venue_a]
        base_url = "https://api.venue-a.example"

        [venues.venue_b]
        base_url = "https://api.venue-b.example"

        [supervisor]

        [telegram]

        [server]

        [logging]
    "#;

    #[test]
    fn defaults_fill_unspecified_fields() {
        let settings = base_settings();
        assert_eq!(settings.market.depth_limit, 50);
        assert_eq!(settings.venues.venue_a.recv_window, 5000);
        assert_eq!(settings.supervisor.stabilizer_tick_secs, 5);
        assert_eq!(settings.supervisor.price_keeper_tick_secs, 3);
        assert_eq!(settings.supervisor.shutdown_deadline_secs, 5);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn validation_rejects_unknown_active_venue() {
        let mut settings = base_settings();
        settings.venues.active = "c".to_string();
        assert!(settings.validate().is_err());
    }
}
