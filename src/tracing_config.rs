//! Tracing configuration for binaries
//!
//! The library only emits events; applications decide where they go. This
//! module builds the subscriber the `bgcompose` binary installs.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Output format for tracing events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable console output with colors (default)
    Console,
    /// Compact console output without ANSI colors, for CI logs
    Compact,
    /// JSON structured logging
    #[cfg(feature = "tracing-json")]
    Json,
}

/// Tracing configuration builder
#[derive(Debug)]
pub struct TracingConfig {
    /// Verbosity level (maps to log levels)
    pub verbosity: u8,
    pub format: TracingFormat,
    /// Environment filter string (overrides verbosity if set)
    pub env_filter: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            verbosity: 0,
            format: TracingFormat::Console,
            env_filter: None,
        }
    }
}

impl TracingConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Filter directives for the verbosity level
    ///
    /// `-v` raises this crate to debug while dependencies such as reqwest
    /// stay at info; `-vv` traces everything.
    #[must_use]
    pub fn verbosity_to_filter(&self) -> &'static str {
        match self.verbosity {
            0 => "warn,bgcompose=info",
            1 => "info,bgcompose=debug",
            _ => "trace",
        }
    }

    /// Install the global subscriber
    ///
    /// # Errors
    /// - Invalid filter directive
    /// - A global subscriber is already installed
    pub fn init(self) -> anyhow::Result<()> {
        let filter = match &self.env_filter {
            Some(directives) => EnvFilter::try_new(directives)?,
            None => EnvFilter::try_new(self.verbosity_to_filter())?,
        };
        let registry = Registry::default().with(filter);

        match self.format {
            TracingFormat::Console => {
                let layer = fmt::layer()
                    .with_ansi(true)
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact();
                registry.with(layer).try_init()?;
            },
            TracingFormat::Compact => {
                let layer = fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .compact();
                registry.with(layer).try_init()?;
            },
            #[cfg(feature = "tracing-json")]
            TracingFormat::Json => {
                let layer = fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_writer(std::io::stderr);
                registry.with(layer).try_init()?;
            },
        }

        Ok(())
    }
}

/// Initialize tracing with CLI defaults: `RUST_LOG` wins over `-v` when set
///
/// # Errors
/// - Same as [`TracingConfig::init`]
pub fn init_cli_tracing(verbosity: u8, json: bool) -> anyhow::Result<()> {
    let mut config = TracingConfig::new().with_verbosity(verbosity);

    if let Ok(directives) = std::env::var("RUST_LOG") {
        if !directives.trim().is_empty() {
            config = config.with_env_filter(directives);
        }
    }

    if json {
        #[cfg(feature = "tracing-json")]
        {
            config = config.with_format(TracingFormat::Json);
        }
        #[cfg(not(feature = "tracing-json"))]
        anyhow::bail!("JSON logs require the `tracing-json` feature");
    }

    config.init()
}

/// Span helpers for CLI commands
pub mod spans {
    use tracing::{Level, Span};
    use uuid::Uuid;

    /// Span covering one CLI subcommand
    ///
    /// Every event inside carries a fresh `run_id`, so the lines of one
    /// invocation can be grouped in aggregated JSON logs.
    pub fn command(name: &str) -> Span {
        tracing::span!(Level::INFO, "command", name = %name, run_id = %Uuid::new_v4())
    }
}
