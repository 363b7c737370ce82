use anyhow::{bail, Result};
use std::{fmt, str::FromStr};
use tracing_subscriber::{prelude::*, EnvFilter};

/// A validated `tracing_subscriber::EnvFilter` directive string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogFilter(String);

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

// === impl LogFilter ===

impl LogFilter {
    fn env_filter(&self) -> EnvFilter {
        // Validated on parse.
        EnvFilter::try_new(&self.0).unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

impl FromStr for LogFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        EnvFilter::try_new(s)?;
        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for LogFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// === impl LogFormat ===

impl LogFormat {
    /// Installs the global subscriber. Fails if one is already installed.
    pub fn try_init(self, filter: &LogFilter) -> Result<()> {
        let registry = tracing_subscriber::registry().with(filter.env_filter());
        match self {
            Self::Plain => registry.with(tracing_subscriber::fmt::layer()).try_init()?,
            Self::Json => registry
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()?,
        }
        Ok(())
    }
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            s if s.eq_ignore_ascii_case("plain") => Ok(Self::Plain),
            s if s.eq_ignore_ascii_case("json") => Ok(Self::Json),
            s => bail!("invalid log format: {s}; expected plain or json"),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain => f.write_str("plain"),
            Self::Json => f.write_str("json"),
        }
    }
}
