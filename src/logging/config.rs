//! Logging settings read from the environment.

use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown log level: {other}")),
        }
    }
}

/// Where and how much to log.
#[derive(Debug, Clone, PartialEq)]
pub struct LogSettings {
    pub environment: String,
    pub level: LogLevel,
    /// Rolling files go here; `None` logs to the console only.
    pub dir: Option<PathBuf>,
}

impl LogSettings {
    /// `ENVIRONMENT`, `LOG_LEVEL` (defaults to info in production, debug
    /// elsewhere) and `LOG_DIR` (defaults to `logs`, empty disables files).
    pub fn from_env() -> Self {
        let environment =
            std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        let default_level = if environment == "production" {
            LogLevel::Info
        } else {
            LogLevel::Debug
        };
        let level = std::env::var("LOG_LEVEL")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(default_level);
        let dir = match std::env::var("LOG_DIR") {
            Ok(dir) if dir.trim().is_empty() => None,
            Ok(dir) => Some(PathBuf::from(dir)),
            Err(_) => Some(PathBuf::from("logs")),
        };
        Self {
            environment,
            level,
            dir,
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Directive used when `RUST_LOG` is not set.
    pub fn default_directive(&self) -> String {
        format!("equity_backend={},tower_http=debug,axum=debug", self.level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parsing() {
        assert_eq!("WARNING".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!(" info ".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_default_directive() {
        let settings = LogSettings {
            environment: "production".to_string(),
            level: LogLevel::Info,
            dir: None,
        };
        assert!(settings.is_production());
        assert_eq!(
            settings.default_directive(),
            "equity_backend=info,tower_http=debug,axum=debug"
        );
    }
}
