use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::EnvLoader;
use crate::error::Error;

// Re-exported so applications log through the same macros the framework uses.
pub use tracing::{debug, error, info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Structured JSON lines, one event per line.
    Json,
    /// Multi-line human output for local development.
    #[default]
    Pretty,
    /// Single-line human output.
    Compact,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
    /// Append to `directory/file_name` through a non-blocking writer.
    File {
        directory: String,
        file_name: String,
    },
}

impl Default for LogOutput {
    fn default() -> Self {
        LogOutput::Stdout
    }
}

/// Builder for the global tracing subscriber.
///
/// ```no_run
/// use gantry_core::logging::{LogConfig, LogFormat};
///
/// let _guard = LogConfig::from_env().format(LogFormat::Compact).init();
/// ```
///
/// The returned guard must stay alive for file output to flush; dropping it
/// stops the background writer.
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    level: LogLevel,
    format: LogFormat,
    output: LogOutput,
    include_target: bool,
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Level from `GANTRY_LOG`, falling back to `info`.
    pub fn from_env() -> Self {
        let env = EnvLoader::with_prefix("GANTRY");
        let level = env
            .var("LOG")
            .and_then(|raw| LogLevel::parse(&raw))
            .unwrap_or_default();
        Self {
            level,
            ..Self::default()
        }
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn file(self, directory: impl Into<String>, file_name: impl Into<String>) -> Self {
        self.output(LogOutput::File {
            directory: directory.into(),
            file_name: file_name.into(),
        })
    }

    pub fn with_target(mut self, include: bool) -> Self {
        self.include_target = include;
        self
    }

    /// Installs the global subscriber. `GANTRY_LOG` accepts full filter
    /// directives (`gantry_core=debug,hyper=warn`) and overrides the level.
    pub fn init(self) -> Option<WorkerGuard> {
        let filter = EnvFilter::try_from_env("GANTRY_LOG")
            .unwrap_or_else(|_| EnvFilter::new(self.level.as_str()));
        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(self.include_target);

        match self.output {
            LogOutput::Stdout => {
                match self.format {
                    LogFormat::Json => builder.json().init(),
                    LogFormat::Pretty => builder.pretty().init(),
                    LogFormat::Compact => builder.compact().init(),
                }
                None
            }
            LogOutput::Stderr => {
                let builder = builder.with_writer(std::io::stderr);
                match self.format {
                    LogFormat::Json => builder.json().init(),
                    LogFormat::Pretty => builder.pretty().init(),
                    LogFormat::Compact => builder.compact().init(),
                }
                None
            }
            LogOutput::File {
                directory,
                file_name,
            } => {
                let appender = tracing_appender::rolling::never(directory, file_name);
                let (writer, guard) = tracing_appender::non_blocking(appender);
                let builder = builder.with_ansi(false).with_writer(writer);
                match self.format {
                    LogFormat::Json => builder.json().init(),
                    LogFormat::Pretty => builder.pretty().init(),
                    LogFormat::Compact => builder.compact().init(),
                }
                Some(guard)
            }
        }
    }
}

/// Logs a fatal startup error together with actionable suggestions, the
/// last thing printed before the process exits.
pub fn report_startup_failure(error: &Error, context: &str, suggestions: &[&str]) {
    error!(context, error = %error, "startup failed");
    for (index, suggestion) in suggestions.iter().enumerate() {
        info!("suggestion {}: {}", index + 1, suggestion);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parsing() {
        assert_eq!(LogLevel::parse("debug"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("WARN"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("warning"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("verbose"), None);
    }

    #[test]
    fn test_default_config() {
        let config = LogConfig::new();
        assert_eq!(config.level, LogLevel::Info);
        assert_eq!(config.format, LogFormat::Pretty);
        assert_eq!(config.output, LogOutput::Stdout);
        assert!(!config.include_target);
    }

    #[test]
    fn test_builder_chains() {
        let config = LogConfig::new()
            .level(LogLevel::Error)
            .format(LogFormat::Json)
            .file("logs", "gantry.log")
            .with_target(true);
        assert_eq!(config.level, LogLevel::Error);
        assert_eq!(config.format, LogFormat::Json);
        assert!(matches!(config.output, LogOutput::File { .. }));
        assert!(config.include_target);
    }
}
