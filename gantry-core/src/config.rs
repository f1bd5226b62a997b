use std::collections::HashMap;
use std::str::FromStr;

/// Reads environment variables, optionally under a common prefix.
///
/// `EnvLoader::with_prefix("GANTRY")` resolves `var("PORT")` against
/// `GANTRY_PORT`. An unprefixed loader reads variables verbatim.
#[derive(Debug, Clone, Default)]
pub struct EnvLoader {
    prefix: Option<String>,
}

impl EnvLoader {
    pub fn new() -> Self {
        Self { prefix: None }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    fn full_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}_{key}"),
            None => key.to_string(),
        }
    }

    /// Raw value, `None` when unset or not valid unicode.
    pub fn var(&self, key: &str) -> Option<String> {
        std::env::var(self.full_key(key)).ok()
    }

    pub fn var_or(&self, key: &str, default: &str) -> String {
        self.var(key).unwrap_or_else(|| default.to_string())
    }

    /// Parses a variable, falling back to `default` when unset or malformed.
    /// A malformed value is logged rather than silently dropped.
    pub fn parse_or<T: FromStr>(&self, key: &str, default: T) -> T {
        match self.var(key) {
            Some(raw) => match raw.parse() {
                Ok(value) => value,
                Err(_) => {
                    tracing::warn!(
                        variable = %self.full_key(key),
                        value = %raw,
                        "ignoring unparseable environment variable"
                    );
                    default
                }
            },
            None => default,
        }
    }

    /// True for `1`, `true`, `yes` or `on`, case-insensitive.
    pub fn flag(&self, key: &str) -> bool {
        matches!(
            self.var(key).as_deref().map(str::to_ascii_lowercase).as_deref(),
            Some("1") | Some("true") | Some("yes") | Some("on")
        )
    }

    /// Snapshot of every variable under the loader's prefix, with the
    /// prefix stripped. Useful for dumping effective configuration.
    pub fn snapshot(&self) -> HashMap<String, String> {
        let needle = self.prefix.as_ref().map(|p| format!("{p}_"));
        std::env::vars()
            .filter_map(|(key, value)| match &needle {
                Some(needle) => key
                    .strip_prefix(needle.as_str())
                    .map(|rest| (rest.to_string(), value)),
                None => Some((key, value)),
            })
            .collect()
    }
}

/// Runtime knobs the framework reads at startup, all `GANTRY_*` variables.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// `GANTRY_ENV=production` hides error traces from responses.
    pub production: bool,
    /// Default listen port (`GANTRY_PORT`).
    pub port: u16,
    /// Requests slower than this are logged as warnings (`GANTRY_SLOW_MS`).
    pub slow_request_ms: u64,
}

impl RuntimeConfig {
    pub const DEFAULT_PORT: u16 = 3000;
    pub const DEFAULT_SLOW_MS: u64 = 1000;

    pub fn from_env() -> Self {
        let env = EnvLoader::with_prefix("GANTRY");
        Self {
            production: env.var("ENV").as_deref() == Some("production"),
            port: env.parse_or("PORT", Self::DEFAULT_PORT),
            slow_request_ms: env.parse_or("SLOW_MS", Self::DEFAULT_SLOW_MS),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            production: false,
            port: Self::DEFAULT_PORT,
            slow_request_ms: Self::DEFAULT_SLOW_MS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_environment() {
        let config = RuntimeConfig::default();
        assert!(!config.production);
        assert_eq!(config.port, 3000);
        assert_eq!(config.slow_request_ms, 1000);
    }

    #[test]
    fn test_prefixed_lookup() {
        unsafe { std::env::set_var("GANTRY_TEST_LOOKUP", "hello") };
        let env = EnvLoader::with_prefix("GANTRY");
        assert_eq!(env.var("TEST_LOOKUP").as_deref(), Some("hello"));
        assert_eq!(env.var("TEST_LOOKUP_MISSING"), None);
        unsafe { std::env::remove_var("GANTRY_TEST_LOOKUP") };
    }

    #[test]
    fn test_parse_or_falls_back_on_garbage() {
        unsafe { std::env::set_var("GANTRY_TEST_PARSE", "not-a-number") };
        let env = EnvLoader::with_prefix("GANTRY");
        assert_eq!(env.parse_or("TEST_PARSE", 42u64), 42);
        unsafe { std::env::remove_var("GANTRY_TEST_PARSE") };
    }

    #[test]
    fn test_flag_accepts_common_truthy_values() {
        let env = EnvLoader::with_prefix("GANTRY");
        for value in ["1", "true", "YES", "on"] {
            unsafe { std::env::set_var("GANTRY_TEST_FLAG", value) };
            assert!(env.flag("TEST_FLAG"), "{value} should be truthy");
        }
        unsafe { std::env::set_var("GANTRY_TEST_FLAG", "0") };
        assert!(!env.flag("TEST_FLAG"));
        unsafe { std::env::remove_var("GANTRY_TEST_FLAG") };
    }

    #[test]
    fn test_snapshot_strips_prefix() {
        unsafe { std::env::set_var("GANTRYSNAP_ALPHA", "a") };
        let env = EnvLoader::with_prefix("GANTRYSNAP");
        let snapshot = env.snapshot();
        assert_eq!(snapshot.get("ALPHA").map(String::as_str), Some("a"));
        unsafe { std::env::remove_var("GANTRYSNAP_ALPHA") };
    }
}
