//! Loader configuration from the environment or a JSON file.
//!
//! [`LoaderConfig`] is the serializable counterpart of [`LoadOptions`]: plain
//! numbers and strings instead of durations and callbacks. The command line
//! front end builds one from `RESOURCE_LOADER_*` variables or a config file
//! and turns it into options with [`LoaderConfig::load_options`].

use crate::dom::{CrossOrigin, InsertionPoint};
use crate::logging::LogLevel;
use crate::options::{
    DEFAULT_MAX_CONCURRENCY, DEFAULT_RETRY_DELAY, DEFAULT_TIMEOUT, LoadOptions, Scheduling,
};
use anyhow::{Context as _, Result, anyhow};
use core::time::Duration;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;
use std::fs::read_to_string;
use std::path::Path;
use url::Url;

/// Serializable loader settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoaderConfig {
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
    pub retries: u32,
    pub retry_delay_ms: u64,
    pub max_concurrency: usize,
    /// Switches to batched scheduling with this chunk size when set.
    pub batch_size: Option<usize>,
    pub log_level: LogLevel,
    pub cache_busting: bool,
    pub cache_busting_query: Option<String>,
    pub restrict_cache_busting_to_local: bool,
    pub defer_scripts_until_ready: bool,
    pub remove_failed_elements: bool,
    pub cross_origin: Option<CrossOrigin>,
    pub insertion_point: InsertionPoint,
    /// Document URL that relative resource URLs resolve against.
    pub base_url: Option<String>,
    pub attributes: BTreeMap<String, String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        let options = LoadOptions::default();
        Self {
            timeout_ms: millis(DEFAULT_TIMEOUT),
            retries: options.retries,
            retry_delay_ms: millis(DEFAULT_RETRY_DELAY),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            batch_size: None,
            log_level: LogLevel::Warn,
            cache_busting: options.cache_busting,
            cache_busting_query: None,
            restrict_cache_busting_to_local: options.restrict_cache_busting_to_local,
            defer_scripts_until_ready: options.defer_scripts_until_ready,
            remove_failed_elements: options.remove_failed_elements,
            cross_origin: None,
            insertion_point: InsertionPoint::Head,
            base_url: None,
            attributes: BTreeMap::new(),
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl LoaderConfig {
    /// Load configuration from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `RESOURCE_LOADER_TIMEOUT_MS`: per-attempt timeout (default: 10000)
    /// - `RESOURCE_LOADER_RETRIES`: extra attempts after a failure (default: 0)
    /// - `RESOURCE_LOADER_RETRY_DELAY_MS`: pause before a retry (default: 1000)
    /// - `RESOURCE_LOADER_CONCURRENCY`: concurrency cap (default: 3, minimum 1)
    /// - `RESOURCE_LOADER_BATCH_SIZE`: enables batched scheduling
    /// - `RESOURCE_LOADER_LOG_LEVEL`: `silent`, `warn` or `verbose`
    /// - `RESOURCE_LOADER_CACHE_BUSTING`: set to "1" to enable cache busting
    /// - `RESOURCE_LOADER_BASE_URL`: document URL
    ///
    /// Unparsable values keep their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Like [`LoaderConfig::from_env`], reading variables through `lookup`.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let number = |name: &str| lookup(name).and_then(|val| val.trim().parse::<u64>().ok());
        let defaults = Self::default();
        Self {
            timeout_ms: number("RESOURCE_LOADER_TIMEOUT_MS").unwrap_or(defaults.timeout_ms),
            retries: number("RESOURCE_LOADER_RETRIES")
                .and_then(|val| u32::try_from(val).ok())
                .unwrap_or(defaults.retries),
            retry_delay_ms: number("RESOURCE_LOADER_RETRY_DELAY_MS")
                .unwrap_or(defaults.retry_delay_ms),
            max_concurrency: number("RESOURCE_LOADER_CONCURRENCY")
                .and_then(|val| usize::try_from(val).ok())
                .unwrap_or(defaults.max_concurrency)
                .max(1),
            batch_size: number("RESOURCE_LOADER_BATCH_SIZE")
                .and_then(|val| usize::try_from(val).ok())
                .filter(|size| *size > 0),
            log_level: lookup("RESOURCE_LOADER_LOG_LEVEL")
                .map_or(defaults.log_level, |name| LogLevel::parse_or_warn(&name)),
            cache_busting: lookup("RESOURCE_LOADER_CACHE_BUSTING").as_deref() == Some("1"),
            base_url: lookup("RESOURCE_LOADER_BASE_URL").filter(|url| !url.trim().is_empty()),
            ..defaults
        }
    }

    /// Parse a JSON config. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed JSON or unknown fields.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|err| anyhow!("Invalid loader config: {err}"))
    }

    /// Read and parse a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_json(&text)
    }

    /// Per-call options described by this config. Callbacks are left unset.
    #[must_use]
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            attributes: self.attributes.clone(),
            timeout: Duration::from_millis(self.timeout_ms),
            cache_busting: self.cache_busting,
            cache_busting_query: self.cache_busting_query.clone(),
            restrict_cache_busting_to_local: self.restrict_cache_busting_to_local,
            insertion_point: self.insertion_point,
            cross_origin: self.cross_origin,
            retries: self.retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            defer_scripts_until_ready: self.defer_scripts_until_ready,
            max_concurrency: self.max_concurrency.max(1),
            scheduling: self
                .batch_size
                .map_or(Scheduling::Windowed, |batch_size| Scheduling::Batched {
                    batch_size,
                }),
            remove_failed_elements: self.remove_failed_elements,
            log_level: Some(self.log_level),
            ..LoadOptions::default()
        }
    }

    /// The configured document URL, or the current directory as a `file` URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured URL does not parse or the current
    /// directory cannot be determined.
    pub fn base_url(&self) -> Result<Url> {
        if let Some(url) = &self.base_url {
            return Url::parse(url).with_context(|| format!("Invalid base URL {url}"));
        }
        let cwd = env::current_dir().context("Failed to read current directory")?;
        Url::from_directory_path(&cwd)
            .map_err(|()| anyhow!("Invalid directory for base URL: {}", cwd.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs::write;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn empty_environment_matches_defaults() {
        assert_eq!(LoaderConfig::from_lookup(lookup(&[])), LoaderConfig::default());
    }

    #[test]
    fn reads_loader_variables() {
        let config = LoaderConfig::from_lookup(lookup(&[
            ("RESOURCE_LOADER_TIMEOUT_MS", "250"),
            ("RESOURCE_LOADER_RETRIES", "2"),
            ("RESOURCE_LOADER_RETRY_DELAY_MS", "50"),
            ("RESOURCE_LOADER_CONCURRENCY", "0"),
            ("RESOURCE_LOADER_BATCH_SIZE", "4"),
            ("RESOURCE_LOADER_LOG_LEVEL", "verbose"),
            ("RESOURCE_LOADER_CACHE_BUSTING", "1"),
            ("RESOURCE_LOADER_BASE_URL", "https://example.test/"),
        ]));
        assert_eq!(config.timeout_ms, 250);
        assert_eq!(config.retries, 2);
        assert_eq!(config.retry_delay_ms, 50);
        assert_eq!(config.max_concurrency, 1, "concurrency is at least one");
        assert_eq!(config.batch_size, Some(4));
        assert_eq!(config.log_level, LogLevel::Verbose);
        assert!(config.cache_busting);

        let options = config.load_options();
        assert_eq!(options.timeout, Duration::from_millis(250));
        assert_eq!(options.scheduling, Scheduling::Batched { batch_size: 4 });
        assert_eq!(options.log_level, Some(LogLevel::Verbose));
    }

    #[test]
    fn bad_values_keep_defaults() {
        let config = LoaderConfig::from_lookup(lookup(&[
            ("RESOURCE_LOADER_TIMEOUT_MS", "soon"),
            ("RESOURCE_LOADER_LOG_LEVEL", "chatty"),
        ]));
        assert_eq!(config.timeout_ms, 10_000);
        assert_eq!(config.log_level, LogLevel::Warn);
    }

    #[test]
    fn parses_json_with_defaults() -> Result<()> {
        let config = LoaderConfig::from_json(
            r#"{"retries": 3, "cross_origin": "use-credentials", "insertion_point": "body",
                "attributes": {"nonce": "abc"}}"#,
        )?;
        assert_eq!(config.retries, 3);
        assert_eq!(config.cross_origin, Some(CrossOrigin::UseCredentials));
        assert_eq!(config.insertion_point, InsertionPoint::Body);
        assert_eq!(config.max_concurrency, DEFAULT_MAX_CONCURRENCY);
        assert_eq!(
            config.load_options().attributes.get("nonce").map(String::as_str),
            Some("abc")
        );
        Ok(())
    }

    #[test]
    fn rejects_unknown_fields() {
        let error = LoaderConfig::from_json(r#"{"retires": 3}"#)
            .err()
            .map(|err| err.to_string())
            .unwrap_or_default();
        assert!(error.starts_with("Invalid loader config"), "{error}");
    }

    #[test]
    fn reads_config_files() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("loader.json");
        write(&path, r#"{"base_url": "https://example.test/app/"}"#)?;
        let config = LoaderConfig::from_file(&path)?;
        assert_eq!(config.base_url()?.as_str(), "https://example.test/app/");
        Ok(())
    }

    #[test]
    fn base_url_defaults_to_current_directory() -> Result<()> {
        let url = LoaderConfig::default().base_url()?;
        assert_eq!(url.scheme(), "file");
        assert!(url.path().ends_with('/'));
        Ok(())
    }
}
