//! Runtime settings read from the process environment.

use std::env;
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::model::Location;

/// Base URL of the public pricing API.
pub const DEFAULT_BASE_URL: &str = "https://app.wewantwaste.co.uk/api";
/// Postcode used when none is given.
pub const DEFAULT_POSTCODE: &str = "NR32";
/// Area used when none is given.
pub const DEFAULT_AREA: &str = "Lowestoft";

const BASE_URL_VAR: &str = "SKIPHIRE_API_BASE_URL";
const POSTCODE_VAR: &str = "SKIPHIRE_DEFAULT_POSTCODE";
const AREA_VAR: &str = "SKIPHIRE_DEFAULT_AREA";
const TIMEOUT_VAR: &str = "SKIPHIRE_HTTP_TIMEOUT_SECS";
const LIST_STALE_VAR: &str = "SKIPHIRE_LIST_STALE_SECS";
const ITEM_STALE_VAR: &str = "SKIPHIRE_ITEM_STALE_SECS";
const RETENTION_VAR: &str = "SKIPHIRE_CACHE_RETENTION_SECS";

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
/// Problems with the configured values.
pub enum SettingsError {
    /// A numeric variable holds something else.
    #[error("{name} must be a whole number of seconds, got {value:?}")]
    InvalidNumber {
        /// Variable name.
        name: &'static str,
        /// Offending value.
        value: String,
    },
    /// The base URL is not an http(s) URL.
    #[error("SKIPHIRE_API_BASE_URL must start with http:// or https://, got {0:?}")]
    InvalidBaseUrl(String),
    /// The default postcode or area is blank.
    #[error("default postcode and area must not be empty")]
    InvalidLocation,
}

#[derive(Debug, Clone, PartialEq)]
/// Everything the gateway and the cache need to run.
pub struct Settings {
    /// Pricing API base URL without a trailing slash.
    pub base_url: String,
    /// Location used when the caller omits one.
    pub default_location: Location,
    /// Per-request timeout.
    pub http_timeout: Duration,
    /// How long a location's option list stays fresh.
    pub list_stale: Duration,
    /// How long a single option stays fresh.
    pub item_stale: Duration,
    /// Retry and retention settings shared by all caches.
    pub cache: CacheConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            default_location: Location {
                postcode: DEFAULT_POSTCODE.to_owned(),
                area: DEFAULT_AREA.to_owned(),
            },
            http_timeout: Duration::from_secs(15),
            list_stale: Duration::from_secs(5 * 60),
            item_stale: Duration::from_secs(10 * 60),
            cache: CacheConfig::default(),
        }
    }
}

impl Settings {
    /// Read settings from `SKIPHIRE_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns a [`SettingsError`] when a variable is set to an invalid value.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Read settings through `lookup`, falling back to defaults for unset names.
    ///
    /// # Errors
    ///
    /// Returns a [`SettingsError`] when a value is invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let base_url = match read(BASE_URL_VAR) {
            Some(url) => {
                let url = url.trim().trim_end_matches('/').to_owned();
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(SettingsError::InvalidBaseUrl(url));
                }
                url
            }
            None => defaults.base_url,
        };

        let default_location = Location::new(
            read(POSTCODE_VAR).unwrap_or(defaults.default_location.postcode),
            read(AREA_VAR).unwrap_or(defaults.default_location.area),
        )
        .map_err(|_err| SettingsError::InvalidLocation)?;

        let seconds = |name: &'static str, fallback: Duration| match read(name) {
            Some(value) => value
                .trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_err| SettingsError::InvalidNumber { name, value }),
            None => Ok(fallback),
        };

        let mut cache = defaults.cache;
        cache.retention = seconds(RETENTION_VAR, cache.retention)?;

        Ok(Self {
            base_url,
            default_location,
            http_timeout: seconds(TIMEOUT_VAR, defaults.http_timeout)?,
            list_stale: seconds(LIST_STALE_VAR, defaults.list_stale)?,
            item_stale: seconds(ITEM_STALE_VAR, defaults.item_stale)?,
            cache,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn unset_variables_use_defaults() {
        let settings = Settings::from_lookup(lookup(&[])).expect("defaults are valid");
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.default_location.postcode, "NR32");
        assert_eq!(settings.list_stale, Duration::from_secs(300));
    }

    #[test]
    fn overrides_are_applied() {
        let settings = Settings::from_lookup(lookup(&[
            ("SKIPHIRE_API_BASE_URL", "http://localhost:8080/api/"),
            ("SKIPHIRE_DEFAULT_POSTCODE", "LE10"),
            ("SKIPHIRE_DEFAULT_AREA", "Hinckley"),
            ("SKIPHIRE_CACHE_RETENTION_SECS", "60"),
        ]))
        .expect("valid overrides");

        assert_eq!(settings.base_url, "http://localhost:8080/api");
        assert_eq!(settings.default_location.area, "Hinckley");
        assert_eq!(settings.cache.retention, Duration::from_secs(60));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert_eq!(
            Settings::from_lookup(lookup(&[("SKIPHIRE_API_BASE_URL", "ftp://example.com")])),
            Err(SettingsError::InvalidBaseUrl("ftp://example.com".into()))
        );
        assert!(matches!(
            Settings::from_lookup(lookup(&[("SKIPHIRE_LIST_STALE_SECS", "soon")])),
            Err(SettingsError::InvalidNumber { name: "SKIPHIRE_LIST_STALE_SECS", .. })
        ));
    }
}
