use crate::error::{PressmeshError, Result};
use crate::exception::ExceptionKind;
use dashmap::DashMap;
use std::env;
use std::sync::Arc;

/// Environment variable toggling debug output in error responses.
pub const DEBUG_ENV: &str = "PRESSMESH_DEBUG";
/// Comma-separated exception kinds that expose trace and location in debug mode.
pub const VERBOSE_EXCEPTIONS_ENV: &str = "PRESSMESH_VERBOSE_EXCEPTIONS";
/// Default for the per-parameter cast flag.
pub const CAST_PARAMETERS_ENV: &str = "PRESSMESH_CAST_PARAMETERS";
/// Largest request body the axum router buffers, in bytes.
pub const MAX_BODY_BYTES_ENV: &str = "PRESSMESH_MAX_BODY_BYTES";

/// Matches axum's own default body limit.
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Configuration service
#[derive(Clone, Default)]
pub struct ConfigService {
    config: Arc<DashMap<String, String>>,
}

impl ConfigService {
    /// Create a service seeded from the process environment
    pub fn new() -> Self {
        let service = Self::default();
        for (key, value) in env::vars() {
            service.set(&key, &value);
        }
        service
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.config.get(key).map(|v| v.clone())
    }

    pub fn set(&self, key: &str, value: &str) {
        self.config.insert(key.to_string(), value.to_string());
    }

    /// `true/1/yes/on` or `false/0/no/off`, case-insensitive.
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        let Some(raw) = self.get(key) else {
            return Ok(None);
        };
        match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Some(true)),
            "false" | "0" | "no" | "off" | "" => Ok(Some(false)),
            other => Err(PressmeshError::Config(format!("{key} is not a boolean: {other:?}"))),
        }
    }

    /// Comma-separated list with blanks dropped.
    pub fn get_list(&self, key: &str) -> Option<Vec<String>> {
        self.get(key).map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()
        })
    }
}

/// Framework settings.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Expose reasons, and for verbose kinds trace and location, in error bodies.
    pub debug: bool,
    pub verbose_exceptions: Vec<ExceptionKind>,
    /// Whether parameters are cast to their declared type when no
    /// per-parameter flag is given.
    pub cast_parameters: bool,
    /// Bodies above this size are rejected with a 413.
    pub max_body_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            debug: false,
            verbose_exceptions: vec![ExceptionKind::Internal],
            cast_parameters: true,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_service(&ConfigService::new())
    }

    pub fn from_service(config: &ConfigService) -> Result<Self> {
        let defaults = Self::default();

        let verbose_exceptions = match config.get_list(VERBOSE_EXCEPTIONS_ENV) {
            Some(names) => names
                .iter()
                .map(|name| {
                    name.parse::<ExceptionKind>().map_err(|_| {
                        PressmeshError::Config(format!("{VERBOSE_EXCEPTIONS_ENV}: unknown exception kind {name:?}"))
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            None => defaults.verbose_exceptions,
        };

        let max_body_bytes = match config.get(MAX_BODY_BYTES_ENV) {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .map_err(|_| PressmeshError::Config(format!("{MAX_BODY_BYTES_ENV} is not a byte count: {raw:?}")))?,
            None => defaults.max_body_bytes,
        };

        Ok(Self {
            debug: config.get_bool(DEBUG_ENV)?.unwrap_or(defaults.debug),
            verbose_exceptions,
            cast_parameters: config
                .get_bool(CAST_PARAMETERS_ENV)?
                .unwrap_or(defaults.cast_parameters),
            max_body_bytes,
        })
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_verbose_exceptions(mut self, kinds: impl IntoIterator<Item = ExceptionKind>) -> Self {
        self.verbose_exceptions = kinds.into_iter().collect();
        self
    }

    pub fn with_cast_parameters(mut self, cast: bool) -> Self {
        self.cast_parameters = cast;
        self
    }

    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// Whether trace and location may be shown for `kind`.
    pub fn is_verbose(&self, kind: ExceptionKind) -> bool {
        self.debug && self.verbose_exceptions.contains(&kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_production_safe() {
        let config = AppConfig::from_service(&ConfigService::default()).unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(!config.is_verbose(ExceptionKind::Internal));
    }

    #[test]
    fn reads_settings_from_the_service() {
        let service = ConfigService::default();
        service.set(DEBUG_ENV, "yes");
        service.set(VERBOSE_EXCEPTIONS_ENV, "internal, bad_request");
        service.set(CAST_PARAMETERS_ENV, "off");
        service.set(MAX_BODY_BYTES_ENV, "1024");

        let config = AppConfig::from_service(&service).unwrap();
        assert!(config.debug);
        assert!(!config.cast_parameters);
        assert_eq!(config.max_body_bytes, 1024);
        assert!(config.is_verbose(ExceptionKind::BadRequest));
        assert!(!config.is_verbose(ExceptionKind::NotFound));
    }

    #[test]
    fn rejects_malformed_values() {
        let service = ConfigService::default();
        service.set(DEBUG_ENV, "maybe");
        assert!(matches!(AppConfig::from_service(&service), Err(PressmeshError::Config(_))));

        let service = ConfigService::default();
        service.set(VERBOSE_EXCEPTIONS_ENV, "teapot");
        assert!(AppConfig::from_service(&service).is_err());

        let service = ConfigService::default();
        service.set(MAX_BODY_BYTES_ENV, "2MB");
        assert!(matches!(AppConfig::from_service(&service), Err(PressmeshError::Config(_))));
    }

    #[test]
    fn lists_skip_blanks() {
        let service = ConfigService::default();
        service.set("LIST", "a,, b ,");
        assert_eq!(service.get_list("LIST").unwrap(), vec!["a", "b"]);
        assert_eq!(service.get_list("MISSING"), None);
    }
}
