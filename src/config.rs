use log::{debug, info, warn};
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use thiserror::Error;
use time::Duration;

use crate::database::StoreOptions;
use crate::names::NameRegistry;
use crate::utils::{parse_duration, DurationError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    Missing(&'static str),

    #[error("{var}: {source}")]
    Duration {
        var: &'static str,
        source: DurationError,
    },

    #[error("{var}: expected true/false, got {value:?}")]
    Bool { var: &'static str, value: String },

    #[error("{var}: must be positive")]
    NotPositive { var: &'static str },
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub store: StoreOptions,
    pub names: NameRegistry,
    pub mac_filter: Vec<String>,
    pub push_period: Duration,
    pub max_staleness: Duration,
}

impl ServiceConfig {
    /// Loads configuration from the environment, after reading `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        let vars: HashMap<String, String> = env::vars().collect();
        Self::from_vars(&vars)
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |key: &str| vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

        let path = get("RUUVI_DB_PATH").ok_or(ConfigError::Missing("RUUVI_DB_PATH"))?;
        let mut store = StoreOptions::new(expand_home(path, get_home(vars)));

        if let Some(value) = get("RUUVI_RETENTION") {
            store.retention = duration("RUUVI_RETENTION", value)?;
        }
        if let Some(value) = get("RUUVI_WINDOW_SIZE") {
            store.window_size = positive("RUUVI_WINDOW_SIZE", value)?;
        }
        if let Some(value) = get("RUUVI_ALLOW_SCHEMA_REWRITE") {
            store.allow_rewrite = boolean("RUUVI_ALLOW_SCHEMA_REWRITE", value)?;
        }

        let push_period = match get("RUUVI_PUSH_PERIOD") {
            Some(value) => positive("RUUVI_PUSH_PERIOD", value)?,
            None => Duration::minutes(1),
        };
        let max_staleness = match get("RUUVI_MAX_STALENESS") {
            Some(value) => positive("RUUVI_MAX_STALENESS", value)?,
            None => Duration::minutes(5),
        };

        let mac_filter = get("RUUVI_MAC_FILTER")
            .map(|list| {
                list.split(',')
                    .map(|mac| mac.trim().to_uppercase())
                    .filter(|mac| !mac.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let names = load_names(vars);
        info!("Total tags loaded: {}", names.len());

        Ok(ServiceConfig {
            store,
            names,
            mac_filter,
            push_period,
            max_staleness,
        })
    }
}

fn load_names(vars: &HashMap<String, String>) -> NameRegistry {
    let mut names = NameRegistry::new();

    // Try RUUVI_TAGS format first
    if let Some(ruuvi_tags) = vars.get("RUUVI_TAGS") {
        debug!("Found RUUVI_TAGS: '{}'", ruuvi_tags);
        for pair in ruuvi_tags.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match pair.split_once('=') {
                Some((mac, name)) if !mac.trim().is_empty() && !name.trim().is_empty() => {
                    names.register(mac.trim(), name.trim());
                }
                _ => warn!("Failed to split pair: '{}'", pair),
            }
        }
        return names;
    }

    // Fallback to individual environment variables
    for (key, value) in vars {
        if let Some(index) = key
            .strip_prefix("RUUVI_TAG_")
            .and_then(|s| s.strip_suffix("_MAC"))
        {
            if let Some(name) = vars.get(&format!("RUUVI_TAG_{}_NAME", index)) {
                names.register(value, name.as_str());
            }
        }
    }
    names
}

fn get_home(vars: &HashMap<String, String>) -> Option<&str> {
    vars.get("HOME").map(String::as_str)
}

fn expand_home(path: &str, home: Option<&str>) -> PathBuf {
    match (path.strip_prefix("~/"), home) {
        (Some(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => PathBuf::from(path),
    }
}

fn duration(var: &'static str, value: &str) -> Result<Duration, ConfigError> {
    parse_duration(value).map_err(|source| ConfigError::Duration { var, source })
}

fn positive(var: &'static str, value: &str) -> Result<Duration, ConfigError> {
    let parsed = duration(var, value)?;
    if !parsed.is_positive() {
        return Err(ConfigError::NotPositive { var });
    }
    Ok(parsed)
}

fn boolean(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::Bool {
            var,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults() {
        let cfg = ServiceConfig::from_vars(&vars(&[("RUUVI_DB_PATH", "/var/lib/ruuvi.redb")])).unwrap();
        assert_eq!(cfg.store.path, PathBuf::from("/var/lib/ruuvi.redb"));
        assert_eq!(cfg.store.window_size, Duration::days(1));
        assert_eq!(cfg.store.retention, Duration::ZERO);
        assert!(!cfg.store.allow_rewrite);
        assert_eq!(cfg.push_period, Duration::minutes(1));
        assert!(cfg.mac_filter.is_empty());
        assert!(cfg.names.is_empty());
    }

    #[test]
    fn reads_everything() {
        let cfg = ServiceConfig::from_vars(&vars(&[
            ("HOME", "/home/ruuvi"),
            ("RUUVI_DB_PATH", "~/data/store.redb"),
            ("RUUVI_RETENTION", "30d"),
            ("RUUVI_WINDOW_SIZE", "12h"),
            ("RUUVI_ALLOW_SCHEMA_REWRITE", "yes"),
            ("RUUVI_MAC_FILTER", "aa:bb:cc:dd:ee:ff, 11:22:33:44:55:66"),
            ("RUUVI_TAGS", "AA:BB:CC:DD:EE:FF=Sauna,broken"),
        ]))
        .unwrap();

        assert_eq!(cfg.store.path, PathBuf::from("/home/ruuvi/data/store.redb"));
        assert_eq!(cfg.store.retention, Duration::days(30));
        assert_eq!(cfg.store.window_size, Duration::hours(12));
        assert!(cfg.store.allow_rewrite);
        assert_eq!(cfg.mac_filter, vec!["AA:BB:CC:DD:EE:FF", "11:22:33:44:55:66"]);
        assert_eq!(cfg.names.lookup("aa:bb:cc:dd:ee:ff"), Some("Sauna"));
        assert_eq!(cfg.names.len(), 1);
    }

    #[test]
    fn individual_tag_variables() {
        let cfg = ServiceConfig::from_vars(&vars(&[
            ("RUUVI_DB_PATH", "store.redb"),
            ("RUUVI_TAG_1_MAC", "AA:BB:CC:DD:EE:FF"),
            ("RUUVI_TAG_1_NAME", "Balcony"),
            ("RUUVI_TAG_2_MAC", "11:22:33:44:55:66"),
        ]))
        .unwrap();
        assert_eq!(cfg.names.lookup("AA:BB:CC:DD:EE:FF"), Some("Balcony"));
        assert!(!cfg.names.contains("11:22:33:44:55:66"));
    }

    #[test]
    fn errors_name_the_variable() {
        let err = ServiceConfig::from_vars(&vars(&[])).unwrap_err();
        assert_eq!(err.to_string(), "RUUVI_DB_PATH environment variable not set");

        let err = ServiceConfig::from_vars(&vars(&[
            ("RUUVI_DB_PATH", "store.redb"),
            ("RUUVI_WINDOW_SIZE", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::NotPositive { var: "RUUVI_WINDOW_SIZE" }));

        let err = ServiceConfig::from_vars(&vars(&[
            ("RUUVI_DB_PATH", "store.redb"),
            ("RUUVI_ALLOW_SCHEMA_REWRITE", "maybe"),
        ]))
        .unwrap_err();
        assert!(err.to_string().starts_with("RUUVI_ALLOW_SCHEMA_REWRITE"));
    }
}
