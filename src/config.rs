use serde::Deserialize;
use std::{fs, net::SocketAddr, path::Path};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config JSON in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid value for {key}: {value:?}")]
    BadValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub bind_addr: String,
    pub port: u16,
    pub model_path: String,
    pub debug: bool,
    pub allowed_hosts: Vec<String>,
    pub cors_allowed_origins: Vec<String>,
    pub log_predictions: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 8000,
            model_path: "models/titanic_model.json".to_string(),
            debug: false,
            allowed_hosts: vec![
                "127.0.0.1".to_string(),
                "localhost".to_string(),
                ".localhost".to_string(),
            ],
            cors_allowed_origins: vec!["*".to_string()],
            log_predictions: false,
        }
    }
}

impl Settings {
    /// Reads a JSON settings file; missing keys keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// `TITANIC_CONFIG` file (if set) overlaid with environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut s = match var("TITANIC_CONFIG") {
            Some(path) if !path.trim().is_empty() => Self::load(path.trim())?,
            _ => Self::default(),
        };

        if let Some(v) = var("BIND_ADDR") {
            s.bind_addr = v.trim().to_string();
        }
        if let Some(v) = var("PORT") {
            s.port = v.trim().parse().map_err(|_| ConfigError::BadValue {
                key: "PORT",
                value: v.clone(),
            })?;
        }
        if let Some(v) = var("MODEL_PATH") {
            s.model_path = v;
        }
        if let Some(v) = var("DEBUG") {
            s.debug = parse_bool(&v);
        }
        if let Some(v) = var("ALLOWED_HOSTS") {
            s.allowed_hosts = split_list(&v);
        }
        if let Some(v) = var("CORS_ALLOWED_ORIGINS") {
            s.cors_allowed_origins = split_list(&v);
        }
        if let Some(v) = var("LOG_PRED") {
            s.log_predictions = parse_bool(&v);
        }
        Ok(s)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_addr, self.port)
            .parse()
            .map_err(|_| ConfigError::BadValue {
                key: "BIND_ADDR",
                value: self.bind_addr.clone(),
            })
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let s = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(s, Settings::default());
        assert_eq!(s.socket_addr().unwrap().port(), 8000);
    }

    #[test]
    fn env_overrides() {
        let s = Settings::from_lookup(lookup(&[
            ("PORT", "9090"),
            ("DEBUG", "True"),
            ("ALLOWED_HOSTS", "example.com, .onrender.com,,"),
            ("CORS_ALLOWED_ORIGINS", "http://localhost:3000"),
            ("LOG_PRED", "1"),
            ("MODEL_PATH", "/srv/forest.json"),
        ]))
        .unwrap();
        assert_eq!(s.port, 9090);
        assert!(s.debug);
        assert!(s.log_predictions);
        assert_eq!(s.allowed_hosts, vec!["example.com", ".onrender.com"]);
        assert_eq!(s.cors_allowed_origins, vec!["http://localhost:3000"]);
        assert_eq!(s.model_path, "/srv/forest.json");
    }

    #[test]
    fn bad_port_is_an_error() {
        let err = Settings::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::BadValue { key: "PORT", .. }));
    }

    #[test]
    fn file_then_env() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{"port": 7000, "debug": true, "model_path": "a.json"}}"#).unwrap();
        let path = f.path().to_str().unwrap().to_string();

        let s = Settings::from_lookup(lookup(&[("TITANIC_CONFIG", path.as_str()), ("PORT", "7001")])).unwrap();
        assert_eq!(s.port, 7001);
        assert!(s.debug);
        assert_eq!(s.model_path, "a.json");
        assert_eq!(s.allowed_hosts, Settings::default().allowed_hosts);
    }

    #[test]
    fn unreadable_file_is_an_error() {
        let err = Settings::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
