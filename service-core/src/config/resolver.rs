use super::{
    ConnectionSettings, DEFAULT_ENVIRONMENT, DEFAULT_LOG_LEVEL, DEFAULT_MONGODB_URI,
    DEFAULT_RABBITMQ_URL, DEFAULT_REDIS_URL, DEFAULT_SERVICE_HOST, DEFAULT_SERVICE_NAME,
    Environment, LogLevel, ServiceSettings, Settings,
};
use crate::error::AppError;
use config::{Config as Cfg, Environment as EnvSource, Map};
use secrecy::Secret;
use serde::Deserialize;
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub const DEFAULT_ENV_FILE: &str = ".env";

const SERVICE_NAME: &str = "SERVICE_NAME";
const SERVICE_HOST: &str = "SERVICE_HOST";
const SERVICE_PORT: &str = "SERVICE_PORT";
const ENVIRONMENT: &str = "ENVIRONMENT";
const LOG_LEVEL: &str = "LOG_LEVEL";
const MONGODB_URI: &str = "MONGODB_URI";
const REDIS_URL: &str = "REDIS_URL";
const RABBITMQ_URL: &str = "RABBITMQ_URL";
const OTLP_ENDPOINT: &str = "OTLP_ENDPOINT";

const DEFAULT_SERVICE_PORT: &str = "8000";

/// Every key the resolver reads, with its built-in default.
const DEFAULTS: &[(&str, Option<&str>)] = &[
    (SERVICE_NAME, Some(DEFAULT_SERVICE_NAME)),
    (SERVICE_HOST, Some(DEFAULT_SERVICE_HOST)),
    (SERVICE_PORT, Some(DEFAULT_SERVICE_PORT)),
    (ENVIRONMENT, Some(DEFAULT_ENVIRONMENT)),
    (LOG_LEVEL, Some(DEFAULT_LOG_LEVEL)),
    (MONGODB_URI, Some(DEFAULT_MONGODB_URI)),
    (REDIS_URL, Some(DEFAULT_REDIS_URL)),
    (RABBITMQ_URL, Some(DEFAULT_RABBITMQ_URL)),
    (OTLP_ENDPOINT, None),
];

/// Resolves [`Settings`] from the precedence chain
/// environment variable > env file entry > built-in default.
///
/// The env file is read but never loaded into the process environment, and
/// variables other than the declared keys are ignored. Keys match
/// case-insensitively; the exact upper-case spelling wins when both appear.
/// File values are taken literally, like a variable with the same text:
/// `$NAME` and `${NAME}` are not expanded.
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    env_file: Option<PathBuf>,
    vars: Option<HashMap<String, String>>,
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigResolver {
    /// Reads `.env` from the working directory and the live process environment.
    pub fn new() -> Self {
        Self {
            env_file: Some(PathBuf::from(DEFAULT_ENV_FILE)),
            vars: None,
        }
    }

    pub fn with_env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.env_file = Some(path.into());
        self
    }

    pub fn without_env_file(mut self) -> Self {
        self.env_file = None;
        self
    }

    /// Use a fixed variable table instead of the process environment.
    pub fn with_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.vars = Some(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    pub fn resolve(&self) -> Result<Settings, AppError> {
        let file_entries = match &self.env_file {
            Some(path) => read_env_file(path)?,
            None => Map::new(),
        };

        let vars = match &self.vars {
            Some(vars) => {
                let mut vars: Vec<_> = vars.clone().into_iter().collect();
                vars.sort();
                declared(vars)
            }
            None => declared(utf8_vars(std::env::vars_os())?),
        };

        let mut builder = Cfg::builder();
        for (key, default) in DEFAULTS {
            if let Some(value) = default {
                builder = builder.set_default(key.to_lowercase(), *value)?;
            }
        }

        // Later sources win: env file entries only fill keys the process
        // environment leaves unset.
        let raw: RawSettings = builder
            .add_source(EnvSource::default().source(Some(file_entries)))
            .add_source(EnvSource::default().source(Some(vars)))
            .build()?
            .try_deserialize()?;

        raw.into_settings()
    }
}

/// String-typed view of the layered sources, before coercion. Source keys
/// are lower-cased to match these field names.
#[derive(Debug, Deserialize)]
struct RawSettings {
    service_name: String,
    service_host: String,
    service_port: String,
    environment: String,
    log_level: String,
    mongodb_uri: String,
    redis_url: String,
    rabbitmq_url: String,
    #[serde(default)]
    otlp_endpoint: Option<String>,
}

impl RawSettings {
    fn into_settings(self) -> Result<Settings, AppError> {
        let port = parse_port(&self.service_port)?;

        Ok(Settings {
            service: ServiceSettings {
                name: self.service_name,
                host: self.service_host,
                port,
            },
            environment: Environment::from(self.environment.as_str()),
            log_level: LogLevel::from(self.log_level.as_str()),
            connections: ConnectionSettings {
                mongodb_uri: Secret::new(self.mongodb_uri),
                redis_url: Secret::new(self.redis_url),
                rabbitmq_url: Secret::new(self.rabbitmq_url),
            },
            otlp_endpoint: self.otlp_endpoint.filter(|e| !e.trim().is_empty()),
        })
    }
}

fn parse_port(raw: &str) -> Result<u16, AppError> {
    match raw.trim().parse::<u16>() {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(AppError::ConfigCoercion {
            key: SERVICE_PORT,
            value: raw.to_string(),
            expected: "port number (1-65535)",
        }),
    }
}

/// Canonical name of a declared key, matched case-insensitively.
fn canonical_key(key: &str) -> Option<&'static str> {
    DEFAULTS
        .iter()
        .map(|(declared, _)| *declared)
        .find(|declared| declared.eq_ignore_ascii_case(key))
}

/// Keep declared keys, lower-cased for the `config` layer. Later entries
/// replace earlier ones, except that an exact-case key is never replaced by
/// a differently-cased one.
fn declared(vars: impl IntoIterator<Item = (String, String)>) -> Map<String, String> {
    let mut found: Map<String, (bool, String)> = Map::new();
    for (key, value) in vars {
        let Some(canonical) = canonical_key(&key) else {
            continue;
        };
        let exact = key == canonical;
        let lower = canonical.to_lowercase();
        if matches!(found.get(&lower), Some((true, _))) && !exact {
            continue;
        }
        found.insert(lower, (exact, value));
    }
    found.into_iter().map(|(k, (_, v))| (k, v)).collect()
}

/// Convert the process environment to strings. Non-UTF-8 entries are
/// skipped, except for declared keys, where they are an error.
fn utf8_vars(
    vars: impl IntoIterator<Item = (OsString, OsString)>,
) -> Result<Vec<(String, String)>, AppError> {
    let mut out = Vec::new();
    for (key, value) in vars {
        let Ok(key) = key.into_string() else {
            continue;
        };
        match value.into_string() {
            Ok(value) => out.push((key, value)),
            Err(_) if canonical_key(&key).is_some() => {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is set but its value is not valid UTF-8",
                    key
                )));
            }
            Err(_) => {}
        }
    }
    Ok(out)
}

fn read_env_file(path: &Path) -> Result<Map<String, String>, AppError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
        Err(e) => {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "failed to read {}: {}",
                path.display(),
                e
            )));
        }
    };

    let literal = escape_substitutions(&contents);
    let mut entries = Vec::new();
    for entry in dotenvy::from_read_iter(literal.as_bytes()) {
        entries.push(entry?);
    }
    Ok(declared(entries))
}

/// Escape every `$` that dotenvy would treat as a substitution, so values
/// parse to exactly the text written in the file. Single-quoted text and
/// comments are left alone, as are `$` already escaped with a backslash.
fn escape_substitutions(contents: &str) -> String {
    let mut out = String::with_capacity(contents.len());
    let (mut single, mut double, mut escaped, mut comment) = (false, false, false, false);
    let mut prev = '\n';

    for c in contents.chars() {
        if comment {
            comment = c != '\n';
        } else if escaped {
            escaped = false;
        } else if single {
            single = c != '\'';
        } else {
            match c {
                '\\' => escaped = true,
                '"' => double = !double,
                '\'' if !double => single = true,
                '#' if !double && prev.is_whitespace() => comment = true,
                '$' => out.push('\\'),
                _ => {}
            }
        }
        out.push(c);
        prev = c;
    }
    out
}
