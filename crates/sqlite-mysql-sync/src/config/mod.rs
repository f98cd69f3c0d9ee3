//! Configuration loading and validation.
//!
//! Two file formats are accepted:
//!
//! - YAML (`.yaml` / `.yml`), mirroring [`Config`] directly.
//! - Legacy `key=value` properties as used by cron deployments
//!   (`mysql_host=...`, `mysql_db=...`, ...).

mod types;
mod validation;

pub use types::*;

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{MigrateError, Result};

impl Config {
    /// Load configuration from a file, choosing the parser by extension.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MigrateError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&content),
            _ => Self::from_properties(&content),
        }
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from `key=value` lines.
    ///
    /// Recognized keys: `sqlite_path`, `mysql_host`, `mysql_port`,
    /// `mysql_user`, `mysql_password`, `mysql_db`, `mysql_ssl_mode`,
    /// `workers`, `fetch_command`, `fetch_args` (whitespace separated) and
    /// `fetch_timeout_secs`. When a fetch command is configured, every other
    /// key is also exported to it as an upper-cased environment variable
    /// (`budget_id` → `BUDGET_ID`). Blank lines and `#` comments are ignored.
    pub fn from_properties(content: &str) -> Result<Self> {
        let props = parse_properties(content)?;
        let get = |key: &str| props.get(key).cloned().unwrap_or_default();

        let port = match props.get("mysql_port") {
            Some(p) => p
                .parse::<u16>()
                .map_err(|_| MigrateError::Config(format!("mysql_port is not a port: '{}'", p)))?,
            None => 3306,
        };

        let workers = match props.get("workers") {
            Some(w) => Some(w.parse::<usize>().map_err(|_| {
                MigrateError::Config(format!("workers is not a number: '{}'", w))
            })?),
            None => None,
        };

        let fetch = match props.get("fetch_command") {
            Some(command) => {
                let timeout_secs = match props.get("fetch_timeout_secs") {
                    Some(t) => Some(t.parse::<u64>().map_err(|_| {
                        MigrateError::Config(format!("fetch_timeout_secs is not a number: '{}'", t))
                    })?),
                    None => None,
                };
                let env = props
                    .iter()
                    .filter(|(k, _)| !k.starts_with("fetch_"))
                    .map(|(k, v)| (k.to_uppercase(), v.clone()))
                    .collect();
                Some(FetchConfig {
                    command: command.clone(),
                    args: get("fetch_args").split_whitespace().map(String::from).collect(),
                    env,
                    working_dir: None,
                    timeout_secs,
                })
            }
            None => None,
        };

        let config = Config {
            source: SourceConfig {
                r#type: "sqlite".to_string(),
                path: get("sqlite_path"),
            },
            target: TargetConfig {
                r#type: "mysql".to_string(),
                host: get("mysql_host"),
                port,
                database: get("mysql_db"),
                user: get("mysql_user"),
                password: get("mysql_password"),
                ssl_mode: props
                    .get("mysql_ssl_mode")
                    .cloned()
                    .unwrap_or_else(|| "prefer".to_string()),
            },
            migration: MigrationConfig {
                workers,
                ..MigrationConfig::default()
            },
            fetch,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

impl TargetConfig {
    /// Human-readable location, without credentials.
    pub fn location(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }
}

fn parse_properties(content: &str) -> Result<BTreeMap<String, String>> {
    let mut props = BTreeMap::new();
    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, value) = line.split_once('=').ok_or_else(|| {
            MigrateError::Config(format!(
                "line {}: expected key=value, got '{}'",
                lineno + 1,
                line
            ))
        })?;
        props.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(props)
}
