//! Configuration type definitions.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::keys::builtin_overrides;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source database configuration (SQLite).
    pub source: SourceConfig,

    /// Target database configuration (MySQL).
    pub target: TargetConfig,

    /// Sync behavior configuration.
    #[serde(default)]
    pub migration: MigrationConfig,

    /// External fetch step run before a sync, if configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch: Option<FetchConfig>,
}

/// Source database (SQLite) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Database type (always "sqlite" for now).
    #[serde(default = "default_sqlite")]
    pub r#type: String,

    /// Path to the SQLite database file.
    pub path: String,
}

/// Target database (MySQL/MariaDB) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Database type (always "mysql" for now).
    #[serde(default = "default_mysql")]
    pub r#type: String,

    /// Database host.
    pub host: String,

    /// Database port (default: 3306).
    #[serde(default = "default_mysql_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// SSL mode: disable, prefer, require, verify-ca, verify-full (default: prefer).
    #[serde(default = "default_prefer")]
    pub ssl_mode: String,
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("type", &self.r#type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Sync behavior configuration.
///
/// Performance fields use `Option<T>` to distinguish "not set" from
/// "explicitly set"; the `get_*` accessors supply the defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Tables processed concurrently (default: 1, sequential).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,

    /// Rows per read batch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<usize>,

    /// Batches buffered between reader and writer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_ahead_buffers: Option<usize>,

    /// Maximum MySQL connections in the target pool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_target_connections: Option<usize>,

    /// Tables to include (exact names or `*`/`?` glob patterns). Empty means all.
    #[serde(default)]
    pub include_tables: Vec<String>,

    /// Tables to exclude (exact names or `*`/`?` glob patterns).
    #[serde(default)]
    pub exclude_tables: Vec<String>,

    /// Table name → key column, consulted when the first column is not `id`.
    #[serde(default = "builtin_overrides")]
    pub key_overrides: BTreeMap<String, String>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            workers: None,
            chunk_size: None,
            read_ahead_buffers: None,
            max_target_connections: None,
            include_tables: Vec::new(),
            exclude_tables: Vec::new(),
            key_overrides: builtin_overrides(),
        }
    }
}

impl MigrationConfig {
    pub fn get_workers(&self) -> usize {
        self.workers.unwrap_or(1)
    }

    pub fn get_chunk_size(&self) -> usize {
        self.chunk_size.unwrap_or(1_000)
    }

    pub fn get_read_ahead_buffers(&self) -> usize {
        self.read_ahead_buffers.unwrap_or(4)
    }

    /// Pool size: explicit value, or enough for every worker plus one spare.
    pub fn get_max_target_connections(&self) -> usize {
        self.max_target_connections
            .unwrap_or_else(|| (self.get_workers() + 1).max(4))
    }

    /// Whether a table passes the include/exclude filters.
    pub fn includes_table(&self, name: &str) -> bool {
        let included = self.include_tables.is_empty()
            || self.include_tables.iter().any(|p| glob_match(p, name));
        included && !self.exclude_tables.iter().any(|p| glob_match(p, name))
    }
}

/// External fetch step configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Program to run.
    pub command: String,

    /// Program arguments.
    #[serde(default)]
    pub args: Vec<String>,

    /// Extra environment variables passed to the program.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Working directory for the program.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,

    /// Kill the program if it runs longer than this.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl fmt::Debug for FetchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // env commonly carries credentials; only show the names
        f.debug_struct("FetchConfig")
            .field("command", &self.command)
            .field("args", &self.args)
            .field("env", &self.env.keys().collect::<Vec<_>>())
            .field("working_dir", &self.working_dir)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Match `name` against a pattern where `*` matches any run of characters and
/// `?` matches exactly one.
pub fn glob_match(pattern: &str, name: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let n: Vec<char> = name.chars().collect();

    let (mut pi, mut ni) = (0, 0);
    let mut star: Option<usize> = None;
    let mut mark = 0;

    while ni < n.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == n[ni]) {
            pi += 1;
            ni += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some(pi);
            mark = ni;
            pi += 1;
        } else if let Some(s) = star {
            pi = s + 1;
            mark += 1;
            ni = mark;
        } else {
            return false;
        }
    }

    p[pi..].iter().all(|&c| c == '*')
}

// Default value functions for serde
fn default_sqlite() -> String {
    "sqlite".to_string()
}

fn default_mysql() -> String {
    "mysql".to_string()
}

fn default_mysql_port() -> u16 {
    3306
}

fn default_prefer() -> String {
    "prefer".to_string()
}
