//! External fetch step run before a sync.
//!
//! The SQLite file is usually produced by another program (a budget export,
//! a sync client). A [`FetchTrigger`] refreshes it; when the trigger fails the
//! sync is not started.

use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::FetchConfig;
use crate::error::{MigrateError, Result};

/// Refresh the source before a run.
#[async_trait]
pub trait FetchTrigger: Send + Sync {
    async fn fetch(&self) -> Result<()>;
}

/// Runs a configured command with a configured environment.
#[derive(Debug, Clone)]
pub struct CommandTrigger {
    config: FetchConfig,
}

impl CommandTrigger {
    pub fn new(config: FetchConfig) -> Self {
        Self { config }
    }

    fn display(&self) -> String {
        std::iter::once(self.config.command.as_str())
            .chain(self.config.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl FetchTrigger for CommandTrigger {
    async fn fetch(&self) -> Result<()> {
        let mut cmd = Command::new(&self.config.command);
        cmd.args(&self.config.args)
            .envs(&self.config.env)
            .kill_on_drop(true);
        if let Some(dir) = &self.config.working_dir {
            cmd.current_dir(dir);
        }

        info!("Running fetch step: {}", self.display());

        let output = match self.config.timeout_secs {
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), cmd.output())
                .await
                .map_err(|_| {
                    MigrateError::Trigger(format!("'{}' timed out after {}s", self.display(), secs))
                })?,
            None => cmd.output().await,
        }
        .map_err(|e| MigrateError::Trigger(format!("failed to start '{}': {}", self.display(), e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!("fetch stdout: {}", stdout.trim());
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MigrateError::Trigger(format!(
                "'{}' exited with {}: {}",
                self.display(),
                output.status,
                stderr.trim()
            )));
        }

        info!("Fetch step completed");
        Ok(())
    }
}
