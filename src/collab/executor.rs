//! Executor backed by an external test command
//!
//! Arguments may reference `{artifact}` (the artifact path) and `{tag}`.
//! A zero exit status is a pass; anything else is an execution failure
//! carrying the tail of the command's output.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command as TokioCommand;
use tokio_util::sync::CancellationToken;

use crate::common::config::ExecutorConfig;
use crate::common::{Error, Result};
use crate::scenario::{Artifact, Executor, MAX_ERROR_CHARS};

pub struct CommandExecutor {
    program: PathBuf,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl CommandExecutor {
    pub fn from_config(config: &ExecutorConfig) -> Result<Self> {
        let program = which::which(&config.command).map_err(|_| {
            Error::Config(format!(
                "Executor command '{}' not found. Set [executor] command in the config file",
                config.command
            ))
        })?;

        Ok(Self {
            program,
            args: config.args.clone(),
            working_dir: config.working_dir.clone(),
        })
    }

    fn expand_args(&self, artifact: &Artifact) -> Vec<String> {
        let path = artifact.path.display().to_string();
        self.args
            .iter()
            .map(|arg| arg.replace("{artifact}", &path).replace("{tag}", &artifact.tag))
            .collect()
    }
}

#[async_trait]
impl Executor for CommandExecutor {
    async fn execute(&self, artifact: &Artifact, cancel: &CancellationToken) -> Result<()> {
        let args = self.expand_args(artifact);
        tracing::debug!(tag = %artifact.tag, program = %self.program.display(), ?args, "Executing artifact");

        let mut command = TokioCommand::new(&self.program);
        command
            .args(&args)
            .env("SCENARIO_TAG", &artifact.tag)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let child = command.spawn().map_err(|e| Error::Execution {
            tag: artifact.tag.clone(),
            message: format!("failed to spawn '{}': {}", self.program.display(), e),
        })?;

        let output = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(tag = %artifact.tag, "Cancellation requested, killing executor");
                return Err(Error::Cancelled);
            }
            output = child.wait_with_output() => output?,
        };

        if output.status.success() {
            return Ok(());
        }

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        Err(Error::Execution {
            tag: artifact.tag.clone(),
            message: format!(
                "exit code {}: {}",
                output
                    .status
                    .code()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "none".to_string()),
                tail(&combined, MAX_ERROR_CHARS)
            ),
        })
    }
}

/// Last `max` characters of `text`; test runners print the verdict at the end
fn tail(text: &str, max: usize) -> String {
    let trimmed = text.trim();
    let count = trimmed.chars().count();
    if count > max {
        let skipped: String = trimmed.chars().skip(count - max).collect();
        format!("...{}", skipped)
    } else {
        trimmed.to_string()
    }
}
