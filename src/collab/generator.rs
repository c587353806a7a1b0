//! Generator backed by an external command
//!
//! The prompt is written to the command's stdin and `SCENARIO_TAG` is set in
//! its environment. Whatever it prints on stdout becomes the artifact source.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command as TokioCommand;
use tokio_util::sync::CancellationToken;

use crate::common::config::GeneratorConfig;
use crate::common::paths::{artifact_file_name, ensure_dir};
use crate::common::{truncate_message, Error, Result};
use crate::scenario::{Artifact, Generator, MAX_ERROR_CHARS};

pub struct CommandGenerator {
    program: PathBuf,
    args: Vec<String>,
    artifacts_dir: PathBuf,
    extension: String,
    /// Numbers every artifact so concurrent or repeated generations never share a file
    sequence: AtomicU64,
}

impl CommandGenerator {
    /// Resolve the configured command on PATH
    pub fn from_config(config: &GeneratorConfig, artifacts_dir: PathBuf) -> Result<Self> {
        let program = which::which(&config.command).map_err(|_| {
            Error::Config(format!(
                "Generator command '{}' not found. Set [generator] command in the config file",
                config.command
            ))
        })?;

        Ok(Self {
            program,
            args: config.args.clone(),
            artifacts_dir,
            extension: config.extension.clone(),
            sequence: AtomicU64::new(0),
        })
    }

    async fn write_artifact(&self, tag: &str, source: &str) -> Result<PathBuf> {
        ensure_dir(&self.artifacts_dir)?;
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let path = self
            .artifacts_dir
            .join(artifact_file_name(tag, sequence, &self.extension));
        tokio::fs::write(&path, source).await?;
        Ok(path)
    }
}

#[async_trait]
impl Generator for CommandGenerator {
    async fn generate(&self, prompt: &str, tag: &str, cancel: &CancellationToken) -> Result<Artifact> {
        let generation_error = |message: String| Error::Generation {
            tag: tag.to_string(),
            message,
        };

        let mut child = TokioCommand::new(&self.program)
            .args(&self.args)
            .env("SCENARIO_TAG", tag)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| generation_error(format!("failed to spawn '{}': {}", self.program.display(), e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Internal("generator stdin was not captured".to_string()))?;
        let input = prompt.to_string();
        let feed = async move {
            let written = stdin.write_all(input.as_bytes()).await;
            drop(stdin);
            written
        };

        // Dropping the child on cancellation kills it (kill_on_drop)
        let (written, output) = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            result = async { tokio::join!(feed, child.wait_with_output()) } => result,
        };
        let output = output?;

        if let Err(e) = written {
            tracing::debug!(tag = %tag, error = %e, "Generator closed stdin early");
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(generation_error(format!(
                "generator exited with {:?}: {}",
                output.status.code(),
                truncate_message(&stderr, MAX_ERROR_CHARS)
            )));
        }

        let source = strip_code_fences(&String::from_utf8_lossy(&output.stdout));
        if source.trim().is_empty() {
            return Err(generation_error("generator produced no output".to_string()));
        }

        let path = self.write_artifact(tag, &source).await?;
        tracing::debug!(tag = %tag, path = %path.display(), bytes = source.len(), "Artifact generated");

        Ok(Artifact {
            tag: tag.to_string(),
            path,
            source,
        })
    }
}

/// Unwrap source that arrives inside a single markdown code fence
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }

    let mut lines: Vec<&str> = trimmed.lines().collect();
    lines.remove(0);
    if lines.last().map(|l| l.trim() == "```").unwrap_or(false) {
        lines.pop();
    }
    let mut body = lines.join("\n");
    body.push('\n');
    body
}
