//! Executor that shells out to an external command
//!
//! The child receives one JSON request on stdin and must print a JSON object
//! on stdout. String values become outputs as-is; other values are kept as
//! their JSON text. A non-zero exit is a failed attempt.

use std::{process::Stdio, sync::Arc};

use async_trait::async_trait;
use serde::Serialize;
use tiergate_config::{CommandConfig, ExecutorConfig};
use tiergate_core::{Outputs, Params, Tier};
use tokio::{io::AsyncWriteExt, process::Command};

use crate::executor::{ExecutionOutcome, ExecutionRequest, ExecutorRegistry, TaskExecutor};

/// Longest stderr excerpt kept in a failure message
const STDERR_EXCERPT: usize = 512;

#[derive(Serialize)]
struct WireRequest<'a> {
    task_type: &'a str,
    params: &'a Params,
    tier: Tier,
    max_tokens: u32,
    backend: WireBackend<'a>,
}

#[derive(Serialize)]
struct WireBackend<'a> {
    id: &'a str,
    max_output_tokens: u32,
}

/// Runs a configured program per attempt
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    command: CommandConfig,
}

impl ProcessExecutor {
    pub const fn new(command: CommandConfig) -> Self {
        Self { command }
    }

    async fn run(&self, request: &ExecutionRequest<'_>) -> Result<Outputs, String> {
        let payload = serde_json::to_vec(&WireRequest {
            task_type: request.task_type,
            params: request.params,
            tier: request.tier,
            max_tokens: request.limits.max_tokens,
            backend: WireBackend {
                id: &request.backend.id,
                max_output_tokens: request.backend.max_output_tokens,
            },
        })
        .map_err(|e| format!("failed to encode request: {e}"))?;

        let mut command = Command::new(&self.command.program);
        command
            .args(&self.command.args)
            .envs(&self.command.env)
            .env("TIERGATE_BACKEND", &request.backend.id)
            .env("TIERGATE_TIER", request.tier.as_str())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref dir) = self.command.working_dir {
            command.current_dir(dir);
        }

        let mut child = command
            .spawn()
            .map_err(|e| format!("failed to spawn {}: {e}", self.command.program.display()))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&payload)
                .await
                .map_err(|e| format!("failed to write request: {e}"))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| format!("failed to wait for executor: {e}"))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let excerpt: String = stderr.trim().chars().take(STDERR_EXCERPT).collect();
            return Err(format!("executor exited with {}: {excerpt}", output.status));
        }

        parse_outputs(&output.stdout)
    }
}

#[async_trait]
impl TaskExecutor for ProcessExecutor {
    async fn execute(&self, request: &ExecutionRequest<'_>) -> ExecutionOutcome {
        match self.run(request).await {
            Ok(outputs) => ExecutionOutcome::success(outputs),
            Err(e) => {
                tracing::debug!(task_type = request.task_type, backend = %request.backend.id, error = %e, "process executor failed");
                ExecutionOutcome::failure(e)
            }
        }
    }
}

impl ExecutorRegistry {
    /// One [`ProcessExecutor`] per configured command
    pub fn from_config(config: &ExecutorConfig) -> Self {
        let registry = config.commands.iter().fold(Self::new(), |registry, (task_type, command)| {
            registry.register(task_type.clone(), Arc::new(ProcessExecutor::new(command.clone())))
        });

        match config.default {
            Some(ref command) => registry.with_default(Arc::new(ProcessExecutor::new(command.clone()))),
            None => registry,
        }
    }
}

/// Decode executor stdout into outputs
fn parse_outputs(stdout: &[u8]) -> Result<Outputs, String> {
    let value: serde_json::Value =
        serde_json::from_slice(stdout).map_err(|e| format!("executor output is not JSON: {e}"))?;

    let serde_json::Value::Object(map) = value else {
        return Err("executor output must be a JSON object".to_string());
    };

    Ok(map
        .into_iter()
        .map(|(name, value)| {
            let text = match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            (name, text)
        })
        .collect())
}
