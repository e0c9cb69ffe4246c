use std::{collections::BTreeMap, path::PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;

/// External executor commands
///
/// Each task type maps to a program that receives a JSON request on stdin
/// and writes a JSON object of string outputs to stdout.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutorConfig {
    /// Command used for task types without an explicit entry
    #[serde(default)]
    pub default: Option<CommandConfig>,
    /// Commands keyed by task type
    #[serde(default)]
    pub commands: IndexMap<String, CommandConfig>,
}

impl ExecutorConfig {
    pub fn command_for(&self, task_type: &str) -> Option<&CommandConfig> {
        self.commands.get(task_type).or(self.default.as_ref())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandConfig {
    pub program: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    /// Extra environment passed to the child
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}
