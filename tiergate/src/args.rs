use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tiergate_core::{Tier, Urgency};

/// Tiergate execution controller
#[derive(Debug, Parser)]
#[command(name = "tiergate", about = "Cost-bounded, adaptive LLM execution controller")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "tiergate.toml", env = "TIERGATE_CONFIG")]
    pub config: PathBuf,

    /// Log filter used when `RUST_LOG` is unset
    #[arg(long, default_value = "info", env = "TIERGATE_LOG")]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one task through the tiers and print the outcome as JSON
    Run {
        /// Task type, used to pick the executor and the completeness checks
        #[arg(short, long)]
        task: String,

        /// JSON file holding the task parameters as an object
        #[arg(short, long)]
        params: PathBuf,

        /// Quality the result needs, between 0 and 1
        #[arg(short, long, default_value_t = tiergate_engine::DEFAULT_QUALITY_REQUIREMENT)]
        quality: f64,

        #[arg(short, long, value_enum, default_value_t = UrgencyArg::Normal)]
        urgency: UrgencyArg,

        /// Start at this tier instead of the one picked from quality and urgency
        #[arg(long, value_enum)]
        tier: Option<TierArg>,
    },

    /// Print budget, cache and selector state as JSON
    Status,

    /// Print recommended backends for a task type
    Recommend {
        #[arg(short, long)]
        task: String,
    },

    /// Inspect or reset the result cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Debug, Clone, Copy, Subcommand)]
pub enum CacheAction {
    /// Print cache statistics
    Stats,
    /// Remove every cached result
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum UrgencyArg {
    Low,
    Normal,
    High,
}

impl From<UrgencyArg> for Urgency {
    fn from(value: UrgencyArg) -> Self {
        match value {
            UrgencyArg::Low => Self::Low,
            UrgencyArg::Normal => Self::Normal,
            UrgencyArg::High => Self::High,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TierArg {
    Quick,
    Detailed,
    Comprehensive,
}

impl From<TierArg> for Tier {
    fn from(value: TierArg) -> Self {
        match value {
            TierArg::Quick => Self::Quick,
            TierArg::Detailed => Self::Detailed,
            TierArg::Comprehensive => Self::Comprehensive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_with_defaults() {
        let args = Args::try_parse_from(["tiergate", "run", "--task", "fix", "--params", "p.json"]).unwrap();

        assert_eq!(args.config, PathBuf::from("tiergate.toml"));
        match args.command {
            Command::Run {
                task,
                quality,
                urgency,
                tier,
                ..
            } => {
                assert_eq!(task, "fix");
                assert!((quality - 0.7).abs() < f64::EPSILON);
                assert_eq!(urgency, UrgencyArg::Normal);
                assert!(tier.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_cache_clear() {
        let args = Args::try_parse_from(["tiergate", "-c", "other.toml", "cache", "clear"]).unwrap();

        assert_eq!(args.config, PathBuf::from("other.toml"));
        assert!(matches!(
            args.command,
            Command::Cache {
                action: CacheAction::Clear
            }
        ));
    }

    #[test]
    fn rejects_unknown_urgency() {
        assert!(Args::try_parse_from(["tiergate", "run", "-t", "fix", "-p", "p.json", "-u", "asap"]).is_err());
    }
}
