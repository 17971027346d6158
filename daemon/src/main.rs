//! Rebase daemon: replays staking scenarios against a pool node.

mod script;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use rebase_node::{init_logging, NodeConfig, StakingNode};
use rebase_nullables::NullClock;
use rebase_types::AccountId;
use rebase_utils::format_duration;

use crate::script::{Script, ScriptRunner};

#[derive(Parser)]
#[command(name = "rebase-daemon", about = "Elastic-supply staking pool daemon")]
struct Cli {
    /// Account that owns both token supplies and every privileged role.
    #[arg(long, env = "REBASE_OWNER")]
    owner: Option<String>,

    /// Custody account of the staking pool.
    #[arg(long, env = "REBASE_POOL_ACCOUNT")]
    pool_account: Option<String>,

    /// Length of a distribution window in seconds.
    #[arg(long, env = "REBASE_REWARDS_DURATION")]
    rewards_duration: Option<u64>,

    /// Where pool state is restored from and saved to.
    #[arg(long, env = "REBASE_SNAPSHOT_PATH")]
    snapshot: Option<PathBuf>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "REBASE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "REBASE_LOG_FORMAT")]
    log_format: Option<String>,

    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "REBASE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Replay a scenario script against the pool.
    Run {
        /// TOML scenario script.
        #[arg(long)]
        script: PathBuf,

        /// Abort at the first rejected step.
        #[arg(long)]
        strict: bool,

        /// Print Prometheus metrics after the run.
        #[arg(long)]
        metrics: bool,
    },
    /// Print the effective configuration as TOML.
    Config,
}

impl Cli {
    /// File settings (or defaults) with CLI flags and env vars on top.
    fn node_config(&self) -> anyhow::Result<NodeConfig> {
        let mut config = match &self.config {
            Some(path) => NodeConfig::from_toml_file(path)?,
            None => NodeConfig::default(),
        };
        if let Some(owner) = &self.owner {
            config.owner = AccountId::new(owner.clone());
        }
        if let Some(pool) = &self.pool_account {
            config.pool_account = AccountId::new(pool.clone());
        }
        if let Some(secs) = self.rewards_duration {
            config.rewards.rewards_duration_secs = secs;
        }
        if let Some(path) = &self.snapshot {
            config.snapshot_path = Some(path.clone());
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.log_format = format.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.node_config()?;
    init_logging(config.log_format()?, &config.log_level)?;

    match cli.command {
        Command::Config => {
            print!("{}", config.to_toml_string()?);
        }
        Command::Run {
            script,
            strict,
            metrics,
        } => {
            let script = Script::from_file(&script)?;
            tracing::info!(
                owner = %config.owner,
                pool = %config.pool_account,
                window = %format_duration(config.rewards.rewards_duration_secs),
                steps = script.steps.len(),
                "starting scenario"
            );

            let clock = Arc::new(NullClock::new(0));
            let node = Arc::new(StakingNode::open(config.clone(), clock.clone())?);
            // A restored pool resumes at the time it was saved.
            clock.set(node.snapshot().await.saved_at.as_secs());

            let mut runner = ScriptRunner::new(node.clone(), clock, strict);
            let summary = runner.run(&script).await?;

            if let Some(path) = &config.snapshot_path {
                node.save_snapshot(path)
                    .await
                    .with_context(|| format!("saving snapshot to {}", path.display()))?;
                tracing::info!(path = %path.display(), "snapshot saved");
            }
            if metrics {
                print!("{}", node.metrics.encode()?);
            }
            tracing::info!(
                applied = summary.applied,
                rejected = summary.rejected,
                "rebase daemon exited cleanly"
            );
        }
    }

    Ok(())
}
