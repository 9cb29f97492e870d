//! CLI entry point for motion skills
//!
//! Runs skills against the simulated controller described in the
//! configuration file.
//!
//! # Usage
//!
//! List skills:
//! ```bash
//! motion-skills list
//! ```
//!
//! Wiggle joint 2 of the configured part:
//! ```bash
//! motion-skills --config config/motion.toml wiggle --joint 2
//! ```

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use motion_bin::config::DEFAULT_CONFIG_PATH;
use motion_bin::{app, telemetry, MotionConfig};
use motion_client::CancelHandle;
use motion_skills::SkillRegistry;
use std::path::PathBuf;
use tokio::signal;

#[derive(Parser)]
#[command(name = "motion-skills")]
#[command(about = "Run real-time motion skills against a controller", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Override the configured log level
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered skills
    List,

    /// Move one joint out by the configured offset and back
    Wiggle {
        /// Zero-based joint index
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        joint: i64,

        /// Part to move (defaults to controller.part)
        #[arg(long)]
        part: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = MotionConfig::load_from(&cli.config)?;
    if let Some(level) = cli.log_level {
        config.application.log_level = level;
    }
    config.validate().map_err(|e| anyhow!(e))?;
    telemetry::init_from_config(&config).map_err(|e| anyhow!(e))?;

    let registry = SkillRegistry::with_builtin();

    match cli.command {
        Commands::List => {
            for line in app::describe_skills(&registry) {
                println!("{line}");
            }
            Ok(())
        }
        Commands::Wiggle { joint, part } => {
            let cancel = CancelHandle::new();
            let run = app::run_wiggle(&config, &registry, joint, part.as_deref(), cancel.clone());
            tokio::pin!(run);

            let result = tokio::select! {
                result = &mut run => result,
                _ = signal::ctrl_c() => {
                    tracing::warn!("Interrupted, releasing session");
                    cancel.cancel();
                    run.await
                }
            }?;
            println!("{}", serde_json::to_string_pretty(&result.output)?);
            Ok(())
        }
    }
}
