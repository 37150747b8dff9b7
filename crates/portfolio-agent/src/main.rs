use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use triage::{
    ComplexityAnalyzer, PatternExtractor, QueryContext, RolloutGate, SessionContext,
    TriageConfig, TriageDecision,
};

use portfolio_agent::config::AgentConfig;
use portfolio_agent::telemetry::{summarize, DecisionRecord, TelemetrySink};
use portfolio_agent::Agent;

#[derive(Parser)]
#[command(name = "portfolio-agent", version, about = "Portfolio chat triage and execution")]
struct Cli {
    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process one message end to end
    Ask {
        text: String,
        #[arg(long, conflicts_with = "guest")]
        user: Option<String>,
        /// Guest session id; a fresh one is generated when no identity is given
        #[arg(long)]
        guest: Option<String>,
        #[arg(long)]
        guest_mode: bool,
        /// Messages already exchanged in this session
        #[arg(long, default_value_t = 0)]
        message_count: u32,
    },
    /// Show the lane decision without executing anything
    Classify { text: String },
    /// Run the frontend/backend complexity analysis
    Analyze {
        text: String,
        #[arg(long)]
        guest_mode: bool,
        #[arg(long, default_value_t = 0)]
        message_count: u32,
    },
    /// Explain the rollout verdict for an identifier
    Rollout {
        id: String,
        /// Override the configured percentage (also enables the rollout)
        #[arg(long)]
        percentage: Option<u8>,
        #[arg(long)]
        force: bool,
    },
    /// Summarize the decision log
    Stats,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AgentConfig::load(cli.config.as_deref()).context("Failed to load config")?;
    let triage_config = TriageConfig::from_env();

    match cli.command {
        Command::Ask {
            text,
            user,
            guest,
            guest_mode,
            message_count,
        } => {
            let ctx = match (user, guest) {
                (Some(user), _) => QueryContext {
                    user_id: Some(user),
                    guest_session_id: None,
                    is_guest_mode: guest_mode,
                },
                (None, Some(guest)) => QueryContext::guest(guest),
                (None, None) => QueryContext::guest(uuid::Uuid::new_v4().to_string()),
            };
            let agent = Agent::build(&config, &triage_config).await?;
            let outcome = agent.ask(&text, &ctx, message_count).await;
            if let (Some(path), Some(result)) = (&config.telemetry_path, &outcome.result) {
                TelemetrySink::new(path).append(&DecisionRecord::from_result(result, &ctx));
            }
            print_json(&outcome)?;
        }
        Command::Classify { text } => {
            let decision = TriageDecision::decide(
                PatternExtractor::new().classify(&text),
                &triage_config.thresholds,
            );
            print_json(&decision)?;
        }
        Command::Analyze {
            text,
            guest_mode,
            message_count,
        } => {
            let session = SessionContext {
                is_guest_mode: guest_mode,
                message_count,
            };
            print_json(&ComplexityAnalyzer::new().analyze(&text, &session))?;
        }
        Command::Rollout {
            id,
            percentage,
            force,
        } => {
            let mut rollout = triage_config.rollout.clone();
            if let Some(pct) = percentage {
                rollout.enabled = true;
                rollout.percentage = pct.min(100);
            }
            info!(%rollout, "Evaluating rollout");
            let gate = RolloutGate::new(rollout);
            let verdict = gate.evaluate(Some(&id), None, force.then_some(true));
            print_json(&verdict)?;
        }
        Command::Stats => {
            let path = config
                .telemetry_path
                .as_ref()
                .context("No telemetry path configured (set PORTFOLIO_TELEMETRY_PATH)")?;
            let records = TelemetrySink::new(path)
                .read_all()
                .with_context(|| format!("Failed to read {}", path.display()))?;
            print_json(&summarize(&records))?;
        }
    }

    Ok(())
}
