// ABOUTME: Entry point for agentcore — a demo CLI driving the Loop Driver end to end.
// ABOUTME: Parses CLI args, loads config, wires up the registry/gate/bus/facade, and runs one turn.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use agentcore::agent::{self, CompactionSettings, LoopDriver, RunOutcome};
use agentcore::approval::ApprovalGate;
use agentcore::bus::{Bus, Event};
use agentcore::config::{self, Config};
use agentcore::context::{DMailBox, Session};
use agentcore::llm::LlmFacade;
use agentcore::prompt::{build_system_prompt, SystemPromptParams};
use agentcore::tools::ask_user::AskUserTool;
use agentcore::tools::echo::EchoTool;
use agentcore::tools::Registry;

#[derive(Parser)]
#[command(name = "agentcore", about = "Agent loop core: run a turn against the echo reference provider")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write the default config and collect provider secrets interactively.
    Setup,
    /// Send one message through the loop driver and print the transcript.
    Run {
        message: String,
        #[arg(long, default_value = "default")]
        session: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let _ = dotenvy::dotenv();
    let _ = dotenvy::from_path(Config::secrets_env_path());

    let cli = Cli::parse();
    match cli.command {
        Command::Setup => config::run_setup(),
        Command::Run { message, session } => run(message, session).await,
    }
}

async fn run(message: String, session_id: String) -> anyhow::Result<()> {
    let config = Config::load()?;

    let sessions_dir = Config::sessions_dir();
    std::fs::create_dir_all(&sessions_dir)?;
    let session = Session::new(session_id, ".", &sessions_dir);
    let context = session.open_context()?;
    tracing::info!(path = %context.path().display(), "opened context store");

    let mut registry = Registry::new();
    registry.register(Arc::new(EchoTool))?;
    registry.register(Arc::new(AskUserTool))?;
    let registry = Arc::new(registry);

    let bus = Arc::new(Bus::new(256));
    let dmail = Arc::new(DMailBox::new());
    let _gate = Arc::new(ApprovalGate::new(config.permissions.bypass_approvals, bus.clone()));

    let mut events = bus.subscribe();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if let Event::ContentPart(part) = event {
                if let Some(text) = part.as_text() {
                    println!("{text}");
                }
            }
        }
    });

    let provider = agent::create_provider(&config.llm)?;
    let facade = LlmFacade::new(provider);
    let compaction = CompactionSettings {
        enabled: config.compaction.enabled,
        threshold_ratio: config.compaction.threshold_ratio,
        max_context_size_override: config.compaction.threshold_token_limit,
    };
    let system_prompt = build_system_prompt(&SystemPromptParams {
        tool_names: registry.names().into_iter().map(String::from).collect(),
        model: config.llm.model.clone(),
    });

    let mut driver = LoopDriver::new(
        context,
        registry,
        facade,
        bus.clone(),
        dmail,
        config.llm.model.clone(),
        config.loop_driver.max_steps_per_run,
        compaction,
        Some(system_prompt),
    );

    let outcome = driver.run(message, CancellationToken::new()).await;
    drop(driver);
    drop(bus);
    let _ = printer.await;

    match outcome {
        RunOutcome::Completed => Ok(()),
        RunOutcome::Interrupted => anyhow::bail!("run was interrupted"),
        RunOutcome::MaxStepsReached => anyhow::bail!("max steps per run reached without completing"),
        RunOutcome::ProviderError(e) => anyhow::bail!("provider error: {e}"),
    }
}
