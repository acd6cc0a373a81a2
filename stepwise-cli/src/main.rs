use clap::{Parser, Subcommand};
use std::time::Duration;
use stepwise_core::{AgentId, ExecutionId, ExecutionStatus};
use stepwise_worker::{WorkerSettings, parse_duration};

mod admin;
mod error;
mod run;

use admin::{NewAgent, ToolRegistration};
use error::CliResult;

#[derive(Parser, Debug)]
#[command(name = "stepwise", version)]
#[command(about = "Stepwise - queue-driven agent execution worker")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Consume units of work until interrupted
    Worker {
        /// Worker slots (overrides STEPWISE_WORKER_CONCURRENCY)
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Apply schema migrations and upgrade legacy configuration values
    Migrate,
    /// Create an agent and its configuration rows
    CreateAgent(NewAgent),
    /// Create an execution of an agent and enqueue its first step
    Start {
        #[arg(long)]
        agent: AgentId,
        /// Execution name (default: "<agent name> run")
        #[arg(long)]
        name: Option<String>,
    },
    /// Enqueue one step of an existing execution
    Enqueue {
        execution: ExecutionId,
        /// Delay before the step becomes visible, e.g. `30s`
        #[arg(long, value_parser = parse_duration, default_value = "0")]
        delay: Duration,
    },
    /// Cancel a pending or running execution
    Cancel { execution: ExecutionId },
    /// Show one execution, or list executions
    Status {
        execution: Option<ExecutionId>,
        /// Only list executions in this status
        #[arg(long)]
        status: Option<ExecutionStatus>,
    },
    /// Tool descriptors
    Tools {
        #[command(subcommand)]
        tools_command: ToolsCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ToolsCommands {
    /// List registered descriptors and resolvable built-in keys
    List,
    /// Register a tool descriptor
    Register(ToolRegistration),
}

#[tokio::main]
async fn main() {
    // Initialize JSON logging once.
    let env_filter = tracing_subscriber::EnvFilter::from_default_env();
    let env_filter = match "info".parse() {
        Ok(directive) => env_filter.add_directive(directive),
        Err(_) => env_filter,
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .json()
        .try_init();

    let cli = Cli::parse();

    if let Err(e) = dispatch(cli.command).await {
        tracing::error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn dispatch(command: Commands) -> CliResult<()> {
    let mut settings = WorkerSettings::from_env()?;

    match command {
        Commands::Worker { concurrency } => {
            if let Some(concurrency) = concurrency {
                settings.concurrency = concurrency;
                settings.validate()?;
            }
            run::run_worker(settings).await
        }
        Commands::Migrate => admin::migrate(&settings),
        Commands::CreateAgent(new_agent) => admin::create_agent(&settings, &new_agent),
        Commands::Start { agent, name } => admin::start(&settings, agent, name.as_deref()).await,
        Commands::Enqueue { execution, delay } => admin::enqueue(&settings, execution, delay).await,
        Commands::Cancel { execution } => admin::cancel(&settings, execution),
        Commands::Status { execution, status } => admin::status(&settings, execution, status),
        Commands::Tools { tools_command } => match tools_command {
            ToolsCommands::List => admin::list_tools(&settings),
            ToolsCommands::Register(registration) => admin::register_tool(&settings, &registration),
        },
    }
}
