use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod util;

use commands::session::SessionCommands;

#[derive(Parser)]
#[command(name = "mugo", version, about = "Mugo CLI: drive the agent service directly and check the gateway")]
struct Cli {
    /// Agent service base URL, including the API prefix
    #[arg(long, env = "MUGO_ADK_URL", default_value = "http://localhost:8080/api")]
    adk_url: String,

    /// Gateway base URL
    #[arg(long, env = "MUGO_API_URL", default_value = "http://localhost:3000")]
    api_url: String,

    /// Agent request timeout in seconds
    #[arg(long, env = "MUGO_ADK_TIMEOUT_SECS", default_value_t = 60)]
    timeout_secs: u64,

    /// Print compact JSON instead of pretty-printed
    #[arg(long, global = true)]
    raw: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gateway health
    Health,
    /// List the agent apps the service can run
    Apps,
    /// Agent session operations
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },
    /// Run one agent turn, creating the session if it is missing
    Run {
        #[arg(long)]
        app: String,
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        session_id: String,
        /// User message text
        #[arg(long)]
        message: String,
        /// State delta applied with this turn, as a JSON object
        #[arg(long)]
        state_delta: Option<String>,
        /// Fail instead of creating a missing session
        #[arg(long)]
        no_auto_session: bool,
        /// Include every event in the output
        #[arg(long)]
        events: bool,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    // Logs go to stderr so stdout stays machine-readable JSON
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let code = match cli.command {
        Commands::Health => commands::health::run(&cli.api_url, cli.raw).await,
        Commands::Apps => {
            let client = util::agent_client(&cli.adk_url, cli.timeout_secs);
            commands::agent::list_apps(&client, cli.raw).await
        }
        Commands::Session { command } => {
            let client = util::agent_client(&cli.adk_url, cli.timeout_secs);
            commands::session::run(&client, command, cli.raw).await
        }
        Commands::Run {
            app,
            user_id,
            session_id,
            message,
            state_delta,
            no_auto_session,
            events,
        } => {
            let client = util::agent_client(&cli.adk_url, cli.timeout_secs);
            let args = commands::agent::RunArgs {
                app,
                user_id,
                session_id,
                message,
                state_delta,
                no_auto_session,
                events,
            };
            commands::agent::run(&client, args, cli.raw).await
        }
    };

    std::process::exit(code);
}
