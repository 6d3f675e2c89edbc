use clap::Subcommand;
use mugo_adk::{AgentClient, AgentRuntime};
use serde_json::json;

use crate::util::{EXIT_CLIENT, exit_error, parse_state, print_json, report_agent_error};

#[derive(Subcommand)]
pub enum SessionCommands {
    /// Create a session, optionally with initial state
    Create {
        #[arg(long)]
        app: String,
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        session_id: String,
        /// Initial session state as a JSON object
        #[arg(long)]
        state: Option<String>,
    },
    /// Show a session with its events
    Get {
        #[arg(long)]
        app: String,
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        session_id: String,
    },
    /// Delete a session; an already-missing session counts as deleted
    Delete {
        #[arg(long)]
        app: String,
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        session_id: String,
    },
}

pub async fn run(client: &AgentClient, command: SessionCommands, raw: bool) -> i32 {
    match command {
        SessionCommands::Create {
            app,
            user_id,
            session_id,
            state,
        } => {
            let state = state
                .as_deref()
                .map(parse_state)
                .transpose()
                .unwrap_or_else(|e| exit_error(&e, None));
            create(client, &app, &user_id, &session_id, state, raw).await
        }
        SessionCommands::Get {
            app,
            user_id,
            session_id,
        } => get(client, &app, &user_id, &session_id, raw).await,
        SessionCommands::Delete {
            app,
            user_id,
            session_id,
        } => delete(client, &app, &user_id, &session_id, raw).await,
    }
}

async fn create(
    client: &AgentClient,
    app: &str,
    user_id: &str,
    session_id: &str,
    state: Option<serde_json::Map<String, serde_json::Value>>,
    raw: bool,
) -> i32 {
    match client.create_session(app, user_id, session_id, state).await {
        Ok(session) => print_json(&session, raw),
        Err(e) => report_agent_error(&e),
    }
}

async fn get(client: &AgentClient, app: &str, user_id: &str, session_id: &str, raw: bool) -> i32 {
    match client.get_session(app, user_id, session_id).await {
        Ok(Some(session)) => print_json(&session, raw),
        Ok(None) => {
            let body = json!({
                "error": "not_found",
                "message": format!("Session {session_id} not found for {app}/{user_id}")
            });
            eprintln!("{}", serde_json::to_string_pretty(&body).unwrap_or_else(|_| body.to_string()));
            EXIT_CLIENT
        }
        Err(e) => report_agent_error(&e),
    }
}

async fn delete(client: &AgentClient, app: &str, user_id: &str, session_id: &str, raw: bool) -> i32 {
    match client.delete_session(app, user_id, session_id).await {
        Ok(()) => print_json(&json!({ "deleted": true, "session_id": session_id }), raw),
        Err(e) => report_agent_error(&e),
    }
}
