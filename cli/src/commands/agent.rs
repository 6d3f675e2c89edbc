use mugo_adk::{AgentClient, AgentRuntime, RunRequest};
use serde_json::json;

use crate::util::{exit_error, parse_state, print_json, report_agent_error};

pub async fn list_apps(client: &AgentClient, raw: bool) -> i32 {
    match client.list_apps().await {
        Ok(apps) => print_json(&json!({ "apps": apps }), raw),
        Err(e) => report_agent_error(&e),
    }
}

pub struct RunArgs {
    pub app: String,
    pub user_id: String,
    pub session_id: String,
    pub message: String,
    pub state_delta: Option<String>,
    pub no_auto_session: bool,
    pub events: bool,
}

/// Run one agent turn and print the final text (plus all events with `--events`).
pub async fn run(client: &AgentClient, args: RunArgs, raw: bool) -> i32 {
    if args.message.trim().is_empty() {
        exit_error("message must not be empty", None);
    }

    let mut request = RunRequest::user_text(&args.app, &args.user_id, &args.session_id, &args.message);
    request.state_delta = args
        .state_delta
        .as_deref()
        .map(parse_state)
        .transpose()
        .unwrap_or_else(|e| exit_error(&e, None));

    let outcome = if args.no_auto_session {
        client.run(&request).await
    } else {
        client.run_with_auto_session(&request).await
    };

    match outcome {
        Ok(result) => {
            let mut body = json!({
                "app": args.app,
                "session_id": args.session_id,
                "final_text": result.final_text,
                "event_count": result.events.len(),
            });
            if args.events {
                body["events"] = json!(result.events);
            }
            print_json(&body, raw)
        }
        Err(e) => report_agent_error(&e),
    }
}
