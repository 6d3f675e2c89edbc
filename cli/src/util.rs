use mugo_adk::{AgentClient, AgentError, FailureKind};
use serde::Serialize;
use serde_json::json;

/// Exit codes: 0=success, 1=client error (4xx / not found), 2=server error (5xx),
/// 3=connection error, 4=usage error
pub const EXIT_OK: i32 = 0;
pub const EXIT_CLIENT: i32 = 1;
pub const EXIT_SERVER: i32 = 2;
pub const EXIT_CONNECTION: i32 = 3;
pub const EXIT_USAGE: i32 = 4;

pub fn exit_error(message: &str, docs_hint: Option<&str>) -> ! {
    let mut err = json!({
        "error": "cli_error",
        "message": message
    });
    if let Some(hint) = docs_hint {
        err["docs_hint"] = json!(hint);
    }
    eprintln!("{}", serde_json::to_string_pretty(&err).unwrap_or_else(|_| err.to_string()));
    std::process::exit(EXIT_USAGE);
}

pub fn agent_client(adk_url: &str, timeout_secs: u64) -> AgentClient {
    AgentClient::with_timeout(adk_url, std::time::Duration::from_secs(timeout_secs))
        .unwrap_or_else(|e| exit_error(&e.to_string(), Some("Check --adk-url or MUGO_ADK_URL.")))
}

pub fn print_json<T: Serialize>(value: &T, raw: bool) -> i32 {
    let formatted = if raw {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    };
    match formatted {
        Ok(text) => {
            println!("{text}");
            EXIT_OK
        }
        Err(e) => {
            eprintln!("{}", json!({ "error": "cli_error", "message": e.to_string() }));
            EXIT_USAGE
        }
    }
}

/// Print an agent-service failure as structured JSON and map it to an exit code.
pub fn report_agent_error(err: &AgentError) -> i32 {
    let kind = err.kind();
    let (code, exit_code, hint) = match kind {
        FailureKind::Configuration => ("configuration_error", EXIT_USAGE, None),
        FailureKind::SessionNotFound => ("session_not_found", EXIT_CLIENT, None),
        FailureKind::Decode => ("decode_error", EXIT_SERVER, None),
        FailureKind::Transport => match err.status() {
            Some(400..=499) => ("client_error", EXIT_CLIENT, None),
            Some(_) => ("server_error", EXIT_SERVER, None),
            None => (
                "connection_error",
                EXIT_CONNECTION,
                Some("Is the agent service running? Check MUGO_ADK_URL."),
            ),
        },
    };

    let mut body = json!({
        "error": code,
        "message": err.to_string(),
    });
    if let Some(status) = err.status() {
        body["status"] = json!(status);
    }
    if let Some(hint) = hint {
        body["docs_hint"] = json!(hint);
    }
    eprintln!("{}", serde_json::to_string_pretty(&body).unwrap_or_else(|_| body.to_string()));
    exit_code
}

/// GET a gateway endpoint, print the JSON body, exit with a structured code.
pub async fn api_get(api_url: &str, path: &str, raw: bool) -> i32 {
    let url = format!("{}{path}", api_url.trim_end_matches('/'));
    let resp = match reqwest::Client::new().get(&url).send().await {
        Ok(r) => r,
        Err(e) => {
            let err = json!({
                "error": "connection_error",
                "message": format!("{e}"),
                "docs_hint": "Is the API server running? Check MUGO_API_URL."
            });
            eprintln!("{}", serde_json::to_string_pretty(&err).unwrap_or_else(|_| err.to_string()));
            return EXIT_CONNECTION;
        }
    };

    let exit_code = match resp.status().as_u16() {
        200..=299 => EXIT_OK,
        400..=499 => EXIT_CLIENT,
        _ => EXIT_SERVER,
    };

    let body: serde_json::Value = match resp.json().await {
        Ok(v) => v,
        Err(e) => json!({"raw_error": format!("Failed to parse response as JSON: {e}")}),
    };

    if exit_code == EXIT_OK {
        print_json(&body, raw)
    } else {
        eprintln!("{}", serde_json::to_string_pretty(&body).unwrap_or_else(|_| body.to_string()));
        exit_code
    }
}

/// Parse `--state` as a JSON object.
pub fn parse_state(raw: &str) -> Result<serde_json::Map<String, serde_json::Value>, String> {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(_) => Err("--state must be a JSON object".to_string()),
        Err(e) => Err(format!("Invalid JSON in --state: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::parse_state;

    #[test]
    fn state_must_be_an_object() {
        assert_eq!(parse_state(r#"{"units":"metric"}"#).unwrap()["units"], "metric");
        assert!(parse_state("[1, 2]").unwrap_err().contains("JSON object"));
        assert!(parse_state("{oops").unwrap_err().starts_with("Invalid JSON"));
    }
}
