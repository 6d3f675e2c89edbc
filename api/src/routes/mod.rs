pub mod agents;
pub mod analytics;
pub mod conversation;
pub mod conversations;
pub mod debug;
pub mod greeting;
pub mod health;
pub mod meals;
pub mod params;
pub mod users;

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use axum::body::to_bytes;
    use axum::response::Response;
    use mugo_adk::AgentClient;

    use crate::config::AgentApps;
    use crate::registry::SessionRegistry;
    use crate::state::AppState;

    /// State without a database whose agent client points at `server_url`
    /// (a mockito server root; the `/api` prefix is added here).
    pub fn test_state_with_agents(server_url: &str) -> AppState {
        AppState {
            db: None,
            database_configured: false,
            agents: AgentClient::new(&format!("{server_url}/api")).unwrap(),
            apps: AgentApps {
                nutrition: "macro_estimator".to_string(),
                weather: "hello_time_agent".to_string(),
                conversation: "echo_agent".to_string(),
            },
            registry: Arc::new(SessionRegistry::new()),
        }
    }

    /// State for routes that never reach the agent service.
    pub fn test_state() -> AppState {
        test_state_with_agents("http://127.0.0.1:9")
    }

    pub async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }
}
