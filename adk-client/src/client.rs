use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::error::AgentError;
use crate::runtime::AgentRuntime;
use crate::types::{CreateSessionRequest, Event, RunRequest, RunResult, Session};

/// Request timeout applied to every call unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// HTTP client for the agent-run service.
///
/// The base URL includes the API prefix, e.g. `http://localhost:8080/api`.
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct AgentClient {
    base_url: Url,
    http: reqwest::Client,
}

impl AgentClient {
    pub fn new(base_url: &str) -> Result<Self, AgentError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, AgentError> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let invalid = |reason: String| AgentError::InvalidUrl {
            url: base_url.to_string(),
            reason,
        };

        let parsed = Url::parse(trimmed).map_err(|e| invalid(e.to_string()))?;
        if parsed.cannot_be_a_base() || !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid("expected an http(s) base URL".to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| AgentError::Request {
                url: trimmed.to_string(),
                source,
            })?;

        Ok(Self {
            base_url: parsed,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Names of the agent apps the service can run.
    pub async fn list_apps(&self) -> Result<Vec<String>, AgentError> {
        let url = self.endpoint(&["list-apps"]);
        let response = self.send(self.http.get(url.clone()), &url).await?;
        let response = check_status(response, &[StatusCode::OK]).await?;
        decode_json(response, &url).await
    }

    /// Fetch a session. A 404 from the service is reported as `Ok(None)`.
    pub async fn get_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &str,
    ) -> Result<Option<Session>, AgentError> {
        let url = self.session_url(app_name, user_id, session_id);
        let response = self.send(self.http.get(url.clone()), &url).await?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(app_name, user_id, session_id, "agent session not found");
            return Ok(None);
        }

        let response = check_status(response, &[StatusCode::OK]).await?;
        decode_json(response, &url).await.map(Some)
    }

    /// Delete a session. Deleting a session that is already gone succeeds.
    pub async fn delete_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &str,
    ) -> Result<(), AgentError> {
        let url = self.session_url(app_name, user_id, session_id);
        let response = self.send(self.http.delete(url.clone()), &url).await?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(app_name, user_id, session_id, "agent session already deleted");
            return Ok(());
        }

        check_status(response, &[StatusCode::OK, StatusCode::NO_CONTENT]).await?;
        Ok(())
    }

    fn session_url(&self, app_name: &str, user_id: &str, session_id: &str) -> Url {
        self.endpoint(&["apps", app_name, "users", user_id, "sessions", session_id])
    }

    /// Append percent-encoded path segments to the base URL.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // The constructor rejects cannot-be-a-base URLs, so this always applies.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send(&self, request: RequestBuilder, url: &Url) -> Result<Response, AgentError> {
        request.send().await.map_err(|source| AgentError::Request {
            url: url.to_string(),
            source,
        })
    }
}

impl AgentRuntime for AgentClient {
    async fn create_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &str,
        state: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> Result<Session, AgentError> {
        let url = self.session_url(app_name, user_id, session_id);
        let body = CreateSessionRequest { state };
        let request = self.http.request(Method::POST, url.clone()).json(&body);

        let response = self.send(request, &url).await?;
        let response = check_status(response, &[StatusCode::OK, StatusCode::CREATED]).await?;
        let session: Session = decode_json(response, &url).await?;

        tracing::info!(app_name, user_id, session_id, "agent session created");
        Ok(session)
    }

    async fn run(&self, request: &RunRequest) -> Result<RunResult, AgentError> {
        let url = self.endpoint(&["run"]);
        let response = self
            .send(self.http.post(url.clone()).json(request), &url)
            .await?;

        let response = check_status(response, &[StatusCode::OK]).await?;
        let events: Vec<Event> = decode_json(response, &url).await?;

        tracing::debug!(
            app_name = %request.app_name,
            session_id = %request.session_id,
            events = events.len(),
            "agent run completed"
        );
        Ok(RunResult::from_events(events))
    }
}

/// Pass the response through when its status is accepted; otherwise read the
/// body and turn it into an error.
async fn check_status(response: Response, accepted: &[StatusCode]) -> Result<Response, AgentError> {
    let status = response.status();
    if accepted.contains(&status) {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|e| format!("<failed to read body: {e}>"));
    Err(AgentError::from_status(status.as_u16(), body))
}

async fn decode_json<T: DeserializeOwned>(response: Response, url: &Url) -> Result<T, AgentError> {
    let bytes = response.bytes().await.map_err(|source| AgentError::Request {
        url: url.to_string(),
        source,
    })?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Server};
    use serde_json::json;

    use super::AgentClient;
    use crate::error::FailureKind;
    use crate::runtime::AgentRuntime;
    use crate::types::RunRequest;

    const SESSION_PATH: &str = "/api/apps/hello_time_agent/users/u1/sessions/s1";

    fn client_for(server: &Server) -> AgentClient {
        AgentClient::new(&format!("{}/api/", server.url())).unwrap()
    }

    fn session_body() -> String {
        json!({
            "id": "s1",
            "appName": "hello_time_agent",
            "userId": "u1",
            "lastUpdateTime": 1736160000,
            "events": [],
            "state": {}
        })
        .to_string()
    }

    fn run_body(text: &str) -> String {
        json!([
            {"id": "e1", "author": "user", "content": {"role": "user", "parts": [{"text": "Berlin"}]}},
            {"id": "e2", "author": "hello_time_agent", "content": {"role": "model", "parts": [{"text": text}]}}
        ])
        .to_string()
    }

    #[test]
    fn rejects_non_http_base_urls() {
        assert!(AgentClient::new("not a url").is_err());
        let err = AgentClient::new("mailto:agents@example.com").unwrap_err();
        assert_eq!(err.kind(), FailureKind::Configuration);
    }

    #[test]
    fn base_url_trailing_slash_is_ignored() {
        let client = AgentClient::new("http://localhost:8080/api/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080/api");
    }

    #[tokio::test]
    async fn list_apps_returns_names() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/list-apps")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"["hello_time_agent","macro_estimator"]"#)
            .create_async()
            .await;

        let apps = client_for(&server).list_apps().await.unwrap();

        assert_eq!(apps, vec!["hello_time_agent", "macro_estimator"]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn list_apps_surfaces_non_success_status() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/list-apps")
            .with_status(502)
            .with_body("bad gateway")
            .create_async()
            .await;

        let err = client_for(&server).list_apps().await.unwrap_err();

        assert_eq!(err.kind(), FailureKind::Transport);
        assert_eq!(err.status(), Some(502));
    }

    #[tokio::test]
    async fn create_session_sends_initial_state() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", SESSION_PATH)
            .match_header("content-type", "application/json")
            .match_body(Matcher::PartialJson(json!({"state": {"goal": "cut"}})))
            .with_status(200)
            .with_body(session_body())
            .create_async()
            .await;

        let mut state = serde_json::Map::new();
        state.insert("goal".to_string(), json!("cut"));
        let session = client_for(&server)
            .create_session("hello_time_agent", "u1", "s1", Some(state))
            .await
            .unwrap();

        assert_eq!(session.id, "s1");
        assert_eq!(session.app_name, "hello_time_agent");
        assert_eq!(session.user_id, "u1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn create_session_rejects_non_2xx() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", SESSION_PATH)
            .with_status(409)
            .with_body("session already exists")
            .create_async()
            .await;

        let err = client_for(&server)
            .create_session("hello_time_agent", "u1", "s1", None)
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(409));
        assert_eq!(err.kind(), FailureKind::Transport);
    }

    #[tokio::test]
    async fn get_session_404_is_absent_not_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", SESSION_PATH)
            .with_status(404)
            .with_body("session not found")
            .create_async()
            .await;

        let session = client_for(&server)
            .get_session("hello_time_agent", "u1", "s1")
            .await
            .unwrap();

        assert!(session.is_none());
    }

    #[tokio::test]
    async fn get_session_returns_existing_session() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", SESSION_PATH)
            .with_status(200)
            .with_body(session_body())
            .create_async()
            .await;

        let session = client_for(&server)
            .get_session("hello_time_agent", "u1", "s1")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(session.id, "s1");
        assert_eq!(session.last_update_time, Some(1736160000.0));
    }

    #[tokio::test]
    async fn get_session_other_failures_are_errors() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", SESSION_PATH)
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let err = client_for(&server)
            .get_session("hello_time_agent", "u1", "s1")
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(500));
    }

    #[tokio::test]
    async fn delete_session_accepts_no_content() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("DELETE", SESSION_PATH)
            .with_status(204)
            .create_async()
            .await;

        client_for(&server)
            .delete_session("hello_time_agent", "u1", "s1")
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn delete_session_treats_already_gone_as_success() {
        let mut server = Server::new_async().await;
        server
            .mock("DELETE", SESSION_PATH)
            .with_status(404)
            .with_body("session not found")
            .create_async()
            .await;

        client_for(&server)
            .delete_session("hello_time_agent", "u1", "s1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn delete_session_fails_on_server_error() {
        let mut server = Server::new_async().await;
        server
            .mock("DELETE", SESSION_PATH)
            .with_status(500)
            .create_async()
            .await;

        let err = client_for(&server)
            .delete_session("hello_time_agent", "u1", "s1")
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(500));
    }

    #[tokio::test]
    async fn run_posts_request_and_extracts_final_text() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/run")
            .match_body(Matcher::PartialJson(json!({
                "appName": "hello_time_agent",
                "userId": "u1",
                "sessionId": "s1",
                "newMessage": {"role": "user", "parts": [{"text": "Berlin"}]}
            })))
            .with_status(200)
            .with_body(run_body("Sunny, 24C."))
            .create_async()
            .await;

        let request = RunRequest::user_text("hello_time_agent", "u1", "s1", "Berlin");
        let result = client_for(&server).run(&request).await.unwrap();

        assert_eq!(result.events.len(), 2);
        assert_eq!(result.final_text, "Sunny, 24C.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn run_with_malformed_body_is_decode_error() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api/run")
            .with_status(200)
            .with_body(r#"{"not": "an array"}"#)
            .create_async()
            .await;

        let request = RunRequest::user_text("hello_time_agent", "u1", "s1", "Berlin");
        let err = client_for(&server).run(&request).await.unwrap_err();

        assert_eq!(err.kind(), FailureKind::Decode);
    }

    #[tokio::test]
    async fn run_classifies_missing_session() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api/run")
            .with_status(404)
            .with_body(r#"{"error": "session not found"}"#)
            .create_async()
            .await;

        let request = RunRequest::user_text("hello_time_agent", "u1", "s1", "Berlin");
        let err = client_for(&server).run(&request).await.unwrap_err();

        assert!(err.is_session_not_found());
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn create_then_run_does_not_trigger_repair() {
        let mut server = Server::new_async().await;
        let create = server
            .mock("POST", SESSION_PATH)
            .with_status(200)
            .with_body(session_body())
            .expect(1)
            .create_async()
            .await;
        let run = server
            .mock("POST", "/api/run")
            .with_status(200)
            .with_body(run_body("It is 14:00 in Berlin."))
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server);
        client
            .create_session("hello_time_agent", "u1", "s1", None)
            .await
            .unwrap();
        let request = RunRequest::user_text("hello_time_agent", "u1", "s1", "Berlin");
        let result = client.run_with_auto_session(&request).await.unwrap();

        assert_eq!(result.final_text, "It is 14:00 in Berlin.");
        create.assert_async().await;
        run.assert_async().await;
    }

    #[tokio::test]
    async fn unrelated_run_failure_skips_session_creation() {
        let mut server = Server::new_async().await;
        let create = server
            .mock("POST", SESSION_PATH)
            .with_status(200)
            .with_body(session_body())
            .expect(0)
            .create_async()
            .await;
        server
            .mock("POST", "/api/run")
            .with_status(500)
            .with_body("internal server error")
            .create_async()
            .await;

        let request = RunRequest::user_text("hello_time_agent", "u1", "s1", "Berlin");
        let err = client_for(&server)
            .run_with_auto_session(&request)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "unexpected status 500: internal server error");
        create.assert_async().await;
    }
}
