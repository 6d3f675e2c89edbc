use std::future::Future;

use crate::error::AgentError;
use crate::types::{RunRequest, RunResult, Session};

/// The two session-service calls the auto-session behavior is built on.
///
/// [`AgentClient`](crate::AgentClient) implements this over HTTP; tests
/// implement it with in-memory doubles.
pub trait AgentRuntime: Send + Sync {
    fn create_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &str,
        state: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> impl Future<Output = Result<Session, AgentError>> + Send;

    /// Run one agent turn. Does not create missing sessions.
    fn run(&self, request: &RunRequest) -> impl Future<Output = Result<RunResult, AgentError>> + Send;

    /// Run one agent turn, creating the session first if the service reports
    /// it missing.
    ///
    /// On a session-not-found failure the session is created without initial
    /// state and the run is retried exactly once; the retry's outcome is
    /// returned as-is. Any other failure is returned unchanged.
    fn run_with_auto_session(
        &self,
        request: &RunRequest,
    ) -> impl Future<Output = Result<RunResult, AgentError>> + Send {
        async move {
            let original = match self.run(request).await {
                Ok(result) => return Ok(result),
                Err(err) if err.is_session_not_found() => err,
                Err(err) => {
                    tracing::warn!(
                        app_name = %request.app_name,
                        session_id = %request.session_id,
                        error = %err,
                        "agent run failed with non-session error"
                    );
                    return Err(err);
                }
            };

            tracing::info!(
                app_name = %request.app_name,
                user_id = %request.user_id,
                session_id = %request.session_id,
                "agent session missing, creating it and retrying run"
            );

            if let Err(create_err) = self
                .create_session(
                    &request.app_name,
                    &request.user_id,
                    &request.session_id,
                    None,
                )
                .await
            {
                return Err(AgentError::SessionRepair {
                    source: Box::new(create_err),
                    original: Box::new(original),
                });
            }

            self.run(request).await
        }
    }
}
