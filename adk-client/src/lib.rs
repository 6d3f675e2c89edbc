//! Client for an agent-run REST service (ADK REST API).
//!
//! The service owns sessions and runs agents; this crate only talks to it.
//! [`AgentClient`] covers the raw endpoints and [`AgentRuntime`] adds the
//! create-session-and-retry behavior on top of `run`.

pub mod client;
pub mod error;
pub mod runtime;
pub mod types;

pub use client::{AgentClient, DEFAULT_TIMEOUT};
pub use error::{AgentError, FailureKind};
pub use runtime::AgentRuntime;
pub use types::{Content, Event, Part, Role, RunRequest, RunResult, Session, extract_final_text};
