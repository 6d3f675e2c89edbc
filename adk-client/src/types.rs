use serde::{Deserialize, Serialize};

/// Author role of a piece of content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
    /// Any role this client does not know about (tool, system, ...)
    #[serde(other)]
    Other,
}

/// One fragment of a message. Only text is interpreted by this client; tool
/// calls are carried through as opaque JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<serde_json::Value>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    /// A single-part user message.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Some(Role::User),
            parts: vec![Part::text(text)],
        }
    }

    pub fn is_model(&self) -> bool {
        self.role == Some(Role::Model)
    }
}

/// One recorded turn within a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub time: i64,
    #[serde(default)]
    pub invocation_id: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub partial: bool,
    #[serde(default)]
    pub turn_complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// A conversation context held by the agent service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub app_name: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<f64>,
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default)]
    pub state: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub(crate) struct CreateSessionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Input for one agent turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
    pub new_message: Content,
    #[serde(default)]
    pub streaming: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_delta: Option<serde_json::Map<String, serde_json::Value>>,
}

impl RunRequest {
    /// Non-streaming request carrying a single user text message.
    pub fn user_text(
        app_name: impl Into<String>,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            user_id: user_id.into(),
            session_id: session_id.into(),
            new_message: Content::user_text(text),
            streaming: false,
            state_delta: None,
        }
    }
}

/// Events produced by one run plus the derived final text.
#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    pub events: Vec<Event>,
    pub final_text: String,
}

impl RunResult {
    pub fn from_events(events: Vec<Event>) -> Self {
        let final_text = extract_final_text(&events);
        Self { events, final_text }
    }
}

/// The last non-empty text part of the model-authored events.
///
/// Every non-empty model text overwrites the previous one, so when a turn
/// emits several model segments only the last one survives. Returns an
/// empty string when no model event carries text.
pub fn extract_final_text(events: &[Event]) -> String {
    let mut last_text = "";

    for content in events.iter().filter_map(|e| e.content.as_ref()) {
        if !content.is_model() {
            continue;
        }
        for part in &content.parts {
            if let Some(text) = part.text.as_deref().filter(|t| !t.is_empty()) {
                last_text = text;
            }
        }
    }

    last_text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(role: Option<Role>, texts: &[&str]) -> Event {
        Event {
            content: Some(Content {
                role,
                parts: texts.iter().map(|t| Part::text(*t)).collect(),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn final_text_is_last_model_text() {
        let events = vec![
            event(Some(Role::User), &["what's the weather?"]),
            event(Some(Role::Model), &["It is sunny."]),
        ];
        assert_eq!(extract_final_text(&events), "It is sunny.");
    }

    #[test]
    fn final_text_keeps_only_the_last_segment_across_model_events() {
        // Earlier model text in the same turn is dropped, not concatenated.
        let events = vec![
            event(Some(Role::Model), &["Let me check.", "Looking it up"]),
            event(Some(Role::Model), &["Sunny, 24C."]),
        ];
        assert_eq!(extract_final_text(&events), "Sunny, 24C.");
    }

    #[test]
    fn final_text_skips_empty_parts_inside_the_last_event() {
        let events = vec![
            event(Some(Role::Model), &["first"]),
            event(Some(Role::Model), &["second", ""]),
        ];
        assert_eq!(extract_final_text(&events), "second");
    }

    #[test]
    fn final_text_survives_trailing_model_event_without_text() {
        let mut tool_call = event(Some(Role::Model), &[]);
        tool_call.content.as_mut().unwrap().parts.push(Part {
            function_call: Some(serde_json::json!({"name": "get_time"})),
            ..Default::default()
        });
        let events = vec![event(Some(Role::Model), &["answer"]), tool_call];
        assert_eq!(extract_final_text(&events), "answer");
    }

    #[test]
    fn final_text_ignores_non_model_roles_and_missing_content() {
        let events = vec![
            event(Some(Role::User), &["hello"]),
            event(None, &["no role"]),
            event(Some(Role::Other), &["tool output"]),
            Event::default(),
        ];
        assert_eq!(extract_final_text(&events), "");
    }

    #[test]
    fn final_text_of_no_events_is_empty() {
        assert_eq!(extract_final_text(&[]), "");
    }

    #[test]
    fn event_decodes_service_json_and_ignores_unknown_fields() {
        let raw = r#"{
            "id": "e-1",
            "time": 1736160000,
            "invocationId": "inv-1",
            "author": "hello_time_agent",
            "branch": "root",
            "actions": {"stateDelta": {}},
            "content": {"role": "model", "parts": [{"text": "hi"}]}
        }"#;
        let event: Event = serde_json::from_str(raw).unwrap();
        assert_eq!(event.invocation_id, "inv-1");
        assert_eq!(event.author, "hello_time_agent");
        assert!(event.content.unwrap().is_model());
    }

    #[test]
    fn unknown_role_decodes_as_other() {
        let content: Content =
            serde_json::from_str(r#"{"role": "tool", "parts": []}"#).unwrap();
        assert_eq!(content.role, Some(Role::Other));
    }

    #[test]
    fn run_request_serializes_camel_case() {
        let req = RunRequest::user_text("weather", "u1", "s1", "Berlin");
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["appName"], "weather");
        assert_eq!(value["userId"], "u1");
        assert_eq!(value["sessionId"], "s1");
        assert_eq!(value["newMessage"]["role"], "user");
        assert_eq!(value["newMessage"]["parts"][0]["text"], "Berlin");
        assert!(value.get("stateDelta").is_none());
    }
}
