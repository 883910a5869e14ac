//! Backend endpoint paths, relative to `{address}/api/v1`.

pub const API_PREFIX: &str = "/api/v1";

pub const SESSION_NEW: &str = "/dyad/session/new";
pub const SESSION_START: &str = "/dyad/session/{session_id}/start";
pub const SESSION_END: &str = "/dyad/session/{session_id}/end";
pub const SESSION_ABORT: &str = "/dyad/session/{session_id}/abort";

pub const PARENT_MESSAGE_AUDIO: &str = "/dyad/session/{session_id}/message/parent/message/audio";

pub const CHILD_ADD_CARD: &str = "/dyad/session/{session_id}/message/child/add_card";
pub const CHILD_POP_LAST_CARD: &str = "/dyad/session/{session_id}/message/child/pop_last_card";
pub const CHILD_CONFIRM_CARDS: &str = "/dyad/session/{session_id}/message/child/confirm_cards";

/// Substitute `{name}` placeholders in an endpoint template
pub fn fill(template: &str, values: &[(&str, &str)]) -> String {
    values.iter().fold(template.to_string(), |path, (name, value)| {
        path.replace(&format!("{{{name}}}"), value)
    })
}

/// Endpoint template with the session id filled in
pub fn for_session(template: &str, session_id: &str) -> String {
    fill(template, &[("session_id", session_id)])
}
