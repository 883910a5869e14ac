use serde::{Deserialize, Serialize};

/// Who owns a dialogue turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialogueRole {
    Parent,
    Child,
}

impl DialogueRole {
    /// The role that owns the following turn
    pub fn next(self) -> Self {
        match self {
            DialogueRole::Parent => DialogueRole::Child,
            DialogueRole::Child => DialogueRole::Parent,
        }
    }
}

/// One alternating unit of dialogue, correlated with server-side records by `turn_id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueTurn {
    pub session_id: String,
    pub turn_id: String,
    pub role: DialogueRole,
}

impl DialogueTurn {
    pub fn new(session_id: impl Into<String>, turn_id: impl Into<String>, role: DialogueRole) -> Self {
        Self {
            session_id: session_id.into(),
            turn_id: turn_id.into(),
            role,
        }
    }

    /// The turn that supersedes this one
    pub fn next(&self, turn_id: String) -> Self {
        Self {
            session_id: self.session_id.clone(),
            turn_id,
            role: self.role.next(),
        }
    }
}
