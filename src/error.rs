use std::path::PathBuf;

use thiserror::Error;

use crate::session::DialogueRole;

/// Body the backend returns when speech recognition produced no text.
pub const EMPTY_DICTATION_BODY: &str = "EmptyDictation";

/// Body the backend returns when speech recognition failed outright.
pub const DICTATION_FAIL_BODY: &str = "DictationFail";

/// Errors surfaced by the session core to the UI layer
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Speech recognition returned no text")]
    EmptyDictation,

    #[error("Speech recognition failed: {0}")]
    SpeechErrorGeneral(String),

    #[error("No cards selected for the child turn")]
    NotSelectingCards,

    #[error("Recorded audio file is missing: {}", .0.display())]
    MissingAudioFile(PathBuf),

    #[error("Recording device error: {0}")]
    Device(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server responded with {status}: {body}")]
    Server { status: u16, body: String },

    #[error("A recommendation request is already in flight")]
    ProcessingRecommendation,

    #[error("Session is no longer active")]
    SessionClosed,

    #[error("Operation requires the {expected:?} turn, but it is the {actual:?} turn")]
    WrongTurn {
        expected: DialogueRole,
        actual: DialogueRole,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed payload: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SessionError>;

impl SessionError {
    /// Classify a non-success backend response by its raw body.
    ///
    /// The audio endpoint answers speech failures either with the bare error
    /// name or wrapped in a `{"detail": ...}` object.
    pub fn from_server(status: u16, body: String) -> Self {
        let detail = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string))
            .unwrap_or_else(|| body.trim().to_string());

        if detail.contains(EMPTY_DICTATION_BODY) {
            SessionError::EmptyDictation
        } else if detail.contains(DICTATION_FAIL_BODY) {
            SessionError::SpeechErrorGeneral(detail)
        } else {
            SessionError::Server { status, body }
        }
    }

    /// Whether this error came out of the speech/dictation path
    pub fn is_speech_error(&self) -> bool {
        matches!(
            self,
            SessionError::EmptyDictation | SessionError::SpeechErrorGeneral(_)
        )
    }

    /// Translation key of the user-facing message for this error
    pub fn message_key(&self) -> &'static str {
        match self {
            SessionError::EmptyDictation => "ERRORS.EMPTY_DICTATION",
            SessionError::SpeechErrorGeneral(_) => "ERRORS.SPEECH_ERROR_GENERAL",
            SessionError::NotSelectingCards => "ERRORS.NOT_SELECTING_CARDS",
            SessionError::MissingAudioFile(_) | SessionError::Device(_) => {
                "ERRORS.SPEECH_ERROR_GENERAL"
            }
            SessionError::Network(_) | SessionError::Server { .. } => "ERRORS.NETWORK",
            SessionError::ProcessingRecommendation => "ERRORS.PROCESSING",
            SessionError::SessionClosed | SessionError::WrongTurn { .. } => "ERRORS.INVALID_STATE",
            SessionError::Io(_) | SessionError::Json(_) => "ERRORS.GENERAL",
        }
    }
}

impl From<reqwest::Error> for SessionError {
    fn from(err: reqwest::Error) -> Self {
        SessionError::Network(err.to_string())
    }
}
