use chrono::{DateTime, Utc};
use serde::Serialize;

use super::session::SessionPhase;
use super::turn::DialogueRole;

/// Statistics about a dialogue session
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub session_id: String,

    /// When the session started
    pub started_at: DateTime<Utc>,

    /// Total duration in seconds
    pub duration_secs: f64,

    /// Number of turns advanced so far
    pub num_turns: u32,

    /// Stars shown to the dyad (`num_turns / 2`)
    pub num_stars: u32,

    pub current_role: DialogueRole,

    pub phase: SessionPhase,

    pub is_processing_recommendation: bool,
}
