//! Dialogue session management
//!
//! This module provides the turn-based session core:
//! - `DialogueSession`: identity, turn count, current role and phase
//! - `SessionDriver`: recording, card selection, cancel and termination
//! - `advance()`: the gate deciding whether the current turn may hand over

mod cards;
mod driver;
mod gate;
mod session;
mod stats;
mod turn;

pub use cards::CardSelection;
pub use driver::{AutoConfirm, SessionDriver, TerminationOutcome, TerminationPrompt};
pub use gate::{AdvanceOutcome, TurnObserver};
pub use session::{DialogueSession, Recommendation, RecommendationGuard, SessionPhase};
pub use stats::SessionStats;
pub use turn::{DialogueRole, DialogueTurn};
