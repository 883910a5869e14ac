use chrono::{DateTime, Utc};
use serde::Serialize;
use std::ops::Deref;
use tracing::{debug, info};

use super::cards::CardSelection;
use super::stats::SessionStats;
use super::turn::{DialogueRole, DialogueTurn};
use crate::api::{ChildCardRecommendationResult, ParentGuideRecommendationResult, SessionTopicInfo};
use crate::error::{Result, SessionError};

/// Where a session is in its lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum SessionPhase {
    Active,
    /// Termination confirmed; waiting for the server to persist the session
    Closing { num_stars: u32 },
    Closed { num_stars: u32 },
    /// Discarded without persistence
    Cancelled,
}

/// Latest server-generated suggestions for the current turn
#[derive(Debug, Clone, PartialEq)]
pub enum Recommendation {
    ParentGuides(ParentGuideRecommendationResult),
    ChildCards(ChildCardRecommendationResult),
}

/// Clears the recommendation flag on drop, however the request ended
pub struct RecommendationGuard<'a> {
    session: &'a mut DialogueSession,
}

impl Deref for RecommendationGuard<'_> {
    type Target = DialogueSession;

    fn deref(&self) -> &DialogueSession {
        self.session
    }
}

impl Drop for RecommendationGuard<'_> {
    fn drop(&mut self) {
        self.session.end_recommendation();
    }
}

/// Authoritative turn/role state of one dyad conversation
#[derive(Debug, Clone)]
pub struct DialogueSession {
    id: String,
    topic: SessionTopicInfo,
    started_at: DateTime<Utc>,
    num_turns: u32,
    current_turn: DialogueTurn,
    is_processing_recommendation: bool,
    phase: SessionPhase,
    cards: CardSelection,
    recommendation: Option<Recommendation>,
}

impl DialogueSession {
    /// A fresh session; the parent speaks first
    pub fn new(id: impl Into<String>, first_turn_id: impl Into<String>, topic: SessionTopicInfo) -> Self {
        let id = id.into();
        let current_turn = DialogueTurn::new(id.clone(), first_turn_id, DialogueRole::Parent);
        info!("Session {} started with turn {}", id, current_turn.turn_id);

        Self {
            id,
            topic,
            started_at: Utc::now(),
            num_turns: 0,
            current_turn,
            is_processing_recommendation: false,
            phase: SessionPhase::Active,
            cards: CardSelection::default(),
            recommendation: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn topic(&self) -> &SessionTopicInfo {
        &self.topic
    }

    pub fn num_turns(&self) -> u32 {
        self.num_turns
    }

    pub fn current_turn(&self) -> &DialogueTurn {
        &self.current_turn
    }

    pub fn current_role(&self) -> DialogueRole {
        self.current_turn.role
    }

    pub fn is_processing_recommendation(&self) -> bool {
        self.is_processing_recommendation
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase == SessionPhase::Active
    }

    pub fn cards(&self) -> &CardSelection {
        &self.cards
    }

    pub fn cards_mut(&mut self) -> &mut CardSelection {
        &mut self.cards
    }

    pub fn recommendation(&self) -> Option<&Recommendation> {
        self.recommendation.as_ref()
    }

    pub fn set_recommendation(&mut self, recommendation: Recommendation) {
        self.recommendation = Some(recommendation);
    }

    /// Stars earned so far: one per completed parent/child exchange
    pub fn num_stars(&self) -> u32 {
        self.num_turns / 2
    }

    pub fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(SessionError::SessionClosed)
        }
    }

    pub fn ensure_role(&self, expected: DialogueRole) -> Result<()> {
        let actual = self.current_role();
        if actual == expected {
            Ok(())
        } else {
            Err(SessionError::WrongTurn { expected, actual })
        }
    }

    pub fn ensure_idle(&self) -> Result<()> {
        if self.is_processing_recommendation {
            Err(SessionError::ProcessingRecommendation)
        } else {
            Ok(())
        }
    }

    /// Mark a recommendation request as in flight
    pub fn begin_recommendation(&mut self) -> Result<()> {
        self.ensure_idle()?;
        self.is_processing_recommendation = true;
        debug!("Session {} awaiting recommendation", self.id);
        Ok(())
    }

    pub fn end_recommendation(&mut self) {
        self.is_processing_recommendation = false;
    }

    /// Mark a recommendation request as in flight until the guard drops
    pub fn recommendation_guard(&mut self) -> Result<RecommendationGuard<'_>> {
        self.begin_recommendation()?;
        Ok(RecommendationGuard { session: self })
    }

    /// Hand the floor to the other role
    ///
    /// Uses the server-assigned id for the next turn when there is one.
    pub fn on_turn_advanced(&mut self, next_turn_id: Option<String>) -> &DialogueTurn {
        let turn_id = next_turn_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        self.num_turns += 1;
        self.current_turn = self.current_turn.next(turn_id);
        if self.current_turn.role == DialogueRole::Child {
            self.cards.clear();
        }

        info!(
            "Session {} advanced to turn {} ({:?}), {} turns so far",
            self.id, self.current_turn.turn_id, self.current_turn.role, self.num_turns
        );
        &self.current_turn
    }

    pub fn mark_cancelled(&mut self) {
        self.phase = SessionPhase::Cancelled;
        self.is_processing_recommendation = false;
    }

    /// Enter the closing phase; returns the star count being persisted
    pub fn begin_closing(&mut self) -> u32 {
        let num_stars = self.num_stars();
        self.phase = SessionPhase::Closing { num_stars };
        num_stars
    }

    pub fn mark_closed(&mut self) -> u32 {
        let num_stars = match self.phase {
            SessionPhase::Closing { num_stars } | SessionPhase::Closed { num_stars } => num_stars,
            _ => self.num_stars(),
        };
        self.phase = SessionPhase::Closed { num_stars };
        num_stars
    }

    /// Get current session statistics
    pub fn stats(&self) -> SessionStats {
        let duration = Utc::now().signed_duration_since(self.started_at);

        SessionStats {
            session_id: self.id.clone(),
            started_at: self.started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            num_turns: self.num_turns,
            num_stars: self.num_stars(),
            current_role: self.current_role(),
            phase: self.phase,
            is_processing_recommendation: self.is_processing_recommendation,
        }
    }
}
