use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::session::{DialogueSession, Recommendation, SessionPhase};
use super::stats::SessionStats;
use super::turn::DialogueRole;
use crate::api::{CardIdentity, CardSelectionResult, SessionApi, SessionTopicInfo};
use crate::error::{Result, SessionError};
use crate::recording::RecordingController;

/// Asks the user whether to end and save a session
#[async_trait::async_trait]
pub trait TerminationPrompt: Send + Sync {
    async fn confirm_termination(&self, num_stars: u32) -> bool;
}

/// Answers every termination prompt the same way
pub struct AutoConfirm(pub bool);

#[async_trait::async_trait]
impl TerminationPrompt for AutoConfirm {
    async fn confirm_termination(&self, _num_stars: u32) -> bool {
        self.0
    }
}

/// How a termination request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationOutcome {
    /// Too little happened to keep; discarded without asking
    Cancelled,
    /// The user chose to keep going
    Declined,
    /// Persisted on the server
    Closed { num_stars: u32 },
}

/// Drives one dialogue session: recording, card picks, turn advancement and termination
pub struct SessionDriver {
    pub(super) session: DialogueSession,
    pub(super) recorder: RecordingController,
    pub(super) api: Arc<dyn SessionApi>,
}

impl SessionDriver {
    pub fn new(session: DialogueSession, recorder: RecordingController, api: Arc<dyn SessionApi>) -> Self {
        Self {
            session,
            recorder,
            api,
        }
    }

    /// Create and start a session on the server
    pub async fn open(
        api: Arc<dyn SessionApi>,
        recorder: RecordingController,
        topic: SessionTopicInfo,
    ) -> Result<Self> {
        let session_id = api.create_session(&topic).await?;
        let start = api.start_session(&session_id).await?;

        let mut session = DialogueSession::new(session_id, start.turn_id, topic);
        session.set_recommendation(Recommendation::ParentGuides(start.parent_guides));

        Ok(Self::new(session, recorder, api))
    }

    pub fn session(&self) -> &DialogueSession {
        &self.session
    }

    pub fn recorder(&self) -> &RecordingController {
        &self.recorder
    }

    pub fn stats(&self) -> SessionStats {
        self.session.stats()
    }

    /// Start recording the parent's utterance for the current turn
    pub async fn start_recording(&self, started_at: Option<DateTime<Utc>>) -> Result<()> {
        self.ensure_parent_input()?;
        self.recorder.start(self.session.current_turn(), started_at).await
    }

    pub async fn pause_recording(&self) -> Result<()> {
        self.ensure_parent_input()?;
        self.recorder.pause().await
    }

    pub async fn resume_recording(&self) -> Result<()> {
        self.ensure_parent_input()?;
        self.recorder.resume().await
    }

    fn ensure_parent_input(&self) -> Result<()> {
        self.session.ensure_active()?;
        self.session.ensure_role(DialogueRole::Parent)?;
        self.session.ensure_idle()
    }

    /// Add a card to the child's interim selection
    pub async fn select_card(&mut self, card: &CardIdentity) -> Result<()> {
        self.ensure_child_input()?;

        let guard = self.session.recommendation_guard()?;
        let result = self.api.append_child_card(guard.id(), card).await;
        drop(guard);

        self.apply_selection(result?);
        Ok(())
    }

    /// Remove the most recent card from the child's interim selection
    pub async fn pop_last_card(&mut self) -> Result<()> {
        self.ensure_child_input()?;

        let guard = self.session.recommendation_guard()?;
        let result = self.api.pop_last_child_card(guard.id()).await;
        drop(guard);

        self.apply_selection(result?);
        Ok(())
    }

    fn ensure_child_input(&self) -> Result<()> {
        self.session.ensure_active()?;
        self.session.ensure_role(DialogueRole::Child)?;
        self.session.ensure_idle()
    }

    fn apply_selection(&mut self, selection: CardSelectionResult) {
        info!(
            "Child selection now {} cards, {} new recommendations",
            selection.interim_cards.len(),
            selection.new_recommendation.cards.len()
        );
        self.session.cards_mut().set_pending(selection.interim_cards);
        self.session
            .set_recommendation(Recommendation::ChildCards(selection.new_recommendation));
    }

    /// Discard the session without persisting it
    ///
    /// Any recording in progress is stopped and deleted. Server-side cleanup
    /// is best effort.
    pub async fn cancel(&mut self) -> Result<()> {
        if matches!(
            self.session.phase(),
            SessionPhase::Cancelled | SessionPhase::Closed { .. }
        ) {
            info!("Session {} already finished, ignoring cancel", self.session.id());
            return Ok(());
        }

        self.discard_recording().await;
        self.session.mark_cancelled();
        info!("Session {} cancelled", self.session.id());

        if let Err(e) = self.api.abort_session(self.session.id()).await {
            warn!("Failed to abort session {} on server: {}", self.session.id(), e);
        }
        Ok(())
    }

    /// End the session at the user's request
    ///
    /// With at most one turn taken the session is silently cancelled.
    /// Otherwise the prompt must confirm before the session is persisted.
    /// A session left in Closing by a failed persist is retried without
    /// prompting again.
    pub async fn request_termination(&mut self, prompt: &dyn TerminationPrompt) -> Result<TerminationOutcome> {
        match self.session.phase() {
            SessionPhase::Cancelled | SessionPhase::Closed { .. } => {
                return Err(SessionError::SessionClosed);
            }
            SessionPhase::Closing { .. } => return self.persist_close().await,
            SessionPhase::Active => {}
        }

        if self.session.num_turns() <= 1 {
            info!("Nothing to keep yet, terminating session {} without asking", self.session.id());
            self.cancel().await?;
            return Ok(TerminationOutcome::Cancelled);
        }

        let num_stars = self.session.num_stars();
        if !prompt.confirm_termination(num_stars).await {
            info!("Termination of session {} declined", self.session.id());
            return Ok(TerminationOutcome::Declined);
        }

        self.discard_recording().await;
        self.session.begin_closing();
        self.persist_close().await
    }

    async fn persist_close(&mut self) -> Result<TerminationOutcome> {
        if let Err(e) = self.api.end_session(self.session.id()).await {
            error!("Failed to persist session {}: {}", self.session.id(), e);
            return Err(e);
        }

        let num_stars = self.session.mark_closed();
        info!("Session {} closed with {} stars", self.session.id(), num_stars);
        Ok(TerminationOutcome::Closed { num_stars })
    }

    async fn discard_recording(&self) {
        if let Err(e) = self.recorder.stop(true).await {
            warn!("Failed to discard recording: {}", e);
        }
    }
}
