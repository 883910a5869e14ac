use tracing::{error, info, warn};

use super::driver::SessionDriver;
use super::session::Recommendation;
use super::turn::DialogueRole;
use crate::error::{Result, SessionError};
use crate::recording::StopOutcome;

/// UI hooks invoked while advancing a turn
pub trait TurnObserver: Send {
    /// The turn owned by `role` was handed over
    fn on_go_next(&mut self, _role: DialogueRole) {}

    /// The turn owned by `role` could not be handed over
    fn on_go_next_fail(&mut self, _role: DialogueRole, _reason: &SessionError) {}

    /// The turn was handed over, but something the user should know went wrong
    fn on_warning(&mut self, _warning: &SessionError) {}
}

impl TurnObserver for () {}

/// Result of an `advance()` call
#[derive(Debug)]
pub enum AdvanceOutcome {
    Advanced {
        from: DialogueRole,
        warning: Option<SessionError>,
    },
    Blocked {
        role: DialogueRole,
        reason: SessionError,
    },
}

impl AdvanceOutcome {
    pub fn is_advanced(&self) -> bool {
        matches!(self, AdvanceOutcome::Advanced { .. })
    }
}

impl SessionDriver {
    /// Hand the floor to the other role if the current turn allows it
    ///
    /// A parent turn always advances; speech failures come back as warnings.
    /// A child turn advances only with at least one card selected.
    pub async fn advance(&mut self, observer: &mut dyn TurnObserver) -> Result<AdvanceOutcome> {
        self.session.ensure_active()?;

        let role = self.session.current_role();
        if self.session.is_processing_recommendation() {
            let reason = SessionError::ProcessingRecommendation;
            warn!("Cannot advance {:?} turn: {}", role, reason);
            observer.on_go_next_fail(role, &reason);
            return Ok(AdvanceOutcome::Blocked { role, reason });
        }

        match role {
            DialogueRole::Parent => self.advance_parent(observer).await,
            DialogueRole::Child => self.advance_child(observer).await,
        }
    }

    async fn advance_parent(&mut self, observer: &mut dyn TurnObserver) -> Result<AdvanceOutcome> {
        let guard = self.session.recommendation_guard()?;
        let stopped = self.recorder.stop(false).await;
        drop(guard);

        let (next_turn_id, warning) = match stopped {
            Ok(StopOutcome::Submitted(result)) => {
                self.session
                    .set_recommendation(Recommendation::ChildCards(result.payload));
                (Some(result.next_turn_id), None)
            }
            Ok(StopOutcome::Ignored) | Ok(StopOutcome::Discarded { .. }) => {
                warn!("Parent turn advanced without an upload, next turn id is local");
                (None, None)
            }
            Err(SessionError::EmptyDictation) => (None, Some(SessionError::EmptyDictation)),
            Err(e @ SessionError::SpeechErrorGeneral(_)) => (None, Some(e)),
            Err(e) => (None, Some(SessionError::SpeechErrorGeneral(e.to_string()))),
        };

        if let Some(warning) = &warning {
            warn!("Parent turn advanced despite speech error: {}", warning);
            observer.on_warning(warning);
        }

        self.session.on_turn_advanced(next_turn_id);
        observer.on_go_next(DialogueRole::Parent);

        Ok(AdvanceOutcome::Advanced {
            from: DialogueRole::Parent,
            warning,
        })
    }

    async fn advance_child(&mut self, observer: &mut dyn TurnObserver) -> Result<AdvanceOutcome> {
        if !self.session.cards().can_confirm() {
            let reason = SessionError::NotSelectingCards;
            info!("Child turn has no selected cards, not advancing");
            observer.on_go_next_fail(DialogueRole::Child, &reason);
            return Ok(AdvanceOutcome::Blocked {
                role: DialogueRole::Child,
                reason,
            });
        }

        let count = self.session.cards_mut().commit();
        info!("Confirming {} child cards", count);

        let guard = self.session.recommendation_guard()?;
        let confirmed = self.api.confirm_child_cards(guard.id()).await;
        drop(guard);

        match confirmed {
            Ok(result) => {
                self.session
                    .set_recommendation(Recommendation::ParentGuides(result.payload));
                self.session.on_turn_advanced(Some(result.next_turn_id));
                observer.on_go_next(DialogueRole::Child);

                Ok(AdvanceOutcome::Advanced {
                    from: DialogueRole::Child,
                    warning: None,
                })
            }
            Err(e) => {
                error!("Failed to confirm child cards: {}", e);
                self.session.cards_mut().restore();
                Err(e)
            }
        }
    }
}
