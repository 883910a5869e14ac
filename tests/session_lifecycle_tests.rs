// Integration tests for cancelling and terminating sessions

mod common;

use anyhow::Result;
use common::{recorder, topic, DeviceProbe, MockApi};
use dyad_session::api::SessionApi;
use dyad_session::session::Recommendation;
use dyad_session::{
    AutoConfirm, RecordingStatus, SessionDriver, SessionError, SessionPhase, TerminationOutcome,
    TerminationPrompt,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Prompt that counts how often it was asked
struct CountingPrompt {
    answer: bool,
    asked: AtomicUsize,
    last_stars: AtomicUsize,
}

impl CountingPrompt {
    fn new(answer: bool) -> Self {
        Self {
            answer,
            asked: AtomicUsize::new(0),
            last_stars: AtomicUsize::new(0),
        }
    }

    fn asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl TerminationPrompt for CountingPrompt {
    async fn confirm_termination(&self, num_stars: u32) -> bool {
        self.asked.fetch_add(1, Ordering::SeqCst);
        self.last_stars.store(num_stars as usize, Ordering::SeqCst);
        self.answer
    }
}

struct Fixture {
    _temp_dir: TempDir,
    api: Arc<MockApi>,
    driver: SessionDriver,
}

async fn open_session() -> Result<Fixture> {
    let temp_dir = TempDir::new()?;
    let probe = Arc::new(DeviceProbe::default());
    let api = Arc::new(MockApi::default());
    let controller = recorder(&probe, &api, temp_dir.path());
    let session_api: Arc<dyn SessionApi> = api.clone();

    let driver = SessionDriver::open(session_api, controller, topic()).await?;
    Ok(Fixture {
        _temp_dir: temp_dir,
        api,
        driver,
    })
}

async fn play_parent_turn(driver: &mut SessionDriver) -> Result<()> {
    driver.start_recording(None).await?;
    assert!(driver.advance(&mut ()).await?.is_advanced());
    Ok(())
}

async fn play_child_turn(driver: &mut SessionDriver) -> Result<()> {
    let card = match driver.session().recommendation() {
        Some(Recommendation::ChildCards(rec)) => rec.cards[0].identity(),
        other => panic!("Expected card recommendations, got {other:?}"),
    };
    driver.select_card(&card).await?;
    assert!(driver.advance(&mut ()).await?.is_advanced());
    Ok(())
}

#[tokio::test]
async fn test_fresh_session_terminates_without_prompt() -> Result<()> {
    let mut fx = open_session().await?;
    let prompt = CountingPrompt::new(true);

    let outcome = fx.driver.request_termination(&prompt).await?;

    assert_eq!(outcome, TerminationOutcome::Cancelled);
    assert_eq!(prompt.asked(), 0);
    assert_eq!(fx.driver.session().phase(), SessionPhase::Cancelled);
    assert_eq!(fx.api.count("abort"), 1);
    assert_eq!(fx.api.count("end"), 0);

    Ok(())
}

#[tokio::test]
async fn test_single_turn_session_terminates_without_prompt() -> Result<()> {
    let mut fx = open_session().await?;
    let prompt = CountingPrompt::new(false);
    play_parent_turn(&mut fx.driver).await?;

    let outcome = fx.driver.request_termination(&prompt).await?;

    assert_eq!(outcome, TerminationOutcome::Cancelled);
    assert_eq!(prompt.asked(), 0);
    assert_eq!(fx.driver.session().phase(), SessionPhase::Cancelled);

    Ok(())
}

#[tokio::test]
async fn test_longer_session_requires_confirmation() -> Result<()> {
    let mut fx = open_session().await?;
    play_parent_turn(&mut fx.driver).await?;
    play_child_turn(&mut fx.driver).await?;
    play_parent_turn(&mut fx.driver).await?;

    let decline = CountingPrompt::new(false);
    let outcome = fx.driver.request_termination(&decline).await?;
    assert_eq!(outcome, TerminationOutcome::Declined);
    assert_eq!(decline.asked(), 1);
    assert_eq!(decline.last_stars.load(Ordering::SeqCst), 1);
    assert_eq!(fx.driver.session().phase(), SessionPhase::Active);
    assert_eq!(fx.api.count("end"), 0);

    // Declining leaves the session playable
    play_child_turn(&mut fx.driver).await?;

    let confirm = CountingPrompt::new(true);
    let outcome = fx.driver.request_termination(&confirm).await?;
    assert_eq!(outcome, TerminationOutcome::Closed { num_stars: 2 });
    assert_eq!(fx.driver.session().phase(), SessionPhase::Closed { num_stars: 2 });
    assert_eq!(fx.api.count("end"), 1);
    assert_eq!(fx.api.count("abort"), 0);

    Ok(())
}

#[tokio::test]
async fn test_failed_persist_is_retried_without_prompt() -> Result<()> {
    let mut fx = open_session().await?;
    play_parent_turn(&mut fx.driver).await?;
    play_child_turn(&mut fx.driver).await?;

    fx.api
        .fail_next_end(SessionError::Server {
            status: 503,
            body: "Unavailable".to_string(),
        });
    let err = fx
        .driver
        .request_termination(&AutoConfirm(true))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Server { status: 503, .. }), "got {err:?}");
    assert_eq!(fx.driver.session().phase(), SessionPhase::Closing { num_stars: 1 });

    // No further turns while closing
    let err = fx.driver.advance(&mut ()).await.unwrap_err();
    assert!(matches!(err, SessionError::SessionClosed));

    let prompt = CountingPrompt::new(false);
    let outcome = fx.driver.request_termination(&prompt).await?;
    assert_eq!(outcome, TerminationOutcome::Closed { num_stars: 1 });
    assert_eq!(prompt.asked(), 0, "Confirmation is not asked twice");
    assert_eq!(fx.api.count("end"), 2);

    Ok(())
}

#[tokio::test]
async fn test_finished_session_rejects_further_requests() -> Result<()> {
    let mut fx = open_session().await?;
    play_parent_turn(&mut fx.driver).await?;
    play_child_turn(&mut fx.driver).await?;
    fx.driver.request_termination(&AutoConfirm(true)).await?;

    let err = fx
        .driver
        .request_termination(&AutoConfirm(true))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::SessionClosed));

    let err = fx.driver.start_recording(None).await.unwrap_err();
    assert!(matches!(err, SessionError::SessionClosed));

    // Cancelling a closed session changes nothing
    fx.driver.cancel().await?;
    assert_eq!(fx.driver.session().phase(), SessionPhase::Closed { num_stars: 1 });
    assert_eq!(fx.api.count("abort"), 0);

    Ok(())
}

#[tokio::test]
async fn test_cancel_discards_recording_in_progress() -> Result<()> {
    let mut fx = open_session().await?;
    fx.driver.start_recording(None).await?;
    let artifact = fx
        .driver
        .recorder()
        .snapshot()
        .await
        .artifact
        .expect("Recording should have a target");

    fx.driver.cancel().await?;

    assert_eq!(fx.driver.recorder().status().await, RecordingStatus::Initial);
    assert!(!artifact.exists());
    assert!(fx.api.uploads().is_empty());
    assert_eq!(fx.driver.session().phase(), SessionPhase::Cancelled);
    assert_eq!(fx.api.count("abort"), 1);

    // Cancelling again is a no-op
    fx.driver.cancel().await?;
    assert_eq!(fx.api.count("abort"), 1);

    Ok(())
}

#[tokio::test]
async fn test_cancel_survives_abort_failure() -> Result<()> {
    let mut fx = open_session().await?;
    fx.api.fail_abort.store(true, Ordering::SeqCst);

    fx.driver.cancel().await?;

    assert_eq!(fx.driver.session().phase(), SessionPhase::Cancelled);
    assert_eq!(fx.api.count("abort"), 1);

    Ok(())
}

#[tokio::test]
async fn test_termination_drops_unsent_recording() -> Result<()> {
    let mut fx = open_session().await?;
    play_parent_turn(&mut fx.driver).await?;
    play_child_turn(&mut fx.driver).await?;
    fx.driver.start_recording(None).await?;

    let outcome = fx.driver.request_termination(&AutoConfirm(true)).await?;

    assert_eq!(outcome, TerminationOutcome::Closed { num_stars: 1 });
    assert_eq!(fx.api.uploads().len(), 1, "Only the completed parent turn was uploaded");
    assert_eq!(fx.driver.recorder().status().await, RecordingStatus::Initial);

    let stats = fx.driver.stats();
    assert_eq!(stats.num_turns, 2);
    assert_eq!(stats.num_stars, 1);
    assert_eq!(stats.phase, SessionPhase::Closed { num_stars: 1 });

    Ok(())
}
