// Shared fakes for the integration tests
//
// `MockDevice` stands in for the microphone and `MockApi` for the backend,
// both recording what the code under test did to them.

#![allow(dead_code)]

use anyhow::Result;
use dyad_session::api::{
    AudioUpload, CardIdentity, CardInfo, CardSelectionResult, ChildCardRecommendationResult,
    ChildCardsResult, ParentGuideElement, ParentGuideRecommendationResult, ParentMessageResult,
    ResponseWithTurnId, SessionStartResult, SessionTopicInfo,
};
use dyad_session::{
    EncodingConfig, MeterSample, RecorderDevice, RecorderDeviceFactory, RecordingController,
    RecordingSettings, SessionApi, SessionError, UploadPipeline,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Shared view into every `MockDevice` a factory created
#[derive(Default)]
pub struct DeviceProbe {
    pub created: AtomicUsize,
    pub stopped: AtomicUsize,
    pub listeners_removed: AtomicUsize,
    pub fail_start: AtomicBool,
    pub fail_stop: AtomicBool,
    /// Never finish starting
    pub hang_start: AtomicBool,
    /// Return an artifact path without writing the file
    pub skip_artifact: AtomicBool,
    meter_tx: Mutex<Option<mpsc::Sender<MeterSample>>>,
}

impl DeviceProbe {
    /// Push a meter sample as the device would
    pub async fn send_meter(&self, metering: Option<f32>, position_ms: u64) {
        let tx = self.meter_tx.lock().unwrap().clone();
        if let Some(tx) = tx {
            let _ = tx.send(MeterSample { metering, position_ms }).await;
        }
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn listeners_removed(&self) -> usize {
        self.listeners_removed.load(Ordering::SeqCst)
    }
}

pub struct MockDevice {
    probe: Arc<DeviceProbe>,
    target: Option<PathBuf>,
}

#[async_trait::async_trait]
impl RecorderDevice for MockDevice {
    async fn start(
        &mut self,
        target: Option<&Path>,
        _encoding: &EncodingConfig,
        metering: bool,
    ) -> Result<mpsc::Receiver<MeterSample>> {
        if self.probe.fail_start.load(Ordering::SeqCst) {
            anyhow::bail!("Microphone permission denied");
        }
        if self.probe.hang_start.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }

        let (tx, rx) = mpsc::channel(16);
        if metering {
            *self.probe.meter_tx.lock().unwrap() = Some(tx);
        }
        self.target = Some(
            target
                .map(Path::to_path_buf)
                .unwrap_or_else(|| std::env::temp_dir().join("mock-recording.wav")),
        );
        Ok(rx)
    }

    async fn pause(&mut self) -> Result<()> {
        Ok(())
    }

    async fn resume(&mut self) -> Result<()> {
        Ok(())
    }

    async fn stop(&mut self) -> Result<PathBuf> {
        self.probe.stopped.fetch_add(1, Ordering::SeqCst);
        if self.probe.fail_stop.load(Ordering::SeqCst) {
            anyhow::bail!("Recorder crashed");
        }

        let target = self.target.take().ok_or_else(|| anyhow::anyhow!("Not started"))?;
        if !self.probe.skip_artifact.load(Ordering::SeqCst) {
            tokio::fs::write(&target, b"RIFF0000WAVEfmt ").await?;
        }
        Ok(target)
    }

    fn remove_listener(&mut self) {
        self.probe.listeners_removed.fetch_add(1, Ordering::SeqCst);
        self.probe.meter_tx.lock().unwrap().take();
    }

    fn name(&self) -> &str {
        "mock"
    }
}

pub fn device_factory(probe: Arc<DeviceProbe>) -> Arc<dyn RecorderDeviceFactory> {
    Arc::new(move || -> Result<Box<dyn RecorderDevice>> {
        probe.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockDevice {
            probe: Arc::clone(&probe),
            target: None,
        }))
    })
}

/// In-memory backend
#[derive(Default)]
pub struct MockApi {
    calls: Mutex<Vec<String>>,
    uploads: Mutex<Vec<(String, String, usize)>>,
    interim: Mutex<Vec<CardInfo>>,
    turn_seq: AtomicUsize,
    fail_audio: Mutex<Option<SessionError>>,
    fail_confirm: Mutex<Option<SessionError>>,
    fail_end: Mutex<Option<SessionError>>,
    pub fail_abort: AtomicBool,
    /// Audio submissions never answer
    pub hang_audio: AtomicBool,
    /// Card picks never answer
    pub hang_cards: AtomicBool,
}

impl MockApi {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == call).count()
    }

    /// (session id, turn id, byte count) of every audio submission
    pub fn uploads(&self) -> Vec<(String, String, usize)> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn fail_next_audio(&self, err: SessionError) {
        *self.fail_audio.lock().unwrap() = Some(err);
    }

    pub fn fail_next_confirm(&self, err: SessionError) {
        *self.fail_confirm.lock().unwrap() = Some(err);
    }

    pub fn fail_next_end(&self, err: SessionError) {
        *self.fail_end.lock().unwrap() = Some(err);
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }

    fn next_turn_id(&self) -> String {
        format!("turn-{}", self.turn_seq.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn selection(&self) -> CardSelectionResult {
        CardSelectionResult {
            interim_cards: self.interim.lock().unwrap().clone(),
            new_recommendation: child_cards(3),
        }
    }
}

#[async_trait::async_trait]
impl SessionApi for MockApi {
    async fn create_session(&self, _topic: &SessionTopicInfo) -> dyad_session::Result<String> {
        self.record("new");
        Ok("session-1".to_string())
    }

    async fn start_session(&self, _session_id: &str) -> dyad_session::Result<SessionStartResult> {
        self.record("start");
        Ok(SessionStartResult {
            parent_guides: parent_guides(),
            turn_id: "turn-0".to_string(),
        })
    }

    async fn submit_parent_audio(
        &self,
        session_id: &str,
        turn_id: &str,
        upload: AudioUpload,
    ) -> dyad_session::Result<ParentMessageResult> {
        self.record("audio");
        self.uploads.lock().unwrap().push((
            session_id.to_string(),
            turn_id.to_string(),
            upload.bytes.len(),
        ));
        if self.hang_audio.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if let Some(err) = self.fail_audio.lock().unwrap().take() {
            return Err(err);
        }
        Ok(ResponseWithTurnId {
            payload: child_cards(3),
            next_turn_id: self.next_turn_id(),
        })
    }

    async fn append_child_card(
        &self,
        _session_id: &str,
        card: &CardIdentity,
    ) -> dyad_session::Result<CardSelectionResult> {
        self.record("add_card");
        if self.hang_cards.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.interim.lock().unwrap().push(CardInfo {
            id: card.id.clone(),
            recommendation_id: card.recommendation_id.clone(),
            text: format!("card {}", card.id),
            localized: None,
            category: "noun".to_string(),
        });
        Ok(self.selection())
    }

    async fn pop_last_child_card(&self, _session_id: &str) -> dyad_session::Result<CardSelectionResult> {
        self.record("pop_last_card");
        self.interim.lock().unwrap().pop();
        Ok(self.selection())
    }

    async fn confirm_child_cards(&self, _session_id: &str) -> dyad_session::Result<ChildCardsResult> {
        self.record("confirm_cards");
        if let Some(err) = self.fail_confirm.lock().unwrap().take() {
            return Err(err);
        }
        self.interim.lock().unwrap().clear();
        Ok(ResponseWithTurnId {
            payload: parent_guides(),
            next_turn_id: self.next_turn_id(),
        })
    }

    async fn end_session(&self, _session_id: &str) -> dyad_session::Result<()> {
        self.record("end");
        match self.fail_end.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn abort_session(&self, _session_id: &str) -> dyad_session::Result<()> {
        self.record("abort");
        if self.fail_abort.load(Ordering::SeqCst) {
            return Err(SessionError::Network("connection refused".to_string()));
        }
        Ok(())
    }
}

pub fn child_cards(n: usize) -> ChildCardRecommendationResult {
    ChildCardRecommendationResult {
        id: "rec-child".to_string(),
        timestamp: 1_700_000_000_000,
        cards: (0..n)
            .map(|i| CardInfo {
                id: i.to_string(),
                recommendation_id: "rec-child".to_string(),
                text: format!("card {i}"),
                localized: None,
                category: "noun".to_string(),
            })
            .collect(),
    }
}

pub fn parent_guides() -> ParentGuideRecommendationResult {
    ParentGuideRecommendationResult {
        id: "rec-parent".to_string(),
        timestamp: 1_700_000_000_000,
        guides: vec![ParentGuideElement {
            id: "0".to_string(),
            category: serde_json::json!("intention"),
            guide_type: "static".to_string(),
            guide: "Ask what happened today".to_string(),
            guide_localized: None,
        }],
    }
}

pub fn topic() -> SessionTopicInfo {
    SessionTopicInfo {
        category: "free".to_string(),
        subtopic: None,
        subdescription: None,
    }
}

pub fn recorder(probe: &Arc<DeviceProbe>, api: &Arc<MockApi>, cache_dir: &Path) -> RecordingController {
    let api: Arc<dyn SessionApi> = api.clone();
    RecordingController::new(
        device_factory(Arc::clone(probe)),
        UploadPipeline::new(api),
        RecordingSettings {
            cache_dir: cache_dir.to_path_buf(),
            encoding: EncodingConfig::default(),
        },
    )
}

/// Poll `check` until it holds or a second has passed
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
