use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::upload::UploadPipeline;
use crate::api::ParentMessageResult;
use crate::audio::{EncodingConfig, MeterSample, RecorderDevice, RecorderDeviceFactory};
use crate::error::{Result, SessionError};
use crate::session::DialogueTurn;

/// Subdirectory of the cache dir that holds recorded turns
pub const RECORDING_DIR: &str = "audio_recording";

/// Lifecycle of the capture device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordingStatus {
    Initial,
    Preparing,
    Recording,
    Paused,
    Stopping,
}

impl RecordingStatus {
    /// Whether a device is capturing (possibly paused) and can be stopped
    pub fn is_capturing(self) -> bool {
        matches!(self, RecordingStatus::Recording | RecordingStatus::Paused)
    }
}

/// Observable state of the current recording
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordingSession {
    pub status: RecordingStatus,
    pub started_at: Option<DateTime<Utc>>,
    /// Last position reported by the device
    pub duration_millis: u64,
    /// Last signal level while recording, in dBFS
    pub meter_level: Option<f32>,
    pub turn: Option<DialogueTurn>,
    pub artifact: Option<PathBuf>,
}

impl Default for RecordingSession {
    fn default() -> Self {
        Self {
            status: RecordingStatus::Initial,
            started_at: None,
            duration_millis: 0,
            meter_level: None,
            turn: None,
            artifact: None,
        }
    }
}

impl RecordingSession {
    pub fn is_active(&self) -> bool {
        self.status != RecordingStatus::Initial
    }

    fn set_status(&mut self, status: RecordingStatus) {
        self.status = status;
        if matches!(status, RecordingStatus::Stopping | RecordingStatus::Initial) {
            self.meter_level = None;
        }
    }

    fn apply_meter(&mut self, sample: MeterSample) {
        if self.status != RecordingStatus::Recording {
            return;
        }
        self.meter_level = sample.metering;
        self.duration_millis = sample.position_ms;
    }
}

/// Where recordings go and how they are encoded
#[derive(Debug, Clone)]
pub struct RecordingSettings {
    pub cache_dir: PathBuf,
    pub encoding: EncodingConfig,
}

impl RecordingSettings {
    pub fn recording_dir(&self) -> PathBuf {
        self.cache_dir.join(RECORDING_DIR)
    }
}

/// Result of a `stop()` call
#[derive(Debug)]
pub enum StopOutcome {
    /// Nothing was recording
    Ignored,
    /// The recording was cancelled and its artifact deleted
    Discarded { artifact: PathBuf },
    /// The recording was uploaded for its turn
    Submitted(ParentMessageResult),
}

struct Inner {
    factory: Arc<dyn RecorderDeviceFactory>,
    upload: UploadPipeline,
    settings: RecordingSettings,
    state: Arc<Mutex<RecordingSession>>,
    device: Mutex<Option<Box<dyn RecorderDevice>>>,
    meter_task: Mutex<Option<JoinHandle<()>>>,
    transitions: broadcast::Sender<RecordingStatus>,
}

impl Inner {
    fn transition(&self, state: &mut RecordingSession, status: RecordingStatus) {
        debug!("Recording status {:?} -> {:?}", state.status, status);
        state.set_status(status);
        // No subscribers is fine
        let _ = self.transitions.send(status);
    }

    /// Abort the meter task, detach the listener, drop the device, back to Initial
    async fn release(&self, device: Option<Box<dyn RecorderDevice>>) {
        if let Some(task) = self.meter_task.lock().await.take() {
            task.abort();
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!("Meter listener failed: {}", e);
                }
            }
        }

        let stored = self.device.lock().await.take();
        if let Some(mut device) = device.or(stored) {
            device.remove_listener();
            debug!("Released recorder {}", device.name());
        }

        let mut state = self.state.lock().await;
        state.turn = None;
        self.transition(&mut state, RecordingStatus::Initial);
    }
}

/// Owns the teardown of a start or stop in flight
///
/// Releasing runs on a spawned task, so it completes even when the caller
/// drops the future. Dropping the guard while armed releases in the background.
struct Teardown {
    inner: Arc<Inner>,
    device: Option<Box<dyn RecorderDevice>>,
    armed: bool,
}

impl Teardown {
    fn new(inner: &Arc<Inner>) -> Self {
        Self {
            inner: Arc::clone(inner),
            device: None,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }

    fn spawn_release(&mut self) -> JoinHandle<()> {
        self.armed = false;
        let inner = Arc::clone(&self.inner);
        let device = self.device.take();
        tokio::spawn(async move { inner.release(device).await })
    }

    async fn release(mut self) {
        if let Err(e) = self.spawn_release().await {
            error!("Recorder release failed: {}", e);
        }
    }
}

impl Drop for Teardown {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!("Recording call abandoned, releasing recorder in the background");
        if Handle::try_current().is_ok() {
            drop(self.spawn_release());
        } else {
            error!("No runtime to release the recorder on");
        }
    }
}

/// Guarded start/pause/resume/stop over one exclusive capture device
///
/// Cloning yields another handle to the same controller. Lock order is
/// always state before device.
#[derive(Clone)]
pub struct RecordingController {
    inner: Arc<Inner>,
}

impl RecordingController {
    pub fn new(
        factory: Arc<dyn RecorderDeviceFactory>,
        upload: UploadPipeline,
        settings: RecordingSettings,
    ) -> Self {
        let (transitions, _) = broadcast::channel(32);

        Self {
            inner: Arc::new(Inner {
                factory,
                upload,
                settings,
                state: Arc::new(Mutex::new(RecordingSession::default())),
                device: Mutex::new(None),
                meter_task: Mutex::new(None),
                transitions,
            }),
        }
    }

    pub fn settings(&self) -> &RecordingSettings {
        &self.inner.settings
    }

    pub async fn status(&self) -> RecordingStatus {
        self.inner.state.lock().await.status
    }

    pub async fn snapshot(&self) -> RecordingSession {
        self.inner.state.lock().await.clone()
    }

    pub async fn is_active(&self) -> bool {
        self.inner.state.lock().await.is_active()
    }

    /// Every status transition from now on, in order
    pub fn subscribe(&self) -> broadcast::Receiver<RecordingStatus> {
        self.inner.transitions.subscribe()
    }

    /// Start recording for a turn
    ///
    /// Ignored (logged) unless the controller is idle; the idle check and the
    /// move to Preparing happen under one lock, so concurrent calls admit one.
    pub async fn start(&self, turn: &DialogueTurn, started_at: Option<DateTime<Utc>>) -> Result<()> {
        {
            let mut state = self.inner.state.lock().await;
            if state.status != RecordingStatus::Initial {
                warn!("Recording already active ({:?}), ignoring start", state.status);
                return Ok(());
            }

            info!(
                "Starting recording for session {} turn {}",
                turn.session_id, turn.turn_id
            );
            self.inner.transition(&mut state, RecordingStatus::Preparing);
            state.turn = Some(turn.clone());
            state.started_at = None;
            state.duration_millis = 0;
            state.artifact = None;
        }

        let mut teardown = Teardown::new(&self.inner);
        let (device, meter_rx, artifact) = match self.acquire_device(turn).await {
            Ok(acquired) => acquired,
            Err(e) => {
                error!("Failed to start recording: {}", e);
                teardown.release().await;
                return Err(e);
            }
        };

        info!("Recorder {} started, writing to {}", device.name(), artifact.display());
        teardown.device = Some(device);
        {
            let mut meter_task = self.inner.meter_task.lock().await;
            *meter_task = Some(self.spawn_meter_listener(meter_rx));
        }
        {
            let mut slot = self.inner.device.lock().await;
            *slot = teardown.device.take();
        }

        let mut state = self.inner.state.lock().await;
        state.artifact = Some(artifact);
        state.started_at = Some(started_at.unwrap_or_else(Utc::now));
        self.inner.transition(&mut state, RecordingStatus::Recording);
        teardown.disarm();

        Ok(())
    }

    async fn acquire_device(
        &self,
        turn: &DialogueTurn,
    ) -> Result<(Box<dyn RecorderDevice>, mpsc::Receiver<MeterSample>, PathBuf)> {
        let dir = self.inner.settings.recording_dir();
        tokio::fs::create_dir_all(&dir).await?;
        let artifact = dir.join(format!(
            "{}_{}_{}.wav",
            turn.session_id,
            turn.turn_id,
            Utc::now().timestamp_millis()
        ));

        let mut device = self.inner.factory.create().map_err(device_error)?;
        let meter_rx = device
            .start(Some(artifact.as_path()), &self.inner.settings.encoding, true)
            .await
            .map_err(device_error)?;

        Ok((device, meter_rx, artifact))
    }

    fn spawn_meter_listener(&self, mut meter_rx: mpsc::Receiver<MeterSample>) -> JoinHandle<()> {
        let state = Arc::clone(&self.inner.state);
        tokio::spawn(async move {
            while let Some(sample) = meter_rx.recv().await {
                state.lock().await.apply_meter(sample);
            }
        })
    }

    /// Pause an active recording; ignored unless Recording
    pub async fn pause(&self) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        if state.status != RecordingStatus::Recording {
            debug!("Not recording ({:?}), ignoring pause", state.status);
            return Ok(());
        }

        let mut device = self.inner.device.lock().await;
        let Some(device) = device.as_mut() else {
            warn!("Recording has no device, ignoring pause");
            return Ok(());
        };
        device.pause().await.map_err(device_error)?;

        info!("Recording paused");
        self.inner.transition(&mut state, RecordingStatus::Paused);
        Ok(())
    }

    /// Resume a paused recording; ignored unless Paused
    pub async fn resume(&self) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        if state.status != RecordingStatus::Paused {
            debug!("Not paused ({:?}), ignoring resume", state.status);
            return Ok(());
        }

        let mut device = self.inner.device.lock().await;
        let Some(device) = device.as_mut() else {
            warn!("Recording has no device, ignoring resume");
            return Ok(());
        };
        device.resume().await.map_err(device_error)?;

        info!("Recording resumed");
        self.inner.transition(&mut state, RecordingStatus::Recording);
        Ok(())
    }

    /// Stop recording, then either delete the artifact (`cancel`) or upload it
    ///
    /// Whatever happens, the metering listener is removed, the device is
    /// released and the status is back to Initial when this returns. If the
    /// future is dropped first, the same teardown runs in the background and
    /// any upload in flight is abandoned.
    pub async fn stop(&self, cancel: bool) -> Result<StopOutcome> {
        let turn = {
            let mut state = self.inner.state.lock().await;
            if !state.status.is_capturing() {
                info!("Recording is not active ({:?}), ignoring stop", state.status);
                return Ok(StopOutcome::Ignored);
            }
            self.inner.transition(&mut state, RecordingStatus::Stopping);
            state.turn.clone()
        };

        info!("Stopping recording (cancel={})", cancel);

        let mut teardown = Teardown::new(&self.inner);
        teardown.device = self.inner.device.lock().await.take();
        let result = match teardown.device.as_mut() {
            Some(device) => self.finish(&mut **device, cancel, turn).await,
            None => Err(SessionError::Device("Recording has no device".to_string())),
        };

        teardown.release().await;

        if let Err(e) = &result {
            error!("Error stopping recording: {}", e);
        }
        result
    }

    async fn finish(
        &self,
        device: &mut dyn RecorderDevice,
        cancel: bool,
        turn: Option<DialogueTurn>,
    ) -> Result<StopOutcome> {
        let artifact = device.stop().await.map_err(device_error)?;
        info!("Audio file recorded at {}", artifact.display());

        if cancel {
            info!("Recording was cancelled, removing audio file");
            discard_artifact(&artifact).await;
            return Ok(StopOutcome::Discarded { artifact });
        }

        let turn = turn.ok_or_else(|| SessionError::Device("Recording has no turn".to_string()))?;
        let result = self.inner.upload.submit(&artifact, &turn).await?;
        Ok(StopOutcome::Submitted(result))
    }
}

fn device_error(err: anyhow::Error) -> SessionError {
    SessionError::Device(format!("{err:#}"))
}

async fn discard_artifact(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove audio file {}: {}", path.display(), e),
    }
}
