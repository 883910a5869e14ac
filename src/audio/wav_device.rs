use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::backend::{EncodingConfig, MeterSample, RecorderDevice, RecorderDeviceFactory};
use super::file::{level_dbfs, write_wav, AudioFile};

#[derive(Default)]
struct Capture {
    samples: Vec<i16>,
    cursor: usize,
    position_ms: u64,
    paused: bool,
    listener: Option<mpsc::Sender<MeterSample>>,
}

/// Recording device that captures from a WAV source in real time
///
/// Every metering interval the next block of the source is appended to the
/// capture buffer (looping at the end of the source), unless paused. The
/// reported position therefore excludes paused time.
pub struct WavFileDevice {
    source: Arc<AudioFile>,
    capture: Arc<Mutex<Capture>>,
    listening: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
    target: Option<PathBuf>,
}

impl WavFileDevice {
    pub fn new(source: Arc<AudioFile>) -> Self {
        Self {
            source,
            capture: Arc::new(Mutex::new(Capture::default())),
            listening: Arc::new(AtomicBool::new(false)),
            task: None,
            target: None,
        }
    }
}

#[async_trait::async_trait]
impl RecorderDevice for WavFileDevice {
    async fn start(
        &mut self,
        target: Option<&Path>,
        encoding: &EncodingConfig,
        metering: bool,
    ) -> Result<mpsc::Receiver<MeterSample>> {
        if self.task.is_some() {
            anyhow::bail!("Device is already capturing");
        }
        if self.source.samples.is_empty() {
            anyhow::bail!("Source {} contains no audio", self.source.path);
        }
        if encoding.sample_rate != self.source.sample_rate || encoding.channels != self.source.channels {
            warn!(
                "Requested {}Hz/{}ch but source is {}Hz/{}ch; recording at source format",
                encoding.sample_rate, encoding.channels, self.source.sample_rate, self.source.channels
            );
        }

        let target = target.map(Path::to_path_buf).unwrap_or_else(|| {
            std::env::temp_dir().join(format!("dyad-recording-{}.wav", uuid::Uuid::new_v4()))
        });
        info!("WAV device capturing {} -> {}", self.source.path, target.display());

        let (meter_tx, meter_rx) = mpsc::channel(64);
        {
            let mut capture = self.capture.lock().await;
            *capture = Capture::default();
            if metering {
                capture.listener = Some(meter_tx);
            }
        }
        self.listening.store(metering, Ordering::SeqCst);

        let interval_ms = encoding.subscription_interval_ms.max(1);
        let source = Arc::clone(&self.source);
        let capture = Arc::clone(&self.capture);
        let listening = Arc::clone(&self.listening);

        let task = tokio::spawn(async move {
            let block_len = source.samples_per_millis(interval_ms).max(source.channels as usize);
            let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
            // First tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let mut capture = capture.lock().await;
                if capture.paused {
                    continue;
                }

                let mut block = Vec::with_capacity(block_len);
                for _ in 0..block_len {
                    block.push(source.samples[capture.cursor]);
                    capture.cursor = (capture.cursor + 1) % source.samples.len();
                }
                capture.position_ms += interval_ms;
                capture.samples.extend_from_slice(&block);

                let sample = MeterSample {
                    metering: Some(level_dbfs(&block)),
                    position_ms: capture.position_ms,
                };
                if listening.load(Ordering::SeqCst) {
                    if let Some(tx) = &capture.listener {
                        if tx.try_send(sample).is_err() {
                            debug!("Meter listener not keeping up, dropping sample");
                        }
                    }
                } else {
                    capture.listener = None;
                }
            }
        });

        self.task = Some(task);
        self.target = Some(target);

        Ok(meter_rx)
    }

    async fn pause(&mut self) -> Result<()> {
        if self.task.is_none() {
            anyhow::bail!("Device is not capturing");
        }
        self.capture.lock().await.paused = true;
        Ok(())
    }

    async fn resume(&mut self) -> Result<()> {
        if self.task.is_none() {
            anyhow::bail!("Device is not capturing");
        }
        self.capture.lock().await.paused = false;
        Ok(())
    }

    async fn stop(&mut self) -> Result<PathBuf> {
        let task = self.task.take().context("Device is not capturing")?;
        task.abort();
        if let Err(e) = task.await {
            if !e.is_cancelled() {
                warn!("Capture task failed: {}", e);
            }
        }

        let target = self.target.take().context("No capture target")?;
        let samples = {
            let mut capture = self.capture.lock().await;
            capture.listener = None;
            std::mem::take(&mut capture.samples)
        };

        let sample_rate = self.source.sample_rate;
        let channels = self.source.channels;
        let path = target.clone();
        let sample_count = samples.len();
        tokio::task::spawn_blocking(move || write_wav(&path, sample_rate, channels, &samples))
            .await
            .context("WAV writer task panicked")??;

        info!("WAV device wrote {} samples to {}", sample_count, target.display());
        Ok(target)
    }

    fn remove_listener(&mut self) {
        self.listening.store(false, Ordering::SeqCst);
    }

    fn name(&self) -> &str {
        "wav-file"
    }
}

impl Drop for WavFileDevice {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Creates `WavFileDevice`s reading from one shared source
pub struct WavDeviceFactory {
    source: Arc<AudioFile>,
}

impl WavDeviceFactory {
    pub fn new(source: AudioFile) -> Self {
        Self {
            source: Arc::new(source),
        }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(AudioFile::open(path)?))
    }

    /// Length of one pass over the source
    pub fn duration_seconds(&self) -> f64 {
        self.source.duration_seconds
    }
}

impl RecorderDeviceFactory for WavDeviceFactory {
    fn create(&self) -> Result<Box<dyn RecorderDevice>> {
        Ok(Box::new(WavFileDevice::new(Arc::clone(&self.source))))
    }
}
