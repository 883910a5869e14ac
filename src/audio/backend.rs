use anyhow::Result;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// Periodic level/position report from a recording device
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeterSample {
    /// Signal level in dBFS, if the device measures it
    pub metering: Option<f32>,
    /// Recorded position in milliseconds as reported by the device
    pub position_ms: u64,
}

/// Encoding requested from the recording device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels (1 = mono, 2 = stereo)
    pub channels: u16,
    /// Bits per PCM sample
    pub bits_per_sample: u16,
    /// Metering cadence in milliseconds
    pub subscription_interval_ms: u64,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 2,
            bits_per_sample: 16,
            subscription_interval_ms: 100,
        }
    }
}

/// Audio capture device
///
/// A device instance records a single artifact: it is created for one
/// `start()` and dropped after its `stop()`.
#[async_trait::async_trait]
pub trait RecorderDevice: Send + Sync {
    /// Start capturing into `target` (or a device-chosen location when `None`)
    ///
    /// Returns a channel receiver that will receive meter samples when
    /// `metering` is enabled.
    async fn start(
        &mut self,
        target: Option<&Path>,
        encoding: &EncodingConfig,
        metering: bool,
    ) -> Result<mpsc::Receiver<MeterSample>>;

    /// Pause capturing
    async fn pause(&mut self) -> Result<()>;

    /// Resume a paused capture
    async fn resume(&mut self) -> Result<()>;

    /// Stop capturing and return the location of the recorded artifact
    async fn stop(&mut self) -> Result<PathBuf>;

    /// Detach the metering listener
    fn remove_listener(&mut self);

    /// Get device name for logging
    fn name(&self) -> &str;
}

/// Creates a fresh device for each recording
pub trait RecorderDeviceFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn RecorderDevice>>;
}

impl<F> RecorderDeviceFactory for F
where
    F: Fn() -> Result<Box<dyn RecorderDevice>> + Send + Sync,
{
    fn create(&self) -> Result<Box<dyn RecorderDevice>> {
        self()
    }
}
