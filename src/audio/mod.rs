pub mod backend;
pub mod file;
pub mod wav_device;

pub use backend::{EncodingConfig, MeterSample, RecorderDevice, RecorderDeviceFactory};
pub use file::AudioFile;
pub use wav_device::{WavDeviceFactory, WavFileDevice};
