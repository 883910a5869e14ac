pub mod api;
pub mod audio;
pub mod config;
pub mod error;
pub mod recording;
pub mod session;

pub use api::{ApiClient, SessionApi};
pub use audio::{
    AudioFile, EncodingConfig, MeterSample, RecorderDevice, RecorderDeviceFactory, WavDeviceFactory,
    WavFileDevice,
};
pub use config::Config;
pub use error::{Result, SessionError};
pub use recording::{
    RecordingController, RecordingSession, RecordingSettings, RecordingStatus, StopOutcome,
    UploadPipeline,
};
pub use session::{
    AdvanceOutcome, AutoConfirm, DialogueRole, DialogueSession, DialogueTurn, SessionDriver,
    SessionPhase, SessionStats, TerminationOutcome, TerminationPrompt, TurnObserver,
};
