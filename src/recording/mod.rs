//! Parent-turn audio capture
//!
//! `RecordingController` owns the capture device for the duration of one
//! recording and hands committed artifacts to the `UploadPipeline`.

mod controller;
mod upload;

pub use controller::{
    RecordingController, RecordingSession, RecordingSettings, RecordingStatus, StopOutcome,
    RECORDING_DIR,
};
pub use upload::UploadPipeline;
