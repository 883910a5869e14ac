use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

use crate::api::{AudioUpload, ParentMessageResult, SessionApi};
use crate::error::{Result, SessionError};
use crate::session::DialogueTurn;

const AUDIO_MIME_TYPE: &str = "audio/wav";

/// Submits a recorded parent utterance for its turn
///
/// Single-shot: a failed submission is returned to the caller and never retried here.
#[derive(Clone)]
pub struct UploadPipeline {
    api: Arc<dyn SessionApi>,
}

impl UploadPipeline {
    pub fn new(api: Arc<dyn SessionApi>) -> Self {
        Self { api }
    }

    pub async fn submit(&self, artifact: &Path, turn: &DialogueTurn) -> Result<ParentMessageResult> {
        let bytes = match tokio::fs::read(artifact).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SessionError::MissingAudioFile(artifact.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };

        let file_name = artifact
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("recording.wav")
            .to_string();

        info!(
            "Submitting parent audio {} for session {} turn {} ({} bytes)",
            file_name,
            turn.session_id,
            turn.turn_id,
            bytes.len()
        );

        let upload = AudioUpload {
            file_name,
            mime_type: AUDIO_MIME_TYPE.to_string(),
            bytes,
        };

        match self
            .api
            .submit_parent_audio(&turn.session_id, &turn.turn_id, upload)
            .await
        {
            Ok(result) => {
                info!(
                    "Parent message accepted ({} cards recommended), next turn {}",
                    result.payload.cards.len(),
                    result.next_turn_id
                );
                Ok(result)
            }
            Err(e) => {
                error!("Parent audio upload failed: {}", e);
                Err(e)
            }
        }
    }
}
