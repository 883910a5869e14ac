use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Topic a session is about
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionTopicInfo {
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtopic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdescription: Option<String>,
}

/// Body of `POST /dyad/session/new`
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionInitiationArgs {
    pub topic: SessionTopicInfo,
    pub timezone: String,
}

/// Reference to a card by recommendation and position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardIdentity {
    pub id: String,
    pub recommendation_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardInfo {
    pub id: String,
    pub recommendation_id: String,
    pub text: String,
    #[serde(default)]
    pub localized: Option<String>,
    pub category: String,
}

impl CardInfo {
    pub fn identity(&self) -> CardIdentity {
        CardIdentity {
            id: self.id.clone(),
            recommendation_id: self.recommendation_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildCardRecommendationResult {
    pub id: String,
    pub timestamp: i64,
    pub cards: Vec<CardInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentGuideElement {
    pub id: String,
    pub category: serde_json::Value,
    #[serde(rename = "type")]
    pub guide_type: String,
    pub guide: String,
    #[serde(default)]
    pub guide_localized: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentGuideRecommendationResult {
    pub id: String,
    pub timestamp: i64,
    pub guides: Vec<ParentGuideElement>,
}

/// Server payload paired with the id of the turn that follows it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseWithTurnId<T> {
    pub payload: T,
    pub next_turn_id: String,
}

/// Response to a parent audio or text message
pub type ParentMessageResult = ResponseWithTurnId<ChildCardRecommendationResult>;

/// Response to a confirmed child card selection
pub type ChildCardsResult = ResponseWithTurnId<ParentGuideRecommendationResult>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStartResult {
    pub parent_guides: ParentGuideRecommendationResult,
    pub turn_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardSelectionResult {
    pub interim_cards: Vec<CardInfo>,
    pub new_recommendation: ChildCardRecommendationResult,
}

/// Recorded parent utterance ready for multipart submission
#[derive(Debug, Clone)]
pub struct AudioUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Timestamp header value: milliseconds since the Unix epoch
pub fn timestamp_header(now: DateTime<Utc>) -> String {
    now.timestamp_millis().to_string()
}
