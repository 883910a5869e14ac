//! Client for the dyad backend HTTP API

pub mod client;
pub mod endpoints;
pub mod messages;
pub mod timezone;

pub use client::{ApiClient, SessionApi};
pub use messages::{
    AudioUpload, CardIdentity, CardInfo, CardSelectionResult, ChildCardRecommendationResult,
    ChildCardsResult, ParentGuideElement, ParentGuideRecommendationResult, ParentMessageResult,
    ResponseWithTurnId, SessionStartResult, SessionTopicInfo,
};
pub use timezone::{FixedTimezone, SystemTimezone, TimezoneProvider};
