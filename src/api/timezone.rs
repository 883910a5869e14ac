use anyhow::Result;

/// Supplies the IANA timezone sent with every backend request
#[async_trait::async_trait]
pub trait TimezoneProvider: Send + Sync {
    async fn timezone(&self) -> Result<String>;
}

/// A timezone fixed at construction
pub struct FixedTimezone(pub String);

#[async_trait::async_trait]
impl TimezoneProvider for FixedTimezone {
    async fn timezone(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Reads `TZ` from the environment, falling back to UTC
pub struct SystemTimezone;

#[async_trait::async_trait]
impl TimezoneProvider for SystemTimezone {
    async fn timezone(&self) -> Result<String> {
        Ok(std::env::var("TZ")
            .ok()
            .filter(|tz| !tz.trim().is_empty())
            .unwrap_or_else(|| "UTC".to_string()))
    }
}
