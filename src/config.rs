use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use crate::audio::EncodingConfig;
use crate::recording::RecordingSettings;

const DEFAULT_BACKEND_ADDRESS: &str = "http://localhost:3000";
const ANDROID_EMULATOR_ADDRESS: &str = "http://10.0.2.2:3000";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub backend: BackendConfig,
    pub recording: RecordingConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "dyad-session".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Backend address for physical devices
    pub address: Option<String>,
    /// Running inside an emulator
    pub emulator: bool,
    /// Target platform ("android", "ios", ...)
    pub platform: String,
    /// IANA timezone sent with requests; the `TZ` environment when unset
    pub timezone: Option<String>,
    /// Bearer token of the signed-in dyad
    pub token: Option<String>,
    /// Whole-request timeout; requests are unbounded when unset
    pub request_timeout_secs: Option<u64>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            address: None,
            emulator: false,
            platform: "android".to_string(),
            timezone: None,
            token: None,
            request_timeout_secs: None,
        }
    }
}

impl BackendConfig {
    /// Backend address for this host
    pub fn resolve_address(&self) -> String {
        self.resolve_address_with(|key| std::env::var(key).ok())
    }

    /// Emulators reach the host through their loopback alias; physical
    /// devices use the configured address, then `BACKEND_ADDRESS`.
    pub fn resolve_address_with(&self, env: impl Fn(&str) -> Option<String>) -> String {
        if self.emulator {
            if self.platform.eq_ignore_ascii_case("android") {
                info!("Running on Android emulator, using host address {}", ANDROID_EMULATOR_ADDRESS);
                return ANDROID_EMULATOR_ADDRESS.to_string();
            }
            return DEFAULT_BACKEND_ADDRESS.to_string();
        }

        if let Some(address) = self.address.as_ref().filter(|a| !a.trim().is_empty()) {
            return address.trim().to_string();
        }

        match env("BACKEND_ADDRESS").filter(|a| !a.trim().is_empty()) {
            Some(address) => address.trim().to_string(),
            None => {
                warn!(
                    "BACKEND_ADDRESS not set, falling back to {}",
                    DEFAULT_BACKEND_ADDRESS
                );
                DEFAULT_BACKEND_ADDRESS.to_string()
            }
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Cache directory; recordings go to `{cache_dir}/audio_recording`
    pub cache_dir: String,
    pub sample_rate: u32,
    pub channels: u16,
    /// Metering cadence in milliseconds
    pub subscription_interval_ms: u64,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        let encoding = EncodingConfig::default();
        Self {
            cache_dir: "cache".to_string(),
            sample_rate: encoding.sample_rate,
            channels: encoding.channels,
            subscription_interval_ms: encoding.subscription_interval_ms,
        }
    }
}

impl RecordingConfig {
    pub fn settings(&self) -> RecordingSettings {
        RecordingSettings {
            cache_dir: PathBuf::from(&self.cache_dir),
            encoding: EncodingConfig {
                sample_rate: self.sample_rate,
                channels: self.channels,
                bits_per_sample: 16,
                subscription_interval_ms: self.subscription_interval_ms,
            },
        }
    }
}

impl Config {
    /// Load `path` (extension optional, file optional) with `DYAD__SECTION__KEY` overrides
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("DYAD").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
