//! Kiosk configuration: a TOML file plus a handful of environment overrides.

use std::env;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::SetupError;

/// Deployment mode, selected by the first CLI argument.
///
/// The only behavioral difference is which backend URL uploads go to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Dev,
    Prod,
}

impl Mode {
    pub fn from_arg(arg: &str) -> Option<Mode> {
        match arg.to_ascii_lowercase().as_str() {
            "dev" => Some(Mode::Dev),
            "prod" => Some(Mode::Prod),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Dev => "dev",
            Mode::Prod => "prod",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub device: DeviceConfig,
    pub scale: ScaleConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    pub upload: UploadConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    /// Stable unit serial, sent as `device_id` with every upload.
    pub serial: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScaleConfig {
    /// Multiplier applied after the offset is subtracted, raw units to grams.
    pub gain: f64,
    /// Raw reading of the empty platform.
    pub offset: f64,
    /// Samples taken per measurement; the median is kept.
    #[serde(default = "default_samples")]
    pub samples: usize,
    /// Pause between consecutive samples.
    #[serde(default = "default_sample_period")]
    pub sample_period_millis: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    /// Frames grabbed and thrown away before the keeper, so auto-exposure
    /// settles and no stale buffered frame is served.
    #[serde(default = "default_warmup_frames")]
    pub warmup_frames: u32,
    /// When set, the keeper frame is also written here after each cycle.
    #[serde(default)]
    pub save_path: Option<String>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        CameraConfig {
            warmup_frames: default_warmup_frames(),
            save_path: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    /// Consecutive cycles without a weight+image pair before the process
    /// gives up and exits nonzero.
    #[serde(default = "default_max_failures")]
    pub max_consecutive_failures: u32,
    /// How long an in-flight cycle may keep running after a shutdown signal.
    #[serde(default = "default_grace")]
    pub shutdown_grace_millis: u64,
    /// How long the green lamp stays lit after a good cycle.
    #[serde(default = "default_success_hold")]
    pub success_hold_millis: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        CaptureConfig {
            max_consecutive_failures: default_max_failures(),
            shutdown_grace_millis: default_grace(),
            success_hold_millis: default_success_hold(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_vision_model")]
    pub model: String,
    #[serde(default = "default_analysis_timeout")]
    pub timeout_secs: u64,
    /// Usually supplied via OPENAI_API_KEY rather than the file.
    #[serde(default)]
    pub api_key: Option<String>,
    /// The order items the vision service is asked to check.
    #[serde(default)]
    pub items: Vec<ExpectedItem>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            enabled: false,
            api_base: default_api_base(),
            model: default_vision_model(),
            timeout_secs: default_analysis_timeout(),
            api_key: None,
            items: Vec::new(),
        }
    }
}

/// One order item the kiosk expects on the plate.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ExpectedItem {
    pub name: String,
    /// Ingredients to check individually; empty means presence-only.
    #[serde(default)]
    pub ingredients: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub url: String,
    /// Used instead of `url` when running in dev mode.
    #[serde(default)]
    pub dev_url: Option<String>,
    #[serde(default = "default_upload_timeout")]
    pub timeout_secs: u64,
    /// Appended as a `key` query parameter when present. Usually supplied
    /// via UPLOAD_KEY rather than the file.
    #[serde(default)]
    pub key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig {
            listen_addr: default_listen_addr(),
        }
    }
}

fn default_samples() -> usize {
    8
}

fn default_sample_period() -> u64 {
    250
}

fn default_warmup_frames() -> u32 {
    5
}

fn default_max_failures() -> u32 {
    2
}

fn default_grace() -> u64 {
    5_000
}

fn default_success_hold() -> u64 {
    1_000
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_vision_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_analysis_timeout() -> u64 {
    30
}

fn default_upload_timeout() -> u64 {
    20
}

fn default_listen_addr() -> String {
    "127.0.0.1:9090".to_string()
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Config, SetupError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| SetupError::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;
        Config::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Config, SetupError> {
        let config: Config = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), SetupError> {
        if self.device.serial.trim().is_empty() {
            return Err(SetupError::InvalidConfig("device.serial must not be empty".into()));
        }
        if self.scale.samples == 0 {
            return Err(SetupError::InvalidConfig("scale.samples must be at least 1".into()));
        }
        if self.scale.gain == 0.0 {
            return Err(SetupError::InvalidConfig("scale.gain must not be zero".into()));
        }
        if self.capture.max_consecutive_failures == 0 {
            return Err(SetupError::InvalidConfig(
                "capture.max_consecutive_failures must be at least 1".into(),
            ));
        }
        if self.analysis.enabled && self.analysis.items.is_empty() {
            return Err(SetupError::InvalidConfig(
                "analysis.enabled requires at least one [[analysis.items]] entry".into(),
            ));
        }
        Ok(())
    }

    /// Folds the environment into the parsed file. Variables win over file
    /// values so a unit file can be deployed once and pointed elsewhere later.
    pub fn apply_env(&mut self) {
        if let Ok(url) = env::var("BACKEND_URL") {
            self.upload.url = url;
        }
        if let Ok(url) = env::var("DEV_BACKEND_URL") {
            self.upload.dev_url = Some(url);
        }
        if let Ok(key) = env::var("UPLOAD_KEY") {
            self.upload.key = Some(key);
        }
        if let Ok(key) = env::var("OPENAI_API_KEY") {
            self.analysis.api_key = Some(key);
        }
    }

    /// The upload endpoint for the given mode. Dev mode falls back to the
    /// production URL when no dev URL is configured.
    pub fn backend_url(&self, mode: Mode) -> &str {
        match mode {
            Mode::Prod => &self.upload.url,
            Mode::Dev => match &self.upload.dev_url {
                Some(url) => url,
                None => {
                    log::warn!("dev mode without upload.dev_url, using production URL");
                    &self.upload.url
                }
            },
        }
    }
}
