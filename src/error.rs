//! Error taxonomy for the kiosk controller.
//!
//! The first four kinds are recoverable within a capture cycle: the
//! orchestrator turns them into an absent field and keeps running. Only
//! [`SetupError`] is fatal, and it can only occur before the loop starts.

/// The weight sensor could not produce a usable measurement.
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    /// A raw read failed at the driver level.
    #[error("scale read failed: {0}")]
    ReadFailed(String),

    /// Too few samples survived to trust the median.
    #[error("only {got} of {want} scale samples succeeded, majority required")]
    TooFewSamples { got: usize, want: usize },
}

/// The camera could not deliver a usable frame.
#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    #[error("frame grab failed: {0}")]
    GrabFailed(String),

    #[error("camera delivered an empty frame")]
    EmptyFrame,
}

/// The vision service was unreachable or returned something unusable.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("vision request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("vision service returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("vision response is not a valid item array: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("vision response contained no content")]
    EmptyResponse,
}

/// The backend rejected or never received an upload.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("upload request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend rejected upload with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Fatal error raised before the capture loop starts.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("cannot read config '{path}': {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("dashboard bind failed on {addr}: {source}")]
    DashboardBind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}
