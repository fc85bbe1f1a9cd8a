use thiserror::Error;

/// High-level failures surfaced by the client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("channel closed: {0}")]
    ChannelClosed(String),
    #[error("invalid server message: {0}")]
    Protocol(#[from] serde_json::Error),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Errors raised while opening or running the microphone pipeline.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device named '{0}'")]
    DeviceNotFound(String),
    #[error("no default input device available")]
    NoDefaultDevice,
    #[error("failed to enumerate input devices: {0}")]
    Devices(#[from] cpal::DevicesError),
    #[error("failed to query supported configs: {0}")]
    SupportedConfigs(#[from] cpal::SupportedStreamConfigsError),
    #[error("failed to read default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),
    #[error("unsupported sample format {0:?}")]
    UnsupportedFormat(cpal::SampleFormat),
    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),
    #[error("failed to start input stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
    #[error("wav recording failed: {0}")]
    Wav(#[from] hound::Error),
}
