use serde::{Deserialize, Serialize};

/// Signals sent to the recognition service as JSON text frames.
///
/// Audio itself travels out-of-band as raw binary frames of little-endian
/// 16-bit PCM, explicitly uncompressed; see [`crate::core::audio`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientSignal {
    StartRecognition,
    StopRecognition,
}

impl ClientSignal {
    /// Serialize the signal into its wire form.
    pub fn to_text(self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self)
    }
}

/// Events pushed by the recognition service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerEvent {
    Status(StatusPayload),
    Recognized(RecognizedPayload),
    Error(ErrorPayload),
}

impl ServerEvent {
    /// Helper to construct a status push.
    pub fn status<S: Into<String>>(status: S) -> Self {
        Self::Status(StatusPayload {
            status: status.into(),
        })
    }

    /// Helper to construct a recognition result.
    pub fn recognized<T: Into<String>>(text: T, is_final: bool) -> Self {
        Self::Recognized(RecognizedPayload {
            text: text.into(),
            is_final,
        })
    }

    /// Helper to construct an error push.
    pub fn error<M: Into<String>>(message: M) -> Self {
        Self::Error(ErrorPayload {
            message: message.into(),
        })
    }
}

/// Raw status push; the service is free to report states this client does not
/// model, so the string is kept verbatim and classified on demand.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusPayload {
    pub status: String,
}

impl StatusPayload {
    /// Map the reported string onto the states the client reacts to.
    pub fn reported(&self) -> ReportedStatus {
        match self.status.as_str() {
            "listening" => ReportedStatus::Listening,
            "connected" => ReportedStatus::Connected,
            _ => ReportedStatus::Other,
        }
    }
}

/// Status states the client distinguishes. Anything the service reports
/// beyond `listening` and `connected` collapses into `Other`, which the
/// session treats as "stopped".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportedStatus {
    Listening,
    Connected,
    Other,
}

/// Transcript update carrying text plus a finality flag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecognizedPayload {
    pub text: String,
    #[serde(rename = "final")]
    pub is_final: bool,
}

/// Error payload forwarded verbatim to the user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorPayload {
    pub message: String,
}
