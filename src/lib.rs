pub mod capture;
pub mod client;
pub mod config;

pub mod core {
    pub mod audio;
    pub mod errors;
    pub mod messages;
    pub mod session;
    pub mod transcript;
}

pub use core::errors;
pub use core::messages;
pub use core::session;
pub use core::transcript;

#[cfg(test)]
mod tests {
    use crate::core::messages::{ClientSignal, ReportedStatus, ServerEvent};

    #[test]
    fn client_signals_serialize_to_wire_form() {
        assert_eq!(
            ClientSignal::StartRecognition.to_text().unwrap(),
            r#"{"type":"start_recognition"}"#
        );
        assert_eq!(
            ClientSignal::StopRecognition.to_text().unwrap(),
            r#"{"type":"stop_recognition"}"#
        );
    }

    #[test]
    fn status_pushes_deserialize_and_classify() {
        let event: ServerEvent =
            serde_json::from_str(r#"{"type":"status","status":"listening"}"#).unwrap();
        match event {
            ServerEvent::Status(payload) => {
                assert_eq!(payload.reported(), ReportedStatus::Listening);
            }
            other => panic!("expected status, got {other:?}"),
        }

        let event: ServerEvent =
            serde_json::from_str(r#"{"type":"status","status":"warming_up"}"#).unwrap();
        match event {
            ServerEvent::Status(payload) => {
                assert_eq!(payload.reported(), ReportedStatus::Other);
            }
            other => panic!("expected status, got {other:?}"),
        }
    }

    #[test]
    fn recognition_results_deserialize_with_finality_flag() {
        let event: ServerEvent =
            serde_json::from_str(r#"{"type":"recognized","text":"hello","final":true}"#).unwrap();
        assert_eq!(event, ServerEvent::recognized("hello", true));
    }

    #[test]
    fn error_pushes_round_trip() {
        let event = ServerEvent::error("model not loaded");
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"error""#));
        let decoded: ServerEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, event);
    }
}
