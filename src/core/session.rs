//! Recognition session lifecycle.
//!
//! All mutable client state lives in [`Session`] and changes only through
//! [`Session::dispatch`], which maps one inbound event to a list of effects
//! for the runner to apply. Keeping the state machine free of IO makes the
//! awkward corners explicit, in particular the window where a stop arrives
//! while the microphone grant is still pending.

use crate::core::messages::ReportedStatus;
use crate::core::transcript::{TranscriptLog, TranscriptUpdate};

/// Display phase shown on the status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Not listening; start is available once the channel is up.
    Idle,
    /// Start signal sent, waiting for the service to confirm.
    Starting,
    /// Service confirmed; audio is being forwarded.
    Listening,
}

/// Lifecycle of the capture pipeline.
///
/// `Pending` covers the span between requesting microphone access and the
/// grant (or denial) landing. A stop during that span cannot cancel the
/// request; the grant still activates capture, but the recognizing gate stays
/// off so frames are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Uninitialized,
    Pending,
    Active,
}

/// Start/stop control availability, mirroring the original button enablement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Controls {
    pub start_enabled: bool,
    pub stop_enabled: bool,
}

/// Everything that can happen to a session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The signaling channel came up.
    ChannelUp,
    /// The signaling channel failed or closed.
    ChannelDown(String),
    /// The user asked to start recognition.
    StartRequested,
    /// The user asked to stop recognition.
    StopRequested,
    /// Microphone access was granted and the stream is running.
    CaptureReady,
    /// Microphone access was denied or the stream could not be opened.
    CaptureFailed(String),
    /// Status push from the service.
    Status(ReportedStatus),
    /// Recognition result from the service.
    Recognized { text: String, is_final: bool },
    /// Error push from the service; forces a full stop.
    ServerError(String),
    /// Process is going away (ctrl-c or quit).
    Shutdown,
}

/// Side effects the runner must carry out, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Send the start signal over the channel.
    SendStart,
    /// Send the stop signal over the channel.
    SendStop,
    /// Request microphone access and wire the capture pipeline.
    BeginCapture,
    /// Release stream, thread and channel together.
    TeardownCapture,
    /// Flip the gate that lets capture frames through.
    SetRecognizing(bool),
    /// Update the status line.
    ShowStatus(&'static str),
    /// Show an error to the user, verbatim.
    SurfaceError(String),
    /// Mirror a transcript change.
    Transcript(TranscriptUpdate),
}

#[derive(Debug)]
pub struct Session {
    phase: Phase,
    capture: CaptureState,
    channel_up: bool,
    recognizing: bool,
    transcript: TranscriptLog,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            capture: CaptureState::Uninitialized,
            channel_up: false,
            recognizing: false,
            transcript: TranscriptLog::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn capture(&self) -> CaptureState {
        self.capture
    }

    pub fn recognizing(&self) -> bool {
        self.recognizing
    }

    pub fn transcript(&self) -> &TranscriptLog {
        &self.transcript
    }

    pub fn controls(&self) -> Controls {
        Controls {
            start_enabled: self.channel_up && self.phase == Phase::Idle,
            stop_enabled: self.phase == Phase::Listening,
        }
    }

    /// Apply one event and return the effects it produced.
    pub fn dispatch(&mut self, event: SessionEvent) -> Vec<Effect> {
        match event {
            SessionEvent::ChannelUp => {
                self.channel_up = true;
                vec![Effect::ShowStatus("connected - ready to start")]
            }
            SessionEvent::ChannelDown(message) => {
                self.channel_up = false;
                self.recognizing = false;
                self.phase = Phase::Idle;
                vec![
                    Effect::SetRecognizing(false),
                    Effect::SurfaceError(message),
                    Effect::ShowStatus("disconnected"),
                ]
            }
            SessionEvent::StartRequested => self.on_start(),
            SessionEvent::StopRequested => self.on_stop(),
            SessionEvent::CaptureReady => {
                self.capture = CaptureState::Active;
                Vec::new()
            }
            SessionEvent::CaptureFailed(message) => {
                self.capture = CaptureState::Uninitialized;
                self.phase = Phase::Idle;
                vec![
                    Effect::SurfaceError(message),
                    Effect::ShowStatus("microphone access denied"),
                ]
            }
            SessionEvent::Status(status) => self.on_status(status),
            SessionEvent::Recognized { text, is_final } => {
                match self.transcript.push(&text, is_final) {
                    TranscriptUpdate::Ignored => Vec::new(),
                    update => vec![Effect::Transcript(update)],
                }
            }
            SessionEvent::ServerError(message) => {
                let mut effects = vec![Effect::SurfaceError(message)];
                effects.extend(self.on_stop());
                effects
            }
            SessionEvent::Shutdown => {
                let mut effects = Vec::new();
                if self.recognizing {
                    effects.push(Effect::SendStop);
                }
                self.recognizing = false;
                self.phase = Phase::Idle;
                if self.capture == CaptureState::Active {
                    self.capture = CaptureState::Uninitialized;
                }
                effects.push(Effect::TeardownCapture);
                effects
            }
        }
    }

    fn on_start(&mut self) -> Vec<Effect> {
        if !self.controls().start_enabled {
            return Vec::new();
        }
        self.phase = Phase::Starting;
        let mut effects = vec![
            Effect::SendStart,
            Effect::ShowStatus("starting recognition"),
        ];
        // The capture graph is built once per process and only reconnected by
        // the recognizing gate on later starts.
        if self.capture == CaptureState::Uninitialized {
            self.capture = CaptureState::Pending;
            effects.push(Effect::BeginCapture);
        }
        effects
    }

    fn on_stop(&mut self) -> Vec<Effect> {
        self.phase = Phase::Idle;
        self.recognizing = false;
        let mut effects = vec![Effect::SendStop, Effect::SetRecognizing(false)];
        // A pending grant cannot be cancelled, and the pipeline it delivers
        // must stay alive behind the gate: tearing it down here would leave
        // the session believing a pipeline exists once the grant lands.
        if self.capture == CaptureState::Pending {
            effects.push(Effect::ShowStatus("stopped"));
            return effects;
        }
        self.capture = CaptureState::Uninitialized;
        effects.push(Effect::TeardownCapture);
        effects.push(Effect::ShowStatus("stopped"));
        effects
    }

    fn on_status(&mut self, status: ReportedStatus) -> Vec<Effect> {
        match status {
            ReportedStatus::Listening => {
                self.phase = Phase::Listening;
                self.recognizing = true;
                vec![
                    Effect::SetRecognizing(true),
                    Effect::ShowStatus("listening"),
                ]
            }
            ReportedStatus::Connected => {
                self.phase = Phase::Idle;
                vec![Effect::ShowStatus("connected - ready to start")]
            }
            ReportedStatus::Other => {
                self.phase = Phase::Idle;
                self.recognizing = false;
                vec![
                    Effect::SetRecognizing(false),
                    Effect::ShowStatus("not listening"),
                ]
            }
        }
    }
}
