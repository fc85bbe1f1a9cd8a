//! WebSocket connection loop.
//!
//! A single `select!` loop multiplexes server frames, capture frames and user
//! commands into [`Session::dispatch`], then applies the resulting effects.
//! All session state is touched only from this loop.

use std::io::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::capture::{CaptureEvent, CaptureSettings, MicrophoneHandle};
use crate::config::AppConfig;
use crate::core::audio::encode_pcm16;
use crate::core::errors::ClientError;
use crate::core::messages::{ClientSignal, ServerEvent};
use crate::core::session::{Effect, Session, SessionEvent};
use crate::core::transcript::TranscriptUpdate;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Connect to the recognition service and run until the user quits or the
/// channel goes away. Connect failures surface to the caller; there is no
/// automatic reconnect.
pub async fn run(config: AppConfig) -> Result<(), ClientError> {
    info!(server = %config.server_url, "connecting to recognition service");
    let (ws_stream, _) = connect_async(config.server_url.as_str())
        .await
        .map_err(|err| ClientError::Connect(err.to_string()))?;
    let (ws_tx, mut ws_rx) = ws_stream.split();

    let (capture_tx, mut capture_rx) = unbounded_channel();
    let mut runner = Runner {
        config,
        ws_tx,
        session: Session::new(),
        surface: Surface::new(),
        recognizing: Arc::new(AtomicBool::new(false)),
        capture_tx,
        microphone: None,
    };

    runner.dispatch(SessionEvent::ChannelUp).await?;
    if runner.config.auto_start {
        runner.dispatch(SessionEvent::StartRequested).await?;
    } else {
        runner.surface.status("commands: start | stop | quit");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let result = loop {
        tokio::select! {
            message = ws_rx.next() => match message {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<ServerEvent>(&text) {
                    Ok(event) => runner.handle_server_event(event).await?,
                    Err(err) => warn!(error = %err, "failed to parse server message"),
                },
                Some(Ok(Message::Ping(payload))) => {
                    if let Err(err) = runner.ws_tx.send(Message::Pong(payload)).await {
                        warn!(error = %err, "failed to reply to ping");
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    let message = "connection closed by server".to_string();
                    runner.dispatch(SessionEvent::ChannelDown(message.clone())).await?;
                    break Err(ClientError::ChannelClosed(message));
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    let message = err.to_string();
                    runner.dispatch(SessionEvent::ChannelDown(message.clone())).await?;
                    break Err(ClientError::ChannelClosed(message));
                }
            },
            event = capture_rx.recv() => match event {
                Some(CaptureEvent::Ready { device, source_rate }) => {
                    debug!(device = %device, source_rate, "microphone granted");
                    runner.dispatch(SessionEvent::CaptureReady).await?;
                }
                Some(CaptureEvent::Failed(message)) => {
                    runner.dispatch(SessionEvent::CaptureFailed(message)).await?;
                }
                Some(CaptureEvent::Frame(samples)) => {
                    runner.forward_frame(&samples).await?;
                }
                None => {}
            },
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if runner.handle_command(line.trim()).await? {
                        break Ok(());
                    }
                }
                Ok(None) => {
                    runner.dispatch(SessionEvent::Shutdown).await?;
                    break Ok(());
                }
                Err(err) => {
                    warn!(error = %err, "stdin closed");
                    runner.dispatch(SessionEvent::Shutdown).await?;
                    break Ok(());
                }
            },
            _ = tokio::signal::ctrl_c() => {
                runner.dispatch(SessionEvent::Shutdown).await?;
                break Ok(());
            }
        }
    };

    if let Some(mut microphone) = runner.microphone.take() {
        microphone.close();
    }
    result
}

struct Runner {
    config: AppConfig,
    ws_tx: WsSink,
    session: Session,
    surface: Surface,
    recognizing: Arc<AtomicBool>,
    capture_tx: UnboundedSender<CaptureEvent>,
    microphone: Option<MicrophoneHandle>,
}

impl Runner {
    async fn dispatch(&mut self, event: SessionEvent) -> Result<(), ClientError> {
        let effects = self.session.dispatch(event);
        self.apply(effects).await
    }

    async fn apply(&mut self, effects: Vec<Effect>) -> Result<(), ClientError> {
        for effect in effects {
            match effect {
                Effect::SendStart => self.send_signal(ClientSignal::StartRecognition).await?,
                Effect::SendStop => self.send_signal(ClientSignal::StopRecognition).await?,
                Effect::BeginCapture => {
                    let settings = CaptureSettings {
                        device: self.config.device.clone(),
                        target_rate: self.config.sample_rate,
                        frame_samples: self.config.frame_samples,
                        record_wav: self.config.record_wav.clone(),
                    };
                    self.microphone = Some(MicrophoneHandle::start(
                        settings,
                        self.capture_tx.clone(),
                        self.recognizing.clone(),
                    ));
                }
                Effect::TeardownCapture => {
                    if let Some(mut microphone) = self.microphone.take() {
                        microphone.close();
                    }
                }
                Effect::SetRecognizing(value) => {
                    self.recognizing.store(value, Ordering::Release);
                }
                Effect::ShowStatus(text) => self.surface.status(text),
                Effect::SurfaceError(message) => self.surface.error(&message),
                Effect::Transcript(update) => self.surface.transcript(&update),
            }
        }
        Ok(())
    }

    async fn handle_server_event(&mut self, event: ServerEvent) -> Result<(), ClientError> {
        let session_event = match event {
            ServerEvent::Status(payload) => SessionEvent::Status(payload.reported()),
            ServerEvent::Recognized(payload) => SessionEvent::Recognized {
                text: payload.text,
                is_final: payload.is_final,
            },
            ServerEvent::Error(payload) => SessionEvent::ServerError(payload.message),
        };
        self.dispatch(session_event).await
    }

    /// Returns true when the user asked to quit.
    async fn handle_command(&mut self, command: &str) -> Result<bool, ClientError> {
        match command {
            "" => Ok(false),
            "start" => {
                if self.session.controls().start_enabled {
                    self.dispatch(SessionEvent::StartRequested).await?;
                } else {
                    self.surface.status("start is not available right now");
                }
                Ok(false)
            }
            "stop" => {
                if self.session.controls().stop_enabled {
                    self.dispatch(SessionEvent::StopRequested).await?;
                } else {
                    self.surface.status("stop is not available right now");
                }
                Ok(false)
            }
            "quit" | "exit" => {
                self.dispatch(SessionEvent::Shutdown).await?;
                Ok(true)
            }
            other => {
                self.surface
                    .status(&format!("unknown command '{other}' (start, stop, quit)"));
                Ok(false)
            }
        }
    }

    async fn forward_frame(&mut self, samples: &[i16]) -> Result<(), ClientError> {
        // Frames queued before a stop landed are discarded by the same flag
        // that gates the capture callback.
        if !self.session.recognizing() {
            return Ok(());
        }
        let payload = encode_pcm16(samples);
        self.ws_tx
            .send(Message::Binary(payload))
            .await
            .map_err(|err| ClientError::ChannelClosed(err.to_string()))
    }

    async fn send_signal(&mut self, signal: ClientSignal) -> Result<(), ClientError> {
        let text = signal.to_text()?;
        self.ws_tx
            .send(Message::Text(text))
            .await
            .map_err(|err| ClientError::ChannelClosed(err.to_string()))
    }
}

/// Terminal rendering of status, errors and the transcript log. Partial text
/// redraws one line in place; finals land as their own lines.
struct Surface {
    partial_open: bool,
}

impl Surface {
    fn new() -> Self {
        Self {
            partial_open: false,
        }
    }

    fn close_partial(&mut self) {
        if self.partial_open {
            println!();
            self.partial_open = false;
        }
    }

    fn status(&mut self, text: &str) {
        self.close_partial();
        println!("status: {text}");
    }

    fn error(&mut self, message: &str) {
        self.close_partial();
        eprintln!("error: {message}");
    }

    fn transcript(&mut self, update: &TranscriptUpdate) {
        match update {
            TranscriptUpdate::AppendedFinal(text) => {
                self.close_partial();
                println!("{text}");
            }
            TranscriptUpdate::UpdatedPartial(text) | TranscriptUpdate::CreatedPartial(text) => {
                print!("\r\x1b[2K{text}");
                let _ = std::io::stdout().flush();
                self.partial_open = true;
            }
            TranscriptUpdate::Ignored => {}
        }
    }
}
