//! Microphone capture pipeline.
//!
//! The `cpal` input stream is not `Send`, so it lives on a dedicated thread
//! for the lifetime of the capture session. The thread reports a grant or
//! denial once, then forwards fixed-size PCM frames over an unbounded channel
//! whenever the recognizing gate is open. Closing the handle stops the thread,
//! which drops the stream and finalizes any debug recording; stream, thread
//! and channel always go away together.

use std::fs::File;
use std::io::BufWriter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SampleRate, StreamConfig};
use hound::{WavSpec, WavWriter};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::core::audio::{downmix_to_mono, pcm16_from_f32, resample_linear};
use crate::core::errors::CaptureError;

/// Notifications emitted by the capture thread.
#[derive(Debug)]
pub enum CaptureEvent {
    /// Access granted; the stream is running.
    Ready { device: String, source_rate: u32 },
    /// Access denied or the stream could not be opened.
    Failed(String),
    /// One converted block of mono PCM at the target rate.
    Frame(Vec<i16>),
}

/// What the capture thread needs to open the pipeline.
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub device: Option<String>,
    pub target_rate: u32,
    pub frame_samples: usize,
    pub record_wav: Option<std::path::PathBuf>,
}

type SharedWavWriter = Arc<Mutex<Option<WavWriter<BufWriter<File>>>>>;

/// Owner of the capture thread. Dropping the handle tears the pipeline down.
pub struct MicrophoneHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl MicrophoneHandle {
    /// Request microphone access and start capturing in the background.
    ///
    /// Never blocks and never fails directly; the outcome arrives on `events`
    /// as [`CaptureEvent::Ready`] or [`CaptureEvent::Failed`], mirroring an
    /// asynchronous access grant.
    pub fn start(
        settings: CaptureSettings,
        events: UnboundedSender<CaptureEvent>,
        gate: Arc<AtomicBool>,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let notify = events.clone();
        let thread = match std::thread::Builder::new()
            .name("mic-capture".into())
            .spawn(move || capture_thread(settings, events, gate, stop_flag))
        {
            Ok(handle) => Some(handle),
            Err(err) => {
                let _ = notify.send(CaptureEvent::Failed(format!(
                    "failed to spawn capture thread: {err}"
                )));
                None
            }
        };
        Self { stop, thread }
    }

    /// Stop the stream and release every capture resource.
    pub fn close(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            thread.thread().unpark();
            let _ = thread.join();
        }
    }
}

impl Drop for MicrophoneHandle {
    fn drop(&mut self) {
        self.close();
    }
}

fn capture_thread(
    settings: CaptureSettings,
    events: UnboundedSender<CaptureEvent>,
    gate: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
) {
    let wav: SharedWavWriter = Arc::new(Mutex::new(None));
    let stream = match open_stream(&settings, events.clone(), gate, wav.clone()) {
        Ok((stream, device, source_rate)) => {
            let _ = events.send(CaptureEvent::Ready {
                device,
                source_rate,
            });
            stream
        }
        Err(err) => {
            let _ = events.send(CaptureEvent::Failed(err.to_string()));
            return;
        }
    };

    // Parked until close() flips the flag and unparks; spurious wakeups just
    // re-check the flag.
    while !stop.load(Ordering::Acquire) {
        std::thread::park();
    }
    drop(stream);

    if let Ok(mut guard) = wav.lock() {
        if let Some(writer) = guard.take() {
            if let Err(err) = writer.finalize() {
                warn!(error = %err, "failed to finalize debug recording");
            }
        }
    }
    debug!("capture thread exited");
}

fn open_stream(
    settings: &CaptureSettings,
    events: UnboundedSender<CaptureEvent>,
    gate: Arc<AtomicBool>,
    wav: SharedWavWriter,
) -> Result<(cpal::Stream, String, u32), CaptureError> {
    let host = cpal::default_host();
    let device = resolve_device(&host, settings.device.as_deref())?;
    let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
    let (config, sample_format) = select_config(&device, settings.target_rate)?;
    let source_rate = config.sample_rate.0;
    info!(
        device = %device_name,
        source_rate,
        target_rate = settings.target_rate,
        channels = config.channels,
        "opening input stream"
    );

    if let Some(path) = &settings.record_wav {
        let spec = WavSpec {
            channels: 1,
            sample_rate: settings.target_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let writer = WavWriter::create(path, spec)?;
        if let Ok(mut guard) = wav.lock() {
            *guard = Some(writer);
        }
    }

    let assembler = FrameAssembler::new(
        config.channels as usize,
        source_rate,
        settings.target_rate,
        settings.frame_samples,
    );

    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, assembler, events, gate, wav)?,
        SampleFormat::I16 => build_stream::<i16>(&device, &config, assembler, events, gate, wav)?,
        SampleFormat::U16 => build_stream::<u16>(&device, &config, assembler, events, gate, wav)?,
        other => return Err(CaptureError::UnsupportedFormat(other)),
    };
    stream.play()?;
    Ok((stream, device_name, source_rate))
}

fn resolve_device(host: &cpal::Host, wanted: Option<&str>) -> Result<Device, CaptureError> {
    match wanted {
        Some(name) => {
            for device in host.input_devices()? {
                if device.name().map(|n| n == name).unwrap_or(false) {
                    return Ok(device);
                }
            }
            Err(CaptureError::DeviceNotFound(name.to_string()))
        }
        None => host
            .default_input_device()
            .ok_or(CaptureError::NoDefaultDevice),
    }
}

/// Prefer a config that opens at the target rate with the fewest channels;
/// fall back to the device default and resample in the callback path.
fn select_config(
    device: &Device,
    target_rate: u32,
) -> Result<(StreamConfig, SampleFormat), CaptureError> {
    let mut best: Option<cpal::SupportedStreamConfig> = None;
    for range in device.supported_input_configs()? {
        if let Some(config) = range.try_with_sample_rate(SampleRate(target_rate)) {
            let better = match &best {
                Some(current) => config.channels() < current.channels(),
                None => true,
            };
            if better {
                best = Some(config);
            }
        }
    }
    let supported = match best {
        Some(config) => config,
        None => device.default_input_config()?,
    };
    let sample_format = supported.sample_format();
    Ok((supported.config(), sample_format))
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    mut assembler: FrameAssembler,
    events: UnboundedSender<CaptureEvent>,
    gate: Arc<AtomicBool>,
    wav: SharedWavWriter,
) -> Result<cpal::Stream, CaptureError>
where
    T: cpal::SizedSample,
    f32: cpal::FromSample<T>,
{
    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            // Audio may be captured while recognition is off; those blocks
            // are discarded here, before conversion or recording. Leftover
            // samples from before the gate closed go with them, so the next
            // session does not start with stale audio.
            if !gate.load(Ordering::Acquire) {
                assembler.reset();
                return;
            }
            let floats: Vec<f32> = data
                .iter()
                .map(|sample| cpal::Sample::from_sample(*sample))
                .collect();
            for frame in assembler.push(&floats) {
                if let Ok(mut guard) = wav.lock() {
                    if let Some(writer) = guard.as_mut() {
                        for sample in &frame {
                            let _ = writer.write_sample(*sample);
                        }
                    }
                }
                if events.send(CaptureEvent::Frame(frame)).is_err() {
                    return;
                }
            }
        },
        move |err| {
            warn!(error = %err, "input stream error");
        },
        None,
    )?;
    Ok(stream)
}

/// Groups raw interleaved input into fixed-size mono PCM frames at the target
/// rate. Pure, so framing and conversion are testable without a device.
struct FrameAssembler {
    channels: usize,
    source_rate: u32,
    target_rate: u32,
    frame_samples: usize,
    /// Mono samples at the source rate awaiting a full frame.
    pending: Vec<f32>,
    /// Source samples consumed per emitted frame.
    samples_per_frame: usize,
}

impl FrameAssembler {
    fn new(channels: usize, source_rate: u32, target_rate: u32, frame_samples: usize) -> Self {
        let samples_per_frame = ((frame_samples as u64 * source_rate as u64
            + target_rate as u64
            - 1)
            / target_rate as u64) as usize;
        Self {
            channels: channels.max(1),
            source_rate,
            target_rate,
            frame_samples,
            pending: Vec::new(),
            samples_per_frame: samples_per_frame.max(1),
        }
    }

    /// Discard samples awaiting a full frame.
    fn reset(&mut self) {
        self.pending.clear();
    }

    fn push(&mut self, interleaved: &[f32]) -> Vec<Vec<i16>> {
        let mono = downmix_to_mono(interleaved, self.channels);
        self.pending.extend_from_slice(&mono);

        let mut frames = Vec::new();
        while self.pending.len() >= self.samples_per_frame {
            let chunk: Vec<f32> = self.pending.drain(..self.samples_per_frame).collect();
            let mut resampled = resample_linear(&chunk, self.source_rate, self.target_rate);
            let pad = resampled.last().copied().unwrap_or(0.0);
            resampled.resize(self.frame_samples, pad);
            frames.push(pcm16_from_f32(&resampled));
        }
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_fixed_size_frames_at_matching_rates() {
        let mut assembler = FrameAssembler::new(1, 16_000, 16_000, 4);
        assert!(assembler.push(&[0.0, 0.0, 0.0]).is_empty());
        let frames = assembler.push(&[1.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], vec![0, 0, 0, 32_767]);
        assert_eq!(frames[1].len(), 4);
    }

    #[test]
    fn downmixes_stereo_input() {
        let mut assembler = FrameAssembler::new(2, 16_000, 16_000, 2);
        let frames = assembler.push(&[1.0, 0.0, -1.0, 0.0]);
        assert_eq!(frames, vec![vec![16_384, -16_384]]);
    }

    #[test]
    fn resamples_to_target_rate() {
        let mut assembler = FrameAssembler::new(1, 32_000, 16_000, 4);
        // Eight source samples produce one four-sample frame at half rate.
        let frames = assembler.push(&[0.0; 8]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), 4);
    }

    #[test]
    fn keeps_leftover_samples_for_the_next_block() {
        let mut assembler = FrameAssembler::new(1, 16_000, 16_000, 4);
        assert_eq!(assembler.push(&[0.5; 6]).len(), 1);
        // Two samples remain; two more complete the next frame.
        let frames = assembler.push(&[0.5; 2]);
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn reset_discards_leftover_samples() {
        let mut assembler = FrameAssembler::new(1, 16_000, 16_000, 4);
        assert!(assembler.push(&[1.0; 3]).is_empty());
        assembler.reset();
        // The first frame after a reset holds only fresh audio.
        let frames = assembler.push(&[0.0; 4]);
        assert_eq!(frames, vec![vec![0, 0, 0, 0]]);
    }

    #[test]
    fn close_reports_denial_for_unknown_device_without_hanging() {
        let (events, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let settings = CaptureSettings {
            device: Some("no such capture device".into()),
            target_rate: 16_000,
            frame_samples: 4,
            record_wav: None,
        };
        let mut handle =
            MicrophoneHandle::start(settings, events, Arc::new(AtomicBool::new(false)));
        // close() joins the thread, so the outcome is queued once it returns.
        handle.close();
        match rx.try_recv() {
            Ok(CaptureEvent::Failed(message)) => assert!(!message.is_empty()),
            other => panic!("expected capture failure, got {other:?}"),
        }
    }
}
