use std::env;
use std::path::PathBuf;

/// Top-level configuration derived from the environment and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_url: String,
    pub device: Option<String>,
    pub sample_rate: u32,
    pub frame_samples: usize,
    pub record_wav: Option<PathBuf>,
    pub auto_start: bool,
}

impl AppConfig {
    pub fn from_env_and_args() -> Self {
        let mut config = Self::from_env();
        config.apply_args(env::args().skip(1));
        config
    }

    fn from_env() -> Self {
        let server_url =
            env::var("ASR_SERVER_URL").unwrap_or_else(|_| "ws://127.0.0.1:8082/ws".to_string());
        let device = env::var("ASR_DEVICE")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        let sample_rate = env::var("ASR_SAMPLE_RATE")
            .ok()
            .and_then(|value| value.trim().parse::<u32>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(16_000);
        let frame_samples = env::var("ASR_FRAME_SAMPLES")
            .ok()
            .and_then(|value| value.trim().parse::<usize>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(4_096);
        let record_wav = env::var("ASR_RECORD_WAV")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);

        Self {
            server_url,
            device,
            sample_rate,
            frame_samples,
            record_wav,
            auto_start: false,
        }
    }

    fn apply_args<I>(&mut self, args: I)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let mut iter = args.into_iter().map(Into::into).peekable();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--server" | "--url" => {
                    if let Some(value) = iter.peek() {
                        self.server_url = value.clone();
                        iter.next();
                    }
                }
                "--device" => {
                    if let Some(value) = iter.peek() {
                        let trimmed = value.trim();
                        self.device = if trimmed.is_empty() {
                            None
                        } else {
                            Some(trimmed.to_string())
                        };
                        iter.next();
                    }
                }
                "--sample-rate" => {
                    if let Some(value) = iter.peek() {
                        if let Ok(parsed) = value.trim().parse::<u32>() {
                            if parsed > 0 {
                                self.sample_rate = parsed;
                            }
                        }
                        iter.next();
                    }
                }
                "--frame-samples" => {
                    if let Some(value) = iter.peek() {
                        if let Ok(parsed) = value.trim().parse::<usize>() {
                            if parsed > 0 {
                                self.frame_samples = parsed;
                            }
                        }
                        iter.next();
                    }
                }
                "--record" => {
                    if let Some(value) = iter.peek() {
                        let trimmed = value.trim();
                        self.record_wav = if trimmed.is_empty() {
                            None
                        } else {
                            Some(PathBuf::from(trimmed))
                        };
                        iter.next();
                    }
                }
                "--auto-start" => {
                    self.auto_start = true;
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arguments_override_environment_defaults() {
        let mut config = AppConfig::from_env();
        config.apply_args([
            "--server",
            "ws://example.org:9000/ws",
            "--device",
            "USB Microphone",
            "--sample-rate",
            "8000",
            "--frame-samples",
            "2048",
            "--record",
            "/tmp/session.wav",
            "--auto-start",
        ]);
        assert_eq!(config.server_url, "ws://example.org:9000/ws");
        assert_eq!(config.device.as_deref(), Some("USB Microphone"));
        assert_eq!(config.sample_rate, 8_000);
        assert_eq!(config.frame_samples, 2_048);
        assert_eq!(config.record_wav, Some(PathBuf::from("/tmp/session.wav")));
        assert!(config.auto_start);
    }

    #[test]
    fn zero_rates_are_rejected() {
        let mut config = AppConfig::from_env();
        let default_rate = config.sample_rate;
        let default_frame = config.frame_samples;
        config.apply_args(["--sample-rate", "0", "--frame-samples", "0"]);
        assert_eq!(config.sample_rate, default_rate);
        assert_eq!(config.frame_samples, default_frame);
    }

    #[test]
    fn blank_device_argument_clears_device() {
        let mut config = AppConfig::from_env();
        config.device = Some("built-in".into());
        config.apply_args(["--device", " "]);
        assert!(config.device.is_none());
    }
}
