//! External-player driver (C10) — the only component permitted to spawn a
//! subprocess.
//!
//! Grounded on `examples/other_examples` anitrack-cli's subprocess-launch
//! idiom (`Command::new(..).stdin(Stdio::inherit())...status()` wrapped in
//! a coarse result) and on the mpv invocation settings from the original
//! `utils/video_player.py` (fullscreen, cursor-autohide, large demuxer
//! cache, yt-dlp format selection, 1.8x default speed). The Python original
//! drives `python-mpv` in-process; this crate has no libmpv binding in its
//! dependency stack, so the same settings are expressed as `mpv` CLI flags
//! against a plain subprocess instead.

use std::process::{Command, ExitStatus};

use crate::catalog::types::VideoStream;
use crate::config::PlayerSettings;

/// Coarse playback outcome (§4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    /// Normal end of stream, or the user quit cleanly.
    Ok,
    /// The user aborted before completion (non-zero "shutdown" exit).
    Aborted,
    /// Process failed to launch, or exited with an error code.
    Error,
}

/// Launches the configured external player against a resolved stream and
/// blocks until it exits.
pub struct ExternalPlayerDriver {
    settings: PlayerSettings,
}

impl ExternalPlayerDriver {
    pub fn new(settings: PlayerSettings) -> Self {
        Self { settings }
    }

    /// Builds the mpv argument vector for `stream` (§4.10): fullscreen,
    /// autohide cursor in fullscreen only, ytdl-backed caching tuned for
    /// long readahead, 1.8x default speed, on-screen controller enabled.
    fn build_args(&self, stream: &VideoStream) -> Vec<String> {
        let mut args = vec![
            "--fullscreen".to_string(),
            "--cursor-autohide-fs-only".to_string(),
            "--ytdl=yes".to_string(),
            "--ytdl-format=bestvideo[height<=1080]+bestaudio/best".to_string(),
            "--ytdl-raw-options=concurrent-fragments=5".to_string(),
            "--cache=yes".to_string(),
            "--demuxer-max-bytes=400M".to_string(),
            "--demuxer-max-back-bytes=100M".to_string(),
            "--demuxer-readahead-secs=40".to_string(),
            "--stream-buffer-size=2M".to_string(),
            "--speed=1.8".to_string(),
            "--input-default-bindings=yes".to_string(),
            "--input-vo-keyboard=yes".to_string(),
            "--osc=yes".to_string(),
        ];

        for (name, value) in &stream.headers {
            args.push(format!("--http-header-fields={name}: {value}"));
        }
        args.extend(self.settings.extra_args.iter().cloned());
        args.push(stream.url.clone());
        args
    }

    /// Blocks until the player exits (§5 "suspends for the entire
    /// subprocess lifetime"). Never panics on a missing binary or a
    /// non-zero exit — both degrade to [`PlaybackStatus::Error`].
    pub fn play(&self, stream: &VideoStream) -> PlaybackStatus {
        let args = self.build_args(stream);
        let status = Command::new(&self.settings.binary)
            .args(&args)
            .stdin(std::process::Stdio::inherit())
            .stdout(std::process::Stdio::inherit())
            .stderr(std::process::Stdio::inherit())
            .status();

        match status {
            Ok(status) => Self::classify(status),
            Err(e) => {
                log::warn!("failed to launch player '{}': {e}", self.settings.binary);
                PlaybackStatus::Error
            }
        }
    }

    fn classify(status: ExitStatus) -> PlaybackStatus {
        match status.code() {
            Some(0) => PlaybackStatus::Ok,
            Some(2) => PlaybackStatus::Error,
            Some(3) => PlaybackStatus::Aborted,
            Some(_) => PlaybackStatus::Error,
            None => PlaybackStatus::Aborted,
        }
    }
}
