//! Screen-and-audio capture of the live meeting.
//!
//! [`RecordingController`] enforces the single-active-recording rule and
//! owns output naming; the actual capture runs behind [`CaptureBackend`]
//! so tests swap in [`NullCapture`] instead of spawning ffmpeg. Internal
//! state is cleared before the underlying stop is awaited, so a second
//! stop or start arriving while the first stop is still settling observes
//! "not recording" instead of racing on the same handle.

use crate::error::{MeetError, MeetResult};
use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Grace period between asking the capture tool to finish and killing it.
const STOP_GRACE: Duration = Duration::from_secs(5);

/// A running capture that can be stopped.
#[async_trait]
pub trait CaptureHandle: Send {
    /// Stops the capture and waits for the output file to be finalized.
    async fn stop(self: Box<Self>) -> MeetResult<()>;
}

/// Spawns and checks one kind of capture tool.
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Checks the tool is usable on this host. Called once per start.
    fn availability(&self) -> Result<(), String>;

    /// Starts a capture writing to `output`, optionally self-capped at
    /// `duration`. The cap never replaces an explicit stop call.
    async fn start(
        &self,
        output: &Path,
        duration: Option<Duration>,
    ) -> MeetResult<Box<dyn CaptureHandle>>;

    /// Extension of the files this backend produces.
    fn file_extension(&self) -> &'static str {
        "mp4"
    }
}

/// Captures the desktop via ffmpeg.
pub struct FfmpegCapture;

impl FfmpegCapture {
    pub fn new() -> Self {
        Self
    }

    fn grab_args(output: &Path, duration: Option<Duration>) -> Vec<String> {
        let mut args: Vec<String> = vec!["-y".into()];

        if cfg!(target_os = "macos") {
            args.extend(["-f".into(), "avfoundation".into(), "-i".into(), "1:0".into()]);
        } else if cfg!(target_os = "windows") {
            args.extend(["-f".into(), "gdigrab".into(), "-i".into(), "desktop".into()]);
        } else {
            let display = std::env::var("DISPLAY").unwrap_or_else(|_| ":0".to_string());
            args.extend([
                "-f".into(),
                "x11grab".into(),
                "-framerate".into(),
                "25".into(),
                "-i".into(),
                format!("{}.0", display),
                "-f".into(),
                "pulse".into(),
                "-i".into(),
                "default".into(),
            ]);
        }

        if let Some(duration) = duration {
            args.extend(["-t".into(), duration.as_secs().to_string()]);
        }

        args.extend([
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            "ultrafast".into(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            output.to_string_lossy().into_owned(),
        ]);
        args
    }
}

impl Default for FfmpegCapture {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaptureBackend for FfmpegCapture {
    fn availability(&self) -> Result<(), String> {
        which::which("ffmpeg")
            .map(|_| ())
            .map_err(|_| "ffmpeg not found on PATH".to_string())
    }

    async fn start(
        &self,
        output: &Path,
        duration: Option<Duration>,
    ) -> MeetResult<Box<dyn CaptureHandle>> {
        let args = Self::grab_args(output, duration);
        debug!(?args, "spawning ffmpeg");
        let child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MeetError::RecorderUnavailable(format!("ffmpeg spawn failed: {}", e)))?;
        Ok(Box::new(FfmpegHandle { child }))
    }
}

struct FfmpegHandle {
    child: Child,
}

#[async_trait]
impl CaptureHandle for FfmpegHandle {
    async fn stop(mut self: Box<Self>) -> MeetResult<()> {
        // "q" on stdin lets ffmpeg finalize the container
        if let Some(stdin) = self.child.stdin.as_mut() {
            let _ = stdin.write_all(b"q").await;
            let _ = stdin.flush().await;
        }
        match tokio::time::timeout(STOP_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => {
                debug!(?status, "ffmpeg exited");
                Ok(())
            }
            Ok(Err(e)) => Err(MeetError::RecorderUnavailable(format!(
                "ffmpeg wait failed: {}",
                e
            ))),
            Err(_) => {
                warn!("ffmpeg did not exit in time, killing it");
                let _ = self.child.kill().await;
                Ok(())
            }
        }
    }
}

/// Backend that writes an empty file and records stop calls. For tests.
pub struct NullCapture {
    stopped: Arc<AtomicBool>,
}

impl NullCapture {
    pub fn new() -> Self {
        Self {
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether a handle spawned by this backend has been stopped.
    pub fn was_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl Default for NullCapture {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaptureBackend for NullCapture {
    fn availability(&self) -> Result<(), String> {
        Ok(())
    }

    async fn start(
        &self,
        output: &Path,
        _duration: Option<Duration>,
    ) -> MeetResult<Box<dyn CaptureHandle>> {
        tokio::fs::write(output, b"")
            .await
            .map_err(|e| MeetError::io(output, e))?;
        Ok(Box::new(NullHandle {
            stopped: Arc::clone(&self.stopped),
        }))
    }
}

struct NullHandle {
    stopped: Arc<AtomicBool>,
}

#[async_trait]
impl CaptureHandle for NullHandle {
    async fn stop(self: Box<Self>) -> MeetResult<()> {
        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct ActiveRecording {
    path: PathBuf,
    handle: Box<dyn CaptureHandle>,
}

/// Owns at most one active capture and its output file naming.
pub struct RecordingController {
    backend: Box<dyn CaptureBackend>,
    recording_dir: PathBuf,
    active: Option<ActiveRecording>,
}

impl RecordingController {
    /// Creates a controller writing under `recording_dir`.
    pub fn new(backend: Box<dyn CaptureBackend>, recording_dir: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            recording_dir: recording_dir.into(),
            active: None,
        }
    }

    /// Whether a capture is currently active.
    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    /// Path of the active recording, if any.
    pub fn current_path(&self) -> Option<&Path> {
        self.active.as_ref().map(|a| a.path.as_path())
    }

    /// Starts a capture, optionally self-capped at `duration_minutes`.
    ///
    /// Output files are timestamp-named so repeated starts within one
    /// process never collide.
    pub async fn start(&mut self, duration_minutes: Option<u64>) -> MeetResult<PathBuf> {
        if self.active.is_some() {
            return Err(MeetError::AlreadyRecording);
        }
        self.backend
            .availability()
            .map_err(MeetError::RecorderUnavailable)?;

        tokio::fs::create_dir_all(&self.recording_dir)
            .await
            .map_err(|e| MeetError::io(&self.recording_dir, e))?;

        let timestamp = Utc::now().format("%Y%m%d-%H%M%S%.3f");
        let path = self.recording_dir.join(format!(
            "recording-{}.{}",
            timestamp,
            self.backend.file_extension()
        ));

        let duration = duration_minutes.map(|m| Duration::from_secs(m * 60));
        let handle = self.backend.start(&path, duration).await?;
        info!(path = %path.display(), capped = duration_minutes.is_some(), "recording started");

        self.active = Some(ActiveRecording {
            path: path.clone(),
            handle,
        });
        Ok(path)
    }

    /// Stops the active capture. Returns `None` when nothing is recording,
    /// which is not an error.
    ///
    /// Active state is taken before the handle stop is awaited, and a
    /// failed stop still leaves the controller idle so it can never get
    /// stuck believing a dead process is recording.
    pub async fn stop(&mut self) -> MeetResult<Option<PathBuf>> {
        let Some(active) = self.active.take() else {
            return Ok(None);
        };
        let result = active.handle.stop().await;
        if let Err(e) = result {
            warn!(error = %e, "capture stop failed, state cleared anyway");
            return Err(e);
        }
        info!(path = %active.path.display(), "recording stopped");
        Ok(Some(active.path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_stop_without_start_is_none() {
        let dir = tempdir().unwrap();
        let mut controller = RecordingController::new(Box::new(NullCapture::new()), dir.path());
        assert_eq!(controller.stop().await.unwrap(), None);
        assert!(!controller.is_recording());
    }

    #[tokio::test]
    async fn test_double_start_is_rejected() {
        let dir = tempdir().unwrap();
        let mut controller = RecordingController::new(Box::new(NullCapture::new()), dir.path());

        let first = controller.start(None).await.unwrap();
        let second = controller.start(None).await;
        assert!(matches!(second, Err(MeetError::AlreadyRecording)));
        // the first recording is untouched
        assert_eq!(controller.current_path(), Some(first.as_path()));
    }

    #[tokio::test]
    async fn test_start_stop_round_trip() {
        let dir = tempdir().unwrap();
        let mut controller = RecordingController::new(Box::new(NullCapture::new()), dir.path());

        let started = controller.start(Some(5)).await.unwrap();
        assert!(started.extension().is_some_and(|e| e == "mp4"));
        assert!(started.exists());
        assert!(controller.is_recording());

        let stopped = controller.stop().await.unwrap();
        assert_eq!(stopped, Some(started));
        assert!(!controller.is_recording());
        assert_eq!(controller.stop().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unavailable_backend_fails_start() {
        struct Broken;
        #[async_trait]
        impl CaptureBackend for Broken {
            fn availability(&self) -> Result<(), String> {
                Err("no tool".to_string())
            }
            async fn start(
                &self,
                _output: &Path,
                _duration: Option<Duration>,
            ) -> MeetResult<Box<dyn CaptureHandle>> {
                unreachable!()
            }
        }

        let dir = tempdir().unwrap();
        let mut controller = RecordingController::new(Box::new(Broken), dir.path());
        assert!(matches!(
            controller.start(None).await,
            Err(MeetError::RecorderUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_null_backend_observes_stop() {
        let backend = NullCapture::new();
        let dir = tempdir().unwrap();
        let handle = backend
            .start(&dir.path().join("out.mp4"), None)
            .await
            .unwrap();
        assert!(!backend.was_stopped());
        handle.stop().await.unwrap();
        assert!(backend.was_stopped());
    }

    #[test]
    fn test_grab_args_include_duration_cap() {
        let args = FfmpegCapture::grab_args(Path::new("/tmp/out.mp4"), Some(Duration::from_secs(300)));
        let joined = args.join(" ");
        assert!(joined.contains("-t 300"));
        assert!(joined.ends_with("/tmp/out.mp4"));
    }
}
