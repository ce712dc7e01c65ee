//! The meeting session manager facade.
//!
//! One [`MeetingSessionManager`] owns one logical meeting at a time: the
//! browser surface, the entry machine run, and the recording controller.
//! Every operation is serialized through a single async mutex, so
//! concurrent callers queue instead of racing on the shared browser and
//! recorder handles. The browser is provisioned lazily on the first join
//! and released on leave.
//!
//! The browser surface sits behind [`SessionDriver`], so tests drive the
//! whole facade against a [`ScriptedDriver`] with no Chromium involved.

use crate::browser::{MeetingPage, ScriptedPage, StealthBrowserSession};
use crate::config::SessionOptions;
use crate::entry::{EntryMachine, EntryOutcome};
use crate::error::{MeetError, MeetResult};
use crate::input::{DelayRange, HumanInput};
use crate::recording::{CaptureBackend, FfmpegCapture, RecordingController};
use crate::stealth::{BrowserIdentity, IdentityGenerator, Viewport};
use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// An open browser surface the manager borrows a page from.
#[async_trait]
pub trait DriverSession: Send + Sync {
    /// The single page this surface owns, lent for the duration of a call.
    fn page(&self) -> &dyn MeetingPage;

    /// Tears the surface down. The browser process must be gone afterward.
    async fn close(self: Box<Self>) -> MeetResult<()>;
}

/// Provisions browser surfaces for the manager.
#[async_trait]
pub trait SessionDriver: Send + Sync {
    /// Launches a surface configured with the given identity.
    async fn open(
        &self,
        identity: &BrowserIdentity,
        options: &SessionOptions,
    ) -> MeetResult<Box<dyn DriverSession>>;
}

/// Production driver backed by a stealth Chromium session.
pub struct ChromiumDriver;

impl ChromiumDriver {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ChromiumDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionDriver for ChromiumDriver {
    async fn open(
        &self,
        identity: &BrowserIdentity,
        options: &SessionOptions,
    ) -> MeetResult<Box<dyn DriverSession>> {
        let session = StealthBrowserSession::launch(identity.clone(), options).await?;
        let page = session.new_page().await?;
        Ok(Box::new(ChromiumSurface { session, page }))
    }
}

struct ChromiumSurface {
    session: StealthBrowserSession,
    page: crate::browser::CdpPage,
}

#[async_trait]
impl DriverSession for ChromiumSurface {
    fn page(&self) -> &dyn MeetingPage {
        &self.page
    }

    async fn close(self: Box<Self>) -> MeetResult<()> {
        self.session.close().await
    }
}

/// Driver that lends an in-process scripted page. For tests.
#[derive(Clone)]
pub struct ScriptedDriver {
    page: ScriptedPage,
    opened: std::sync::Arc<std::sync::Mutex<Vec<BrowserIdentity>>>,
}

impl ScriptedDriver {
    /// Wraps a pre-scripted page; the caller keeps a clone to inspect.
    pub fn new(page: ScriptedPage) -> Self {
        Self {
            page,
            opened: std::sync::Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    /// Identities each surface was opened with, in order. Clones of the
    /// driver share the log.
    pub fn opened_identities(&self) -> Vec<BrowserIdentity> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionDriver for ScriptedDriver {
    async fn open(
        &self,
        identity: &BrowserIdentity,
        _options: &SessionOptions,
    ) -> MeetResult<Box<dyn DriverSession>> {
        self.opened.lock().unwrap().push(identity.clone());
        Ok(Box::new(ScriptedSurface {
            page: self.page.clone(),
        }))
    }
}

struct ScriptedSurface {
    page: ScriptedPage,
}

#[async_trait]
impl DriverSession for ScriptedSurface {
    fn page(&self) -> &dyn MeetingPage {
        &self.page
    }

    async fn close(self: Box<Self>) -> MeetResult<()> {
        Ok(())
    }
}

/// Point-in-time view of the session, safe to expose to callers.
#[derive(Debug, Clone, Serialize)]
pub struct MeetingStatus {
    /// Whether admission has been confirmed and not yet left.
    pub is_in_meeting: bool,
    /// URL of the active meeting, if any.
    pub meeting_url: Option<String>,
    /// Whether a capture is running.
    pub is_recording: bool,
    /// Output path of the active capture, if any.
    pub recording_path: Option<PathBuf>,
}

struct ManagerInner {
    surface: Option<Box<dyn DriverSession>>,
    in_meeting: bool,
    meeting_url: Option<String>,
    recorder: RecordingController,
    shut_down: bool,
}

/// Facade over the whole engine for exactly one meeting at a time.
pub struct MeetingSessionManager {
    options: SessionOptions,
    driver: Box<dyn SessionDriver>,
    inner: Mutex<ManagerInner>,
}

impl MeetingSessionManager {
    /// Creates a manager using Chromium and ffmpeg.
    pub fn new(options: SessionOptions) -> Self {
        Self::with_driver(options, Box::new(ChromiumDriver::new()), Box::new(FfmpegCapture::new()))
    }

    /// Creates a manager with injected browser and capture backends.
    pub fn with_driver(
        options: SessionOptions,
        driver: Box<dyn SessionDriver>,
        capture: Box<dyn CaptureBackend>,
    ) -> Self {
        let recorder = RecordingController::new(capture, options.recording_dir.clone());
        Self {
            options,
            driver,
            inner: Mutex::new(ManagerInner {
                surface: None,
                in_meeting: false,
                meeting_url: None,
                recorder,
                shut_down: false,
            }),
        }
    }

    fn provision_identity(&self) -> BrowserIdentity {
        let mut generator = match self.options.rng_seed {
            Some(seed) => IdentityGenerator::seeded(seed),
            None => IdentityGenerator::new(),
        };
        let mut identity = generator.generate();
        if !self.options.randomize_viewport {
            identity.viewport = Viewport::new(1920, 1080);
        }
        identity
    }

    fn human_input(&self) -> HumanInput {
        let (min, max) = self.options.action_delay_ms;
        HumanInput::new(
            self.options.use_realistic_movements,
            DelayRange::new(min, max),
            self.options.rng_seed,
        )
    }

    /// Joins the meeting at `meeting_url`.
    ///
    /// Lazily launches the browser on first use. On failure the session
    /// state is unchanged: never "partially in meeting".
    pub async fn join(&self, meeting_url: &str) -> MeetResult<bool> {
        if meeting_url.trim().is_empty() {
            return Err(MeetError::MissingMeetingUrl);
        }

        let mut inner = self.inner.lock().await;
        if inner.shut_down {
            return Err(MeetError::SessionClosed);
        }
        if inner.in_meeting {
            return Err(MeetError::AlreadyInMeeting);
        }

        if inner.surface.is_none() {
            let identity = self.provision_identity();
            info!(
                platform = ?identity.platform,
                "provisioning browser for join"
            );
            inner.surface = Some(self.driver.open(&identity, &self.options).await?);
        }
        let surface = inner
            .surface
            .as_ref()
            .ok_or(MeetError::SessionClosed)?;

        let mut machine = EntryMachine::new(self.options.clone());
        let mut input = self.human_input();
        let outcome = machine.run(surface.page(), &mut input, meeting_url).await?;

        if let EntryOutcome::Exhausted(report) = outcome {
            warn!("entry strategies exhausted, relaunching on the minimal identity");
            if let Some(old) = inner.surface.take() {
                if let Err(e) = old.close().await {
                    warn!(error = %e, "browser close failed before relaunch");
                }
            }
            let fallback = IdentityGenerator::emergency();
            inner.surface = Some(self.driver.open(&fallback, &self.options).await?);
            let surface = inner.surface.as_ref().ok_or(MeetError::SessionClosed)?;
            machine
                .final_attempt(surface.page(), meeting_url, report.len())
                .await?;
        }

        inner.in_meeting = true;
        inner.meeting_url = Some(meeting_url.to_string());
        info!(url = meeting_url, "joined meeting");
        Ok(true)
    }

    /// Starts recording the live meeting.
    pub async fn start_recording(&self, duration_minutes: Option<u64>) -> MeetResult<PathBuf> {
        let mut inner = self.inner.lock().await;
        if inner.shut_down {
            return Err(MeetError::SessionClosed);
        }
        if !inner.in_meeting {
            return Err(MeetError::NotInMeeting);
        }
        inner.recorder.start(duration_minutes).await
    }

    /// Stops the active recording, returning its path.
    pub async fn stop_recording(&self) -> MeetResult<Option<PathBuf>> {
        let mut inner = self.inner.lock().await;
        if inner.shut_down {
            return Err(MeetError::SessionClosed);
        }
        if !inner.in_meeting {
            return Err(MeetError::NotInMeeting);
        }
        inner.recorder.stop().await
    }

    /// Leaves the meeting and releases every owned resource.
    ///
    /// Idempotent: safe on a manager that never joined, and safe to call
    /// repeatedly.
    pub async fn leave(&self) -> MeetResult<()> {
        let mut inner = self.inner.lock().await;
        Self::teardown(&mut inner).await;
        Ok(())
    }

    /// Leaves and marks the manager terminally closed. Every later
    /// operation except `leave` observes [`MeetError::SessionClosed`].
    pub async fn shutdown(&self) -> MeetResult<()> {
        let mut inner = self.inner.lock().await;
        Self::teardown(&mut inner).await;
        inner.shut_down = true;
        Ok(())
    }

    async fn teardown(inner: &mut ManagerInner) {
        if inner.recorder.is_recording() {
            if let Err(e) = inner.recorder.stop().await {
                warn!(error = %e, "recording stop during leave failed");
            }
        }
        if let Some(surface) = inner.surface.take() {
            if let Err(e) = surface.close().await {
                warn!(error = %e, "browser close during leave failed");
            }
        }
        inner.in_meeting = false;
        inner.meeting_url = None;
        info!("session left and reset");
    }

    /// Current session state. Pure read.
    pub async fn status(&self) -> MeetingStatus {
        let inner = self.inner.lock().await;
        MeetingStatus {
            is_in_meeting: inner.in_meeting,
            meeting_url: inner.meeting_url.clone(),
            is_recording: inner.recorder.is_recording(),
            recording_path: inner.recorder.current_path().map(|p| p.to_path_buf()),
        }
    }

    /// Joins and immediately starts recording.
    ///
    /// When the join fails, recording is never attempted and the join
    /// error surfaces unchanged.
    pub async fn join_and_record(
        &self,
        meeting_url: &str,
        duration_minutes: Option<u64>,
    ) -> MeetResult<PathBuf> {
        self.join(meeting_url).await?;
        self.start_recording(duration_minutes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::NullCapture;
    use tempfile::tempdir;

    fn manager_with(page: ScriptedPage, dir: &std::path::Path) -> MeetingSessionManager {
        let options = SessionOptions::new()
            .recording_dir(dir)
            .realistic_movements(false)
            .join_timeout_ms(200)
            .admission_timeout_ms(200)
            .rng_seed(7);
        MeetingSessionManager::with_driver(
            options,
            Box::new(ScriptedDriver::new(page)),
            Box::new(NullCapture::new()),
        )
    }

    #[tokio::test]
    async fn test_start_recording_before_join_is_rejected() {
        let dir = tempdir().unwrap();
        let manager = manager_with(ScriptedPage::new(), dir.path());
        assert!(matches!(
            manager.start_recording(None).await,
            Err(MeetError::NotInMeeting)
        ));
    }

    #[tokio::test]
    async fn test_leave_without_join_is_clean() {
        let dir = tempdir().unwrap();
        let manager = manager_with(ScriptedPage::new(), dir.path());
        manager.leave().await.unwrap();
        let status = manager.status().await;
        assert!(!status.is_in_meeting);
        assert_eq!(status.meeting_url, None);
    }

    #[tokio::test]
    async fn test_join_requires_url() {
        let dir = tempdir().unwrap();
        let manager = manager_with(ScriptedPage::new(), dir.path());
        assert!(matches!(
            manager.join("  ").await,
            Err(MeetError::MissingMeetingUrl)
        ));
    }

    #[tokio::test]
    async fn test_shutdown_closes_terminal() {
        let dir = tempdir().unwrap();
        let manager = manager_with(ScriptedPage::new(), dir.path());
        manager.shutdown().await.unwrap();
        assert!(matches!(
            manager.join("https://meet.example.com/abc").await,
            Err(MeetError::SessionClosed)
        ));
        assert!(matches!(
            manager.start_recording(None).await,
            Err(MeetError::SessionClosed)
        ));
        // leave stays safe after shutdown
        manager.leave().await.unwrap();
    }
}
