//! The meeting-entry state machine.
//!
//! Joining is modeled as an explicit state machine driven once per
//! strategy. A strategy is one self-contained attempt to reach admission
//! via a particular approach (direct navigation, a warm-up visit to the
//! provider landing page first, or provider pre-authentication). Strategy
//! order is shuffled per run so repeated joins do not show a fixed
//! navigation pattern. Strategy-local failures move on to the next
//! strategy; exhaustion is reported as a typed outcome so the caller can
//! relaunch on a minimal identity for [`EntryMachine::final_attempt`],
//! and only that last resort failing surfaces [`MeetError::JoinFailed`].

use crate::browser::{CookieSpec, ElementRef, MeetingPage};
use crate::config::SessionOptions;
use crate::entry::probes::{ProbeCatalog, ProbeSet};
use crate::error::{MeetError, MeetResult};
use crate::input::{DelayRange, HumanInput};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Upper bound on challenge interstitials resolved during one login.
const MAX_LOGIN_CHALLENGES: usize = 4;

/// Where one entry attempt currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    NotStarted,
    Navigating,
    CheckingAdmissionPath,
    HandlingProviderLogin,
    HandlingGuestEntry,
    AwaitingJoinControl,
    Admitted,
}

/// One navigation approach for reaching the pre-join screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// Navigate straight to the meeting URL.
    Direct,
    /// Visit the provider landing page first, seed consent cookies, then
    /// navigate to the meeting.
    WarmUp,
    /// Sign in on the provider accounts domain before opening the meeting.
    /// Degrades to direct navigation without credentials.
    PreAuth,
}

impl StrategyKind {
    /// Stable name used in log lines and screenshot filenames.
    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::Direct => "direct",
            StrategyKind::WarmUp => "warm-up",
            StrategyKind::PreAuth => "pre-auth",
        }
    }
}

/// Outcome of one strategy, kept for the run report.
#[derive(Debug)]
pub struct StrategyAttempt {
    /// Which strategy ran.
    pub strategy: &'static str,
    /// The strategy-local error, if it failed.
    pub error: Option<MeetError>,
}

/// What a full strategy pass produced.
#[derive(Debug)]
pub enum EntryOutcome {
    /// One strategy reached admission; the report covers every attempt.
    Admitted(Vec<StrategyAttempt>),
    /// Every strategy failed locally. The caller decides how to launch
    /// the surface for [`EntryMachine::final_attempt`].
    Exhausted(Vec<StrategyAttempt>),
}

/// Drives a lent page through the entry protocol until admitted.
pub struct EntryMachine {
    options: SessionOptions,
    rng: StdRng,
    state: EntryState,
}

impl EntryMachine {
    /// Creates a machine for one join call.
    ///
    /// With `rng_seed` set in the options, strategy order and the
    /// permissive fallback are fully reproducible.
    pub fn new(options: SessionOptions) -> Self {
        let rng = match options.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            options,
            rng,
            state: EntryState::NotStarted,
        }
    }

    /// Current state, for observability.
    pub fn state(&self) -> EntryState {
        self.state
    }

    fn set_state(&mut self, state: EntryState) {
        debug!(from = ?self.state, to = ?state, "entry state transition");
        self.state = state;
    }

    /// Runs strategies until one is admitted or all are exhausted.
    ///
    /// Strategy-local failures are screenshotted and recorded in the
    /// report; anything else aborts the run. Exhaustion is not an error
    /// here: the caller relaunches on a minimal identity and makes the
    /// last-resort [`Self::final_attempt`].
    pub async fn run(
        &mut self,
        page: &dyn MeetingPage,
        input: &mut HumanInput,
        meeting_url: &str,
    ) -> MeetResult<EntryOutcome> {
        let mut strategies = [StrategyKind::Direct, StrategyKind::WarmUp, StrategyKind::PreAuth];
        strategies.shuffle(&mut self.rng);

        let catalog = ProbeCatalog::standard();
        let mut report = Vec::new();

        for strategy in strategies {
            info!(strategy = strategy.name(), "trying entry strategy");
            match self
                .attempt(page, input, meeting_url, strategy, &catalog)
                .await
            {
                Ok(()) => {
                    report.push(StrategyAttempt {
                        strategy: strategy.name(),
                        error: None,
                    });
                    return Ok(EntryOutcome::Admitted(report));
                }
                Err(e) if e.is_strategy_local() => {
                    warn!(strategy = strategy.name(), error = %e, "strategy failed");
                    self.capture_failure(page, strategy.name()).await;
                    report.push(StrategyAttempt {
                        strategy: strategy.name(),
                        error: Some(e),
                    });
                }
                Err(e) => {
                    self.capture_failure(page, strategy.name()).await;
                    return Err(e);
                }
            }
        }

        info!("every entry strategy failed");
        Ok(EntryOutcome::Exhausted(report))
    }

    /// The last resort after exhaustion: one low-stealth pass with the
    /// widest probe catalog and humanized input disabled, on a page the
    /// caller relaunched with the minimal identity. `prior_attempts` is
    /// the exhausted report's length and feeds the failure count.
    pub async fn final_attempt(
        &mut self,
        page: &dyn MeetingPage,
        meeting_url: &str,
        prior_attempts: usize,
    ) -> MeetResult<()> {
        info!("making one permissive attempt on the fallback identity");
        let mut plain_input =
            HumanInput::new(false, DelayRange::action(), self.options.rng_seed);
        match self
            .attempt(
                page,
                &mut plain_input,
                meeting_url,
                StrategyKind::Direct,
                &ProbeCatalog::permissive(),
            )
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if e.is_strategy_local() => {
                warn!(error = %e, "permissive attempt failed");
                self.capture_failure(page, "permissive").await;
                Err(MeetError::JoinFailed {
                    attempts: prior_attempts + 1,
                })
            }
            Err(e) => {
                self.capture_failure(page, "permissive").await;
                Err(e)
            }
        }
    }

    /// One full protocol pass for one strategy.
    async fn attempt(
        &mut self,
        page: &dyn MeetingPage,
        input: &mut HumanInput,
        meeting_url: &str,
        strategy: StrategyKind,
        catalog: &ProbeCatalog,
    ) -> MeetResult<()> {
        self.set_state(EntryState::Navigating);
        self.navigate(page, input, meeting_url, strategy, catalog)
            .await?;
        input.pause().await;

        self.set_state(EntryState::CheckingAdmissionPath);
        if catalog.error.detect(page).await?.is_some() {
            return Err(MeetError::AdmissionDenied);
        }

        let login_control = catalog.login.detect(page).await?;
        let guest_control = catalog.guest.detect(page).await?;

        // login wins when credentialed, otherwise guest entry
        if let Some(login) = login_control {
            if self.options.has_credentials() {
                self.set_state(EntryState::HandlingProviderLogin);
                input.click_element(page, &login).await?;
                input.pause().await;
                self.login_flow(page, input, catalog).await?;
            } else if let Some(guest) = guest_control {
                self.guest_entry(page, input, catalog, &guest).await?;
            }
        } else if let Some(guest) = guest_control {
            self.guest_entry(page, input, catalog, &guest).await?;
        }

        self.set_state(EntryState::AwaitingJoinControl);
        let join = self
            .wait_for(page, &catalog.join, self.options.join_timeout_ms)
            .await?
            .ok_or(MeetError::JoinControlNotFound)?;

        self.apply_device_state(page, input, catalog).await?;

        input.click_element(page, &join).await?;

        let admitted = self
            .wait_for(page, &catalog.admitted, self.options.admission_timeout_ms)
            .await?;
        if admitted.is_none() {
            return Err(MeetError::AdmissionNotConfirmed);
        }

        self.set_state(EntryState::Admitted);
        info!(strategy = strategy.name(), "admission confirmed");
        Ok(())
    }

    async fn navigate(
        &mut self,
        page: &dyn MeetingPage,
        input: &mut HumanInput,
        meeting_url: &str,
        strategy: StrategyKind,
        catalog: &ProbeCatalog,
    ) -> MeetResult<()> {
        match strategy {
            StrategyKind::Direct => page.goto(meeting_url).await?,
            StrategyKind::WarmUp => {
                if let Some(root) = provider_root(meeting_url) {
                    page.goto(&root).await?;
                    input.pause().await;
                    if let Some(host) = host_of(meeting_url) {
                        let consent =
                            CookieSpec::new("CONSENT", "YES+cb", &format!(".{}", host));
                        page.set_cookies(&[consent]).await?;
                    }
                }
                page.goto(meeting_url).await?;
            }
            StrategyKind::PreAuth => {
                if self.options.has_credentials() {
                    if let Some(host) = host_of(meeting_url) {
                        let accounts = format!("https://accounts.{}", base_domain(&host));
                        page.goto(&accounts).await?;
                        input.pause().await;
                        self.login_flow(page, input, catalog).await?;
                    }
                }
                page.goto(meeting_url).await?;
            }
        }
        Ok(())
    }

    /// Guest path: click the affordance, give the name field a bounded
    /// chance to appear, type the guest name if it does. A missing name
    /// field is a normal branch, some meetings admit anonymously.
    async fn guest_entry(
        &mut self,
        page: &dyn MeetingPage,
        input: &mut HumanInput,
        catalog: &ProbeCatalog,
        guest_control: &ElementRef,
    ) -> MeetResult<()> {
        self.set_state(EntryState::HandlingGuestEntry);
        input.click_element(page, guest_control).await?;
        input.pause().await;

        let field_wait = self.options.join_timeout_ms.min(5_000);
        if let Some(field) = self.wait_for(page, &catalog.name_field, field_wait).await? {
            let guest_name = self.options.guest_name.clone();
            input.type_in_element(page, &field, &guest_name).await?;
            input.pause().await;
        } else {
            debug!("no name field presented, proceeding anonymously");
        }
        Ok(())
    }

    /// Provider sign-in: email, advance, password, advance, then resolve
    /// dismissable interstitials. A verification challenge is unrecoverable
    /// inside this strategy.
    async fn login_flow(
        &mut self,
        page: &dyn MeetingPage,
        input: &mut HumanInput,
        catalog: &ProbeCatalog,
    ) -> MeetResult<()> {
        let Some(credentials) = self.options.credentials.clone() else {
            return Ok(());
        };

        let wait = self.options.join_timeout_ms;
        let email_field = self
            .wait_for(page, &catalog.email_field, wait)
            .await?
            .ok_or_else(|| MeetError::ElementNotFound("sign-in email field".to_string()))?;
        input
            .type_in_element(page, &email_field, &credentials.email)
            .await?;
        if let Some(next) = catalog.next_button.detect(page).await? {
            input.click_element(page, &next).await?;
        }
        input.pause().await;

        let password_field = self
            .wait_for(page, &catalog.password_field, wait)
            .await?
            .ok_or_else(|| MeetError::ElementNotFound("sign-in password field".to_string()))?;
        input
            .type_in_element(page, &password_field, &credentials.password)
            .await?;
        if let Some(next) = catalog.next_button.detect(page).await? {
            input.click_element(page, &next).await?;
        }
        input.pause().await;

        for _ in 0..MAX_LOGIN_CHALLENGES {
            if catalog.two_factor.detect(page).await?.is_some() {
                warn!("verification challenge detected during sign-in");
                return Err(MeetError::ManualInterventionRequired);
            }
            match catalog.interstitial.detect(page).await? {
                Some(interstitial) => {
                    debug!("dismissing sign-in interstitial");
                    input.click_element(page, &interstitial).await?;
                    input.pause().await;
                }
                None => break,
            }
        }
        Ok(())
    }

    /// Toggles camera and microphone only when the control's reported
    /// state differs from the requested one. An already-correct control is
    /// left alone; clicking it would flip it wrong.
    async fn apply_device_state(
        &mut self,
        page: &dyn MeetingPage,
        input: &mut HumanInput,
        catalog: &ProbeCatalog,
    ) -> MeetResult<()> {
        let camera_enabled = self.options.camera_enabled;
        let mic_enabled = self.options.mic_enabled;
        self.apply_device_toggle(page, input, &catalog.camera, camera_enabled)
            .await?;
        self.apply_device_toggle(page, input, &catalog.microphone, mic_enabled)
            .await?;
        Ok(())
    }

    async fn apply_device_toggle(
        &mut self,
        page: &dyn MeetingPage,
        input: &mut HumanInput,
        set: &ProbeSet,
        want_enabled: bool,
    ) -> MeetResult<()> {
        let Some(control) = set.detect(page).await? else {
            return Ok(());
        };
        // unknown state: leave the control alone rather than blind-toggle
        let Some(muted) = control.attr("data-is-muted") else {
            debug!(control = set.name(), "device control exposes no state, skipping");
            return Ok(());
        };
        let currently_enabled = muted == "false";
        if currently_enabled != want_enabled {
            debug!(control = set.name(), enable = want_enabled, "toggling device");
            input.click_element(page, &control).await?;
            input.pause().await;
        }
        Ok(())
    }

    /// Polls a probe set until it hits or the timeout elapses.
    async fn wait_for(
        &self,
        page: &dyn MeetingPage,
        set: &ProbeSet,
        timeout_ms: u64,
    ) -> MeetResult<Option<ElementRef>> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        let interval = Duration::from_millis((timeout_ms / 12).clamp(20, 250));
        loop {
            if let Some(element) = set.detect(page).await? {
                return Ok(Some(element));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// Screenshots the page for offline diagnosis of UI drift. Failure to
    /// capture is logged, never surfaced.
    async fn capture_failure(&self, page: &dyn MeetingPage, strategy: &str) {
        if let Err(e) = tokio::fs::create_dir_all(&self.options.recording_dir).await {
            warn!(error = %e, "could not create screenshot directory");
            return;
        }
        let timestamp = Utc::now().format("%Y%m%d-%H%M%S%.3f");
        let path = self
            .options
            .recording_dir
            .join(format!("join-failure-{}-{}.png", strategy, timestamp));
        match page.screenshot(&path).await {
            Ok(()) => info!(path = %path.display(), "captured failure screenshot"),
            Err(e) => warn!(error = %e, "failure screenshot could not be captured"),
        }
    }
}

/// `https://meet.example.com/abc` -> `https://meet.example.com`
fn provider_root(url: &str) -> Option<String> {
    let host = host_of(url)?;
    let scheme_end = url.find("://")?;
    Some(format!("{}://{}", &url[..scheme_end], host))
}

/// `https://meet.example.com/abc` -> `meet.example.com`
fn host_of(url: &str) -> Option<String> {
    let rest = url.split_once("://")?.1;
    let host = rest.split('/').next()?;
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

/// `meet.example.com` -> `example.com`
fn base_domain(host: &str) -> String {
    let parts: Vec<&str> = host.split('.').collect();
    if parts.len() <= 2 {
        host.to_string()
    } else {
        parts[parts.len() - 2..].join(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_helpers() {
        assert_eq!(
            provider_root("https://meet.example.com/abc-defg-hij").as_deref(),
            Some("https://meet.example.com")
        );
        assert_eq!(
            host_of("https://meet.example.com/abc").as_deref(),
            Some("meet.example.com")
        );
        assert_eq!(base_domain("meet.example.com"), "example.com");
        assert_eq!(base_domain("example.com"), "example.com");
        assert!(provider_root("not a url").is_none());
    }

    #[test]
    fn test_strategy_names() {
        assert_eq!(StrategyKind::Direct.name(), "direct");
        assert_eq!(StrategyKind::WarmUp.name(), "warm-up");
        assert_eq!(StrategyKind::PreAuth.name(), "pre-auth");
    }

    #[test]
    fn test_machine_starts_not_started() {
        let machine = EntryMachine::new(SessionOptions::default());
        assert_eq!(machine.state(), EntryState::NotStarted);
    }

    #[test]
    fn test_seeded_machines_shuffle_identically() {
        let mut rng_a = StdRng::seed_from_u64(77);
        let mut rng_b = StdRng::seed_from_u64(77);
        let mut order_a = [StrategyKind::Direct, StrategyKind::WarmUp, StrategyKind::PreAuth];
        let mut order_b = order_a;
        order_a.shuffle(&mut rng_a);
        order_b.shuffle(&mut rng_b);
        assert_eq!(order_a, order_b);
    }
}
