//! End-to-end join scenarios against a scripted meeting DOM.
//!
//! The full facade runs here: manager, entry machine, probes, humanized
//! input, and the recording controller, with only the browser and the
//! capture tool swapped for in-process doubles.

use meetbot::browser::{ClickEffect, ScriptedElement, ScriptedPage};
use meetbot::config::SessionOptions;
use meetbot::error::MeetError;
use meetbot::recording::NullCapture;
use meetbot::session::{MeetingSessionManager, ScriptedDriver};
use meetbot::stealth::IdentityGenerator;
use std::time::Duration;
use tempfile::tempdir;

const MEETING_URL: &str = "https://meet.example.com/abc-defg-hij";

/// A pre-join screen that admits guests: guest affordance, then a name
/// field, then an ask-to-join control that reveals the participants panel
/// a little after the click.
fn guest_meeting_page() -> ScriptedPage {
    let page = ScriptedPage::new();
    page.add_element(
        ScriptedElement::new("button.guest", "Join as a guest")
            .attr("aria-label", "Join as a guest")
            .on_click(ClickEffect::Reveal("input.name".into())),
    );
    page.add_element(
        ScriptedElement::new("input.name", "")
            .hidden()
            .attr("aria-label", "Your name"),
    );
    page.add_element(
        ScriptedElement::new("button.camera", "")
            .attr("aria-label", "Turn off camera (ctrl + e)")
            .attr("data-is-muted", "false")
            .on_click(ClickEffect::SetAttribute(
                "button.camera".into(),
                "data-is-muted".into(),
                "true".into(),
            )),
    );
    page.add_element(
        ScriptedElement::new("button.mic", "")
            .attr("aria-label", "Turn off microphone (ctrl + d)")
            .attr("data-is-muted", "true"),
    );
    page.add_element(
        ScriptedElement::new("button.join", "Ask to join")
            .attr("aria-label", "Ask to join")
            .on_click(ClickEffect::RevealAfter(
                "div.people".into(),
                Duration::from_secs(2),
            )),
    );
    page.add_element(
        ScriptedElement::new("div.people", "")
            .hidden()
            .attr("aria-label", "Show everyone"),
    );
    page
}

fn manager_for(page: ScriptedPage, dir: &std::path::Path) -> MeetingSessionManager {
    let options = SessionOptions::new()
        .guest_name("Test Guest")
        .recording_dir(dir)
        .realistic_movements(false)
        .rng_seed(42);
    MeetingSessionManager::with_driver(
        options,
        Box::new(ScriptedDriver::new(page)),
        Box::new(NullCapture::new()),
    )
}

#[tokio::test(start_paused = true)]
async fn guest_entry_reaches_admission() {
    let dir = tempdir().unwrap();
    let page = guest_meeting_page();
    let manager = manager_for(page.clone(), dir.path());

    assert!(manager.join(MEETING_URL).await.unwrap());

    let status = manager.status().await;
    assert!(status.is_in_meeting);
    assert_eq!(status.meeting_url.as_deref(), Some(MEETING_URL));

    // the guest name ended up in the field exactly
    assert_eq!(page.element_value("input.name").unwrap(), "Test Guest");
    assert!(page.visited_urls().contains(&MEETING_URL.to_string()));
}

#[tokio::test(start_paused = true)]
async fn device_toggles_only_fire_on_mismatch() {
    let dir = tempdir().unwrap();
    let page = guest_meeting_page();
    let manager = manager_for(page.clone(), dir.path());

    manager.join(MEETING_URL).await.unwrap();

    let clicks = page.clicks();
    // camera was on but should be off: exactly one toggle
    assert_eq!(clicks.iter().filter(|c| *c == "button.camera").count(), 1);
    // mic was already muted, matching the requested state: never touched
    assert_eq!(clicks.iter().filter(|c| *c == "button.mic").count(), 0);
    assert_eq!(clicks.iter().filter(|c| *c == "button.join").count(), 1);
}

#[tokio::test(start_paused = true)]
async fn repeated_join_is_rejected() {
    let dir = tempdir().unwrap();
    let manager = manager_for(guest_meeting_page(), dir.path());

    manager.join(MEETING_URL).await.unwrap();
    assert!(matches!(
        manager.join(MEETING_URL).await,
        Err(MeetError::AlreadyInMeeting)
    ));
}

#[tokio::test(start_paused = true)]
async fn blocked_meeting_exhausts_strategies_with_screenshots() {
    let dir = tempdir().unwrap();
    let page = ScriptedPage::new();
    page.add_element(ScriptedElement::new(
        "div.error",
        "You can't join this call",
    ));
    let manager = manager_for(page.clone(), dir.path());

    let err = manager.join(MEETING_URL).await.unwrap_err();
    // three shuffled strategies plus the permissive last resort
    assert!(matches!(err, MeetError::JoinFailed { attempts: 4 }));

    // at least one failure screenshot was captured for diagnosis
    let shots = page.screenshots();
    assert!(!shots.is_empty());
    assert!(shots.iter().all(|s| s.contains("join-failure-")));

    let status = manager.status().await;
    assert!(!status.is_in_meeting);
    assert_eq!(status.meeting_url, None);
}

/// After every strategy fails the manager tears the browser down and
/// opens a fresh surface on the minimal fallback identity for the
/// last-resort attempt.
#[tokio::test(start_paused = true)]
async fn exhaustion_relaunches_on_the_minimal_identity() {
    let dir = tempdir().unwrap();
    let page = ScriptedPage::new();
    page.add_element(ScriptedElement::new(
        "div.error",
        "You can't join this call",
    ));

    let driver = ScriptedDriver::new(page);
    let driver_log = driver.clone();
    let options = SessionOptions::new()
        .guest_name("Test Guest")
        .recording_dir(dir.path())
        .realistic_movements(false)
        .rng_seed(42);
    let manager = MeetingSessionManager::with_driver(
        options,
        Box::new(driver),
        Box::new(NullCapture::new()),
    );

    let err = manager.join(MEETING_URL).await.unwrap_err();
    assert!(matches!(err, MeetError::JoinFailed { .. }));

    let identities = driver_log.opened_identities();
    assert_eq!(identities.len(), 2, "expected a relaunch after exhaustion");
    let fallback = IdentityGenerator::emergency();
    assert_eq!(identities[1].user_agent, fallback.user_agent);
    assert_eq!(identities[1].viewport, fallback.viewport);
    assert_eq!(identities[1].cookie_seed, fallback.cookie_seed);
}

#[tokio::test(start_paused = true)]
async fn join_and_record_round_trip() {
    let dir = tempdir().unwrap();
    let manager = manager_for(guest_meeting_page(), dir.path());

    let path = manager.join_and_record(MEETING_URL, Some(5)).await.unwrap();
    assert_eq!(path.extension().and_then(|e| e.to_str()), Some("mp4"));

    let status = manager.status().await;
    assert!(status.is_in_meeting);
    assert!(status.is_recording);
    assert_eq!(status.recording_path.as_deref(), Some(path.as_path()));

    // the path comes back exactly once
    assert_eq!(manager.stop_recording().await.unwrap(), Some(path));
    assert_eq!(manager.stop_recording().await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn join_failure_never_starts_recording() {
    let dir = tempdir().unwrap();
    let page = ScriptedPage::new();
    page.add_element(ScriptedElement::new(
        "div.error",
        "You can't join this call",
    ));
    let manager = manager_for(page, dir.path());

    let err = manager.join_and_record(MEETING_URL, Some(5)).await.unwrap_err();
    assert!(matches!(err, MeetError::JoinFailed { .. }));
    assert!(!manager.status().await.is_recording);
}

#[tokio::test(start_paused = true)]
async fn leave_resets_everything() {
    let dir = tempdir().unwrap();
    let manager = manager_for(guest_meeting_page(), dir.path());

    manager.join_and_record(MEETING_URL, None).await.unwrap();
    manager.leave().await.unwrap();

    let status = manager.status().await;
    assert!(!status.is_in_meeting);
    assert_eq!(status.meeting_url, None);
    assert!(!status.is_recording);

    // idempotent
    manager.leave().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn anonymous_admission_without_name_field() {
    let dir = tempdir().unwrap();
    let page = ScriptedPage::new();
    // no guest affordance, no name field: direct join control
    page.add_element(
        ScriptedElement::new("button.join", "Join now")
            .attr("aria-label", "Join now")
            .on_click(ClickEffect::Reveal("div.people".into())),
    );
    page.add_element(
        ScriptedElement::new("div.people", "")
            .hidden()
            .attr("aria-label", "Show everyone"),
    );
    let manager = manager_for(page, dir.path());

    assert!(manager.join(MEETING_URL).await.unwrap());
    assert!(manager.status().await.is_in_meeting);
}

#[tokio::test(start_paused = true)]
async fn missing_join_control_fails_without_hanging() {
    let dir = tempdir().unwrap();
    // a page with nothing useful on it at all
    let page = ScriptedPage::new();
    page.add_element(ScriptedElement::new("div.splash", "Loading"));

    let options = SessionOptions::new()
        .recording_dir(dir.path())
        .realistic_movements(false)
        .join_timeout_ms(300)
        .admission_timeout_ms(300)
        .rng_seed(1);
    let manager = MeetingSessionManager::with_driver(
        options,
        Box::new(ScriptedDriver::new(page)),
        Box::new(NullCapture::new()),
    );

    let err = manager.join(MEETING_URL).await.unwrap_err();
    assert!(matches!(err, MeetError::JoinFailed { .. }));
}
