//! DOM probes for locating meeting UI controls.
//!
//! The meeting UI changes without notice, so no single selector can be
//! trusted. A [`DomProbe`] encapsulates one detection heuristic; a
//! [`ProbeSet`] tries its probes in priority order and returns the first
//! hit. New heuristics slot in without touching the entry state machine.

use crate::browser::{ElementRef, MeetingPage};
use crate::error::MeetResult;
use async_trait::async_trait;

/// One heuristic for finding a control on the page.
#[async_trait]
pub trait DomProbe: Send + Sync {
    /// Short human-readable description, used in log output.
    fn describe(&self) -> String;

    /// Looks for the control. `Ok(None)` means not present, which is a
    /// normal outcome, not an error.
    async fn detect(&self, page: &dyn MeetingPage) -> MeetResult<Option<ElementRef>>;
}

/// Matches on a substring of an element's `aria-label`.
pub struct AriaProbe {
    label: String,
}

impl AriaProbe {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
        }
    }
}

#[async_trait]
impl DomProbe for AriaProbe {
    fn describe(&self) -> String {
        format!("aria-label contains {:?}", self.label)
    }

    async fn detect(&self, page: &dyn MeetingPage) -> MeetResult<Option<ElementRef>> {
        // the "i" flag makes the attribute match case-insensitive
        let selector = format!("[aria-label*=\"{}\" i]", self.label);
        page.query(&selector).await
    }
}

/// Matches on visible text content.
pub struct TextProbe {
    needle: String,
}

impl TextProbe {
    pub fn new(needle: &str) -> Self {
        Self {
            needle: needle.to_string(),
        }
    }
}

#[async_trait]
impl DomProbe for TextProbe {
    fn describe(&self) -> String {
        format!("text contains {:?}", self.needle)
    }

    async fn detect(&self, page: &dyn MeetingPage) -> MeetResult<Option<ElementRef>> {
        page.find_by_text(&self.needle).await
    }
}

/// Matches a literal CSS selector.
pub struct SelectorProbe {
    selector: String,
}

impl SelectorProbe {
    pub fn new(selector: &str) -> Self {
        Self {
            selector: selector.to_string(),
        }
    }
}

#[async_trait]
impl DomProbe for SelectorProbe {
    fn describe(&self) -> String {
        format!("selector {:?}", self.selector)
    }

    async fn detect(&self, page: &dyn MeetingPage) -> MeetResult<Option<ElementRef>> {
        page.query(&self.selector).await
    }
}

/// An ordered list of probes tried until one hits.
pub struct ProbeSet {
    name: &'static str,
    probes: Vec<Box<dyn DomProbe>>,
}

impl ProbeSet {
    /// Creates a named probe set.
    pub fn new(name: &'static str, probes: Vec<Box<dyn DomProbe>>) -> Self {
        Self { name, probes }
    }

    /// Name of the control family this set looks for.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Runs the probes in order, returning the first element found.
    pub async fn detect(&self, page: &dyn MeetingPage) -> MeetResult<Option<ElementRef>> {
        for probe in &self.probes {
            if let Some(element) = probe.detect(page).await? {
                tracing::trace!(set = self.name, probe = %probe.describe(), "probe hit");
                return Ok(Some(element));
            }
        }
        Ok(None)
    }
}

/// The full probe catalog one entry attempt works from.
pub struct ProbeCatalog {
    /// "Cannot join" error signatures.
    pub error: ProbeSet,
    /// Provider sign-in affordance.
    pub login: ProbeSet,
    /// Guest-entry affordance.
    pub guest: ProbeSet,
    /// Guest display-name input field.
    pub name_field: ProbeSet,
    /// Join / ask-to-join control.
    pub join: ProbeSet,
    /// Post-admission markers.
    pub admitted: ProbeSet,
    /// Camera toggle on the pre-join screen.
    pub camera: ProbeSet,
    /// Microphone toggle on the pre-join screen.
    pub microphone: ProbeSet,
    /// Sign-in email field.
    pub email_field: ProbeSet,
    /// Sign-in password field.
    pub password_field: ProbeSet,
    /// Sign-in advance button.
    pub next_button: ProbeSet,
    /// Two-factor / verification challenge markers.
    pub two_factor: ProbeSet,
    /// Dismissable interstitials (terms, upsells).
    pub interstitial: ProbeSet,
}

impl ProbeCatalog {
    /// Standard catalog used by the regular strategies.
    pub fn standard() -> Self {
        Self {
            error: ProbeSet::new(
                "error",
                vec![
                    Box::new(TextProbe::new("can't join")),
                    Box::new(TextProbe::new("cannot join")),
                    Box::new(TextProbe::new("unable to join")),
                    Box::new(TextProbe::new("meeting not found")),
                    Box::new(SelectorProbe::new("[role=\"alert\"]")),
                ],
            ),
            login: ProbeSet::new(
                "login",
                vec![
                    Box::new(AriaProbe::new("sign in")),
                    Box::new(TextProbe::new("sign in")),
                    Box::new(SelectorProbe::new("a[href*=\"accounts.\"]")),
                ],
            ),
            guest: ProbeSet::new(
                "guest",
                vec![
                    Box::new(AriaProbe::new("join as a guest")),
                    Box::new(TextProbe::new("join as a guest")),
                    Box::new(TextProbe::new("continue without an account")),
                ],
            ),
            name_field: ProbeSet::new(
                "name-field",
                vec![
                    Box::new(AriaProbe::new("your name")),
                    Box::new(SelectorProbe::new("input[placeholder*=\"name\"]")),
                ],
            ),
            join: ProbeSet::new(
                "join",
                vec![
                    Box::new(AriaProbe::new("join now")),
                    Box::new(AriaProbe::new("ask to join")),
                    Box::new(TextProbe::new("join now")),
                    Box::new(TextProbe::new("ask to join")),
                ],
            ),
            admitted: ProbeSet::new(
                "admitted",
                vec![
                    Box::new(AriaProbe::new("show everyone")),
                    Box::new(AriaProbe::new("chat with everyone")),
                    Box::new(TextProbe::new("you're in")),
                ],
            ),
            camera: ProbeSet::new(
                "camera",
                vec![Box::new(AriaProbe::new("camera"))],
            ),
            microphone: ProbeSet::new(
                "microphone",
                vec![Box::new(AriaProbe::new("microphone"))],
            ),
            email_field: ProbeSet::new(
                "email-field",
                vec![
                    Box::new(SelectorProbe::new("input[type=\"email\"]")),
                    Box::new(AriaProbe::new("email or phone")),
                ],
            ),
            password_field: ProbeSet::new(
                "password-field",
                vec![
                    Box::new(SelectorProbe::new("input[type=\"password\"]")),
                    Box::new(AriaProbe::new("enter your password")),
                ],
            ),
            next_button: ProbeSet::new(
                "next-button",
                vec![
                    Box::new(TextProbe::new("next")),
                    Box::new(SelectorProbe::new("button[type=\"submit\"]")),
                ],
            ),
            two_factor: ProbeSet::new(
                "two-factor",
                vec![
                    Box::new(TextProbe::new("2-step verification")),
                    Box::new(TextProbe::new("verify it's you")),
                    Box::new(TextProbe::new("enter the code")),
                ],
            ),
            interstitial: ProbeSet::new(
                "interstitial",
                vec![
                    Box::new(TextProbe::new("i agree")),
                    Box::new(TextProbe::new("not now")),
                    Box::new(AriaProbe::new("dismiss")),
                ],
            ),
        }
    }

    /// Permissive catalog for the last-resort attempt.
    ///
    /// Join and admission detection cast the widest net that is still
    /// meaningful; error detection stays strict so a hard "cannot join"
    /// is still respected.
    pub fn permissive() -> Self {
        let mut catalog = Self::standard();
        catalog.join = ProbeSet::new(
            "join-permissive",
            vec![
                Box::new(AriaProbe::new("join now")),
                Box::new(AriaProbe::new("ask to join")),
                Box::new(TextProbe::new("join now")),
                Box::new(TextProbe::new("ask to join")),
                Box::new(AriaProbe::new("join")),
                Box::new(TextProbe::new("join")),
            ],
        );
        catalog.admitted = ProbeSet::new(
            "admitted-permissive",
            vec![
                Box::new(AriaProbe::new("show everyone")),
                Box::new(AriaProbe::new("chat with everyone")),
                Box::new(TextProbe::new("you're in")),
                Box::new(AriaProbe::new("leave call")),
                Box::new(TextProbe::new("people")),
            ],
        );
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{ScriptedElement, ScriptedPage};

    #[tokio::test]
    async fn test_probe_set_priority_order() {
        let page = ScriptedPage::new();
        page.add_element(ScriptedElement::new("button.a", "Ask to join"));
        page.add_element(
            ScriptedElement::new("button.b", "Join now").attr("aria-label", "Join now"),
        );

        let set = ProbeSet::new(
            "join",
            vec![
                Box::new(AriaProbe::new("join now")),
                Box::new(TextProbe::new("ask to join")),
            ],
        );
        let hit = set.detect(&page).await.unwrap().unwrap();
        assert_eq!(hit.text, "Join now");
    }

    #[tokio::test]
    async fn test_probe_set_misses_cleanly() {
        let page = ScriptedPage::new();
        let set = ProbeSet::new("join", vec![Box::new(TextProbe::new("join now"))]);
        assert!(set.detect(&page).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_text_probe_is_case_insensitive() {
        let page = ScriptedPage::new();
        page.add_element(ScriptedElement::new("div.err", "You Can't Join this call"));
        let probe = TextProbe::new("can't join");
        assert!(probe.detect(&page).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_standard_catalog_detects_guest_affordance() {
        let page = ScriptedPage::new();
        page.add_element(
            ScriptedElement::new("button.guest", "Join as a guest")
                .attr("aria-label", "Join as a guest"),
        );
        let catalog = ProbeCatalog::standard();
        assert!(catalog.guest.detect(&page).await.unwrap().is_some());
        assert!(catalog.login.detect(&page).await.unwrap().is_none());
    }
}
