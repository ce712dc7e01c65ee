//! Page abstraction and the scripted test double.
//!
//! [`MeetingPage`] is the seam between meeting logic and the actual browser.
//! The production implementation dispatches CDP commands; [`ScriptedPage`]
//! replays a scripted DOM in-process so entry strategies, admission polling,
//! and input simulation can be exercised without launching Chromium.

use crate::error::{MeetError, MeetResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Snapshot of a located DOM element.
///
/// Geometry is in page coordinates. Attributes and text are captured at
/// query time and do not track later DOM mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementRef {
    /// Left edge of the bounding box.
    pub x: f64,
    /// Top edge of the bounding box.
    pub y: f64,
    /// Bounding box width.
    pub width: f64,
    /// Bounding box height.
    pub height: f64,
    /// Element attributes at query time.
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    /// Trimmed text content.
    #[serde(default)]
    pub text: String,
    /// Current input value, empty for non-inputs.
    #[serde(default)]
    pub value: String,
}

impl ElementRef {
    /// Center of the bounding box.
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Looks up an attribute by name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// A cookie to pre-seed on the browser before navigation.
#[derive(Debug, Clone)]
pub struct CookieSpec {
    /// Cookie name.
    pub name: String,
    /// Cookie value.
    pub value: String,
    /// Domain the cookie applies to, e.g. ".meet.example.com".
    pub domain: String,
}

impl CookieSpec {
    /// Creates a cookie spec.
    pub fn new(name: &str, value: &str, domain: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            domain: domain.to_string(),
        }
    }
}

/// Low-level page operations the meeting logic drives.
///
/// Implementations must be safe to share across tasks; all methods take
/// `&self` and the trait is object safe.
#[async_trait]
pub trait MeetingPage: Send + Sync {
    /// Navigates to a URL and waits for the load to settle.
    async fn goto(&self, url: &str) -> MeetResult<()>;

    /// Current page URL.
    async fn current_url(&self) -> MeetResult<String>;

    /// Finds the first visible element matching the selector.
    ///
    /// Selectors are CSS. Returns `Ok(None)` when nothing matches; errors
    /// are reserved for page-level failures.
    async fn query(&self, selector: &str) -> MeetResult<Option<ElementRef>>;

    /// Finds the first visible clickable element whose text contains
    /// `needle`, case-insensitively.
    async fn find_by_text(&self, needle: &str) -> MeetResult<Option<ElementRef>>;

    /// Dispatches a pointer move event.
    async fn mouse_move(&self, x: f64, y: f64) -> MeetResult<()>;

    /// Dispatches a pointer press event.
    async fn mouse_down(&self, x: f64, y: f64) -> MeetResult<()>;

    /// Dispatches a pointer release event.
    async fn mouse_up(&self, x: f64, y: f64) -> MeetResult<()>;

    /// Types a single character into the focused element.
    async fn type_char(&self, c: char) -> MeetResult<()>;

    /// Presses a named key, optionally with modifiers ("Control+a").
    async fn press_key(&self, key: &str) -> MeetResult<()>;

    /// Pre-seeds cookies. Best effort; rejection by the browser is logged,
    /// never failed.
    async fn set_cookies(&self, cookies: &[CookieSpec]) -> MeetResult<()>;

    /// Sets extra HTTP headers for subsequent requests. Best effort.
    async fn set_headers(&self, headers: &HashMap<String, String>) -> MeetResult<()>;

    /// Evaluates JavaScript and returns the JSON result.
    async fn evaluate(&self, script: &str) -> MeetResult<serde_json::Value>;

    /// Captures a PNG screenshot to the given path.
    async fn screenshot(&self, path: &Path) -> MeetResult<()>;
}

/// What clicking a scripted element does to the scripted DOM.
#[derive(Debug, Clone)]
pub enum ClickEffect {
    /// No DOM change.
    None,
    /// Makes another element visible immediately.
    Reveal(String),
    /// Makes another element visible after a delay.
    RevealAfter(String, Duration),
    /// Hides another element.
    Hide(String),
    /// Sets an attribute on another element.
    SetAttribute(String, String, String),
}

/// One element in the scripted DOM.
#[derive(Debug, Clone)]
pub struct ScriptedElement {
    selector: String,
    text: String,
    attributes: HashMap<String, String>,
    value: String,
    visible: bool,
    reveal_at: Option<Instant>,
    on_click: ClickEffect,
}

impl ScriptedElement {
    /// Creates a visible element with the given selector and text.
    pub fn new(selector: &str, text: &str) -> Self {
        Self {
            selector: selector.to_string(),
            text: text.to_string(),
            attributes: HashMap::new(),
            value: String::new(),
            visible: true,
            reveal_at: None,
            on_click: ClickEffect::None,
        }
    }

    /// Starts the element hidden until revealed by a click effect.
    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Sets an attribute.
    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    /// Sets the click effect.
    pub fn on_click(mut self, effect: ClickEffect) -> Self {
        self.on_click = effect;
        self
    }
}

#[derive(Debug, Default)]
struct ScriptedDom {
    url: String,
    elements: Vec<ScriptedElement>,
    focused: Option<usize>,
    visited_urls: Vec<String>,
    cookies: Vec<CookieSpec>,
    typed_log: Vec<String>,
    screenshots: Vec<String>,
    scripts: Vec<String>,
    click_log: Vec<String>,
    mouse_moves: usize,
}

impl ScriptedDom {
    fn element_matches(element: &ScriptedElement, selector: &str) -> bool {
        if element.selector == selector {
            return true;
        }
        // contains-match on aria-label, the form entry probes lean on;
        // the trailing "i" CSS flag is accepted and implied either way
        if let Some(rest) = selector.strip_prefix("[aria-label*=\"") {
            let needle = rest
                .strip_suffix("\" i]")
                .or_else(|| rest.strip_suffix("\"]"));
            if let (Some(needle), Some(label)) = (needle, element.attributes.get("aria-label")) {
                return label.to_lowercase().contains(&needle.to_lowercase());
            }
            return false;
        }
        false
    }

    fn sweep_reveals(&mut self) {
        let now = Instant::now();
        for element in &mut self.elements {
            if let Some(at) = element.reveal_at {
                if now >= at {
                    element.visible = true;
                    element.reveal_at = None;
                }
            }
        }
    }

    fn find_visible(&mut self, selector: &str) -> Option<usize> {
        self.sweep_reveals();
        self.elements
            .iter()
            .position(|e| e.visible && Self::element_matches(e, selector))
    }

    fn apply_effect(&mut self, effect: ClickEffect) {
        match effect {
            ClickEffect::None => {}
            ClickEffect::Reveal(selector) => {
                if let Some(e) = self.elements.iter_mut().find(|e| e.selector == selector) {
                    e.visible = true;
                }
            }
            ClickEffect::RevealAfter(selector, delay) => {
                if let Some(e) = self.elements.iter_mut().find(|e| e.selector == selector) {
                    e.reveal_at = Some(Instant::now() + delay);
                }
            }
            ClickEffect::Hide(selector) => {
                if let Some(e) = self.elements.iter_mut().find(|e| e.selector == selector) {
                    e.visible = false;
                }
            }
            ClickEffect::SetAttribute(selector, name, value) => {
                if let Some(e) = self.elements.iter_mut().find(|e| e.selector == selector) {
                    e.attributes.insert(name, value);
                }
            }
        }
    }
}

/// In-process [`MeetingPage`] backed by a scripted DOM.
///
/// Elements are laid out on a fixed grid, clicks land on whichever element's
/// box contains the coordinates, and focus follows clicks the way a real
/// page behaves. Cloning shares the underlying DOM.
#[derive(Clone)]
pub struct ScriptedPage {
    dom: Arc<Mutex<ScriptedDom>>,
}

impl ScriptedPage {
    /// Creates an empty page.
    pub fn new() -> Self {
        Self {
            dom: Arc::new(Mutex::new(ScriptedDom::default())),
        }
    }

    /// Adds an element to the scripted DOM.
    pub fn add_element(&self, element: ScriptedElement) {
        self.dom.lock().unwrap().elements.push(element);
    }

    /// Current value of an input element, if present.
    pub fn element_value(&self, selector: &str) -> Option<String> {
        let mut dom = self.dom.lock().unwrap();
        dom.find_visible(selector)
            .map(|i| dom.elements[i].value.clone())
    }

    /// Selectors clicked so far, in order.
    pub fn clicks(&self) -> Vec<String> {
        self.dom.lock().unwrap().click_log.clone()
    }

    /// URLs navigated to so far, in order.
    pub fn visited_urls(&self) -> Vec<String> {
        self.dom.lock().unwrap().visited_urls.clone()
    }

    /// Cookies seeded so far.
    pub fn cookies(&self) -> Vec<CookieSpec> {
        self.dom.lock().unwrap().cookies.clone()
    }

    /// Paths screenshots were written to.
    pub fn screenshots(&self) -> Vec<String> {
        self.dom.lock().unwrap().screenshots.clone()
    }

    /// Scripts passed to `evaluate`, in order.
    pub fn evaluated_scripts(&self) -> Vec<String> {
        self.dom.lock().unwrap().scripts.clone()
    }

    /// Number of pointer-move events dispatched so far.
    pub fn mouse_moves(&self) -> usize {
        self.dom.lock().unwrap().mouse_moves
    }

    fn element_box(index: usize) -> (f64, f64, f64, f64) {
        // fixed grid layout: 200x40 boxes stacked vertically with a gap
        let y = 50.0 + index as f64 * 60.0;
        (100.0, y, 200.0, 40.0)
    }

    fn element_ref(dom: &ScriptedDom, index: usize) -> ElementRef {
        let (x, y, width, height) = Self::element_box(index);
        let element = &dom.elements[index];
        ElementRef {
            x,
            y,
            width,
            height,
            attributes: element.attributes.clone(),
            text: element.text.clone(),
            value: element.value.clone(),
        }
    }
}

impl Default for ScriptedPage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MeetingPage for ScriptedPage {
    async fn goto(&self, url: &str) -> MeetResult<()> {
        let mut dom = self.dom.lock().unwrap();
        dom.url = url.to_string();
        dom.visited_urls.push(url.to_string());
        Ok(())
    }

    async fn current_url(&self) -> MeetResult<String> {
        Ok(self.dom.lock().unwrap().url.clone())
    }

    async fn query(&self, selector: &str) -> MeetResult<Option<ElementRef>> {
        let mut dom = self.dom.lock().unwrap();
        Ok(dom
            .find_visible(selector)
            .map(|i| Self::element_ref(&dom, i)))
    }

    async fn find_by_text(&self, needle: &str) -> MeetResult<Option<ElementRef>> {
        let mut dom = self.dom.lock().unwrap();
        dom.sweep_reveals();
        let needle = needle.to_lowercase();
        let index = dom
            .elements
            .iter()
            .position(|e| e.visible && e.text.to_lowercase().contains(&needle));
        Ok(index.map(|i| Self::element_ref(&dom, i)))
    }

    async fn mouse_move(&self, _x: f64, _y: f64) -> MeetResult<()> {
        self.dom.lock().unwrap().mouse_moves += 1;
        Ok(())
    }

    async fn mouse_down(&self, _x: f64, _y: f64) -> MeetResult<()> {
        Ok(())
    }

    async fn mouse_up(&self, x: f64, y: f64) -> MeetResult<()> {
        let mut dom = self.dom.lock().unwrap();
        let mut hit = None;
        for index in 0..dom.elements.len() {
            if !dom.elements[index].visible {
                continue;
            }
            let (ex, ey, w, h) = Self::element_box(index);
            if x >= ex && x <= ex + w && y >= ey && y <= ey + h {
                hit = Some(index);
                break;
            }
        }
        if let Some(index) = hit {
            dom.focused = Some(index);
            let selector = dom.elements[index].selector.clone();
            let effect = dom.elements[index].on_click.clone();
            dom.click_log.push(selector);
            dom.apply_effect(effect);
        }
        Ok(())
    }

    async fn type_char(&self, c: char) -> MeetResult<()> {
        let mut dom = self.dom.lock().unwrap();
        if let Some(index) = dom.focused {
            dom.elements[index].value.push(c);
        }
        dom.typed_log.push(c.to_string());
        Ok(())
    }

    async fn press_key(&self, key: &str) -> MeetResult<()> {
        let mut dom = self.dom.lock().unwrap();
        if let Some(index) = dom.focused {
            // select-all followed by backspace clears the field
            match key {
                "Backspace" => {
                    if dom.typed_log.last().map(String::as_str) == Some("Control+a") {
                        dom.elements[index].value.clear();
                    } else {
                        dom.elements[index].value.pop();
                    }
                }
                "Control+a" => {}
                _ => {}
            }
        }
        dom.typed_log.push(key.to_string());
        Ok(())
    }

    async fn set_cookies(&self, cookies: &[CookieSpec]) -> MeetResult<()> {
        let mut dom = self.dom.lock().unwrap();
        for cookie in cookies {
            dom.cookies.push(cookie.clone());
        }
        Ok(())
    }

    async fn set_headers(&self, _headers: &HashMap<String, String>) -> MeetResult<()> {
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> MeetResult<serde_json::Value> {
        let mut dom = self.dom.lock().unwrap();
        dom.scripts.push(script.to_string());
        Ok(serde_json::Value::Null)
    }

    async fn screenshot(&self, path: &Path) -> MeetResult<()> {
        let mut dom = self.dom.lock().unwrap();
        dom.screenshots.push(path.to_string_lossy().to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_query_by_selector_and_aria_contains() {
        let page = ScriptedPage::new();
        page.add_element(
            ScriptedElement::new("button.join", "Join now").attr("aria-label", "Join now"),
        );

        assert!(page.query("button.join").await.unwrap().is_some());
        assert!(page
            .query("[aria-label*=\"join now\"]")
            .await
            .unwrap()
            .is_some());
        assert!(page.query("button.other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_hidden_elements_are_not_found() {
        let page = ScriptedPage::new();
        page.add_element(ScriptedElement::new("div.banner", "Admitted").hidden());
        assert!(page.query("div.banner").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_click_reveals_and_focus_follows() {
        let page = ScriptedPage::new();
        page.add_element(
            ScriptedElement::new("button.open", "Open")
                .on_click(ClickEffect::Reveal("input.name".into())),
        );
        page.add_element(ScriptedElement::new("input.name", "").hidden());

        let button = page.query("button.open").await.unwrap().unwrap();
        let (cx, cy) = button.center();
        page.mouse_down(cx, cy).await.unwrap();
        page.mouse_up(cx, cy).await.unwrap();

        let input = page.query("input.name").await.unwrap().unwrap();
        let (ix, iy) = input.center();
        page.mouse_down(ix, iy).await.unwrap();
        page.mouse_up(ix, iy).await.unwrap();
        page.type_char('h').await.unwrap();
        page.type_char('i').await.unwrap();

        assert_eq!(page.element_value("input.name").unwrap(), "hi");
        assert_eq!(page.clicks(), vec!["button.open", "input.name"]);
    }

    #[tokio::test]
    async fn test_select_all_backspace_clears_field() {
        let page = ScriptedPage::new();
        page.add_element(ScriptedElement::new("input.name", ""));

        let input = page.query("input.name").await.unwrap().unwrap();
        let (x, y) = input.center();
        page.mouse_down(x, y).await.unwrap();
        page.mouse_up(x, y).await.unwrap();

        page.type_char('a').await.unwrap();
        page.type_char('b').await.unwrap();
        page.press_key("Control+a").await.unwrap();
        page.press_key("Backspace").await.unwrap();
        page.type_char('z').await.unwrap();

        assert_eq!(page.element_value("input.name").unwrap(), "z");
    }

    #[tokio::test]
    async fn test_delayed_reveal() {
        let page = ScriptedPage::new();
        page.add_element(
            ScriptedElement::new("button.ask", "Ask to join")
                .on_click(ClickEffect::RevealAfter(
                    "div.in-call".into(),
                    Duration::from_millis(30),
                )),
        );
        page.add_element(ScriptedElement::new("div.in-call", "").hidden());

        let button = page.query("button.ask").await.unwrap().unwrap();
        let (x, y) = button.center();
        page.mouse_down(x, y).await.unwrap();
        page.mouse_up(x, y).await.unwrap();

        assert!(page.query("div.in-call").await.unwrap().is_none());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(page.query("div.in-call").await.unwrap().is_some());
    }
}
