//! Chromium session launch and CDP-backed page driving.
//!
//! [`StealthBrowserSession`] launches Chromium with detection-relevant flags
//! stripped, applies the generated identity to the window, and registers the
//! stealth script so every document sees the overridden environment before
//! any page script runs. [`CdpPage`] implements [`MeetingPage`] on top of
//! raw CDP input dispatch rather than synthetic DOM events, which keeps
//! `event.isTrusted` true for everything the meeting UI observes.

use crate::browser::page::{CookieSpec, ElementRef, MeetingPage};
use crate::config::SessionOptions;
use crate::error::{MeetError, MeetResult};
use crate::stealth::{stealth_script, BrowserIdentity};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams, DispatchMouseEventType,
    MouseButton,
};
use chromiumoxide::cdp::browser_protocol::network::{
    Headers, SetCookieParams, SetExtraHttpHeadersParams,
};
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, CaptureScreenshotFormat,
};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How long a browser launch may take before it is declared failed.
const LAUNCH_TIMEOUT: Duration = Duration::from_secs(90);

/// Chromium binaries probed when no explicit executable path is configured.
const CHROME_CANDIDATES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "chrome",
];

/// Command-line switches that strip automation markers and noise.
fn stealth_args() -> Vec<String> {
    [
        "--disable-blink-features=AutomationControlled",
        "--no-first-run",
        "--no-default-browser-check",
        "--disable-infobars",
        "--disable-background-timer-throttling",
        "--disable-backgrounding-occluded-windows",
        "--disable-renderer-backgrounding",
        "--disable-dev-shm-usage",
        "--use-fake-ui-for-media-stream",
        "--use-fake-device-for-media-stream",
        "--autoplay-policy=no-user-gesture-required",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Switches for running without a visible window.
///
/// Passed by hand instead of the launcher's built-in headless set: that
/// set includes `--mute-audio`, which would leave nothing for the audio
/// capture to record.
fn headless_args() -> Vec<String> {
    ["--headless=new", "--hide-scrollbars"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// A running Chromium instance configured for a single meeting identity.
pub struct StealthBrowserSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    identity: BrowserIdentity,
}

impl StealthBrowserSession {
    /// Launches Chromium with the given identity baked in.
    ///
    /// The window matches the identity viewport, the stealth script is
    /// registered for every new document, and language flags follow the
    /// identity locale. Fails with [`MeetError::Launch`] if the browser
    /// does not come up within 90 seconds.
    pub async fn launch(
        identity: BrowserIdentity,
        options: &SessionOptions,
    ) -> MeetResult<Self> {
        let mut builder = BrowserConfig::builder()
            .with_head()
            .window_size(identity.viewport.width, identity.viewport.height)
            .viewport(None)
            .args(stealth_args())
            .arg(format!("--lang={}", identity.locale))
            .arg(format!("--user-agent={}", identity.user_agent));

        if options.headless {
            builder = builder.args(headless_args());
        }
        if let Some(dir) = &options.user_data_dir {
            builder = builder.user_data_dir(dir);
        }
        for extra in &options.additional_args {
            builder = builder.arg(extra);
        }

        builder = match &options.executable_path {
            Some(path) => builder.chrome_executable(path),
            None => match find_chrome() {
                Some(path) => builder.chrome_executable(path),
                None => builder,
            },
        };

        let config = builder.build().map_err(MeetError::Launch)?;

        // screenshots and recordings land here later, make sure it exists
        tokio::fs::create_dir_all(&options.recording_dir)
            .await
            .map_err(|e| MeetError::io(&options.recording_dir, e))?;

        info!(
            platform = ?identity.platform,
            viewport = format!("{}x{}", identity.viewport.width, identity.viewport.height),
            headless = options.headless,
            "launching browser"
        );

        let (browser, mut handler) = tokio::time::timeout(LAUNCH_TIMEOUT, Browser::launch(config))
            .await
            .map_err(|_| MeetError::Launch("browser launch timed out".to_string()))?
            .map_err(|e| MeetError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
            debug!("browser handler loop ended");
        });

        Ok(Self {
            browser,
            handler_task,
            identity,
        })
    }

    /// The identity this session was launched with.
    pub fn identity(&self) -> &BrowserIdentity {
        &self.identity
    }

    /// Opens a new page with the stealth script installed.
    ///
    /// The script is registered before navigation so it also covers every
    /// frame and subsequent document the page loads.
    pub async fn new_page(&self) -> MeetResult<CdpPage> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| MeetError::Page(e.to_string()))?;

        let script = stealth_script(&self.identity);
        let params = AddScriptToEvaluateOnNewDocumentParams::builder()
            .source(script.clone())
            .build()
            .map_err(MeetError::Page)?;
        page.execute(params)
            .await
            .map_err(|e| MeetError::Page(e.to_string()))?;

        // also patch the already-loaded blank document
        page.evaluate(script)
            .await
            .map_err(|e| MeetError::Page(e.to_string()))?;

        let page = CdpPage { page };

        // keep the HTTP-level language consistent with the JS-level locale
        let lang = self.identity.locale.split('-').next().unwrap_or("en");
        let mut headers = HashMap::new();
        headers.insert(
            "Accept-Language".to_string(),
            format!("{},{};q=0.9", self.identity.locale, lang),
        );
        page.set_headers(&headers).await?;

        debug!("page created with stealth overrides installed");
        Ok(page)
    }

    /// Closes the browser and stops the event handler task.
    pub async fn close(mut self) -> MeetResult<()> {
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "browser close reported an error");
        }
        let _ = self.browser.wait().await;
        self.handler_task.abort();
        Ok(())
    }
}

/// Locates a Chromium executable on PATH.
fn find_chrome() -> Option<std::path::PathBuf> {
    CHROME_CANDIDATES
        .iter()
        .find_map(|candidate| which::which(candidate).ok())
}

/// [`MeetingPage`] implementation over a live CDP page.
pub struct CdpPage {
    page: Page,
}

impl CdpPage {
    async fn dispatch_mouse(
        &self,
        event_type: DispatchMouseEventType,
        x: f64,
        y: f64,
        with_button: bool,
    ) -> MeetResult<()> {
        let mut builder = DispatchMouseEventParams::builder()
            .r#type(event_type)
            .x(x)
            .y(y);
        if with_button {
            builder = builder.button(MouseButton::Left).click_count(1);
        }
        let params = builder.build().map_err(MeetError::Page)?;
        self.page
            .execute(params)
            .await
            .map_err(|e| MeetError::Page(e.to_string()))?;
        Ok(())
    }

    async fn dispatch_key(
        &self,
        event_type: DispatchKeyEventType,
        key: &str,
        modifiers: i64,
    ) -> MeetResult<()> {
        let mut builder = DispatchKeyEventParams::builder()
            .r#type(event_type)
            .key(key)
            .modifiers(modifiers);
        // Without the virtual key code the browser never translates
        // shortcuts like Ctrl+A into their editing command.
        if let Some((vk, code)) = key_codes(key) {
            builder = builder
                .windows_virtual_key_code(vk)
                .native_virtual_key_code(vk)
                .code(code);
        }
        let params = builder.build().map_err(MeetError::Page)?;
        self.page
            .execute(params)
            .await
            .map_err(|e| MeetError::Page(e.to_string()))?;
        Ok(())
    }
}

/// CDP modifier bitmask for a modifier name.
/// Windows virtual key code and physical code for a dispatched key name.
fn key_codes(key: &str) -> Option<(i64, String)> {
    match key {
        "Backspace" => Some((8, "Backspace".to_string())),
        "Tab" => Some((9, "Tab".to_string())),
        "Enter" => Some((13, "Enter".to_string())),
        "Escape" => Some((27, "Escape".to_string())),
        " " | "Space" => Some((32, "Space".to_string())),
        "Delete" => Some((46, "Delete".to_string())),
        _ => {
            let mut chars = key.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii_alphabetic() => {
                    let upper = c.to_ascii_uppercase();
                    Some((upper as i64, format!("Key{upper}")))
                }
                (Some(c), None) if c.is_ascii_digit() => {
                    Some((c as i64, format!("Digit{c}")))
                }
                _ => None,
            }
        }
    }
}

fn modifier_flag(name: &str) -> i64 {
    match name {
        "Alt" => 1,
        "Control" | "Ctrl" => 2,
        "Meta" => 4,
        "Shift" => 8,
        _ => 0,
    }
}

fn escape_js(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[async_trait]
impl MeetingPage for CdpPage {
    async fn goto(&self, url: &str) -> MeetResult<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| MeetError::Page(e.to_string()))?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| MeetError::Page(e.to_string()))?;
        Ok(())
    }

    async fn current_url(&self) -> MeetResult<String> {
        let url = self
            .page
            .url()
            .await
            .map_err(|e| MeetError::Page(e.to_string()))?;
        Ok(url.unwrap_or_default())
    }

    async fn query(&self, selector: &str) -> MeetResult<Option<ElementRef>> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector("{selector}");
                if (!el) return null;
                const rect = el.getBoundingClientRect();
                if (rect.width === 0 && rect.height === 0) return null;
                const style = window.getComputedStyle(el);
                if (style.visibility === 'hidden' || style.display === 'none') return null;
                const attributes = {{}};
                for (const attr of el.attributes) attributes[attr.name] = attr.value;
                return {{
                    x: rect.x,
                    y: rect.y,
                    width: rect.width,
                    height: rect.height,
                    attributes,
                    text: (el.textContent || '').trim(),
                    value: el.value || ''
                }};
            }})()"#,
            selector = escape_js(selector)
        );

        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| MeetError::Page(e.to_string()))?;
        let element: Option<ElementRef> = result
            .into_value()
            .map_err(|e| MeetError::Page(e.to_string()))?;
        Ok(element)
    }

    async fn find_by_text(&self, needle: &str) -> MeetResult<Option<ElementRef>> {
        let script = format!(
            r#"(() => {{
                const needle = "{needle}".toLowerCase();
                const candidates = document.querySelectorAll(
                    'button, a, span, div[role="button"], [role="link"]');
                for (const el of candidates) {{
                    const text = (el.textContent || '').trim().toLowerCase();
                    if (!text.includes(needle)) continue;
                    const rect = el.getBoundingClientRect();
                    if (rect.width === 0 && rect.height === 0) continue;
                    const style = window.getComputedStyle(el);
                    if (style.visibility === 'hidden' || style.display === 'none') continue;
                    const attributes = {{}};
                    for (const attr of el.attributes) attributes[attr.name] = attr.value;
                    return {{
                        x: rect.x,
                        y: rect.y,
                        width: rect.width,
                        height: rect.height,
                        attributes,
                        text: (el.textContent || '').trim(),
                        value: el.value || ''
                    }};
                }}
                return null;
            }})()"#,
            needle = escape_js(needle)
        );

        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| MeetError::Page(e.to_string()))?;
        let element: Option<ElementRef> = result
            .into_value()
            .map_err(|e| MeetError::Page(e.to_string()))?;
        Ok(element)
    }

    async fn mouse_move(&self, x: f64, y: f64) -> MeetResult<()> {
        self.dispatch_mouse(DispatchMouseEventType::MouseMoved, x, y, false)
            .await
    }

    async fn mouse_down(&self, x: f64, y: f64) -> MeetResult<()> {
        self.dispatch_mouse(DispatchMouseEventType::MousePressed, x, y, true)
            .await
    }

    async fn mouse_up(&self, x: f64, y: f64) -> MeetResult<()> {
        self.dispatch_mouse(DispatchMouseEventType::MouseReleased, x, y, true)
            .await
    }

    async fn type_char(&self, c: char) -> MeetResult<()> {
        let text = c.to_string();
        let params = DispatchKeyEventParams::builder()
            .r#type(DispatchKeyEventType::Char)
            .text(text)
            .build()
            .map_err(MeetError::Page)?;
        self.page
            .execute(params)
            .await
            .map_err(|e| MeetError::Page(e.to_string()))?;
        Ok(())
    }

    async fn press_key(&self, key: &str) -> MeetResult<()> {
        let mut parts: Vec<&str> = key.split('+').collect();
        let key_name = parts.pop().unwrap_or(key);
        let modifiers: i64 = parts.iter().map(|m| modifier_flag(m)).sum();

        self.dispatch_key(DispatchKeyEventType::KeyDown, key_name, modifiers)
            .await?;
        self.dispatch_key(DispatchKeyEventType::KeyUp, key_name, modifiers)
            .await?;
        Ok(())
    }

    async fn set_cookies(&self, cookies: &[CookieSpec]) -> MeetResult<()> {
        for cookie in cookies {
            let params = match SetCookieParams::builder()
                .name(cookie.name.clone())
                .value(cookie.value.clone())
                .domain(cookie.domain.clone())
                .build()
            {
                Ok(params) => params,
                Err(e) => {
                    warn!(cookie = %cookie.name, error = %e, "skipping malformed cookie");
                    continue;
                }
            };
            if let Err(e) = self.page.execute(params).await {
                warn!(cookie = %cookie.name, error = %e, "browser rejected cookie");
            }
        }
        Ok(())
    }

    async fn set_headers(&self, headers: &HashMap<String, String>) -> MeetResult<()> {
        let map: serde_json::Map<String, serde_json::Value> = headers
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();
        let params = SetExtraHttpHeadersParams::new(Headers::new(serde_json::Value::Object(map)));
        if let Err(e) = self.page.execute(params).await {
            warn!(error = %e, "browser rejected extra headers");
        }
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> MeetResult<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| MeetError::Page(e.to_string()))?;
        let value: serde_json::Value = result
            .into_value()
            .map_err(|e| MeetError::Page(e.to_string()))?;
        Ok(value)
    }

    async fn screenshot(&self, path: &Path) -> MeetResult<()> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        let bytes = self
            .page
            .screenshot(params)
            .await
            .map_err(|e| MeetError::Page(e.to_string()))?;
        tokio::fs::write(path, bytes)
            .await
            .map_err(|e| MeetError::io(path, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modifier_flags() {
        assert_eq!(modifier_flag("Control"), 2);
        assert_eq!(modifier_flag("Alt"), 1);
        assert_eq!(modifier_flag("Meta"), 4);
        assert_eq!(modifier_flag("Shift"), 8);
        assert_eq!(modifier_flag("Hyper"), 0);
    }

    #[test]
    fn test_escape_js() {
        assert_eq!(escape_js(r#"a"b"#), r#"a\"b"#);
        assert_eq!(escape_js(r"a\b"), r"a\\b");
    }

    #[test]
    fn test_stealth_args_disable_automation_banner() {
        let args = stealth_args();
        assert!(args
            .iter()
            .any(|a| a.contains("AutomationControlled")));
    }

    #[test]
    fn test_stealth_args_provide_fake_media_devices() {
        let args = stealth_args();
        assert!(args.contains(&"--use-fake-ui-for-media-stream".to_string()));
        assert!(args.contains(&"--use-fake-device-for-media-stream".to_string()));
    }

    #[test]
    fn test_headless_args_leave_audio_unmuted() {
        let args = headless_args();
        assert!(args.contains(&"--headless=new".to_string()));
        assert!(!args.iter().any(|a| a.contains("mute-audio")));
    }

    #[test]
    fn test_key_codes_for_shortcut_dispatch() {
        assert_eq!(key_codes("a"), Some((65, "KeyA".to_string())));
        assert_eq!(key_codes("A"), Some((65, "KeyA".to_string())));
        assert_eq!(key_codes("7"), Some((55, "Digit7".to_string())));
        assert_eq!(key_codes("Backspace"), Some((8, "Backspace".to_string())));
        assert_eq!(key_codes("Enter"), Some((13, "Enter".to_string())));
        assert_eq!(key_codes("F13"), None);
    }
}
