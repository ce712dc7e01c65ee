//! Synthetic browser identity generation.
//!
//! One [`BrowserIdentity`] is generated per browser session from curated
//! pools of user agents, viewports, locales and timezones. All fields are
//! drawn together so they stay mutually plausible: the user agent decides the
//! platform, and the platform decides which plugin set and locale pool are
//! eligible. The identity is immutable for the session; the same viewport
//! value feeds `--window-size`, the CDP viewport and the JS `screen`
//! overrides.
//!
//! # Usage
//!
//! ```rust
//! use meetbot::stealth::IdentityGenerator;
//!
//! let mut generator = IdentityGenerator::new();
//! let identity = generator.generate();
//! assert!(identity.viewport.width >= 1024);
//!
//! // Deterministic generation for tests
//! let mut seeded = IdentityGenerator::seeded(42);
//! assert_eq!(seeded.generate().user_agent, IdentityGenerator::seeded(42).generate().user_agent);
//! ```

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Platform implied by a user agent string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    /// Windows 10/11.
    Windows,
    /// macOS.
    Mac,
    /// Desktop Linux.
    Linux,
}

impl Platform {
    /// The `navigator.platform` value for this platform.
    pub fn navigator_platform(&self) -> &'static str {
        match self {
            Platform::Windows => "Win32",
            Platform::Mac => "MacIntel",
            Platform::Linux => "Linux x86_64",
        }
    }
}

/// Page viewport dimensions in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// One entry in the synthetic `navigator.plugins` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub name: String,
    pub description: String,
    pub filename: String,
}

impl PluginDescriptor {
    fn new(name: &str, description: &str, filename: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            filename: filename.to_string(),
        }
    }
}

/// A complete synthetic browser identity for one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserIdentity {
    /// Full user agent string.
    pub user_agent: String,
    /// Platform implied by the user agent.
    pub platform: Platform,
    /// Window and page viewport.
    pub viewport: Viewport,
    /// BCP 47 locale, e.g. `en-US`.
    pub locale: String,
    /// IANA timezone name.
    pub timezone: String,
    /// Value reported by `navigator.hardwareConcurrency`.
    pub hardware_concurrency: u32,
    /// Value reported by `navigator.deviceMemory`, in gigabytes.
    pub device_memory_gb: u32,
    /// Synthetic plugin list, platform-consistent.
    pub plugin_descriptors: Vec<PluginDescriptor>,
    /// Seed for per-session randomization (canvas noise phase).
    pub cookie_seed: u64,
}

/// User agent pool. Each entry carries the platform it implies.
const USER_AGENTS: &[(&str, Platform)] = &[
    (
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
        Platform::Windows,
    ),
    (
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
        Platform::Windows,
    ),
    (
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
        Platform::Windows,
    ),
    (
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
        Platform::Mac,
    ),
    (
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
        Platform::Mac,
    ),
    (
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
        Platform::Linux,
    ),
];

/// Viewport pool. Every entry satisfies width >= 1024 and height >= 768.
const VIEWPORTS: &[(u32, u32)] = &[
    (1920, 1080),
    (1600, 900),
    (1536, 864),
    (1440, 900),
    (1366, 768),
    (2560, 1440),
];

/// Locale pool per platform.
const WINDOWS_LOCALES: &[&str] = &["en-US", "en-GB", "en-CA"];
const MAC_LOCALES: &[&str] = &["en-US", "en-GB"];
const LINUX_LOCALES: &[&str] = &["en-US", "en-GB"];

/// Timezone pool.
const TIMEZONES: &[&str] = &[
    "America/New_York",
    "America/Chicago",
    "America/Denver",
    "America/Los_Angeles",
    "Europe/London",
    "Europe/Berlin",
    "Australia/Sydney",
];

/// Realistic hardware hint pools.
const HARDWARE_CONCURRENCY: &[u32] = &[4, 8, 12, 16];
const DEVICE_MEMORY_GB: &[u32] = &[4, 8, 16];

impl BrowserIdentity {
    /// Returns every locale any generated identity may carry.
    pub fn locale_pool() -> Vec<&'static str> {
        let mut pool: Vec<&'static str> = WINDOWS_LOCALES.to_vec();
        for l in MAC_LOCALES.iter().chain(LINUX_LOCALES.iter()) {
            if !pool.contains(l) {
                pool.push(l);
            }
        }
        pool
    }

    /// Returns every timezone any generated identity may carry.
    pub fn timezone_pool() -> &'static [&'static str] {
        TIMEZONES
    }
}

/// Generates self-consistent browser identities from curated pools.
#[derive(Debug)]
pub struct IdentityGenerator {
    rng: StdRng,
}

impl IdentityGenerator {
    /// Creates a generator backed by an entropy seed.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Creates a generator with a fixed seed. The same seed always produces
    /// the same identity sequence.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Generates one complete identity. Infallible by construction: every
    /// field is a uniform draw from a non-empty pool.
    pub fn generate(&mut self) -> BrowserIdentity {
        let (user_agent, platform) = USER_AGENTS[self.rng.gen_range(0..USER_AGENTS.len())];
        let (width, height) = VIEWPORTS[self.rng.gen_range(0..VIEWPORTS.len())];

        let locales: &[&str] = match platform {
            Platform::Windows => WINDOWS_LOCALES,
            Platform::Mac => MAC_LOCALES,
            Platform::Linux => LINUX_LOCALES,
        };
        let locale = locales[self.rng.gen_range(0..locales.len())];
        let timezone = TIMEZONES[self.rng.gen_range(0..TIMEZONES.len())];
        let hardware_concurrency =
            HARDWARE_CONCURRENCY[self.rng.gen_range(0..HARDWARE_CONCURRENCY.len())];
        let device_memory_gb = DEVICE_MEMORY_GB[self.rng.gen_range(0..DEVICE_MEMORY_GB.len())];

        BrowserIdentity {
            user_agent: user_agent.to_string(),
            platform,
            viewport: Viewport::new(width, height),
            locale: locale.to_string(),
            timezone: timezone.to_string(),
            hardware_concurrency,
            device_memory_gb,
            plugin_descriptors: chrome_plugins(),
            cookie_seed: self.rng.gen(),
        }
    }

    /// A fixed, minimal identity for the emergency low-stealth fallback:
    /// the most common Windows Chrome configuration, no randomization.
    pub fn emergency() -> BrowserIdentity {
        BrowserIdentity {
            user_agent: USER_AGENTS[0].0.to_string(),
            platform: Platform::Windows,
            viewport: Viewport::new(1920, 1080),
            locale: "en-US".to_string(),
            timezone: "America/New_York".to_string(),
            hardware_concurrency: 8,
            device_memory_gb: 8,
            plugin_descriptors: chrome_plugins(),
            cookie_seed: 0,
        }
    }
}

impl Default for IdentityGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// The plugin set modern Chrome exposes on every desktop platform.
fn chrome_plugins() -> Vec<PluginDescriptor> {
    vec![
        PluginDescriptor::new(
            "PDF Viewer",
            "Portable Document Format",
            "internal-pdf-viewer",
        ),
        PluginDescriptor::new(
            "Chrome PDF Viewer",
            "Portable Document Format",
            "internal-pdf-viewer",
        ),
        PluginDescriptor::new(
            "Chromium PDF Viewer",
            "Portable Document Format",
            "internal-pdf-viewer",
        ),
        PluginDescriptor::new(
            "Microsoft Edge PDF Viewer",
            "Portable Document Format",
            "internal-pdf-viewer",
        ),
        PluginDescriptor::new(
            "WebKit built-in PDF",
            "Portable Document Format",
            "internal-pdf-viewer",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_minimums() {
        let mut generator = IdentityGenerator::new();
        for _ in 0..100 {
            let identity = generator.generate();
            assert!(identity.viewport.width >= 1024);
            assert!(identity.viewport.height >= 768);
        }
    }

    #[test]
    fn test_pools_are_closed() {
        let mut generator = IdentityGenerator::new();
        let locales = BrowserIdentity::locale_pool();
        let timezones = BrowserIdentity::timezone_pool();
        for _ in 0..100 {
            let identity = generator.generate();
            assert!(locales.contains(&identity.locale.as_str()));
            assert!(timezones.contains(&identity.timezone.as_str()));
            assert!(HARDWARE_CONCURRENCY.contains(&identity.hardware_concurrency));
            assert!(DEVICE_MEMORY_GB.contains(&identity.device_memory_gb));
        }
    }

    #[test]
    fn test_platform_consistency() {
        let mut generator = IdentityGenerator::new();
        for _ in 0..100 {
            let identity = generator.generate();
            let expected = if identity.user_agent.contains("Windows NT") {
                Platform::Windows
            } else if identity.user_agent.contains("Macintosh") {
                Platform::Mac
            } else {
                Platform::Linux
            };
            assert_eq!(identity.platform, expected);
            assert!(!identity.plugin_descriptors.is_empty());
        }
    }

    #[test]
    fn test_seeded_generation_is_deterministic() {
        let a = IdentityGenerator::seeded(99).generate();
        let b = IdentityGenerator::seeded(99).generate();
        assert_eq!(a.user_agent, b.user_agent);
        assert_eq!(a.viewport, b.viewport);
        assert_eq!(a.locale, b.locale);
        assert_eq!(a.timezone, b.timezone);
        assert_eq!(a.cookie_seed, b.cookie_seed);
    }

    #[test]
    fn test_emergency_identity_is_fixed() {
        let a = IdentityGenerator::emergency();
        let b = IdentityGenerator::emergency();
        assert_eq!(a.user_agent, b.user_agent);
        assert_eq!(a.viewport, Viewport::new(1920, 1080));
        assert_eq!(a.locale, "en-US");
    }
}
