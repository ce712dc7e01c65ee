//! Runtime stealth patches.
//!
//! Generates the JavaScript that is installed with
//! `Page.addScriptToEvaluateOnNewDocument`, so it runs before any page script
//! on every navigation. The overrides make the page observe:
//!
//! - `navigator.webdriver` reads `false`
//! - `navigator.plugins` / `navigator.languages` return non-empty,
//!   locale-consistent values from the session identity
//! - `navigator.hardwareConcurrency` / `deviceMemory` report the identity's
//!   values
//! - `screen` dimensions match the identity viewport
//! - canvas `toDataURL` / `getImageData` are perturbed by bounded noise on
//!   small surfaces only, so fingerprint canvases are poisoned while real
//!   rendering stays visually intact
//! - `navigator.permissions.query` returns plausible defaults instead of
//!   rejecting

use super::identity::BrowserIdentity;

/// Builds the complete pre-navigation stealth script for one identity.
pub fn stealth_script(identity: &BrowserIdentity) -> String {
    let mut script = String::with_capacity(8192);
    script.push_str(&navigator_overrides(identity));
    script.push_str(&screen_overrides(identity));
    script.push_str(&timezone_override(identity));
    script.push_str(&canvas_noise(identity));
    script.push_str(PERMISSIONS_SHIM);
    script
}

fn navigator_overrides(identity: &BrowserIdentity) -> String {
    let plugins_json = plugins_to_json(identity);
    let primary = &identity.locale;
    let base = identity.locale.split('-').next().unwrap_or("en");

    format!(
        r#"
// navigator.webdriver is the first thing bot checks look at
Object.defineProperty(navigator, 'webdriver', {{
    get: function() {{ return false; }},
    configurable: true
}});

Object.defineProperty(navigator, 'platform', {{
    get: function() {{ return "{platform}"; }},
    configurable: true
}});

Object.defineProperty(navigator, 'language', {{
    get: function() {{ return "{primary}"; }},
    configurable: true
}});
Object.defineProperty(navigator, 'languages', {{
    get: function() {{ return ["{primary}", "{base}"]; }},
    configurable: true
}});

Object.defineProperty(navigator, 'hardwareConcurrency', {{
    get: function() {{ return {cores}; }},
    configurable: true
}});
Object.defineProperty(navigator, 'deviceMemory', {{
    get: function() {{ return {memory}; }},
    configurable: true
}});

// Realistic plugin array built from the session identity
(function() {{
    const pluginData = {plugins_json};
    const plugins = pluginData.map(function(p) {{
        const plugin = Object.create(Plugin.prototype);
        Object.defineProperties(plugin, {{
            'name': {{ value: p.name, enumerable: true }},
            'description': {{ value: p.description, enumerable: true }},
            'filename': {{ value: p.filename, enumerable: true }},
            'length': {{ value: 0, enumerable: true }}
        }});
        return plugin;
    }});

    const pluginArray = Object.create(PluginArray.prototype);
    plugins.forEach(function(plugin, i) {{
        Object.defineProperty(pluginArray, i, {{ value: plugin, enumerable: true }});
        Object.defineProperty(pluginArray, plugin.name, {{ value: plugin, enumerable: false }});
    }});
    Object.defineProperty(pluginArray, 'length', {{ value: plugins.length, enumerable: true }});
    pluginArray.item = function(index) {{ return plugins[index] || null; }};
    pluginArray.namedItem = function(name) {{
        return plugins.find(function(p) {{ return p.name === name; }}) || null;
    }};
    pluginArray.refresh = function() {{}};

    Object.defineProperty(navigator, 'plugins', {{
        get: function() {{ return pluginArray; }},
        configurable: true
    }});
}})();
"#,
        platform = identity.platform.navigator_platform(),
        primary = primary,
        base = base,
        cores = identity.hardware_concurrency,
        memory = identity.device_memory_gb,
        plugins_json = plugins_json,
    )
}

fn screen_overrides(identity: &BrowserIdentity) -> String {
    let width = identity.viewport.width;
    let height = identity.viewport.height;
    // Leave room for a taskbar like a real desktop would
    let avail_height = height.saturating_sub(40);

    format!(
        r#"
Object.defineProperty(screen, 'width', {{
    get: function() {{ return {width}; }},
    configurable: true
}});
Object.defineProperty(screen, 'height', {{
    get: function() {{ return {height}; }},
    configurable: true
}});
Object.defineProperty(screen, 'availWidth', {{
    get: function() {{ return {width}; }},
    configurable: true
}});
Object.defineProperty(screen, 'availHeight', {{
    get: function() {{ return {avail_height}; }},
    configurable: true
}});
Object.defineProperty(screen, 'colorDepth', {{
    get: function() {{ return 24; }},
    configurable: true
}});
Object.defineProperty(screen, 'pixelDepth', {{
    get: function() {{ return 24; }},
    configurable: true
}});
"#,
    )
}

fn timezone_override(identity: &BrowserIdentity) -> String {
    format!(
        r#"
const originalResolvedOptions = Intl.DateTimeFormat.prototype.resolvedOptions;
Intl.DateTimeFormat.prototype.resolvedOptions = function() {{
    const options = originalResolvedOptions.call(this);
    options.timeZone = "{timezone}";
    return options;
}};
"#,
        timezone = identity.timezone,
    )
}

/// Canvas readback noise, seeded per session.
///
/// Fingerprinting canvases are small hidden surfaces; real video tiles and
/// UI canvases are large. Only surfaces up to 64k pixels are perturbed, and
/// each perturbation flips the low bit of a deterministic subset of bytes so
/// repeated reads within one session stay self-consistent.
fn canvas_noise(identity: &BrowserIdentity) -> String {
    format!(
        r#"
(function() {{
    const SEED = {seed};
    const MAX_NOISED_PIXELS = 65536;

    function noiseByte(value, index) {{
        // xorshift-style mix of seed and byte index
        let h = (SEED ^ index) >>> 0;
        h = Math.imul(h ^ (h >>> 16), 2246822507) >>> 0;
        h = Math.imul(h ^ (h >>> 13), 3266489909) >>> 0;
        return (h & 0xff) < 8 ? (value ^ 1) : value;
    }}

    function perturb(imageData) {{
        const data = imageData.data;
        if (data.length / 4 > MAX_NOISED_PIXELS) return imageData;
        for (let i = 0; i < data.length; i += 4) {{
            data[i] = noiseByte(data[i], i);
            data[i + 1] = noiseByte(data[i + 1], i + 1);
            data[i + 2] = noiseByte(data[i + 2], i + 2);
        }}
        return imageData;
    }}

    const originalGetImageData = CanvasRenderingContext2D.prototype.getImageData;
    CanvasRenderingContext2D.prototype.getImageData = function(x, y, w, h) {{
        return perturb(originalGetImageData.call(this, x, y, w, h));
    }};

    const originalToDataURL = HTMLCanvasElement.prototype.toDataURL;
    HTMLCanvasElement.prototype.toDataURL = function() {{
        if (this.width * this.height <= MAX_NOISED_PIXELS) {{
            const ctx = this.getContext('2d');
            if (ctx) {{
                const snapshot = originalGetImageData.call(ctx, 0, 0, this.width, this.height);
                ctx.putImageData(perturb(snapshot), 0, 0);
            }}
        }}
        return originalToDataURL.apply(this, arguments);
    }};
}})();
"#,
        seed = (identity.cookie_seed & 0xffff_ffff) as u32,
    )
}

/// Headless Chrome rejects some permission queries outright; a real browser
/// resolves them with a default state.
const PERMISSIONS_SHIM: &str = r#"
(function() {
    if (!navigator.permissions || !navigator.permissions.query) return;
    const originalQuery = navigator.permissions.query.bind(navigator.permissions);
    navigator.permissions.query = function(parameters) {
        const name = parameters && parameters.name;
        if (name === 'notifications' || name === 'camera' || name === 'microphone') {
            return Promise.resolve({ state: 'prompt', onchange: null });
        }
        return originalQuery(parameters).catch(function() {
            return { state: 'prompt', onchange: null };
        });
    };
})();
"#;

fn plugins_to_json(identity: &BrowserIdentity) -> String {
    let entries: Vec<String> = identity
        .plugin_descriptors
        .iter()
        .map(|p| {
            format!(
                r#"{{"name":"{}","description":"{}","filename":"{}"}}"#,
                escape_js_string(&p.name),
                escape_js_string(&p.description),
                escape_js_string(&p.filename)
            )
        })
        .collect();
    format!("[{}]", entries.join(","))
}

fn escape_js_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stealth::IdentityGenerator;

    #[test]
    fn test_script_covers_all_surfaces() {
        let identity = IdentityGenerator::seeded(1).generate();
        let js = stealth_script(&identity);

        assert!(js.contains("webdriver"));
        assert!(js.contains("plugins"));
        assert!(js.contains("hardwareConcurrency"));
        assert!(js.contains("deviceMemory"));
        assert!(js.contains("getImageData"));
        assert!(js.contains("toDataURL"));
        assert!(js.contains("permissions.query"));
        assert!(js.contains(&identity.timezone));
        assert!(js.contains(&identity.locale));
    }

    #[test]
    fn test_screen_matches_identity_viewport() {
        let identity = IdentityGenerator::seeded(7).generate();
        let js = stealth_script(&identity);
        assert!(js.contains(&format!("return {};", identity.viewport.width)));
        assert!(js.contains(&format!("return {};", identity.viewport.height)));
    }

    #[test]
    fn test_noise_is_seed_bound() {
        let mut generator = IdentityGenerator::seeded(3);
        let a = generator.generate();
        let js_a = stealth_script(&a);
        let seed = (a.cookie_seed & 0xffff_ffff) as u32;
        assert!(js_a.contains(&format!("const SEED = {};", seed)));
    }

    #[test]
    fn test_js_string_escaping() {
        assert_eq!(escape_js_string(r#"a"b"#), r#"a\"b"#);
        assert_eq!(escape_js_string("a\\b"), "a\\\\b");
        assert_eq!(escape_js_string("line\nbreak"), "line\\nbreak");
    }
}
