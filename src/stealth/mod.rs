//! Anti-detection support: identity generation and runtime stealth patches.
//!
//! [`IdentityGenerator`] draws one self-consistent [`BrowserIdentity`] per
//! session from curated pools; [`stealth_script`] turns that identity into
//! the JavaScript installed before any page script runs.

pub mod identity;
pub mod patches;

pub use identity::{BrowserIdentity, IdentityGenerator, Platform, PluginDescriptor, Viewport};
pub use patches::stealth_script;
