//! Browser session management and the page abstraction.

pub mod page;
pub mod session;

pub use page::{ClickEffect, CookieSpec, ElementRef, MeetingPage, ScriptedElement, ScriptedPage};
pub use session::{CdpPage, StealthBrowserSession};
