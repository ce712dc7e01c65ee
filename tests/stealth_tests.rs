//! Identity generation invariants and stealth script content.

use meetbot::stealth::{BrowserIdentity, IdentityGenerator, stealth_script};

#[test]
fn every_generated_identity_is_well_formed() {
    let mut generator = IdentityGenerator::new();
    let locales = BrowserIdentity::locale_pool();
    let timezones = BrowserIdentity::timezone_pool();

    for _ in 0..200 {
        let identity = generator.generate();
        assert!(identity.viewport.width >= 1024);
        assert!(identity.viewport.height >= 768);
        assert!(locales.contains(&identity.locale.as_str()));
        assert!(timezones.contains(&identity.timezone.as_str()));
        assert!(!identity.user_agent.is_empty());
        assert!(!identity.plugin_descriptors.is_empty());
    }
}

#[test]
fn seeded_generators_agree() {
    let mut a = IdentityGenerator::seeded(1234);
    let mut b = IdentityGenerator::seeded(1234);
    for _ in 0..10 {
        let ia = a.generate();
        let ib = b.generate();
        assert_eq!(ia.user_agent, ib.user_agent);
        assert_eq!(ia.locale, ib.locale);
        assert_eq!(ia.timezone, ib.timezone);
        assert_eq!(ia.cookie_seed, ib.cookie_seed);
    }
}

#[test]
fn stealth_script_covers_the_detection_surface() {
    let identity = IdentityGenerator::seeded(5).generate();
    let script = stealth_script(&identity);

    // navigator overrides
    assert!(script.contains("webdriver"));
    assert!(script.contains(&identity.locale));
    assert!(script.contains(&identity.hardware_concurrency.to_string()));
    // timezone shim
    assert!(script.contains(&identity.timezone));
    // canvas noise hooks
    assert!(script.contains("toDataURL"));
    assert!(script.contains("getImageData"));
    // permissions shim
    assert!(script.contains("permissions"));
}

#[test]
fn emergency_identity_is_stable() {
    let a = IdentityGenerator::emergency();
    let b = IdentityGenerator::emergency();
    assert_eq!(a.user_agent, b.user_agent);
    assert_eq!(a.viewport.width, 1920);
    assert_eq!(a.viewport.height, 1080);
    assert_eq!(a.cookie_seed, 0);
}
