//! Version normalization tests
//!
//! The coordinator reports bare versions while Git tags carry a `v` prefix;
//! converting between the two must never double or drop the prefix.

use nua::version::{ensure_v, same_version, strip_v};

const VERSIONS: &[&str] = &["1.0.0", "2.10.3-rc.1", "0.0.0", "10.20.30+build.5"];

#[test]
fn test_ensure_then_strip_returns_bare_version() {
    for version in VERSIONS {
        assert_eq!(strip_v(&ensure_v(version)), *version);
    }
}

#[test]
fn test_ensure_v_is_idempotent() {
    for version in VERSIONS {
        let tagged = ensure_v(version);
        assert_eq!(ensure_v(&tagged), tagged);
        assert_eq!(tagged, format!("v{}", version));
    }
}

#[test]
fn test_strip_v_removes_only_one_prefix() {
    assert_eq!(strip_v("v1.2.3"), "1.2.3");
    assert_eq!(strip_v("1.2.3"), "1.2.3");
    assert_eq!(strip_v("vv1.2.3"), "v1.2.3");
    assert_eq!(strip_v(""), "");
}

#[test]
fn test_same_version_ignores_prefix_and_whitespace() {
    assert!(same_version("v2.0.0", "2.0.0"));
    assert!(same_version(" 2.0.0\n", "v2.0.0"));
    assert!(!same_version("2.0.0", "2.0.1"));
    assert!(!same_version("2.0.0", "v2.0.0-rc.1"));
}
