//! Version string normalization
//!
//! The coordinator tracks bare versions (`2.0.0`) while Git tags and the
//! Omaha manifest may carry a leading `v`.

/// Remove a single leading `v`, if present
pub fn strip_v(version: &str) -> &str {
    version.strip_prefix('v').unwrap_or(version)
}

/// Prefix `v` unless the version already starts with one
pub fn ensure_v(version: &str) -> String {
    if version.starts_with('v') {
        version.to_string()
    } else {
        format!("v{}", version)
    }
}

/// Compare two versions ignoring a leading `v` on either side
pub fn same_version(a: &str, b: &str) -> bool {
    strip_v(a.trim()) == strip_v(b.trim())
}
