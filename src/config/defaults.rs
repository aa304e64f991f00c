//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

// ============================================================================
// Common Defaults
// ============================================================================

pub fn r#true() -> bool {
    true
}

pub fn r#false() -> bool {
    false
}

// ============================================================================
// [build] Section Defaults
// ============================================================================

pub mod build {
    use std::path::PathBuf;

    pub fn root() -> Option<PathBuf> {
        None
    }

    pub fn contents() -> PathBuf {
        "contents".into()
    }

    pub fn templates() -> PathBuf {
        "templates".into()
    }

    pub fn output() -> PathBuf {
        "build".into()
    }

    pub fn base_url() -> String {
        "/".into()
    }

    pub fn file_limit() -> usize {
        40
    }
}

// ============================================================================
// [serve] Section Defaults
// ============================================================================

pub mod serve {
    pub fn interface() -> String {
        "127.0.0.1".into()
    }

    pub fn port() -> u16 {
        8080
    }

    /// Milliseconds between generator re-runs in preview mode.
    pub fn regeneration_delay() -> u64 {
        1000
    }
}
