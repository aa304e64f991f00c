//! `[serve]` section configuration.
//!
//! Contains preview server settings.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// `[serve]` section in thicket.toml - preview server settings.
///
/// # Example
/// ```toml
/// [serve]
/// interface = "0.0.0.0"          # Listen on all interfaces
/// port = 3000
/// watch = true                   # Reload content on file changes
/// regeneration_delay = 500       # ms between generator re-runs
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct ServeConfig {
    /// Network interface to bind.
    #[serde(default = "defaults::serve::interface")]
    #[educe(Default = defaults::serve::interface())]
    pub interface: String,

    /// HTTP port number (default: 8080).
    #[serde(default = "defaults::serve::port")]
    #[educe(Default = defaults::serve::port())]
    pub port: u16,

    /// Enable file watchers for live reload.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub watch: bool,

    /// Minimum interval in milliseconds between generator re-runs.
    #[serde(default = "defaults::serve::regeneration_delay")]
    #[educe(Default = defaults::serve::regeneration_delay())]
    pub regeneration_delay: u64,

    /// Restart the server when thicket.toml changes.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub restart_on_config_change: bool,
}

impl ServeConfig {
    pub const fn regeneration_delay(&self) -> Duration {
        Duration::from_millis(self.regeneration_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::super::SiteConfig;
    use std::time::Duration;

    #[test]
    fn test_serve_config() {
        let config = r#"
            [serve]
            interface = "0.0.0.0"
            port = 3000
            watch = false
            regeneration_delay = 250
            restart_on_config_change = false
        "#;
        let config: SiteConfig = toml::from_str(config).unwrap();

        assert_eq!(config.serve.interface, "0.0.0.0");
        assert_eq!(config.serve.port, 3000);
        assert!(!config.serve.watch);
        assert_eq!(config.serve.regeneration_delay(), Duration::from_millis(250));
        assert!(!config.serve.restart_on_config_change);
    }

    #[test]
    fn test_serve_config_defaults() {
        let config: SiteConfig = toml::from_str("[serve]").unwrap();

        assert_eq!(config.serve.interface, "127.0.0.1");
        assert_eq!(config.serve.port, 8080);
        assert!(config.serve.watch);
        assert_eq!(config.serve.regeneration_delay, 1000);
        assert!(config.serve.restart_on_config_change);
    }

    #[test]
    fn test_unknown_field_rejection() {
        let config = r#"
            [serve]
            unknown_field = "should_fail"
        "#;
        let result: Result<SiteConfig, _> = toml::from_str(config);
        assert!(result.is_err());
    }
}
