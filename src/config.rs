//! Client configuration: backend URL, timeouts and channel settings.
//!
//! Layering, lowest precedence first: built-in defaults, an optional TOML
//! file, the `TRAVEL_PLANNER_API_URL` environment variable, then explicit
//! overrides from the command line.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Environment variable overriding the backend base URL.
pub const ENV_BACKEND_URL: &str = "TRAVEL_PLANNER_API_URL";

/// Backend used when nothing else is configured.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5000";

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 3;
const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 10;
const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 120;
const DEFAULT_RECONNECT_DELAY_MS: u64 = 1000;
const DEFAULT_CHANNEL_PATH: &str = "/ws";

/// Runtime configuration shared by the prober, uploader and channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL of the backend, without a trailing slash.
    pub base_url: String,
    /// TCP connect timeout for HTTP requests.
    pub connect_timeout: Duration,
    /// Total time allowed for the reachability probe.
    pub probe_timeout: Duration,
    /// Total time allowed for an image upload, including AI extraction.
    pub upload_timeout: Duration,
    /// Path of the WebSocket endpoint on the backend host.
    pub channel_path: String,
    /// Pause between channel reconnect attempts.
    pub reconnect_delay: Duration,
    /// Name shown next to messages sent from this client.
    pub display_name: String,
}

impl ClientConfig {
    /// Create a config with sensible defaults.
    ///
    /// - connect_timeout: 3 s
    /// - probe_timeout: 10 s
    /// - upload_timeout: 120 s
    /// - reconnect_delay: 1 s
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base_url(&base_url.into()),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            probe_timeout: Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS),
            upload_timeout: Duration::from_secs(DEFAULT_UPLOAD_TIMEOUT_SECS),
            channel_path: DEFAULT_CHANNEL_PATH.to_string(),
            reconnect_delay: Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS),
            display_name: crate::models::LOCAL_AUTHOR.to_string(),
        }
    }

    /// Defaults plus the `TRAVEL_PLANNER_API_URL` override, if set.
    pub fn from_env() -> Self {
        Self::new(resolve_base_url(std::env::var(ENV_BACKEND_URL).ok()))
    }

    /// Load defaults, then the TOML file at `path`, then the environment.
    ///
    /// The result is not validated: callers apply their own overrides and
    /// call [`ClientConfig::validate`] on the final value.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::layered(path, std::env::var(ENV_BACKEND_URL).ok())
    }

    fn layered(path: Option<&Path>, env_url: Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::new(DEFAULT_BACKEND_URL);
        if let Some(path) = path {
            let file = ConfigFile::read(path)?;
            config.apply_file(file);
        }
        if let Some(url) = env_url.filter(|u| !u.trim().is_empty()) {
            config.base_url = normalize_base_url(&url);
        }
        Ok(config)
    }

    /// Replace the backend base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = normalize_base_url(&base_url.into());
        self
    }

    pub fn with_upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout = timeout;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Reject base URLs that are not plain HTTP(S).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.starts_with("http://") || self.base_url.starts_with("https://") {
            Ok(())
        } else {
            Err(ConfigError::InvalidUrl(self.base_url.clone()))
        }
    }

    /// `GET` target of the reachability probe.
    pub fn probe_url(&self) -> String {
        format!("{}/", self.base_url)
    }

    /// `POST` target of the itinerary upload.
    pub fn upload_url(&self) -> String {
        format!("{}/api/upload-image", self.base_url)
    }

    /// WebSocket URL of the real-time channel.
    ///
    /// `http` maps to `ws`, `https` to `wss`.
    pub fn channel_url(&self) -> String {
        let ws_base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.base_url.clone()
        };
        if self.channel_path.starts_with('/') {
            format!("{ws_base}{}", self.channel_path)
        } else {
            format!("{ws_base}/{}", self.channel_path)
        }
    }

    fn apply_file(&mut self, file: ConfigFile) {
        if let Some(url) = file.backend_url {
            self.base_url = normalize_base_url(&url);
        }
        if let Some(secs) = file.connect_timeout_secs {
            self.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.probe_timeout_secs {
            self.probe_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.upload_timeout_secs {
            self.upload_timeout = Duration::from_secs(secs);
        }
        if let Some(path) = file.channel_path {
            self.channel_path = path;
        }
        if let Some(ms) = file.reconnect_delay_ms {
            self.reconnect_delay = Duration::from_millis(ms);
        }
        if let Some(name) = file.display_name {
            self.display_name = name;
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BACKEND_URL)
    }
}

/// On-disk shape of the optional TOML config file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    backend_url: Option<String>,
    connect_timeout_secs: Option<u64>,
    probe_timeout_secs: Option<u64>,
    upload_timeout_secs: Option<u64>,
    channel_path: Option<String>,
    reconnect_delay_ms: Option<u64>,
    display_name: Option<String>,
}

impl ConfigFile {
    fn read(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&raw).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            detail: e.to_string(),
        })
    }
}

/// Pick the env-provided URL when it is set and non-blank, else the default.
pub fn resolve_base_url(env_value: Option<String>) -> String {
    match env_value {
        Some(url) if !url.trim().is_empty() => normalize_base_url(&url),
        _ => DEFAULT_BACKEND_URL.to_string(),
    }
}

fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;

    #[test]
    fn test_new_has_default_timeouts() {
        let cfg = ClientConfig::new("http://localhost:5000");
        assert_eq!(cfg.connect_timeout, Duration::from_secs(3));
        assert_eq!(cfg.probe_timeout, Duration::from_secs(10));
        assert_eq!(cfg.upload_timeout, Duration::from_secs(120));
        assert_eq!(cfg.reconnect_delay, Duration::from_millis(1000));
    }

    #[test]
    fn test_new_trims_trailing_slashes() {
        let cfg = ClientConfig::new("http://example.com:8080//");
        assert_eq!(cfg.base_url, "http://example.com:8080");
    }

    #[test]
    fn test_endpoint_urls() {
        let cfg = ClientConfig::new("http://x");
        assert_eq!(cfg.probe_url(), "http://x/");
        assert_eq!(cfg.upload_url(), "http://x/api/upload-image");
    }

    #[rstest]
    #[case("http://localhost:5000", "/ws", "ws://localhost:5000/ws")]
    #[case("https://planner.example", "/ws", "wss://planner.example/ws")]
    #[case("http://127.0.0.1:9000", "chat", "ws://127.0.0.1:9000/chat")]
    fn test_channel_url_maps_scheme(#[case] base: &str, #[case] path: &str, #[case] expected: &str) {
        let mut cfg = ClientConfig::new(base);
        cfg.channel_path = path.to_string();
        assert_eq!(cfg.channel_url(), expected);
    }

    #[rstest]
    #[case(None, DEFAULT_BACKEND_URL)]
    #[case(Some("   "), DEFAULT_BACKEND_URL)]
    #[case(Some("https://api.trip.dev/"), "https://api.trip.dev")]
    fn test_resolve_base_url_prefers_non_blank_env(#[case] env: Option<&str>, #[case] expected: &str) {
        assert_eq!(resolve_base_url(env.map(str::to_string)), expected);
    }

    #[test]
    fn test_validate_rejects_non_http_scheme() {
        let cfg = ClientConfig::new("ftp://files");
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn test_apply_file_overrides_only_present_keys() {
        let mut cfg = ClientConfig::default();
        cfg.apply_file(ConfigFile {
            upload_timeout_secs: Some(30),
            display_name: Some("Mei".to_string()),
            ..Default::default()
        });
        assert_eq!(cfg.upload_timeout, Duration::from_secs(30));
        assert_eq!(cfg.display_name, "Mei");
        assert_eq!(cfg.probe_timeout, Duration::from_secs(10));
        assert_eq!(cfg.base_url, DEFAULT_BACKEND_URL);
    }

    #[test]
    fn test_config_file_reads_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "backend_url = \"http://10.0.0.2:5000/\"\nchannel_path = \"/socket\"\nreconnect_delay_ms = 250"
        )
        .unwrap();
        let parsed = ConfigFile::read(file.path()).unwrap();
        let mut cfg = ClientConfig::default();
        cfg.apply_file(parsed);
        assert_eq!(cfg.base_url, "http://10.0.0.2:5000");
        assert_eq!(cfg.channel_path, "/socket");
        assert_eq!(cfg.reconnect_delay, Duration::from_millis(250));
    }

    #[test]
    fn test_layered_env_beats_file_and_skips_validation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "backend_url = \"ftp://old\"\nupload_timeout_secs = 45").unwrap();

        let from_file = ClientConfig::layered(Some(file.path()), None).unwrap();
        assert_eq!(from_file.base_url, "ftp://old");
        assert!(from_file.validate().is_err());

        let with_env =
            ClientConfig::layered(Some(file.path()), Some("http://10.0.0.3:5000/".into())).unwrap();
        assert_eq!(with_env.base_url, "http://10.0.0.3:5000");
        assert_eq!(with_env.upload_timeout, Duration::from_secs(45));
    }

    #[test]
    fn test_layered_blank_env_is_ignored() {
        let cfg = ClientConfig::layered(None, Some("  ".into())).unwrap();
        assert_eq!(cfg.base_url, DEFAULT_BACKEND_URL);
    }

    #[test]
    fn test_config_file_rejects_unknown_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "backend = \"http://x\"").unwrap();
        assert!(matches!(ConfigFile::read(file.path()), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_config_file_missing_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(ConfigFile::read(&missing), Err(ConfigError::Read { .. })));
    }
}
