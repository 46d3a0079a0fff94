//! Runtime configuration shared by every component.

use std::time::Duration;

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Default connect timeout for API calls.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default overall timeout for API calls.
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 30;

/// Default overall timeout for a single upload.
pub const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 300;

/// Default search page size.
pub const DEFAULT_SEARCH_PAGE_SIZE: u32 = 20;

/// Default number of listing entries read for duplicate detection.
pub const DEFAULT_DUPLICATE_SCAN_LIMIT: u32 = 1000;

/// Default time a finished upload task stays visible.
pub const DEFAULT_TASK_RETENTION_SECS: u64 = 30;

/// Default interval between upload registry sweeps.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 5;

/// Client configuration.
///
/// Built from defaults, then overridden by the config file and CLI flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// API base URL, e.g. `https://vault.example.com`.
    pub base_url: String,
    /// TCP connect timeout for every call.
    pub connect_timeout_secs: u64,
    /// Overall timeout for non-upload calls.
    pub read_timeout_secs: u64,
    /// Overall timeout for a single upload request.
    pub upload_timeout_secs: u64,
    /// Results per search page.
    pub search_page_size: u32,
    /// Listing entries scanned for duplicate names before an upload.
    pub duplicate_scan_limit: u32,
    /// How long terminal upload tasks are kept before the sweep evicts them.
    pub task_retention_secs: u64,
    /// Sweep period.
    pub sweep_interval_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            read_timeout_secs: DEFAULT_READ_TIMEOUT_SECS,
            upload_timeout_secs: DEFAULT_UPLOAD_TIMEOUT_SECS,
            search_page_size: DEFAULT_SEARCH_PAGE_SIZE,
            duplicate_scan_limit: DEFAULT_DUPLICATE_SCAN_LIMIT,
            task_retention_secs: DEFAULT_TASK_RETENTION_SECS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}

impl ClientConfig {
    /// Upload request timeout.
    #[must_use]
    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }

    /// Retention horizon for finished upload tasks.
    #[must_use]
    pub fn task_retention(&self) -> Duration {
        Duration::from_secs(self.task_retention_secs)
    }

    /// Sweep period for the upload registry.
    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.search_page_size, 20);
        assert_eq!(config.task_retention(), Duration::from_secs(30));
        assert_eq!(config.sweep_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_sweep_interval_never_zero() {
        let config = ClientConfig {
            sweep_interval_secs: 0,
            ..ClientConfig::default()
        };
        assert_eq!(config.sweep_interval(), Duration::from_secs(1));
    }
}
