//! Client configuration.
//!
//! Everything that is not tool-specific lives in [`ClientConfig`], built via
//! [`ClientConfigBuilder`]. Tool-specific behaviour (allowed types, option
//! bounds, endpoint) lives in [`crate::schema::ToolSchema`] instead.
//!
//! # Example
//! ```rust
//! use toolflow::ClientConfig;
//!
//! let config = ClientConfig::builder()
//!     .base_url("http://localhost:5000")
//!     .request_timeout_secs(Some(60))
//!     .auto_download(false)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.progress_cap, 95);
//! ```

use crate::error::ToolflowError;
use crate::schema::ToolSchema;
use reqwest::Url;

/// Configuration shared by every tool controller.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend origin; endpoint paths are joined onto it.
    /// Default: `http://127.0.0.1:5000`.
    pub base_url: String,

    /// Whole-request timeout in seconds. `None` waits indefinitely.
    /// Default: 300.
    ///
    /// Uploads of 50 MB files to a slow backend routinely take minutes, so the
    /// default is generous; it exists so a wedged server cannot leave the
    /// action control disabled forever.
    pub request_timeout_secs: Option<u64>,

    /// Allow tools with an auto-download policy to fetch their result
    /// without user action. Default: true.
    pub auto_download: bool,

    /// Delay between showing a result and the automatic download. Default: 2000.
    pub auto_download_delay_ms: u64,

    /// Interval between simulated progress ticks. Range: ≥10. Default: 200.
    pub progress_tick_ms: u64,

    /// Highest percentage simulated progress may show before the response
    /// arrives. Range: 1–99. Default: 95.
    pub progress_cap: u8,

    /// Replaces every tool's own size ceiling when set.
    pub max_file_size_override: Option<u64>,

    /// `User-Agent` header. Default: `toolflow/<version>`.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            request_timeout_secs: Some(300),
            auto_download: true,
            auto_download_delay_ms: 2000,
            progress_tick_ms: 200,
            progress_cap: 95,
            max_file_size_override: None,
            user_agent: concat!("toolflow/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
        }
    }

    /// Size ceiling in effect for `schema`.
    pub fn max_file_size(&self, schema: &ToolSchema) -> u64 {
        self.max_file_size_override.unwrap_or(schema.max_file_size)
    }

    /// Absolute URL for `path_or_url`; absolute inputs are returned unchanged.
    pub fn resolve_url(&self, path_or_url: &str) -> Result<Url, ToolflowError> {
        let base = Url::parse(&self.base_url)
            .map_err(|e| ToolflowError::InvalidConfig(format!("base URL: {}", e)))?;
        base.join(path_or_url)
            .map_err(|e| ToolflowError::InvalidConfig(format!("URL '{}': {}", path_or_url, e)))
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn request_timeout_secs(mut self, secs: Option<u64>) -> Self {
        self.config.request_timeout_secs = secs.map(|s| s.max(1));
        self
    }

    pub fn auto_download(mut self, v: bool) -> Self {
        self.config.auto_download = v;
        self
    }

    pub fn auto_download_delay_ms(mut self, ms: u64) -> Self {
        self.config.auto_download_delay_ms = ms;
        self
    }

    pub fn progress_tick_ms(mut self, ms: u64) -> Self {
        self.config.progress_tick_ms = ms.max(10);
        self
    }

    pub fn progress_cap(mut self, cap: u8) -> Self {
        self.config.progress_cap = cap.clamp(1, 99);
        self
    }

    pub fn max_file_size_override(mut self, bytes: Option<u64>) -> Self {
        self.config.max_file_size_override = bytes;
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClientConfig, ToolflowError> {
        let url = Url::parse(&self.config.base_url).map_err(|e| {
            ToolflowError::InvalidConfig(format!(
                "base URL '{}' is not valid: {}",
                self.config.base_url, e
            ))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ToolflowError::InvalidConfig(format!(
                "base URL must be http or https, got '{}'",
                url.scheme()
            )));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools;

    #[test]
    fn builder_clamps() {
        let c = ClientConfig::builder()
            .progress_cap(100)
            .progress_tick_ms(1)
            .request_timeout_secs(Some(0))
            .build()
            .unwrap();
        assert_eq!(c.progress_cap, 99);
        assert_eq!(c.progress_tick_ms, 10);
        assert_eq!(c.request_timeout_secs, Some(1));
    }

    #[test]
    fn rejects_bad_base_url() {
        assert!(ClientConfig::builder().base_url("not a url").build().is_err());
        assert!(ClientConfig::builder()
            .base_url("ftp://files.example.com")
            .build()
            .is_err());
    }

    #[test]
    fn resolves_relative_and_absolute_urls() {
        let c = ClientConfig::builder()
            .base_url("http://localhost:5000")
            .build()
            .unwrap();
        assert_eq!(
            c.resolve_url("/files/merged123.pdf").unwrap().as_str(),
            "http://localhost:5000/files/merged123.pdf"
        );
        assert_eq!(
            c.resolve_url("https://cdn.example.com/x.pdf").unwrap().as_str(),
            "https://cdn.example.com/x.pdf"
        );
    }

    #[test]
    fn size_override() {
        let schema = tools::pdf_compressor();
        let c = ClientConfig::default();
        assert_eq!(c.max_file_size(&schema), 50 * 1024 * 1024);
        let c = ClientConfig::builder()
            .max_file_size_override(Some(10))
            .build()
            .unwrap();
        assert_eq!(c.max_file_size(&schema), 10);
    }
}
