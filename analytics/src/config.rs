/// Builder-style configuration for [`crate::HttpAnalytics`].
#[derive(Debug, Clone, Default)]
pub struct AnalyticsConfig {
    pub base_url: String,
    pub api_key: String,
}

impl AnalyticsConfig {
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = key.to_string();
        self
    }
}
