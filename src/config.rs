use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub crawler: CrawlerConfig,
    pub scanner: ServiceConfig,
    pub classifier: ClassifierConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CrawlerConfig {
    pub delay_min_ms: u64,
    pub delay_max_ms: u64,
    /// Channels processed between long pauses.
    pub batch_size: u64,
    pub batch_pause_secs: u64,
    pub idle_poll_secs: u64,
    pub seeds_file: Option<String>,
    /// Record private channels as PRIVATE instead of dropping them.
    pub keep_private: bool,
}

/// An HTTP collaborator endpoint.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServiceConfig {
    pub url: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ClassifierConfig {
    pub url: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub timeout_secs: u64,
    pub cache_ttl_secs: u64,
    pub cache_capacity: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "data/chanradar.db".into(),
        }
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            delay_min_ms: 3_000,
            delay_max_ms: 8_000,
            batch_size: 25,
            batch_pause_secs: 60,
            idle_poll_secs: 30,
            seeds_file: Some("data/seeds.txt".into()),
            keep_private: false,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8700".into(),
            user: None,
            password: None,
            timeout_secs: 60,
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8701".into(),
            user: None,
            password: None,
            timeout_secs: 60,
            cache_ttl_secs: 24 * 3600,
            cache_capacity: 10_000,
        }
    }
}

impl CrawlerConfig {
    /// Inclusive politeness delay range, tolerating a swapped min/max.
    pub fn delay_range_ms(&self) -> (u64, u64) {
        (self.delay_min_ms.min(self.delay_max_ms), self.delay_min_ms.max(self.delay_max_ms))
    }

    pub fn batch_pause(&self) -> Duration {
        Duration::from_secs(self.batch_pause_secs)
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_secs(self.idle_poll_secs)
    }
}

impl ServiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ClassifierConfig {
    pub fn service(&self) -> ServiceConfig {
        ServiceConfig {
            url: self.url.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
            timeout_secs: self.timeout_secs,
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl Config {
    /// Load config from a TOML file. Falls back to defaults if file doesn't exist.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("Config file {} not found, using defaults", path.display());
            return Self::default();
        }
        match std::fs::read_to_string(path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(config) => {
                    tracing::info!("Config loaded from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {e}, using defaults", path.display());
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read {}: {e}, using defaults", path.display());
                Self::default()
            }
        }
    }

    pub fn parse(contents: &str) -> Result<Self, crate::error::Error> {
        toml::from_str(contents).map_err(|e| crate::error::Error::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = Config::parse(
            r#"
            [crawler]
            batch_size = 5
            keep_private = true

            [classifier]
            url = "http://classifier:9000"
            cache_ttl_secs = 60
            "#,
        )
        .unwrap();

        assert_eq!(config.crawler.batch_size, 5);
        assert!(config.crawler.keep_private);
        assert_eq!(config.crawler.delay_min_ms, 3_000);
        assert_eq!(config.classifier.service().url, "http://classifier:9000");
        assert_eq!(config.classifier.service().timeout_secs, 60);
        assert_eq!(config.classifier.cache_ttl_secs, 60);
        assert_eq!(config.scanner.url, "http://127.0.0.1:8700");
        assert_eq!(config.database.path, "data/chanradar.db");
    }

    #[test]
    fn invalid_file_is_an_error() {
        assert!(Config::parse("[crawler]\nbatch_size = \"many\"").is_err());
    }

    #[test]
    fn missing_file_uses_defaults() {
        let config = Config::load("/nonexistent/chanradar.toml");
        assert_eq!(config.crawler.idle_poll_secs, 30);
        assert!(!config.crawler.keep_private);
    }

    #[test]
    fn swapped_delays_are_ordered() {
        let crawler = CrawlerConfig { delay_min_ms: 900, delay_max_ms: 100, ..Default::default() };
        assert_eq!(crawler.delay_range_ms(), (100, 900));
    }
}
