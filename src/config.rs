use std::time::Duration;

use crate::cache::{DEFAULT_CAPACITY, DEFAULT_TTL};
use crate::discount::{DiscountPolicy, DEFAULT_HIGH_RATE, DEFAULT_LOW_RATE, DEFAULT_MEDIUM_RATE};
use crate::enrichment::{EnrichmentSettings, DEFAULT_BATCH_TIMEOUT, DEFAULT_MAX_IN_FLIGHT};
use crate::retry::{RetryPolicy, DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS};

pub const DEFAULT_USER_AGENT: &str = "lease-credit-enrichment/0.1";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub filings_registry_url: String,
    pub filings_user_agent: String,
    pub formation_registry_url: String,
    pub formation_api_token: Option<String>,
    pub registry_timeout: Duration,
    pub max_in_flight: usize,
    pub batch_timeout: Duration,
    pub cache_ttl: Duration,
    pub cache_capacity: u64,
    pub retry_max_attempts: u32,
    pub retry_base_delay: Duration,
    pub discount_policy: DiscountPolicy,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            port: parse_var("PORT", 3000u16)?,
            filings_registry_url: required_url("FILINGS_REGISTRY_URL")?,
            filings_user_agent: std::env::var("FILINGS_REGISTRY_USER_AGENT")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            formation_registry_url: required_url("FORMATION_REGISTRY_URL")?,
            formation_api_token: std::env::var("FORMATION_REGISTRY_API_TOKEN")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            registry_timeout: Duration::from_secs(parse_var("REGISTRY_TIMEOUT_SECS", 10u64)?),
            max_in_flight: parse_var("MAX_IN_FLIGHT_LOOKUPS", DEFAULT_MAX_IN_FLIGHT)?,
            batch_timeout: Duration::from_secs(parse_var(
                "BATCH_TIMEOUT_SECS",
                DEFAULT_BATCH_TIMEOUT.as_secs(),
            )?),
            cache_ttl: Duration::from_secs(parse_var(
                "FACT_CACHE_TTL_SECS",
                DEFAULT_TTL.as_secs(),
            )?),
            cache_capacity: parse_var("FACT_CACHE_CAPACITY", DEFAULT_CAPACITY)?,
            retry_max_attempts: parse_var("RETRY_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?,
            retry_base_delay: Duration::from_millis(parse_var(
                "RETRY_BASE_DELAY_MS",
                DEFAULT_BASE_DELAY.as_millis() as u64,
            )?),
            discount_policy: DiscountPolicy::from_rates(
                parse_var("DISCOUNT_RATE_LOW", DEFAULT_LOW_RATE)?,
                parse_var("DISCOUNT_RATE_MEDIUM", DEFAULT_MEDIUM_RATE)?,
                parse_var("DISCOUNT_RATE_HIGH", DEFAULT_HIGH_RATE)?,
            ),
        };

        if config.registry_timeout.is_zero() {
            anyhow::bail!("REGISTRY_TIMEOUT_SECS must be positive");
        }
        config
            .settings()
            .validate()
            .map_err(|e| anyhow::anyhow!("{}", e))?;
        config
            .discount_policy
            .validate()
            .map_err(|e| anyhow::anyhow!("{}", e))?;

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Filings registry URL: {}", config.filings_registry_url);
        tracing::debug!("Formation registry URL: {}", config.formation_registry_url);
        tracing::debug!(
            "Max in-flight lookups: {}, batch timeout: {}s, cache TTL: {}s",
            config.max_in_flight,
            config.batch_timeout.as_secs(),
            config.cache_ttl.as_secs()
        );
        tracing::debug!("Discount policy: {:?}", config.discount_policy);

        Ok(config)
    }

    /// The engine settings this configuration describes.
    pub fn settings(&self) -> EnrichmentSettings {
        EnrichmentSettings {
            max_in_flight: self.max_in_flight,
            batch_timeout: self.batch_timeout,
            cache_ttl: self.cache_ttl,
            cache_capacity: self.cache_capacity,
            retry: RetryPolicy {
                max_attempts: self.retry_max_attempts,
                base_delay: self.retry_base_delay,
                ..RetryPolicy::default()
            },
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> anyhow::Result<T> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} has an invalid value: '{}'", name, raw)),
        _ => Ok(default),
    }
}

fn required_url(name: &str) -> anyhow::Result<String> {
    std::env::var(name)
        .map_err(|_| anyhow::anyhow!("{} environment variable required", name))
        .and_then(|url| validate_url(name, url))
}

fn validate_url(name: &str, url: String) -> anyhow::Result<String> {
    if url.trim().is_empty() {
        anyhow::bail!("{} cannot be empty", name);
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        anyhow::bail!("{} must start with http:// or https://", name);
    }
    url::Url::parse(&url).map_err(|e| anyhow::anyhow!("{} is not a valid URL: {}", name, e))?;
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("X", "https://registry.example.com".to_string()).is_ok());
        assert!(validate_url("X", "".to_string()).is_err());
        assert!(validate_url("X", "ftp://registry.example.com".to_string()).is_err());
        assert!(validate_url("X", "https://".to_string()).is_err());
    }

    #[test]
    fn test_parse_var_default_when_unset() {
        let value: u32 = parse_var("LEASE_CREDIT_TEST_SURELY_UNSET", 7).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn test_settings_carry_retry_overrides() {
        let config = Config {
            port: 3000,
            filings_registry_url: "https://filings.example.com".to_string(),
            filings_user_agent: DEFAULT_USER_AGENT.to_string(),
            formation_registry_url: "https://formation.example.com".to_string(),
            formation_api_token: None,
            registry_timeout: Duration::from_secs(10),
            max_in_flight: 4,
            batch_timeout: Duration::from_secs(30),
            cache_ttl: Duration::from_secs(60),
            cache_capacity: 100,
            retry_max_attempts: 5,
            retry_base_delay: Duration::from_millis(200),
            discount_policy: DiscountPolicy::default(),
        };

        let settings = config.settings();
        assert_eq!(settings.max_in_flight, 4);
        assert_eq!(settings.retry.max_attempts, 5);
        assert_eq!(settings.retry.base_delay, Duration::from_millis(200));
        assert_eq!(settings.retry.factor, 2);
    }
}
