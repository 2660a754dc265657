use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::{clean_code, error_for_status, RegistryClient, RegistryKind};
use crate::circuit_breaker::{create_registry_circuit_breaker, guarded, RegistryCircuitBreaker};
use crate::errors::{AppError, RegistryError};
use crate::models::PartialFacts;

/// Search response of the public-market filings registry.
#[derive(Debug, Deserialize)]
struct FilingsSearchResponse {
    #[serde(default)]
    companies: Vec<FilingsCompany>,
}

#[derive(Debug, Deserialize)]
struct FilingsCompany {
    /// Registry's spelling of the matched company; logged, not merged.
    name: Option<String>,
    /// Exchange tickers; a filer with at least one is publicly traded.
    #[serde(default)]
    tickers: Vec<String>,
    state_of_incorporation: Option<String>,
    /// ISO date (`YYYY-MM-DD`).
    incorporation_date: Option<String>,
}

/// Client for the public-market filings registry.
///
/// `GET {base_url}/companies?name={name}` returns
/// `{"companies": [{"name", "tickers", "state_of_incorporation", "incorporation_date"}]}`;
/// the first match is taken. An empty list is `NotFound`.
#[derive(Clone)]
pub struct FilingsRegistryClient {
    client: Client,
    base_url: String,
    breaker: RegistryCircuitBreaker,
}

impl FilingsRegistryClient {
    /// Creates a new `FilingsRegistryClient`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Registry base URL, without trailing slash.
    /// * `user_agent` - Sent on every request; filings registries reject anonymous clients.
    /// * `timeout` - Per-request timeout.
    pub fn new(base_url: String, user_agent: &str, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| {
                AppError::InvalidConfig(format!("Failed to create filings registry client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            breaker: create_registry_circuit_breaker(),
        })
    }

    async fn fetch(&self, name: &str) -> Result<PartialFacts, RegistryError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/companies", self.base_url),
            &[("name", name)],
        )
        .map_err(|e| RegistryError::Malformed(format!("Failed to build URL: {}", e)))?;

        tracing::debug!("Filings registry: searching '{}'", name);

        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(error_for_status(status, &error_text));
        }

        let body: FilingsSearchResponse = response.json().await.map_err(|e| {
            RegistryError::Malformed(format!("Failed to parse filings response: {}", e))
        })?;

        let company = body
            .companies
            .into_iter()
            .next()
            .ok_or(RegistryError::NotFound)?;

        let incorporation_date = company
            .incorporation_date
            .as_deref()
            .map(|raw| {
                NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|e| {
                    RegistryError::Malformed(format!("Bad incorporation_date '{}': {}", raw, e))
                })
            })
            .transpose()?;

        tracing::debug!(
            "Filings registry: matched {:?} ({} tickers)",
            company.name,
            company.tickers.len()
        );

        Ok(PartialFacts {
            is_public_company: Some(!company.tickers.is_empty()),
            years_since_incorporation: None,
            incorporation_date,
            state_of_incorporation: clean_code(company.state_of_incorporation.as_deref()),
        })
    }
}

#[async_trait]
impl RegistryClient for FilingsRegistryClient {
    fn kind(&self) -> RegistryKind {
        RegistryKind::Filings
    }

    async fn lookup(&self, name: &str) -> Result<PartialFacts, RegistryError> {
        guarded(&self.breaker, RegistryKind::Filings.label(), self.fetch(name)).await
    }
}
