use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::{clean_code, error_for_status, RegistryClient, RegistryKind};
use crate::circuit_breaker::{create_registry_circuit_breaker, guarded, RegistryCircuitBreaker};
use crate::errors::{AppError, RegistryError};
use crate::models::PartialFacts;

#[derive(Debug, Deserialize)]
struct FormationSearchResponse {
    #[serde(default)]
    companies: Vec<FormationCompany>,
}

#[derive(Debug, Deserialize)]
struct FormationCompany {
    /// e.g. `us_de`, `us_ny`, `gb`.
    jurisdiction_code: Option<String>,
    incorporation_date: Option<String>,
    /// Free text such as "Public Limited Company" or "Domestic LLC".
    company_type: Option<String>,
}

/// Client for the corporate-formation registry.
///
/// `GET {base_url}/companies/search?q={name}[&api_token=..]` returns
/// `{"companies": [{"name", "jurisdiction_code", "incorporation_date", "company_type"}]}`.
#[derive(Clone)]
pub struct FormationRegistryClient {
    client: Client,
    base_url: String,
    api_token: Option<String>,
    breaker: RegistryCircuitBreaker,
}

impl FormationRegistryClient {
    pub fn new(
        base_url: String,
        api_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            AppError::InvalidConfig(format!("Failed to create formation registry client: {}", e))
        })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
            breaker: create_registry_circuit_breaker(),
        })
    }

    async fn fetch(&self, name: &str) -> Result<PartialFacts, RegistryError> {
        let mut params = vec![("q", name)];
        if let Some(token) = self.api_token.as_deref() {
            params.push(("api_token", token));
        }
        let url = reqwest::Url::parse_with_params(
            &format!("{}/companies/search", self.base_url),
            &params,
        )
        .map_err(|e| RegistryError::Malformed(format!("Failed to build URL: {}", e)))?;

        // Token stays out of the logs
        tracing::debug!("Formation registry: searching '{}'", name);

        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(error_for_status(status, &error_text));
        }

        let body: FormationSearchResponse = response.json().await.map_err(|e| {
            RegistryError::Malformed(format!("Failed to parse formation response: {}", e))
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

        Ok(PartialFacts {
            is_public_company: public_status_from_type(company.company_type.as_deref()),
            years_since_incorporation: None,
            incorporation_date,
            state_of_incorporation: state_from_jurisdiction(company.jurisdiction_code.as_deref()),
        })
    }
}

/// `us_de` -> `DE`; non-US jurisdictions are kept whole (`gb` -> `GB`).
pub(crate) fn state_from_jurisdiction(code: Option<&str>) -> Option<String> {
    let code = code?.trim();
    let state = code
        .strip_prefix("us_")
        .or_else(|| code.strip_prefix("US_"))
        .unwrap_or(code);
    clean_code(Some(state))
}

/// The company type only speaks to listing status when it says so outright.
pub(crate) fn public_status_from_type(company_type: Option<&str>) -> Option<bool> {
    let lowered = company_type?.to_lowercase();
    if lowered.contains("public") {
        Some(true)
    } else if lowered.contains("private") {
        Some(false)
    } else {
        None
    }
}

#[async_trait]
impl RegistryClient for FormationRegistryClient {
    fn kind(&self) -> RegistryKind {
        RegistryKind::Formation
    }

    async fn lookup(&self, name: &str) -> Result<PartialFacts, RegistryError> {
        guarded(&self.breaker, RegistryKind::Formation.label(), self.fetch(name)).await
    }
}
