//! Registry clients.
//!
//! A `RegistryClient` turns a lessee name into whatever partial facts one
//! external registry holds. Two HTTP adapters ship here, one per registry,
//! plus an in-memory `StaticRegistry` for tests and offline runs.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::RegistryError;
use crate::models::PartialFacts;

pub mod filings;
pub mod formation;
pub mod static_registry;

pub use filings::FilingsRegistryClient;
pub use formation::FormationRegistryClient;
pub use static_registry::StaticRegistry;

/// Which registry a client talks to. Decides merge authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryKind {
    /// Public-market filings registry.
    Filings,
    /// Corporate-formation registry.
    Formation,
}

impl RegistryKind {
    pub fn label(&self) -> &'static str {
        match self {
            RegistryKind::Filings => "filings registry",
            RegistryKind::Formation => "formation registry",
        }
    }
}

impl fmt::Display for RegistryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One external registry, queried by lessee name.
///
/// Implementations are stateless per call and safe to invoke concurrently
/// for different names. Each `lookup` is exactly one logical external call;
/// retrying is the caller's job.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    fn kind(&self) -> RegistryKind;

    async fn lookup(&self, name: &str) -> Result<PartialFacts, RegistryError>;
}

/// Map a non-success HTTP status onto the registry error taxonomy.
pub(crate) fn error_for_status(status: StatusCode, body: &str) -> RegistryError {
    let detail = format!("HTTP {}: {}", status.as_u16(), truncate(body, 200));
    match status {
        StatusCode::NOT_FOUND => RegistryError::NotFound,
        StatusCode::TOO_MANY_REQUESTS => RegistryError::RateLimited(detail),
        s if s.is_server_error() => RegistryError::Unavailable(detail),
        StatusCode::REQUEST_TIMEOUT => RegistryError::Unavailable(detail),
        _ => RegistryError::Malformed(detail),
    }
}

/// Uppercased, trimmed value, or `None` when blank.
pub(crate) fn clean_code(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_uppercase)
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
