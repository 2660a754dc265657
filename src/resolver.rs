//! Fact resolution: query both registries, merge, cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::Instant;

use crate::cache::FactCache;
use crate::errors::{AppError, RegistryError};
use crate::models::{CreditFacts, LesseeIdentity, PartialFacts, ResolutionStatus};
use crate::registry::{RegistryClient, RegistryKind};
use crate::retry::{with_retry, RetryPolicy};

/// Outcome of one registry for one lessee, after retries.
pub type RegistryOutcome = Result<PartialFacts, RegistryError>;

/// Merged facts for one lessee, as cached and as handed to classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub facts: CreditFacts,
    pub status: ResolutionStatus,
    /// One entry per registry that could not answer, e.g. `"filings registry: not found"`.
    pub failures: Vec<String>,
    /// Some registry failed transiently (outage, rate limit, batch deadline),
    /// so asking again later may learn more.
    #[serde(default)]
    pub retryable: bool,
    pub resolved_at: DateTime<Utc>,
}

impl Resolution {
    /// Nothing known. Used when resolution could not even be attempted.
    pub fn unknown(failures: Vec<String>, resolved_at: DateTime<Utc>) -> Self {
        Self {
            facts: CreditFacts::unknown(),
            status: ResolutionStatus::PartiallyResolved,
            failures,
            retryable: true,
            resolved_at,
        }
    }

    /// Whether this resolution may be reused by later batches.
    ///
    /// `Failed`, empty and transiently degraded resolutions are not: the next
    /// batch asks the registries again.
    pub fn is_cacheable(&self) -> bool {
        self.status != ResolutionStatus::Failed && !self.retryable && !self.facts.is_all_unknown()
    }
}

/// Merge both registries' outcomes into one resolution.
///
/// Authority per field:
/// - `is_public_company`, `state_of_incorporation`: filings registry first,
///   formation registry as fallback.
/// - `years_since_incorporation`: formation registry first, then derived
///   from the filings registry's incorporation date.
pub fn merge_outcomes(
    filings: &RegistryOutcome,
    formation: &RegistryOutcome,
    resolved_at: DateTime<Utc>,
) -> Resolution {
    let today = resolved_at.date_naive();
    let from_filings = filings.as_ref().ok();
    let from_formation = formation.as_ref().ok();

    let filings_public = from_filings.and_then(|p| p.is_public_company);
    let formation_public = from_formation.and_then(|p| p.is_public_company);
    if let (Some(a), Some(b)) = (filings_public, formation_public) {
        if a != b {
            tracing::debug!("Registries disagree on public status; filings registry wins");
        }
    }

    let filings_state = from_filings.and_then(|p| p.state_of_incorporation.clone());
    let formation_state = from_formation.and_then(|p| p.state_of_incorporation.clone());
    if let (Some(a), Some(b)) = (&filings_state, &formation_state) {
        if a != b {
            tracing::debug!(
                "Registries disagree on state ({} vs {}); filings registry wins",
                a,
                b
            );
        }
    }

    let facts = CreditFacts {
        is_public_company: filings_public.or(formation_public),
        years_since_incorporation: from_formation
            .and_then(|p| p.years_as_of(today))
            .or_else(|| from_filings.and_then(|p| p.years_as_of(today))),
        state_of_incorporation: filings_state.or(formation_state),
    };

    let mut failures = Vec::new();
    for (kind, outcome) in [
        (RegistryKind::Filings, filings),
        (RegistryKind::Formation, formation),
    ] {
        if let Err(e) = outcome {
            failures.push(format!("{}: {}", kind.label(), e));
        }
    }

    let retryable = [filings, formation]
        .iter()
        .any(|outcome| matches!(outcome, Err(e) if e.is_transient()));

    let terminal = |outcome: &RegistryOutcome| matches!(outcome, Err(e) if !e.is_transient());
    let status = if facts.is_all_unknown() && terminal(filings) && terminal(formation) {
        ResolutionStatus::Failed
    } else if failures.is_empty() && facts.unknown_fields().is_empty() {
        ResolutionStatus::Resolved
    } else {
        ResolutionStatus::PartiallyResolved
    };

    Resolution {
        facts,
        status,
        failures,
        retryable,
        resolved_at,
    }
}

/// Resolves lessee identities into merged credit facts.
pub struct FactResolver {
    filings: Arc<dyn RegistryClient>,
    formation: Arc<dyn RegistryClient>,
    cache: FactCache,
    retry: RetryPolicy,
}

impl FactResolver {
    /// Wire a resolver. Each client must report the registry kind of its slot.
    pub fn new(
        filings: Arc<dyn RegistryClient>,
        formation: Arc<dyn RegistryClient>,
        cache: FactCache,
        retry: RetryPolicy,
    ) -> Result<Self, AppError> {
        if filings.kind() != RegistryKind::Filings || formation.kind() != RegistryKind::Formation {
            return Err(AppError::InvalidConfig(format!(
                "registry clients wired in the wrong slots (filings slot: {}, formation slot: {})",
                filings.kind(),
                formation.kind()
            )));
        }
        Ok(Self {
            filings,
            formation,
            cache,
            retry,
        })
    }

    /// Resolve one identity.
    ///
    /// A fresh cache entry is returned as-is without touching the registries,
    /// keeping the status it was stored with. A cached partial resolution
    /// stays `PartiallyResolved` on later hits rather than reading as
    /// `Resolved`, since its unknown fields are still unknown.
    /// Otherwise both registries are queried concurrently; lookups still
    /// running at `deadline` are cancelled and count as `Unavailable`.
    /// Never fails: the worst case is a resolution with every fact unknown.
    pub async fn resolve(&self, lessee: &LesseeIdentity, deadline: Option<Instant>) -> Resolution {
        if let Some(hit) = self.cache.get(lessee).await {
            tracing::debug!("Cache hit for '{}' ({})", lessee, hit.status);
            return hit;
        }

        self.cache
            .get_or_resolve(lessee, self.resolve_uncached(lessee, deadline))
            .await
    }

    async fn resolve_uncached(&self, lessee: &LesseeIdentity, deadline: Option<Instant>) -> Resolution {
        let name = lessee.as_str();
        let (filings, formation) = tokio::join!(
            self.lookup(self.filings.as_ref(), name, deadline),
            self.lookup(self.formation.as_ref(), name, deadline),
        );

        let resolution = merge_outcomes(&filings, &formation, Utc::now());
        match resolution.status {
            ResolutionStatus::Resolved => {
                tracing::info!("Resolved credit facts for '{}'", lessee)
            }
            status => tracing::warn!(
                "Credit facts for '{}' {}: {}",
                lessee,
                status,
                resolution.failures.join("; ")
            ),
        }
        resolution
    }

    async fn lookup(
        &self,
        client: &dyn RegistryClient,
        name: &str,
        deadline: Option<Instant>,
    ) -> RegistryOutcome {
        let label = client.kind().label();
        let attempts = with_retry(&self.retry, label, || client.lookup(name));

        let Some(deadline) = deadline else {
            return attempts.await;
        };
        match tokio::time::timeout_at(deadline, attempts).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::warn!("{}: lookup for '{}' cancelled at batch deadline", label, name);
                Err(RegistryError::Unavailable(
                    "cancelled at batch deadline".to_string(),
                ))
            }
        }
    }
}
