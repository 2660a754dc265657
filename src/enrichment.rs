/// Batch enrichment of lessees with credit-risk tiers and discount rates.
///
/// This is the public entry point of the engine:
/// 1. Normalize every lessee name and deduplicate identities
/// 2. Resolve each distinct identity concurrently (bounded, with a batch deadline)
/// 3. Classify the merged facts into a risk tier
/// 4. Map the tier to a discount rate under one policy snapshot
/// 5. Emit one record per input name, in input order
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::cache::{FactCache, DEFAULT_CAPACITY, DEFAULT_TTL};
use crate::classifier::classify;
use crate::discount::{rate_for, DiscountPolicy};
use crate::errors::AppError;
use crate::models::{EnrichmentRecord, LesseeIdentity, ResolutionStatus, RiskTier};
use crate::normalize::normalize_lessee_name;
use crate::registry::RegistryClient;
use crate::report::format_rate_percent;
use crate::resolver::{FactResolver, Resolution};
use crate::retry::RetryPolicy;

/// Default number of lessees resolved at the same time.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 8;

/// Default wall-clock budget for one batch.
pub const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Tunables for the orchestrator and everything beneath it.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentSettings {
    /// Maximum lessee resolutions in flight; extra ones queue.
    pub max_in_flight: usize,
    /// Lookups still running this long after the batch starts are cancelled.
    pub batch_timeout: Duration,
    pub cache_ttl: Duration,
    pub cache_capacity: u64,
    pub retry: RetryPolicy,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            batch_timeout: DEFAULT_BATCH_TIMEOUT,
            cache_ttl: DEFAULT_TTL,
            cache_capacity: DEFAULT_CAPACITY,
            retry: RetryPolicy::default(),
        }
    }
}

impl EnrichmentSettings {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.max_in_flight == 0 {
            return Err(AppError::InvalidConfig(
                "max_in_flight must be at least 1".to_string(),
            ));
        }
        if self.batch_timeout.is_zero() {
            return Err(AppError::InvalidConfig(
                "batch_timeout must be positive".to_string(),
            ));
        }
        if self.cache_ttl.is_zero() {
            return Err(AppError::InvalidConfig(
                "cache_ttl must be positive".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(AppError::InvalidConfig(
                "retry max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// One batch's output, tagged with the run id used in logs.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichmentBatch {
    pub run_id: Uuid,
    pub records: Vec<EnrichmentRecord>,
}

/// Drives resolution, classification and discount mapping for batches of lessees.
///
/// Owns the fact cache, so one orchestrator is one cache lifetime: a CLI run
/// builds one per invocation, the HTTP service one per process.
pub struct EnrichmentOrchestrator {
    resolver: Arc<FactResolver>,
    max_in_flight: usize,
    batch_timeout: Duration,
}

impl EnrichmentOrchestrator {
    pub fn new(
        filings: Arc<dyn RegistryClient>,
        formation: Arc<dyn RegistryClient>,
        settings: EnrichmentSettings,
    ) -> Result<Self, AppError> {
        settings.validate()?;
        let cache = FactCache::new(settings.cache_ttl, settings.cache_capacity);
        let resolver = FactResolver::new(filings, formation, cache, settings.retry)?;
        Ok(Self {
            resolver: Arc::new(resolver),
            max_in_flight: settings.max_in_flight,
            batch_timeout: settings.batch_timeout,
        })
    }

    /// Enrich `lessee_names`, returning one record per name in input order.
    pub async fn enrich(
        &self,
        lessee_names: &[String],
        policy: &DiscountPolicy,
    ) -> Result<Vec<EnrichmentRecord>, AppError> {
        Ok(self.enrich_batch(lessee_names, policy).await?.records)
    }

    /// Like [`enrich`](Self::enrich), also returning the batch's run id.
    ///
    /// Only an unusable policy fails the call. Lookup failures degrade the
    /// affected records to the High tier with a warning instead.
    pub async fn enrich_batch(
        &self,
        lessee_names: &[String],
        policy: &DiscountPolicy,
    ) -> Result<EnrichmentBatch, AppError> {
        policy.validate()?;

        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("enrich_batch", %run_id, lessees = lessee_names.len());

        let records = self
            .run(lessee_names, policy)
            .instrument(span)
            .await?;

        Ok(EnrichmentBatch { run_id, records })
    }

    async fn run(
        &self,
        lessee_names: &[String],
        policy: &DiscountPolicy,
    ) -> Result<Vec<EnrichmentRecord>, AppError> {
        let identities: Vec<Option<LesseeIdentity>> = lessee_names
            .iter()
            .map(|name| normalize_lessee_name(name))
            .collect();

        // First-seen order, one entry per identity
        let mut seen: HashSet<&LesseeIdentity> = HashSet::new();
        let distinct: Vec<LesseeIdentity> = identities
            .iter()
            .flatten()
            .filter(|identity| seen.insert(*identity))
            .cloned()
            .collect();
        tracing::info!(
            "Enriching {} lessee names ({} distinct identities)",
            lessee_names.len(),
            distinct.len()
        );

        let resolutions = self.resolve_all(distinct).await;

        let mut records = Vec::with_capacity(lessee_names.len());
        let mut assessed: HashMap<&LesseeIdentity, Assessment> = HashMap::new();
        for (name, identity) in lessee_names.iter().zip(identities.iter()) {
            let assessment = match identity {
                Some(identity) => match assessed.get(identity) {
                    Some(done) => done.clone(),
                    None => {
                        let resolution = resolutions.get(identity).cloned().unwrap_or_else(|| {
                            Resolution::unknown(
                                vec!["resolution task aborted".to_string()],
                                chrono::Utc::now(),
                            )
                        });
                        let done = assess(identity.clone(), resolution, policy)?;
                        assessed.insert(identity, done.clone());
                        done
                    }
                },
                None => {
                    tracing::warn!("Blank lessee name at input position {}", records.len());
                    blank_name_assessment(policy)?
                }
            };
            records.push(assessment.into_record(name));
        }

        let degraded = records
            .iter()
            .filter(|r| r.resolution_status != ResolutionStatus::Resolved)
            .count();
        tracing::info!(
            "Batch complete: {} records, {} degraded",
            records.len(),
            degraded
        );

        Ok(records)
    }

    async fn resolve_all(
        &self,
        distinct: Vec<LesseeIdentity>,
    ) -> HashMap<LesseeIdentity, Resolution> {
        let deadline = Instant::now() + self.batch_timeout;
        let permits = Arc::new(Semaphore::new(self.max_in_flight));
        let mut tasks = JoinSet::new();

        for identity in distinct {
            let resolver = self.resolver.clone();
            let permits = permits.clone();
            tasks.spawn(
                async move {
                    // Queue rather than fail when the bound is reached
                    let _permit = permits.acquire_owned().await;
                    let resolution = resolver.resolve(&identity, Some(deadline)).await;
                    (identity, resolution)
                }
                .in_current_span(),
            );
        }

        let mut resolutions = HashMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((identity, resolution)) => {
                    resolutions.insert(identity, resolution);
                }
                Err(e) => tracing::error!("Resolution task failed: {}", e),
            }
        }
        resolutions
    }
}

/// Tier, rate and warnings for one identity, shared by every input name
/// that normalizes to it.
#[derive(Debug, Clone)]
struct Assessment {
    lessee: LesseeIdentity,
    resolution: Resolution,
    tier: RiskTier,
    discount_rate: f64,
    warnings: Vec<String>,
}

impl Assessment {
    fn into_record(self, lessee_name: &str) -> EnrichmentRecord {
        EnrichmentRecord {
            lessee_name: lessee_name.to_string(),
            lessee: self.lessee,
            facts: self.resolution.facts,
            tier: self.tier,
            discount_rate: self.discount_rate,
            resolution_status: self.resolution.status,
            warnings: self.warnings,
        }
    }
}

fn assess(
    lessee: LesseeIdentity,
    resolution: Resolution,
    policy: &DiscountPolicy,
) -> Result<Assessment, AppError> {
    let tier = classify(&resolution.facts);
    let discount_rate = rate_for(tier, policy)?;
    let warnings = degradation_warning(&resolution, tier, discount_rate)
        .into_iter()
        .collect();
    Ok(Assessment {
        lessee,
        resolution,
        tier,
        discount_rate,
        warnings,
    })
}

fn blank_name_assessment(policy: &DiscountPolicy) -> Result<Assessment, AppError> {
    let tier = RiskTier::High;
    let discount_rate = rate_for(tier, policy)?;
    Ok(Assessment {
        lessee: LesseeIdentity::default(),
        resolution: Resolution {
            status: ResolutionStatus::Failed,
            ..Resolution::unknown(vec![], chrono::Utc::now())
        },
        tier,
        discount_rate,
        warnings: vec![format!(
            "blank lessee name, no lookup performed; applied {} risk fallback rate {}",
            tier,
            format_rate_percent(discount_rate)
        )],
    })
}

/// The single warning explaining why a record is not fully resolved.
fn degradation_warning(resolution: &Resolution, tier: RiskTier, rate: f64) -> Option<String> {
    let causes = if resolution.failures.is_empty() {
        "registries returned no value".to_string()
    } else {
        resolution.failures.join("; ")
    };

    match resolution.status {
        ResolutionStatus::Resolved => None,
        ResolutionStatus::Failed => Some(format!(
            "credit facts unresolved ({}); applied {} risk fallback rate {}",
            causes,
            tier,
            format_rate_percent(rate)
        )),
        ResolutionStatus::PartiallyResolved => {
            let unknown = resolution.facts.unknown_fields();
            if unknown.is_empty() {
                Some(format!("credit facts partially resolved ({})", causes))
            } else {
                Some(format!(
                    "credit facts partially resolved, unknown {} ({})",
                    unknown.join(", "),
                    causes
                ))
            }
        }
    }
}
