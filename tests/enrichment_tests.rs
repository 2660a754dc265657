/// Orchestrator scenarios against in-memory registries
/// Covers tiering, fallbacks, deduplication, caching, ordering and deadlines
use lease_credit_enrichment::discount::DiscountPolicy;
use lease_credit_enrichment::enrichment::{EnrichmentOrchestrator, EnrichmentSettings};
use lease_credit_enrichment::errors::{AppError, RegistryError};
use lease_credit_enrichment::models::{PartialFacts, ResolutionStatus, RiskTier};
use lease_credit_enrichment::registry::{RegistryKind, StaticRegistry};
use lease_credit_enrichment::report::ReportColumns;
use lease_credit_enrichment::retry::RetryPolicy;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

fn settings() -> EnrichmentSettings {
    EnrichmentSettings {
        retry: RetryPolicy::immediate(3),
        ..Default::default()
    }
}

fn names(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| s.to_string()).collect()
}

fn public_filer(state: &str) -> PartialFacts {
    PartialFacts {
        is_public_company: Some(true),
        state_of_incorporation: Some(state.to_string()),
        ..Default::default()
    }
}

fn formed_years_ago(years: u32) -> PartialFacts {
    PartialFacts {
        years_since_incorporation: Some(years),
        ..Default::default()
    }
}

/// Registries for the three reference lessees:
/// - Acme Corp: public filer, 15 years old
/// - Beta LLC: unknown to both registries
/// - Gamma Inc: filings registry down, 7 years old
fn reference_registries() -> (Arc<StaticRegistry>, Arc<StaticRegistry>) {
    let filings = StaticRegistry::new(RegistryKind::Filings)
        .with_facts("Acme Corp", public_filer("DE"))
        .with_error("Gamma Inc", RegistryError::Unavailable("HTTP 503".into()));
    let formation = StaticRegistry::new(RegistryKind::Formation)
        .with_facts("Acme Corp", formed_years_ago(15))
        .with_facts("Gamma Inc", formed_years_ago(7));
    (Arc::new(filings), Arc::new(formation))
}

fn orchestrator(
    filings: &Arc<StaticRegistry>,
    formation: &Arc<StaticRegistry>,
    settings: EnrichmentSettings,
) -> EnrichmentOrchestrator {
    EnrichmentOrchestrator::new(filings.clone(), formation.clone(), settings).unwrap()
}

#[cfg(test)]
mod scenario_tests {
    use super::*;

    #[tokio::test]
    async fn test_public_established_lessee_is_low() {
        let (filings, formation) = reference_registries();
        let records = orchestrator(&filings, &formation, settings())
            .enrich(&names(&["Acme Corp"]), &DiscountPolicy::default())
            .await
            .unwrap();

        let acme = &records[0];
        assert_eq!(acme.facts.is_public_company, Some(true));
        assert_eq!(acme.facts.years_since_incorporation, Some(15));
        assert_eq!(acme.facts.state_of_incorporation.as_deref(), Some("DE"));
        assert_eq!(acme.tier, RiskTier::Low);
        assert_eq!(acme.discount_rate, 0.08);
        assert_eq!(acme.resolution_status, ResolutionStatus::Resolved);
        assert!(acme.warnings.is_empty());
        assert_eq!(ReportColumns::from(acme).discount_rate, "8.00%");
    }

    #[tokio::test]
    async fn test_unknown_lessee_fails_to_high_with_one_warning() {
        let (filings, formation) = reference_registries();
        let records = orchestrator(&filings, &formation, settings())
            .enrich(&names(&["Beta LLC"]), &DiscountPolicy::default())
            .await
            .unwrap();

        let beta = &records[0];
        assert!(beta.facts.is_all_unknown());
        assert_eq!(beta.resolution_status, ResolutionStatus::Failed);
        assert_eq!(beta.tier, RiskTier::High);
        assert_eq!(beta.discount_rate, 0.12);
        assert_eq!(beta.warnings.len(), 1);
        assert_eq!(ReportColumns::from(beta).discount_rate, "12.00%");
        // NotFound is terminal: one lookup per registry, no retries
        assert_eq!(filings.calls("Beta LLC"), 1);
        assert_eq!(formation.calls("Beta LLC"), 1);
    }

    #[tokio::test]
    async fn test_unavailable_registry_degrades_to_partial() {
        let (filings, formation) = reference_registries();
        let records = orchestrator(&filings, &formation, settings())
            .enrich(&names(&["Gamma Inc"]), &DiscountPolicy::default())
            .await
            .unwrap();

        let gamma = &records[0];
        assert_eq!(gamma.resolution_status, ResolutionStatus::PartiallyResolved);
        assert_eq!(gamma.facts.years_since_incorporation, Some(7));
        assert_eq!(gamma.facts.is_public_company, None);
        assert_eq!(gamma.tier, RiskTier::Medium);
        assert_eq!(ReportColumns::from(gamma).discount_rate, "10.00%");
        assert_eq!(gamma.warnings.len(), 1);
        assert!(gamma.warnings[0].contains("filings registry: unavailable"));
        // Transient failure retried up to the attempt limit
        assert_eq!(filings.calls("Gamma Inc"), 3);
    }

    #[tokio::test]
    async fn test_transient_failure_recovers_within_retries() {
        let filings = Arc::new(
            StaticRegistry::new(RegistryKind::Filings)
                .with_facts("Acme Corp", public_filer("DE"))
                .with_failures("Acme Corp", 2, RegistryError::RateLimited("429".into())),
        );
        let formation = Arc::new(
            StaticRegistry::new(RegistryKind::Formation)
                .with_facts("Acme Corp", formed_years_ago(15)),
        );

        let records = orchestrator(&filings, &formation, settings())
            .enrich(&names(&["Acme Corp"]), &DiscountPolicy::default())
            .await
            .unwrap();

        assert_eq!(records[0].resolution_status, ResolutionStatus::Resolved);
        assert_eq!(records[0].tier, RiskTier::Low);
        assert_eq!(filings.calls("Acme Corp"), 3);
    }
}

#[cfg(test)]
mod batch_tests {
    use super::*;

    #[tokio::test]
    async fn test_order_preserved_and_duplicates_resolved_once() {
        let (filings, formation) = reference_registries();
        let records = orchestrator(&filings, &formation, settings())
            .enrich(
                &names(&["Acme Corp", "Beta LLC", "Acme Corp"]),
                &DiscountPolicy::default(),
            )
            .await
            .unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].lessee_name, "Acme Corp");
        assert_eq!(records[1].lessee_name, "Beta LLC");
        assert_eq!(records[2].lessee_name, "Acme Corp");
        assert_eq!(records[0].tier, records[2].tier);
        assert_eq!(records[0].discount_rate, records[2].discount_rate);
        assert_eq!(filings.calls("Acme Corp"), 1);
        assert_eq!(formation.calls("Acme Corp"), 1);
    }

    #[tokio::test]
    async fn test_spelling_variants_share_one_resolution() {
        let (filings, formation) = reference_registries();
        let records = orchestrator(&filings, &formation, settings())
            .enrich(
                &names(&["Acme Corp", "ACME Corporation", "acme, corp."]),
                &DiscountPolicy::default(),
            )
            .await
            .unwrap();

        assert!(records.iter().all(|r| r.tier == RiskTier::Low));
        assert!(records.iter().all(|r| r.lessee.as_str() == "acme"));
        assert_eq!(records[1].lessee_name, "ACME Corporation");
        assert_eq!(filings.total_calls(), 1);
        assert_eq!(formation.total_calls(), 1);
    }

    #[tokio::test]
    async fn test_second_batch_served_from_cache() {
        let (filings, formation) = reference_registries();
        let orchestrator = orchestrator(&filings, &formation, settings());
        let batch = names(&["Acme Corp", "ACME Corporation"]);

        let first = orchestrator
            .enrich(&batch, &DiscountPolicy::default())
            .await
            .unwrap();
        let calls_after_first = (filings.total_calls(), formation.total_calls());

        let second = orchestrator
            .enrich(&batch, &DiscountPolicy::default())
            .await
            .unwrap();

        assert_eq!((filings.total_calls(), formation.total_calls()), calls_after_first);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_failed_lessees_are_retried_next_batch() {
        let (filings, formation) = reference_registries();
        let orchestrator = orchestrator(&filings, &formation, settings());

        for _ in 0..2 {
            orchestrator
                .enrich(&names(&["Beta LLC"]), &DiscountPolicy::default())
                .await
                .unwrap();
        }

        assert_eq!(filings.calls("Beta LLC"), 2);
    }

    #[tokio::test]
    async fn test_outages_are_not_remembered_across_batches() {
        let outage = RegistryError::Unavailable("HTTP 503".into());
        let filings = Arc::new(
            StaticRegistry::new(RegistryKind::Filings)
                .with_facts("Acme Corp", public_filer("DE"))
                .with_failures("Acme Corp", 3, outage.clone()),
        );
        let formation = Arc::new(
            StaticRegistry::new(RegistryKind::Formation)
                .with_facts("Acme Corp", formed_years_ago(15))
                .with_failures("Acme Corp", 3, outage),
        );
        let orchestrator = orchestrator(&filings, &formation, settings());

        let first = orchestrator
            .enrich(&names(&["Acme Corp"]), &DiscountPolicy::default())
            .await
            .unwrap();
        assert!(first[0].facts.is_all_unknown());
        assert_eq!(first[0].tier, RiskTier::High);
        assert_eq!(filings.calls("Acme Corp"), 3);

        // Registries are back; the next batch asks them again
        let second = orchestrator
            .enrich(&names(&["Acme Corp"]), &DiscountPolicy::default())
            .await
            .unwrap();
        assert_eq!(filings.calls("Acme Corp"), 4);
        assert_eq!(formation.calls("Acme Corp"), 4);
        assert_eq!(second[0].resolution_status, ResolutionStatus::Resolved);
        assert_eq!(second[0].tier, RiskTier::Low);
        assert!(second[0].warnings.is_empty());
    }

    #[tokio::test]
    async fn test_partial_outage_is_retried_next_batch() {
        let (filings, formation) = reference_registries();
        let orchestrator = orchestrator(&filings, &formation, settings());

        for _ in 0..2 {
            let records = orchestrator
                .enrich(&names(&["Gamma Inc"]), &DiscountPolicy::default())
                .await
                .unwrap();
            assert_eq!(records[0].tier, RiskTier::Medium);
        }

        assert_eq!(formation.calls("Gamma Inc"), 2);
    }

    #[tokio::test]
    async fn test_policy_applied_consistently() {
        let (filings, formation) = reference_registries();
        let policy = DiscountPolicy::from_rates(0.07, 0.095, 0.15);
        let records = orchestrator(&filings, &formation, settings())
            .enrich(&names(&["Acme Corp", "Beta LLC", "Gamma Inc"]), &policy)
            .await
            .unwrap();

        let rates: Vec<f64> = records.iter().map(|r| r.discount_rate).collect();
        assert_eq!(rates, vec![0.07, 0.15, 0.095]);
    }

    #[tokio::test]
    async fn test_incomplete_policy_fails_batch_before_lookups() {
        let (filings, formation) = reference_registries();
        let policy = DiscountPolicy::from_table(BTreeMap::from([
            (RiskTier::Low, 0.08),
            (RiskTier::Medium, 0.10),
        ]));

        let result = orchestrator(&filings, &formation, settings())
            .enrich(&names(&["Acme Corp"]), &policy)
            .await;

        assert_eq!(result, Err(AppError::PolicyIncomplete(RiskTier::High)));
        assert_eq!(filings.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_batch_is_empty() {
        let (filings, formation) = reference_registries();
        let records = orchestrator(&filings, &formation, settings())
            .enrich(&[], &DiscountPolicy::default())
            .await
            .unwrap();
        assert!(records.is_empty());
    }
}

#[cfg(test)]
mod concurrency_tests {
    use super::*;

    #[tokio::test]
    async fn test_deadline_degrades_instead_of_failing() {
        let filings = Arc::new(
            StaticRegistry::new(RegistryKind::Filings)
                .with_facts("Acme Corp", public_filer("DE"))
                .with_delay(Duration::from_secs(10)),
        );
        let formation = Arc::new(
            StaticRegistry::new(RegistryKind::Formation)
                .with_facts("Acme Corp", formed_years_ago(15))
                .with_delay(Duration::from_secs(10)),
        );
        let settings = EnrichmentSettings {
            batch_timeout: Duration::from_millis(100),
            ..settings()
        };

        let started = std::time::Instant::now();
        let records = orchestrator(&filings, &formation, settings)
            .enrich(&names(&["Acme Corp", "Beta LLC"]), &DiscountPolicy::default())
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(records.len(), 2);
        for record in &records {
            assert!(record.facts.is_all_unknown());
            assert_eq!(record.resolution_status, ResolutionStatus::PartiallyResolved);
            assert_eq!(record.tier, RiskTier::High);
            assert!(record.warnings[0].contains("cancelled at batch deadline"));
        }
    }

    #[tokio::test]
    async fn test_bounded_concurrency_queues_instead_of_failing() {
        let mut filings = StaticRegistry::new(RegistryKind::Filings);
        let mut formation = StaticRegistry::new(RegistryKind::Formation);
        let mut batch = Vec::new();
        for i in 0..12 {
            let name = format!("Lessee {} LLC", i);
            filings = filings.with_facts(&name, public_filer("DE"));
            formation = formation.with_facts(&name, formed_years_ago(20));
            batch.push(name);
        }
        let filings = Arc::new(filings.with_delay(Duration::from_millis(20)));
        let formation = Arc::new(formation.with_delay(Duration::from_millis(20)));
        let settings = EnrichmentSettings {
            max_in_flight: 2,
            ..settings()
        };

        let records = orchestrator(&filings, &formation, settings)
            .enrich(&batch, &DiscountPolicy::default())
            .await
            .unwrap();

        assert_eq!(records.len(), 12);
        for (record, name) in records.iter().zip(batch.iter()) {
            assert_eq!(&record.lessee_name, name);
            assert_eq!(record.tier, RiskTier::Low);
        }
        assert_eq!(filings.total_calls(), 12);
    }
}
