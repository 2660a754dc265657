//! Batch CLI: enrich lease records (or bare lessee names) with credit risk.
//!
//! Lease files hold one lease object or an array of them, as produced by the
//! extraction stage. The lessee is read from `lessee`, then `developer`; a
//! lease's `name` is its document title and is never looked up. Leases with
//! neither field get the High fallback without a registry call. Output is the
//! same lease objects with the credit columns added, printed as JSON on
//! stdout; logs go to stderr.

use clap::Parser;
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::sync::Arc;

use lease_credit_enrichment::config::Config;
use lease_credit_enrichment::discount::DiscountPolicy;
use lease_credit_enrichment::enrichment::EnrichmentOrchestrator;
use lease_credit_enrichment::models::{EnrichmentRecord, RiskTier};
use lease_credit_enrichment::registry::{FilingsRegistryClient, FormationRegistryClient};
use lease_credit_enrichment::report::format_rate_percent;

/// Lessee name fields, in order of preference.
const LESSEE_FIELDS: [&str; 2] = ["lessee", "developer"];

#[derive(Parser, Debug)]
#[command(
    name = "enrich-leases",
    about = "Attach lessee risk tiers and discount rates to lease records"
)]
struct Cli {
    /// Lessee names to enrich directly.
    names: Vec<String>,

    /// Lease JSON file (object or array of objects). Repeatable.
    #[arg(long = "lease-file")]
    lease_files: Vec<PathBuf>,

    /// Override the Low tier rate (fraction, e.g. 0.08).
    #[arg(long)]
    low_rate: Option<f64>,

    /// Override the Medium tier rate.
    #[arg(long)]
    medium_rate: Option<f64>,

    /// Override the High tier rate.
    #[arg(long)]
    high_rate: Option<f64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lease_credit_enrichment=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let mut leases: Vec<Map<String, Value>> = cli
        .names
        .iter()
        .map(|name| {
            let mut lease = Map::new();
            lease.insert("lessee".to_string(), json!(name));
            lease
        })
        .collect();
    for path in &cli.lease_files {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
        let value: Value = serde_json::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?;
        leases.extend(lease_objects(value));
    }
    if leases.is_empty() {
        anyhow::bail!("Nothing to enrich: pass lessee names or --lease-file");
    }

    let base = &config.discount_policy;
    let rate = |flag: Option<f64>, tier: RiskTier| match flag {
        Some(rate) => Ok(rate),
        None => base.rate_for(tier),
    };
    let policy = DiscountPolicy::from_rates(
        rate(cli.low_rate, RiskTier::Low)?,
        rate(cli.medium_rate, RiskTier::Medium)?,
        rate(cli.high_rate, RiskTier::High)?,
    );

    let filings = FilingsRegistryClient::new(
        config.filings_registry_url.clone(),
        &config.filings_user_agent,
        config.registry_timeout,
    )?;
    let formation = FormationRegistryClient::new(
        config.formation_registry_url.clone(),
        config.formation_api_token.clone(),
        config.registry_timeout,
    )?;
    let orchestrator =
        EnrichmentOrchestrator::new(Arc::new(filings), Arc::new(formation), config.settings())?;

    let names: Vec<String> = leases.iter().map(lessee_name).collect();
    let batch = orchestrator.enrich_batch(&names, &policy).await?;
    tracing::info!("Run {} enriched {} leases", batch.run_id, batch.records.len());

    let output: Vec<Value> = leases
        .into_iter()
        .zip(batch.records.iter())
        .map(|(lease, record)| Value::Object(with_credit_columns(lease, record)))
        .collect();

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Lease objects in a parsed file; non-object entries are skipped.
fn lease_objects(value: Value) -> Vec<Map<String, Value>> {
    match value {
        Value::Object(lease) => vec![lease],
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(lease) => Some(lease),
                other => {
                    tracing::warn!("Skipping non-object lease entry: {}", other);
                    None
                }
            })
            .collect(),
        other => {
            tracing::warn!("Skipping lease file content that is not an object: {}", other);
            Vec::new()
        }
    }
}

fn lessee_name(lease: &Map<String, Value>) -> String {
    LESSEE_FIELDS
        .iter()
        .find_map(|field| {
            lease
                .get(*field)
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
        })
        .unwrap_or_default()
        .to_string()
}

fn with_credit_columns(
    mut lease: Map<String, Value>,
    record: &EnrichmentRecord,
) -> Map<String, Value> {
    lease.insert("risk_tier".to_string(), json!(record.tier));
    lease.insert("discount_rate".to_string(), json!(record.discount_rate));
    lease.insert(
        "discount_rate_display".to_string(),
        json!(format_rate_percent(record.discount_rate)),
    );
    lease.insert(
        "credit_resolution_status".to_string(),
        json!(record.resolution_status),
    );
    lease.insert("credit_facts".to_string(), json!(record.facts));
    lease.insert("credit_warnings".to_string(), json!(record.warnings));
    lease
}
