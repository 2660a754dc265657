//! Report columns contributed by credit enrichment.

use serde::Serialize;

use crate::models::EnrichmentRecord;

/// Format a fractional rate as a two-decimal percentage (`0.1` -> `"10.00%"`).
pub fn format_rate_percent(rate: f64) -> String {
    format!("{:.2}%", rate * 100.0)
}

/// The columns a lease report row gains from its enrichment record.
///
/// A degraded row still renders; its warnings are joined into one visible
/// annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportColumns {
    pub risk_tier: String,
    pub discount_rate: String,
    pub warnings: String,
}

impl From<&EnrichmentRecord> for ReportColumns {
    fn from(record: &EnrichmentRecord) -> Self {
        Self {
            risk_tier: record.tier.as_str().to_string(),
            discount_rate: format_rate_percent(record.discount_rate),
            warnings: record.warnings.join("; "),
        }
    }
}
