use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============ Identity ============

/// Normalized lessee name used as the cache and deduplication key.
///
/// Built by [`crate::normalize::normalize_lessee_name`]; two spellings that
/// normalize identically share one identity and therefore one resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LesseeIdentity(String);

impl LesseeIdentity {
    pub(crate) fn new(normalized: String) -> Self {
        Self(normalized)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LesseeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============ Registry Facts ============

/// What one registry could tell us about a lessee.
///
/// Every field is optional; a registry fills only what it knows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialFacts {
    /// Whether the lessee is a publicly traded company.
    pub is_public_company: Option<bool>,
    /// Whole years since incorporation, when the registry reports it directly.
    pub years_since_incorporation: Option<u32>,
    /// Date of incorporation, when the registry reports a date instead.
    pub incorporation_date: Option<NaiveDate>,
    /// Two-letter state (or jurisdiction) of incorporation.
    pub state_of_incorporation: Option<String>,
}

impl PartialFacts {
    /// Years since incorporation, preferring the reported figure over the date.
    pub fn years_as_of(&self, today: NaiveDate) -> Option<u32> {
        self.years_since_incorporation
            .or_else(|| self.incorporation_date.and_then(|d| whole_years_between(d, today)))
    }
}

/// Whole years elapsed between `from` and `to`, counted like a birthday.
///
/// Returns `None` when `from` lies in the future.
pub fn whole_years_between(from: NaiveDate, to: NaiveDate) -> Option<u32> {
    if from > to {
        return None;
    }
    let mut years = to.year() - from.year();
    if (to.month(), to.day()) < (from.month(), from.day()) {
        years -= 1;
    }
    u32::try_from(years).ok()
}

/// Canonical credit facts for one lessee, merged across registries.
///
/// `None` means no registry could supply the field. A missing value is never
/// replaced by a default that would imply lower risk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditFacts {
    pub is_public_company: Option<bool>,
    pub years_since_incorporation: Option<u32>,
    pub state_of_incorporation: Option<String>,
}

impl CreditFacts {
    /// Facts with every field unknown.
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn is_all_unknown(&self) -> bool {
        self.unknown_fields().len() == 3
    }

    /// Names of the fields no registry could supply, in declaration order.
    pub fn unknown_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.is_public_company.is_none() {
            fields.push("is_public_company");
        }
        if self.years_since_incorporation.is_none() {
            fields.push("years_since_incorporation");
        }
        if self.state_of_incorporation.is_none() {
            fields.push("state_of_incorporation");
        }
        fields
    }
}

// ============ Classification ============

/// Coarse lessee credit-risk bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub const ALL: [RiskTier; 3] = [RiskTier::Low, RiskTier::Medium, RiskTier::High];

    /// Report label, matching the `risk_tier` field of lease records.
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How completely a lessee's facts could be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    /// Both registries answered and every fact is known.
    Resolved,
    /// At least one fact is unknown, or one registry could not answer.
    PartiallyResolved,
    /// Nothing known and both registries failed terminally.
    Failed,
}

impl ResolutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionStatus::Resolved => "resolved",
            ResolutionStatus::PartiallyResolved => "partially_resolved",
            ResolutionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ResolutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============ Output ============

/// One enriched lessee, consumed read-only by PV computation and reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentRecord {
    /// The lessee name exactly as it arrived from extraction.
    pub lessee_name: String,
    /// Normalized identity the facts were resolved under.
    pub lessee: LesseeIdentity,
    pub facts: CreditFacts,
    pub tier: RiskTier,
    /// Discount rate as a fraction (0.10 for 10%).
    pub discount_rate: f64,
    pub resolution_status: ResolutionStatus,
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_whole_years_counts_like_birthdays() {
        assert_eq!(whole_years_between(date(2010, 6, 15), date(2020, 6, 15)), Some(10));
        assert_eq!(whole_years_between(date(2010, 6, 15), date(2020, 6, 14)), Some(9));
        assert_eq!(whole_years_between(date(2020, 1, 1), date(2020, 12, 31)), Some(0));
        assert_eq!(whole_years_between(date(2021, 1, 1), date(2020, 1, 1)), None);
    }

    #[test]
    fn test_reported_years_win_over_date() {
        let partial = PartialFacts {
            years_since_incorporation: Some(3),
            incorporation_date: Some(date(1990, 1, 1)),
            ..Default::default()
        };
        assert_eq!(partial.years_as_of(date(2024, 1, 1)), Some(3));
    }

    #[test]
    fn test_unknown_fields_listing() {
        let facts = CreditFacts {
            is_public_company: Some(true),
            ..Default::default()
        };
        assert_eq!(
            facts.unknown_fields(),
            vec!["years_since_incorporation", "state_of_incorporation"]
        );
        assert!(CreditFacts::unknown().is_all_unknown());
        assert!(!facts.is_all_unknown());
    }

    #[test]
    fn test_tier_serializes_as_lowercase_label() {
        assert_eq!(serde_json::to_string(&RiskTier::Medium).unwrap(), "\"medium\"");
        assert_eq!(
            serde_json::to_string(&ResolutionStatus::PartiallyResolved).unwrap(),
            "\"partially_resolved\""
        );
    }
}
