//! Lessee risk classification.
//!
//! Rules, first match wins:
//! 1. public company incorporated more than 10 years ago -> `Low`
//! 2. incorporated between 5 and 10 years ago (inclusive) -> `Medium`
//! 3. anything else, including unknown facts -> `High`
//!
//! `state_of_incorporation` is carried for auditing and does not affect the tier.

use crate::models::{CreditFacts, RiskTier};

/// Years strictly above which a public company is `Low` risk.
pub const LOW_RISK_MIN_EXCLUSIVE_YEARS: u32 = 10;

/// Inclusive lower bound of the `Medium` age band.
pub const MEDIUM_RISK_MIN_YEARS: u32 = 5;

/// Classify a lessee. Total and deterministic over every known/unknown combination.
pub fn classify(facts: &CreditFacts) -> RiskTier {
    match (facts.is_public_company, facts.years_since_incorporation) {
        (Some(true), Some(years)) if years > LOW_RISK_MIN_EXCLUSIVE_YEARS => RiskTier::Low,
        (_, Some(years))
            if (MEDIUM_RISK_MIN_YEARS..=LOW_RISK_MIN_EXCLUSIVE_YEARS).contains(&years) =>
        {
            RiskTier::Medium
        }
        _ => RiskTier::High,
    }
}
