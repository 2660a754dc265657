//! Tier-to-rate discount policy.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::AppError;
use crate::models::RiskTier;

pub const DEFAULT_LOW_RATE: f64 = 0.08;
pub const DEFAULT_MEDIUM_RATE: f64 = 0.10;
pub const DEFAULT_HIGH_RATE: f64 = 0.12;

/// Discount rate per risk tier, as fractions.
///
/// Serializes as `{"low": 0.08, "medium": 0.10, "high": 0.12}`. A policy that
/// arrives from outside may lack tiers; [`DiscountPolicy::validate`] catches
/// that before a batch starts. Policies are plain values: a batch borrows one
/// snapshot and never sees it change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiscountPolicy {
    rates: BTreeMap<RiskTier, f64>,
}

impl Default for DiscountPolicy {
    fn default() -> Self {
        Self::from_rates(DEFAULT_LOW_RATE, DEFAULT_MEDIUM_RATE, DEFAULT_HIGH_RATE)
    }
}

impl DiscountPolicy {
    pub fn from_rates(low: f64, medium: f64, high: f64) -> Self {
        let rates = BTreeMap::from([
            (RiskTier::Low, low),
            (RiskTier::Medium, medium),
            (RiskTier::High, high),
        ]);
        Self { rates }
    }

    /// Build a policy from an arbitrary table, possibly incomplete.
    pub fn from_table(rates: BTreeMap<RiskTier, f64>) -> Self {
        Self { rates }
    }

    /// Check that every tier has a usable rate.
    ///
    /// Rates must be finite fractions strictly between 0 and 1.
    pub fn validate(&self) -> Result<(), AppError> {
        for tier in RiskTier::ALL {
            let rate = self.rate_for(tier)?;
            if !rate.is_finite() || rate <= 0.0 || rate >= 1.0 {
                return Err(AppError::InvalidPolicy(format!(
                    "rate for tier '{}' must be a fraction in (0, 1), got {}",
                    tier, rate
                )));
            }
        }
        Ok(())
    }

    /// Look up the discount rate for a tier.
    pub fn rate_for(&self, tier: RiskTier) -> Result<f64, AppError> {
        self.rates
            .get(&tier)
            .copied()
            .ok_or(AppError::PolicyIncomplete(tier))
    }
}

/// Discount rate for `tier` under `policy`.
pub fn rate_for(tier: RiskTier, policy: &DiscountPolicy) -> Result<f64, AppError> {
    policy.rate_for(tier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rates() {
        let policy = DiscountPolicy::default();
        assert_eq!(rate_for(RiskTier::Low, &policy), Ok(0.08));
        assert_eq!(rate_for(RiskTier::Medium, &policy), Ok(0.10));
        assert_eq!(rate_for(RiskTier::High, &policy), Ok(0.12));
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_missing_tier_is_policy_incomplete() {
        let policy = DiscountPolicy::from_table(BTreeMap::from([
            (RiskTier::Low, 0.07),
            (RiskTier::Medium, 0.09),
        ]));
        assert_eq!(
            rate_for(RiskTier::High, &policy),
            Err(AppError::PolicyIncomplete(RiskTier::High))
        );
        assert_eq!(
            policy.validate(),
            Err(AppError::PolicyIncomplete(RiskTier::High))
        );
    }

    #[test]
    fn test_out_of_range_rates_rejected() {
        for bad in [0.0, -0.05, 1.0, 12.0, f64::NAN] {
            let policy = DiscountPolicy::from_rates(0.08, bad, 0.12);
            assert!(
                matches!(policy.validate(), Err(AppError::InvalidPolicy(_))),
                "rate {} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_deserializes_from_tier_map() {
        let policy: DiscountPolicy =
            serde_json::from_str(r#"{"low": 0.06, "medium": 0.09, "high": 0.15}"#).unwrap();
        assert_eq!(policy, DiscountPolicy::from_rates(0.06, 0.09, 0.15));

        let partial: DiscountPolicy = serde_json::from_str(r#"{"low": 0.06}"#).unwrap();
        assert!(partial.validate().is_err());
    }
}
