use failsafe::backoff::{self, Exponential};
use failsafe::failure_policy::{self, ConsecutiveFailures};
use failsafe::futures::CircuitBreaker as _;
use failsafe::{Config, StateMachine};
use std::future::Future;
use std::time::Duration;

use crate::errors::RegistryError;

/// Consecutive transient failures that open a registry's circuit.
pub const FAILURE_THRESHOLD: u32 = 5;

/// Circuit breaker guarding one registry adapter.
pub type RegistryCircuitBreaker = StateMachine<ConsecutiveFailures<Exponential>, ()>;

/// Creates a circuit breaker for a registry adapter to stop hammering a registry that is down.
///
/// # Configuration
///
/// - **Failure threshold**: 5 consecutive transient failures triggers OPEN state.
/// - **Backoff**: Exponential backoff from 10s to 60s before attempting recovery.
///
/// # States
///
/// - **CLOSED**: Normal operation, lookups pass through.
/// - **OPEN**: Registry considered down, lookups fail fast as `Unavailable`.
/// - **HALF_OPEN**: Testing if the registry recovered.
///
/// `NotFound` and `Malformed` answers prove the registry is up and never count
/// as failures.
pub fn create_registry_circuit_breaker() -> RegistryCircuitBreaker {
    let backoff_strategy = backoff::exponential(
        Duration::from_secs(10), // Initial delay
        Duration::from_secs(60), // Maximum delay
    );

    let failure_policy = failure_policy::consecutive_failures(FAILURE_THRESHOLD, backoff_strategy);

    Config::new().failure_policy(failure_policy).build()
}

/// Run one registry call through `breaker`.
///
/// A rejected call (circuit open) surfaces as `Unavailable`, so the retry
/// policy and the resolver treat it like any other outage.
pub async fn guarded<T, F>(
    breaker: &RegistryCircuitBreaker,
    label: &str,
    call: F,
) -> Result<T, RegistryError>
where
    F: Future<Output = Result<T, RegistryError>>,
{
    match breaker
        .call_with(|e: &RegistryError| e.is_transient(), call)
        .await
    {
        Ok(value) => Ok(value),
        Err(failsafe::Error::Inner(e)) => Err(e),
        Err(failsafe::Error::Rejected) => {
            tracing::warn!("{}: circuit open, failing fast", label);
            Err(RegistryError::Unavailable("circuit open".to_string()))
        }
    }
}
