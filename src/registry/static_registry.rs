use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::{RegistryClient, RegistryKind};
use crate::errors::RegistryError;
use crate::models::PartialFacts;
use crate::normalize::normalize_lessee_name;

/// A registry that answers from a fixed in-memory table.
///
/// Names are matched after normalization, so `"Acme Corp"` and `"acme"`
/// hit the same row. Unknown names are `NotFound`. Scripted failures are
/// served first, in order, before the row's steady answer; this is how
/// retry and timeout paths are exercised without a network.
pub struct StaticRegistry {
    kind: RegistryKind,
    answers: HashMap<String, Result<PartialFacts, RegistryError>>,
    scripted: Mutex<HashMap<String, VecDeque<RegistryError>>>,
    delay: Option<Duration>,
    calls: Mutex<HashMap<String, usize>>,
    total_calls: AtomicUsize,
}

impl StaticRegistry {
    pub fn new(kind: RegistryKind) -> Self {
        Self {
            kind,
            answers: HashMap::new(),
            scripted: Mutex::new(HashMap::new()),
            delay: None,
            calls: Mutex::new(HashMap::new()),
            total_calls: AtomicUsize::new(0),
        }
    }

    /// Answer `name` with `facts`.
    pub fn with_facts(mut self, name: &str, facts: PartialFacts) -> Self {
        self.answers.insert(key(name), Ok(facts));
        self
    }

    /// Answer `name` with `error` on every call.
    pub fn with_error(mut self, name: &str, error: RegistryError) -> Self {
        self.answers.insert(key(name), Err(error));
        self
    }

    /// Fail the next `count` lookups of `name` with `error`, then answer normally.
    pub fn with_failures(self, name: &str, count: usize, error: RegistryError) -> Self {
        if let Ok(mut scripted) = self.scripted.lock() {
            let queue = scripted.entry(key(name)).or_default();
            queue.extend(std::iter::repeat(error).take(count));
        }
        self
    }

    /// Sleep this long inside every lookup.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Lookups issued for `name` so far.
    pub fn calls(&self, name: &str) -> usize {
        self.calls
            .lock()
            .map(|calls| calls.get(&key(name)).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Lookups issued for any name so far.
    pub fn total_calls(&self) -> usize {
        self.total_calls.load(Ordering::SeqCst)
    }
}

fn key(name: &str) -> String {
    normalize_lessee_name(name)
        .map(|identity| identity.as_str().to_string())
        .unwrap_or_default()
}

#[async_trait]
impl RegistryClient for StaticRegistry {
    fn kind(&self) -> RegistryKind {
        self.kind
    }

    async fn lookup(&self, name: &str) -> Result<PartialFacts, RegistryError> {
        let key = key(name);
        self.total_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut calls) = self.calls.lock() {
            *calls.entry(key.clone()).or_insert(0) += 1;
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self
            .scripted
            .lock()
            .ok()
            .and_then(|mut scripted| scripted.get_mut(&key).and_then(VecDeque::pop_front));
        if let Some(error) = scripted {
            return Err(error);
        }

        self.answers
            .get(&key)
            .cloned()
            .unwrap_or(Err(RegistryError::NotFound))
    }
}
