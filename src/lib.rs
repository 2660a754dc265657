//! Lease Credit Enrichment Library
//!
//! Resolves lessee corporate facts from a public-market filings registry and
//! a corporate-formation registry, classifies each lessee into a credit-risk
//! tier and maps that tier to the discount rate used for present-value
//! computation and reporting.
//!
//! # Modules
//!
//! - `cache`: Run-scoped, checksum-validated TTL cache of resolved facts.
//! - `circuit_breaker`: Circuit breakers guarding the registry adapters.
//! - `classifier`: Credit facts to risk tier.
//! - `config`: Configuration management.
//! - `discount`: Risk tier to discount rate policy.
//! - `enrichment`: Batch orchestration (the public entry point).
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `models`: Core data models.
//! - `normalize`: Lessee name normalization.
//! - `registry`: Registry clients (HTTP adapters and an in-memory registry).
//! - `report`: Report column formatting.
//! - `resolver`: Merging registry answers into credit facts.
//! - `retry`: Exponential backoff for transient registry failures.

pub mod cache;
pub mod circuit_breaker;
pub mod classifier;
pub mod config;
pub mod discount;
pub mod enrichment;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod normalize;
pub mod registry;
pub mod report;
pub mod resolver;
pub mod retry;
