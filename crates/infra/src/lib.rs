//! `stockline-infra` — storage-backed stock/order engine.
//!
//! The [`engine::Engine`] trait is the only code path allowed to mutate
//! product stock, create orders, or touch the webhook ledger. Two
//! implementations exist:
//!
//! - [`engine::PostgresEngine`] — production backend; concurrency
//!   correctness comes entirely from Postgres row locks (`FOR UPDATE`),
//!   transactions, and unique constraints, so it is safe across any number
//!   of processes.
//! - [`engine::InMemoryEngine`] — single-process dev/test backend with the
//!   same observable semantics behind one coarse lock.

pub mod engine;

pub use engine::{Engine, InMemoryEngine, PostgresEngine, ProductPage, WebhookOutcome};

#[cfg(test)]
mod integration_tests;
