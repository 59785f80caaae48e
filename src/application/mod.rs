//! Application layer containing the core business logic orchestration.
//!
//! `EconomyEngine` is the entry point. It hands out the `LedgerEngine`
//! (balances, earning, admin adjustments), the `CatalogEngine` (products and
//! purchases) and the `SettingsService`, all sharing one store handle. Every
//! mutation is a single conditional commit, retried from a fresh read when it
//! loses a race with a concurrent request.

pub mod bootstrap;
pub mod catalog;
pub mod engine;
pub mod ledger;
mod retry;
pub mod settings;
