//! # apiary-app
//!
//! Application layer — port definitions and the automation-unit runtime.
//!
//! ## Responsibilities
//! - Define **port traits** that adapters implement (driven/outbound ports):
//!   - `MessageBus` — publish/subscribe wire transport
//!   - `UnitEngine` / `AutomationUnit` — the swappable guest-language embedding
//!   - `ChatTransport` / `NotificationTransport` — outbound push surfaces
//! - Provide the **runtime core** that needs no IO of its own:
//!   - `UnitHost` — unit lifecycle, per-unit serialization, dispatch
//!   - `TriggerSet` — per-unit timers, tickers, and weekly alarms
//!   - `SubscriptionRegistry` — topic → interested units
//!   - `RetryScheduler` — backed-off redelivery of side-effecting actions
//!   - `Reconciler` — diff-syncs loaded units against watched folders
//!   - `SharedVars` — the process-wide named-variable store
//! - `Hub` orchestrates the above against the bus without knowing *how*
//!   transport or guest execution works
//!
//! ## Dependency rule
//! Depends on `apiary-domain` only (plus `tokio::sync`/`tokio_util` for
//! channels and cancellation). Never imports adapter crates. Adapters
//! depend on *this* crate, not the reverse.

pub mod host;
pub mod hub;
pub mod ports;
pub mod reconciler;
pub mod retry;
pub mod subscriptions;
pub mod vars;
