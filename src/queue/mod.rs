//! Queue Substrate: a durable table-backed FIFO with atomic
//! lease, retry/backoff, stale recovery, idempotent enqueue, and a
//! notification channel for low-latency wake-up.
//!
//! Grounded on `backend/src/operations/tasks/store.rs`'s `TaskStore` shape
//! (a thin struct wrapping a pool, one method per lifecycle transition),
//! retargeted from SQLite to Postgres so `pick` can use row-level
//! `FOR UPDATE SKIP LOCKED` locking instead of application-level mutexing.

pub mod ask;
pub mod notify;
pub mod truth;

pub use ask::AskQueue;
pub use truth::TruthQueue;
