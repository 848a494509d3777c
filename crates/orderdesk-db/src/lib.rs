//! # orderdesk-db: Database Layer for OrderDesk
//!
//! This crate provides transactional storage for the OrderDesk core.
//! It uses PostgreSQL with sqlx, and ships an in-memory store with the same
//! locking behavior for tests.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        OrderDesk Data Flow                              │
//! │                                                                         │
//! │  Coordinator (create_order, mark_paid, sweep ...)                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  orderdesk-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │ Store/StoreTx │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │  (store/)     │    │  (embedded)  │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ PgPool        │◄───│ PgStore       │    │ 001_init.sql │  │   │
//! │  │   │ lock_timeout  │    │ MemoryStore   │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     PostgreSQL                                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`store`] - `Store`/`StoreTx` traits and their implementations
//! - [`records`] - Row types for the PostgreSQL store
//!
//! ## Usage
//!
//! ```rust,ignore
//! use orderdesk_db::{Database, DbConfig, Store, StoreTx};
//!
//! let db = Database::new(DbConfig::new("postgres://localhost/orderdesk")).await?;
//! let store = db.store();
//!
//! let mut tx = store.begin().await?;
//! let order = tx.lock_order(&order_id).await?;
//! tx.commit().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod records;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use store::memory::MemoryStore;
pub use store::postgres::PgStore;
pub use store::{Store, StoreTx};
