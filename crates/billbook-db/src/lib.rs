//! # billbook-db: Persistence and Commit Boundary for Billbook
//!
//! This crate stores the purchase-lot ledger in SQLite and applies the plans
//! computed by `billbook-core` atomically.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Billbook Data Flow                               │
//! │                                                                         │
//! │  REST handler (commit_sale / void_sale / record_purchase)              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  billbook-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │ SaleCoordinator│   │  Repositories │    │  Migrations  │  │   │
//! │  │   │ (coordinator) │───►│ product, lot, │    │  (embedded)  │  │   │
//! │  │   │ locks, retries│    │ sale          │    │ 001_init.sql │  │   │
//! │  │   └───────┬───────┘    └───────┬───────┘    └──────────────┘  │   │
//! │  │           │ plans              │ SqlitePool (pool.rs)          │   │
//! │  │           ▼                    ▼                                │   │
//! │  │     billbook-core         SQLite (WAL)                          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (product, lot, sale)
//! - [`locks`] - Per-product async locks
//! - [`coordinator`] - Sale commit/void, purchases, audits
//! - [`config`] - Ledger configuration from the environment
//!
//! ## Usage
//!
//! ```rust,ignore
//! use billbook_db::{Database, DbConfig, LedgerConfig, SaleCoordinator};
//!
//! let db = Database::new(DbConfig::new("billbook.db")).await?;
//! let coordinator = SaleCoordinator::new(db, LedgerConfig::from_env()?);
//!
//! let sale = coordinator.commit_sale(request).await?;
//! coordinator.void_sale(&sale.id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod coordinator;
pub mod error;
pub mod locks;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, LedgerConfig};
pub use coordinator::SaleCoordinator;
pub use error::{DbError, DbResult};
pub use locks::ProductLocks;
pub use pool::{Database, DbConfig, DbLocation};

// Repository re-exports for convenience
pub use repository::lot::LotRepository;
pub use repository::product::ProductRepository;
pub use repository::sale::SaleRepository;
