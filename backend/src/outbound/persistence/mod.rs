//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! Repositories translate between Diesel rows and domain records; row
//! structs (`models.rs`) and table definitions (`schema.rs`) never leave
//! this module. Connections come from a `bb8` pool through `diesel-async`.
//!
//! ```ignore
//! use bookshelf::outbound::persistence::{DbPool, DieselResourceRepository, PoolConfig};
//!
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/bookshelf")).await?;
//! let repository = DieselResourceRepository::new(pool, Arc::new(DefaultClock));
//! ```

mod diesel_access_token_repository;
mod diesel_error_mapping;
mod diesel_resource_repository;
mod migrations;
mod models;
mod pool;
mod schema;

pub use diesel_access_token_repository::DieselAccessTokenRepository;
pub use diesel_resource_repository::DieselResourceRepository;
pub use migrations::{MigrationError, run_pending_migrations};
pub use pool::{DbPool, PoolConfig, PoolError};
