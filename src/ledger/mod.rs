//! Transactional persistence layer: pool, migrations, and row-locked access to
//! wallets, holdings, orders, and the append-only transaction log.
//!
//! Every mutating function takes a `&mut PgConnection` borrowed from a
//! transaction owned by the caller (order intake, settlement worker, or a trade
//! handler); the caller issues the final commit or rollback.

pub mod accounts;
pub mod orders;
mod pool;
pub mod positions;
pub mod transactions;
pub mod users;

pub use pool::{create_pool_and_migrate, run_migrations};
pub use sqlx::PgPool;
