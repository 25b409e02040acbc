//! # Kyros Store - Relational Store Contract
//!
//! Typed queries against the platform's relational store. The gateway only
//! ever touches users (for authentication) and the project/task tables it
//! proxies; everything else belongs to other services.
//!
//! Two backends implement the [`UserStore`] and [`ProjectStore`] contracts:
//!
//! - [`PgStore`] - Postgres via `sqlx`, with a bounded, liveness-checked
//!   connection pool and embedded migrations
//! - [`MemoryStore`] - in-process tables for tests and local development
//!
//! Lookups return [`StoreError::NotFound`] as a sentinel distinct from
//! transport failures, and unique-constraint violations surface as
//! [`StoreError::Conflict`] naming the offending field.

pub mod error;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use models::{NewProject, NewTask, NewUser, Project, PublicUser, Task, User};
pub use postgres::{PgStore, PoolConfig};
pub use store::{ProjectStore, UserStore};
