//! # Kyros Gateway
//!
//! The edge gateway of the Kyros platform: the single trust boundary
//! between untrusted clients and internal services. It terminates client
//! HTTP traffic, authenticates requests (passwords + bcrypt, OAuth
//! federation, TOTP second factor), tracks server-side sessions, enforces
//! abuse limits, and forwards authorised traffic to the internal worker
//! service.
//!
//! The library surface exists so integration tests can drive the full
//! router over in-memory backends; the binary in `main.rs` wires the same
//! router to Postgres and Redis.

pub mod config;
pub mod cookies;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod proxy;
pub mod routes;
pub mod state;

pub use config::{Environment, GatewayConfig};
pub use error::{ApiError, ApiResult};
pub use routes::build_router;
pub use state::{AppState, CurrentUser};
