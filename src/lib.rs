//! User service process lifecycle.
//!
//! Health probes for orchestrators and load balancers, and a coordinated
//! shutdown sequence that drains traffic before releasing dependencies.

pub mod app;
pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod middleware;
pub mod routes;
pub mod state;

pub use app::Application;
pub use error::AppError;
