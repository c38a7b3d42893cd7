//! Authentication flows built on top of the API client.
//!
//! - [`refresh`]: single-flight token refresh used by the request pipeline
//! - [`bootstrap`]: one-time validation of a persisted session at startup
//! - `service`: login, registration, logout and profile endpoints, exposed as
//!   methods on [`TryoutLinkClient`](crate::TryoutLinkClient)

pub mod bootstrap;
pub mod refresh;
mod service;

pub use bootstrap::{AuthBootstrap, BootstrapOutcome};
pub use refresh::TokenRefresher;
