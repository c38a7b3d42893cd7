//! # tryout-link: session-aware client for the try-out platform API
//!
//! The data layer of the exam/try-out front-end. It owns the authenticated
//! session and is the single path to the REST backend.
//!
//! ## Features
//!
//! - **Typed API client**: envelope unwrapping to typed payloads, structured
//!   API errors with validation details
//! - **Transparent token refresh**: a 401 triggers one shared refresh and a
//!   single retry of the request
//! - **Session store**: observable auth state persisted to durable or
//!   tab-scoped storage depending on "remember me"
//! - **Startup bootstrap**: validates a persisted session once per load
//! - **Query cache**: keyed caching, request de-duplication and retry of
//!   transient failures
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tryout_link::{QueryClient, QueryKey, SessionEventHandlers, TryoutLinkClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = TryoutLinkClient::builder()
//!     .base_url("http://localhost:3000/api")
//!     .event_handlers(
//!         SessionEventHandlers::new()
//!             .on_session_expired(|notice| eprintln!("{}", notice.message))
//!             .on_login_required(|path| println!("navigate to {}", path)),
//!     )
//!     .build()?;
//!
//! client.bootstrap().await;
//! if !client.session().is_authenticated() {
//!     client.login("a@x.com", "Passw0rd", true).await?;
//! }
//!
//! let queries = QueryClient::default();
//! let me = queries
//!     .fetch(QueryKey::from("me"), {
//!         let client = client.clone();
//!         move || {
//!             let client = client.clone();
//!             async move { client.me().await }
//!         }
//!     })
//!     .await?;
//! println!("Logged in as {}", me.email);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod event_handlers;
pub mod models;
pub mod pipeline;
pub mod query;
pub mod session;
pub mod storage;
pub mod timeouts;

pub use auth::{AuthBootstrap, BootstrapOutcome, TokenRefresher};
pub use client::{TryoutLinkClient, TryoutLinkClientBuilder};
pub use config::{ApiRoutes, ClientConfig};
pub use error::{ApiError, ErrorKind, Result, TryoutLinkError};
pub use event_handlers::{SessionEventHandlers, SessionExpiredNotice};
pub use models::{
    AuthResponse, FieldError, HttpVersion, RegisterRequest, TokenPair, UpdateProfileRequest,
    User, UserId, UserRole,
};
pub use pipeline::{PreparedRequest, RefreshOnUnauthorized, RequestConfig};
pub use query::{QueryClient, QueryKey, QueryOptions, QueryStatus, RetryPolicy};
pub use session::{Session, SessionStore};
pub use storage::{
    FileTokenStorage, MemoryTokenStorage, SessionStorage, StorageScope, TokenStorage,
};
pub use timeouts::TryoutLinkTimeouts;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
