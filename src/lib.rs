//! Asset Rust Client
//!
//! A Rust client library for the asset management API, with session handling,
//! silent token refresh on authentication failure, and permission-gated
//! navigation decisions.

pub mod claims;
pub mod config;
pub mod error;
pub mod guard;
pub mod http;
pub mod routes;
pub mod session;
pub mod token_store;
pub mod types;

pub use claims::{Claims, PermissionRequirement};
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use guard::{GuardDecision, Redirect, RouteGuard, RouteMeta};
pub use http::{ApiRequest, Attempt, HttpClient};
pub use routes::{RouteDefinition, RouteTable};
pub use session::{SessionSnapshot, SessionStore, SessionView};
pub use token_store::{FileTokenStorage, MemoryTokenStorage, StoredTokens, TokenStorage};
pub use types::{ApiOutcome, Envelope, TokenPair};
