//! JWT Auth Provider Library
//!
//! JWT authentication provider for reverse-proxy authentication pipelines.
//!
//! # Features
//!
//! - **Request Correlation**: every request carries one request ID, adopted
//!   from `X-Request-Id` or generated as a UUID v4
//! - **Delegated Verification**: tokens are verified by an [`auth::Authorizer`];
//!   the bundled one is backed by `jsonwebtoken`
//! - **Typed Identities**: claims are checked and mapped onto a
//!   [`identity::UserIdentity`] instead of trusted blindly
//! - **Pluggable**: providers are registered by capability ID in an owned
//!   [`host::ModuleRegistry`]
//!
//! # Example
//!
//! ```no_run
//! use jwt_auth_provider::{config::Config, host::ModuleRegistry, server::AuthServer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let server = AuthServer::new(&config, &ModuleRegistry::with_builtin()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod config;
pub mod correlation;
pub mod host;
pub mod identity;
pub mod provider;
pub mod server;

// Re-export commonly used types
pub use config::Config;
pub use host::{Authentication, ModuleRegistry};
pub use identity::UserIdentity;
pub use provider::{JwtAuthProvider, MODULE_ID};
pub use server::AuthServer;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
