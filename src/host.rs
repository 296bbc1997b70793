//! Host authentication contracts
//!
//! The pieces a host server needs to run pluggable authentication providers:
//! module descriptors, an owned registry keyed by module ID, and the
//! provision/validate/authenticate lifecycle every provider implements.
//!
//! There is no process-wide registry. A host builds a [`ModuleRegistry`],
//! registers the modules it wants and loads providers from configuration.

use crate::auth::AuthError;
use crate::identity::UserIdentity;
use async_trait::async_trait;
use hyper::http::request::Parts;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, Span};

/// Constructor building a provider from its raw JSON configuration
pub type ModuleConstructor =
    fn(serde_json::Value) -> Result<Box<dyn AuthenticationProvider>, AuthError>;

/// Module descriptor: a capability ID and a constructor
#[derive(Clone, Copy)]
pub struct ModuleInfo {
    pub id: &'static str,
    pub new: ModuleConstructor,
}

impl fmt::Debug for ModuleInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleInfo").field("id", &self.id).finish()
    }
}

/// Result of authenticating one request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Authentication {
    pub user: UserIdentity,
    pub authenticated: bool,
}

/// Context handed to modules while they are provisioned
#[derive(Debug, Clone, Default)]
pub struct ProvisionContext;

impl ProvisionContext {
    pub fn new() -> Self {
        Self
    }

    /// Logger scoped to a module
    pub fn logger(&self, module_id: &'static str) -> Span {
        tracing::info_span!("module", module.id = module_id)
    }
}

/// Prepares a module after construction
pub trait Provisioner {
    fn provision(&mut self, ctx: &ProvisionContext) -> Result<(), AuthError>;
}

/// Checks a provisioned module is usable
pub trait Validator {
    fn validate(&self) -> Result<(), AuthError>;
}

/// Authenticates requests for the host pipeline
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, request: &mut Parts) -> Result<Authentication, AuthError>;
}

/// A complete authentication provider module
pub trait AuthenticationProvider: Provisioner + Validator + Authenticator {}

impl<T> AuthenticationProvider for T where T: Provisioner + Validator + Authenticator {}

/// Registry of available authentication modules
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: BTreeMap<&'static str, ModuleInfo>,
}

impl ModuleRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every module shipped in this crate
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        for info in [crate::provider::module_info()] {
            if let Err(e) = registry.register(info) {
                error!(module.id = info.id, error = %e, "Failed to register builtin module");
            }
        }
        registry
    }

    /// Register a module; IDs must be unique
    pub fn register(&mut self, info: ModuleInfo) -> Result<(), AuthError> {
        if self.modules.contains_key(info.id) {
            return Err(AuthError::InvalidConfig(format!(
                "module '{}' already registered",
                info.id
            )));
        }
        self.modules.insert(info.id, info);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&ModuleInfo> {
        self.modules.get(id)
    }

    /// Registered module IDs in sorted order
    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.modules.keys().copied()
    }

    /// Construct, provision and validate a provider
    pub fn load(
        &self,
        id: &str,
        config: serde_json::Value,
        ctx: &ProvisionContext,
    ) -> Result<Arc<dyn AuthenticationProvider>, AuthError> {
        let info = self
            .get(id)
            .ok_or_else(|| AuthError::UnknownModule(id.to_string()))?;

        let mut provider = (info.new)(config)?;
        provider.provision(ctx)?;
        provider.validate()?;

        info!(module.id = info.id, "Loaded authentication provider");
        Ok(Arc::from(provider))
    }
}
