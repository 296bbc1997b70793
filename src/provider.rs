//! JWT authentication provider
//!
//! Glue between the host's provider lifecycle and an [`Authorizer`]. Each
//! request gets a request ID, is handed to the authorizer with that ID, and
//! the returned claims are turned into a [`UserIdentity`].

use crate::auth::jwt::JwtAuthorizer;
use crate::auth::{AuthError, AuthorizeOptions, Authorizer, ProvisionOptions};
use crate::correlation::resolve_request_id;
use crate::host::{
    Authentication, AuthenticationProvider, Authenticator, ModuleInfo, ProvisionContext,
    Provisioner, Validator,
};
use crate::identity::{adapt, UserIdentity};
use async_trait::async_trait;
use hyper::http::request::Parts;
use serde::Deserialize;
use tracing::debug;

/// Capability ID the provider registers under
pub const MODULE_ID: &str = "http.authentication.providers.jwt";

/// Module descriptor for the JWT provider
pub fn module_info() -> ModuleInfo {
    ModuleInfo {
        id: MODULE_ID,
        new: new_module,
    }
}

fn new_module(config: serde_json::Value) -> Result<Box<dyn AuthenticationProvider>, AuthError> {
    let provider: JwtAuthProvider = serde_json::from_value(config)
        .map_err(|e| AuthError::InvalidConfig(format!("{}: {}", MODULE_ID, e)))?;
    Ok(Box::new(provider))
}

/// Authentication provider wrapping an authorizer
///
/// Configured as `{ "authorizer": { ... } }`.
#[derive(Debug, Deserialize)]
pub struct JwtAuthProvider<A = JwtAuthorizer> {
    authorizer: A,
}

impl<A: Authorizer> JwtAuthProvider<A> {
    pub fn new(authorizer: A) -> Self {
        Self { authorizer }
    }

    pub fn authorizer(&self) -> &A {
        &self.authorizer
    }
}

impl<A: Authorizer> Provisioner for JwtAuthProvider<A> {
    fn provision(&mut self, ctx: &ProvisionContext) -> Result<(), AuthError> {
        self.authorizer.provision(ProvisionOptions {
            logger: ctx.logger(MODULE_ID),
        })
    }
}

impl<A: Authorizer> Validator for JwtAuthProvider<A> {
    fn validate(&self) -> Result<(), AuthError> {
        Ok(())
    }
}

#[async_trait]
impl<A: Authorizer> Authenticator for JwtAuthProvider<A> {
    async fn authenticate(&self, request: &mut Parts) -> Result<Authentication, AuthError> {
        let request_id = resolve_request_id(request);
        let opts = AuthorizeOptions {
            request_id: request_id.clone(),
        };

        let authorization = self.authorizer.authorize(request, &opts).await?;

        match adapt(authorization.claims.as_ref())? {
            Some(user) => Ok(Authentication {
                user,
                authenticated: authorization.authenticated,
            }),
            None => {
                debug!(request_id = %request_id, "No identity for request");
                Ok(Authentication {
                    user: UserIdentity::default(),
                    authenticated: false,
                })
            }
        }
    }
}
