//! Identity and role resolution.
//!
//! The workflow never trusts a caller-supplied role; it resolves an opaque
//! token through an [`IdentityResolver`] and authorizes against the result.

use std::collections::HashMap;

use crate::config::ActorConfig;
use crate::models::actor::Actor;
use crate::{AppError, Result};

/// Resolves caller tokens and staff numbers to actor identities.
pub trait IdentityResolver: Send + Sync {
    /// Resolve the actor presenting `token`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::UnauthorizedActor` if the token is unknown.
    fn resolve(&self, token: &str) -> Result<Actor>;

    /// Look up a known actor by PF number, e.g. an officer being assigned.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no actor has that PF number.
    fn lookup(&self, pf_number: &str) -> Result<Actor>;
}

/// Resolver backed by the `[[actors]]` table of the configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityResolver {
    by_token: HashMap<String, Actor>,
}

impl StaticIdentityResolver {
    /// Build from configured actor entries.
    #[must_use]
    pub fn from_config(actors: &[ActorConfig]) -> Self {
        let by_token = actors
            .iter()
            .map(|entry| (entry.token.clone(), entry.to_actor()))
            .collect();
        Self { by_token }
    }

    /// Register one actor under `token`.
    #[must_use]
    pub fn with_actor(mut self, token: impl Into<String>, actor: Actor) -> Self {
        self.by_token.insert(token.into(), actor);
        self
    }
}

impl IdentityResolver for StaticIdentityResolver {
    fn resolve(&self, token: &str) -> Result<Actor> {
        self.by_token
            .get(token)
            .cloned()
            .ok_or_else(|| AppError::UnauthorizedActor("unknown actor token".into()))
    }

    fn lookup(&self, pf_number: &str) -> Result<Actor> {
        self.by_token
            .values()
            .find(|actor| {
                actor
                    .pf_number
                    .as_deref()
                    .is_some_and(|pf| pf.eq_ignore_ascii_case(pf_number))
            })
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("no actor with pf number {pf_number}")))
    }
}
