//! Ordered route registry.
//!
//! # Responsibilities
//! - Store routes in registration order
//! - Resolve (verb, path) to the first structurally matching route
//! - Reject duplicate (verb, template) registrations at startup
//!
//! Resolution never mutates state, so a built registry can be shared behind an
//! `Arc` without locking.

use log::{debug, warn};

use super::{
    matcher::{PathParams, PathTemplate},
    Verb,
};
use crate::core::error::{BridgeError, BridgeResult};

/// A registered route
#[derive(Debug)]
pub struct Route<H> {
    pub verb: Verb,
    pub template: PathTemplate,
    pub handler: H,
}

/// A successful resolution
#[derive(Debug)]
pub struct ResolvedRoute<'a, H> {
    pub handler: &'a H,
    pub template: &'a PathTemplate,
    pub params: PathParams,
}

#[derive(Debug)]
pub struct RouteRegistry<H> {
    routes: Vec<Route<H>>,
}

impl<H> Default for RouteRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> RouteRegistry<H> {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Registers a route.
    ///
    /// A route that is fully shadowed by an earlier registration of the same
    /// verb is accepted but can never be reached; this is logged.
    ///
    /// # Errors
    /// Returns `InvalidTemplate` for unparsable templates and `DuplicateRoute`
    /// when the verb already has a structurally identical template.
    pub fn register(&mut self, verb: Verb, template: &str, handler: H) -> BridgeResult<()> {
        let template = PathTemplate::parse(template)?;

        for existing in self.routes.iter().filter(|r| r.verb == verb) {
            if existing.template.same_structure(&template) {
                return Err(BridgeError::DuplicateRoute {
                    verb,
                    template: template.as_str().to_string(),
                });
            }
            if existing.template.covers(&template) {
                warn!(
                    "Route {} {} is shadowed by earlier route {} {} and will never match",
                    verb,
                    template.as_str(),
                    verb,
                    existing.template.as_str()
                );
            }
        }

        debug!("Registering route {} {}", verb, template.as_str());
        self.routes.push(Route {
            verb,
            template,
            handler,
        });
        Ok(())
    }

    /// Resolves a call to its handler. `None` is terminal: no partial matches.
    pub fn resolve(&self, verb: Verb, path: &str) -> Option<ResolvedRoute<'_, H>> {
        self.routes
            .iter()
            .filter(|r| r.verb == verb)
            .find_map(|r| {
                r.template.matches(path).map(|params| ResolvedRoute {
                    handler: &r.handler,
                    template: &r.template,
                    params,
                })
            })
    }

    /// Looks up a route by its exact template text.
    pub fn find_exact(&self, verb: Verb, template: &str) -> Option<&Route<H>> {
        self.routes
            .iter()
            .find(|r| r.verb == verb && r.template.as_str() == template)
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route<H>> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
