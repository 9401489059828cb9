//! # Transaction Router
//!
//! Static dispatch table from type tag to handler, assembled once at
//! startup. There is no reflection and no late registration: the route
//! set is fixed before the first block, so an unroutable tag is a
//! property of the transaction, not of timing.

use std::collections::HashMap;

use crate::error::StateError;
use crate::tx::overlay::TxOverlay;
use crate::tx::types::{Transaction, TxEffects};

/// A transaction handler. Implementations stage every mutation in the
/// overlay and must not touch any other state — that is what makes
/// execution all-or-nothing.
pub trait TxHandler: Send + Sync {
    fn handle(&self, overlay: &mut TxOverlay<'_>, tx: &Transaction)
        -> Result<TxEffects, StateError>;
}

/// The dispatch table.
#[derive(Default)]
pub struct Router {
    routes: HashMap<&'static str, Box<dyn TxHandler>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under a tag. Chainable, in the spirit of the
    /// startup sequence this is called from.
    pub fn add_route(mut self, tag: &'static str, handler: Box<dyn TxHandler>) -> Self {
        self.routes.insert(tag, handler);
        self
    }

    /// Whether a tag has a registered handler.
    pub fn has_route(&self, tag: &str) -> bool {
        self.routes.contains_key(tag)
    }

    /// Dispatch a transaction to its handler. `Unroutable` for unknown
    /// tags.
    pub fn route(
        &self,
        overlay: &mut TxOverlay<'_>,
        tx: &Transaction,
    ) -> Result<TxEffects, StateError> {
        let handler = self
            .routes
            .get(tx.type_tag.as_str())
            .ok_or_else(|| StateError::Unroutable(tx.type_tag.clone()))?;
        handler.handle(overlay, tx)
    }
}
