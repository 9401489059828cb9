//! The `"link"` route: content graph edge creation.

use crate::error::StateError;
use crate::graph::Cid;
use crate::tx::overlay::TxOverlay;
use crate::tx::router::TxHandler;
use crate::tx::types::{LinkPayload, Transaction, TxEffects};

/// Creates one or more directed edges between content identifiers,
/// registering any cid not seen before. The whole batch is
/// all-or-nothing: one bad cid or duplicate pair rejects the
/// transaction, and the overlay discard throws away any registrations
/// staged before the failure.
pub struct LinkHandler;

impl TxHandler for LinkHandler {
    fn handle(
        &self,
        overlay: &mut TxOverlay<'_>,
        tx: &Transaction,
    ) -> Result<TxEffects, StateError> {
        let payload = LinkPayload::decode(&tx.payload)?;
        if payload.links.is_empty() {
            return Err(StateError::Malformed("empty link batch".to_string()));
        }

        for pair in &payload.links {
            let from = overlay.resolve(&Cid::new(pair.from.clone())?);
            let to = overlay.resolve(&Cid::new(pair.to.clone())?);
            overlay.create_link(from, to)?;
        }

        Ok(TxEffects {
            cids_registered: overlay.cids_registered(),
            links_created: overlay.links_created(),
            ..TxEffects::default()
        })
    }
}
