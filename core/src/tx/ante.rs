//! # Ante Validation
//!
//! Pre-execution gate for every transaction, run before routing. The
//! checks, in order and from cheapest to most consequential:
//!
//! 1. **Signature** — present and verifying against the declared signer
//!    (`Unauthorized`).
//! 2. **Sequence** — exactly the signer's current sequence + 1
//!    (`InvalidSequence`). Strict equality makes replay impossible and
//!    keeps retries well-ordered.
//! 3. **Fee** — deducted from the signer (`InsufficientFunds`).
//!
//! Fee and sequence are staged in the same overlay as handler effects: a
//! transaction that later fails in its handler consumes neither. Fees
//! are burned; paying them out to block proposers is the business of the
//! consensus layer, which is not this crate.

use crate::error::StateError;
use crate::tx::overlay::TxOverlay;
use crate::tx::types::Transaction;

/// Run the ante checks, staging the fee deduction and sequence bump on
/// success.
pub fn check(overlay: &mut TxOverlay<'_>, tx: &Transaction) -> Result<(), StateError> {
    let Some(signature) = &tx.signature else {
        return Err(StateError::Unauthorized("transaction is unsigned".to_string()));
    };
    if !tx.signer.verify(&tx.signable_bytes(), signature) {
        return Err(StateError::Unauthorized(format!(
            "signature does not verify against signer {}",
            tx.signer
        )));
    }

    let address = tx.signer_address();
    let expected = overlay.sequence(&address) + 1;
    if tx.sequence != expected {
        return Err(StateError::InvalidSequence {
            address: address.to_hex(),
            expected,
            got: tx.sequence,
        });
    }

    if tx.fee > 0 {
        overlay.debit(&address, tx.fee)?;
    }
    overlay.bump_sequence(&address);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;
    use crate::ledger::{Account, Address};
    use crate::mirror::StateMirror;
    use crate::tx::build::{sign_transaction, TxBuilder};
    use crate::tx::types::LinkPayload;

    fn funded_mirror(kp: &Keypair, balance: u64) -> StateMirror {
        let mut mirror = StateMirror::new();
        mirror.put_account(
            Address::from_public_key(&kp.public_key()),
            Account::with_balance(balance),
        );
        mirror
    }

    fn signed_link_tx(kp: &Keypair, sequence: u64, fee: u64) -> Transaction {
        let mut tx = TxBuilder::link(LinkPayload::single("a", "b"))
            .sequence(sequence)
            .fee(fee)
            .build(kp);
        sign_transaction(&mut tx, kp);
        tx
    }

    #[test]
    fn valid_transaction_passes_and_stages_fee() {
        let kp = Keypair::generate();
        let mirror = funded_mirror(&kp, 100);
        let mut overlay = TxOverlay::new(&mirror);

        let tx = signed_link_tx(&kp, 1, 10);
        check(&mut overlay, &tx).unwrap();

        let addr = tx.signer_address();
        assert_eq!(overlay.account(&addr).balance, 90);
        assert_eq!(overlay.sequence(&addr), 1);
    }

    #[test]
    fn rejects_unsigned() {
        let kp = Keypair::generate();
        let mirror = funded_mirror(&kp, 100);
        let mut overlay = TxOverlay::new(&mirror);

        let tx = TxBuilder::link(LinkPayload::single("a", "b"))
            .sequence(1)
            .build(&kp);
        assert_eq!(check(&mut overlay, &tx).unwrap_err().kind(), "Unauthorized");
    }

    #[test]
    fn rejects_wrong_key_signature() {
        let kp = Keypair::generate();
        let intruder = Keypair::generate();
        let mirror = funded_mirror(&kp, 100);
        let mut overlay = TxOverlay::new(&mirror);

        // Built for kp's account, signed by someone else.
        let mut tx = TxBuilder::link(LinkPayload::single("a", "b"))
            .sequence(1)
            .build(&kp);
        tx.signature = Some(intruder.sign(&tx.signable_bytes()));
        assert_eq!(check(&mut overlay, &tx).unwrap_err().kind(), "Unauthorized");
    }

    #[test]
    fn rejects_replayed_and_future_sequences() {
        let kp = Keypair::generate();
        let mut mirror = funded_mirror(&kp, 100);
        let addr = Address::from_public_key(&kp.public_key());
        let mut account = mirror.account(&addr).cloned().unwrap();
        account.sequence = 3;
        mirror.put_account(addr, account);

        // Replay of an old sequence.
        let mut overlay = TxOverlay::new(&mirror);
        let old = signed_link_tx(&kp, 3, 0);
        match check(&mut overlay, &old).unwrap_err() {
            StateError::InvalidSequence { expected, got, .. } => {
                assert_eq!(expected, 4);
                assert_eq!(got, 3);
            }
            other => panic!("expected InvalidSequence, got {other:?}"),
        }

        // A gap is just as invalid.
        let mut overlay = TxOverlay::new(&mirror);
        let future = signed_link_tx(&kp, 6, 0);
        assert_eq!(
            check(&mut overlay, &future).unwrap_err().kind(),
            "InvalidSequence"
        );

        // The exact next sequence passes.
        let mut overlay = TxOverlay::new(&mirror);
        check(&mut overlay, &signed_link_tx(&kp, 4, 0)).unwrap();
    }

    #[test]
    fn rejects_unaffordable_fee() {
        let kp = Keypair::generate();
        let mirror = funded_mirror(&kp, 5);
        let mut overlay = TxOverlay::new(&mirror);

        let tx = signed_link_tx(&kp, 1, 10);
        assert_eq!(
            check(&mut overlay, &tx).unwrap_err().kind(),
            "InsufficientFunds"
        );
    }

    #[test]
    fn zero_fee_accounts_need_no_balance() {
        let kp = Keypair::generate();
        let mirror = StateMirror::new(); // account does not even exist yet
        let mut overlay = TxOverlay::new(&mirror);
        check(&mut overlay, &signed_link_tx(&kp, 1, 0)).unwrap();
    }
}
