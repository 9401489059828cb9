//! Transaction construction and signing.
//!
//! The builder produces an unsigned [`Transaction`]; [`sign_transaction`]
//! attaches the signature afterwards. The split keeps construction
//! testable without key material.

use crate::crypto::Keypair;

use super::types::{LinkPayload, Transaction, TransferPayload};

/// Fluent builder for unsigned transactions.
///
/// ```
/// use cortex_core::crypto::Keypair;
/// use cortex_core::tx::{sign_transaction, LinkPayload, TxBuilder};
///
/// let kp = Keypair::generate();
/// let mut tx = TxBuilder::link(LinkPayload::single("A", "B"))
///     .sequence(1)
///     .build(&kp);
/// sign_transaction(&mut tx, &kp);
/// assert!(tx.signature.is_some());
/// ```
pub struct TxBuilder {
    type_tag: &'static str,
    payload: Vec<u8>,
    sequence: u64,
    fee: u64,
}

impl TxBuilder {
    /// A `"bank"` transfer transaction.
    pub fn transfer(payload: TransferPayload) -> Self {
        Self {
            type_tag: crate::config::ROUTE_BANK,
            payload: payload.encode(),
            sequence: 0,
            fee: 0,
        }
    }

    /// A `"link"` transaction.
    pub fn link(payload: LinkPayload) -> Self {
        Self {
            type_tag: crate::config::ROUTE_LINK,
            payload: payload.encode(),
            sequence: 0,
            fee: 0,
        }
    }

    /// An arbitrary-tag transaction, for tests that probe routing.
    pub fn raw(type_tag: &'static str, payload: Vec<u8>) -> Self {
        Self {
            type_tag,
            payload,
            sequence: 0,
            fee: 0,
        }
    }

    pub fn sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn fee(mut self, fee: u64) -> Self {
        self.fee = fee;
        self
    }

    /// Finish with the given signer's public key attached. The
    /// transaction is still unsigned.
    pub fn build(self, signer: &Keypair) -> Transaction {
        Transaction {
            type_tag: self.type_tag.to_string(),
            payload: self.payload,
            signer: signer.public_key(),
            sequence: self.sequence,
            fee: self.fee,
            signature: None,
        }
    }
}

/// Sign a transaction in place with the given keypair.
///
/// The signature covers [`Transaction::signable_bytes`], which includes
/// the signer's public key — signing with a keypair other than the one
/// in `tx.signer` produces a transaction the ante stage will reject.
pub fn sign_transaction(tx: &mut Transaction, keypair: &Keypair) {
    tx.signature = Some(keypair.sign(&tx.signable_bytes()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Address;

    #[test]
    fn builder_sets_route_tags() {
        let kp = Keypair::generate();
        let transfer = TxBuilder::transfer(TransferPayload {
            to: Address::from_bytes(&[1u8; 20]).unwrap(),
            amount: 5,
        })
        .build(&kp);
        assert_eq!(transfer.type_tag, "bank");

        let link = TxBuilder::link(LinkPayload::single("a", "b")).build(&kp);
        assert_eq!(link.type_tag, "link");
    }

    #[test]
    fn signed_transaction_verifies() {
        let kp = Keypair::generate();
        let mut tx = TxBuilder::link(LinkPayload::single("a", "b"))
            .sequence(1)
            .fee(2)
            .build(&kp);
        sign_transaction(&mut tx, &kp);

        let sig = tx.signature.clone().unwrap();
        assert!(tx.signer.verify(&tx.signable_bytes(), &sig));
    }
}
