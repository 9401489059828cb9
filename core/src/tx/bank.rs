//! The `"bank"` route: token transfers.

use crate::error::StateError;
use crate::tx::overlay::TxOverlay;
use crate::tx::router::TxHandler;
use crate::tx::types::{Transaction, TransferPayload, TxEffects};

/// Moves tokens from the signer to a recipient. The recipient account
/// is created on first credit.
pub struct BankHandler;

impl TxHandler for BankHandler {
    fn handle(
        &self,
        overlay: &mut TxOverlay<'_>,
        tx: &Transaction,
    ) -> Result<TxEffects, StateError> {
        let payload = TransferPayload::decode(&tx.payload)?;
        if payload.amount == 0 {
            return Err(StateError::Malformed("zero transfer amount".to_string()));
        }

        let sender = tx.signer_address();
        overlay.debit(&sender, payload.amount)?;
        overlay.credit(&payload.to, payload.amount)?;

        Ok(TxEffects {
            transferred: payload.amount,
            ..TxEffects::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;
    use crate::ledger::{Account, Address};
    use crate::mirror::StateMirror;
    use crate::tx::build::TxBuilder;

    fn setup(balance: u64) -> (Keypair, Address, StateMirror) {
        let kp = Keypair::generate();
        let addr = Address::from_public_key(&kp.public_key());
        let mut mirror = StateMirror::new();
        mirror.put_account(addr, Account::with_balance(balance));
        (kp, addr, mirror)
    }

    fn transfer_tx(kp: &Keypair, to: Address, amount: u64) -> Transaction {
        TxBuilder::transfer(TransferPayload { to, amount })
            .sequence(1)
            .build(kp)
    }

    #[test]
    fn transfer_moves_funds() {
        let (kp, sender, mirror) = setup(1_000);
        let recipient = Address::from_bytes(&[7u8; 20]).unwrap();
        let mut overlay = TxOverlay::new(&mirror);

        let effects = BankHandler
            .handle(&mut overlay, &transfer_tx(&kp, recipient, 400))
            .unwrap();
        assert_eq!(effects.transferred, 400);
        assert_eq!(overlay.account(&sender).balance, 600);
        assert_eq!(overlay.account(&recipient).balance, 400);
    }

    #[test]
    fn overdraft_rejected() {
        let (kp, sender, mirror) = setup(100);
        let recipient = Address::from_bytes(&[7u8; 20]).unwrap();
        let mut overlay = TxOverlay::new(&mirror);

        let err = BankHandler
            .handle(&mut overlay, &transfer_tx(&kp, recipient, 150))
            .unwrap_err();
        assert_eq!(err.kind(), "InsufficientFunds");
        assert_eq!(overlay.account(&sender).balance, 100);
    }

    #[test]
    fn zero_amount_rejected() {
        let (kp, _, mirror) = setup(100);
        let recipient = Address::from_bytes(&[7u8; 20]).unwrap();
        let mut overlay = TxOverlay::new(&mirror);

        let err = BankHandler
            .handle(&mut overlay, &transfer_tx(&kp, recipient, 0))
            .unwrap_err();
        assert_eq!(err.kind(), "Malformed");
    }

    #[test]
    fn garbage_payload_rejected() {
        let (kp, _, mirror) = setup(100);
        let mut overlay = TxOverlay::new(&mirror);
        let tx = TxBuilder::raw(crate::config::ROUTE_BANK, vec![0xDE, 0xAD]).build(&kp);
        let err = BankHandler.handle(&mut overlay, &tx).unwrap_err();
        assert_eq!(err.kind(), "Malformed");
    }

    #[test]
    fn self_transfer_is_a_no_op_on_balance() {
        // Nothing forbids sending to yourself; the debit and credit
        // cancel out.
        let (kp, sender, mirror) = setup(100);
        let mut overlay = TxOverlay::new(&mirror);
        BankHandler
            .handle(&mut overlay, &transfer_tx(&kp, sender, 30))
            .unwrap();
        assert_eq!(overlay.account(&sender).balance, 100);
    }
}
