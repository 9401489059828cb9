//! # Per-Transaction Staging Overlay
//!
//! Handler execution is all-or-nothing: every mutation a transaction
//! makes — ante fee, sequence bump, new accounts, new cids, new links —
//! is staged in a [`TxOverlay`] layered over the read-only mirror.
//! Reads see staged writes first, then fall through to the mirror, so a
//! handler can register a cid and immediately link it. On success the
//! overlay collapses into [`StagedWrites`] that the lifecycle controller
//! applies to mirror and stores; on failure it is simply dropped.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::StateError;
use crate::graph::{Cid, CidNumber};
use crate::ledger::{Account, Address};
use crate::mirror::StateMirror;

/// Staging overlay over the mirror for a single transaction.
pub struct TxOverlay<'a> {
    mirror: &'a StateMirror,
    accounts: BTreeMap<Address, Account>,
    staged_cids: Vec<Cid>,
    staged_cid_numbers: HashMap<Cid, CidNumber>,
    staged_links: Vec<(CidNumber, CidNumber)>,
    staged_link_set: HashSet<(CidNumber, CidNumber)>,
}

impl<'a> TxOverlay<'a> {
    pub fn new(mirror: &'a StateMirror) -> Self {
        Self {
            mirror,
            accounts: BTreeMap::new(),
            staged_cids: Vec::new(),
            staged_cid_numbers: HashMap::new(),
            staged_links: Vec::new(),
            staged_link_set: HashSet::new(),
        }
    }

    // -- Accounts -----------------------------------------------------------

    /// Current account state: staged if written this transaction,
    /// otherwise the mirror's committed view, otherwise empty.
    pub fn account(&self, address: &Address) -> Account {
        if let Some(staged) = self.accounts.get(address) {
            return staged.clone();
        }
        self.mirror.account(address).cloned().unwrap_or_default()
    }

    /// Sequence of the last applied transaction from an address.
    pub fn sequence(&self, address: &Address) -> u64 {
        self.account(address).sequence
    }

    /// Stage a credit.
    pub fn credit(&mut self, address: &Address, amount: u64) -> Result<(), StateError> {
        let mut account = self.account(address);
        account.balance = account
            .balance
            .checked_add(amount)
            .ok_or_else(|| StateError::Internal(format!("balance overflow for {address}")))?;
        self.accounts.insert(*address, account);
        Ok(())
    }

    /// Stage a debit; `InsufficientFunds` if the (staged) balance cannot
    /// cover it.
    pub fn debit(&mut self, address: &Address, amount: u64) -> Result<(), StateError> {
        let mut account = self.account(address);
        if account.balance < amount {
            return Err(StateError::InsufficientFunds {
                address: address.to_hex(),
                available: account.balance,
                required: amount,
            });
        }
        account.balance -= amount;
        self.accounts.insert(*address, account);
        Ok(())
    }

    /// Stage the sequence increment that marks this transaction applied.
    pub fn bump_sequence(&mut self, address: &Address) {
        let mut account = self.account(address);
        account.sequence += 1;
        self.accounts.insert(*address, account);
    }

    // -- Content index ------------------------------------------------------

    /// Resolve a cid to its dense id, staging a registration if the cid
    /// is unseen in both the mirror and this overlay. Idempotent within
    /// the transaction.
    pub fn resolve(&mut self, cid: &Cid) -> CidNumber {
        if let Some(id) = self.mirror.cid_number(cid) {
            return id;
        }
        if let Some(id) = self.staged_cid_numbers.get(cid) {
            return *id;
        }
        let id = self.mirror.cid_count() + self.staged_cids.len() as u64;
        self.staged_cid_numbers.insert(cid.clone(), id);
        self.staged_cids.push(cid.clone());
        id
    }

    /// Cids registered so far by this transaction.
    pub fn cids_registered(&self) -> u64 {
        self.staged_cids.len() as u64
    }

    // -- Link graph ---------------------------------------------------------

    /// Whether the ordered pair exists, committed or staged.
    pub fn has_link(&self, from: CidNumber, to: CidNumber) -> bool {
        self.mirror.has_link(from, to) || self.staged_link_set.contains(&(from, to))
    }

    /// Stage a new edge; `LinkAlreadyExists` if the pair is present in
    /// committed state or earlier in this same transaction.
    pub fn create_link(&mut self, from: CidNumber, to: CidNumber) -> Result<(), StateError> {
        if self.has_link(from, to) {
            return Err(StateError::LinkAlreadyExists { from, to });
        }
        self.staged_link_set.insert((from, to));
        self.staged_links.push((from, to));
        Ok(())
    }

    /// Links staged so far by this transaction.
    pub fn links_created(&self) -> u64 {
        self.staged_links.len() as u64
    }

    // -- Collapse -----------------------------------------------------------

    /// Consume the overlay into its write set. Accounts come out in
    /// address order, cids in allocation order, links in creation order
    /// — all deterministic.
    pub fn into_writes(self) -> StagedWrites {
        StagedWrites {
            first_cid_number: self.mirror.cid_count(),
            accounts: self.accounts,
            cids: self.staged_cids,
            links: self.staged_links,
        }
    }
}

/// The deterministic write set of an accepted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedWrites {
    /// Dense id of the first staged cid; the i-th entry of `cids` gets
    /// `first_cid_number + i`.
    pub first_cid_number: CidNumber,
    pub accounts: BTreeMap<Address, Account>,
    pub cids: Vec<Cid>,
    pub links: Vec<(CidNumber, CidNumber)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::from_bytes(&[byte; 20]).unwrap()
    }

    fn cid(raw: &str) -> Cid {
        Cid::new(raw).unwrap()
    }

    #[test]
    fn reads_fall_through_to_mirror() {
        let mut mirror = StateMirror::new();
        mirror.put_account(addr(1), Account::with_balance(100));
        let overlay = TxOverlay::new(&mirror);
        assert_eq!(overlay.account(&addr(1)).balance, 100);
        assert_eq!(overlay.account(&addr(2)).balance, 0);
    }

    #[test]
    fn staged_writes_shadow_mirror() {
        let mut mirror = StateMirror::new();
        mirror.put_account(addr(1), Account::with_balance(100));
        let mut overlay = TxOverlay::new(&mirror);
        overlay.debit(&addr(1), 40).unwrap();
        assert_eq!(overlay.account(&addr(1)).balance, 60);
        // The mirror itself is untouched until the overlay is applied.
        assert_eq!(mirror.balance(&addr(1)), 100);
    }

    #[test]
    fn debit_checks_staged_balance() {
        let mut mirror = StateMirror::new();
        mirror.put_account(addr(1), Account::with_balance(100));
        let mut overlay = TxOverlay::new(&mirror);
        overlay.debit(&addr(1), 80).unwrap();
        assert_eq!(
            overlay.debit(&addr(1), 30).unwrap_err().kind(),
            "InsufficientFunds"
        );
    }

    #[test]
    fn resolve_continues_mirror_numbering() {
        let mut mirror = StateMirror::new();
        mirror.register_cid(cid("committed"));
        let mut overlay = TxOverlay::new(&mirror);

        assert_eq!(overlay.resolve(&cid("committed")), 0);
        assert_eq!(overlay.resolve(&cid("fresh-a")), 1);
        assert_eq!(overlay.resolve(&cid("fresh-b")), 2);
        // Idempotent within the transaction.
        assert_eq!(overlay.resolve(&cid("fresh-a")), 1);
        assert_eq!(overlay.cids_registered(), 2);
    }

    #[test]
    fn create_link_sees_committed_and_staged_duplicates() {
        let mut mirror = StateMirror::new();
        let a = mirror.register_cid(cid("a"));
        let b = mirror.register_cid(cid("b"));
        mirror.insert_link(a, b);

        let mut overlay = TxOverlay::new(&mirror);
        assert_eq!(
            overlay.create_link(a, b).unwrap_err().kind(),
            "LinkAlreadyExists"
        );
        overlay.create_link(b, a).unwrap();
        assert_eq!(
            overlay.create_link(b, a).unwrap_err().kind(),
            "LinkAlreadyExists"
        );
    }

    #[test]
    fn into_writes_preserves_order() {
        let mut mirror = StateMirror::new();
        mirror.register_cid(cid("seed"));
        let mut overlay = TxOverlay::new(&mirror);

        overlay.credit(&addr(2), 10).unwrap();
        overlay.credit(&addr(1), 20).unwrap();
        let x = overlay.resolve(&cid("x"));
        let y = overlay.resolve(&cid("y"));
        overlay.create_link(x, y).unwrap();

        let writes = overlay.into_writes();
        assert_eq!(writes.first_cid_number, 1);
        assert_eq!(writes.cids, vec![cid("x"), cid("y")]);
        assert_eq!(writes.links, vec![(1, 2)]);
        // BTreeMap iterates in address order regardless of write order.
        let addrs: Vec<_> = writes.accounts.keys().copied().collect();
        assert_eq!(addrs, vec![addr(1), addr(2)]);
    }
}
