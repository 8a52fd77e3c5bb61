//! In-memory account state.
//!
//! [`MemoryStateDb`] keeps every committed state keyed by its root so any
//! historical block can be reopened. [`MemoryState`] is a mutable view with
//! a change journal for snapshots.

use crate::error::StateError;
use crate::ports::outbound::{StateDatabase, StateView};
use parking_lot::RwLock;
use primitive_types::U256;
use shared_types::{empty_root, keccak256, Address, Hash, Log};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct Account {
    balance: U256,
    nonce: u64,
}

impl Account {
    fn is_empty(&self) -> bool {
        self.balance.is_zero() && self.nonce == 0
    }
}

type Accounts = BTreeMap<Address, Account>;

fn state_root(accounts: &Accounts) -> Hash {
    if accounts.is_empty() {
        return empty_root();
    }
    let mut bytes = Vec::with_capacity(accounts.len() * 60);
    let mut balance = [0u8; 32];
    for (address, account) in accounts {
        account.balance.to_big_endian(&mut balance);
        bytes.extend_from_slice(address);
        bytes.extend_from_slice(&balance);
        bytes.extend_from_slice(&account.nonce.to_be_bytes());
    }
    keccak256(&bytes)
}

/// Committed states by root. Clones share storage.
#[derive(Clone, Default)]
pub struct MemoryStateDb {
    roots: Arc<RwLock<HashMap<Hash, Accounts>>>,
    fail_commits: Arc<AtomicBool>,
}

impl MemoryStateDb {
    /// Empty database. The empty root always opens.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent commit fail (or succeed again).
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Whether a state is stored under `root`.
    pub fn contains(&self, root: &Hash) -> bool {
        *root == empty_root() || self.roots.read().contains_key(root)
    }

    /// Number of stored states.
    pub fn len(&self) -> usize {
        self.roots.read().len()
    }

    /// Whether nothing was committed yet.
    pub fn is_empty(&self) -> bool {
        self.roots.read().is_empty()
    }

    fn store(&self, root: Hash, accounts: Accounts) -> Result<(), StateError> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(StateError::Commit("state database rejected the write".into()));
        }
        self.roots.write().insert(root, accounts);
        Ok(())
    }
}

impl std::fmt::Debug for MemoryStateDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStateDb")
            .field("roots", &self.len())
            .finish()
    }
}

impl StateDatabase for MemoryStateDb {
    fn open(&self, root: Hash) -> Result<Box<dyn StateView>, StateError> {
        let accounts = match self.roots.read().get(&root) {
            Some(accounts) => accounts.clone(),
            None if root == empty_root() => Accounts::new(),
            None => return Err(StateError::MissingRoot(root)),
        };
        Ok(Box::new(MemoryState::new(self.clone(), accounts)))
    }
}

#[derive(Clone, Debug)]
enum JournalEntry {
    Account {
        address: Address,
        prev: Option<Account>,
    },
    Log,
}

/// Mutable state view over a [`MemoryStateDb`].
#[derive(Clone, Debug)]
pub struct MemoryState {
    db: MemoryStateDb,
    accounts: Accounts,
    journal: Vec<JournalEntry>,
    snapshots: Vec<usize>,
    logs: Vec<Log>,

    tx_hash: Hash,
    block_hash: Hash,
    tx_index: usize,
}

impl MemoryState {
    fn new(db: MemoryStateDb, accounts: Accounts) -> Self {
        Self {
            db,
            accounts,
            journal: Vec::new(),
            snapshots: Vec::new(),
            logs: Vec::new(),
            tx_hash: [0u8; 32],
            block_hash: [0u8; 32],
            tx_index: 0,
        }
    }

    fn account_mut(&mut self, address: &Address) -> &mut Account {
        self.journal.push(JournalEntry::Account {
            address: *address,
            prev: self.accounts.get(address).cloned(),
        });
        self.accounts.entry(*address).or_default()
    }

    fn delete_empty(&mut self) {
        self.accounts.retain(|_, account| !account.is_empty());
    }
}

impl StateView for MemoryState {
    fn snapshot(&mut self) -> usize {
        self.snapshots.push(self.journal.len());
        self.snapshots.len() - 1
    }

    fn revert_to_snapshot(&mut self, id: usize) {
        let Some(&mark) = self.snapshots.get(id) else {
            return;
        };
        while self.journal.len() > mark {
            match self.journal.pop() {
                Some(JournalEntry::Account { address, prev }) => match prev {
                    Some(account) => {
                        self.accounts.insert(address, account);
                    }
                    None => {
                        self.accounts.remove(&address);
                    }
                },
                Some(JournalEntry::Log) => {
                    self.logs.pop();
                }
                None => break,
            }
        }
        self.snapshots.truncate(id);
    }

    fn start_record(&mut self, tx_hash: Hash, block_hash: Hash, tx_index: usize) {
        self.tx_hash = tx_hash;
        self.block_hash = block_hash;
        self.tx_index = tx_index;
    }

    fn add_log(&mut self, mut log: Log) -> Log {
        log.tx_hash = self.tx_hash;
        log.block_hash = self.block_hash;
        log.tx_index = self.tx_index as u32;
        log.index = self.logs.len() as u32;
        self.logs.push(log.clone());
        self.journal.push(JournalEntry::Log);
        log
    }

    fn logs(&self) -> Vec<Log> {
        self.logs.clone()
    }

    fn tx_logs(&self, tx_hash: &Hash) -> Vec<Log> {
        self.logs
            .iter()
            .filter(|log| log.tx_hash == *tx_hash)
            .cloned()
            .collect()
    }

    fn exists(&self, address: &Address) -> bool {
        self.accounts.contains_key(address)
    }

    fn balance(&self, address: &Address) -> U256 {
        self.accounts
            .get(address)
            .map(|account| account.balance)
            .unwrap_or_default()
    }

    fn add_balance(&mut self, address: &Address, amount: U256) {
        let account = self.account_mut(address);
        account.balance = account.balance.saturating_add(amount);
    }

    fn sub_balance(&mut self, address: &Address, amount: U256) {
        let account = self.account_mut(address);
        account.balance = account.balance.saturating_sub(amount);
    }

    fn nonce(&self, address: &Address) -> u64 {
        self.accounts
            .get(address)
            .map(|account| account.nonce)
            .unwrap_or_default()
    }

    fn set_nonce(&mut self, address: &Address, nonce: u64) {
        self.account_mut(address).nonce = nonce;
    }

    fn intermediate_root(&mut self, delete_empty: bool) -> Hash {
        if delete_empty {
            self.delete_empty();
        }
        state_root(&self.accounts)
    }

    fn commit(&mut self, delete_empty: bool) -> Result<Hash, StateError> {
        if delete_empty {
            self.delete_empty();
        }
        let root = state_root(&self.accounts);
        self.db.store(root, self.accounts.clone())?;
        self.journal.clear();
        self.snapshots.clear();
        debug!(root = %hex::encode(&root[..4]), accounts = self.accounts.len(), "[miner] state committed");
        Ok(root)
    }

    fn copy(&self) -> Box<dyn StateView> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: Address = [1u8; 20];
    const B: Address = [2u8; 20];

    fn fresh() -> (MemoryStateDb, Box<dyn StateView>) {
        let db = MemoryStateDb::new();
        let state = db.open(empty_root()).unwrap();
        (db, state)
    }

    #[test]
    fn test_nested_snapshots_revert() {
        let (_db, mut state) = fresh();
        state.add_balance(&A, U256::from(10));
        let outer = state.snapshot();
        state.add_balance(&A, U256::from(5));
        let _inner = state.snapshot();
        state.set_nonce(&B, 3);

        state.revert_to_snapshot(outer);
        assert_eq!(state.balance(&A), U256::from(10));
        assert!(!state.exists(&B));
    }

    #[test]
    fn test_revert_drops_logs() {
        let (_db, mut state) = fresh();
        state.start_record([9u8; 32], [0u8; 32], 2);
        let snap = state.snapshot();
        let log = state.add_log(Log::default());
        assert_eq!(log.tx_hash, [9u8; 32]);
        assert_eq!(log.tx_index, 2);
        assert_eq!(state.tx_logs(&[9u8; 32]).len(), 1);

        state.revert_to_snapshot(snap);
        assert!(state.logs().is_empty());
    }

    #[test]
    fn test_commit_then_reopen() {
        let (db, mut state) = fresh();
        state.add_balance(&A, U256::from(7));
        state.set_nonce(&A, 1);
        let root = state.commit(false).unwrap();

        assert_ne!(root, empty_root());
        assert!(db.contains(&root));
        let reopened = db.open(root).unwrap();
        assert_eq!(reopened.balance(&A), U256::from(7));
        assert_eq!(reopened.nonce(&A), 1);
    }

    #[test]
    fn test_intermediate_root_matches_commit() {
        let (_db, mut state) = fresh();
        state.add_balance(&A, U256::from(7));
        let intermediate = state.intermediate_root(false);
        assert_eq!(state.commit(false).unwrap(), intermediate);
    }

    #[test]
    fn test_delete_empty_accounts() {
        let (_db, mut state) = fresh();
        state.add_balance(&A, U256::zero());
        assert!(state.exists(&A));
        assert_eq!(state.intermediate_root(true), empty_root());
        assert!(!state.exists(&A));
    }

    #[test]
    fn test_missing_root() {
        let db = MemoryStateDb::new();
        assert!(matches!(
            db.open([5u8; 32]),
            Err(StateError::MissingRoot(_))
        ));
    }

    #[test]
    fn test_failed_commit() {
        let (db, mut state) = fresh();
        db.fail_commits(true);
        state.add_balance(&A, U256::one());
        assert!(matches!(state.commit(false), Err(StateError::Commit(_))));
        assert!(db.is_empty());
    }

    #[test]
    fn test_copy_is_independent() {
        let (_db, mut state) = fresh();
        state.add_balance(&A, U256::one());
        let mut copy = state.copy();
        copy.add_balance(&A, U256::one());
        assert_eq!(state.balance(&A), U256::one());
        assert_eq!(copy.balance(&A), U256::from(2));
    }
}
