//! Price-and-nonce ordering of pending transactions.

use primitive_types::U256;
use shared_types::{Address, SignedTransaction};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

/// Head of one sender's nonce-ordered queue.
#[derive(Debug)]
struct TxRef {
    gas_price: U256,
    /// Sender group, numbered by first appearance. Breaks price ties.
    sender: usize,
    idx: usize,
}

impl PartialEq for TxRef {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TxRef {}

impl PartialOrd for TxRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TxRef {
    fn cmp(&self, other: &Self) -> Ordering {
        self.gas_price
            .cmp(&other.gas_price)
            .then_with(|| other.sender.cmp(&self.sender))
    }
}

/// Order transactions so each sender's nonces ascend while the next
/// transaction overall is always the best-paying sender head.
pub fn sort_by_price_and_nonce(txs: Vec<SignedTransaction>) -> Vec<SignedTransaction> {
    if txs.len() < 2 {
        return txs;
    }

    // Group by sender, remembering first appearance
    let mut index: HashMap<Address, usize> = HashMap::new();
    let mut groups: Vec<Vec<SignedTransaction>> = Vec::new();
    for tx in txs {
        let slot = *index.entry(tx.sender()).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(tx);
    }
    for group in &mut groups {
        group.sort_by_key(|tx| tx.nonce);
    }

    let total = groups.iter().map(Vec::len).sum();
    let mut heap: BinaryHeap<TxRef> = groups
        .iter()
        .enumerate()
        .map(|(sender, group)| TxRef {
            gas_price: group[0].gas_price,
            sender,
            idx: 0,
        })
        .collect();

    let mut slots: Vec<Vec<Option<SignedTransaction>>> = groups
        .into_iter()
        .map(|group| group.into_iter().map(Some).collect())
        .collect();

    let mut ordered = Vec::with_capacity(total);
    while let Some(head) = heap.pop() {
        if let Some(tx) = slots[head.sender][head.idx].take() {
            ordered.push(tx);
        }
        let next = head.idx + 1;
        if let Some(Some(tx)) = slots[head.sender].get(next) {
            heap.push(TxRef {
                gas_price: tx.gas_price,
                sender: head.sender,
                idx: next,
            });
        }
    }
    ordered
}
