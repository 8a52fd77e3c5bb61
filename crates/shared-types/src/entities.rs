//! # Core Domain Entities
//!
//! Chain entities exchanged between the miner, the chain store, the
//! transaction pool and the execution environment.
//!
//! ## Identity
//!
//! Every entity is identified by the keccak-256 digest of its canonical
//! byte encoding (see [`BlockHeader::encode`]). Roots in the header are
//! ordered commitments over the contained items.

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};

use crate::bloom::Bloom;
use crate::hashing::{keccak256, ordered_root};

// Re-export U256 from primitive-types for use across all crates
pub use primitive_types::U256;

/// A 32-byte keccak digest.
pub type Hash = [u8; 32];

/// A 20-byte account address.
pub type Address = [u8; 20];

/// A 64-byte `r || s` transaction signature.
pub type Signature = [u8; 64];

/// The all-zero hash.
pub const ZERO_HASH: Hash = [0u8; 32];

/// The all-zero address.
pub const ZERO_ADDRESS: Address = [0u8; 20];

fn push_u256(buffer: &mut Vec<u8>, value: &U256) {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    buffer.extend_from_slice(&bytes);
}

fn push_bytes(buffer: &mut Vec<u8>, data: &[u8]) {
    buffer.extend_from_slice(&(data.len() as u64).to_be_bytes());
    buffer.extend_from_slice(data);
}

// =============================================================================
// HEADER
// =============================================================================

/// Block header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BlockHeader {
    /// Hash of the parent block.
    pub parent_hash: Hash,
    /// Commitment over the uncle headers.
    pub uncles_hash: Hash,
    /// Beneficiary of the block reward.
    pub coinbase: Address,
    /// State root after applying the block.
    pub state_root: Hash,
    /// Commitment over the transactions.
    pub transactions_root: Hash,
    /// Commitment over the receipts.
    pub receipts_root: Hash,
    /// Union of the receipts' blooms.
    pub logs_bloom: Bloom,
    /// Proof-of-work difficulty.
    pub difficulty: U256,
    /// Height in the chain.
    pub number: u64,
    /// Gas ceiling for the block.
    pub gas_limit: u64,
    /// Gas consumed by the included transactions.
    pub gas_used: u64,
    /// Unix timestamp (seconds).
    pub timestamp: u64,
    /// Free-form miner data.
    pub extra_data: Vec<u8>,
    /// Proof-of-work mix digest.
    pub mix_digest: Hash,
    /// Proof-of-work nonce.
    pub nonce: u64,
}

impl BlockHeader {
    /// Canonical encoding of the header without the seal fields.
    #[must_use]
    pub fn encode_unsealed(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(512 + self.extra_data.len());
        bytes.extend_from_slice(&self.parent_hash);
        bytes.extend_from_slice(&self.uncles_hash);
        bytes.extend_from_slice(&self.coinbase);
        bytes.extend_from_slice(&self.state_root);
        bytes.extend_from_slice(&self.transactions_root);
        bytes.extend_from_slice(&self.receipts_root);
        bytes.extend_from_slice(&self.logs_bloom.0);
        push_u256(&mut bytes, &self.difficulty);
        bytes.extend_from_slice(&self.number.to_be_bytes());
        bytes.extend_from_slice(&self.gas_limit.to_be_bytes());
        bytes.extend_from_slice(&self.gas_used.to_be_bytes());
        bytes.extend_from_slice(&self.timestamp.to_be_bytes());
        push_bytes(&mut bytes, &self.extra_data);
        bytes
    }

    /// Canonical encoding of the full header.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = self.encode_unsealed();
        bytes.extend_from_slice(&self.mix_digest);
        bytes.extend_from_slice(&self.nonce.to_be_bytes());
        bytes
    }

    /// Block hash.
    #[must_use]
    pub fn hash(&self) -> Hash {
        keccak256(&self.encode())
    }

    /// Hash the proof-of-work search runs over.
    #[must_use]
    pub fn seal_hash(&self) -> Hash {
        keccak256(&self.encode_unsealed())
    }
}

// =============================================================================
// TRANSACTIONS
// =============================================================================

/// A signed transaction whose sender has already been recovered.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    /// Sender address.
    pub from: Address,
    /// Recipient, `None` for contract creation.
    pub to: Option<Address>,
    /// Amount transferred.
    pub value: U256,
    /// Sender nonce.
    pub nonce: u64,
    /// Price offered per unit of gas.
    pub gas_price: U256,
    /// Gas ceiling for this transaction.
    pub gas_limit: u64,
    /// Call data.
    pub data: Vec<u8>,
    /// Recovery id. 27/28 for unprotected signatures, `chain_id * 2 + 35/36`
    /// for replay-protected ones.
    pub v: u64,
    /// `r || s`.
    #[serde_as(as = "Bytes")]
    pub signature: Signature,
}

impl Default for SignedTransaction {
    fn default() -> Self {
        Self {
            from: ZERO_ADDRESS,
            to: None,
            value: U256::zero(),
            nonce: 0,
            gas_price: U256::zero(),
            gas_limit: 0,
            data: Vec::new(),
            v: 27,
            signature: [0u8; 64],
        }
    }
}

impl SignedTransaction {
    /// Transaction hash.
    #[must_use]
    pub fn hash(&self) -> Hash {
        let mut bytes = Vec::with_capacity(256 + self.data.len());
        bytes.extend_from_slice(&self.from);
        match &self.to {
            Some(to) => {
                bytes.push(1);
                bytes.extend_from_slice(to);
            }
            None => bytes.push(0),
        }
        push_u256(&mut bytes, &self.value);
        bytes.extend_from_slice(&self.nonce.to_be_bytes());
        push_u256(&mut bytes, &self.gas_price);
        bytes.extend_from_slice(&self.gas_limit.to_be_bytes());
        push_bytes(&mut bytes, &self.data);
        bytes.extend_from_slice(&self.v.to_be_bytes());
        bytes.extend_from_slice(&self.signature);
        keccak256(&bytes)
    }

    /// Recovered sender.
    #[must_use]
    pub fn sender(&self) -> Address {
        self.from
    }

    /// Whether the signature commits to a chain id.
    #[must_use]
    pub fn is_protected(&self) -> bool {
        self.v != 27 && self.v != 28
    }

    /// Chain id the signature commits to, if protected.
    #[must_use]
    pub fn chain_id(&self) -> Option<u64> {
        if self.is_protected() && self.v >= 35 {
            Some((self.v - 35) / 2)
        } else {
            None
        }
    }

    /// Upper bound on what the sender pays: `value + gas_price * gas_limit`.
    #[must_use]
    pub fn cost(&self) -> U256 {
        self.value
            .saturating_add(self.gas_price.saturating_mul(U256::from(self.gas_limit)))
    }
}

// =============================================================================
// RECEIPTS AND LOGS
// =============================================================================

/// An event record emitted during transaction execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Log {
    /// Emitting account.
    pub address: Address,
    /// Indexed topics.
    pub topics: Vec<Hash>,
    /// Opaque payload.
    pub data: Vec<u8>,
    /// Number of the including block.
    pub block_number: u64,
    /// Hash of the emitting transaction.
    pub tx_hash: Hash,
    /// Position of the transaction in the block.
    pub tx_index: u32,
    /// Hash of the including block. Zero until the block is sealed.
    pub block_hash: Hash,
    /// Position of the log in the block.
    pub index: u32,
}

impl Log {
    fn encode_into(&self, bytes: &mut Vec<u8>) {
        bytes.extend_from_slice(&self.address);
        bytes.extend_from_slice(&(self.topics.len() as u64).to_be_bytes());
        for topic in &self.topics {
            bytes.extend_from_slice(topic);
        }
        push_bytes(bytes, &self.data);
    }
}

/// Post-execution status of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ReceiptStatus {
    /// Execution completed.
    #[default]
    Success,
    /// Execution failed; gas was still charged.
    Failed,
}

/// Outcome record of one included transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Receipt {
    /// Hash of the transaction.
    pub tx_hash: Hash,
    /// Post-execution status.
    pub status: ReceiptStatus,
    /// Gas consumed by the block up to and including this transaction.
    pub cumulative_gas_used: u64,
    /// Gas consumed by this transaction.
    pub gas_used: u64,
    /// Logs emitted by this transaction.
    pub logs: Vec<Log>,
    /// Bloom over `logs`.
    pub bloom: Bloom,
}

impl Receipt {
    /// Build a receipt, deriving the bloom from `logs`.
    #[must_use]
    pub fn new(
        tx_hash: Hash,
        status: ReceiptStatus,
        cumulative_gas_used: u64,
        gas_used: u64,
        logs: Vec<Log>,
    ) -> Self {
        let bloom = Bloom::from_logs(&logs);
        Self {
            tx_hash,
            status,
            cumulative_gas_used,
            gas_used,
            logs,
            bloom,
        }
    }

    /// Consensus hash of the receipt. Block-placement fields of the logs
    /// are not covered.
    #[must_use]
    pub fn hash(&self) -> Hash {
        let mut bytes = Vec::with_capacity(512);
        bytes.push(match self.status {
            ReceiptStatus::Success => 1,
            ReceiptStatus::Failed => 0,
        });
        bytes.extend_from_slice(&self.cumulative_gas_used.to_be_bytes());
        bytes.extend_from_slice(&self.bloom.0);
        for log in &self.logs {
            log.encode_into(&mut bytes);
        }
        keccak256(&bytes)
    }
}

// =============================================================================
// BLOCK
// =============================================================================

/// A block: header, transactions and uncle headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Block {
    /// The header.
    pub header: BlockHeader,
    /// Included transactions, in execution order.
    pub transactions: Vec<SignedTransaction>,
    /// Referenced uncle headers.
    pub uncles: Vec<BlockHeader>,
}

impl Block {
    /// Assemble a block, deriving the transaction, receipt and uncle roots
    /// and the logs bloom from the contents.
    #[must_use]
    pub fn new(
        mut header: BlockHeader,
        transactions: Vec<SignedTransaction>,
        uncles: Vec<BlockHeader>,
        receipts: &[Receipt],
    ) -> Self {
        header.transactions_root = ordered_root(transactions.iter().map(SignedTransaction::hash));
        header.receipts_root = ordered_root(receipts.iter().map(Receipt::hash));
        header.uncles_hash = ordered_root(uncles.iter().map(BlockHeader::hash));
        let mut bloom = Bloom::default();
        for receipt in receipts {
            bloom.accrue_bloom(&receipt.bloom);
        }
        header.logs_bloom = bloom;
        Self {
            header,
            transactions,
            uncles,
        }
    }

    /// A body-less block carrying `header` as-is.
    #[must_use]
    pub fn with_header(header: BlockHeader) -> Self {
        Self {
            header,
            transactions: Vec::new(),
            uncles: Vec::new(),
        }
    }

    /// Copy of this block with the proof-of-work seal applied.
    #[must_use]
    pub fn with_seal(&self, nonce: u64, mix_digest: Hash) -> Self {
        let mut sealed = self.clone();
        sealed.header.nonce = nonce;
        sealed.header.mix_digest = mix_digest;
        sealed
    }

    /// Block hash.
    #[must_use]
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    /// Block number.
    #[must_use]
    pub fn number(&self) -> u64 {
        self.header.number
    }

    /// Parent hash.
    #[must_use]
    pub fn parent_hash(&self) -> Hash {
        self.header.parent_hash
    }

    /// Reward beneficiary.
    #[must_use]
    pub fn coinbase(&self) -> Address {
        self.header.coinbase
    }

    /// Timestamp.
    #[must_use]
    pub fn timestamp(&self) -> u64 {
        self.header.timestamp
    }

    /// Difficulty.
    #[must_use]
    pub fn difficulty(&self) -> U256 {
        self.header.difficulty
    }
}
