//! Deterministic chain generation for bootstrapping and tests.
//!
//! [`generate_chain`] builds `n` blocks on top of a parent, handing each one
//! to a callback that may add transactions, uncles and receipts before the
//! block is finalised. Every block is committed to the state database so
//! later blocks (and importers) can open its post-state.

use super::chain_config::ChainConfig;
use super::gas_pool::GasPool;
use crate::error::ChainMakerError;
use crate::ports::outbound::{ConsensusRules, ExecutionEnvironment, StateDatabase, StateView};
use shared_types::{Address, Block, BlockHeader, Receipt, SignedTransaction, ZERO_ADDRESS, ZERO_HASH};

/// Seconds between generated blocks.
pub const BLOCK_INTERVAL: u64 = 10;

/// Collaborators a generation run needs.
#[derive(Clone, Copy)]
pub struct ChainContext<'a> {
    /// Fork schedule
    pub config: &'a ChainConfig,
    /// Difficulty, gas limit and rewards
    pub rules: &'a dyn ConsensusRules,
    /// Applies generated transactions
    pub executor: &'a dyn ExecutionEnvironment,
    /// Where post-states are committed
    pub states: &'a dyn StateDatabase,
}

/// Builder for the block currently being generated.
pub struct BlockGen<'a> {
    index: usize,
    /// Immediate parent of this block
    parent: &'a Block,
    /// Parent of the first block of the run
    root: &'a Block,
    chain: &'a [Block],
    ctx: ChainContext<'a>,

    header: BlockHeader,
    state: Box<dyn StateView>,
    gas_pool: Option<GasPool>,
    txs: Vec<SignedTransaction>,
    receipts: Vec<Receipt>,
    uncles: Vec<BlockHeader>,
}

impl<'a> BlockGen<'a> {
    /// Set the reward beneficiary. Only once, and before any transaction.
    pub fn set_coinbase(&mut self, address: Address) -> Result<(), ChainMakerError> {
        if self.gas_pool.is_some() {
            if !self.txs.is_empty() {
                return Err(ChainMakerError::CoinbaseAfterTransactions);
            }
            return Err(ChainMakerError::CoinbaseAlreadySet);
        }
        self.header.coinbase = address;
        self.gas_pool = Some(GasPool::new(self.header.gas_limit));
        Ok(())
    }

    /// Set the header extra data.
    pub fn set_extra(&mut self, data: Vec<u8>) {
        self.header.extra_data = data;
    }

    /// Apply `tx` and include it. Without an explicit coinbase the zero
    /// address collects the fees.
    pub fn add_tx(&mut self, tx: SignedTransaction) -> Result<(), ChainMakerError> {
        if self.gas_pool.is_none() {
            self.set_coinbase(ZERO_ADDRESS)?;
        }
        let Some(gas_pool) = self.gas_pool.as_mut() else {
            return Err(ChainMakerError::CoinbaseAlreadySet);
        };

        self.state.start_record(tx.hash(), ZERO_HASH, self.txs.len());
        let (receipt, _logs) = self.ctx.executor.apply_transaction(
            self.ctx.config,
            &mut self.header,
            self.state.as_mut(),
            gas_pool,
            &tx,
        )?;
        self.txs.push(tx);
        self.receipts.push(receipt);
        Ok(())
    }

    /// Number of the block being generated.
    pub fn number(&self) -> u64 {
        self.header.number
    }

    /// Append a receipt without executing anything.
    pub fn add_unchecked_receipt(&mut self, receipt: Receipt) {
        self.receipts.push(receipt);
    }

    /// Next nonce of `address` in the generated state.
    pub fn tx_nonce(&self, address: &Address) -> Result<u64, ChainMakerError> {
        if !self.state.exists(address) {
            return Err(ChainMakerError::MissingAccount(*address));
        }
        Ok(self.state.nonce(address))
    }

    /// Reference `header` as an uncle.
    pub fn add_uncle(&mut self, header: BlockHeader) {
        self.uncles.push(header);
    }

    /// A block generated earlier in this run; `-1` is the parent of the
    /// first generated block.
    pub fn prev_block(&self, index: isize) -> Result<&Block, ChainMakerError> {
        let out_of_range = ChainMakerError::BlockIndexOutOfRange {
            index,
            len: self.index,
        };
        if index == -1 {
            return Ok(self.root);
        }
        match usize::try_from(index) {
            Ok(i) if i < self.index => self.chain.get(i).ok_or(out_of_range),
            _ => Err(out_of_range),
        }
    }

    /// Shift the timestamp by `seconds` and recompute the difficulty.
    pub fn offset_time(&mut self, seconds: i64) -> Result<(), ChainMakerError> {
        let time = self
            .header
            .timestamp
            .checked_add_signed(seconds)
            .ok_or(ChainMakerError::TimeOutOfRange)?;
        if time <= self.parent.header.timestamp {
            return Err(ChainMakerError::TimeOutOfRange);
        }
        self.header.timestamp = time;
        self.header.difficulty = self.ctx.rules.calc_difficulty(
            self.ctx.config,
            time,
            self.parent.header.timestamp,
            self.parent.header.number,
            self.parent.header.difficulty,
        );
        Ok(())
    }
}

/// Draft header of a generated child of `parent`.
pub fn make_header(ctx: &ChainContext<'_>, parent: &Block, state: &mut dyn StateView) -> BlockHeader {
    let timestamp = parent.header.timestamp + BLOCK_INTERVAL;
    BlockHeader {
        parent_hash: parent.hash(),
        coinbase: parent.header.coinbase,
        state_root: state.intermediate_root(false),
        difficulty: ctx.rules.calc_difficulty(
            ctx.config,
            timestamp,
            timestamp - BLOCK_INTERVAL,
            parent.header.number,
            parent.header.difficulty,
        ),
        number: parent.header.number + 1,
        gas_limit: ctx.rules.calc_gas_limit(parent),
        gas_used: 0,
        timestamp,
        ..BlockHeader::default()
    }
}

/// Generate `n` blocks on top of `parent`.
///
/// `gen` is called once per block with its index. Returns the blocks and
/// their receipts. A state commit failure aborts the run.
pub fn generate_chain<F>(
    ctx: &ChainContext<'_>,
    parent: &Block,
    n: usize,
    mut gen: F,
) -> Result<(Vec<Block>, Vec<Vec<Receipt>>), ChainMakerError>
where
    F: FnMut(usize, &mut BlockGen<'_>) -> Result<(), ChainMakerError>,
{
    let root = parent;
    let mut blocks: Vec<Block> = Vec::with_capacity(n);
    let mut receipts = Vec::with_capacity(n);
    let mut parent = root.clone();

    for index in 0..n {
        let mut state = ctx
            .states
            .open(parent.header.state_root)
            .map_err(ChainMakerError::MissingState)?;
        let header = make_header(ctx, &parent, state.as_mut());

        let mut block_gen = BlockGen {
            index,
            parent: &parent,
            root,
            chain: &blocks,
            ctx: *ctx,
            header,
            state,
            gas_pool: None,
            txs: Vec::new(),
            receipts: Vec::new(),
            uncles: Vec::new(),
        };
        gen(index, &mut block_gen)?;

        let BlockGen {
            mut header,
            mut state,
            txs,
            receipts: block_receipts,
            uncles,
            ..
        } = block_gen;

        ctx.rules
            .accumulate_rewards(ctx.config, state.as_mut(), &header, &uncles);
        header.state_root = state
            .commit(false)
            .map_err(ChainMakerError::StateCommit)?;

        let block = Block::new(header, txs, uncles, &block_receipts);
        blocks.push(block.clone());
        receipts.push(block_receipts);
        parent = block;
    }

    Ok((blocks, receipts))
}

/// `n` empty blocks whose coinbases encode `seed` and the block index.
pub fn make_block_chain(
    ctx: &ChainContext<'_>,
    parent: &Block,
    n: usize,
    seed: u8,
) -> Result<Vec<Block>, ChainMakerError> {
    let (blocks, _) = generate_chain(ctx, parent, n, |i, block| {
        let mut coinbase = ZERO_ADDRESS;
        coinbase[0] = seed;
        coinbase[19] = i as u8;
        block.set_coinbase(coinbase)
    })?;
    Ok(blocks)
}

/// Headers of [`make_block_chain`].
pub fn make_header_chain(
    ctx: &ChainContext<'_>,
    parent: &Block,
    n: usize,
    seed: u8,
) -> Result<Vec<BlockHeader>, ChainMakerError> {
    Ok(make_block_chain(ctx, parent, n, seed)?
        .into_iter()
        .map(|block| block.header)
        .collect())
}
