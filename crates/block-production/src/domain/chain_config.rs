//! Chain configuration: an ordered list of protocol forks.
//!
//! A fork activates at a block number and carries named features with
//! free-form options. Rules are looked up by asking which features are
//! active at a given height.
//!
//! ```json
//! {
//!   "chain_id": 61,
//!   "forks": [
//!     { "name": "Homestead", "block": 0,
//!       "features": [{ "id": "difficulty", "options": { "type": "homestead" } }] },
//!     { "name": "Diehard", "block": 3000000,
//!       "features": [{ "id": "eip155", "options": { "chainID": 61 } }] }
//!   ]
//! }
//! ```

use crate::error::Result;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Feature id that turns on replay-protected signatures.
pub const REPLAY_PROTECTION_FEATURE: &str = "eip155";

/// A named feature switched on by a fork.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ForkFeature {
    /// Feature identifier
    pub id: String,
    /// Feature options
    #[serde(default)]
    pub options: BTreeMap<String, Value>,
}

impl ForkFeature {
    /// Integer option, if present.
    pub fn u64_option(&self, key: &str) -> Option<u64> {
        self.options.get(key).and_then(Value::as_u64)
    }

    /// String option, if present.
    pub fn str_option(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(Value::as_str)
    }
}

/// A protocol fork.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Fork {
    /// Fork name
    pub name: String,
    /// Activation block
    pub block: u64,
    /// Features switched on at activation
    #[serde(default)]
    pub features: Vec<ForkFeature>,
}

/// Ordered fork schedule. Immutable once built.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ChainConfig {
    /// Default chain id for replay-protected signatures
    #[serde(default)]
    pub chain_id: u64,
    forks: Vec<Fork>,
}

impl Default for ChainConfig {
    /// Homestead rules from genesis, no replay protection.
    fn default() -> Self {
        let mut options = BTreeMap::new();
        options.insert("type".to_string(), Value::from("homestead"));
        Self::new(
            1,
            vec![Fork {
                name: "Homestead".into(),
                block: 0,
                features: vec![ForkFeature {
                    id: "difficulty".into(),
                    options,
                }],
            }],
        )
    }
}

impl ChainConfig {
    /// Build a schedule, ordering forks by activation block.
    pub fn new(chain_id: u64, mut forks: Vec<Fork>) -> Self {
        forks.sort_by_key(|fork| fork.block);
        Self { chain_id, forks }
    }

    /// Parse a JSON schedule.
    pub fn from_json(json: &str) -> Result<Self> {
        let parsed: ChainConfig = serde_json::from_str(json)?;
        Ok(Self::new(parsed.chain_id, parsed.forks))
    }

    /// Read and parse a JSON schedule from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Same schedule with one more fork.
    pub fn with_fork(mut self, fork: Fork) -> Self {
        self.forks.push(fork);
        Self::new(self.chain_id, self.forks)
    }

    /// Forks in activation order.
    pub fn forks(&self) -> &[Fork] {
        &self.forks
    }

    /// Whether the fork called `name` is active at `number`.
    pub fn is_fork_active(&self, name: &str, number: u64) -> bool {
        self.forks
            .iter()
            .any(|fork| fork.name == name && fork.block <= number)
    }

    /// Most recently activated feature `id` at `number`.
    pub fn feature(&self, id: &str, number: u64) -> Option<&ForkFeature> {
        self.forks
            .iter()
            .rev()
            .filter(|fork| fork.block <= number)
            .find_map(|fork| fork.features.iter().find(|feature| feature.id == id))
    }

    /// Whether feature `id` is active at `number`.
    pub fn has_feature(&self, id: &str, number: u64) -> bool {
        self.feature(id, number).is_some()
    }

    /// Whether replay-protected signatures are accepted at `number`.
    pub fn is_replay_protected(&self, number: u64) -> bool {
        self.has_feature(REPLAY_PROTECTION_FEATURE, number)
    }

    /// Chain id signatures must commit to at `number`.
    pub fn chain_id_at(&self, number: u64) -> u64 {
        self.feature(REPLAY_PROTECTION_FEATURE, number)
            .and_then(|feature| feature.u64_option("chainID"))
            .unwrap_or(self.chain_id)
    }
}
