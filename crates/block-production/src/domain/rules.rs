//! Default consensus rules: difficulty adjustment, gas-limit drift, block
//! rewards and header validation.
//!
//! Difficulty is an absolute work measure here: HIGHER difficulty = HARDER.
//! Each block moves it by at most `parent / difficulty_bound_divisor` per
//! step, never below the configured floor.

use super::chain_config::ChainConfig;
use crate::config::{RulesConfig, MAX_EXTRA_DATA};
use crate::error::{HeaderError, Result};
use crate::ports::outbound::{ConsensusRules, StateView};
use primitive_types::U256;
use shared_types::{Block, BlockHeader};

/// Rules driven by [`RulesConfig`].
#[derive(Clone, Debug, Default)]
pub struct DefaultRules {
    config: RulesConfig,
}

impl DefaultRules {
    /// Rules with the given parameters, rejected if they cannot be applied.
    pub fn new(config: RulesConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Parameters in use.
    pub fn config(&self) -> &RulesConfig {
        &self.config
    }

    /// Homestead step: `1 - elapsed / 10` adjustment units, at most 99 down.
    fn homestead_difficulty(&self, time: u64, parent_time: u64, parent_difficulty: U256) -> U256 {
        let adjust = parent_difficulty / U256::from(self.config.difficulty_bound_divisor);
        let elapsed = time.saturating_sub(parent_time);
        let factor = 1i64 - (elapsed / 10).min(100) as i64;
        let factor = factor.max(-99);

        if factor >= 0 {
            parent_difficulty.saturating_add(adjust.saturating_mul(U256::from(factor as u64)))
        } else {
            parent_difficulty.saturating_sub(adjust.saturating_mul(U256::from(factor.unsigned_abs())))
        }
    }

    /// Frontier step: one unit up below the duration limit, one down above.
    fn frontier_difficulty(&self, time: u64, parent_time: u64, parent_difficulty: U256) -> U256 {
        let adjust = parent_difficulty / U256::from(self.config.difficulty_bound_divisor);
        if time.saturating_sub(parent_time) < self.config.duration_limit {
            parent_difficulty.saturating_add(adjust)
        } else {
            parent_difficulty.saturating_sub(adjust)
        }
    }
}

impl ConsensusRules for DefaultRules {
    fn calc_difficulty(
        &self,
        config: &ChainConfig,
        time: u64,
        parent_time: u64,
        parent_number: u64,
        parent_difficulty: U256,
    ) -> U256 {
        let kind = config
            .feature("difficulty", parent_number + 1)
            .and_then(|feature| feature.str_option("type"))
            .unwrap_or("homestead");

        let next = match kind {
            "frontier" => self.frontier_difficulty(time, parent_time, parent_difficulty),
            _ => self.homestead_difficulty(time, parent_time, parent_difficulty),
        };
        next.max(self.config.minimum_difficulty)
    }

    fn calc_gas_limit(&self, parent: &Block) -> u64 {
        let divisor = self.config.gas_limit_bound_divisor;
        let parent_limit = parent.header.gas_limit;

        // Usage above two thirds of the limit pushes it up, the decay pulls
        // it down.
        let contrib = (parent.header.gas_used.saturating_mul(3) / 2) / divisor;
        let decay = (parent_limit / divisor).saturating_sub(1);

        let mut limit = parent_limit.saturating_sub(decay).saturating_add(contrib);
        if limit < self.config.min_gas_limit {
            limit = self.config.min_gas_limit;
        }
        // Drift towards the target while under it.
        if limit < self.config.target_gas_limit {
            limit = parent_limit
                .saturating_add(decay)
                .min(self.config.target_gas_limit);
        }
        limit
    }

    fn accumulate_rewards(
        &self,
        _config: &ChainConfig,
        state: &mut dyn StateView,
        header: &BlockHeader,
        uncles: &[BlockHeader],
    ) {
        let block_reward = self.config.block_reward;
        let mut reward = block_reward;
        let eight = U256::from(8u64);

        for uncle in uncles {
            let distance = (uncle.number + 8).saturating_sub(header.number);
            let uncle_reward = U256::from(distance).saturating_mul(block_reward) / eight;
            state.add_balance(&uncle.coinbase, uncle_reward);
            reward = reward.saturating_add(block_reward / U256::from(32u64));
        }
        state.add_balance(&header.coinbase, reward);
    }

    fn validate_header(
        &self,
        config: &ChainConfig,
        header: &BlockHeader,
        parent: &BlockHeader,
        now: u64,
    ) -> std::result::Result<(), HeaderError> {
        if header.parent_hash != parent.hash() {
            return Err(HeaderError::UnknownParent(header.parent_hash));
        }
        if header.extra_data.len() > MAX_EXTRA_DATA {
            return Err(HeaderError::ExtraDataTooLong {
                len: header.extra_data.len(),
                max: MAX_EXTRA_DATA,
            });
        }
        if header.number != parent.number + 1 {
            return Err(HeaderError::InvalidNumber {
                have: header.number,
                want: parent.number + 1,
            });
        }
        if header.timestamp <= parent.timestamp {
            return Err(HeaderError::InvalidTimestamp {
                time: header.timestamp,
                parent_time: parent.timestamp,
            });
        }

        let want = self.calc_difficulty(
            config,
            header.timestamp,
            parent.timestamp,
            parent.number,
            parent.difficulty,
        );
        if header.difficulty != want {
            return Err(HeaderError::InvalidDifficulty {
                have: header.difficulty,
                want,
            });
        }

        if header.gas_used > header.gas_limit {
            return Err(HeaderError::GasUsedExceedsLimit {
                used: header.gas_used,
                limit: header.gas_limit,
            });
        }

        let bound = parent.gas_limit / self.config.gas_limit_bound_divisor;
        if header.gas_limit.abs_diff(parent.gas_limit) >= bound
            || header.gas_limit < self.config.min_gas_limit
        {
            return Err(HeaderError::InvalidGasLimit {
                have: header.gas_limit,
                parent: parent.gas_limit,
            });
        }

        if header.timestamp > now + self.config.allowed_future_secs {
            return Err(HeaderError::FutureBlock {
                time: header.timestamp,
                now,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryStateDb;
    use crate::domain::chain_config::{Fork, ForkFeature};
    use crate::ports::StateDatabase;
    use shared_types::empty_root;

    fn rules() -> DefaultRules {
        DefaultRules::default()
    }

    fn parent_header() -> BlockHeader {
        BlockHeader {
            number: 10,
            timestamp: 1_000,
            difficulty: U256::from(1_000_000u64),
            gas_limit: 5_000_000,
            ..BlockHeader::default()
        }
    }

    fn valid_child(parent: &BlockHeader) -> BlockHeader {
        let config = ChainConfig::default();
        let timestamp = parent.timestamp + 12;
        BlockHeader {
            parent_hash: parent.hash(),
            number: parent.number + 1,
            timestamp,
            difficulty: rules().calc_difficulty(
                &config,
                timestamp,
                parent.timestamp,
                parent.number,
                parent.difficulty,
            ),
            gas_limit: parent.gas_limit,
            ..BlockHeader::default()
        }
    }

    #[test]
    fn test_fast_block_raises_difficulty() {
        let config = ChainConfig::default();
        let parent = U256::from(2_048_000u64);
        let next = rules().calc_difficulty(&config, 1_005, 1_000, 1, parent);
        assert_eq!(next, parent + U256::from(1_000u64));
    }

    #[test]
    fn test_slow_block_lowers_difficulty() {
        let config = ChainConfig::default();
        let parent = U256::from(2_048_000u64);
        // 35s elapsed: factor 1 - 3 = -2
        let next = rules().calc_difficulty(&config, 1_035, 1_000, 1, parent);
        assert_eq!(next, parent - U256::from(2_000u64));
    }

    #[test]
    fn test_difficulty_never_below_minimum() {
        let config = ChainConfig::default();
        let next = rules().calc_difficulty(&config, 10_000, 0, 1, U256::from(131_072u64));
        assert_eq!(next, U256::from(131_072u64));
    }

    #[test]
    fn test_frontier_rule_from_config() {
        let mut options = std::collections::BTreeMap::new();
        options.insert("type".to_string(), serde_json::Value::from("frontier"));
        let config = ChainConfig::new(
            1,
            vec![Fork {
                name: "Frontier".into(),
                block: 0,
                features: vec![ForkFeature {
                    id: "difficulty".into(),
                    options,
                }],
            }],
        );
        let parent = U256::from(2_048_000u64);
        assert_eq!(
            rules().calc_difficulty(&config, 1_012, 1_000, 1, parent),
            parent + U256::from(1_000u64)
        );
        assert_eq!(
            rules().calc_difficulty(&config, 1_013, 1_000, 1, parent),
            parent - U256::from(1_000u64)
        );
    }

    #[test]
    fn test_zero_divisor_rejected_at_construction() {
        let config: RulesConfig =
            serde_json::from_str(r#"{ "gas_limit_bound_divisor": 0 }"#).unwrap();
        assert!(matches!(
            DefaultRules::new(config),
            Err(crate::error::BlockProductionError::InvalidConfig(_))
        ));

        let rules = DefaultRules::new(RulesConfig::default()).unwrap();
        let parent = Block::with_header(BlockHeader {
            gas_limit: 1_024_000,
            ..BlockHeader::default()
        });
        assert_eq!(rules.calc_gas_limit(&parent), 1_024_999);
    }

    #[test]
    fn test_gas_limit_drifts_up_to_target() {
        let parent = Block::with_header(BlockHeader {
            gas_limit: 1_024_000,
            ..BlockHeader::default()
        });
        // decay = 999, under target -> parent + decay
        assert_eq!(rules().calc_gas_limit(&parent), 1_024_999);
    }

    #[test]
    fn test_gas_limit_decays_when_idle_above_target() {
        let parent = Block::with_header(BlockHeader {
            gas_limit: 10_240_000,
            ..BlockHeader::default()
        });
        assert_eq!(rules().calc_gas_limit(&parent), 10_240_000 - 9_999);
    }

    #[test]
    fn test_rewards_with_uncle() {
        let mut state = MemoryStateDb::new().open(empty_root()).unwrap();
        let header = BlockHeader {
            number: 10,
            coinbase: [1u8; 20],
            ..BlockHeader::default()
        };
        let uncle = BlockHeader {
            number: 9,
            coinbase: [2u8; 20],
            ..BlockHeader::default()
        };
        let rules = rules();
        rules.accumulate_rewards(&ChainConfig::default(), state.as_mut(), &header, &[uncle]);

        let reward = rules.config().block_reward;
        assert_eq!(state.balance(&[1u8; 20]), reward + reward / U256::from(32));
        assert_eq!(
            state.balance(&[2u8; 20]),
            reward * U256::from(7) / U256::from(8)
        );
    }

    #[test]
    fn test_valid_header_passes() {
        let parent = parent_header();
        let child = valid_child(&parent);
        assert!(rules()
            .validate_header(&ChainConfig::default(), &child, &parent, child.timestamp)
            .is_ok());
    }

    #[test]
    fn test_header_checks() {
        let config = ChainConfig::default();
        let parent = parent_header();
        let now = parent.timestamp + 100;

        let mut wrong_number = valid_child(&parent);
        wrong_number.number += 1;
        assert!(matches!(
            rules().validate_header(&config, &wrong_number, &parent, now),
            Err(HeaderError::InvalidNumber { .. })
        ));

        let mut too_much_gas = valid_child(&parent);
        too_much_gas.gas_used = too_much_gas.gas_limit + 1;
        assert!(matches!(
            rules().validate_header(&config, &too_much_gas, &parent, now),
            Err(HeaderError::GasUsedExceedsLimit { .. })
        ));

        let mut long_extra = valid_child(&parent);
        long_extra.extra_data = vec![0u8; 33];
        assert!(matches!(
            rules().validate_header(&config, &long_extra, &parent, now),
            Err(HeaderError::ExtraDataTooLong { .. })
        ));

        let mut bad_difficulty = valid_child(&parent);
        bad_difficulty.difficulty += U256::one();
        assert!(matches!(
            rules().validate_header(&config, &bad_difficulty, &parent, now),
            Err(HeaderError::InvalidDifficulty { .. })
        ));

        let mut jump = valid_child(&parent);
        jump.gas_limit = parent.gas_limit * 2;
        assert!(matches!(
            rules().validate_header(&config, &jump, &parent, now),
            Err(HeaderError::InvalidGasLimit { .. })
        ));
    }

    #[test]
    fn test_future_block_reported_only_when_otherwise_valid() {
        let config = ChainConfig::default();
        let parent = parent_header();
        let child = valid_child(&parent);
        // 12s after the parent, checked against a clock 10s behind it
        let now = parent.timestamp - 10;

        let err = rules()
            .validate_header(&config, &child, &parent, now)
            .unwrap_err();
        assert!(matches!(err, HeaderError::FutureBlock { .. }));
        assert!(err.is_future_block());

        let mut broken = child.clone();
        broken.number += 5;
        assert!(matches!(
            rules().validate_header(&config, &broken, &parent, now),
            Err(HeaderError::InvalidNumber { .. })
        ));
    }
}
