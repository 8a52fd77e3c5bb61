//! Block-level gas accounting.

use crate::error::GasPoolError;

/// Gas still available in the block being assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GasPool(u64);

impl GasPool {
    /// Pool seeded with `gas`.
    pub fn new(gas: u64) -> Self {
        Self(gas)
    }

    /// Return unused gas to the pool.
    pub fn add_gas(&mut self, amount: u64) -> &mut Self {
        self.0 = self.0.saturating_add(amount);
        self
    }

    /// Reserve `amount`, leaving the pool untouched on failure.
    pub fn sub_gas(&mut self, amount: u64) -> Result<(), GasPoolError> {
        if self.0 < amount {
            return Err(GasPoolError {
                have: self.0,
                want: amount,
            });
        }
        self.0 -= amount;
        Ok(())
    }

    /// Gas remaining.
    pub fn gas(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for GasPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
