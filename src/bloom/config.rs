use crate::error::ConfigError;

/// Default filter size: 2^29 bits (64 MiB).
pub const DEFAULT_BIT_SIZE: u64 = 1 << 29;

/// Default number of bit positions per item.
pub const DEFAULT_HASH_COUNT: u32 = 5;

/// Largest filter a bitmap key can address (2^32 bits).
pub const MAX_BIT_SIZE: u64 = 1 << 32;

/// Size and hash count of a [`BloomFilter`](super::BloomFilter).
///
/// All writers sharing a key must use the same configuration.
///
/// # Example
///
/// ```rust
/// use warden::BloomConfig;
///
/// let config = BloomConfig::optimal(1_000_000, 0.01).unwrap();
/// assert_eq!(config.hash_count, 7);
/// assert!(config.expected_false_positive_rate(1_000_000) < 0.011);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BloomConfig {
    /// Number of bits in the filter.
    pub bit_size: u64,
    /// Bits set per item.
    pub hash_count: u32,
}

impl Default for BloomConfig {
    fn default() -> Self {
        Self {
            bit_size: DEFAULT_BIT_SIZE,
            hash_count: DEFAULT_HASH_COUNT,
        }
    }
}

impl BloomConfig {
    /// Filter of `bit_size` bits using `hash_count` positions per item.
    pub fn new(bit_size: u64, hash_count: u32) -> Self {
        Self { bit_size, hash_count }
    }

    /// Smallest filter holding `expected_items` at `false_positive_rate`.
    ///
    /// ```text
    ///     m = -n ln(p) / (ln 2)^2
    ///     k = (m / n) ln 2
    /// ```
    ///
    /// # Errors
    ///
    /// Fails if `expected_items` is zero, the rate is outside `(0, 1)`, or
    /// the resulting size exceeds [`MAX_BIT_SIZE`].
    pub fn optimal(expected_items: u64, false_positive_rate: f64) -> Result<Self, ConfigError> {
        if expected_items == 0 {
            return Err(ConfigError::Zero { field: "expected_items" });
        }
        if !(false_positive_rate > 0.0 && false_positive_rate < 1.0) {
            return Err(ConfigError::Inconsistent(
                "false_positive_rate must be between 0 and 1",
            ));
        }

        let n = expected_items as f64;
        let ln2 = std::f64::consts::LN_2;
        let bits = (-n * false_positive_rate.ln() / (ln2 * ln2)).ceil();
        if bits > MAX_BIT_SIZE as f64 {
            return Err(ConfigError::Inconsistent(
                "expected_items too large for a single bitmap",
            ));
        }

        let bit_size = (bits as u64).max(1);
        let hash_count = ((bit_size as f64 / n) * ln2).round().max(1.0) as u32;

        Ok(Self { bit_size, hash_count })
    }

    /// False positive probability after `inserted` distinct items.
    ///
    /// `(1 - e^(-k n / m))^k`
    pub fn expected_false_positive_rate(&self, inserted: u64) -> f64 {
        let k = f64::from(self.hash_count);
        let fill = 1.0 - (-k * inserted as f64 / self.bit_size as f64).exp();
        fill.powf(k)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Rejects a zero size or hash count, and sizes beyond [`MAX_BIT_SIZE`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bit_size == 0 {
            return Err(ConfigError::Zero { field: "bit_size" });
        }
        if self.hash_count == 0 {
            return Err(ConfigError::Zero { field: "hash_count" });
        }
        if self.bit_size > MAX_BIT_SIZE {
            return Err(ConfigError::Inconsistent("bit_size exceeds 2^32 bits"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BloomConfig::default();
        assert_eq!(config.bit_size, 536_870_912);
        assert_eq!(config.hash_count, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        assert_eq!(
            BloomConfig::new(0, 5).validate(),
            Err(ConfigError::Zero { field: "bit_size" })
        );
        assert_eq!(
            BloomConfig::new(1024, 0).validate(),
            Err(ConfigError::Zero { field: "hash_count" })
        );
        assert!(BloomConfig::new(MAX_BIT_SIZE, 1).validate().is_ok());
        assert!(BloomConfig::new(MAX_BIT_SIZE + 1, 1).validate().is_err());
    }

    #[test]
    fn test_optimal_sizing() {
        let config = BloomConfig::optimal(1_000_000, 0.01).unwrap();
        // About 9.59 bits per item
        assert!(config.bit_size > 9_500_000 && config.bit_size < 9_700_000);
        assert_eq!(config.hash_count, 7);

        assert!(BloomConfig::optimal(0, 0.01).is_err());
        assert!(BloomConfig::optimal(100, 0.0).is_err());
        assert!(BloomConfig::optimal(100, 1.0).is_err());
    }

    #[test]
    fn test_false_positive_rate_grows_with_load() {
        let config = BloomConfig::new(10_000, 5);
        assert_eq!(config.expected_false_positive_rate(0), 0.0);

        let light = config.expected_false_positive_rate(100);
        let heavy = config.expected_false_positive_rate(5_000);
        assert!(light < heavy);
        assert!(heavy < 1.0);
    }
}
