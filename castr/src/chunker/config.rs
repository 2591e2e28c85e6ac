use crate::rolling_hash::WINDOW_SIZE;

/// Default minimum chunk size (16 KiB).
pub const CHUNK_SIZE_MIN_DEFAULT: usize = 16 * 1024;
/// Default average chunk size (64 KiB).
pub const CHUNK_SIZE_AVG_DEFAULT: usize = 64 * 1024;
/// Default maximum chunk size (256 KiB).
pub const CHUNK_SIZE_MAX_DEFAULT: usize = 256 * 1024;

/// Invalid chunker parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidConfig(pub(crate) &'static str);

impl std::fmt::Display for InvalidConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

impl std::error::Error for InvalidConfig {}

/// Parameters controlling where chunk boundaries may fall.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// No chunks smaller than `min_chunk_size`, except a stream's last.
    pub min_chunk_size: usize,
    /// Target average chunk size, reached statistically via the discriminator.
    pub avg_chunk_size: usize,
    /// No chunks bigger than `max_chunk_size`.
    pub max_chunk_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_chunk_size: CHUNK_SIZE_MIN_DEFAULT,
            avg_chunk_size: CHUNK_SIZE_AVG_DEFAULT,
            max_chunk_size: CHUNK_SIZE_MAX_DEFAULT,
        }
    }
}

impl Config {
    /// Create a validated configuration.
    pub fn new(
        min_chunk_size: usize,
        avg_chunk_size: usize,
        max_chunk_size: usize,
    ) -> Result<Self, InvalidConfig> {
        let config = Self {
            min_chunk_size,
            avg_chunk_size,
            max_chunk_size,
        };
        config.check()?;
        Ok(config)
    }

    /// Configuration for a given average chunk size, with the minimum and
    /// maximum at a quarter and four times of it.
    pub fn with_avg(avg_chunk_size: usize) -> Result<Self, InvalidConfig> {
        Self::new(avg_chunk_size / 4, avg_chunk_size, avg_chunk_size * 4)
    }

    /// Check whether the parameters are valid.
    pub fn check(&self) -> Result<(), InvalidConfig> {
        if self.min_chunk_size < WINDOW_SIZE {
            Err(InvalidConfig(
                "minimum chunk size must not be smaller than the hash window",
            ))
        } else if self.min_chunk_size > self.avg_chunk_size {
            Err(InvalidConfig(
                "minimum chunk size must not be greater than the average",
            ))
        } else if self.avg_chunk_size > self.max_chunk_size {
            Err(InvalidConfig(
                "average chunk size must not be greater than the maximum",
            ))
        } else {
            Ok(())
        }
    }

    /// The value which hash sums are tested against while scanning for
    /// boundaries. A boundary is found when `sum % d == d - 1`.
    ///
    /// Derived from the average chunk size with the casync reference
    /// formula, truncated and unadjusted. The derivation assumes chunk
    /// boundaries are only accepted between the minimum and maximum size.
    pub fn discriminator(&self) -> u32 {
        let avg = self.avg_chunk_size as f64;
        (avg / (-1.42888852e-7 * avg + 1.33237515)) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discriminator_reference_values() {
        for &(avg, expected) in &[
            (16384usize, 12318u32),
            (32768, 24680),
            (65536, 49535),
            (131072, 99777),
        ] {
            assert_eq!(Config::with_avg(avg).unwrap().discriminator(), expected);
        }
    }

    #[test]
    fn default_parameters() {
        let config = Config::default();
        assert_eq!(config.min_chunk_size, 16 * 1024);
        assert_eq!(config.avg_chunk_size, 64 * 1024);
        assert_eq!(config.max_chunk_size, 256 * 1024);
        assert!(config.check().is_ok());
    }

    #[test]
    fn rejects_invalid_parameters() {
        assert!(Config::new(WINDOW_SIZE - 1, 1024, 4096).is_err());
        assert!(Config::new(2048, 1024, 4096).is_err());
        assert!(Config::new(512, 8192, 4096).is_err());
        assert!(Config::new(WINDOW_SIZE, 1024, 4096).is_ok());
    }
}
