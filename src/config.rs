//! Manager configuration and seeding policy tunables.
//!
//! All thresholds are expressed in bits of estimated entropy. The defaults
//! reproduce the conservative seeding discipline of SP800-90C-style
//! deployments while keeping compliance oversampling opt-in.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::Error;

/// DRNG security strength in bits (ChaCha20 key size).
pub const SECURITY_STRENGTH_BITS: u32 = 256;

/// Entropy required to consider the DRNG minimally seeded.
pub const MIN_SEED_ENTROPY_BITS: u32 = 128;

/// Entropy required to leave the uninitialized stage.
pub const INIT_ENTROPY_BITS: u32 = 32;

/// Entropy required for full seeding (equal to the security strength).
pub const FULL_SEED_ENTROPY_BITS: u32 = 256;

/// Extra bits requested during initial seeding in SP800-90C mode.
pub const SEED_BUFFER_INIT_ADD_BITS: u32 = 128;

/// Largest conditioning digest the manager accounts for, in bits.
pub const MAX_DIGEST_SIZE_BITS: u32 = 512;

/// Default writer wakeup threshold in bytes (stored internally in bits).
pub const WRITE_WAKEUP_ENTROPY_BYTES: u32 = 128;

/// Seeding policy: oversampling and compliance switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Oversampling ratio applied to seed requests. Must be at least 1.
    pub osr: u32,
    /// Operate SP800-90C compliant: demand `SEED_BUFFER_INIT_ADD_BITS`
    /// extra bits until every DRNG instance is fully seeded.
    pub sp80090c: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            osr: 1,
            sp80090c: false,
        }
    }
}

/// Startup monitor schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Total wall-clock budget for the startup monitor, in milliseconds.
    /// Defaults to 30 minutes.
    pub duration_ms: u64,
    /// Sleep quantum between monitor iterations, in milliseconds.
    pub quantum_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            duration_ms: 30 * 60 * 1000,
            quantum_ms: 500,
        }
    }
}

impl MonitorConfig {
    /// Sleep quantum as a [`Duration`].
    pub fn quantum(&self) -> Duration {
        Duration::from_millis(self.quantum_ms)
    }

    /// Number of monitor iterations within the configured budget.
    pub fn iterations(&self) -> u64 {
        self.duration_ms / self.quantum_ms.max(1)
    }
}

/// Conditioning hash for the auxiliary pool.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// BLAKE3 - fast, secure, recommended default.
    #[default]
    Blake3,
    /// SHA-256 - widely deployed, conservative choice.
    Sha256,
}

/// Auxiliary pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuxPoolConfig {
    /// Pool capacity in bits; entropy credit is capped here.
    pub pool_bits: u32,
    /// Hash used to condition pool state and output.
    pub algorithm: HashAlgorithm,
}

impl Default for AuxPoolConfig {
    fn default() -> Self {
        Self {
            pool_bits: 4096,
            algorithm: HashAlgorithm::default(),
        }
    }
}

/// Per-source entropy rate: bits credited per full-strength request.
///
/// The rate is the ceiling of what a source may claim in `curr_entropy`
/// and `get_ent`; actual credit never exceeds the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRates {
    /// Timing jitter source credit.
    pub jitter_bits: u32,
    /// CPU instruction (RDSEED/RDRAND) source credit. Hardware RNGs are
    /// distrusted by default and credited well below their output size.
    pub cpu_bits: u32,
    /// Kernel RNG bridge credit.
    pub krng_bits: u32,
}

impl Default for SourceRates {
    fn default() -> Self {
        Self {
            jitter_bits: 128,
            cpu_bits: 32,
            krng_bits: 128,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seeding policy.
    pub policy: PolicyConfig,
    /// Startup monitor schedule.
    pub monitor: MonitorConfig,
    /// Auxiliary pool settings.
    pub aux: AuxPoolConfig,
    /// Per-source entropy rates.
    pub rates: SourceRates,
    /// Writer wakeup threshold in bytes.
    pub write_wakeup_bytes: u32,
}

impl Config {
    /// Loads a configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), Error> {
        if self.policy.osr == 0 {
            return Err(Error::InvalidConfig(
                "oversampling ratio must be at least 1".into(),
            ));
        }
        if self.monitor.quantum_ms == 0 {
            return Err(Error::InvalidConfig(
                "monitor quantum must be non-zero".into(),
            ));
        }
        if self.aux.pool_bits < SECURITY_STRENGTH_BITS {
            return Err(Error::InvalidConfig(format!(
                "aux pool must hold at least {} bits",
                SECURITY_STRENGTH_BITS
            )));
        }
        Ok(())
    }

    /// Initial writer wakeup threshold in bits.
    pub fn write_wakeup_bits(&self) -> u32 {
        let bytes = if self.write_wakeup_bytes == 0 {
            WRITE_WAKEUP_ENTROPY_BYTES
        } else {
            self.write_wakeup_bytes
        };
        bytes << 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_osr_invalid() {
        let mut config = Config::default();
        config.policy.osr = 0;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_quantum_invalid() {
        let mut config = Config::default();
        config.monitor.quantum_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_write_wakeup_defaults_to_bits() {
        let config = Config::default();
        assert_eq!(config.write_wakeup_bits(), WRITE_WAKEUP_ENTROPY_BYTES << 3);
    }

    #[test]
    fn test_monitor_iteration_count() {
        let monitor = MonitorConfig {
            duration_ms: 10_000,
            quantum_ms: 500,
        };
        assert_eq!(monitor.iterations(), 20);
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [policy]
            osr = 2
            sp80090c = true
            "#,
        )
        .unwrap();
        assert_eq!(config.policy.osr, 2);
        assert!(config.policy.sp80090c);
        assert_eq!(config.rates.krng_bits, 128);
    }
}
