use crate::types::{GroupId, Money};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Thresholds and group ids for both classification strategies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationConfig {
    pub min_age: i64,
    pub max_age: i64,
    pub elderly_age: i64,
    pub low_income_ceiling: Money,
    /// Any occupation containing one of these substrings is a farmer.
    pub farmer_keywords: Vec<String>,
    pub elderly_group: GroupId,
    pub low_income_group: GroupId,
    pub farmer_group: GroupId,
    pub other_group: GroupId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff_ms: u64,
    /// SQLite busy timeout; a write that cannot take the lock within it fails.
    pub busy_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub classification: ClassificationConfig,
    pub retry: RetryConfig,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            min_age: 18,
            max_age: 99,
            elderly_age: 60,
            low_income_ceiling: Decimal::from(9000),
            farmer_keywords: vec!["เกษตรกร".to_string(), "farmer".to_string()],
            elderly_group: 1,
            low_income_group: 2,
            farmer_group: 3,
            other_group: 4,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_ms: 10,
            busy_timeout_ms: 5_000,
        }
    }
}

impl LedgerConfig {
    /// Load `{data_dir}/ledger.json`.
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/ledger.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: LedgerConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.validate()?;
        log::debug!(
            "config: loaded {path} (farmer keywords: {})",
            config.classification.farmer_keywords.len()
        );
        Ok(config)
    }

    /// In-code defaults. Used by tests and by the runner when no data dir exists.
    pub fn default_test() -> Self {
        Self {
            classification: ClassificationConfig::default(),
            retry: RetryConfig::default(),
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        let c = &self.classification;
        if c.min_age > c.max_age {
            anyhow::bail!("min_age {} exceeds max_age {}", c.min_age, c.max_age);
        }
        if c.low_income_ceiling < Decimal::ZERO {
            anyhow::bail!("low_income_ceiling must be non-negative");
        }
        if c.farmer_keywords.iter().any(|k| k.is_empty()) {
            anyhow::bail!("farmer_keywords must not contain empty strings");
        }
        if self.retry.max_attempts == 0 {
            anyhow::bail!("retry.max_attempts must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        LedgerConfig::default_test().validate().unwrap();
    }

    #[test]
    fn parses_json_and_rejects_zero_attempts() {
        let mut config = LedgerConfig::default_test();
        config.retry.max_attempts = 0;
        let json = serde_json::to_string(&config).unwrap();
        let parsed: LedgerConfig = serde_json::from_str(&json).unwrap();
        assert!(parsed.validate().is_err());
    }

    #[test]
    fn missing_file_is_reported_with_path() {
        let err = LedgerConfig::load("/nonexistent-ledger-dir").unwrap_err();
        assert!(err.to_string().contains("/nonexistent-ledger-dir/ledger.json"));
    }
}
