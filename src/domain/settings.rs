use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};

/// Global economy settings. Read on every earn attempt.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Settings {
    /// Credits granted per successful earn.
    pub credit_amount: u64,
    /// Minimum seconds between two earns by the same user.
    pub credit_interval_secs: u64,
    pub ad_block_detection: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            credit_amount: 2,
            credit_interval_secs: 300,
            ad_block_detection: true,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.credit_amount == 0 {
            return Err(LedgerError::Validation(
                "credit_amount must be at least 1".to_string(),
            ));
        }
        if self.credit_interval_secs == 0 {
            return Err(LedgerError::Validation(
                "credit_interval_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Partial settings update. Supplied fields replace the stored ones; the rest
/// are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsPatch {
    pub credit_amount: Option<u64>,
    pub credit_interval_secs: Option<u64>,
    pub ad_block_detection: Option<bool>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        self.credit_amount.is_none()
            && self.credit_interval_secs.is_none()
            && self.ad_block_detection.is_none()
    }

    /// Returns `current` with this patch merged in, validated.
    pub fn merge(&self, current: &Settings) -> Result<Settings> {
        if self.is_empty() {
            return Err(LedgerError::Validation(
                "Settings update contains no fields".to_string(),
            ));
        }
        let merged = Settings {
            credit_amount: self.credit_amount.unwrap_or(current.credit_amount),
            credit_interval_secs: self
                .credit_interval_secs
                .unwrap_or(current.credit_interval_secs),
            ad_block_detection: self.ad_block_detection.unwrap_or(current.ad_block_detection),
        };
        merged.validate()?;
        Ok(merged)
    }
}

impl std::str::FromStr for SettingsPatch {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        serde_json::from_str(s)
            .map_err(|e| LedgerError::Validation(format!("Invalid settings patch: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_keeps_absent_fields() {
        let current = Settings::default();
        let patch: SettingsPatch = r#"{"credit_interval_secs": 60}"#.parse().unwrap();
        let merged = patch.merge(&current).unwrap();
        assert_eq!(merged.credit_interval_secs, 60);
        assert_eq!(merged.credit_amount, 2);
        assert!(merged.ad_block_detection);
    }

    #[test]
    fn test_merge_rejects_invalid_values() {
        let patch = SettingsPatch {
            credit_amount: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            patch.merge(&Settings::default()),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn test_empty_and_unknown_patches_rejected() {
        assert!(SettingsPatch::default().merge(&Settings::default()).is_err());
        assert!(matches!(
            r#"{"credit_amout": 5}"#.parse::<SettingsPatch>(),
            Err(LedgerError::Validation(_))
        ));
    }
}
