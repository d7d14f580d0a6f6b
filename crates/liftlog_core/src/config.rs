use std::path::PathBuf;

use crate::LiftlogError;
use crate::normalize::OneRmFormula;
use crate::parser::Delimiter;

pub const DEFAULT_MAX_GAP_DAYS: u32 = 1;
pub const DEFAULT_PLATEAU_WINDOW: usize = 5;

#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    pub delimiter: Delimiter,
    pub max_gap_days: u32,
    pub one_rm_formula: OneRmFormula,
    pub plateau_window: usize,
    pub mapping_path: Option<PathBuf>,
    pub export_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            delimiter: Delimiter::Auto,
            max_gap_days: DEFAULT_MAX_GAP_DAYS,
            one_rm_formula: OneRmFormula::Epley,
            plateau_window: DEFAULT_PLATEAU_WINDOW,
            mapping_path: None,
            export_path: None,
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, LiftlogError> {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    /// Testable helper that reads configuration values using the provided
    /// function. This avoids mutating global environment in tests and keeps
    /// `from_env()` small and safe.
    pub fn from_env_with<F>(mut get: F) -> Result<Self, LiftlogError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(raw) = get("LIFTLOG_DELIMITER") {
            cfg.delimiter = raw.parse()?;
        }
        if let Some(raw) = get("LIFTLOG_STREAK_MAX_GAP_DAYS") {
            let gap: u32 = raw.trim().parse().map_err(|_| {
                LiftlogError::Config(format!("LIFTLOG_STREAK_MAX_GAP_DAYS invalid: {raw}"))
            })?;
            if gap == 0 {
                return Err(LiftlogError::Config(
                    "LIFTLOG_STREAK_MAX_GAP_DAYS must be at least 1".into(),
                ));
            }
            cfg.max_gap_days = gap;
        }
        if let Some(raw) = get("LIFTLOG_ONE_RM_FORMULA") {
            cfg.one_rm_formula = raw.parse()?;
        }
        if let Some(raw) = get("LIFTLOG_PLATEAU_WINDOW") {
            let window: usize = raw.trim().parse().map_err(|_| {
                LiftlogError::Config(format!("LIFTLOG_PLATEAU_WINDOW invalid: {raw}"))
            })?;
            if window < 2 {
                return Err(LiftlogError::Config(
                    "LIFTLOG_PLATEAU_WINDOW must be at least 2".into(),
                ));
            }
            cfg.plateau_window = window;
        }
        cfg.mapping_path = get("LIFTLOG_MAPPING_PATH")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);
        cfg.export_path = get("LIFTLOG_EXPORT_PATH")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_env_defaults_when_unset() {
        let cfg = PipelineConfig::from_env_with(|_| None).expect("cfg");
        assert_eq!(cfg, PipelineConfig::default());
        assert_eq!(cfg.max_gap_days, 1);
        assert_eq!(cfg.one_rm_formula, OneRmFormula::Epley);
    }

    #[test]
    fn from_env_reads_values() {
        let get = |k: &str| match k {
            "LIFTLOG_DELIMITER" => Some("tab".into()),
            "LIFTLOG_STREAK_MAX_GAP_DAYS" => Some("2".into()),
            "LIFTLOG_ONE_RM_FORMULA" => Some("Brzycki".into()),
            "LIFTLOG_PLATEAU_WINDOW" => Some("4".into()),
            "LIFTLOG_MAPPING_PATH" => Some("/etc/liftlog/mapping.json".into()),
            _ => None,
        };
        let cfg = PipelineConfig::from_env_with(get).expect("cfg");
        assert_eq!(cfg.delimiter, Delimiter::Tab);
        assert_eq!(cfg.max_gap_days, 2);
        assert_eq!(cfg.one_rm_formula, OneRmFormula::Brzycki);
        assert_eq!(cfg.plateau_window, 4);
        assert_eq!(
            cfg.mapping_path.as_deref(),
            Some(std::path::Path::new("/etc/liftlog/mapping.json"))
        );
        assert!(cfg.export_path.is_none());
    }

    #[test]
    fn from_env_rejects_zero_gap() {
        let get = |k: &str| (k == "LIFTLOG_STREAK_MAX_GAP_DAYS").then(|| "0".to_string());
        assert!(PipelineConfig::from_env_with(get).is_err());
    }

    #[test]
    fn from_env_rejects_unknown_formula() {
        let get = |k: &str| (k == "LIFTLOG_ONE_RM_FORMULA").then(|| "lombardi".to_string());
        let err = PipelineConfig::from_env_with(get).unwrap_err();
        assert!(err.to_string().contains("lombardi"));
    }
}
