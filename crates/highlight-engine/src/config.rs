//! Detector configuration from an optional JSON file and environment variables

use std::collections::BTreeMap;
use std::env;
use std::fs;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::HighlightError;
use crate::highlight::RuleKind;

/// Per-rule settings. Missing entries fall back to `RuleSettings::default()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSettings {
    pub enabled: bool,
    pub name: Option<String>,
    pub description: Option<String>,
    /// Rule-specific numeric thresholds
    pub params: BTreeMap<String, f64>,
}

impl Default for RuleSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            name: None,
            description: None,
            params: BTreeMap::new(),
        }
    }
}

impl RuleSettings {
    /// Look up a threshold, falling back to the rule's built-in constant
    pub fn param(&self, key: &str, default: f64) -> f64 {
        self.params.get(key).copied().unwrap_or(default)
    }

    pub fn param_u32(&self, key: &str, default: u32) -> u32 {
        self.params
            .get(key)
            .filter(|v| v.is_finite() && **v >= 0.0)
            .map(|v| *v as u32)
            .unwrap_or(default)
    }
}

/// Centipawn-loss classification thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CplThresholds {
    pub good: f64,
    pub inaccuracy: f64,
    pub mistake: f64,
}

impl Default for CplThresholds {
    fn default() -> Self {
        Self {
            good: 50.0,
            inaccuracy: 100.0,
            mistake: 200.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Maximum highlights kept per game phase
    pub highlights_per_phase_limit: usize,

    pub good_move_max_cpl: f64,
    pub inaccuracy_max_cpl: f64,
    pub mistake_max_cpl: f64,

    /// Settings keyed by rule tag ("fork", "windmill", ...)
    pub rules: BTreeMap<String, RuleSettings>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        let thresholds = CplThresholds::default();
        Self {
            highlights_per_phase_limit: 10,
            good_move_max_cpl: thresholds.good,
            inaccuracy_max_cpl: thresholds.inaccuracy,
            mistake_max_cpl: thresholds.mistake,
            rules: BTreeMap::new(),
        }
    }
}

impl DetectorConfig {
    /// Load configuration. Reads the JSON file named by `HIGHLIGHTS_CONFIG`
    /// if set, then applies `HIGHLIGHTS_*` environment overrides.
    pub fn load() -> Result<Self, HighlightError> {
        let mut config = match env::var("HIGHLIGHTS_CONFIG") {
            Ok(path) => {
                info!(path = %path, "Loading highlight config file");
                let raw = fs::read_to_string(&path)?;
                Self::from_json(&raw)?
            }
            Err(_) => Self::default(),
        };

        config.apply_overrides(|key| env::var(key).ok());
        config.validate()?;

        info!(
            per_phase_limit = config.highlights_per_phase_limit,
            good = config.good_move_max_cpl,
            inaccuracy = config.inaccuracy_max_cpl,
            mistake = config.mistake_max_cpl,
            configured_rules = config.rules.len(),
            "Highlight config loaded"
        );
        Ok(config)
    }

    pub fn from_json(raw: &str) -> Result<Self, HighlightError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the environment, in `load`).
    /// Unparsable values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        self.highlights_per_phase_limit = lookup("HIGHLIGHTS_PER_PHASE_LIMIT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(self.highlights_per_phase_limit);

        self.good_move_max_cpl = lookup("HIGHLIGHTS_GOOD_MAX_CPL")
            .and_then(|v| v.parse().ok())
            .unwrap_or(self.good_move_max_cpl);

        self.inaccuracy_max_cpl = lookup("HIGHLIGHTS_INACCURACY_MAX_CPL")
            .and_then(|v| v.parse().ok())
            .unwrap_or(self.inaccuracy_max_cpl);

        self.mistake_max_cpl = lookup("HIGHLIGHTS_MISTAKE_MAX_CPL")
            .and_then(|v| v.parse().ok())
            .unwrap_or(self.mistake_max_cpl);
    }

    pub fn validate(&self) -> Result<(), HighlightError> {
        let t = self.thresholds();
        if !(t.good.is_finite() && t.inaccuracy.is_finite() && t.mistake.is_finite()) {
            return Err(HighlightError::Config("CPL thresholds must be finite".into()));
        }
        if t.good < 0.0 || t.good > t.inaccuracy || t.inaccuracy > t.mistake {
            return Err(HighlightError::Config(format!(
                "CPL thresholds must satisfy 0 <= good <= inaccuracy <= mistake (got {} / {} / {})",
                t.good, t.inaccuracy, t.mistake
            )));
        }
        if let Some(unknown) = self.rules.keys().find(|k| RuleKind::from_tag(k).is_none()) {
            return Err(HighlightError::Config(format!("Unknown rule: {unknown}")));
        }
        Ok(())
    }

    pub fn thresholds(&self) -> CplThresholds {
        CplThresholds {
            good: self.good_move_max_cpl,
            inaccuracy: self.inaccuracy_max_cpl,
            mistake: self.mistake_max_cpl,
        }
    }

    pub fn rule(&self, kind: RuleKind) -> RuleSettings {
        self.rules.get(kind.as_str()).cloned().unwrap_or_default()
    }

    pub fn set_enabled(&mut self, kind: RuleKind, enabled: bool) {
        self.rules.entry(kind.as_str().to_string()).or_default().enabled = enabled;
    }

    /// A config with every rule switched off
    pub fn all_disabled() -> Self {
        let mut config = Self::default();
        for kind in RuleKind::REGISTRY_ORDER {
            config.set_enabled(kind, false);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DetectorConfig::default();
        assert_eq!(config.highlights_per_phase_limit, 10);
        assert_eq!(config.thresholds(), CplThresholds::default());
        assert!(config.rule(RuleKind::Fork).enabled);
    }

    #[test]
    fn test_from_json_partial() {
        let config = DetectorConfig::from_json(
            r#"{
                "highlights_per_phase_limit": 4,
                "rules": {
                    "fork": { "enabled": false },
                    "perpetual_check": { "params": { "min_checks": 4 } }
                }
            }"#,
        )
        .unwrap();
        assert_eq!(config.highlights_per_phase_limit, 4);
        assert_eq!(config.good_move_max_cpl, 50.0);
        assert!(!config.rule(RuleKind::Fork).enabled);
        let perpetual = config.rule(RuleKind::PerpetualCheck);
        assert!(perpetual.enabled);
        assert_eq!(perpetual.param_u32("min_checks", 3), 4);
        assert_eq!(perpetual.param("max_eval_range", 50.0), 50.0);
    }

    #[test]
    fn test_unknown_rule_rejected() {
        let err = DetectorConfig::from_json(r#"{ "rules": { "telepathy": {} } }"#).unwrap_err();
        assert!(matches!(err, HighlightError::Config(_)));
    }

    #[test]
    fn test_bad_thresholds_rejected() {
        let err = DetectorConfig::from_json(r#"{ "good_move_max_cpl": 300 }"#).unwrap_err();
        assert!(matches!(err, HighlightError::Config(_)));
    }

    #[test]
    fn test_malformed_json() {
        let err = DetectorConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, HighlightError::Json(_)));
    }

    #[test]
    fn test_overrides() {
        let mut config = DetectorConfig::default();
        config.apply_overrides(|key| match key {
            "HIGHLIGHTS_PER_PHASE_LIMIT" => Some("3".into()),
            "HIGHLIGHTS_MISTAKE_MAX_CPL" => Some("250".into()),
            "HIGHLIGHTS_GOOD_MAX_CPL" => Some("not a number".into()),
            _ => None,
        });
        assert_eq!(config.highlights_per_phase_limit, 3);
        assert_eq!(config.mistake_max_cpl, 250.0);
        assert_eq!(config.good_move_max_cpl, 50.0);
    }

    #[test]
    fn test_all_disabled() {
        let config = DetectorConfig::all_disabled();
        assert!(RuleKind::REGISTRY_ORDER
            .iter()
            .all(|kind| !config.rule(*kind).enabled));
    }
}
