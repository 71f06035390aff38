//! Numeric thresholds for the rule evaluator.
//!
//! `ThresholdSettings` is the serialisable form stored in settings.json; every
//! field is optional so a hand-edited file can null one out. It is validated
//! into an `EvaluatorConfig` before any transaction is evaluated.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{ApnexusError, Result};
use crate::lexicon::Lexicon;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdSettings {
    pub odometer_window: Option<i64>,
    pub tight_window: Option<i64>,
    pub review_below: Option<u8>,
    pub loose_confidence: Option<u8>,
    pub fallback_confidence: Option<u8>,
    pub global_ceiling: Option<Decimal>,
    pub category_ceilings: BTreeMap<String, Decimal>,
    pub mpg_min: Option<f64>,
    pub mpg_max: Option<f64>,
}

impl Default for ThresholdSettings {
    fn default() -> Self {
        let mut category_ceilings = BTreeMap::new();
        category_ceilings.insert("office".to_string(), Decimal::from(500));
        category_ceilings.insert("meal".to_string(), Decimal::from(200));
        category_ceilings.insert("travel".to_string(), Decimal::from(2000));
        Self {
            odometer_window: Some(10_000),
            tight_window: Some(1_000),
            review_below: Some(80),
            loose_confidence: Some(75),
            fallback_confidence: Some(65),
            global_ceiling: Some(Decimal::from(5000)),
            category_ceilings,
            mpg_min: Some(5.0),
            mpg_max: Some(40.0),
        }
    }
}

/// Thresholds for the vehicle-matching cascade.
#[derive(Debug, Clone)]
pub struct MatchConfig {
    pub odometer_window: u64,
    pub tight_window: u64,
    pub review_below: u8,
    pub loose_confidence: u8,
    pub fallback_confidence: u8,
    pub lexicon: Lexicon,
}

impl MatchConfig {
    /// Upper bound for a model-reported confidence; stays below a near-exact
    /// odometer match.
    pub const MODEL_CONFIDENCE_CAP: u8 = 90;
    /// Lowest allowed `review_below`: anything under 80% always goes to review.
    pub const REVIEW_FLOOR: u8 = 80;
    pub const NEAR_EXACT_CONFIDENCE: u8 = 95;
    pub const DIRECT_ID_CONFIDENCE: u8 = 100;
}

/// Thresholds and keyword sets for anomaly flagging.
#[derive(Debug, Clone)]
pub struct FlagConfig {
    /// (lowercased key, ceiling), sorted by key.
    pub category_ceilings: Vec<(String, Decimal)>,
    pub global_ceiling: Decimal,
    pub mpg_min: f64,
    pub mpg_max: f64,
    pub lexicon: Lexicon,
}

impl FlagConfig {
    /// Lowest ceiling among the keys contained in `category`.
    pub fn ceiling_for(&self, category: &str) -> Option<(&str, Decimal)> {
        let category = category.to_lowercase();
        self.category_ceilings
            .iter()
            .filter(|(key, _)| category.contains(key.as_str()))
            .min_by(|a, b| a.1.cmp(&b.1))
            .map(|(key, ceiling)| (key.as_str(), *ceiling))
    }
}

#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    pub matching: MatchConfig,
    pub flagging: FlagConfig,
}

fn required<T: Copy>(value: Option<T>, name: &str) -> Result<T> {
    value.ok_or_else(|| ApnexusError::Config(format!("missing required threshold '{name}'")))
}

fn positive_i64(value: Option<i64>, name: &str) -> Result<u64> {
    let v = required(value, name)?;
    if v <= 0 {
        return Err(ApnexusError::Config(format!("threshold '{name}' must be positive, got {v}")));
    }
    Ok(v as u64)
}

fn percentage(value: Option<u8>, name: &str) -> Result<u8> {
    let v = required(value, name)?;
    if v == 0 || v > 100 {
        return Err(ApnexusError::Config(format!("threshold '{name}' must be within 1..=100, got {v}")));
    }
    Ok(v)
}

impl EvaluatorConfig {
    pub fn from_settings(settings: &ThresholdSettings) -> Result<Self> {
        let odometer_window = positive_i64(settings.odometer_window, "odometer_window")?;
        let tight_window = positive_i64(settings.tight_window, "tight_window")?;
        if tight_window > odometer_window {
            return Err(ApnexusError::Config(format!(
                "tight_window ({tight_window}) exceeds odometer_window ({odometer_window})"
            )));
        }

        let review_below = percentage(settings.review_below, "review_below")?;
        if !(MatchConfig::REVIEW_FLOOR..=MatchConfig::NEAR_EXACT_CONFIDENCE).contains(&review_below) {
            return Err(ApnexusError::Config(format!(
                "review_below ({review_below}) must be within {}..={}",
                MatchConfig::REVIEW_FLOOR,
                MatchConfig::NEAR_EXACT_CONFIDENCE
            )));
        }
        let loose_confidence = percentage(settings.loose_confidence, "loose_confidence")?;
        let fallback_confidence = percentage(settings.fallback_confidence, "fallback_confidence")?;
        for (name, v) in [("loose_confidence", loose_confidence), ("fallback_confidence", fallback_confidence)] {
            if v >= MatchConfig::NEAR_EXACT_CONFIDENCE {
                return Err(ApnexusError::Config(format!(
                    "{name} ({v}) must stay below the near-exact confidence of {}",
                    MatchConfig::NEAR_EXACT_CONFIDENCE
                )));
            }
        }

        let global_ceiling = required(settings.global_ceiling, "global_ceiling")?;
        if global_ceiling <= Decimal::ZERO {
            return Err(ApnexusError::Config("threshold 'global_ceiling' must be positive".into()));
        }
        let mut category_ceilings = Vec::with_capacity(settings.category_ceilings.len());
        for (key, ceiling) in &settings.category_ceilings {
            let key = key.trim().to_lowercase();
            if key.is_empty() {
                return Err(ApnexusError::Config("category ceiling with an empty category key".into()));
            }
            if *ceiling <= Decimal::ZERO {
                return Err(ApnexusError::Config(format!("ceiling for category '{key}' must be positive")));
            }
            category_ceilings.push((key, *ceiling));
        }
        category_ceilings.sort_by(|a, b| a.0.cmp(&b.0));

        let mpg_min = required(settings.mpg_min, "mpg_min")?;
        let mpg_max = required(settings.mpg_max, "mpg_max")?;
        if !(mpg_min > 0.0 && mpg_min < mpg_max) {
            return Err(ApnexusError::Config(format!(
                "fuel-economy bounds must satisfy 0 < mpg_min < mpg_max, got {mpg_min}..{mpg_max}"
            )));
        }

        let lexicon = Lexicon::builtin().map_err(|e| ApnexusError::Config(e.to_string()))?;

        Ok(Self {
            matching: MatchConfig {
                odometer_window,
                tight_window,
                review_below,
                loose_confidence,
                fallback_confidence,
                lexicon: lexicon.clone(),
            },
            flagging: FlagConfig {
                category_ceilings,
                global_ceiling,
                mpg_min,
                mpg_max,
                lexicon,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expect_config_error(settings: ThresholdSettings, needle: &str) {
        match EvaluatorConfig::from_settings(&settings) {
            Err(ApnexusError::Config(msg)) => assert!(msg.contains(needle), "unexpected message: {msg}"),
            Err(other) => panic!("expected config error, got {other}"),
            Ok(_) => panic!("expected config error containing '{needle}'"),
        }
    }

    #[test]
    fn test_defaults_validate() {
        let cfg = EvaluatorConfig::from_settings(&ThresholdSettings::default()).unwrap();
        assert_eq!(cfg.matching.odometer_window, 10_000);
        assert_eq!(cfg.matching.tight_window, 1_000);
        assert_eq!(cfg.matching.review_below, 80);
        assert_eq!(cfg.flagging.global_ceiling, Decimal::from(5000));
        assert_eq!(cfg.flagging.category_ceilings.len(), 3);
    }

    #[test]
    fn test_missing_threshold_is_hard_error() {
        let s = ThresholdSettings { odometer_window: None, ..Default::default() };
        expect_config_error(s, "odometer_window");
        let s = ThresholdSettings { global_ceiling: None, ..Default::default() };
        expect_config_error(s, "global_ceiling");
        let s = ThresholdSettings { mpg_max: None, ..Default::default() };
        expect_config_error(s, "mpg_max");
    }

    #[test]
    fn test_inconsistent_thresholds_rejected() {
        let s = ThresholdSettings { tight_window: Some(20_000), ..Default::default() };
        expect_config_error(s, "exceeds odometer_window");
        let s = ThresholdSettings { mpg_min: Some(50.0), ..Default::default() };
        expect_config_error(s, "fuel-economy bounds");
        let s = ThresholdSettings { odometer_window: Some(0), ..Default::default() };
        expect_config_error(s, "must be positive");
        let s = ThresholdSettings { review_below: Some(101), ..Default::default() };
        expect_config_error(s, "1..=100");
        let s = ThresholdSettings { loose_confidence: Some(95), ..Default::default() };
        expect_config_error(s, "near-exact");
    }

    #[test]
    fn test_review_below_bounds() {
        let s = ThresholdSettings { review_below: Some(79), ..Default::default() };
        expect_config_error(s, "review_below (79) must be within 80..=95");
        let s = ThresholdSettings { review_below: Some(10), ..Default::default() };
        expect_config_error(s, "review_below (10)");
        let s = ThresholdSettings { review_below: Some(96), ..Default::default() };
        expect_config_error(s, "review_below (96) must be within 80..=95");
        let s = ThresholdSettings { review_below: Some(100), ..Default::default() };
        expect_config_error(s, "review_below (100)");
        for ok in [80, 95] {
            let s = ThresholdSettings { review_below: Some(ok), ..Default::default() };
            let cfg = EvaluatorConfig::from_settings(&s).unwrap();
            assert_eq!(cfg.matching.review_below, ok);
        }
    }

    #[test]
    fn test_confidence_constants_are_ordered() {
        assert!(MatchConfig::DIRECT_ID_CONFIDENCE > MatchConfig::NEAR_EXACT_CONFIDENCE);
        assert!(MatchConfig::NEAR_EXACT_CONFIDENCE > MatchConfig::MODEL_CONFIDENCE_CAP);
        assert!(MatchConfig::MODEL_CONFIDENCE_CAP >= MatchConfig::REVIEW_FLOOR);
    }

    #[test]
    fn test_partial_json_merges_with_defaults() {
        let s: ThresholdSettings = serde_json::from_str(r#"{"odometer_window": 5000}"#).unwrap();
        assert_eq!(s.odometer_window, Some(5000));
        assert_eq!(s.tight_window, Some(1000));
        assert!(s.category_ceilings.contains_key("office"));
    }

    #[test]
    fn test_explicit_null_is_missing() {
        let s: ThresholdSettings = serde_json::from_str(r#"{"tight_window": null}"#).unwrap();
        expect_config_error(s, "tight_window");
    }

    #[test]
    fn test_ceiling_lookup_is_case_insensitive_and_conservative() {
        let mut s = ThresholdSettings::default();
        s.category_ceilings.insert("Office Travel".to_string(), Decimal::from(300));
        let cfg = EvaluatorConfig::from_settings(&s).unwrap();
        let (key, ceiling) = cfg.flagging.ceiling_for("OFFICE SUPPLIES").unwrap();
        assert_eq!((key, ceiling), ("office", Decimal::from(500)));
        let (_, ceiling) = cfg.flagging.ceiling_for("office travel reimbursements").unwrap();
        assert_eq!(ceiling, Decimal::from(300));
        assert!(cfg.flagging.ceiling_for("Software").is_none());
    }
}
