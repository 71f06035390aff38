use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FuelType {
    Gasoline,
    Diesel,
}

impl FuelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gasoline => "gasoline",
            Self::Diesel => "diesel",
        }
    }
}

impl fmt::Display for FuelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FuelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gas" | "gasoline" | "petrol" | "unleaded" => Ok(Self::Gasoline),
            "diesel" | "dsl" => Ok(Self::Diesel),
            other => Err(format!("unknown fuel type '{other}'")),
        }
    }
}

/// A fleet vehicle used as a matching target.
#[derive(Debug, Clone, PartialEq)]
pub struct Vehicle {
    pub identifier: String,
    pub current_odometer: i64,
    pub fuel_type: FuelType,
    pub make: String,
    pub model: String,
}

impl Vehicle {
    pub fn label(&self) -> String {
        format!("{} {}", self.make, self.model).trim().to_string()
    }
}

/// A card or expense transaction as handed to the evaluator. Never mutated by it.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: Option<i64>,
    pub amount: Decimal,
    pub vendor_name: String,
    pub category_name: String,
    pub memo: String,
    pub transaction_date: NaiveDate,
    pub odometer: Option<i64>,
    pub fuel_type: Option<FuelType>,
    /// Vehicle identifier printed on the fuel card, when the card is assigned.
    pub vehicle_id: Option<String>,
    /// Product code or description from the fuel-card feed.
    pub product: Option<String>,
    pub gallons: Option<Decimal>,
}

impl Transaction {
    pub fn new(transaction_date: NaiveDate, amount: Decimal) -> Self {
        Self {
            id: None,
            amount,
            vendor_name: String::new(),
            category_name: String::new(),
            memo: String::new(),
            transaction_date,
            odometer: None,
            fuel_type: None,
            vehicle_id: None,
            product: None,
            gallons: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchMethod {
    DirectId,
    OdometerProximity,
    ExternalModel,
    Unmatched,
}

impl MatchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DirectId => "direct_id",
            Self::OdometerProximity => "odometer_proximity",
            Self::ExternalModel => "external_model",
            Self::Unmatched => "unmatched",
        }
    }
}

impl fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub matched_id: Option<String>,
    pub confidence: u8,
    pub method: MatchMethod,
    pub needs_review: bool,
    pub reasons: Vec<String>,
}

impl MatchResult {
    pub fn unmatched(reason: impl Into<String>) -> Self {
        Self {
            matched_id: None,
            confidence: 0,
            method: MatchMethod::Unmatched,
            needs_review: true,
            reasons: vec![reason.into()],
        }
    }

    pub fn matched(vehicle: &Vehicle, confidence: u8, method: MatchMethod, review_below: u8) -> Self {
        Self {
            matched_id: Some(vehicle.identifier.clone()),
            confidence,
            method,
            needs_review: confidence < review_below,
            reasons: Vec::new(),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reasons.push(reason.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlagResult {
    pub reasons: Vec<String>,
}

impl FlagResult {
    pub fn flagged(&self) -> bool {
        !self.reasons.is_empty()
    }

    pub fn summary(&self) -> Option<String> {
        if self.flagged() {
            Some(self.reasons.join("; "))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fuel_type_parse_is_lenient() {
        assert_eq!("Gas".parse::<FuelType>().unwrap(), FuelType::Gasoline);
        assert_eq!(" unleaded ".parse::<FuelType>().unwrap(), FuelType::Gasoline);
        assert_eq!("DIESEL".parse::<FuelType>().unwrap(), FuelType::Diesel);
        assert!("electric".parse::<FuelType>().is_err());
    }

    #[test]
    fn test_unmatched_always_needs_review() {
        let r = MatchResult::unmatched("no odometer reading");
        assert_eq!(r.confidence, 0);
        assert_eq!(r.method, MatchMethod::Unmatched);
        assert!(r.needs_review);
        assert!(r.matched_id.is_none());
    }

    #[test]
    fn test_matched_review_follows_threshold() {
        let v = Vehicle {
            identifier: "V1".into(),
            current_odometer: 0,
            fuel_type: FuelType::Diesel,
            make: "Ford".into(),
            model: "F-250".into(),
        };
        assert!(!MatchResult::matched(&v, 80, MatchMethod::ExternalModel, 80).needs_review);
        assert!(MatchResult::matched(&v, 79, MatchMethod::ExternalModel, 80).needs_review);
    }

    #[test]
    fn test_flag_summary_joins_reasons() {
        let f = FlagResult { reasons: vec!["a".into(), "b".into()] };
        assert!(f.flagged());
        assert_eq!(f.summary().as_deref(), Some("a; b"));
        assert_eq!(FlagResult::default().summary(), None);
    }
}
