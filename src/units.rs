//! Weight units - weights are stored in kg, shown in the user's preferred unit

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

const LBS_PER_KG: f64 = 2.20462;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    Metric,
    #[default]
    Imperial,
}

impl UnitSystem {
    pub fn label(&self) -> &'static str {
        match self {
            UnitSystem::Metric => "kg",
            UnitSystem::Imperial => "lbs",
        }
    }

    /// Stored kg -> display value (one decimal for lbs)
    pub fn to_display(&self, kg: f64) -> f64 {
        match self {
            UnitSystem::Metric => kg,
            UnitSystem::Imperial => round_to(kg * LBS_PER_KG, 1),
        }
    }

    /// Display value -> stored kg (two decimals for lbs)
    pub fn to_kg(&self, value: f64) -> f64 {
        match self {
            UnitSystem::Metric => value,
            UnitSystem::Imperial => round_to(value / LBS_PER_KG, 2),
        }
    }

    pub fn format(&self, kg: Option<f64>) -> String {
        match kg {
            Some(kg) => format!("{} {}", self.to_display(kg), self.label()),
            None => "-".to_string(),
        }
    }
}

impl fmt::Display for UnitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitSystem::Metric => write!(f, "metric"),
            UnitSystem::Imperial => write!(f, "imperial"),
        }
    }
}

impl FromStr for UnitSystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "metric" | "kg" => Ok(UnitSystem::Metric),
            "imperial" | "lb" | "lbs" => Ok(UnitSystem::Imperial),
            other => Err(format!("unknown unit system '{}', expected metric or imperial", other)),
        }
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
