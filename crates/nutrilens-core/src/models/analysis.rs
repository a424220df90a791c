//! Label analysis payload returned by `/analyze-label/`.
//!
//! The backend owns the content; these types only carry it to the renderer.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Structured feedback for one food label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct AnalysisResult {
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    /// Letter grade as sent; see [`AnalysisResult::rating`].
    #[serde(default)]
    pub health_rating: Option<String>,
    #[serde(default)]
    pub pros: Vec<String>,
    #[serde(default)]
    pub cons: Vec<ConItem>,
    #[serde(default)]
    pub ingredients_analysis: BTreeMap<String, Option<String>>,
    #[serde(default)]
    pub nutrient_levels: BTreeMap<String, NutrientLevel>,
}

impl AnalysisResult {
    pub fn rating(&self) -> Option<HealthRating> {
        self.health_rating.as_deref().and_then(HealthRating::parse)
    }

    pub fn display_name(&self) -> &str {
        match self.product_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => "Product Analysis",
        }
    }
}

/// A point to consider, tied to one nutrient.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ConItem {
    #[serde(default)]
    pub nutrient: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct NutrientLevel {
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// A to F grade, best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HealthRating {
    A,
    B,
    C,
    D,
    F,
}

impl HealthRating {
    /// Case-insensitive; anything else is `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Some(HealthRating::A),
            "B" => Some(HealthRating::B),
            "C" => Some(HealthRating::C),
            "D" => Some(HealthRating::D),
            "F" => Some(HealthRating::F),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthRating::A => "A",
            HealthRating::B => "B",
            HealthRating::C => "C",
            HealthRating::D => "D",
            HealthRating::F => "F",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            HealthRating::A => "Excellent",
            HealthRating::B => "Good",
            HealthRating::C => "Fair",
            HealthRating::D => "Poor",
            HealthRating::F => "Avoid",
        }
    }
}

impl fmt::Display for HealthRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
