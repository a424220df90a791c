//! Health profile sent to and read from `/profile/`.
//!
//! The backend validates the values; locally we only parse numbers and offer
//! the known choice vocabularies.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Biometric and lifestyle inputs used to personalize an analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct HealthProfile {
    /// Years. Fractional values from the backend are truncated.
    #[serde(default, deserialize_with = "whole_number")]
    pub age: Option<i64>,
    /// Kilograms.
    #[serde(default)]
    pub weight: Option<f64>,
    /// Centimetres.
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub activity_level: Option<String>,
    #[serde(default)]
    pub primary_goal: Option<String>,
    #[serde(default)]
    pub health_conditions: Option<String>,
    #[serde(default)]
    pub allergies: Option<String>,
}

fn whole_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    let value: Option<f64> = Option::deserialize(d)?;
    Ok(value.filter(|v| v.is_finite()).map(|v| v.trunc() as i64))
}

#[derive(Error, Debug, PartialEq)]
pub enum FormError {
    #[error("{field} must be a whole number, got '{value}'")]
    NotAnInteger { field: &'static str, value: String },

    #[error("{field} must be a number, got '{value}'")]
    NotANumber { field: &'static str, value: String },

    #[error("Unknown {field} '{value}' (expected one of: {expected})")]
    UnknownChoice {
        field: &'static str,
        value: String,
        expected: String,
    },
}

/// Declares a closed vocabulary with its wire spelling.
macro_rules! choice {
    ($name:ident, $field:literal, default = $default:ident, { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = FormError;

            /// Case- and spacing-insensitive ("very_active" == "Very Active").
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = normalize(s);
                $name::ALL
                    .iter()
                    .copied()
                    .find(|c| normalize(c.as_str()) == wanted)
                    .ok_or_else(|| FormError::UnknownChoice {
                        field: $field,
                        value: s.to_string(),
                        expected: $name::ALL
                            .iter()
                            .map(|c| c.as_str())
                            .collect::<Vec<_>>()
                            .join(", "),
                    })
            }
        }
    };
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

choice!(Gender, "gender", default = Male, {
    Male => "Male",
    Female => "Female",
    Other => "Other",
});

choice!(ActivityLevel, "activity level", default = Sedentary, {
    Sedentary => "Sedentary",
    Light => "Light",
    Moderate => "Moderate",
    Active => "Active",
    VeryActive => "Very Active",
});

choice!(PrimaryGoal, "primary goal", default = MaintainWeight, {
    MaintainWeight => "Maintain Weight",
    LoseWeight => "Lose Weight",
    GainMuscle => "Gain Muscle",
});

/// Text-backed editing state for a profile, as a form would hold it.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileForm {
    pub age: String,
    pub weight: String,
    pub height: String,
    pub gender: String,
    pub activity_level: String,
    pub primary_goal: String,
    pub health_conditions: String,
    pub allergies: String,
}

impl Default for ProfileForm {
    fn default() -> Self {
        Self::from_profile(&HealthProfile::default())
    }
}

impl ProfileForm {
    /// Populate from a fetched profile, filling the choice defaults.
    pub fn from_profile(profile: &HealthProfile) -> Self {
        fn text<T: ToString>(v: &Option<T>) -> String {
            v.as_ref().map(|v| v.to_string()).unwrap_or_default()
        }
        fn choice(v: &Option<String>, default: &str) -> String {
            match v.as_deref() {
                Some(s) if !s.is_empty() => s.to_string(),
                _ => default.to_string(),
            }
        }

        Self {
            age: text(&profile.age),
            weight: text(&profile.weight),
            height: text(&profile.height),
            gender: choice(&profile.gender, Gender::default().as_str()),
            activity_level: choice(&profile.activity_level, ActivityLevel::default().as_str()),
            primary_goal: choice(&profile.primary_goal, PrimaryGoal::default().as_str()),
            health_conditions: text(&profile.health_conditions),
            allergies: text(&profile.allergies),
        }
    }

    /// Build the wire profile. Blank fields become `null`.
    pub fn to_profile(&self) -> Result<HealthProfile, FormError> {
        Ok(HealthProfile {
            age: parse_leading_int(&self.age)?,
            weight: parse_optional(&self.weight, |value| FormError::NotANumber {
                field: "weight",
                value,
            })?,
            height: parse_optional(&self.height, |value| FormError::NotANumber {
                field: "height",
                value,
            })?,
            gender: non_empty(&self.gender),
            activity_level: non_empty(&self.activity_level),
            primary_goal: non_empty(&self.primary_goal),
            health_conditions: non_empty(&self.health_conditions),
            allergies: non_empty(&self.allergies),
        })
    }
}

fn parse_optional<T: FromStr>(
    raw: &str,
    err: impl FnOnce(String) -> FormError,
) -> Result<Option<T>, FormError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<T>()
        .map(Some)
        .map_err(|_| err(trimmed.to_string()))
}

/// Leading integer of the input, like "30 years" or "41.5"; the backend
/// range-checks the value.
fn parse_leading_int(raw: &str) -> Result<Option<i64>, FormError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let sign_len = usize::from(trimmed.starts_with(&['+', '-'][..]));
    let digits = trimmed[sign_len..]
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len() - sign_len);
    trimmed[..sign_len + digits]
        .parse::<i64>()
        .map(Some)
        .map_err(|_| FormError::NotAnInteger {
            field: "age",
            value: trimmed.to_string(),
        })
}

fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
