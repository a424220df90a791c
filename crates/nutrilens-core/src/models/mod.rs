//! Data models exchanged with the NutriLens backend.
//!
//! - `AnalysisResult`, `ConItem`, `NutrientLevel`, `HealthRating`: label
//!   analysis feedback
//! - `HealthProfile`, `ProfileForm`: personalization inputs and their
//!   text-backed editing form

pub mod analysis;
pub mod profile;

pub use analysis::{AnalysisResult, ConItem, HealthRating, NutrientLevel};
pub use profile::{ActivityLevel, FormError, Gender, HealthProfile, PrimaryGoal, ProfileForm};
