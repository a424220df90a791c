//! Plain-text rendering of analysis results and health profiles.

use std::fmt::Write;

use nutrilens_core::models::{AnalysisResult, HealthProfile, ProfileForm};

use crate::format::{humanize_key, truncate_string, wrap_text};

/// Column width for wrapped paragraphs.
const WRAP_WIDTH: usize = 72;

/// Longest ingredient note shown before truncating.
const MAX_NOTE_LENGTH: usize = 60;

pub const DISCLAIMER: &str =
    "*Analysis is based on general dietary guidelines from the WHO & FSSAI. This is not medical advice.";

fn paragraph(out: &mut String, indent: &str, text: &str) {
    for line in wrap_text(text, WRAP_WIDTH) {
        let _ = writeln!(out, "{}{}", indent, line);
    }
}

/// Render one analysis the way the results screen lays it out.
pub fn analysis(result: &AnalysisResult) -> String {
    let mut out = String::new();
    let title = result.display_name();
    let _ = writeln!(out, "{}", title);
    let _ = writeln!(out, "{}", "=".repeat(title.chars().count()));

    match (result.rating(), result.health_rating.as_deref()) {
        (Some(rating), _) => {
            let _ = writeln!(out, "Health Rating: {} ({})", rating, rating.description());
        }
        (None, Some(raw)) if !raw.trim().is_empty() => {
            let _ = writeln!(out, "Health Rating: {}", raw.trim());
        }
        _ => {}
    }

    if let Some(summary) = result.summary.as_deref().filter(|s| !s.trim().is_empty()) {
        let _ = writeln!(out, "\nPersonalized Summary");
        paragraph(&mut out, "  ", summary);
    }

    let _ = writeln!(out, "\nPositive Aspects");
    if result.pros.is_empty() {
        let _ = writeln!(out, "  No positive aspects identified.");
    } else {
        for pro in &result.pros {
            let _ = writeln!(out, "  + {}", pro);
        }
    }

    let _ = writeln!(out, "\nPoints to Consider");
    if result.cons.is_empty() {
        let _ = writeln!(out, "  No points to consider identified.");
    } else {
        for con in &result.cons {
            let mut headline = format!("  - {} is {}", humanize_key(&con.nutrient), con.level);
            if !con.value.is_empty() {
                let _ = write!(headline, " ({})", con.value);
            }
            let _ = writeln!(out, "{}", headline);
            if !con.reasoning.is_empty() {
                paragraph(&mut out, "      ", &con.reasoning);
            }
            if !con.source.is_empty() {
                let _ = writeln!(out, "      Source: {}", con.source);
            }
        }
    }

    if !result.ingredients_analysis.is_empty() {
        let _ = writeln!(out, "\nIngredients");
        for (ingredient, note) in &result.ingredients_analysis {
            match note.as_deref().filter(|n| !n.is_empty()) {
                Some(note) => {
                    let _ = writeln!(
                        out,
                        "  {}: {}",
                        ingredient,
                        truncate_string(note, MAX_NOTE_LENGTH)
                    );
                }
                None => {
                    let _ = writeln!(out, "  {}", ingredient);
                }
            }
        }
    }

    let _ = writeln!(out, "\n{}", DISCLAIMER);
    out
}

/// Render a profile, with the form defaults filled in for blanks.
pub fn profile(profile: Option<&HealthProfile>) -> String {
    let form = match profile {
        Some(p) => ProfileForm::from_profile(p),
        None => ProfileForm::default(),
    };
    let blank = |s: &str| {
        if s.is_empty() {
            "-".to_string()
        } else {
            s.to_string()
        }
    };

    let mut out = String::new();
    if profile.is_none() {
        let _ = writeln!(out, "No profile saved yet. Defaults shown; use `nutrilens profile set` to create one.\n");
    }
    let _ = writeln!(out, "Biometrics");
    let _ = writeln!(out, "  Age:               {}", blank(&form.age));
    let _ = writeln!(out, "  Weight (kg):       {}", blank(&form.weight));
    let _ = writeln!(out, "  Height (cm):       {}", blank(&form.height));
    let _ = writeln!(out, "  Gender:            {}", form.gender);
    let _ = writeln!(out, "\nGoals & Lifestyle");
    let _ = writeln!(out, "  Activity level:    {}", form.activity_level);
    let _ = writeln!(out, "  Primary goal:      {}", form.primary_goal);
    let _ = writeln!(out, "\nConditions & Allergies");
    let _ = writeln!(out, "  Health conditions: {}", blank(&form.health_conditions));
    let _ = writeln!(out, "  Allergies:         {}", blank(&form.allergies));
    out
}
