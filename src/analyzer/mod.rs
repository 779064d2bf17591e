// src/analyzer/mod.rs
// Prompt classification: category, confidence and composition recommendation

mod catalog;

pub use catalog::{AspectRatio, Category, Resolution, tokenize};

use catalog::{composition_hint, phrase_matches, phrase_weight, resolution_hint};

/// Confidence tier of a classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// Caller-supplied values that take precedence over heuristics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Overrides {
    pub category: Option<Category>,
    pub aspect_ratio: Option<AspectRatio>,
    pub resolution: Option<Resolution>,
}

/// What the caller should do with a classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Go ahead; medium confidence attaches human-readable suggestions
    Proceed { suggestions: Vec<String> },
    /// Ask the caller to resupply the call with an explicit type
    Clarify(String),
}

/// Ephemeral output of [`classify`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationResult {
    pub category: Category,
    pub confidence: Confidence,
    /// Other matching categories with their scores, best first
    pub alternatives: Vec<(Category, u32)>,
    pub aspect_ratio: AspectRatio,
    pub resolution: Resolution,
    pub decision: Decision,
}

impl ClassificationResult {
    pub fn should_proceed(&self) -> bool {
        matches!(self.decision, Decision::Proceed { .. })
    }

    pub fn clarifying_question(&self) -> Option<&str> {
        match &self.decision {
            Decision::Clarify(question) => Some(question),
            Decision::Proceed { .. } => None,
        }
    }

    pub fn suggestions(&self) -> &[String] {
        match &self.decision {
            Decision::Proceed { suggestions } => suggestions,
            Decision::Clarify(_) => &[],
        }
    }
}

/// Runner-up is "close" at or above this fraction of the top score
const CLOSE_RUNNER_RATIO: f64 = 0.7;

/// Score every catalogue category against the prompt.
///
/// Returned in catalogue order; a category's score is the summed word count of
/// its matched trigger phrases.
pub fn score(prompt: &str) -> Vec<(Category, u32)> {
    let words = tokenize(prompt);
    Category::CATALOGUE
        .iter()
        .map(|&category| {
            let total = category
                .triggers()
                .iter()
                .filter(|phrase| phrase_matches(&words, phrase))
                .map(|phrase| phrase_weight(phrase))
                .sum();
            (category, total)
        })
        .collect()
}

/// Classify a prompt into a diagram category plus composition parameters.
///
/// Pure and deterministic. Ties between equally scored categories resolve in
/// [`Category::CATALOGUE`] order.
pub fn classify(prompt: &str, overrides: &Overrides) -> ClassificationResult {
    let words = tokenize(prompt);
    let resolution = overrides
        .resolution
        .or_else(|| resolution_hint(&words))
        .unwrap_or_default();
    let forced_aspect = overrides.aspect_ratio.or_else(|| composition_hint(&words));

    let mut ranked = score(prompt);
    // Stable sort keeps catalogue order among equal scores
    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    if let Some(category) = overrides.category {
        return ClassificationResult {
            category,
            confidence: Confidence::High,
            alternatives: Vec::new(),
            aspect_ratio: forced_aspect.unwrap_or_else(|| category.default_aspect()),
            resolution,
            decision: Decision::Proceed {
                suggestions: Vec::new(),
            },
        };
    }

    let (top, top_score) = ranked[0];
    let alternatives: Vec<(Category, u32)> = ranked[1..]
        .iter()
        .copied()
        .filter(|(_, s)| *s > 0)
        .collect();

    if top_score == 0 {
        let category = Category::Visualization;
        return ClassificationResult {
            category,
            confidence: Confidence::Low,
            alternatives,
            aspect_ratio: forced_aspect.unwrap_or_else(|| category.default_aspect()),
            resolution,
            decision: Decision::Clarify(unmatched_question()),
        };
    }

    let runner_score = alternatives.first().map(|(_, s)| *s).unwrap_or(0);
    let close_runner = runner_score > 0 && runner_score as f64 >= top_score as f64 * CLOSE_RUNNER_RATIO;

    let confidence = if top_score >= 3 && !close_runner {
        Confidence::High
    } else if top_score >= 2 || !close_runner {
        Confidence::Medium
    } else {
        Confidence::Low
    };

    let decision = match confidence {
        Confidence::High => Decision::Proceed {
            suggestions: Vec::new(),
        },
        Confidence::Medium => Decision::Proceed {
            suggestions: alternatives
                .iter()
                .map(|(c, _)| format!("If this should be a {} diagram, pass type=\"{}\".", c, c))
                .collect(),
        },
        Confidence::Low => Decision::Clarify(ambiguous_question(top, &alternatives)),
    };

    ClassificationResult {
        category: top,
        confidence,
        alternatives,
        aspect_ratio: forced_aspect.unwrap_or_else(|| top.default_aspect()),
        resolution,
        decision,
    }
}

fn unmatched_question() -> String {
    let mut lines = vec![
        "I couldn't tell what kind of diagram you want. Please call generate_image again with an explicit `type`:"
            .to_string(),
    ];
    for category in Category::CATALOGUE {
        lines.push(format!("- {}: {}", category, category.hint()));
    }
    lines.join("\n")
}

fn ambiguous_question(top: Category, alternatives: &[(Category, u32)]) -> String {
    let mut lines = vec![
        "Your prompt could describe more than one kind of diagram. Please call generate_image again with an explicit `type`:"
            .to_string(),
    ];
    lines.push(format!("- {}: {}", top, top.hint()));
    for (category, _) in alternatives {
        lines.push(format!("- {}: {}", category, category.hint()));
    }
    lines.join("\n")
}

/// Build the prompt actually sent to the generator
pub fn enhance_prompt(
    prompt: &str,
    category: Category,
    aspect_ratio: AspectRatio,
    resolution: Resolution,
) -> String {
    format!(
        "{}\n\nComposition: {} aspect ratio at {} resolution. Use crisp, legible text labels.\n\n{}",
        category.guidance(),
        aspect_ratio,
        resolution,
        prompt.trim()
    )
}
