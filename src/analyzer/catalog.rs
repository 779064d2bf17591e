// src/analyzer/catalog.rs
// Diagram category catalogue, composition enums and hint vocabularies

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// Diagram category recognised by the analyzer
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Category {
    Architecture,
    Flowchart,
    Comparison,
    Timeline,
    Hierarchy,
    Data,
    Concept,
    Infographic,
    /// Fallback when nothing in the prompt matched
    Visualization,
}

impl Category {
    /// Scored categories in ranking order. Equal scores keep this order.
    pub const CATALOGUE: [Category; 8] = [
        Category::Architecture,
        Category::Flowchart,
        Category::Comparison,
        Category::Timeline,
        Category::Hierarchy,
        Category::Data,
        Category::Concept,
        Category::Infographic,
    ];

    pub fn as_str(self) -> &'static str {
        self.into()
    }

    /// Trigger phrases; each match contributes its word count
    pub fn triggers(self) -> &'static [&'static str] {
        match self {
            Category::Architecture => &[
                "system architecture",
                "architecture",
                "microservices",
                "microservice",
                "components",
                "infrastructure",
                "service mesh",
                "api gateway",
                "load balancer",
                "database",
                "backend",
                "deployment",
            ],
            Category::Flowchart => &[
                "flowchart",
                "flow chart",
                "process flow",
                "workflow",
                "steps",
                "step by step",
                "decision tree",
                "pipeline",
                "process",
                "user journey",
            ],
            Category::Comparison => &[
                "before after",
                "compare",
                "comparison",
                "vs",
                "versus",
                "side by side",
                "pros cons",
                "difference",
                "tradeoffs",
                "trade offs",
            ],
            Category::Timeline => &[
                "timeline",
                "roadmap",
                "milestones",
                "history",
                "phases",
                "quarterly plan",
                "release schedule",
                "evolution",
            ],
            Category::Hierarchy => &[
                "org chart",
                "hierarchy",
                "organization chart",
                "tree",
                "taxonomy",
                "reporting structure",
                "levels",
            ],
            Category::Data => &[
                "bar chart",
                "pie chart",
                "line chart",
                "chart",
                "graph",
                "metrics",
                "statistics",
                "dashboard",
                "latency",
                "throughput",
                "percent",
                "growth",
                "kpi",
            ],
            Category::Concept => &[
                "mind map",
                "concept map",
                "concept",
                "brainstorm",
                "ideas",
                "relationships",
                "mental model",
            ],
            Category::Infographic => &[
                "infographic",
                "cheat sheet",
                "key points",
                "summary",
                "overview",
                "tips",
                "facts",
            ],
            Category::Visualization => &[],
        }
    }

    pub fn default_aspect(self) -> AspectRatio {
        match self {
            Category::Architecture => AspectRatio::Wide,
            Category::Flowchart => AspectRatio::Standard,
            Category::Comparison => AspectRatio::Wide,
            Category::Timeline => AspectRatio::UltraWide,
            Category::Hierarchy => AspectRatio::Standard,
            Category::Data => AspectRatio::Wide,
            Category::Concept => AspectRatio::Square,
            Category::Infographic => AspectRatio::Tall,
            Category::Visualization => AspectRatio::Wide,
        }
    }

    /// One-line compositional hint shown in clarifying questions
    pub fn hint(self) -> &'static str {
        match self {
            Category::Architecture => "boxes for services and components connected by labelled arrows",
            Category::Flowchart => "sequential steps and decision points flowing top to bottom",
            Category::Comparison => "two or more options side by side with matching rows",
            Category::Timeline => "events or milestones laid out along a horizontal axis",
            Category::Hierarchy => "a tree of levels from a single root downwards",
            Category::Data => "charts and numbers with labelled axes",
            Category::Concept => "a central idea with related concepts radiating outwards",
            Category::Infographic => "stacked sections of icons, headings and short facts",
            Category::Visualization => "a general-purpose illustration",
        }
    }

    /// Style guidance prepended to the generation prompt
    pub fn guidance(self) -> &'static str {
        match self {
            Category::Architecture => {
                "Create a clean technical architecture diagram. Use rounded boxes for components, \
                 group related services, and connect them with clearly labelled directional arrows."
            }
            Category::Flowchart => {
                "Create a clear flowchart. Use rectangles for steps, diamonds for decisions, \
                 and arrows showing the direction of flow. Keep the layout uncluttered."
            }
            Category::Comparison => {
                "Create a side-by-side comparison graphic. Align equivalent attributes in rows \
                 and use contrasting colours to distinguish the options being compared."
            }
            Category::Timeline => {
                "Create a horizontal timeline. Place events in chronological order along a single \
                 axis with dates or phase labels and short descriptions."
            }
            Category::Hierarchy => {
                "Create a hierarchical tree diagram. Start from a single root at the top and show \
                 each level beneath it with consistent spacing and connecting lines."
            }
            Category::Data => {
                "Create a data visualization. Use accurate, clearly labelled charts with axes, \
                 legends and highlighted key numbers."
            }
            Category::Concept => {
                "Create a concept map. Put the central idea in the middle and arrange related \
                 concepts around it with labelled connections."
            }
            Category::Infographic => {
                "Create a vertical infographic. Organise the content into distinct sections with \
                 icons, bold headings and concise supporting text."
            }
            Category::Visualization => {
                "Create a clean, professional visual with legible text and a simple colour palette."
            }
        }
    }
}

/// Output aspect ratio accepted by the generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum AspectRatio {
    #[strum(serialize = "1:1")]
    #[serde(rename = "1:1")]
    Square,
    #[strum(serialize = "16:9")]
    #[serde(rename = "16:9")]
    Wide,
    #[strum(serialize = "9:16")]
    #[serde(rename = "9:16")]
    Tall,
    #[strum(serialize = "4:3")]
    #[serde(rename = "4:3")]
    Standard,
    #[strum(serialize = "3:4")]
    #[serde(rename = "3:4")]
    Portrait,
    #[strum(serialize = "21:9")]
    #[serde(rename = "21:9")]
    UltraWide,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 6] = [
        AspectRatio::Square,
        AspectRatio::Wide,
        AspectRatio::Tall,
        AspectRatio::Standard,
        AspectRatio::Portrait,
        AspectRatio::UltraWide,
    ];
}

/// Output resolution tier
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum Resolution {
    #[strum(serialize = "1K")]
    #[serde(rename = "1K")]
    Small,
    #[default]
    #[strum(serialize = "2K")]
    #[serde(rename = "2K")]
    Medium,
    #[strum(serialize = "4K")]
    #[serde(rename = "4K")]
    Large,
}

impl Resolution {
    pub const ALL: [Resolution; 3] = [Resolution::Small, Resolution::Medium, Resolution::Large];
}

/// Words that push the recommendation to the largest tier
const LARGE_RESOLUTION_HINTS: &[&str] = &[
    "presentation",
    "slide",
    "slides",
    "high res",
    "hi res",
    "4k",
    "print",
];

/// Words that push the recommendation to the smallest tier
const SMALL_RESOLUTION_HINTS: &[&str] = &["thumbnail", "small", "preview", "icon"];

/// Composition words that force an aspect ratio; first match wins
const COMPOSITION_HINTS: &[(&str, AspectRatio)] = &[
    ("square", AspectRatio::Square),
    ("portrait", AspectRatio::Tall),
    ("vertical", AspectRatio::Tall),
    ("banner", AspectRatio::UltraWide),
    ("wide", AspectRatio::Wide),
    ("widescreen", AspectRatio::Wide),
];

/// Lowercase the prompt and split it into alphanumeric words
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(String::from)
        .collect()
}

/// Words too common to anchor a phrase on their own
const FILLER_WORDS: &[&str] = &["a", "an", "and", "by", "for", "of", "on", "or", "the", "to"];

/// True when every word of the phrase occurs in the prompt as a whole word.
///
/// Phrases containing a filler word ("side by side") must appear as a
/// contiguous run instead.
pub fn phrase_matches(words: &[String], phrase: &str) -> bool {
    let needles: Vec<&str> = phrase.split_whitespace().collect();
    if needles.iter().any(|n| FILLER_WORDS.contains(n)) {
        return words
            .windows(needles.len())
            .any(|window| window.iter().zip(&needles).all(|(w, n)| w == n));
    }
    needles
        .iter()
        .all(|needle| words.iter().any(|w| w == needle))
}

/// Weight of a phrase (its word count)
pub fn phrase_weight(phrase: &str) -> u32 {
    phrase.split_whitespace().count() as u32
}

/// Resolution implied by hint words, if any
pub fn resolution_hint(words: &[String]) -> Option<Resolution> {
    if LARGE_RESOLUTION_HINTS.iter().any(|p| phrase_matches(words, p)) {
        Some(Resolution::Large)
    } else if SMALL_RESOLUTION_HINTS.iter().any(|p| phrase_matches(words, p)) {
        Some(Resolution::Small)
    } else {
        None
    }
}

/// Aspect ratio implied by composition words, if any
pub fn composition_hint(words: &[String]) -> Option<AspectRatio> {
    COMPOSITION_HINTS
        .iter()
        .find(|(word, _)| phrase_matches(words, word))
        .map(|(_, aspect)| *aspect)
}
