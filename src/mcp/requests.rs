// src/mcp/requests.rs
// MCP tool request types

use std::str::FromStr;

use rmcp::schemars;
use serde::{Deserialize, Serialize};

use crate::analyzer::{AspectRatio, Category, Overrides, Resolution};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct GenerateImageRequest {
    #[schemars(description = "What the diagram or image should show")]
    pub prompt: String,
    #[schemars(description = "Output filename (optional; derived from the prompt when omitted)")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[schemars(
        description = "Diagram type: auto, architecture, flowchart, comparison, timeline, hierarchy, data, concept, infographic (default: auto)",
        extend("enum" = ["auto", "architecture", "flowchart", "comparison", "timeline", "hierarchy", "data", "concept", "infographic", null])
    )]
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub diagram_type: Option<String>,
    #[schemars(
        description = "Aspect ratio: 1:1, 16:9, 9:16, 4:3, 3:4, 21:9 (default: chosen from the diagram type)",
        extend("enum" = ["1:1", "16:9", "9:16", "4:3", "3:4", "21:9", null])
    )]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
    #[schemars(description = "Resolution: 1K, 2K, 4K (default: 2K)", extend("enum" = ["1K", "2K", "4K", null]))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct RefineImageRequest {
    #[schemars(description = "The change to apply to the most recently generated image")]
    pub refinement: String,
}

impl GenerateImageRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    /// Parse the enumerated fields into classification overrides.
    ///
    /// Blank values and `type: "auto"` mean "no override".
    pub fn overrides(&self) -> Result<Overrides, String> {
        let category = match non_blank(&self.diagram_type) {
            None => None,
            Some(t) if t.eq_ignore_ascii_case("auto") => None,
            Some(t) => Some(Category::from_str(t).map_err(|_| {
                format!(
                    "Invalid type '{}'. Use one of: auto, {}",
                    t,
                    join(Category::CATALOGUE.iter())
                )
            })?),
        };

        let aspect_ratio = non_blank(&self.aspect_ratio)
            .map(|a| {
                AspectRatio::from_str(a).map_err(|_| {
                    format!(
                        "Invalid aspect_ratio '{}'. Use one of: {}",
                        a,
                        join(AspectRatio::ALL.iter())
                    )
                })
            })
            .transpose()?;

        let resolution = non_blank(&self.size)
            .map(|s| {
                Resolution::from_str(s).map_err(|_| {
                    format!("Invalid size '{}'. Use one of: {}", s, join(Resolution::ALL.iter()))
                })
            })
            .transpose()?;

        Ok(Overrides {
            category,
            aspect_ratio,
            resolution,
        })
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn join<T: std::fmt::Display>(items: impl Iterator<Item = T>) -> String {
    items.map(|i| i.to_string()).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_field_names() {
        let req: GenerateImageRequest = serde_json::from_value(json!({
            "prompt": "auth flow",
            "type": "flowchart",
            "aspect_ratio": "4:3",
            "size": "4K",
            "output": "auth.png"
        }))
        .unwrap();
        assert_eq!(req.diagram_type.as_deref(), Some("flowchart"));
        let overrides = req.overrides().unwrap();
        assert_eq!(overrides.category, Some(Category::Flowchart));
        assert_eq!(overrides.aspect_ratio, Some(AspectRatio::Standard));
        assert_eq!(overrides.resolution, Some(Resolution::Large));
    }

    #[test]
    fn test_auto_and_blank_mean_no_override() {
        let mut req = GenerateImageRequest::new("x");
        req.diagram_type = Some("AUTO".into());
        req.size = Some(" ".into());
        assert_eq!(req.overrides().unwrap(), Overrides::default());
    }

    #[test]
    fn test_invalid_values_name_accepted_ones() {
        let mut req = GenerateImageRequest::new("x");
        req.aspect_ratio = Some("2:1".into());
        let err = req.overrides().unwrap_err();
        assert!(err.contains("16:9") && err.contains("21:9"));

        let mut req = GenerateImageRequest::new("x");
        req.diagram_type = Some("sankey".into());
        let err = req.overrides().unwrap_err();
        assert!(err.contains("infographic"));

        let mut req = GenerateImageRequest::new("x");
        req.size = Some("8K".into());
        assert!(req.overrides().unwrap_err().contains("2K"));
    }

    fn schema_enum(schema: &serde_json::Value, field: &str) -> Vec<String> {
        schema
            .pointer(&format!("/properties/{field}/enum"))
            .and_then(|v| v.as_array())
            .unwrap_or_else(|| panic!("{field} has no enum"))
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect()
    }

    #[test]
    fn test_schema_enums_match_accepted_values() {
        let schema = serde_json::to_value(schemars::schema_for!(GenerateImageRequest)).unwrap();

        let mut types = vec!["auto".to_string()];
        types.extend(Category::CATALOGUE.iter().map(|c| c.to_string()));
        assert_eq!(schema_enum(&schema, "type"), types);

        let ratios: Vec<String> = AspectRatio::ALL.iter().map(|a| a.to_string()).collect();
        assert_eq!(schema_enum(&schema, "aspect_ratio"), ratios);

        let sizes: Vec<String> = Resolution::ALL.iter().map(|r| r.to_string()).collect();
        assert_eq!(schema_enum(&schema, "size"), sizes);
    }

    #[test]
    fn test_omitted_optionals_not_serialized() {
        let value = serde_json::to_value(GenerateImageRequest::new("x")).unwrap();
        assert_eq!(value, json!({ "prompt": "x" }));
    }
}
