//! Procedural tree configuration tool.
//!
//! The schema is strict: every section is required, every numeric field is
//! range-bounded, and unknown keys are rejected at validation time as well as
//! advertised via `additionalProperties: false`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::tool_registry::Tool;

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TreeGenInput {
    pub seed: i64,
    pub trunk: TrunkSpec,
    pub branch: BranchSpec,
    #[serde(rename = "secondaryBranch")]
    pub secondary_branch: BranchSpec,
    pub twig: TwigSpec,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TrunkSpec {
    pub diameter: i64,
    pub height: i64,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BranchSpec {
    pub angle: i64,
    pub growth_rate: f64,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TwigSpec {
    pub density: i64,
    pub thickness: i64,
}

impl TreeGenInput {
    /// Range checks the JSON schema promises but deserialization alone
    /// cannot enforce.
    fn check_ranges(&self) -> Result<(), String> {
        int_in_range("seed", self.seed, 1, 100)?;
        int_in_range("trunk.diameter", self.trunk.diameter, 1, 100)?;
        int_in_range("trunk.height", self.trunk.height, 1, 100)?;
        int_in_range("branch.angle", self.branch.angle, 0, 180)?;
        float_in_range("branch.growth_rate", self.branch.growth_rate, 0.0, 1.0)?;
        int_in_range("secondaryBranch.angle", self.secondary_branch.angle, 0, 180)?;
        float_in_range(
            "secondaryBranch.growth_rate",
            self.secondary_branch.growth_rate,
            0.0,
            1.0,
        )?;
        int_in_range("twig.density", self.twig.density, 1, 100)?;
        int_in_range("twig.thickness", self.twig.thickness, 1, 100)?;
        Ok(())
    }
}

fn int_in_range(field: &str, value: i64, min: i64, max: i64) -> Result<(), String> {
    if value < min || value > max {
        return Err(format!(
            "{} must be between {} and {}, got {}",
            field, min, max, value
        ));
    }
    Ok(())
}

fn float_in_range(field: &str, value: f64, min: f64, max: f64) -> Result<(), String> {
    if !(min..=max).contains(&value) {
        return Err(format!(
            "{} must be between {} and {}, got {}",
            field, min, max, value
        ));
    }
    Ok(())
}

fn parse_strict(raw_arguments: &str) -> Result<TreeGenInput, String> {
    let input: TreeGenInput = serde_json::from_str(raw_arguments).map_err(|e| e.to_string())?;
    input.check_ranges()?;
    Ok(input)
}

pub struct TreeGenTool;

impl Tool for TreeGenTool {
    fn name(&self) -> &'static str {
        "generate_tree_config"
    }

    fn description(&self) -> &'static str {
        "Generate a full tree configuration using numeric values between 1 and 100."
    }

    fn system_prompt(&self) -> &'static str {
        "You are a procedural plant generation assistant. You will be asked to generate nested \
         configuration JSON describing a tree's structure using the `generate_tree_config` tool. \
         Each field is constrained by strict ranges and nested object structures. Return only \
         valid JSON that adheres exactly to the schema."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "seed": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 100,
                    "description": "Integer seed used to initialize deterministic tree generation."
                },
                "trunk": {
                    "type": "object",
                    "description": "Defines the main vertical structure of the tree (the trunk).",
                    "properties": {
                        "diameter": {
                            "type": "integer",
                            "minimum": 1,
                            "maximum": 100,
                            "description": "The diameter of the trunk base. Avoid width or radius-related variations."
                        },
                        "height": {
                            "type": "integer",
                            "minimum": 1,
                            "maximum": 100,
                            "description": "Total vertical height of the trunk."
                        }
                    },
                    "required": ["diameter", "height"],
                    "additionalProperties": false
                },
                "branch": {
                    "type": "object",
                    "description": "Describes primary branch parameters including shape or orientation.",
                    "properties": {
                        "angle": {
                            "type": "integer",
                            "minimum": 0,
                            "maximum": 180,
                            "description": "Angle at which primary branches extend from the trunk (degrees)."
                        },
                        "growth_rate": {
                            "type": "number",
                            "minimum": 0,
                            "maximum": 1,
                            "description": "Rate of branch extension over time."
                        }
                    },
                    "required": ["angle", "growth_rate"],
                    "additionalProperties": false
                },
                "secondaryBranch": {
                    "type": "object",
                    "description": "Describes secondary branches extending from primary branches.",
                    "properties": {
                        "angle": {
                            "type": "integer",
                            "minimum": 0,
                            "maximum": 180,
                            "description": "Angle of secondary branches relative to parent branch."
                        },
                        "growth_rate": {
                            "type": "number",
                            "minimum": 0,
                            "maximum": 1,
                            "description": "Rate of secondary branch expansion."
                        }
                    },
                    "required": ["angle", "growth_rate"],
                    "additionalProperties": false
                },
                "twig": {
                    "type": "object",
                    "description": "Describes twig structure parameters near the leaf level.",
                    "properties": {
                        "density": {
                            "type": "integer",
                            "minimum": 1,
                            "maximum": 100,
                            "description": "Compactness of twig growth per unit space."
                        },
                        "thickness": {
                            "type": "integer",
                            "minimum": 1,
                            "maximum": 100,
                            "description": "Physical diameter of a single twig."
                        }
                    },
                    "required": ["density", "thickness"],
                    "additionalProperties": false
                }
            },
            "required": ["seed", "trunk", "branch", "secondaryBranch", "twig"],
            "additionalProperties": false
        })
    }

    fn validate(&self, raw_arguments: &str) -> Result<(), String> {
        parse_strict(raw_arguments).map(|_| ())
    }

    fn run_from_json(&self, raw_arguments: &str) -> Result<String, String> {
        let input = parse_strict(raw_arguments)?;
        serde_json::to_string_pretty(&input).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_input() -> serde_json::Value {
        json!({
            "seed": 42,
            "trunk": {"diameter": 10, "height": 80},
            "branch": {"angle": 45, "growth_rate": 0.5},
            "secondaryBranch": {"angle": 30, "growth_rate": 0.3},
            "twig": {"density": 20, "thickness": 2}
        })
    }

    #[test]
    fn valid_config_echoes_back() {
        let raw = valid_input().to_string();
        let out = TreeGenTool.run_from_json(&raw).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed, valid_input());
    }

    #[test]
    fn seed_out_of_range_is_rejected() {
        let mut input = valid_input();
        input["seed"] = json!(0);
        let err = TreeGenTool.validate(&input.to_string()).unwrap_err();
        assert!(err.contains("seed"));
    }

    #[test]
    fn angle_above_180_is_rejected() {
        let mut input = valid_input();
        input["branch"]["angle"] = json!(181);
        assert!(TreeGenTool.validate(&input.to_string()).is_err());
    }

    #[test]
    fn growth_rate_above_one_is_rejected() {
        let mut input = valid_input();
        input["secondaryBranch"]["growth_rate"] = json!(1.5);
        assert!(TreeGenTool.validate(&input.to_string()).is_err());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut input = valid_input();
        input["trunk"]["radius"] = json!(5);
        assert!(TreeGenTool.validate(&input.to_string()).is_err());
    }

    #[test]
    fn missing_section_is_rejected() {
        let mut input = valid_input();
        input.as_object_mut().unwrap().remove("twig");
        assert!(TreeGenTool.validate(&input.to_string()).is_err());
    }

    #[test]
    fn output_preserves_wire_field_names() {
        let raw = valid_input().to_string();
        let out = TreeGenTool.run_from_json(&raw).unwrap();
        assert!(out.contains("secondaryBranch"));
        assert!(!out.contains("secondary_branch"));
    }
}
