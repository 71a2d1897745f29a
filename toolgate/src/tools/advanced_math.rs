//! Binary math tool.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::tool_registry::Tool;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MathOperation {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
    Modulo,
}

#[derive(Debug, Deserialize)]
pub struct AdvancedMathInput {
    pub operation: MathOperation,
    pub a: f64,
    pub b: f64,
}

pub struct AdvancedMathTool;

impl AdvancedMathTool {
    fn evaluate(input: &AdvancedMathInput) -> String {
        let (a, b) = (input.a, input.b);
        let result = match input.operation {
            MathOperation::Add => a + b,
            MathOperation::Subtract => a - b,
            MathOperation::Multiply => a * b,
            MathOperation::Power => a.powf(b),
            MathOperation::Divide => {
                if b == 0.0 {
                    return "undefined".to_string();
                }
                a / b
            }
            MathOperation::Modulo => {
                if b == 0.0 {
                    return "undefined".to_string();
                }
                a % b
            }
        };
        // f64 Display renders integral values without a fractional part
        result.to_string()
    }
}

impl Tool for AdvancedMathTool {
    fn name(&self) -> &'static str {
        "advanced_math_operation"
    }

    fn description(&self) -> &'static str {
        "Perform a binary math operation between two numeric inputs."
    }

    fn system_prompt(&self) -> &'static str {
        "You are a helpful assistant that can perform basic math operations. \
         You will receive two numeric inputs and an operation to perform on them. \
         You must use the `advanced_math_operation` tool to complete the task."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "operation": {
                    "type": "string",
                    "enum": ["add", "subtract", "multiply", "divide", "power", "modulo"]
                },
                "a": {"type": "number", "description": "First numeric input"},
                "b": {"type": "number", "description": "Second numeric input"}
            },
            "required": ["operation", "a", "b"]
        })
    }

    fn validate(&self, raw_arguments: &str) -> Result<(), String> {
        serde_json::from_str::<AdvancedMathInput>(raw_arguments)
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    fn run_from_json(&self, raw_arguments: &str) -> Result<String, String> {
        let input: AdvancedMathInput =
            serde_json::from_str(raw_arguments).map_err(|e| e.to_string())?;
        Ok(Self::evaluate(&input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(raw: &str) -> String {
        AdvancedMathTool.run_from_json(raw).unwrap()
    }

    #[test]
    fn basic_operations() {
        assert_eq!(run(r#"{"operation":"add","a":2,"b":3}"#), "5");
        assert_eq!(run(r#"{"operation":"subtract","a":2,"b":3}"#), "-1");
        assert_eq!(run(r#"{"operation":"multiply","a":4,"b":2.5}"#), "10");
        assert_eq!(run(r#"{"operation":"power","a":2,"b":10}"#), "1024");
    }

    #[test]
    fn integral_results_render_without_fraction() {
        assert_eq!(run(r#"{"operation":"divide","a":10,"b":2}"#), "5");
    }

    #[test]
    fn fractional_results_keep_fraction() {
        assert_eq!(run(r#"{"operation":"divide","a":1,"b":2}"#), "0.5");
    }

    #[test]
    fn divide_by_zero_is_undefined() {
        assert_eq!(run(r#"{"operation":"divide","a":1,"b":0}"#), "undefined");
        assert_eq!(run(r#"{"operation":"modulo","a":1,"b":0}"#), "undefined");
    }

    #[test]
    fn unknown_operation_fails_validation() {
        let result = AdvancedMathTool.validate(r#"{"operation":"cube","a":1,"b":2}"#);
        assert!(result.is_err());
    }

    #[test]
    fn missing_operand_fails_validation() {
        assert!(AdvancedMathTool
            .validate(r#"{"operation":"add","a":1}"#)
            .is_err());
    }
}
