//! Tool registry: specs, validation, and isolated execution.

use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::protocol::{ToolCallMap, ValidationResult};
use crate::tools::{AdvancedMathTool, TreeGenTool};

/// A tool the gateway can advertise and execute.
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// JSON Schema for the tool's arguments object.
    fn parameters_schema(&self) -> Value;
    /// Steering fragment contributed to the stage-one system message.
    fn system_prompt(&self) -> &'static str;
    /// Check raw argument JSON against the tool's schema.
    fn validate(&self, raw_arguments: &str) -> Result<(), String>;
    /// Parse and execute. The returned string goes back to the model verbatim.
    fn run_from_json(&self, raw_arguments: &str) -> Result<String, String>;

    /// OpenAI `tools` array entry for this tool.
    fn spec(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name(),
                "description": self.description(),
                "parameters": self.parameters_schema(),
            }
        })
    }
}

pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new(tools: Vec<Box<dyn Tool>>) -> Self {
        Self { tools }
    }

    /// Registry with the built-in tool set.
    pub fn builtin() -> Self {
        Self::new(vec![Box::new(AdvancedMathTool), Box::new(TreeGenTool)])
    }

    pub fn all_specs(&self) -> Vec<Value> {
        self.tools.iter().map(|t| t.spec()).collect()
    }

    /// Concatenated steering prompts of every registered tool.
    pub fn steering_prompt(&self) -> String {
        self.tools
            .iter()
            .map(|t| t.system_prompt())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    /// Validate every call in the map. Calls naming an unregistered tool are
    /// rejected rather than skipped.
    pub fn validate_all(&self, calls: &ToolCallMap) -> BTreeMap<String, ValidationResult> {
        let mut results = BTreeMap::new();
        for (name, call) in calls {
            let result = match self.find(name) {
                Some(tool) => match tool.validate(&call.arguments) {
                    Ok(()) => ValidationResult::ok(),
                    Err(reason) => ValidationResult::rejected(reason),
                },
                None => ValidationResult::rejected(format!("unknown tool '{}'", name)),
            };
            results.insert(name.clone(), result);
        }
        results
    }

    /// Execute every call in the map. A failing call contributes an error
    /// string under its own key and never disturbs its siblings.
    pub fn execute_all(&self, calls: &ToolCallMap) -> BTreeMap<String, String> {
        let mut results = BTreeMap::new();
        for (name, call) in calls {
            let output = match self.find(name) {
                Some(tool) => match tool.run_from_json(&call.arguments) {
                    Ok(output) => output,
                    Err(e) => {
                        println!("[ToolRegistry] Tool '{}' failed: {}", name, e);
                        format!("Error: {}", e)
                    }
                },
                None => format!("Error: unknown tool '{}'", name),
            };
            results.insert(name.clone(), output);
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ToolCall;

    fn call(name: &str, arguments: &str) -> (String, ToolCall) {
        (
            name.to_string(),
            ToolCall {
                id: format!("call_{}", name),
                name: name.to_string(),
                arguments: arguments.to_string(),
            },
        )
    }

    #[test]
    fn builtin_registry_advertises_both_tools() {
        let registry = ToolRegistry::builtin();
        let specs = registry.all_specs();
        assert_eq!(specs.len(), 2);
        for spec in &specs {
            assert_eq!(spec["type"], "function");
            assert!(spec["function"]["name"].is_string());
            assert!(spec["function"]["parameters"].is_object());
        }
    }

    #[test]
    fn steering_prompt_includes_every_tool() {
        let prompt = ToolRegistry::builtin().steering_prompt();
        assert!(prompt.contains("advanced_math_operation"));
        assert!(prompt.contains("generate_tree_config"));
    }

    #[test]
    fn validate_all_flags_only_the_bad_call() {
        let registry = ToolRegistry::builtin();
        let calls: ToolCallMap = [
            call("advanced_math_operation", r#"{"operation":"add","a":1,"b":2}"#),
            call("generate_tree_config", r#"{"seed":999}"#),
        ]
        .into_iter()
        .collect();

        let validation = registry.validate_all(&calls);
        assert!(validation["advanced_math_operation"].valid);
        assert!(!validation["generate_tree_config"].valid);
        assert!(validation["generate_tree_config"].reason.is_some());
    }

    #[test]
    fn unknown_tool_is_rejected_not_skipped() {
        let registry = ToolRegistry::builtin();
        let calls: ToolCallMap = [call("no_such_tool", "{}")].into_iter().collect();
        let validation = registry.validate_all(&calls);
        assert!(!validation["no_such_tool"].valid);
    }

    #[test]
    fn execute_all_isolates_failures() {
        let registry = ToolRegistry::builtin();
        let calls: ToolCallMap = [
            call("advanced_math_operation", r#"{"operation":"add","a":1,"b":2}"#),
            call("generate_tree_config", "not json"),
        ]
        .into_iter()
        .collect();

        let results = registry.execute_all(&calls);
        assert_eq!(results["advanced_math_operation"], "3");
        assert!(results["generate_tree_config"].starts_with("Error:"));
    }
}
