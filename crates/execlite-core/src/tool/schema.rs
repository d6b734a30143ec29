//! Tool schema documents.
//!
//! ```json
//! {
//!   "name": "read_file",
//!   "description": "Read a UTF-8 text file from the workspace",
//!   "category": "filesystem",
//!   "parameters": [{"name": "path", "type": "string", "required": true}],
//!   "returns": {"type": "object", "properties": {"content": {"type": "string"}}}
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

fn default_category() -> String {
    "general".to_string()
}

fn default_param_type() -> String {
    "string".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    /// JSON schema type: string, number, integer, boolean, array, object.
    #[serde(rename = "type", default = "default_param_type")]
    pub param_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default)]
    pub description: String,
}

impl ToolParameter {
    pub fn required(name: &str, param_type: &str) -> Self {
        Self {
            name: name.to_string(),
            param_type: param_type.to_string(),
            required: true,
            default: None,
            description: String::new(),
        }
    }

    pub fn optional(name: &str, param_type: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type)
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }
}

/// An indexed tool. `name` is the unique key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub parameters: Vec<ToolParameter>,
    /// Output JSON schema. `null` when the tool does not declare one.
    #[serde(default)]
    pub returns: Value,
}

impl Tool {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            category: default_category(),
            parameters: Vec::new(),
            returns: Value::Null,
        }
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = category.to_string();
        self
    }

    pub fn with_parameter(mut self, parameter: ToolParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_returns(mut self, returns: Value) -> Self {
        self.returns = returns;
        self
    }

    /// Required parameters first, then optional ones, each group in declared order.
    pub fn ordered_parameters(&self) -> Vec<&ToolParameter> {
        let mut ordered: Vec<&ToolParameter> =
            self.parameters.iter().filter(|p| p.required).collect();
        ordered.extend(self.parameters.iter().filter(|p| !p.required));
        ordered
    }
}
