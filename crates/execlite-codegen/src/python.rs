//! Python binding renderer.

use crate::error::CodegenError;
use crate::naming::{function_names, parameter_bindings};
use execlite_core::tool::Tool;
use execlite_core::Language;
use serde_json::Value;

pub(crate) const HEADER: &str = "# Tool bindings generated by execlite. Do not edit.\nfrom typing import Any, Dict, List, Optional\n";

pub(crate) fn render(tools: &[Tool]) -> Result<String, CodegenError> {
    let names = function_names(tools, Language::Python)?;
    let mut out = String::from(HEADER);
    for (tool, fn_name) in tools.iter().zip(&names) {
        out.push_str("\n\n");
        out.push_str(&render_tool(tool, fn_name)?);
    }
    Ok(out)
}

fn render_tool(tool: &Tool, fn_name: &str) -> Result<String, CodegenError> {
    let bindings = parameter_bindings(tool, Language::Python)?;

    let signature: Vec<String> = bindings
        .iter()
        .map(|(param, ident)| {
            let ty = py_type_name(&param.param_type);
            if param.required {
                return format!("{}: {}", ident, ty);
            }
            match param.default.as_ref().and_then(py_literal) {
                Some(literal) if literal != "None" => format!("{}: {} = {}", ident, ty, literal),
                _ => format!("{}: Optional[{}] = None", ident, ty),
            }
        })
        .collect();
    let args: Vec<String> = bindings
        .iter()
        .map(|(param, ident)| format!("{}: {}", py_string(&param.name), ident))
        .collect();

    let mut out = format!(
        "def {}({}) -> {}:\n",
        fn_name,
        signature.join(", "),
        py_return_type(&tool.returns)
    );
    let doc = docstring(tool, &bindings);
    if !doc.is_empty() {
        out.push_str(&doc);
    }
    out.push_str(&format!(
        "    return __call_tool({}, {{{}}})\n",
        py_string(&tool.name),
        args.join(", ")
    ));
    Ok(out)
}

fn docstring(tool: &Tool, bindings: &[(&execlite_core::tool::ToolParameter, String)]) -> String {
    let mut lines = Vec::new();
    if !tool.description.trim().is_empty() {
        lines.push(doc_text(&tool.description));
    }
    let described: Vec<String> = bindings
        .iter()
        .filter(|(p, _)| !p.description.trim().is_empty())
        .map(|(p, ident)| format!("    {}: {}", ident, doc_text(&p.description)))
        .collect();
    if !described.is_empty() {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push("Args:".to_string());
        lines.extend(described);
    }
    match lines.len() {
        0 => String::new(),
        1 => format!("    \"\"\"{}\"\"\"\n", lines[0]),
        _ => {
            let mut out = format!("    \"\"\"{}\n", lines[0]);
            for line in &lines[1..] {
                if line.is_empty() {
                    out.push('\n');
                } else {
                    out.push_str(&format!("    {}\n", line));
                }
            }
            out.push_str("    \"\"\"\n");
            out
        }
    }
}

fn doc_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('\\', "\\\\")
        .replace("\"\"\"", "\\\"\\\"\\\"")
}

pub(crate) fn py_type_name(param_type: &str) -> &'static str {
    match param_type {
        "string" => "str",
        "integer" => "int",
        "number" => "float",
        "boolean" => "bool",
        "array" => "List[Any]",
        "object" => "Dict[str, Any]",
        _ => "Any",
    }
}

fn py_return_type(schema: &Value) -> &'static str {
    match schema.get("type").and_then(Value::as_str) {
        Some("null") => "None",
        Some(ty) => py_type_name(ty),
        None => "Any",
    }
}

pub(crate) fn py_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

/// Scalars only; compound defaults are left to the tool.
pub(crate) fn py_literal(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some("None".to_string()),
        Value::Bool(true) => Some("True".to_string()),
        Value::Bool(false) => Some("False".to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(py_string(s)),
        Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use execlite_core::tool::ToolParameter;
    use serde_json::json;

    #[test]
    fn test_signature_and_call() {
        let tool = Tool::new("searchFiles", "Search file contents")
            .with_parameter(ToolParameter::optional("limit", "integer").with_default(json!(20)))
            .with_parameter(ToolParameter::optional("glob", "string"))
            .with_parameter(ToolParameter::required("pattern", "string"))
            .with_parameter(ToolParameter::optional("regex", "boolean").with_default(json!(false)))
            .with_returns(json!({"type": "array"}));
        let code = render(&[tool]).unwrap();
        assert!(code.starts_with(HEADER));
        assert!(code.contains(
            "def search_files(pattern: str, limit: int = 20, glob: Optional[str] = None, regex: bool = False) -> List[Any]:"
        ));
        assert!(code.contains(
            "    return __call_tool(\"searchFiles\", {\"pattern\": pattern, \"limit\": limit, \"glob\": glob, \"regex\": regex})"
        ));
        assert!(code.contains("    \"\"\"Search file contents\"\"\""));
    }

    #[test]
    fn test_docstring_is_escaped() {
        let tool = Tool::new("x", "ends with \"\"\" and \\ slash")
            .with_parameter(ToolParameter::required("from", "object").with_description("Source"));
        let code = render(&[tool]).unwrap();
        assert!(code.contains("def x(from_: Dict[str, Any]) -> Any:"));
        assert!(code.contains("ends with \\\"\\\"\\\" and \\\\ slash"));
        assert!(code.contains("    Args:\n        from_: Source\n"));
        assert!(code.contains("{\"from\": from_}"));
    }

    #[test]
    fn test_compound_default_becomes_none() {
        let tool = Tool::new("t", "")
            .with_parameter(ToolParameter::optional("opts", "object").with_default(json!({"a": 1})));
        let code = render(&[tool]).unwrap();
        assert!(code.contains("opts: Optional[Dict[str, Any]] = None"));
    }
}
