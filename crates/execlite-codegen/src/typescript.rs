//! TypeScript binding renderer.
//!
//! Output uses only erasable syntax (interfaces, annotations, `as` casts) so
//! it runs under Node's type stripping without a compiler.

use crate::error::CodegenError;
use crate::naming::{function_names, parameter_bindings, type_name};
use execlite_core::tool::Tool;
use execlite_core::Language;
use serde_json::Value;

pub(crate) const HEADER: &str = "// Tool bindings generated by execlite. Do not edit.\n";

pub(crate) fn render(tools: &[Tool]) -> Result<String, CodegenError> {
    let names = function_names(tools, Language::TypeScript)?;
    let mut out = String::from(HEADER);
    for (tool, fn_name) in tools.iter().zip(&names) {
        out.push('\n');
        out.push_str(&render_tool(tool, fn_name)?);
    }
    Ok(out)
}

fn render_tool(tool: &Tool, fn_name: &str) -> Result<String, CodegenError> {
    let bindings = parameter_bindings(tool, Language::TypeScript)?;
    let mut out = String::new();

    let return_type = match object_properties(&tool.returns) {
        Some(props) if !props.is_empty() => {
            let iface = format!("{}Result", type_name(&tool.name));
            out.push_str(&format!("interface {} {{\n", iface));
            let required = required_fields(&tool.returns);
            for (key, schema) in props {
                let optional = if required.contains(&key.as_str()) { "" } else { "?" };
                out.push_str(&format!(
                    "  {}{}: {};\n",
                    property_key(key),
                    optional,
                    ts_type(schema)
                ));
            }
            out.push_str("}\n\n");
            Some(iface)
        }
        _ => match ts_type(&tool.returns).as_str() {
            "unknown" => None,
            other => Some(other.to_string()),
        },
    };

    let mut doc = Vec::new();
    if !tool.description.trim().is_empty() {
        doc.push(doc_line(&tool.description));
    }
    for (param, ident) in &bindings {
        if !param.description.trim().is_empty() {
            doc.push(format!("@param {} {}", ident, doc_line(&param.description)));
        }
    }
    if !doc.is_empty() {
        out.push_str("/**\n");
        for line in &doc {
            out.push_str(&format!(" * {}\n", line));
        }
        out.push_str(" */\n");
    }

    let signature: Vec<String> = bindings
        .iter()
        .map(|(param, ident)| {
            let ty = ts_type_name(&param.param_type);
            match (&param.default, param.required) {
                (Some(default), false) => format!("{}: {} = {}", ident, ty, js_literal(default)),
                (None, false) => format!("{}?: {}", ident, ty),
                _ => format!("{}: {}", ident, ty),
            }
        })
        .collect();
    let args: Vec<String> = bindings
        .iter()
        .map(|(param, ident)| format!("{}: {}", js_string(&param.name), ident))
        .collect();
    let args = if args.is_empty() {
        "{}".to_string()
    } else {
        format!("{{ {} }}", args.join(", "))
    };
    let call = format!("await __callTool({}, {})", js_string(&tool.name), args);

    match return_type {
        Some(ty) => {
            out.push_str(&format!(
                "async function {}({}): Promise<{}> {{\n",
                fn_name,
                signature.join(", "),
                ty
            ));
            out.push_str(&format!("  return ({}) as {};\n}}\n", call, ty));
        }
        None => {
            out.push_str(&format!(
                "async function {}({}): Promise<unknown> {{\n",
                fn_name,
                signature.join(", ")
            ));
            out.push_str(&format!("  return {};\n}}\n", call));
        }
    }
    Ok(out)
}

fn object_properties(schema: &Value) -> Option<&serde_json::Map<String, Value>> {
    if schema.get("type").and_then(Value::as_str) != Some("object") {
        return None;
    }
    schema.get("properties").and_then(Value::as_object)
}

fn required_fields(schema: &Value) -> Vec<&str> {
    schema
        .get("required")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

/// TypeScript type for a JSON-schema fragment.
pub(crate) fn ts_type(schema: &Value) -> String {
    let Some(ty) = schema.get("type").and_then(Value::as_str) else {
        return "unknown".to_string();
    };
    match ty {
        "string" => match schema.get("enum").and_then(Value::as_array) {
            Some(variants) if !variants.is_empty() && variants.iter().all(Value::is_string) => {
                variants.iter().map(js_literal).collect::<Vec<_>>().join(" | ")
            }
            _ => "string".to_string(),
        },
        "array" => {
            let item = schema
                .get("items")
                .map(ts_type)
                .unwrap_or_else(|| "unknown".to_string());
            format!("Array<{}>", item)
        }
        "object" => match object_properties(schema) {
            Some(props) if !props.is_empty() => {
                let required = required_fields(schema);
                let fields: Vec<String> = props
                    .iter()
                    .map(|(k, v)| {
                        let optional = if required.contains(&k.as_str()) { "" } else { "?" };
                        format!("{}{}: {}", property_key(k), optional, ts_type(v))
                    })
                    .collect();
                format!("{{ {} }}", fields.join("; "))
            }
            _ => "Record<string, unknown>".to_string(),
        },
        other => ts_type_name(other),
    }
}

/// TypeScript type for a parameter's declared type name.
pub(crate) fn ts_type_name(param_type: &str) -> String {
    match param_type {
        "string" => "string",
        "number" | "integer" => "number",
        "boolean" => "boolean",
        "null" => "null",
        "array" => "unknown[]",
        "object" => "Record<string, unknown>",
        _ => "unknown",
    }
    .to_string()
}

fn property_key(key: &str) -> String {
    let is_ident = key
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
    if is_ident {
        key.to_string()
    } else {
        js_string(key)
    }
}

pub(crate) fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

/// JSON is a valid JavaScript literal.
pub(crate) fn js_literal(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "undefined".to_string())
}

fn doc_line(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace("*/", "* /")
}

#[cfg(test)]
mod tests {
    use super::*;
    use execlite_core::tool::ToolParameter;
    use serde_json::json;

    fn read_file() -> Tool {
        Tool::new("read_file", "Read a text file. */ sneaky")
            .with_parameter(ToolParameter::optional("encoding", "string").with_default(json!("utf-8")))
            .with_parameter(ToolParameter::optional("max-bytes", "integer"))
            .with_parameter(
                ToolParameter::required("path", "string").with_description("Relative path"),
            )
            .with_returns(json!({
                "type": "object",
                "properties": {
                    "content": {"type": "string"},
                    "size": {"type": "integer"},
                    "content-type": {"type": "string", "enum": ["text", "binary"]}
                },
                "required": ["content"]
            }))
    }

    #[test]
    fn test_required_params_first_and_optional_forms() {
        let code = render(&[read_file()]).unwrap();
        assert!(code.contains(
            "async function readFile(path: string, encoding: string = \"utf-8\", max_bytes?: number): Promise<ReadFileResult>"
        ));
        assert!(code.contains(
            "await __callTool(\"read_file\", { \"path\": path, \"encoding\": encoding, \"max-bytes\": max_bytes })"
        ));
    }

    #[test]
    fn test_return_interface_from_schema() {
        let code = render(&[read_file()]).unwrap();
        assert!(code.contains("interface ReadFileResult {"));
        assert!(code.contains("  content: string;"));
        assert!(code.contains("  size?: number;"));
        assert!(code.contains("  \"content-type\"?: \"text\" | \"binary\";"));
        assert!(code.contains("as ReadFileResult"));
        assert!(!code.contains("export"));
    }

    #[test]
    fn test_doc_comment_cannot_close_early() {
        let code = render(&[read_file()]).unwrap();
        assert!(code.contains(" * Read a text file. * / sneaky"));
        assert!(code.contains(" * @param path Relative path"));
    }

    #[test]
    fn test_untyped_returns_and_no_params() {
        let code = render(&[Tool::new("ping", "")]).unwrap();
        assert!(code.contains("async function ping(): Promise<unknown> {"));
        assert!(code.contains("return await __callTool(\"ping\", {});"));

        let list = Tool::new("list", "").with_returns(json!({"type": "array", "items": {"type": "string"}}));
        let code = render(&[list]).unwrap();
        assert!(code.contains("Promise<Array<string>>"));
    }
}
