//! Identifier derivation for generated bindings.
//!
//! Tool names come from external schema files and may hold any characters.
//! Function names are rebuilt from their alphanumeric words; parameter names
//! keep their spelling with invalid characters replaced. Keywords and names
//! the validator treats as dangerous receive a trailing `_`.

use crate::error::CodegenError;
use execlite_core::tool::{Tool, ToolParameter};
use execlite_core::Language;
use std::collections::HashMap;

const TS_RESERVED: &[&str] = &[
    "arguments", "async", "await", "axios", "break", "case", "catch", "class", "const",
    "continue", "debugger", "default", "delete", "do", "else", "enum", "eval", "exec", "export",
    "extends", "false", "fetch", "finally", "for", "function", "got", "if", "implements",
    "import", "in", "instanceof", "interface", "let", "new", "null", "package", "private",
    "process", "protected", "public", "require", "return", "spawn", "static", "super", "switch",
    "this", "throw", "true", "try", "typeof", "undefined", "var", "void", "while", "with", "yield",
];

const PY_RESERVED: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "compile", "continue", "def", "del", "elif", "else", "eval", "except", "exec", "finally",
    "for", "from", "global", "globals", "if", "import", "in", "input", "is", "lambda", "locals",
    "nonlocal", "not", "open", "or", "pass", "print", "raise", "return", "try", "vars", "while",
    "with", "yield",
];

/// Lowercased ASCII words of `name`, split on separators and camelCase humps.
pub fn split_words(name: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for c in name.chars() {
        if !c.is_ascii_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_ascii_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        current.push(c.to_ascii_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn is_reserved(ident: &str, language: Language) -> bool {
    match language {
        Language::TypeScript => TS_RESERVED.contains(&ident),
        Language::Python => PY_RESERVED.contains(&ident),
    }
}

fn finish(mut ident: String, language: Language) -> String {
    if ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    if is_reserved(&ident, language) {
        ident.push('_');
    }
    ident
}

/// `read_file` → `readFile` (TypeScript) or `read_file` (Python).
pub fn function_name(tool_name: &str, language: Language) -> Result<String, CodegenError> {
    let words = split_words(tool_name);
    if words.is_empty() {
        return Err(CodegenError::InvalidIdentifier(tool_name.to_string()));
    }
    let ident = match language {
        Language::TypeScript => {
            let mut out = words[0].clone();
            for w in &words[1..] {
                out.push_str(&capitalize(w));
            }
            out
        }
        Language::Python => words.join("_"),
    };
    Ok(finish(ident, language))
}

/// `read_file` → `ReadFile`, used for TypeScript result interfaces.
pub fn type_name(tool_name: &str) -> String {
    let pascal: String = split_words(tool_name).iter().map(|w| capitalize(w)).collect();
    if pascal.starts_with(|c: char| c.is_ascii_digit()) {
        format!("T{}", pascal)
    } else {
        pascal
    }
}

pub fn parameter_name(name: &str, language: Language) -> Option<String> {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if cleaned.chars().all(|c| c == '_') {
        return None;
    }
    Some(finish(cleaned, language))
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

/// Function identifiers for `tools`, in order. Two tools mapping to the same
/// identifier is an error rather than a silent overwrite.
pub fn function_names(tools: &[Tool], language: Language) -> Result<Vec<String>, CodegenError> {
    let mut seen: HashMap<String, &str> = HashMap::new();
    let mut names = Vec::with_capacity(tools.len());
    for tool in tools {
        let ident = function_name(&tool.name, language)?;
        if let Some(first) = seen.insert(ident.clone(), &tool.name) {
            return Err(CodegenError::NameCollision {
                first: first.to_string(),
                second: tool.name.clone(),
                identifier: ident,
            });
        }
        names.push(ident);
    }
    Ok(names)
}

/// Parameters in declaration order (required first) paired with their identifiers.
pub fn parameter_bindings<'a>(
    tool: &'a Tool,
    language: Language,
) -> Result<Vec<(&'a ToolParameter, String)>, CodegenError> {
    let mut seen: HashMap<String, &str> = HashMap::new();
    let mut out = Vec::new();
    for param in tool.ordered_parameters() {
        let ident = parameter_name(&param.name, language)
            .ok_or_else(|| CodegenError::InvalidIdentifier(param.name.clone()))?;
        if let Some(first) = seen.insert(ident.clone(), &param.name) {
            return Err(CodegenError::ParameterCollision {
                tool: tool.name.clone(),
                first: first.to_string(),
                second: param.name.clone(),
                identifier: ident,
            });
        }
        out.push((param, ident));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_names_per_language() {
        assert_eq!(function_name("read_file", Language::TypeScript).unwrap(), "readFile");
        assert_eq!(function_name("read_file", Language::Python).unwrap(), "read_file");
        assert_eq!(function_name("listDirectory", Language::Python).unwrap(), "list_directory");
        assert_eq!(function_name("http-GET", Language::TypeScript).unwrap(), "httpGet");
        assert_eq!(function_name("3d-render", Language::Python).unwrap(), "_3d_render");
    }

    #[test]
    fn test_reserved_and_dangerous_names_get_suffix() {
        assert_eq!(function_name("delete", Language::TypeScript).unwrap(), "delete_");
        assert_eq!(function_name("fetch", Language::TypeScript).unwrap(), "fetch_");
        assert_eq!(function_name("open", Language::Python).unwrap(), "open_");
        assert_eq!(parameter_name("from", Language::Python).unwrap(), "from_");
        assert_eq!(parameter_name("max-depth", Language::TypeScript).unwrap(), "max_depth");
    }

    #[test]
    fn test_unusable_names_are_errors() {
        assert!(function_name("***", Language::Python).is_err());
        assert!(parameter_name("--", Language::Python).is_none());
    }

    #[test]
    fn test_collisions_detected() {
        let tools = vec![Tool::new("read_file", ""), Tool::new("readFile", "")];
        let err = function_names(&tools, Language::TypeScript).unwrap_err();
        assert!(matches!(err, CodegenError::NameCollision { .. }));

        let tool = Tool::new("t", "")
            .with_parameter(ToolParameter::required("a-b", "string"))
            .with_parameter(ToolParameter::required("a_b", "string"));
        assert!(matches!(
            parameter_bindings(&tool, Language::Python).unwrap_err(),
            CodegenError::ParameterCollision { .. }
        ));
    }

    #[test]
    fn test_type_name() {
        assert_eq!(type_name("read_file"), "ReadFile");
        assert_eq!(type_name("2fa-check"), "T2faCheck");
    }
}
