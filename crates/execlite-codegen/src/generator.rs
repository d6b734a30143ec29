//! Wrapper generation entry point.

use crate::deps::extract_dependencies;
use crate::error::CodegenError;
use crate::entrypoint::{self, Literals};
use crate::{python, typescript};
use execlite_core::config::CodegenSettings;
use execlite_core::tool::Tool;
use execlite_core::Language;
use serde::Serialize;
use std::collections::BTreeSet;

/// A synthesized binding module. Created per request and discarded after use.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedWrapper {
    pub language: Language,
    pub code: String,
    /// `ceil(chars / chars_per_token)`. An approximation, not a tokenizer count.
    pub estimated_tokens: usize,
    pub dependencies: BTreeSet<String>,
    /// Names of the tools the wrapper exposes, in order.
    pub tools: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CodeApiGenerator {
    chars_per_token: f64,
}

impl Default for CodeApiGenerator {
    fn default() -> Self {
        Self {
            chars_per_token: CodegenSettings::default().chars_per_token,
        }
    }
}

impl CodeApiGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: &CodegenSettings) -> Result<Self, CodegenError> {
        Self::new().with_chars_per_token(settings.chars_per_token)
    }

    pub fn with_chars_per_token(mut self, chars_per_token: f64) -> Result<Self, CodegenError> {
        if !(chars_per_token.is_finite() && chars_per_token > 0.0) {
            return Err(CodegenError::InvalidCharsPerToken(chars_per_token));
        }
        self.chars_per_token = chars_per_token;
        Ok(self)
    }

    /// Bindings for `tools` in `language`.
    pub fn generate(
        &self,
        tools: &[Tool],
        language: Language,
    ) -> Result<GeneratedWrapper, CodegenError> {
        let code = match language {
            Language::TypeScript => typescript::render(tools)?,
            Language::Python => python::render(tools)?,
        };
        let wrapper = GeneratedWrapper {
            language,
            estimated_tokens: self.estimate_tokens(&code),
            dependencies: extract_dependencies(&code, language),
            tools: tools.iter().map(|t| t.name.clone()).collect(),
            code,
        };
        tracing::debug!(
            language = %language,
            tools = wrapper.tools.len(),
            tokens = wrapper.estimated_tokens,
            "Generated tool wrapper"
        );
        Ok(wrapper)
    }

    /// Bindings for both supported languages.
    pub fn generate_all(&self, tools: &[Tool]) -> Result<Vec<GeneratedWrapper>, CodegenError> {
        [Language::TypeScript, Language::Python]
            .into_iter()
            .map(|lang| self.generate(tools, lang))
            .collect()
    }

    /// Program body that calls each tool with arguments drawn from `intent`
    /// and emits a compact summary of the results.
    pub fn generate_entrypoint(
        &self,
        tools: &[Tool],
        intent: &str,
        language: Language,
    ) -> Result<String, CodegenError> {
        entrypoint::render(tools, intent, language, Literals::Embedded)
    }

    /// The entry point `generate_entrypoint` would produce, with every
    /// intent-derived string literal emptied. Suitable for static screening.
    pub fn generate_entrypoint_masked(
        &self,
        tools: &[Tool],
        intent: &str,
        language: Language,
    ) -> Result<String, CodegenError> {
        entrypoint::render(tools, intent, language, Literals::Masked)
    }

    /// Wrapper followed by `body`. TypeScript bodies run inside `__main` so
    /// they may use `await` at the top level.
    pub fn assemble_program(&self, wrapper: &GeneratedWrapper, body: &str) -> String {
        match wrapper.language {
            Language::TypeScript => {
                let indented: Vec<String> = body
                    .lines()
                    .map(|l| if l.is_empty() { String::new() } else { format!("  {}", l) })
                    .collect();
                format!(
                    "{}\n__main(async () => {{\n{}\n}});\n",
                    wrapper.code,
                    indented.join("\n")
                )
            }
            Language::Python => format!("{}\n\n{}\n", wrapper.code, body.trim_end()),
        }
    }

    pub fn estimate_tokens(&self, text: &str) -> usize {
        (text.chars().count() as f64 / self.chars_per_token).ceil() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use execlite_core::tool::ToolParameter;
    use serde_json::json;

    fn tools() -> Vec<Tool> {
        vec![
            Tool::new("read_file", "Read a file")
                .with_parameter(ToolParameter::required("path", "string"))
                .with_returns(json!({"type": "object", "properties": {"content": {"type": "string"}}})),
            Tool::new("list_directory", "List a directory")
                .with_parameter(ToolParameter::optional("dir", "string").with_default(json!("."))),
        ]
    }

    #[test]
    fn test_token_estimate_is_ceil_of_chars() {
        let gen = CodeApiGenerator::new();
        assert_eq!(gen.estimate_tokens(""), 0);
        assert_eq!(gen.estimate_tokens("abcd"), 1);
        assert_eq!(gen.estimate_tokens("abcde"), 2);
        assert_eq!(gen.estimate_tokens("ééééé"), 2);

        let wrapper = gen.generate(&tools(), Language::TypeScript).unwrap();
        assert_eq!(
            wrapper.estimated_tokens,
            (wrapper.code.chars().count() + 3) / 4
        );
    }

    #[test]
    fn test_deterministic_output() {
        let gen = CodeApiGenerator::new();
        let a = gen.generate(&tools(), Language::Python).unwrap();
        let b = gen.generate(&tools(), Language::Python).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.tools, vec!["read_file", "list_directory"]);
    }

    #[test]
    fn test_dependencies_per_language() {
        let gen = CodeApiGenerator::new();
        let py = gen.generate(&tools(), Language::Python).unwrap();
        assert_eq!(py.dependencies.iter().collect::<Vec<_>>(), vec!["typing"]);
        let ts = gen.generate(&tools(), Language::TypeScript).unwrap();
        assert!(ts.dependencies.is_empty());
        assert_eq!(gen.generate_all(&tools()).unwrap().len(), 2);
    }

    #[test]
    fn test_invalid_chars_per_token_rejected() {
        assert!(CodeApiGenerator::new().with_chars_per_token(0.0).is_err());
        assert!(CodeApiGenerator::new().with_chars_per_token(f64::NAN).is_err());
        let gen = CodeApiGenerator::new().with_chars_per_token(2.0).unwrap();
        assert_eq!(gen.estimate_tokens("abcde"), 3);
    }

    #[test]
    fn test_assemble_wraps_typescript_in_main() {
        let gen = CodeApiGenerator::new();
        let wrapper = gen.generate(&tools(), Language::TypeScript).unwrap();
        let body = gen
            .generate_entrypoint(&tools(), "read package.json", Language::TypeScript)
            .unwrap();
        let program = gen.assemble_program(&wrapper, &body);
        assert!(program.starts_with(&wrapper.code));
        assert!(program.contains("__main(async () => {\n  const __intent"));
        assert!(program.trim_end().ends_with("});"));

        let py = gen.generate(&tools(), Language::Python).unwrap();
        let program = gen.assemble_program(&py, "print(1)\n");
        assert!(program.ends_with("\n\nprint(1)\n"));
    }

    #[test]
    fn test_empty_tool_set_still_generates() {
        let gen = CodeApiGenerator::new();
        let wrapper = gen.generate(&[], Language::TypeScript).unwrap();
        assert_eq!(wrapper.code, typescript::HEADER);
        assert!(wrapper.tools.is_empty());
    }
}
