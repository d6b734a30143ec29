//! Entry point synthesis from an intent string.
//!
//! Arguments are filled from cues in the intent: quoted text, path-like tokens
//! and URLs. Declared defaults cover the rest. A tool whose required
//! parameters cannot be filled is listed under `skipped` instead of called.
//!
//! Intent text only ever lands in string literals. [`Literals::Masked`]
//! renders the same program with those literals emptied, which is what the
//! code validator screens.

use crate::naming::{function_names, parameter_bindings};
use crate::python::{py_literal, py_string};
use crate::typescript::{js_literal, js_string};
use crate::CodegenError;
use execlite_core::tool::{Tool, ToolParameter};
use execlite_core::Language;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedCall {
    pub tool: String,
    /// Parameter name to value, in signature order. `None` means "use the default".
    pub args: Vec<(String, Option<Value>)>,
}

/// How intent-derived strings appear in a rendered entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Literals {
    Embedded,
    Masked,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntrypointPlan {
    pub calls: Vec<PlannedCall>,
    pub skipped: Vec<String>,
}

struct IntentCues {
    quoted: Option<String>,
    path: Option<String>,
    url: Option<String>,
    text: String,
}

impl IntentCues {
    fn parse(intent: &str) -> Self {
        let mut url = None;
        let mut path = None;
        for raw in intent.split_whitespace() {
            let token = raw
                .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '(' | ')' | '<' | '>'))
                .trim_end_matches(|c: char| matches!(c, ',' | ';' | ':' | '!' | '?' | '.'));
            if token.is_empty() {
                continue;
            }
            if token.starts_with("http://") || token.starts_with("https://") {
                url.get_or_insert_with(|| token.to_string());
            } else if is_path_like(token) {
                path.get_or_insert_with(|| token.to_string());
            }
        }
        Self {
            quoted: quoted_text(intent),
            path,
            url,
            text: intent.trim().to_string(),
        }
    }
}

fn is_path_like(token: &str) -> bool {
    let has_alpha = token.chars().any(|c| c.is_alphabetic());
    if !has_alpha {
        return false;
    }
    if token.contains('/') {
        return true;
    }
    // name.ext with an alphabetic extension: package.json, notes.md
    match token.rsplit_once('.') {
        Some((stem, ext)) => {
            !stem.is_empty() && !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric())
                && ext.chars().any(|c| c.is_ascii_alphabetic())
        }
        None => false,
    }
}

fn quoted_text(intent: &str) -> Option<String> {
    for quote in ['"', '\'', '`'] {
        let mut parts = intent.splitn(3, quote);
        let _before = parts.next();
        if let (Some(inner), Some(_)) = (parts.next(), parts.next()) {
            if !inner.trim().is_empty() {
                return Some(inner.to_string());
            }
        }
    }
    None
}

enum ParamKind {
    Url,
    Directory,
    Path,
    Query,
    Other,
}

fn classify(param: &ToolParameter) -> ParamKind {
    let name = param.name.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| name.contains(n));
    if has(&["url", "uri", "href", "link"]) {
        ParamKind::Url
    } else if has(&["dir", "folder"]) {
        ParamKind::Directory
    } else if has(&["path", "file"]) {
        ParamKind::Path
    } else if has(&["query", "pattern", "keyword", "search", "term", "text"]) || name == "q" {
        ParamKind::Query
    } else {
        ParamKind::Other
    }
}

fn resolve(param: &ToolParameter, cues: &IntentCues) -> Option<Value> {
    if param.param_type != "string" {
        return None;
    }
    let found = match classify(param) {
        ParamKind::Url => cues.url.clone(),
        ParamKind::Directory => Some(cues.path.clone().unwrap_or_else(|| ".".to_string())),
        ParamKind::Path => cues.path.clone(),
        ParamKind::Query => Some(cues.quoted.clone().unwrap_or_else(|| cues.text.clone())),
        ParamKind::Other => cues.quoted.clone(),
    };
    found.map(Value::String)
}

/// Decide which tools to call and with what.
pub fn plan_calls(tools: &[Tool], intent: &str) -> EntrypointPlan {
    let cues = IntentCues::parse(intent);
    let mut plan = EntrypointPlan::default();
    'tools: for tool in tools {
        let mut args = Vec::new();
        for param in tool.ordered_parameters() {
            let value = resolve(param, &cues);
            if value.is_none() && param.required {
                if let Some(default) = &param.default {
                    args.push((param.name.clone(), Some(default.clone())));
                    continue;
                }
                tracing::debug!(tool = %tool.name, param = %param.name, "No value for required parameter");
                plan.skipped.push(tool.name.clone());
                continue 'tools;
            }
            args.push((param.name.clone(), value));
        }
        plan.calls.push(PlannedCall {
            tool: tool.name.clone(),
            args,
        });
    }
    plan
}

fn mask(value: Value) -> Value {
    match value {
        Value::String(_) => Value::String(String::new()),
        Value::Array(items) => Value::Array(items.into_iter().map(mask).collect()),
        Value::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, mask(v))).collect()),
        other => other,
    }
}

pub(crate) fn render(
    tools: &[Tool],
    intent: &str,
    language: Language,
    literals: Literals,
) -> Result<String, CodegenError> {
    let names = function_names(tools, language)?;
    let mut plan = plan_calls(tools, intent);
    let intent = match literals {
        Literals::Embedded => intent,
        Literals::Masked => {
            for call in &mut plan.calls {
                for (_, value) in &mut call.args {
                    *value = value.take().map(mask);
                }
            }
            ""
        }
    };
    let mut out = String::new();
    match language {
        Language::TypeScript => {
            out.push_str(&format!("const __intent = {};\n", js_string(intent)));
            out.push_str("const __results: Record<string, unknown> = {};\n");
        }
        Language::Python => {
            out.push_str(&format!("__intent = {}\n", py_string(intent)));
            out.push_str("__results = {}\n");
        }
    }
    for call in &plan.calls {
        let Some((tool, fn_name)) = tools.iter().zip(&names).find(|(t, _)| t.name == call.tool)
        else {
            continue;
        };
        let bindings = parameter_bindings(tool, language)?;
        let key = match language {
            Language::TypeScript => js_string(&tool.name),
            Language::Python => py_string(&tool.name),
        };
        let invocation = match language {
            Language::TypeScript => format!("await {}({})", fn_name, ts_arguments(&call.args)),
            Language::Python => format!("{}({})", fn_name, py_arguments(&call.args, &bindings)),
        };
        match language {
            Language::TypeScript => out.push_str(&format!(
                "try {{\n  __results[{key}] = __summarize({invocation});\n}} catch (err) {{\n  __results[{key}] = {{ error: __errorMessage(err) }};\n}}\n"
            )),
            Language::Python => out.push_str(&format!(
                "try:\n    __results[{key}] = __summarize({invocation})\nexcept Exception as err:\n    __results[{key}] = {{\"error\": str(err)}}\n"
            )),
        }
    }
    match language {
        Language::TypeScript => {
            let skipped: Vec<String> = plan.skipped.iter().map(|s| js_string(s)).collect();
            out.push_str(&format!(
                "__emit({{ intent: __intent, results: __results, skipped: [{}] }});\n",
                skipped.join(", ")
            ));
        }
        Language::Python => {
            let skipped: Vec<String> = plan.skipped.iter().map(|s| py_string(s)).collect();
            out.push_str(&format!(
                "__emit({{\"intent\": __intent, \"results\": __results, \"skipped\": [{}]}})\n",
                skipped.join(", ")
            ));
        }
    }
    Ok(out)
}

/// Positional; omitted middle arguments become `undefined`, trailing ones are dropped.
fn ts_arguments(args: &[(String, Option<Value>)]) -> String {
    let last = args.iter().rposition(|(_, v)| v.is_some());
    let Some(last) = last else {
        return String::new();
    };
    args[..=last]
        .iter()
        .map(|(_, v)| v.as_ref().map(js_literal).unwrap_or_else(|| "undefined".to_string()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn py_arguments(
    args: &[(String, Option<Value>)],
    bindings: &[(&ToolParameter, String)],
) -> String {
    args.iter()
        .filter_map(|(name, value)| {
            let value = value.as_ref()?;
            let ident = bindings
                .iter()
                .find(|(p, _)| &p.name == name)
                .map(|(_, ident)| ident.as_str())?;
            let literal = py_literal(value).unwrap_or_else(|| "None".to_string());
            Some(format!("{}={}", ident, literal))
        })
        .collect::<Vec<_>>()
        .join(", ")
}
