//! Module dependencies named by import statements.

use execlite_core::Language;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

const TS_PATTERNS: &[&str] = &[
    r#"(?m)^\s*import\s+(?:type\s+)?(?:[^'";]*?\s+from\s+)?['"]([^'"]+)['"]"#,
    r#"(?m)^\s*export\s+[^'";]*?\s+from\s+['"]([^'"]+)['"]"#,
    r#"\brequire\s*\(\s*['"]([^'"]+)['"]\s*\)"#,
    r#"\bimport\s*\(\s*['"]([^'"]+)['"]\s*\)"#,
];

static TS_IMPORTS: LazyLock<Vec<Regex>> = LazyLock::new(|| compile(TS_PATTERNS));

static PY_IMPORT: LazyLock<Vec<Regex>> =
    LazyLock::new(|| compile(&[r"(?m)^[ \t]*import[ \t]+([A-Za-z_][\w.]*(?:[ \t]+as[ \t]+\w+)?(?:[ \t]*,[ \t]*[A-Za-z_][\w.]*(?:[ \t]+as[ \t]+\w+)?)*)"]));

static PY_FROM: LazyLock<Vec<Regex>> =
    LazyLock::new(|| compile(&[r"(?m)^[ \t]*from[ \t]+([A-Za-z_][\w.]*)[ \t]+import\b"]));

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| match Regex::new(p) {
            Ok(re) => Some(re),
            Err(e) => {
                tracing::error!("Invalid import pattern {}: {}", p, e);
                None
            }
        })
        .collect()
}

/// Distinct modules imported by `code`. Python yields top-level package names;
/// TypeScript yields module specifiers as written.
pub fn extract_dependencies(code: &str, language: Language) -> BTreeSet<String> {
    let mut deps = BTreeSet::new();
    match language {
        Language::TypeScript => {
            for re in TS_IMPORTS.iter() {
                for caps in re.captures_iter(code) {
                    deps.insert(caps[1].to_string());
                }
            }
        }
        Language::Python => {
            for re in PY_IMPORT.iter() {
                for caps in re.captures_iter(code) {
                    for item in caps[1].split(',') {
                        if let Some(module) = item.split_whitespace().next() {
                            deps.insert(root_module(module));
                        }
                    }
                }
            }
            for re in PY_FROM.iter() {
                for caps in re.captures_iter(code) {
                    deps.insert(root_module(&caps[1]));
                }
            }
        }
    }
    deps
}

fn root_module(dotted: &str) -> String {
    dotted.split('.').next().unwrap_or(dotted).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typescript_imports() {
        let code = r#"
import fs from "node:fs";
import type { Foo } from './types';
import "side-effect";
const x = require('lodash');
const y = await import("chalk");
const z = require('lodash');
"#;
        let deps = extract_dependencies(code, Language::TypeScript);
        let expected: BTreeSet<String> = ["node:fs", "./types", "side-effect", "lodash", "chalk"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(deps, expected);
    }

    #[test]
    fn test_python_imports_merge_to_roots() {
        let code = "import os.path, json as j\nfrom typing import Any\nfrom collections.abc import Mapping\n    import json\nfrom . import sibling\n";
        let deps = extract_dependencies(code, Language::Python);
        let names: Vec<&str> = deps.iter().map(|s| s.as_str()).collect();
        assert_eq!(names, vec!["collections", "json", "os", "typing"]);
    }

    #[test]
    fn test_no_imports() {
        assert!(extract_dependencies("print(1)", Language::Python).is_empty());
        assert!(extract_dependencies("console.log(1)", Language::TypeScript).is_empty());
    }
}
