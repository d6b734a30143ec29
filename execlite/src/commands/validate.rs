//! `execlite validate`

use crate::cli::LanguageArg;
use anyhow::Result;
use execlite_core::Language;
use execlite_core::config::ValidatorSettings;
use execlite_sandbox::security::format_validation_report;
use execlite_sandbox::{CodeValidator, ValidationResult};
use std::path::Path;

fn infer_language(file: &str) -> Option<Language> {
    match Path::new(file).extension()?.to_str()? {
        "py" => Some(Language::Python),
        "ts" | "mts" | "cts" | "js" | "mjs" | "cjs" => Some(Language::TypeScript),
        _ => None,
    }
}

pub fn run(file: &str, language: Option<LanguageArg>, json: bool) -> Result<ValidationResult> {
    let language = match language.map(Language::from).or_else(|| infer_language(file)) {
        Some(language) => language,
        None => anyhow::bail!("Cannot infer language of {}; pass --language", file),
    };
    let code = super::read_source(file)?;
    let validator = CodeValidator::from_settings(&ValidatorSettings::from_env())?;
    let result = validator.validate(&code, language);

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("Validation results for: {}\n", file);
        print!("{}", format_validation_report(&result));
    }
    Ok(result)
}
