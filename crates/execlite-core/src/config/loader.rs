//! Environment variable loading helpers.
//!
//! Keeps the alias fallback chain in one place so callers never repeat
//! `or_else` ladders.

use std::env;
use std::path::Path;
use std::str::FromStr;

/// Load `.env` from the current directory without overriding existing variables.
pub fn load_dotenv() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let dir = env::current_dir().unwrap_or_else(|_| std::path::PathBuf::from("."));
        load_dotenv_from_dir(&dir);
    });
}

/// Parse `dir/.env` into the process environment (existing variables win).
pub fn load_dotenv_from_dir(dir: &Path) {
    let Ok(content) = std::fs::read_to_string(dir.join(".env")) else {
        return;
    };
    for (key, value) in parse_dotenv(&content) {
        if env::var(&key).is_err() {
            #[allow(unsafe_code)]
            unsafe {
                env::set_var(&key, &value);
            }
        }
    }
}

fn parse_dotenv(content: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some(eq_pos) = line.find('=') else {
            continue;
        };
        let key = line[..eq_pos].trim();
        let mut value = line[eq_pos + 1..].trim();
        // Strip inline comment (# not inside quotes)
        if let Some(hash_pos) = value.find('#') {
            let before_hash = value[..hash_pos].trim_end();
            if !before_hash.contains('"') && !before_hash.contains('\'') {
                value = before_hash;
            }
        }
        if value.len() >= 2
            && ((value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\'')))
        {
            value = &value[1..value.len() - 1];
        }
        if !key.is_empty() {
            pairs.push((key.to_string(), value.to_string()));
        }
    }
    pairs
}

fn lookup(primary: &str, aliases: &[&str]) -> Option<String> {
    env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()))
}

/// Read the primary variable or the first set alias, falling back to `default`.
pub fn env_or<F>(primary: &str, aliases: &[&str], default: F) -> String
where
    F: FnOnce() -> String,
{
    lookup(primary, aliases)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(default)
}

/// Read the primary variable or an alias; empty values count as unset.
pub fn env_optional(primary: &str, aliases: &[&str]) -> Option<String> {
    lookup(primary, aliases).and_then(|s| {
        let s = s.trim().to_string();
        if s.is_empty() {
            None
        } else {
            Some(s)
        }
    })
}

/// Boolean variable: 0/false/no/off are false, anything else set is true.
pub fn env_bool(primary: &str, aliases: &[&str], default: bool) -> bool {
    match lookup(primary, aliases).as_deref() {
        Some(s) => !matches!(
            s.trim().to_lowercase().as_str(),
            "0" | "false" | "no" | "off"
        ),
        None => default,
    }
}

/// Parse a typed variable; unparsable values log a warning and use `default`.
pub fn env_parse<T>(primary: &str, aliases: &[&str], default: T) -> T
where
    T: FromStr,
{
    match env_optional(primary, aliases) {
        Some(raw) => match raw.parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(key = primary, value = %raw, "Ignoring unparsable env value");
                default
            }
        },
        None => default,
    }
}

/// Comma separated list; blanks are dropped.
pub fn env_list(primary: &str, aliases: &[&str]) -> Vec<String> {
    env_optional(primary, aliases)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dotenv_handles_quotes_and_comments() {
        let pairs = parse_dotenv(
            "# comment\nA=1\nexport B=\"two words\"\nC='x' \nD=plain # trailing\n\nbroken\n",
        );
        assert_eq!(
            pairs,
            vec![
                ("A".to_string(), "1".to_string()),
                ("B".to_string(), "two words".to_string()),
                ("C".to_string(), "x".to_string()),
                ("D".to_string(), "plain".to_string()),
            ]
        );
    }

    #[test]
    fn test_env_helpers_fall_back_to_aliases() {
        #[allow(unsafe_code)]
        unsafe {
            env::set_var("EXECLITE_TEST_LOADER_ALIAS", "42");
            env::set_var("EXECLITE_TEST_LOADER_LIST", " a, ,b ");
        }
        assert_eq!(
            env_parse::<u64>("EXECLITE_TEST_LOADER_MISSING", &["EXECLITE_TEST_LOADER_ALIAS"], 7),
            42
        );
        assert_eq!(
            env_or("EXECLITE_TEST_LOADER_MISSING", &[], || "dflt".to_string()),
            "dflt"
        );
        assert!(env_bool("EXECLITE_TEST_LOADER_ALIAS", &[], false));
        assert_eq!(
            env_list("EXECLITE_TEST_LOADER_LIST", &[]),
            vec!["a".to_string(), "b".to_string()]
        );
    }
}
