//! Reversible PII redaction.
//!
//! Emails, phone numbers, credit cards (Luhn-checked) and US SSNs are replaced
//! with category-scoped placeholders such as `[EMAIL_1]`. The same value always
//! maps to the same placeholder for the lifetime of the tokenizer (or until
//! [`PiiTokenizer::reset`]). Placeholder-shaped text already present in the
//! input is protected: numbers seen literally are never allocated, and a literal
//! that collides with a live placeholder is itself aliased to a fresh one. So
//! `detokenize(tokenize(x)) == x` holds on a reused tokenizer too.

use regex::{Regex, RegexSet};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PiiCategory {
    Email,
    CreditCard,
    Ssn,
    Phone,
}

impl PiiCategory {
    /// Overlap resolution order: earlier wins.
    pub const ALL: [PiiCategory; 4] = [
        PiiCategory::Email,
        PiiCategory::CreditCard,
        PiiCategory::Ssn,
        PiiCategory::Phone,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            PiiCategory::Email => "EMAIL",
            PiiCategory::CreditCard => "CREDIT_CARD",
            PiiCategory::Ssn => "SSN",
            PiiCategory::Phone => "PHONE",
        }
    }

    fn from_label(label: &str) -> Option<Self> {
        PiiCategory::ALL.into_iter().find(|c| c.label() == label)
    }

    fn index(&self) -> usize {
        match self {
            PiiCategory::Email => 0,
            PiiCategory::CreditCard => 1,
            PiiCategory::Ssn => 2,
            PiiCategory::Phone => 3,
        }
    }
}

const PATTERN_SOURCES: [&str; 4] = [
    r"[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(?:\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}",
    r"\b\d(?:[ -]?\d){12,18}\b",
    r"\b\d{3}-\d{2}-\d{4}\b",
    r"(?:\+1[-. ]?)?(?:\(\d{3}\) ?|\b\d{3}[-. ])\d{3}[-. ]\d{4}\b",
];

static PATTERNS: LazyLock<Vec<(PiiCategory, Regex)>> = LazyLock::new(|| {
    PiiCategory::ALL
        .iter()
        .zip(PATTERN_SOURCES)
        .filter_map(|(category, p)| match Regex::new(p) {
            Ok(re) => Some((*category, re)),
            Err(e) => {
                tracing::error!("Invalid PII pattern {}: {}", p, e);
                None
            }
        })
        .collect()
});

static PREFILTER: LazyLock<Option<RegexSet>> = LazyLock::new(|| RegexSet::new(PATTERN_SOURCES).ok());

static PLACEHOLDER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\[(EMAIL|CREDIT_CARD|SSN|PHONE)_\d+\]").ok());

#[derive(Debug, Clone)]
struct Candidate {
    start: usize,
    end: usize,
    category: PiiCategory,
    /// Placeholder-shaped text present in the input rather than PII.
    literal: bool,
}

#[derive(Debug, Default)]
pub struct PiiTokenizer {
    forward: HashMap<(PiiCategory, String), String>,
    reverse: HashMap<String, String>,
    counters: HashMap<PiiCategory, usize>,
    /// Literal placeholders seen in inputs; never allocated.
    reserved: HashSet<String>,
}

impl PiiTokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every detected PII value with its placeholder.
    pub fn tokenize(&mut self, text: &str) -> String {
        let literals = find_literal_placeholders(text);
        let mut spans: Vec<Candidate> = find_pii(text)
            .into_iter()
            .filter(|c| literals.iter().all(|l| c.end <= l.start || c.start >= l.end))
            .collect();
        spans.extend(literals);
        if spans.is_empty() {
            return text.to_string();
        }
        spans.sort_by_key(|c| c.start);

        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;
        for m in spans {
            out.push_str(&text[cursor..m.start]);
            let value = &text[m.start..m.end];
            if m.literal && !self.reverse.contains_key(value) {
                self.reserved.insert(value.to_string());
                out.push_str(value);
            } else {
                let placeholder = self.placeholder_for(m.category, value, text);
                out.push_str(&placeholder);
            }
            cursor = m.end;
        }
        out.push_str(&text[cursor..]);
        out
    }

    /// Exact inverse of [`tokenize`](Self::tokenize). Unknown placeholders are left as-is.
    pub fn detokenize(&self, text: &str) -> String {
        let Some(re) = PLACEHOLDER.as_ref() else {
            return text.to_string();
        };
        re.replace_all(text, |caps: &regex::Captures| {
            let token = &caps[0];
            self.reverse
                .get(token)
                .cloned()
                .unwrap_or_else(|| token.to_string())
        })
        .into_owned()
    }

    /// Fast check; no state is touched.
    pub fn contains_pii(&self, text: &str) -> bool {
        let Some(prefilter) = PREFILTER.as_ref() else {
            return !find_pii(text).is_empty();
        };
        let hits = prefilter.matches(text);
        if !hits.matched_any() {
            return false;
        }
        for category in PiiCategory::ALL {
            if !hits.matched(category.index()) {
                continue;
            }
            if category != PiiCategory::CreditCard {
                return true;
            }
            let valid_card = PATTERNS
                .iter()
                .filter(|(c, _)| *c == PiiCategory::CreditCard)
                .any(|(_, re)| re.find_iter(text).any(|m| luhn_valid(m.as_str())));
            if valid_card {
                return true;
            }
        }
        false
    }

    /// Distinct values tokenized per category since creation or the last reset.
    pub fn get_token_count_by_type(&self) -> BTreeMap<PiiCategory, usize> {
        let mut counts: BTreeMap<PiiCategory, usize> =
            PiiCategory::ALL.iter().map(|c| (*c, 0)).collect();
        for (category, value) in self.forward.keys() {
            if !is_placeholder(value) {
                *counts.entry(*category).or_insert(0) += 1;
            }
        }
        counts
    }

    pub fn reset(&mut self) {
        self.forward.clear();
        self.reverse.clear();
        self.counters.clear();
        self.reserved.clear();
    }

    fn placeholder_for(&mut self, category: PiiCategory, value: &str, source: &str) -> String {
        if let Some(existing) = self.forward.get(&(category, value.to_string())) {
            return existing.clone();
        }
        let counter = self.counters.entry(category).or_insert(0);
        let placeholder = loop {
            *counter += 1;
            let candidate = format!("[{}_{}]", category.label(), counter);
            if !source.contains(&candidate)
                && !self.reverse.contains_key(&candidate)
                && !self.reserved.contains(&candidate)
            {
                break candidate;
            }
        };
        self.forward
            .insert((category, value.to_string()), placeholder.clone());
        self.reverse.insert(placeholder.clone(), value.to_string());
        placeholder
    }
}

/// Non-overlapping matches sorted by position. On overlap the higher
/// priority category wins, then the earlier and longer match.
fn find_pii(text: &str) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    for (category, re) in PATTERNS.iter() {
        for m in re.find_iter(text) {
            if *category == PiiCategory::CreditCard && !luhn_valid(m.as_str()) {
                continue;
            }
            candidates.push(Candidate {
                start: m.start(),
                end: m.end(),
                category: *category,
                literal: false,
            });
        }
    }
    candidates.sort_by(|a, b| {
        a.category
            .cmp(&b.category)
            .then(a.start.cmp(&b.start))
            .then((b.end - b.start).cmp(&(a.end - a.start)))
    });
    let mut accepted: Vec<Candidate> = Vec::new();
    for c in candidates {
        if accepted.iter().all(|a| c.end <= a.start || c.start >= a.end) {
            accepted.push(c);
        }
    }
    accepted.sort_by_key(|c| c.start);
    accepted
}

fn find_literal_placeholders(text: &str) -> Vec<Candidate> {
    let Some(re) = PLACEHOLDER.as_ref() else {
        return Vec::new();
    };
    re.captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let category = PiiCategory::from_label(caps.get(1)?.as_str())?;
            Some(Candidate {
                start: whole.start(),
                end: whole.end(),
                category,
                literal: true,
            })
        })
        .collect()
}

fn is_placeholder(text: &str) -> bool {
    PLACEHOLDER
        .as_ref()
        .and_then(|re| re.find(text))
        .is_some_and(|m| m.start() == 0 && m.end() == text.len())
}

fn luhn_valid(candidate: &str) -> bool {
    let digits: Vec<u32> = candidate.chars().filter_map(|c| c.to_digit(10)).collect();
    if !(13..=19).contains(&digits.len()) {
        return false;
    }
    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenizes_each_category() {
        let mut t = PiiTokenizer::new();
        let input = "Mail jane.doe@example.com or call (555) 123-4567. \
                     SSN 123-45-6789, card 4111 1111 1111 1111.";
        let out = t.tokenize(input);
        assert!(out.contains("[EMAIL_1]"));
        assert!(out.contains("[PHONE_1]"));
        assert!(out.contains("[SSN_1]"));
        assert!(out.contains("[CREDIT_CARD_1]"));
        assert!(!out.contains("jane.doe"));
        assert!(!out.contains("4111"));
        assert_eq!(t.detokenize(&out), input);
    }

    #[test]
    fn test_same_value_reuses_placeholder() {
        let mut t = PiiTokenizer::new();
        let out = t.tokenize("a@b.io, c@d.io, a@b.io");
        assert_eq!(out, "[EMAIL_1], [EMAIL_2], [EMAIL_1]");
        let counts = t.get_token_count_by_type();
        assert_eq!(counts[&PiiCategory::Email], 2);
        assert_eq!(counts[&PiiCategory::Phone], 0);
    }

    #[test]
    fn test_luhn_rejects_random_digits() {
        let mut t = PiiTokenizer::new();
        let input = "order 1234567890123 shipped";
        assert_eq!(t.tokenize(input), input);
        assert!(!t.contains_pii(input));
        assert!(t.contains_pii("card 4111-1111-1111-1111"));
    }

    #[test]
    fn test_round_trip_over_tricky_inputs() {
        let inputs = [
            "",
            "no pii here",
            "[EMAIL_1] literal and x@y.com",
            "[EMAIL_x@y.com]",
            "[PHONE_1][PHONE_2] 555-123-4567",
            "unicode ✓ ünï ann@example.org ✓",
            "+1 555.123.4567 and 555 123 4567",
            "123-45-6789123-45-6789",
            "a@b.co\na@b.co\n",
        ];
        for input in inputs {
            let mut t = PiiTokenizer::new();
            let tokenized = t.tokenize(input);
            assert_eq!(t.detokenize(&tokenized), input, "round trip failed for {:?}", input);
        }
    }

    #[test]
    fn test_literal_placeholder_is_not_reused() {
        let mut t = PiiTokenizer::new();
        let out = t.tokenize("[EMAIL_1] then x@y.com");
        assert_eq!(out, "[EMAIL_1] then [EMAIL_2]");
        assert_eq!(t.detokenize(&out), "[EMAIL_1] then x@y.com");
    }

    #[test]
    fn test_reused_tokenizer_round_trips_literal_placeholders() {
        let mut t = PiiTokenizer::new();
        let first = t.tokenize("contact alice@corp.com");
        assert_eq!(first, "contact [EMAIL_1]");

        let inputs = [
            "template literal [EMAIL_1] here",
            "[EMAIL_1] and bob@corp.com",
            "alice@corp.com wrote [EMAIL_1]",
            "reserved [EMAIL_9] stays",
        ];
        for input in inputs {
            let tokenized = t.tokenize(input);
            assert!(!tokenized.contains("alice@corp.com"));
            assert_eq!(t.detokenize(&tokenized), input, "round trip failed for {:?}", input);
        }
        assert_eq!(t.detokenize(&first), "contact alice@corp.com");

        // A number seen literally is never handed to a real value later.
        for i in 0..12 {
            let out = t.tokenize(&format!("user{}@corp.com", i));
            assert_ne!(out, "[EMAIL_9]");
        }
        assert_eq!(t.detokenize("reserved [EMAIL_9] stays"), "reserved [EMAIL_9] stays");
        assert_eq!(t.get_token_count_by_type()[&PiiCategory::Email], 14);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut t = PiiTokenizer::new();
        t.tokenize("x@y.com");
        t.reset();
        assert_eq!(t.get_token_count_by_type()[&PiiCategory::Email], 0);
        assert_eq!(t.detokenize("[EMAIL_1]"), "[EMAIL_1]");
        assert_eq!(t.tokenize("z@y.com"), "[EMAIL_1]");
    }

    #[test]
    fn test_contains_pii_prefilter() {
        let t = PiiTokenizer::new();
        assert!(t.contains_pii("reach me at me@host.dev"));
        assert!(t.contains_pii("ssn 078-05-1120"));
        assert!(!t.contains_pii("version 1.2.3 released"));
    }
}
