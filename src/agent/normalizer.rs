//! Answer normalizer
//!
//! Structural cleanup only: label prefix, surrounding quotes, surrounding
//! whitespace. Casing and interior content are never touched. Passes repeat
//! until nothing changes, so `normalize` is idempotent.

use thiserror::Error;

/// Label prefixes removed from the front of an answer, matched
/// case-insensitively. Longer labels come before their suffixes so
/// "final answer:" wins over "answer:". The colon-less form carries its
/// trailing space so "The answer isotope" is left alone.
const LABELS: &[&str] = &[
    "final answer:",
    "the answer is:",
    "the result is:",
    "the answer is ",
    "answer:",
    "result:",
];

/// Matching quote pairs around a whole answer
const QUOTE_PAIRS: &[(char, char)] = &[('"', '"'), ('\'', '\''), ('\u{201c}', '\u{201d}')];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("answer is unnormalizable: {0}")]
    Unnormalizable(String),
}

/// Normalize a candidate answer into its canonical form
pub fn normalize(raw: &str) -> Result<String, NormalizeError> {
    let mut current = raw;
    loop {
        let next = normalize_pass(current);
        if next == current {
            break;
        }
        current = next;
    }

    if current.is_empty() {
        return Err(NormalizeError::Unnormalizable(if raw.trim().is_empty() {
            "answer is empty".to_string()
        } else {
            format!("nothing left of '{}' after removing labels and quotes", raw.trim())
        }));
    }

    Ok(current.to_string())
}

/// One pass of every rule, in order
fn normalize_pass(s: &str) -> &str {
    let s = strip_label(s);
    let s = strip_quotes(s);
    s.trim()
}

fn strip_label(s: &str) -> &str {
    let trimmed = s.trim_start();
    for label in LABELS {
        if let Some(head) = trimmed.get(..label.len())
            && head.eq_ignore_ascii_case(label)
        {
            return trimmed[label.len()..].trim_start();
        }
    }
    s
}

fn strip_quotes(s: &str) -> &str {
    for &(open, close) in QUOTE_PAIRS {
        if let Some(inner) = s.strip_prefix(open).and_then(|rest| rest.strip_suffix(close)) {
            return inner;
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trips() {
        assert_eq!(normalize("FINAL ANSWER: \"Paris\"").unwrap(), "Paris");
        assert_eq!(normalize("   42   ").unwrap(), "42");
        assert!(matches!(normalize(""), Err(NormalizeError::Unnormalizable(_))));
    }

    #[test]
    fn test_labels_case_insensitive() {
        assert_eq!(normalize("final answer: 7").unwrap(), "7");
        assert_eq!(normalize("Final Answer: Blue whale").unwrap(), "Blue whale");
        assert_eq!(normalize("The answer is: yes").unwrap(), "yes");
        assert_eq!(normalize("  ANSWER:   3.14").unwrap(), "3.14");
    }

    #[test]
    fn test_result_and_colonless_labels() {
        assert_eq!(normalize("Result: 12").unwrap(), "12");
        assert_eq!(normalize("The result is: 3").unwrap(), "3");
        assert_eq!(normalize("The answer is 42").unwrap(), "42");
        assert_eq!(normalize("the answer is \"Lima\"").unwrap(), "Lima");
        assert_eq!(normalize("The answer isotope").unwrap(), "The answer isotope");
        assert_eq!(normalize("Results: mixed").unwrap(), "Results: mixed");
    }

    #[test]
    fn test_nested_labels_and_quotes() {
        assert_eq!(normalize("FINAL ANSWER: 'Answer: \"x\"'").unwrap(), "x");
        assert_eq!(normalize("\u{201c}Tokyo\u{201d}").unwrap(), "Tokyo");
    }

    #[test]
    fn test_interior_untouched() {
        assert_eq!(normalize("Rock 'n' Roll").unwrap(), "Rock 'n' Roll");
        assert_eq!(normalize("the Answer: is here").unwrap(), "the Answer: is here");
        assert_eq!(normalize("iPhone").unwrap(), "iPhone");
    }

    #[test]
    fn test_mismatched_quotes_kept() {
        assert_eq!(normalize("\"Paris'").unwrap(), "\"Paris'");
    }

    #[test]
    fn test_empty_after_cleanup() {
        assert!(normalize("   ").is_err());
        assert!(normalize("FINAL ANSWER:").is_err());
        assert!(normalize("\"\"").is_err());
        assert!(normalize("Answer: ''").is_err());
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "FINAL ANSWER: \"Paris\"",
            "   42   ",
            "Answer: answer: 'x'",
            "\" spaced \"",
            "'\"quoted twice\"'",
            "\"a\" and \"b\"",
            "no change",
            "The answer is: \u{201c}3\u{201d}",
            "The answer is Result: 8",
            "'",
        ];
        for input in inputs {
            let once = normalize(input).unwrap();
            assert_eq!(normalize(&once).unwrap(), once, "input: {:?}", input);
        }
    }
}
