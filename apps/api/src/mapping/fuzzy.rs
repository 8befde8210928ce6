//! Similarity helpers shared by the field mapper and the answer resolver.

use std::collections::BTreeSet;

use crate::mapping::normalize::{content_tokens, normalize_label};

/// Confidence assigned when a numeric answer falls inside an option's range.
const RANGE_MATCH_SCORE: f64 = 0.9;
/// Confidence for "Yes, I am..." style answers against a one-word option.
const LEADING_TOKEN_SCORE: f64 = 0.85;

/// Dice coefficient over content tokens of two normalized strings (0.0 – 1.0).
pub fn token_overlap(a: &str, b: &str) -> f64 {
    let left: BTreeSet<&str> = content_tokens(a).into_iter().collect();
    let right: BTreeSet<&str> = content_tokens(b).into_iter().collect();
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    let shared = left.intersection(&right).count();
    (2 * shared) as f64 / (left.len() + right.len()) as f64
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptionMatch {
    pub option: String,
    pub score: f64,
}

/// Constrains a free-text answer to one of the listed options.
///
/// Tries, in order: normalized equality (1.0), numeric range containment (0.9),
/// one-word option leading the answer (0.85), then token overlap. Returns `None`
/// when the best candidate is below `threshold`; never picks arbitrarily.
pub fn match_option(value: &str, options: &[String], threshold: f64) -> Option<OptionMatch> {
    let wanted = normalize_label(value);
    if wanted.is_empty() || options.is_empty() {
        return None;
    }

    if let Some(option) = options.iter().find(|o| normalize_label(o) == wanted) {
        return Some(OptionMatch {
            option: option.clone(),
            score: 1.0,
        });
    }

    if let Some(number) = first_number(value) {
        if let Some(option) = options
            .iter()
            .find(|o| parse_range(o).is_some_and(|r| r.contains(number)))
        {
            return Some(OptionMatch {
                option: option.clone(),
                score: RANGE_MATCH_SCORE,
            })
            .filter(|m| m.score >= threshold);
        }
    }

    let mut best: Option<OptionMatch> = None;
    for option in options {
        let normalized = normalize_label(option);
        let leading = wanted.split(' ').next() == Some(normalized.as_str())
            && !normalized.contains(' ');
        let score = if leading {
            LEADING_TOKEN_SCORE
        } else {
            token_overlap(&wanted, &normalized)
        };
        // strictly greater keeps the earlier option on ties
        if best.as_ref().map_or(true, |b| score > b.score) {
            best = Some(OptionMatch {
                option: option.clone(),
                score,
            });
        }
    }
    best.filter(|m| m.score >= threshold)
}

/// Interprets common yes/no answers for checkboxes.
pub fn parse_flag(value: &str) -> Option<bool> {
    let normalized = normalize_label(value);
    let first = normalized.split(' ').next().unwrap_or_default();
    match first {
        "yes" | "y" | "true" | "1" | "agree" | "checked" | "accept" => Some(true),
        "no" | "n" | "false" | "0" | "decline" | "unchecked" => Some(false),
        _ if normalized.starts_with("i agree") || normalized.starts_with("i accept") => Some(true),
        _ => None,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Numeric ranges ("0-2", "3 to 5", "6+", "less than 1 year")
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
struct NumericRange {
    low: f64,
    high: f64,
    high_inclusive: bool,
}

impl NumericRange {
    fn contains(&self, value: f64) -> bool {
        value >= self.low
            && if self.high_inclusive {
                value <= self.high
            } else {
                value < self.high
            }
    }
}

fn parse_range(option: &str) -> Option<NumericRange> {
    let numbers = numbers_in(option);
    let lower = option.to_lowercase();
    let open_ended = lower.contains('+')
        || ["or more", "more than", "at least", "over", "above"]
            .iter()
            .any(|p| lower.contains(p));
    let capped = ["less than", "under", "below", "fewer than", "<"]
        .iter()
        .any(|p| lower.contains(p));

    match numbers.as_slice() {
        [n] if open_ended => Some(NumericRange {
            low: *n,
            high: f64::INFINITY,
            high_inclusive: true,
        }),
        [n] if capped => Some(NumericRange {
            low: 0.0,
            high: *n,
            high_inclusive: false,
        }),
        [n] => Some(NumericRange {
            low: *n,
            high: *n,
            high_inclusive: true,
        }),
        [a, b, ..] => Some(NumericRange {
            low: a.min(*b),
            high: a.max(*b),
            high_inclusive: true,
        }),
        [] => None,
    }
}

fn first_number(text: &str) -> Option<f64> {
    numbers_in(text).into_iter().next()
}

fn numbers_in(text: &str) -> Vec<f64> {
    let mut numbers = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = text.chars().collect();
    for (i, c) in chars.iter().enumerate() {
        let thousands_sep = *c == ','
            && !current.is_empty()
            && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit());
        let decimal_point = *c == '.'
            && !current.is_empty()
            && !current.contains('.')
            && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit());
        if c.is_ascii_digit() || decimal_point {
            current.push(*c);
        } else if thousands_sep {
            continue;
        } else if !current.is_empty() {
            numbers.extend(current.parse::<f64>().ok());
            current.clear();
        }
    }
    if !current.is_empty() {
        numbers.extend(current.parse::<f64>().ok());
    }
    numbers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_token_overlap_ignores_filler_words() {
        let score = token_overlap("years of experience", "years experience");
        assert!((score - 1.0).abs() < f64::EPSILON, "score was {score}");
    }

    #[test]
    fn test_token_overlap_partial() {
        // {years, professional, experience} vs {years, experience}: 4/5
        let score = token_overlap("years of professional experience", "years experience");
        assert!((score - 0.8).abs() < 1e-9, "score was {score}");
    }

    #[test]
    fn test_numeric_answer_lands_in_range() {
        let options = opts(&["0-2", "3-5", "6+"]);
        let m = match_option("4 years", &options, 0.8).unwrap();
        assert_eq!(m.option, "3-5");
        let m = match_option("About 10 years", &options, 0.8).unwrap();
        assert_eq!(m.option, "6+");
    }

    #[test]
    fn test_unmatched_answer_is_not_forced() {
        let options = opts(&["0-2", "3-5", "6+"]);
        assert_eq!(match_option("unsure", &options, 0.8), None);
    }

    #[test]
    fn test_exact_option_preferred() {
        let options = opts(&["Yes", "No"]);
        let m = match_option("yes", &options, 0.8).unwrap();
        assert_eq!(m.option, "Yes");
        assert_eq!(m.score, 1.0);
    }

    #[test]
    fn test_leading_yes_matches_single_word_option() {
        let options = opts(&["Yes", "No"]);
        let m = match_option("Yes, I am authorized to work", &options, 0.8).unwrap();
        assert_eq!(m.option, "Yes");
    }

    #[test]
    fn test_less_than_range_is_exclusive() {
        let options = opts(&["Less than 1 year", "1-3 years"]);
        assert_eq!(
            match_option("1 year", &options, 0.8).unwrap().option,
            "1-3 years"
        );
        assert_eq!(
            match_option("0.5 years", &options, 0.8).unwrap().option,
            "Less than 1 year"
        );
    }

    #[test]
    fn test_numbers_with_separators() {
        assert_eq!(numbers_in("$120,000 - 140,000"), vec![120000.0, 140000.0]);
        assert_eq!(numbers_in("2.5 years."), vec![2.5]);
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("Yes"), Some(true));
        assert_eq!(parse_flag("I agree to the terms"), Some(true));
        assert_eq!(parse_flag("no thanks"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
