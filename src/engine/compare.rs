//! Format-aware answer checks.
//!
//! Each `ExpectationSpec` variant maps to one rule here. Everything is pure:
//! the comparator only ever sees the response body text.

use serde_json::{Number, Value};

use crate::domain::{DigestAlgorithm, ExpectationSpec, Verdict};

/// How the answer is pulled out of a 2xx response body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AnswerFormat {
    #[default]
    Raw,
    /// Top-level field of a JSON object envelope, e.g. `{"answer": "..."}`.
    JsonField(String),
}

pub fn extract_answer(format: &AnswerFormat, body: &str) -> Result<String, String> {
    let field = match format {
        AnswerFormat::Raw => return Ok(body.to_string()),
        AnswerFormat::JsonField(field) => field,
    };

    let envelope: Value =
        serde_json::from_str(body.trim()).map_err(|_| format!("missing answer field `{field}`: body is not JSON"))?;
    match envelope.get(field) {
        Some(Value::String(text)) => Ok(text.clone()),
        Some(other) => Ok(other.to_string()),
        None => Err(format!("missing answer field `{field}`")),
    }
}

pub fn compare(expected: &ExpectationSpec, actual: &str) -> Verdict {
    let result = match expected {
        ExpectationSpec::ExactText { value } => compare_exact(value, actual),
        ExpectationSpec::HashOfExternalCommand { algorithm } => check_digest(*algorithm, actual),
        ExpectationSpec::NumericWithTolerance { value, epsilon } => {
            compare_numeric(*value, *epsilon, actual)
        }
        ExpectationSpec::JsonStructuralEquals {
            value,
            unordered_paths,
        } => compare_json(value, unordered_paths, actual),
    };

    match result {
        Ok(()) => Verdict::Pass,
        Err(reason) => Verdict::Fail(reason),
    }
}

fn compare_exact(expected: &str, actual: &str) -> Result<(), String> {
    let trimmed = actual.trim();
    if trimmed == expected {
        return Ok(());
    }
    Err(format!("expected {expected:?}, got {trimmed:?}"))
}

fn check_digest(algorithm: DigestAlgorithm, actual: &str) -> Result<(), String> {
    let trimmed = actual.trim();
    // `cmd | sha256sum` prints "<hex>  -".
    let digest = trimmed.strip_suffix("  -").unwrap_or(trimmed);
    let expected_len = algorithm.hex_len();

    let is_hex = digest
        .bytes()
        .all(|byte| byte.is_ascii_digit() || (b'a'..=b'f').contains(&byte));
    if digest.len() == expected_len && is_hex {
        return Ok(());
    }
    Err(format!(
        "expected {expected_len} lowercase hex digits ({algorithm:?} digest), got {trimmed:?}"
    ))
}

fn compare_numeric(expected: f64, epsilon: f64, actual: &str) -> Result<(), String> {
    let trimmed = actual.trim();
    let parsed: f64 = trimmed
        .parse()
        .ok()
        .filter(|value: &f64| value.is_finite())
        .ok_or_else(|| format!("not numeric: expected {expected}, got {trimmed:?}"))?;

    let delta = (parsed - expected).abs();
    if delta <= epsilon {
        return Ok(());
    }
    Err(format!("expected {expected} ± {epsilon}, got {parsed} (off by {delta})"))
}

fn compare_json(expected: &Value, unordered_paths: &[String], actual: &str) -> Result<(), String> {
    let parsed: Value = serde_json::from_str(actual.trim())
        .map_err(|err| format!("invalid JSON: {err}; got {:?}", actual.trim()))?;

    match first_difference(expected, &parsed, "", unordered_paths) {
        None => Ok(()),
        Some(diff) => Err(format!("{diff}; expected {expected}, got {parsed}")),
    }
}

/// Describes the first mismatch, addressed by JSON Pointer.
pub fn first_difference(
    expected: &Value,
    actual: &Value,
    path: &str,
    unordered_paths: &[String],
) -> Option<String> {
    match (expected, actual) {
        (Value::Object(expected_map), Value::Object(actual_map)) => {
            for (key, expected_value) in expected_map {
                let child = child_path(path, key);
                match actual_map.get(key) {
                    Some(actual_value) => {
                        if let Some(diff) =
                            first_difference(expected_value, actual_value, &child, unordered_paths)
                        {
                            return Some(diff);
                        }
                    }
                    None => return Some(format!("at {}: missing key", display_path(&child))),
                }
            }
            actual_map
                .keys()
                .find(|key| !expected_map.contains_key(*key))
                .map(|key| format!("at {}: unexpected key", display_path(&child_path(path, key))))
        }
        (Value::Array(expected_items), Value::Array(actual_items)) => {
            if unordered_paths.iter().any(|marked| marked == path) {
                return multiset_difference(expected_items, actual_items, path, unordered_paths);
            }
            for (idx, (expected_item, actual_item)) in
                expected_items.iter().zip(actual_items).enumerate()
            {
                let child = child_path(path, &idx.to_string());
                if let Some(diff) = first_difference(expected_item, actual_item, &child, unordered_paths)
                {
                    return Some(diff);
                }
            }
            if expected_items.len() != actual_items.len() {
                return Some(format!(
                    "at {}: expected {} elements, got {}",
                    display_path(path),
                    expected_items.len(),
                    actual_items.len()
                ));
            }
            None
        }
        (Value::Number(expected_number), Value::Number(actual_number)) => {
            (!numbers_equal(expected_number, actual_number))
                .then(|| mismatch(path, expected, actual))
        }
        _ => (expected != actual).then(|| mismatch(path, expected, actual)),
    }
}

/// Integers compare exactly; f64 is used only when one side is a float.
fn numbers_equal(expected: &Number, actual: &Number) -> bool {
    if let (Some(lhs), Some(rhs)) = (expected.as_i64(), actual.as_i64()) {
        return lhs == rhs;
    }
    if let (Some(lhs), Some(rhs)) = (expected.as_u64(), actual.as_u64()) {
        return lhs == rhs;
    }
    if !expected.is_f64() && !actual.is_f64() {
        return false;
    }
    expected.as_f64() == actual.as_f64()
}

fn multiset_difference(
    expected_items: &[Value],
    actual_items: &[Value],
    path: &str,
    unordered_paths: &[String],
) -> Option<String> {
    if expected_items.len() != actual_items.len() {
        return Some(format!(
            "at {}: expected {} elements, got {}",
            display_path(path),
            expected_items.len(),
            actual_items.len()
        ));
    }

    let mut used = vec![false; actual_items.len()];
    for (idx, expected_item) in expected_items.iter().enumerate() {
        let child = child_path(path, &idx.to_string());
        let found = actual_items.iter().enumerate().position(|(actual_idx, actual_item)| {
            !used[actual_idx]
                && first_difference(expected_item, actual_item, &child, unordered_paths).is_none()
        });
        match found {
            Some(actual_idx) => used[actual_idx] = true,
            None => {
                return Some(format!(
                    "at {}: no element matches expected {expected_item}",
                    display_path(path)
                ))
            }
        }
    }
    None
}

fn mismatch(path: &str, expected: &Value, actual: &Value) -> String {
    format!("at {}: expected {expected}, got {actual}", display_path(path))
}

fn child_path(parent: &str, token: &str) -> String {
    let escaped = token.replace('~', "~0").replace('/', "~1");
    format!("{parent}/{escaped}")
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "/"
    } else {
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fail_reason(verdict: Verdict) -> String {
        match verdict {
            Verdict::Fail(reason) => reason,
            other => panic!("expected Fail, got {other:?}"),
        }
    }

    #[test]
    fn exact_text_trims_surrounding_whitespace() {
        let expected = ExpectationSpec::exact("test_answer");
        assert_eq!(compare(&expected, "  test_answer\n"), Verdict::Pass);

        let reason = fail_reason(compare(&expected, "Test_answer"));
        assert!(reason.contains("\"test_answer\""), "{reason}");
        assert!(reason.contains("\"Test_answer\""), "{reason}");
    }

    #[test]
    fn exact_text_keeps_inner_whitespace() {
        let expected = ExpectationSpec::exact("a b");
        assert!(!compare(&expected, "a  b").is_pass());
    }

    #[test]
    fn numeric_tolerance_boundaries() {
        let expected = ExpectationSpec::numeric(10.0, 0.01);
        assert_eq!(compare(&expected, "10.005"), Verdict::Pass);
        assert!(!compare(&expected, "10.02").is_pass());
        assert_eq!(compare(&ExpectationSpec::numeric(360.0, 0.0), "360\n"), Verdict::Pass);
    }

    #[test]
    fn numeric_rejects_non_numbers() {
        let expected = ExpectationSpec::numeric(1.0, 0.5);
        assert!(fail_reason(compare(&expected, "about one")).starts_with("not numeric"));
        assert!(fail_reason(compare(&expected, "NaN")).starts_with("not numeric"));
    }

    #[test]
    fn digest_shape_is_validated() {
        let expected = ExpectationSpec::HashOfExternalCommand {
            algorithm: DigestAlgorithm::Sha256,
        };
        let digest = "a".repeat(64);
        assert_eq!(compare(&expected, &format!("{digest}\n")), Verdict::Pass);
        assert_eq!(compare(&expected, &format!("{digest}  -")), Verdict::Pass);
        assert!(!compare(&expected, &"A".repeat(64)).is_pass());
        assert!(!compare(&expected, &"a".repeat(63)).is_pass());
        assert!(!compare(&expected, &format!("{}g", "a".repeat(63))).is_pass());
    }

    #[test]
    fn json_key_order_is_irrelevant() {
        let expected = ExpectationSpec::json(json!({"a": 1, "b": 2}));
        assert_eq!(compare(&expected, r#"{"b":2,"a":1}"#), Verdict::Pass);

        let reason = fail_reason(compare(&expected, r#"{"a":1,"b":3}"#));
        assert!(reason.starts_with("at /b: expected 2, got 3"), "{reason}");
    }

    #[test]
    fn json_reports_missing_and_unexpected_keys() {
        let expected = ExpectationSpec::json(json!({"a": 1}));
        assert!(fail_reason(compare(&expected, "{}")).starts_with("at /a: missing key"));
        assert!(fail_reason(compare(&expected, r#"{"a":1,"z":0}"#)).starts_with("at /z: unexpected key"));
    }

    #[test]
    fn json_invalid_body_fails() {
        let expected = ExpectationSpec::json(json!([]));
        assert!(fail_reason(compare(&expected, "[1,")).starts_with("invalid JSON"));
    }

    #[test]
    fn json_arrays_are_ordered_by_default() {
        let expected = ExpectationSpec::json(json!([1, 2, 3]));
        let reason = fail_reason(compare(&expected, "[1,3,2]"));
        assert!(reason.starts_with("at /1: expected 2, got 3"), "{reason}");

        let reason = fail_reason(compare(&expected, "[1,2]"));
        assert!(reason.starts_with("at /: expected 3 elements, got 2"), "{reason}");
    }

    #[test]
    fn json_unordered_arrays_compare_as_multisets() {
        let expected = ExpectationSpec::JsonStructuralEquals {
            value: json!({"tags": ["x", "y", "x"], "rows": [1, 2]}),
            unordered_paths: vec!["/tags".to_string()],
        };
        assert_eq!(compare(&expected, r#"{"tags":["y","x","x"],"rows":[1,2]}"#), Verdict::Pass);
        assert!(!compare(&expected, r#"{"tags":["y","y","x"],"rows":[1,2]}"#).is_pass());
        assert!(!compare(&expected, r#"{"tags":["x","x","y"],"rows":[2,1]}"#).is_pass());
    }

    #[test]
    fn json_numbers_compare_by_value() {
        let expected = ExpectationSpec::json(json!({"n": 1}));
        assert_eq!(compare(&expected, r#"{"n":1.0}"#), Verdict::Pass);
    }

    #[test]
    fn json_large_integers_compare_exactly() {
        let expected = ExpectationSpec::json(json!({"id": 9_007_199_254_740_993_u64}));
        let reason = fail_reason(compare(&expected, r#"{"id":9007199254740992}"#));
        assert!(reason.starts_with("at /id:"), "{reason}");
        assert_eq!(compare(&expected, r#"{"id":9007199254740993}"#), Verdict::Pass);

        let negative = ExpectationSpec::json(json!(-1));
        assert!(!compare(&negative, "18446744073709551615").is_pass());
    }

    #[test]
    fn pointer_tokens_are_escaped() {
        let diff = first_difference(&json!({"a/b": 1}), &json!({"a/b": 2}), "", &[]);
        assert_eq!(diff.as_deref(), Some("at /a~1b: expected 1, got 2"));
    }

    #[test]
    fn answer_envelope_field_is_extracted() {
        let format = AnswerFormat::JsonField("answer".to_string());
        assert_eq!(extract_answer(&format, r#"{"answer":"42"}"#), Ok("42".to_string()));
        assert_eq!(extract_answer(&format, r#"{"answer":[1,2]}"#), Ok("[1,2]".to_string()));
        assert!(extract_answer(&format, r#"{"result":"42"}"#).is_err());
        assert!(extract_answer(&format, "42 plain").is_err());
        assert_eq!(extract_answer(&AnswerFormat::Raw, " raw "), Ok(" raw ".to_string()));
    }
}
