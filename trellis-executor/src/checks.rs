//! Execution of declarative step checks.
//!
//! Checks run twice per step: against the resolved inputs before the HTTP
//! call and against the output after it. A failing critical check produces
//! an error (the step fails); a failing non-critical check produces a
//! warning on the step result.

use serde_json::Value;
use trellis_core::value::{self, type_name};
use trellis_core::workflow::{CheckKind, CheckTarget, StepCheck};

/// Findings from running the checks for one target.
#[derive(Debug, Default)]
pub struct CheckOutcome {
    /// Critical failures.
    pub errors: Vec<String>,
    /// Non-critical failures.
    pub warnings: Vec<String>,
}

impl CheckOutcome {
    /// Whether any critical check failed.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Run every check whose target matches against `data`.
#[must_use]
pub fn run_checks(data: &Value, checks: &[StepCheck], target: CheckTarget) -> CheckOutcome {
    let mut outcome = CheckOutcome::default();
    for check in checks.iter().filter(|c| c.target == target) {
        let field_value = value::traverse(data, &check.field).ok();
        if let Some(failure) = evaluate(field_value, check) {
            let message = check.message.clone().unwrap_or(failure);
            if check.critical {
                outcome.errors.push(message);
            } else {
                outcome.warnings.push(message);
            }
        }
    }
    outcome
}

/// Evaluate one check. Returns the failure message, or None if it passed.
fn evaluate(field_value: Option<&Value>, check: &StepCheck) -> Option<String> {
    let field = &check.field;
    let param = check.value.as_deref();

    // A missing path reads as null.
    let val = field_value.unwrap_or(&Value::Null);

    match check.check {
        CheckKind::NotNull => val.is_null().then(|| format!("'{field}' is null")),
        CheckKind::NotEmpty => {
            let empty = match val {
                Value::Null => true,
                Value::String(s) => s.is_empty(),
                Value::Array(a) => a.is_empty(),
                Value::Object(o) => o.is_empty(),
                _ => false,
            };
            empty.then(|| format!("'{field}' is empty"))
        }
        CheckKind::MinLength => {
            let min: usize = param.and_then(|p| p.parse().ok()).unwrap_or(0);
            let length = match val {
                Value::String(s) => Some(s.chars().count()),
                Value::Array(a) => Some(a.len()),
                Value::Object(o) => Some(o.len()),
                _ => None,
            };
            match length {
                None => Some(format!("'{field}' has no length (type: {})", type_name(val))),
                Some(len) if len < min => Some(format!("'{field}' length {len} < {min}")),
                Some(_) => None,
            }
        }
        CheckKind::Regex => {
            let pattern = param.unwrap_or("");
            let Ok(re) = regex::Regex::new(pattern) else {
                return Some(format!("'{field}': invalid check pattern /{pattern}/"));
            };
            let text = match val {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (!re.is_match(&text)).then(|| format!("'{field}' does not match /{pattern}/"))
        }
        CheckKind::Type => {
            let expected = param.unwrap_or("");
            let actual = type_name(val);
            let matches = matches!(
                (expected, val),
                ("string", Value::String(_))
                    | ("number", Value::Number(_))
                    | ("bool", Value::Bool(_))
                    | ("array", Value::Array(_))
                    | ("object", Value::Object(_))
                    | ("null", Value::Null)
            );
            (!matches).then(|| format!("'{field}' is {actual}, expected {expected}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn check(field: &str, kind: CheckKind) -> StepCheck {
        StepCheck::new(CheckTarget::Input, field, kind)
    }

    #[test]
    fn not_null_fails_on_missing_and_null_fields() {
        let data = json!({"present": 1, "null_field": null});
        let checks = vec![
            check("present", CheckKind::NotNull),
            check("null_field", CheckKind::NotNull),
            check("absent", CheckKind::NotNull),
        ];
        let outcome = run_checks(&data, &checks, CheckTarget::Input);
        assert_eq!(outcome.errors.len(), 2);
    }

    #[test]
    fn not_empty_covers_strings_arrays_objects() {
        let data = json!({"s": "", "a": [], "o": {}, "ok": "x", "zero": 0});
        let checks: Vec<_> = ["s", "a", "o", "ok", "zero"]
            .iter()
            .map(|f| check(f, CheckKind::NotEmpty))
            .collect();
        let outcome = run_checks(&data, &checks, CheckTarget::Input);
        assert_eq!(outcome.errors.len(), 3);
    }

    #[test]
    fn min_length_counts_elements() {
        let data = json!({"items": [1, 2], "name": "ab", "n": 5});
        let checks = vec![
            check("items", CheckKind::MinLength).with_value("3"),
            check("name", CheckKind::MinLength).with_value("2"),
            check("n", CheckKind::MinLength).with_value("1"),
        ];
        let outcome = run_checks(&data, &checks, CheckTarget::Input);
        assert_eq!(outcome.errors.len(), 2);
        assert!(outcome.errors[0].contains("length 2 < 3"));
        assert!(outcome.errors[1].contains("no length"));
    }

    #[test]
    fn regex_check_matches_string_form() {
        let data = json!({"email": "user@example.com", "bad": "nope"});
        let pattern = r"^[\w.+-]+@[\w.-]+\.\w+$";
        let checks = vec![
            check("email", CheckKind::Regex).with_value(pattern),
            check("bad", CheckKind::Regex).with_value(pattern),
        ];
        let outcome = run_checks(&data, &checks, CheckTarget::Input);
        assert_eq!(outcome.errors.len(), 1);
    }

    #[test]
    fn type_check_compares_json_shapes() {
        let data = json!({"n": 3, "s": "x"});
        let checks = vec![
            check("n", CheckKind::Type).with_value("number"),
            check("s", CheckKind::Type).with_value("array"),
        ];
        let outcome = run_checks(&data, &checks, CheckTarget::Input);
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].contains("expected array"));
    }

    #[test]
    fn non_critical_failures_become_warnings() {
        let data = json!({});
        let checks = vec![check("absent", CheckKind::NotNull).non_critical()];
        let outcome = run_checks(&data, &checks, CheckTarget::Input);
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.warnings.len(), 1);
        assert!(!outcome.has_errors());
    }

    #[test]
    fn custom_message_overrides_generated_one() {
        let data = json!({});
        let mut c = check("absent", CheckKind::NotNull);
        c.message = Some("order id is required".to_string());
        let outcome = run_checks(&data, &[c], CheckTarget::Input);
        assert_eq!(outcome.errors, vec!["order id is required"]);
    }

    #[test]
    fn only_matching_target_runs() {
        let data = json!({});
        let checks = vec![StepCheck::new(CheckTarget::Output, "x", CheckKind::NotNull)];
        let outcome = run_checks(&data, &checks, CheckTarget::Input);
        assert!(outcome.errors.is_empty());
    }
}
