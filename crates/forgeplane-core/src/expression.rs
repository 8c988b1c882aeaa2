// Closed expression grammar for `if`/`unless` step conditions (§4.6):
//   <lhs> (==|!=|>|>=|<|<=) <rhs>
//   <lhs> contains <rhs> | startsWith <rhs> | endsWith <rhs> | matches <regex>
//
// Callers pass in an already-interpolated expression string (variable
// substitution is the executor's job, not this module's); this module only
// tokenizes the operator and evaluates it.

use crate::error::ValidationError;
use regex::Regex;
use std::sync::OnceLock;

fn operator_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)^(.*?)\s+(==|!=|>=|<=|>|<|contains|startsWith|endsWith|matches)\s+(.*)$")
            .expect("static expression regex is valid")
    })
}

/// Evaluate an interpolated expression string and return its boolean result.
///
/// Numeric comparisons (`>`, `>=`, `<`, `<=`) require both sides to parse as
/// `f64`; if either side doesn't, this returns `ExprError` per §4.6 rather
/// than silently falling back to string comparison.
pub fn evaluate(expr: &str) -> Result<bool, ValidationError> {
    let expr = expr.trim();
    let captures = operator_re()
        .captures(expr)
        .ok_or_else(|| ValidationError::ExprError(format!("unrecognized expression: {expr:?}")))?;

    let lhs = captures.get(1).unwrap().as_str().trim();
    let op = captures.get(2).unwrap().as_str();
    let rhs = captures.get(3).unwrap().as_str().trim();

    match op {
        "==" => Ok(lhs == rhs),
        "!=" => Ok(lhs != rhs),
        ">" | ">=" | "<" | "<=" => {
            let (l, r) = parse_numeric_pair(lhs, rhs)?;
            Ok(match op {
                ">" => l > r,
                ">=" => l >= r,
                "<" => l < r,
                "<=" => l <= r,
                _ => unreachable!(),
            })
        }
        "contains" => Ok(lhs.contains(rhs)),
        "startsWith" => Ok(lhs.starts_with(rhs)),
        "endsWith" => Ok(lhs.ends_with(rhs)),
        "matches" => {
            let pattern = Regex::new(rhs)
                .map_err(|e| ValidationError::ExprError(format!("invalid regex {rhs:?}: {e}")))?;
            Ok(pattern.is_match(lhs))
        }
        other => Err(ValidationError::ExprError(format!("unknown operator: {other}"))),
    }
}

/// `unless: X` is `if: !(X)` modulo this grammar — negate whatever `evaluate`
/// would return for the same expression.
pub fn evaluate_negated(expr: &str) -> Result<bool, ValidationError> {
    evaluate(expr).map(|b| !b)
}

fn parse_numeric_pair(lhs: &str, rhs: &str) -> Result<(f64, f64), ValidationError> {
    let l: f64 = lhs
        .parse()
        .map_err(|_| ValidationError::ExprError(format!("left-hand side {lhs:?} is not numeric")))?;
    let r: f64 = rhs
        .parse()
        .map_err(|_| ValidationError::ExprError(format!("right-hand side {rhs:?} is not numeric")))?;
    Ok((l, r))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_operators() {
        assert!(evaluate("foo == foo").unwrap());
        assert!(!evaluate("foo == bar").unwrap());
        assert!(evaluate("foo != bar").unwrap());
    }

    #[test]
    fn numeric_comparisons() {
        assert!(evaluate("5 > 3").unwrap());
        assert!(evaluate("3 >= 3").unwrap());
        assert!(evaluate("2 < 3").unwrap());
        assert!(!evaluate("5 < 3").unwrap());
    }

    #[test]
    fn numeric_comparison_with_non_numeric_side_is_expr_error() {
        let err = evaluate("abc > 3").unwrap_err();
        assert!(matches!(err, ValidationError::ExprError(_)));
    }

    #[test]
    fn string_predicates() {
        assert!(evaluate("hello-world contains world").unwrap());
        assert!(evaluate("hello-world startsWith hello").unwrap());
        assert!(evaluate("hello-world endsWith world").unwrap());
    }

    #[test]
    fn regex_predicate() {
        assert!(evaluate(r"v1.2.3 matches ^v\d+\.\d+\.\d+$").unwrap());
        assert!(!evaluate(r"abc matches ^\d+$").unwrap());
    }

    #[test]
    fn unless_negates_if() {
        assert!(!evaluate_negated("foo == foo").unwrap());
        assert!(evaluate_negated("foo == bar").unwrap());
    }

    #[test]
    fn unrecognized_expression_is_expr_error() {
        assert!(evaluate("just-one-token").is_err());
    }
}
