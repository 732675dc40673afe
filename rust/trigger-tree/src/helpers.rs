//! Test and demo support: a small expression surface
//!
//! The engine treats parsing and evaluation as injected capabilities; this
//! module supplies a minimal pair of them for tests, examples, and quick
//! experiments. [`parse`] reads an infix grammar (`&&`, `||`, `!`,
//! comparisons, calls, dotted accessors, literals) and [`StateEvaluator`]
//! evaluates expressions against a JSON state object. Production embedders
//! are expected to bring their own grammar and evaluation rules.

use crate::error::{EvaluationError, ParseError};
use crate::expression::{ComparisonOperator, Evaluator, Expression, ExpressionParser, IGNORE, OPTIONAL};
use nom::branch::alt;
use nom::bytes::complete::{tag, take_while, take_while1};
use nom::character::complete::{char as token, multispace0};
use nom::combinator::{all_consuming, map, opt, recognize, value};
use nom::multi::{many0, separated_list0};
use nom::number::complete::double;
use nom::sequence::{delimited, pair, preceded};
use nom::IResult;
use serde_json::Value;

/// Parse an infix trigger expression.
pub fn parse(source: &str) -> Result<Expression, ParseError> {
    if source.trim().is_empty() {
        return Err(ParseError::UnexpectedEnd);
    }
    match all_consuming(expression)(source) {
        Ok((_, parsed)) => Ok(parsed),
        Err(nom::Err::Incomplete(_)) => Err(ParseError::UnexpectedEnd),
        Err(nom::Err::Error(error) | nom::Err::Failure(error)) => {
            let rest: String = error.input.trim_start().chars().take(32).collect();
            if rest.is_empty() {
                Err(ParseError::UnexpectedEnd)
            } else {
                Err(ParseError::Syntax { rest })
            }
        }
    }
}

/// [`ExpressionParser`] over [`parse`], for injection into the tree façade.
pub struct TextParser;

impl ExpressionParser for TextParser {
    fn parse(&self, source: &str) -> Result<Expression, ParseError> {
        parse(source)
    }
}

fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn expression(input: &str) -> IResult<&str, Expression> {
    or_expression(input)
}

fn or_expression(input: &str) -> IResult<&str, Expression> {
    let (rest, first) = and_expression(input)?;
    let (rest, others) = many0(preceded(ws(tag("||")), and_expression))(rest)?;
    Ok((rest, fold_connective(first, others, false)))
}

fn and_expression(input: &str) -> IResult<&str, Expression> {
    let (rest, first) = unary(input)?;
    let (rest, others) = many0(preceded(ws(tag("&&")), unary))(rest)?;
    Ok((rest, fold_connective(first, others, true)))
}

fn fold_connective(first: Expression, others: Vec<Expression>, conjunction: bool) -> Expression {
    if others.is_empty() {
        return first;
    }
    let mut children = Vec::with_capacity(others.len() + 1);
    children.push(first);
    children.extend(others);
    if conjunction {
        Expression::And(children)
    } else {
        Expression::Or(children)
    }
}

fn unary(input: &str) -> IResult<&str, Expression> {
    alt((
        map(preceded(ws(token('!')), unary), Expression::not),
        primary,
    ))(input)
}

fn primary(input: &str) -> IResult<&str, Expression> {
    alt((
        ws(delimited(token('('), expression, ws(token(')')))),
        comparison_or_operand,
    ))(input)
}

fn comparison_or_operand(input: &str) -> IResult<&str, Expression> {
    let (rest, left) = operand(input)?;
    let (rest, op) = opt(ws(comparison_operator))(rest)?;
    match op {
        Some(op) => {
            let (rest, right) = operand(rest)?;
            Ok((rest, Expression::compare(op, left, right)))
        }
        None => Ok((rest, left)),
    }
}

fn comparison_operator(input: &str) -> IResult<&str, ComparisonOperator> {
    alt((
        value(ComparisonOperator::LessThanOrEqual, tag("<=")),
        value(ComparisonOperator::GreaterThanOrEqual, tag(">=")),
        value(ComparisonOperator::Equal, tag("==")),
        value(ComparisonOperator::NotEqual, tag("!=")),
        value(ComparisonOperator::LessThan, tag("<")),
        value(ComparisonOperator::GreaterThan, tag(">")),
    ))(input)
}

fn operand(input: &str) -> IResult<&str, Expression> {
    ws(alt((number, string_literal, ident_expression)))(input)
}

fn number(input: &str) -> IResult<&str, Expression> {
    map(double, |parsed| {
        let value = if parsed.fract() == 0.0 && parsed.abs() < i64::MAX as f64 {
            Value::from(parsed as i64)
        } else {
            Value::from(parsed)
        };
        Expression::Constant(value)
    })(input)
}

fn string_literal(input: &str) -> IResult<&str, Expression> {
    map(
        delimited(token('\''), take_while(|c| c != '\''), token('\'')),
        Expression::constant,
    )(input)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))(input)
}

/// An identifier continues as a call, a boolean literal, or a dotted
/// accessor.
fn ident_expression(input: &str) -> IResult<&str, Expression> {
    let (rest, first) = identifier(input)?;
    let (rest, args) = opt(call_arguments)(rest)?;
    if let Some(args) = args {
        return Ok((rest, Expression::call(first, args)));
    }
    match first {
        "true" => Ok((rest, Expression::truth(true))),
        "false" => Ok((rest, Expression::truth(false))),
        _ => {
            let (rest, tail) = many0(preceded(token('.'), identifier))(rest)?;
            let mut path = first.to_string();
            for segment in tail {
                path.push('.');
                path.push_str(segment);
            }
            Ok((rest, Expression::accessor(path)))
        }
    }
}

fn call_arguments(input: &str) -> IResult<&str, Vec<Expression>> {
    delimited(
        token('('),
        separated_list0(ws(token(',')), expression),
        ws(token(')')),
    )(input)
}

/// Evaluates expressions against a JSON object state.
///
/// Accessors resolve dot-separated paths and must land on booleans;
/// comparisons work over numbers and strings; `exists(path)` tests presence.
/// Anything else is an [`EvaluationError`], which the match walk treats as a
/// non-match.
pub struct StateEvaluator;

impl Evaluator for StateEvaluator {
    fn evaluate(&self, expression: &Expression, state: &Value) -> Result<bool, EvaluationError> {
        evaluate_bool(expression, state)
    }
}

fn evaluate_bool(expression: &Expression, state: &Value) -> Result<bool, EvaluationError> {
    match expression {
        Expression::And(children) => {
            for child in children {
                if !evaluate_bool(child, state)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Expression::Or(children) => {
            for child in children {
                if evaluate_bool(child, state)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Expression::Not(inner) => Ok(!evaluate_bool(inner, state)?),
        Expression::Compare { op, args } => match args.as_slice() {
            [left, right] => {
                let left = resolve_operand(left, state)?;
                let right = resolve_operand(right, state)?;
                compare_values(*op, left, right)
            }
            _ => Err(EvaluationError::Unsupported {
                kind: op.symbol().to_string(),
            }),
        },
        Expression::Call { name, args } => match name.as_str() {
            "exists" if args.len() == 1 => match &args[0] {
                Expression::Accessor(path) => Ok(lookup(state, path).is_some()),
                _ => Err(EvaluationError::Unsupported {
                    kind: "exists".to_string(),
                }),
            },
            OPTIONAL | IGNORE if args.len() == 1 => evaluate_bool(&args[0], state),
            _ => Err(EvaluationError::Unsupported { kind: name.clone() }),
        },
        Expression::Accessor(path) => match lookup(state, path) {
            Some(Value::Bool(found)) => Ok(*found),
            Some(other) => Err(EvaluationError::TypeMismatch {
                expected: "bool".to_string(),
                actual: type_name(other).to_string(),
            }),
            None => Err(EvaluationError::MissingValue { path: path.clone() }),
        },
        Expression::Constant(Value::Bool(value)) => Ok(*value),
        Expression::Constant(other) => Err(EvaluationError::TypeMismatch {
            expected: "bool".to_string(),
            actual: type_name(other).to_string(),
        }),
    }
}

fn resolve_operand<'a>(
    expression: &'a Expression,
    state: &'a Value,
) -> Result<&'a Value, EvaluationError> {
    match expression {
        Expression::Constant(value) => Ok(value),
        Expression::Accessor(path) => {
            lookup(state, path).ok_or_else(|| EvaluationError::MissingValue { path: path.clone() })
        }
        other => Err(EvaluationError::Unsupported {
            kind: other.kind().to_string(),
        }),
    }
}

fn lookup<'a>(state: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = state;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

fn compare_values(
    op: ComparisonOperator,
    left: &Value,
    right: &Value,
) -> Result<bool, EvaluationError> {
    match op {
        ComparisonOperator::Equal => Ok(loose_equal(left, right)),
        ComparisonOperator::NotEqual => Ok(!loose_equal(left, right)),
        _ => {
            if let (Some(left), Some(right)) = (left.as_f64(), right.as_f64()) {
                Ok(ordered(op, left.partial_cmp(&right)))
            } else if let (Some(left), Some(right)) = (left.as_str(), right.as_str()) {
                Ok(ordered(op, left.partial_cmp(right)))
            } else {
                Err(EvaluationError::TypeMismatch {
                    expected: "two numbers or two strings".to_string(),
                    actual: format!("{} and {}", type_name(left), type_name(right)),
                })
            }
        }
    }
}

fn ordered(op: ComparisonOperator, ordering: Option<std::cmp::Ordering>) -> bool {
    use std::cmp::Ordering;
    match ordering {
        None => false,
        Some(ordering) => match op {
            ComparisonOperator::LessThan => ordering == Ordering::Less,
            ComparisonOperator::LessThanOrEqual => ordering != Ordering::Greater,
            ComparisonOperator::GreaterThanOrEqual => ordering != Ordering::Less,
            ComparisonOperator::GreaterThan => ordering == Ordering::Greater,
            // Handled above.
            ComparisonOperator::Equal | ComparisonOperator::NotEqual => {
                ordering == Ordering::Equal
            }
        },
    }
}

fn loose_equal(left: &Value, right: &Value) -> bool {
    if let (Some(left), Some(right)) = (left.as_f64(), right.as_f64()) {
        left == right
    } else {
        left == right
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_connectives_and_precedence() {
        let parsed = parse("a && b || !c").unwrap();
        assert_eq!(
            parsed,
            Expression::or(vec![
                Expression::and(vec![Expression::accessor("a"), Expression::accessor("b")]),
                Expression::not(Expression::accessor("c")),
            ])
        );
    }

    #[test]
    fn test_parse_parentheses_override_precedence() {
        let parsed = parse("a && (b || c)").unwrap();
        assert_eq!(
            parsed,
            Expression::and(vec![
                Expression::accessor("a"),
                Expression::or(vec![Expression::accessor("b"), Expression::accessor("c")]),
            ])
        );
    }

    #[test]
    fn test_parse_comparisons_and_literals() {
        let parsed = parse("user.age >= 21 && name == 'sam'").unwrap();
        assert_eq!(
            parsed,
            Expression::and(vec![
                Expression::compare(
                    ComparisonOperator::GreaterThanOrEqual,
                    Expression::accessor("user.age"),
                    Expression::constant(21),
                ),
                Expression::compare(
                    ComparisonOperator::Equal,
                    Expression::accessor("name"),
                    Expression::constant("sam"),
                ),
            ])
        );
    }

    #[test]
    fn test_parse_calls_and_markers() {
        let parsed = parse("optional(a) && ignore(counter) && exists(user.name)").unwrap();
        assert_eq!(
            parsed,
            Expression::and(vec![
                Expression::optional(Expression::accessor("a")),
                Expression::ignore(Expression::accessor("counter")),
                Expression::call("exists", vec![Expression::accessor("user.name")]),
            ])
        );
    }

    #[test]
    fn test_parse_booleans() {
        assert_eq!(parse("true").unwrap(), Expression::truth(true));
        assert_eq!(parse("false").unwrap(), Expression::truth(false));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse("a &&").is_err());
        assert!(parse("").is_err());
        assert!(parse("a ) b").is_err());
    }

    #[test]
    fn test_evaluate_boolean_connectives() {
        let state = json!({"a": true, "b": false});
        let evaluate = |source: &str| evaluate_bool(&parse(source).unwrap(), &state);
        assert_eq!(evaluate("a && b"), Ok(false));
        assert_eq!(evaluate("a || b"), Ok(true));
        assert_eq!(evaluate("!b"), Ok(true));
        assert_eq!(evaluate("true"), Ok(true));
    }

    #[test]
    fn test_evaluate_comparisons() {
        let state = json!({"n": 4, "name": "sam"});
        let evaluate = |source: &str| evaluate_bool(&parse(source).unwrap(), &state);
        assert_eq!(evaluate("n < 5"), Ok(true));
        assert_eq!(evaluate("n >= 5"), Ok(false));
        assert_eq!(evaluate("name == 'sam'"), Ok(true));
        assert_eq!(evaluate("name != 'sam'"), Ok(false));
    }

    #[test]
    fn test_evaluate_exists_and_paths() {
        let state = json!({"user": {"name": "sam"}});
        let evaluate = |source: &str| evaluate_bool(&parse(source).unwrap(), &state);
        assert_eq!(evaluate("exists(user.name)"), Ok(true));
        assert_eq!(evaluate("exists(user.age)"), Ok(false));
    }

    #[test]
    fn test_evaluate_missing_value_errors() {
        let state = json!({});
        let result = evaluate_bool(&parse("a").unwrap(), &state);
        assert_eq!(
            result,
            Err(EvaluationError::MissingValue { path: "a".into() })
        );
    }

    #[test]
    fn test_evaluate_type_mismatch_errors() {
        let state = json!({"a": 3});
        let result = evaluate_bool(&parse("a").unwrap(), &state);
        assert!(matches!(result, Err(EvaluationError::TypeMismatch { .. })));
    }

    #[test]
    fn test_evaluate_unknown_call_errors() {
        let state = json!({});
        let result = evaluate_bool(&parse("frobnicate(a)").unwrap(), &state);
        assert_eq!(
            result,
            Err(EvaluationError::Unsupported {
                kind: "frobnicate".into()
            })
        );
    }
}
