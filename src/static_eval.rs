//! Static Condition Evaluator
//!
//! Decides the truthiness of literal-only conditions so that the rewriter can
//! skip branches that can never run. Only literals, `!`, `==`/`!=`/`===`/`!==`
//! between literals of the same kind, and `&&`/`||` are understood. Everything
//! else is indeterminate (`None`), and a branch is only pruned when its
//! condition is determinately known.

use oxc_ast::ast::Expression;
use oxc_syntax::operator::{BinaryOperator, LogicalOperator, UnaryOperator};

/// Literal value as far as equality is concerned.
#[derive(Debug, PartialEq)]
enum LiteralValue<'e> {
    Boolean(bool),
    Null,
    Number(f64),
    String(&'e str),
    /// Regular expression literals are objects: truthy and never equal to one another.
    RegExp,
}

/// `Some(true)` / `Some(false)` when the condition is known, `None` otherwise.
pub fn is_truthy(expr: &Expression) -> Option<bool> {
    match expr {
        Expression::ParenthesizedExpression(paren) => is_truthy(&paren.expression),
        Expression::UnaryExpression(unary) if unary.operator == UnaryOperator::LogicalNot => {
            is_falsy(&unary.argument)
        }
        Expression::LogicalExpression(logical) => match logical.operator {
            LogicalOperator::And => and(is_truthy(&logical.left), is_truthy(&logical.right)),
            LogicalOperator::Or => or(is_truthy(&logical.left), is_truthy(&logical.right)),
            LogicalOperator::Coalesce => None,
        },
        Expression::BinaryExpression(binary) => match binary.operator {
            BinaryOperator::Equality | BinaryOperator::StrictEquality => {
                equals(&binary.left, &binary.right)
            }
            BinaryOperator::Inequality | BinaryOperator::StrictInequality => {
                equals(&binary.left, &binary.right).map(|eq| !eq)
            }
            _ => None,
        },
        _ => literal_value(expr).map(|value| match value {
            LiteralValue::Boolean(b) => b,
            LiteralValue::Null => false,
            LiteralValue::Number(n) => n != 0.0 && !n.is_nan(),
            LiteralValue::String(s) => !s.is_empty(),
            LiteralValue::RegExp => true,
        }),
    }
}

pub fn is_falsy(expr: &Expression) -> Option<bool> {
    is_truthy(expr).map(|truthy| !truthy)
}

fn and(left: Option<bool>, right: Option<bool>) -> Option<bool> {
    match (left, right) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    }
}

fn or(left: Option<bool>, right: Option<bool>) -> Option<bool> {
    match (left, right) {
        (Some(true), _) | (_, Some(true)) => Some(true),
        (Some(false), Some(false)) => Some(false),
        _ => None,
    }
}

/// Loose and strict equality coincide once both sides are literals of the same kind.
fn equals(left: &Expression, right: &Expression) -> Option<bool> {
    let left = literal_value(unwrap_parens(left))?;
    let right = literal_value(unwrap_parens(right))?;
    match (left, right) {
        (LiteralValue::Boolean(a), LiteralValue::Boolean(b)) => Some(a == b),
        (LiteralValue::Null, LiteralValue::Null) => Some(true),
        (LiteralValue::Number(a), LiteralValue::Number(b)) => Some(a == b),
        (LiteralValue::String(a), LiteralValue::String(b)) => Some(a == b),
        (LiteralValue::RegExp, LiteralValue::RegExp) => Some(false),
        _ => None,
    }
}

fn literal_value<'e>(expr: &'e Expression) -> Option<LiteralValue<'e>> {
    match expr {
        Expression::BooleanLiteral(lit) => Some(LiteralValue::Boolean(lit.value)),
        Expression::NullLiteral(_) => Some(LiteralValue::Null),
        Expression::NumericLiteral(lit) => Some(LiteralValue::Number(lit.value)),
        Expression::StringLiteral(lit) => Some(LiteralValue::String(lit.value.as_str())),
        Expression::RegExpLiteral(_) => Some(LiteralValue::RegExp),
        _ => None,
    }
}

fn unwrap_parens<'e, 'a>(mut expr: &'e Expression<'a>) -> &'e Expression<'a> {
    while let Expression::ParenthesizedExpression(paren) = expr {
        expr = &paren.expression;
    }
    expr
}
