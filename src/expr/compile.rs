//! Compilation of condition trees into closures
//!
//! Compiling resolves member chains to field paths and folds the tree into
//! nested boxed closures once, so evaluating the result against many
//! entities does not re-walk the AST.

use super::{BinaryOperator, Expr, Lambda, Method, Parameter, UnaryOperator};
use crate::core::{Queryable, SpecError, SpecResult, Value};
use std::cmp::Ordering;
use std::fmt;

type Eval<T> = Box<dyn Fn(&T) -> Value + Send + Sync>;

/// A lambda compiled against an entity type
pub struct CompiledExpr<T> {
    eval: Eval<T>,
}

impl<T: Queryable> CompiledExpr<T> {
    /// Compile a lambda whose parameter stands for a `T`
    pub fn compile(lambda: &Lambda) -> SpecResult<Self> {
        Ok(Self {
            eval: compile_node::<T>(lambda.body(), lambda.parameter())?,
        })
    }

    /// Evaluate to a value
    pub fn evaluate(&self, entity: &T) -> Value {
        (self.eval)(entity)
    }

    /// Evaluate in a predicate position
    pub fn matches(&self, entity: &T) -> bool {
        self.evaluate(entity).is_truthy()
    }
}

impl<T> fmt::Debug for CompiledExpr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledExpr").finish_non_exhaustive()
    }
}

fn compile_node<T: Queryable>(expr: &Expr, parameter: &Parameter) -> SpecResult<Eval<T>> {
    match expr {
        Expr::Constant(value) | Expr::Captured { value, .. } => {
            let value = value.clone();
            Ok(Box::new(move |_: &T| value.clone()))
        }
        Expr::Parameter(p) if p == parameter => Err(SpecError::unsupported(
            "use of the bound entity as a value (access one of its fields instead)",
        )),
        Expr::Parameter(_) => Err(unbound_parameter(expr)),
        Expr::Member { .. } => {
            let path = resolve_path(expr, parameter)?;
            Ok(Box::new(move |entity: &T| {
                entity.field_value(&path).unwrap_or(Value::Null)
            }))
        }
        Expr::Binary { op, left, right } => {
            let left = compile_node::<T>(left, parameter)?;
            let right = compile_node::<T>(right, parameter)?;
            Ok(compile_binary(*op, left, right))
        }
        Expr::Unary { op, operand } => {
            let operand = compile_node::<T>(operand, parameter)?;
            let eval: Eval<T> = match op {
                UnaryOperator::Not => Box::new(move |e: &T| match operand(e) {
                    Value::Boolean(b) => Value::Boolean(!b),
                    _ => Value::Null,
                }),
                UnaryOperator::Negate => Box::new(move |e: &T| match operand(e) {
                    Value::Integer(i) => Value::Integer(-i),
                    Value::Float(f) => Value::Float(-f),
                    _ => Value::Null,
                }),
            };
            Ok(eval)
        }
        Expr::Call {
            method,
            target,
            arguments,
        } => {
            let target = compile_node::<T>(target, parameter)?;
            let arguments = arguments
                .iter()
                .map(|arg| compile_node::<T>(arg, parameter))
                .collect::<SpecResult<Vec<_>>>()?;
            compile_call(*method, target, arguments)
        }
    }
}

fn resolve_path(expr: &Expr, parameter: &Parameter) -> SpecResult<String> {
    match expr.member_path(parameter) {
        Some(path) => Ok(path),
        None => match expr {
            Expr::Member { .. } if expr.member_root().is_some_and(|p| p != parameter) => {
                Err(unbound_parameter(expr))
            }
            Expr::Member { member, .. } => Err(SpecError::unsupported(format!(
                "member access '{}' on a value other than the bound entity",
                member
            ))),
            _ => Err(SpecError::unsupported("member access")),
        },
    }
}

/// Error for a member chain or bare parameter not bound by the lambda
pub(crate) fn unbound_parameter(expr: &Expr) -> SpecError {
    let name = expr.member_root().map(Parameter::name).unwrap_or("parameter");
    SpecError::invalid(name, "parameter is not bound by this predicate")
}

fn compile_binary<T: Queryable>(op: BinaryOperator, left: Eval<T>, right: Eval<T>) -> Eval<T> {
    let ordered = |test: fn(Ordering) -> bool, left: Eval<T>, right: Eval<T>| -> Eval<T> {
        Box::new(move |e: &T| Value::Boolean(left(e).compare(&right(e)).is_some_and(test)))
    };

    match op {
        BinaryOperator::Equal => Box::new(move |e: &T| Value::Boolean(left(e).loose_eq(&right(e)))),
        BinaryOperator::NotEqual => {
            Box::new(move |e: &T| Value::Boolean(!left(e).loose_eq(&right(e))))
        }
        BinaryOperator::GreaterThan => ordered(Ordering::is_gt, left, right),
        BinaryOperator::GreaterThanOrEqual => ordered(Ordering::is_ge, left, right),
        BinaryOperator::LessThan => ordered(Ordering::is_lt, left, right),
        BinaryOperator::LessThanOrEqual => ordered(Ordering::is_le, left, right),
        // Short-circuit like the host language would
        BinaryOperator::AndAlso => {
            Box::new(move |e: &T| Value::Boolean(left(e).is_truthy() && right(e).is_truthy()))
        }
        BinaryOperator::OrElse => {
            Box::new(move |e: &T| Value::Boolean(left(e).is_truthy() || right(e).is_truthy()))
        }
        BinaryOperator::ExclusiveOr => Box::new(move |e: &T| match (left(e), right(e)) {
            (Value::Boolean(a), Value::Boolean(b)) => Value::Boolean(a ^ b),
            (Value::Integer(a), Value::Integer(b)) => Value::Integer(a ^ b),
            _ => Value::Null,
        }),
        arithmetic => Box::new(move |e: &T| arithmetic_op(arithmetic, &left(e), &right(e))),
    }
}

fn arithmetic_op(op: BinaryOperator, left: &Value, right: &Value) -> Value {
    if let (BinaryOperator::Add, Value::String(a), Value::String(b)) = (op, left, right) {
        return Value::String(format!("{}{}", a, b));
    }

    if let (Value::Integer(a), Value::Integer(b)) = (left, right) {
        let (a, b) = (*a, *b);
        let result = match op {
            BinaryOperator::Add => a.checked_add(b),
            BinaryOperator::Subtract => a.checked_sub(b),
            BinaryOperator::Multiply => a.checked_mul(b),
            BinaryOperator::Divide => a.checked_div(b),
            BinaryOperator::Modulo => a.checked_rem(b),
            BinaryOperator::Power => u32::try_from(b).ok().and_then(|b| a.checked_pow(b)),
            _ => None,
        };
        return result.map(Value::Integer).unwrap_or(Value::Null);
    }

    let (Some(a), Some(b)) = (left.as_float(), right.as_float()) else {
        return Value::Null;
    };
    let result = match op {
        BinaryOperator::Add => a + b,
        BinaryOperator::Subtract => a - b,
        BinaryOperator::Multiply => a * b,
        BinaryOperator::Divide if b != 0.0 => a / b,
        BinaryOperator::Modulo if b != 0.0 => a % b,
        BinaryOperator::Power => a.powf(b),
        _ => return Value::Null,
    };
    Value::Float(result)
}

fn compile_call<T: Queryable>(
    method: Method,
    target: Eval<T>,
    mut arguments: Vec<Eval<T>>,
) -> SpecResult<Eval<T>> {
    let expected = match method {
        Method::Contains { .. } | Method::StartsWith { .. } | Method::EndsWith { .. } => 1,
        Method::In => 1,
        Method::IsNullOrEmpty | Method::ToLower | Method::ToUpper | Method::Trim => 0,
    };
    if arguments.len() != expected {
        return Err(SpecError::invalid(
            method.name(),
            format!("expected {} argument(s), got {}", expected, arguments.len()),
        ));
    }

    let eval: Eval<T> = match method {
        Method::Contains { case_insensitive } => {
            let term = arguments.remove(0);
            string_test(target, term, case_insensitive, |s, t| s.contains(t))
        }
        Method::StartsWith { case_insensitive } => {
            let term = arguments.remove(0);
            string_test(target, term, case_insensitive, |s, t| s.starts_with(t))
        }
        Method::EndsWith { case_insensitive } => {
            let term = arguments.remove(0);
            string_test(target, term, case_insensitive, |s, t| s.ends_with(t))
        }
        Method::IsNullOrEmpty => Box::new(move |e: &T| {
            Value::Boolean(match target(e) {
                Value::Null => true,
                Value::String(s) => s.is_empty(),
                _ => false,
            })
        }),
        Method::In => {
            let item = arguments.remove(0);
            Box::new(move |e: &T| {
                let item = item(e);
                Value::Boolean(match target(e) {
                    Value::List(items) => items.iter().any(|candidate| candidate.loose_eq(&item)),
                    _ => false,
                })
            })
        }
        Method::ToLower => string_map(target, |s| s.to_lowercase()),
        Method::ToUpper => string_map(target, |s| s.to_uppercase()),
        Method::Trim => string_map(target, |s| s.trim().to_string()),
    };
    Ok(eval)
}

fn string_test<T: Queryable>(
    target: Eval<T>,
    term: Eval<T>,
    case_insensitive: bool,
    test: fn(&str, &str) -> bool,
) -> Eval<T> {
    Box::new(move |e: &T| {
        let (Value::String(s), Value::String(t)) = (target(e), term(e)) else {
            return Value::Boolean(false);
        };
        Value::Boolean(if case_insensitive {
            test(&s.to_lowercase(), &t.to_lowercase())
        } else {
            test(&s, &t)
        })
    })
}

fn string_map<T: Queryable>(target: Eval<T>, map: fn(&str) -> String) -> Eval<T> {
    Box::new(move |e: &T| match target(e) {
        Value::String(s) => Value::String(map(&s)),
        other => other,
    })
}
