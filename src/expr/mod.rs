//! Condition trees as first-class data
//!
//! A predicate is a [`Lambda`]: a bound [`Parameter`] plus an [`Expr`] body
//! that references it. Trees are plain tagged unions, so they can be walked
//! (translation, fingerprinting), rewritten (parameter rebinding for
//! combinators) and compiled into closures for in-memory evaluation.
//!
//! # Example
//!
//! ```rust,ignore
//! use this_spec::expr::{Lambda, captured};
//!
//! let min_total = 100;
//! let lambda = Lambda::new(|order| {
//!     order.field("status").equals("Active")
//!         .and(order.field("total").greater_than(captured("min_total", min_total)))
//! });
//! assert_eq!(
//!     lambda.to_string(),
//!     r#"x => ((x.status == "Active") && (x.total > min_total:100))"#
//! );
//! ```

pub mod compile;
pub mod rewrite;

use crate::core::Value;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_PARAMETER_ID: AtomicU64 = AtomicU64::new(1);

/// The bound variable of a predicate
///
/// Identity is the numeric id, never the display name: two parameters named
/// `x` from different predicates are different variables.
#[derive(Debug, Clone)]
pub struct Parameter {
    id: u64,
    name: Arc<str>,
}

impl Parameter {
    /// Allocate a fresh parameter with a unique identity
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            id: NEXT_PARAMETER_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
        }
    }

    /// Allocate a fresh parameter with the default name `x`
    pub fn fresh() -> Self {
        Self::new("x")
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Access a field of the bound entity by dotted path
    ///
    /// `x.field("customer.name")` builds a member chain
    /// `Member(Member(x, customer), name)`.
    pub fn field(&self, path: &str) -> Expr {
        path.split('.').fold(Expr::Parameter(self.clone()), |target, member| {
            Expr::Member {
                target: Box::new(target),
                member: member.to_string(),
            }
        })
    }
}

impl PartialEq for Parameter {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    AndAlso,
    OrElse,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    ExclusiveOr,
    Power,
}

impl BinaryOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterThanOrEqual => ">=",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessThanOrEqual => "<=",
            BinaryOperator::AndAlso => "&&",
            BinaryOperator::OrElse => "||",
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::ExclusiveOr => "^",
            BinaryOperator::Power => "**",
        }
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOperator::AndAlso | BinaryOperator::OrElse)
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Equal
                | BinaryOperator::NotEqual
                | BinaryOperator::GreaterThan
                | BinaryOperator::GreaterThanOrEqual
                | BinaryOperator::LessThan
                | BinaryOperator::LessThanOrEqual
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Negate,
}

/// Methods callable on an expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// `target.contains(arg)` on strings
    Contains { case_insensitive: bool },
    /// `target.starts_with(arg)`
    StartsWith { case_insensitive: bool },
    /// `target.ends_with(arg)`
    EndsWith { case_insensitive: bool },
    /// `target` is null or the empty string
    IsNullOrEmpty,
    /// `target` (a list) contains `arg`
    In,
    ToLower,
    ToUpper,
    Trim,
}

impl Method {
    pub fn name(&self) -> &'static str {
        match self {
            Method::Contains { .. } => "contains",
            Method::StartsWith { .. } => "starts_with",
            Method::EndsWith { .. } => "ends_with",
            Method::IsNullOrEmpty => "is_null_or_empty",
            Method::In => "contains_item",
            Method::ToLower => "to_lower",
            Method::ToUpper => "to_upper",
            Method::Trim => "trim",
        }
    }
}

/// A node of a condition tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Reference to a bound variable
    Parameter(Parameter),
    /// Member access; on the bound parameter this is a field of the entity
    Member { target: Box<Expr>, member: String },
    /// A literal
    Constant(Value),
    /// A value closed over from the calling scope, already evaluated
    Captured { name: String, value: Value },
    Binary {
        op: BinaryOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary { op: UnaryOperator, operand: Box<Expr> },
    Call {
        method: Method,
        target: Box<Expr>,
        arguments: Vec<Expr>,
    },
}

/// Build a literal node
pub fn lit(value: impl Into<Value>) -> Expr {
    Expr::Constant(value.into())
}

/// Build a captured-value node
pub fn captured(name: impl Into<String>, value: impl Into<Value>) -> Expr {
    Expr::Captured {
        name: name.into(),
        value: value.into(),
    }
}

macro_rules! constant_from {
    ($($type:ty),*) => {
        $(
            impl From<$type> for Expr {
                fn from(value: $type) -> Self {
                    Expr::Constant(Value::from(value))
                }
            }
        )*
    };
}

constant_from!(
    Value,
    String,
    &str,
    i64,
    i32,
    u32,
    f64,
    bool,
    uuid::Uuid,
    chrono::DateTime<chrono::Utc>
);

impl<T: Into<Value>> From<Vec<T>> for Expr {
    fn from(value: Vec<T>) -> Self {
        Expr::Constant(Value::from(value))
    }
}

impl<T: Into<Value>> From<Option<T>> for Expr {
    fn from(value: Option<T>) -> Self {
        Expr::Constant(Value::from(value))
    }
}

impl Expr {
    pub fn binary(op: BinaryOperator, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn call(self, method: Method, arguments: Vec<Expr>) -> Expr {
        Expr::Call {
            method,
            target: Box::new(self),
            arguments,
        }
    }

    pub fn equals(self, other: impl Into<Expr>) -> Expr {
        Expr::binary(BinaryOperator::Equal, self, other.into())
    }

    pub fn not_equals(self, other: impl Into<Expr>) -> Expr {
        Expr::binary(BinaryOperator::NotEqual, self, other.into())
    }

    pub fn greater_than(self, other: impl Into<Expr>) -> Expr {
        Expr::binary(BinaryOperator::GreaterThan, self, other.into())
    }

    pub fn greater_or_equal(self, other: impl Into<Expr>) -> Expr {
        Expr::binary(BinaryOperator::GreaterThanOrEqual, self, other.into())
    }

    pub fn less_than(self, other: impl Into<Expr>) -> Expr {
        Expr::binary(BinaryOperator::LessThan, self, other.into())
    }

    pub fn less_or_equal(self, other: impl Into<Expr>) -> Expr {
        Expr::binary(BinaryOperator::LessThanOrEqual, self, other.into())
    }

    pub fn and(self, other: impl Into<Expr>) -> Expr {
        Expr::binary(BinaryOperator::AndAlso, self, other.into())
    }

    pub fn or(self, other: impl Into<Expr>) -> Expr {
        Expr::binary(BinaryOperator::OrElse, self, other.into())
    }

    pub fn xor(self, other: impl Into<Expr>) -> Expr {
        Expr::binary(BinaryOperator::ExclusiveOr, self, other.into())
    }

    pub fn plus(self, other: impl Into<Expr>) -> Expr {
        Expr::binary(BinaryOperator::Add, self, other.into())
    }

    pub fn minus(self, other: impl Into<Expr>) -> Expr {
        Expr::binary(BinaryOperator::Subtract, self, other.into())
    }

    pub fn times(self, other: impl Into<Expr>) -> Expr {
        Expr::binary(BinaryOperator::Multiply, self, other.into())
    }

    pub fn divided_by(self, other: impl Into<Expr>) -> Expr {
        Expr::binary(BinaryOperator::Divide, self, other.into())
    }

    pub fn modulo(self, other: impl Into<Expr>) -> Expr {
        Expr::binary(BinaryOperator::Modulo, self, other.into())
    }

    pub fn pow(self, other: impl Into<Expr>) -> Expr {
        Expr::binary(BinaryOperator::Power, self, other.into())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Expr {
        Expr::Unary {
            op: UnaryOperator::Not,
            operand: Box::new(self),
        }
    }

    pub fn negate(self) -> Expr {
        Expr::Unary {
            op: UnaryOperator::Negate,
            operand: Box::new(self),
        }
    }

    pub fn is_null(self) -> Expr {
        self.equals(Value::Null)
    }

    pub fn is_not_null(self) -> Expr {
        self.not_equals(Value::Null)
    }

    pub fn contains(self, term: impl Into<Expr>) -> Expr {
        self.call(
            Method::Contains {
                case_insensitive: false,
            },
            vec![term.into()],
        )
    }

    pub fn contains_ignore_case(self, term: impl Into<Expr>) -> Expr {
        self.call(
            Method::Contains {
                case_insensitive: true,
            },
            vec![term.into()],
        )
    }

    pub fn starts_with(self, term: impl Into<Expr>) -> Expr {
        self.call(
            Method::StartsWith {
                case_insensitive: false,
            },
            vec![term.into()],
        )
    }

    pub fn starts_with_ignore_case(self, term: impl Into<Expr>) -> Expr {
        self.call(
            Method::StartsWith {
                case_insensitive: true,
            },
            vec![term.into()],
        )
    }

    pub fn ends_with(self, term: impl Into<Expr>) -> Expr {
        self.call(
            Method::EndsWith {
                case_insensitive: false,
            },
            vec![term.into()],
        )
    }

    pub fn ends_with_ignore_case(self, term: impl Into<Expr>) -> Expr {
        self.call(
            Method::EndsWith {
                case_insensitive: true,
            },
            vec![term.into()],
        )
    }

    pub fn is_null_or_empty(self) -> Expr {
        self.call(Method::IsNullOrEmpty, Vec::new())
    }

    /// Membership test: `self` is one of the items of `collection`
    pub fn is_in(self, collection: impl Into<Expr>) -> Expr {
        collection.into().call(Method::In, vec![self])
    }

    pub fn to_lower(self) -> Expr {
        self.call(Method::ToLower, Vec::new())
    }

    pub fn to_upper(self) -> Expr {
        self.call(Method::ToUpper, Vec::new())
    }

    pub fn trim(self) -> Expr {
        self.call(Method::Trim, Vec::new())
    }

    /// If this node is a member chain rooted at `parameter`, its dotted path
    pub fn member_path(&self, parameter: &Parameter) -> Option<String> {
        match self {
            Expr::Member { target, member } => match target.as_ref() {
                Expr::Parameter(p) if p == parameter => Some(member.clone()),
                inner => inner
                    .member_path(parameter)
                    .map(|prefix| format!("{}.{}", prefix, member)),
            },
            _ => None,
        }
    }

    /// Parameter at the root of a member chain, if the chain has one
    pub fn member_root(&self) -> Option<&Parameter> {
        match self {
            Expr::Member { target, .. } => target.member_root(),
            Expr::Parameter(p) => Some(p),
            _ => None,
        }
    }

    /// The constant or captured value of this node, if it is one
    pub fn literal_value(&self) -> Option<&Value> {
        match self {
            Expr::Constant(value) | Expr::Captured { value, .. } => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Parameter(p) => write!(f, "{}", p),
            Expr::Member { target, member } => write!(f, "{}.{}", target, member),
            Expr::Constant(value) => write!(f, "{}", value),
            Expr::Captured { name, value } => write!(f, "{}:{}", name, value),
            Expr::Binary { op, left, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
            Expr::Unary { op, operand } => match op {
                UnaryOperator::Not => write!(f, "!({})", operand),
                UnaryOperator::Negate => write!(f, "-({})", operand),
            },
            Expr::Call {
                method,
                target,
                arguments,
            } => {
                write!(f, "{}.{}(", target, method.name())?;
                for (i, arg) in arguments.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                match method {
                    Method::Contains {
                        case_insensitive: true,
                    }
                    | Method::StartsWith {
                        case_insensitive: true,
                    }
                    | Method::EndsWith {
                        case_insensitive: true,
                    } => write!(f, ", ignore_case)"),
                    _ => write!(f, ")"),
                }
            }
        }
    }
}

/// A predicate or projection: a parameter and a body referencing it
///
/// The body is shared behind an `Arc`; combinators build new bodies and
/// never touch the ones they read.
#[derive(Debug, Clone)]
pub struct Lambda {
    parameter: Parameter,
    body: Arc<Expr>,
}

impl Lambda {
    /// Build a lambda over a fresh parameter
    pub fn new(build: impl FnOnce(&Parameter) -> Expr) -> Self {
        let parameter = Parameter::fresh();
        let body = build(&parameter);
        Self::from_parts(parameter, body)
    }

    /// Assemble a lambda from an existing parameter and body
    pub fn from_parts(parameter: Parameter, body: Expr) -> Self {
        Self {
            parameter,
            body: Arc::new(body),
        }
    }

    pub fn parameter(&self) -> &Parameter {
        &self.parameter
    }

    pub fn body(&self) -> &Expr {
        &self.body
    }

    /// Shared handle to the body, for identity comparisons
    pub fn body_arc(&self) -> &Arc<Expr> {
        &self.body
    }

    /// The body with its parameter replaced by `target`
    pub fn body_rebound_to(&self, target: &Parameter) -> Expr {
        rewrite::ParameterRebinder::new(&self.parameter, target).rebind(&self.body)
    }
}

impl fmt::Display for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} => {}", self.parameter, self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameters_have_distinct_identity() {
        let a = Parameter::fresh();
        let b = Parameter::fresh();
        assert_ne!(a, b);
        assert_eq!(a.name(), b.name());
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_field_builds_member_chain() {
        let x = Parameter::fresh();
        let expr = x.field("customer.name");
        assert_eq!(expr.member_path(&x), Some("customer.name".to_string()));
        assert_eq!(expr.member_path(&Parameter::fresh()), None);
    }

    #[test]
    fn test_display_is_canonical() {
        let lambda = Lambda::new(|x| {
            x.field("status")
                .equals("Active")
                .and(x.field("total").greater_than(captured("min_total", 100)))
        });
        assert_eq!(
            lambda.to_string(),
            r#"x => ((x.status == "Active") && (x.total > min_total:100))"#
        );
    }

    #[test]
    fn test_display_of_calls() {
        let lambda = Lambda::new(|x| x.field("name").contains_ignore_case("ac").not());
        assert_eq!(lambda.to_string(), r#"x => !(x.name.contains("ac", ignore_case))"#);

        let lambda = Lambda::new(|x| x.field("status").is_in(vec!["A", "B"]));
        assert_eq!(
            lambda.to_string(),
            r#"x => ["A", "B"].contains_item(x.status)"#
        );
    }

    #[test]
    fn test_same_shape_same_display() {
        let a = Lambda::new(|x| x.field("age").greater_or_equal(18));
        let b = Lambda::new(|x| x.field("age").greater_or_equal(18));
        assert_ne!(a.parameter(), b.parameter());
        assert_eq!(a.to_string(), b.to_string());
    }
}
