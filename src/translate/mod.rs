//! Predicate-to-text translation
//!
//! [`SqlTranslator`] walks a condition tree and emits a parameterized SQL
//! fragment plus its parameter map. Every literal and captured value is
//! bound as a parameter named `p0`, `p1`, … in emission order and is never
//! written into the text itself.
//!
//! # Example
//!
//! ```rust,ignore
//! let predicate = Predicate::<Customer>::new(|c| {
//!     c.field("status").equals("Active").and(c.field("email").is_not_null())
//! });
//! let text = SqlTranslator::default().translate(&predicate)?;
//! assert_eq!(text.sql, "(status = @p0 AND email IS NOT NULL)");
//! assert_eq!(text.parameters["p0"], Value::from("Active"));
//! ```

use crate::core::{Queryable, SpecError, SpecResult, Value};
use crate::expr::compile::unbound_parameter;
use crate::expr::{BinaryOperator, Expr, Method, Parameter, UnaryOperator};
use crate::filter::{SortDirection, SortTarget, ordered_sort_fields, validate_property_path};
use crate::specification::{Criteria, Predicate, Specification};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use tracing::debug;

/// Placeholder and paging syntax of the target database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    /// `@p0`, `LIMIT … OFFSET …`
    #[default]
    Generic,
    /// `@p0`, `OFFSET … ROWS FETCH NEXT … ROWS ONLY`
    SqlServer,
    /// `$1`, `LIMIT … OFFSET …`
    Postgres,
    /// `?`, `LIMIT … OFFSET …`
    MySql,
}

impl SqlDialect {
    fn placeholder(&self, index: usize) -> String {
        match self {
            SqlDialect::Generic | SqlDialect::SqlServer => format!("@p{}", index),
            SqlDialect::Postgres => format!("${}", index + 1),
            SqlDialect::MySql => "?".to_string(),
        }
    }
}

/// Query text with its bound parameters
///
/// Parameter names are `p0`, `p1`, … regardless of the placeholder syntax,
/// and the map preserves binding order for positional drivers.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct QueryText {
    pub sql: String,
    pub parameters: IndexMap<String, Value>,
}

impl QueryText {
    /// Parameter values in binding order
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.parameters.values()
    }
}

/// Lowers condition trees into parameterized SQL
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlTranslator {
    dialect: SqlDialect,
}

impl SqlTranslator {
    pub fn new(dialect: SqlDialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    /// Translate a predicate into a WHERE-clause fragment
    pub fn translate<T: Queryable>(&self, predicate: &Predicate<T>) -> SpecResult<QueryText> {
        let mut writer = Writer::<T>::new(self.dialect, predicate.parameter().clone());
        let sql = writer.predicate(predicate.body())?;
        debug!(
            entity = T::entity_name(),
            parameters = writer.parameters.len(),
            "translated predicate"
        );
        Ok(QueryText {
            sql,
            parameters: writer.parameters,
        })
    }

    /// Translate a whole specification into a SELECT statement
    ///
    /// Includes and nested specifications are not lowered: loading related
    /// data is left to the execution collaborator.
    pub fn translate_specification<T, S>(&self, spec: &S) -> SpecResult<QueryText>
    where
        T: Queryable,
        S: Specification<T> + ?Sized,
    {
        let mut writer = Writer::<T>::new(self.dialect, Parameter::fresh());
        let mut sql = format!("SELECT * FROM {}", T::table_name());

        match spec.criteria() {
            None => {}
            Some(Criteria::Expression(predicate)) => {
                writer.parameter = predicate.parameter().clone();
                let clause = writer.predicate(predicate.body())?;
                sql.push_str(" WHERE ");
                sql.push_str(&clause);
            }
            Some(Criteria::Function(function)) => {
                return Err(SpecError::UnsupportedSpecification {
                    specification: spec.name().to_string(),
                    message: format!(
                        "function criteria '{}' cannot be lowered to text",
                        function.label()
                    ),
                });
            }
        }

        let ordering = writer.ordering(spec)?;
        if !ordering.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&ordering.join(", "));
        }

        if let (true, Some(skip), Some(take)) = (spec.is_paging_enabled(), spec.skip(), spec.take()) {
            match self.dialect {
                SqlDialect::SqlServer => {
                    if ordering.is_empty() {
                        sql.push_str(" ORDER BY (SELECT NULL)");
                    }
                    let offset = writer.bind(row_count(skip));
                    let fetch = writer.bind(row_count(take));
                    sql.push_str(&format!(" OFFSET {} ROWS FETCH NEXT {} ROWS ONLY", offset, fetch));
                }
                _ => {
                    let limit = writer.bind(row_count(take));
                    let offset = writer.bind(row_count(skip));
                    sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset));
                }
            }
        }

        debug!(
            entity = T::entity_name(),
            parameters = writer.parameters.len(),
            "translated specification"
        );
        Ok(QueryText {
            sql,
            parameters: writer.parameters,
        })
    }
}

struct Writer<T> {
    dialect: SqlDialect,
    parameter: Parameter,
    parameters: IndexMap<String, Value>,
    _entity: PhantomData<fn(&T)>,
}

impl<T: Queryable> Writer<T> {
    fn new(dialect: SqlDialect, parameter: Parameter) -> Self {
        Self {
            dialect,
            parameter,
            parameters: IndexMap::new(),
            _entity: PhantomData,
        }
    }

    /// Bind a value and return its placeholder
    fn bind(&mut self, value: Value) -> String {
        let index = self.parameters.len();
        self.parameters.insert(format!("p{}", index), value);
        self.dialect.placeholder(index)
    }

    fn column(&self, expr: &Expr) -> SpecResult<Option<String>> {
        let Some(path) = expr.member_path(&self.parameter) else {
            return Ok(None);
        };
        validate_property_path(&path)?;
        Ok(Some(
            T::column_name(&path)
                .map(str::to_string)
                .unwrap_or(path),
        ))
    }

    /// Emit a node in boolean position
    fn predicate(&mut self, expr: &Expr) -> SpecResult<String> {
        match expr {
            Expr::Binary { op, left, right } => match op {
                BinaryOperator::AndAlso => {
                    let left = self.predicate(left)?;
                    let right = self.predicate(right)?;
                    Ok(format!("({} AND {})", left, right))
                }
                BinaryOperator::OrElse => {
                    let left = self.predicate(left)?;
                    let right = self.predicate(right)?;
                    Ok(format!("({} OR {})", left, right))
                }
                op if op.is_comparison() => self.comparison(*op, left, right),
                op => Err(unsupported_operator(*op)),
            },
            Expr::Unary {
                op: UnaryOperator::Not,
                operand,
            } => Ok(format!("NOT ({})", self.predicate(operand)?)),
            Expr::Constant(Value::Boolean(true)) => Ok("1 = 1".to_string()),
            Expr::Constant(Value::Boolean(false)) => Ok("1 = 0".to_string()),
            Expr::Captured {
                value: value @ Value::Boolean(_),
                ..
            } => {
                let left = self.bind(value.clone());
                let right = self.bind(Value::Boolean(true));
                Ok(format!("{} = {}", left, right))
            }
            Expr::Member { .. } => {
                // A bare boolean field
                let column = self.value(expr)?;
                let flag = self.bind(Value::Boolean(true));
                Ok(format!("{} = {}", column, flag))
            }
            Expr::Call {
                method,
                target,
                arguments,
            } => self.call(*method, target, arguments),
            other => Err(SpecError::unsupported(format!(
                "'{}' in predicate position",
                other
            ))),
        }
    }

    /// Emit a node in value position
    fn value(&mut self, expr: &Expr) -> SpecResult<String> {
        match expr {
            Expr::Member { .. } | Expr::Parameter(_)
                if expr.member_root().is_some_and(|p| *p != self.parameter) =>
            {
                Err(unbound_parameter(expr))
            }
            Expr::Member { member, .. } => match self.column(expr)? {
                Some(column) => Ok(column),
                None => Err(SpecError::unsupported(format!(
                    "member access '{}' on a value other than the bound entity",
                    member
                ))),
            },
            Expr::Constant(Value::List(_)) | Expr::Captured {
                value: Value::List(_),
                ..
            } => Err(SpecError::unsupported("list value outside a membership test")),
            Expr::Constant(value) | Expr::Captured { value, .. } => Ok(self.bind(value.clone())),
            Expr::Binary { op, left, right } => {
                let symbol = match op {
                    BinaryOperator::Add => "+",
                    BinaryOperator::Subtract => "-",
                    BinaryOperator::Multiply => "*",
                    BinaryOperator::Divide => "/",
                    BinaryOperator::Modulo => "%",
                    op => return Err(unsupported_operator(*op)),
                };
                let left = self.value(left)?;
                let right = self.value(right)?;
                Ok(format!("({} {} {})", left, symbol, right))
            }
            Expr::Unary {
                op: UnaryOperator::Negate,
                operand,
            } => Ok(format!("-({})", self.value(operand)?)),
            Expr::Call {
                method,
                target,
                arguments,
            } if arguments.is_empty() => {
                let function = match method {
                    Method::ToLower => "LOWER",
                    Method::ToUpper => "UPPER",
                    Method::Trim => "TRIM",
                    other => return Err(SpecError::unsupported(other.name())),
                };
                Ok(format!("{}({})", function, self.value(target)?))
            }
            other => Err(SpecError::unsupported(format!("'{}' in value position", other))),
        }
    }

    fn comparison(&mut self, op: BinaryOperator, left: &Expr, right: &Expr) -> SpecResult<String> {
        let is_null = |e: &Expr| e.literal_value().is_some_and(Value::is_null);

        let operand = match (is_null(left), is_null(right)) {
            (true, true) => None,
            (false, true) => Some(left),
            (true, false) => Some(right),
            (false, false) => {
                let symbol = match op {
                    BinaryOperator::Equal => "=",
                    BinaryOperator::NotEqual => "<>",
                    other => other.symbol(),
                };
                let left = self.value(left)?;
                let right = self.value(right)?;
                return Ok(format!("{} {} {}", left, symbol, right));
            }
        };

        match (op, operand) {
            (BinaryOperator::Equal, Some(operand)) => Ok(format!("{} IS NULL", self.value(operand)?)),
            (BinaryOperator::NotEqual, Some(operand)) => {
                Ok(format!("{} IS NOT NULL", self.value(operand)?))
            }
            (BinaryOperator::Equal, None) => Ok("1 = 1".to_string()),
            // Ordered comparisons against null never hold
            _ => Ok("1 = 0".to_string()),
        }
    }

    fn call(&mut self, method: Method, target: &Expr, arguments: &[Expr]) -> SpecResult<String> {
        match method {
            Method::Contains { case_insensitive }
            | Method::StartsWith { case_insensitive }
            | Method::EndsWith { case_insensitive } => {
                let [term] = arguments else {
                    return Err(SpecError::invalid(method.name(), "expected one argument"));
                };
                let Some(Value::String(term)) = term.literal_value() else {
                    return Err(SpecError::unsupported(format!(
                        "{} on a non-constant operand",
                        method.name()
                    )));
                };
                let escaped = escape_like(term);
                let pattern = match method {
                    Method::Contains { .. } => format!("%{}%", escaped),
                    Method::StartsWith { .. } => format!("{}%", escaped),
                    _ => format!("%{}", escaped),
                };
                let column = self.value(target)?;
                let placeholder = self.bind(Value::String(pattern));
                Ok(if case_insensitive {
                    format!("LOWER({}) LIKE LOWER({}) ESCAPE '{}'", column, placeholder, LIKE_ESCAPE)
                } else {
                    format!("{} LIKE {} ESCAPE '{}'", column, placeholder, LIKE_ESCAPE)
                })
            }
            Method::IsNullOrEmpty => {
                // Positional placeholders need one binding per occurrence
                let (first, second) = match self.column(target)? {
                    Some(column) => (column.clone(), column),
                    None => (self.value(target)?, self.value(target)?),
                };
                Ok(format!("({} IS NULL OR {} = '')", first, second))
            }
            Method::In => {
                let [item] = arguments else {
                    return Err(SpecError::invalid(method.name(), "expected one argument"));
                };
                let Some(Value::List(values)) = target.literal_value() else {
                    return Err(SpecError::unsupported(
                        "membership test against a non-constant collection",
                    ));
                };
                if values.is_empty() {
                    return Ok("1 = 0".to_string());
                }
                let values = values.clone();
                let column = self.value(item)?;
                let placeholders: Vec<String> =
                    values.into_iter().map(|value| self.bind(value)).collect();
                Ok(format!("{} IN ({})", column, placeholders.join(", ")))
            }
            Method::ToLower | Method::ToUpper | Method::Trim => Err(SpecError::unsupported(
                format!("{} in predicate position", method.name()),
            )),
        }
    }

    fn ordering<S: Specification<T> + ?Sized>(&mut self, spec: &S) -> SpecResult<Vec<String>> {
        let mut clauses = Vec::new();
        let property = |path: &str, descending: bool| -> SpecResult<String> {
            validate_property_path(path)?;
            let column = T::column_name(path).unwrap_or(path);
            Ok(format!("{} {}", column, if descending { "DESC" } else { "ASC" }))
        };

        if let Some(path) = spec.order_by() {
            clauses.push(property(path, false)?);
        }
        if let Some(path) = spec.order_by_descending() {
            clauses.push(property(path, true)?);
        }
        for clause in spec.then_by() {
            clauses.push(property(&clause.path, clause.descending)?);
        }
        for field in ordered_sort_fields(spec.sort_fields()) {
            let descending = field.direction == SortDirection::Descending;
            match &field.target {
                SortTarget::Property(path) => clauses.push(property(path, descending)?),
                SortTarget::Expression(lambda) => {
                    let previous = std::mem::replace(&mut self.parameter, lambda.parameter().clone());
                    let key = self.value(lambda.body());
                    self.parameter = previous;
                    clauses.push(format!("{} {}", key?, if descending { "DESC" } else { "ASC" }));
                }
            }
        }
        Ok(clauses)
    }
}

/// Paging values bind as integers, clamped to the column range
fn row_count(count: usize) -> Value {
    Value::Integer(i64::try_from(count).unwrap_or(i64::MAX))
}

fn unsupported_operator(op: BinaryOperator) -> SpecError {
    SpecError::unsupported(format!("{:?}", op))
}

/// LIKE escape character; a backslash would need doubling under MySQL
const LIKE_ESCAPE: char = '!';

/// Escape LIKE metacharacters so the term matches literally
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, LIKE_ESCAPE | '%' | '_') {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}
