//! Tree rewriting
//!
//! [`ExprRewriter`] is a copy-on-walk visitor: the default traversal
//! rebuilds every node, and an implementation overrides [`ExprRewriter::replace`]
//! to substitute the nodes it cares about. Inputs are never mutated.

use super::{Expr, Parameter};

/// A pure tree-copy transform over [`Expr`]
pub trait ExprRewriter {
    /// Return `Some` to substitute `expr` (children are not visited)
    fn replace(&mut self, expr: &Expr) -> Option<Expr>;

    /// Rewrite a whole tree
    fn rewrite(&mut self, expr: &Expr) -> Expr {
        if let Some(replacement) = self.replace(expr) {
            return replacement;
        }

        match expr {
            Expr::Parameter(_) | Expr::Constant(_) | Expr::Captured { .. } => expr.clone(),
            Expr::Member { target, member } => Expr::Member {
                target: Box::new(self.rewrite(target)),
                member: member.clone(),
            },
            Expr::Binary { op, left, right } => Expr::Binary {
                op: *op,
                left: Box::new(self.rewrite(left)),
                right: Box::new(self.rewrite(right)),
            },
            Expr::Unary { op, operand } => Expr::Unary {
                op: *op,
                operand: Box::new(self.rewrite(operand)),
            },
            Expr::Call {
                method,
                target,
                arguments,
            } => Expr::Call {
                method: *method,
                target: Box::new(self.rewrite(target)),
                arguments: arguments.iter().map(|arg| self.rewrite(arg)).collect(),
            },
        }
    }
}

/// Substitutes every reference to one parameter with another
///
/// Matching is by parameter identity, so a different parameter that happens
/// to share the display name is left alone.
pub struct ParameterRebinder<'a> {
    from: &'a Parameter,
    to: &'a Parameter,
}

impl<'a> ParameterRebinder<'a> {
    pub fn new(from: &'a Parameter, to: &'a Parameter) -> Self {
        Self { from, to }
    }

    pub fn rebind(mut self, expr: &Expr) -> Expr {
        self.rewrite(expr)
    }
}

impl ExprRewriter for ParameterRebinder<'_> {
    fn replace(&mut self, expr: &Expr) -> Option<Expr> {
        match expr {
            Expr::Parameter(p) if p == self.from => Some(Expr::Parameter(self.to.clone())),
            _ => None,
        }
    }
}

/// Collect the distinct parameters referenced by a tree
pub fn referenced_parameters(expr: &Expr) -> Vec<Parameter> {
    struct Collector(Vec<Parameter>);

    impl ExprRewriter for Collector {
        fn replace(&mut self, expr: &Expr) -> Option<Expr> {
            if let Expr::Parameter(p) = expr
                && !self.0.contains(p)
            {
                self.0.push(p.clone());
            }
            None
        }
    }

    let mut collector = Collector(Vec::new());
    collector.rewrite(expr);
    collector.0
}
