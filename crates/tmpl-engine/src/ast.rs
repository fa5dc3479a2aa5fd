// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Expression AST (spec §3, §4.5): a sum type with an operator tag and exactly
//! the children that operator needs. The AST is immutable after parsing and
//! cheaply cloneable via `Rc` so sub-expressions can be shared (e.g. a user
//! function's body referenced from every call site).

use std::rc::Rc;

/// Arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

/// Logical operators, tracked distinctly from [`CompareOp`] to guarantee
/// short-circuit evaluation (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    /// `&&` / `and`
    And,
    /// `||` / `or`
    Or,
}

/// Expression AST node (spec §3 "Expr node").
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum Expr {
    /// A numeric literal; always evaluated as `f64`.
    Number(f64),
    /// A string literal.
    Str(Rc<str>),
    /// A boolean literal.
    Bool(bool),
    /// A bare identifier resolved against the scope chain.
    SymbolRef(Rc<str>),
    /// `name = value`
    SymbolAssign(Rc<str>, Rc<Expr>),
    /// Unary `!`.
    InvertBoolean(Rc<Expr>),
    /// Unary `-`.
    UnaryMinus(Rc<Expr>),
    /// A binary arithmetic expression.
    Arith(ArithOp, Rc<Expr>, Rc<Expr>),
    /// A binary comparison expression.
    Compare(CompareOp, Rc<Expr>, Rc<Expr>),
    /// A short-circuiting logical expression.
    Logical(LogicalOp, Rc<Expr>, Rc<Expr>),
    /// `if cond { then } [else { otherwise }]` as an expression.
    If {
        /// Predicate.
        cond: Rc<Expr>,
        /// Taken when `cond` is truthy.
        then_branch: Rc<Expr>,
        /// Taken otherwise, if present.
        else_branch: Option<Rc<Expr>>,
    },
    /// `while cond { body }` as an expression; yields the last body value.
    While {
        /// Predicate, re-evaluated each iteration.
        cond: Rc<Expr>,
        /// Loop body.
        body: Rc<Expr>,
    },
    /// `(left; right)`: evaluate `left`, then `right`; yields `right`'s value.
    StmtList(Rc<Expr>, Rc<Expr>),
    /// `obj.name`
    Getattr {
        /// The receiver expression, which must yield an object handle.
        receiver: Rc<Expr>,
        /// Property name.
        name: Rc<str>,
    },
    /// `obj.name = value`
    Setattr {
        /// The receiver expression, which must yield an object handle.
        receiver: Rc<Expr>,
        /// Property name.
        name: Rc<str>,
        /// The value to assign.
        value: Rc<Expr>,
    },
    /// `obj.method(args...)`
    MethodCall {
        /// The receiver expression.
        receiver: Rc<Expr>,
        /// Method name.
        method: Rc<str>,
        /// Already-parsed argument expressions.
        args: Vec<Expr>,
    },
    /// A call to one of the fixed builtin functions (`abs`, `ceil`, ...).
    /// Builtins take exactly one parameter per spec §4.5.
    BuiltinCall {
        /// Builtin name, dispatched by `tmpl-stdlib`.
        name: Rc<str>,
        /// The single argument expression.
        arg: Rc<Expr>,
    },
    /// A call to a user-defined function bound in scope as `Symbol::Function`.
    UserFnCall {
        /// Function name, looked up in scope.
        name: Rc<str>,
        /// Argument expressions, bound positionally.
        args: Vec<Expr>,
    },
    /// `require "name" "version"`
    Require {
        /// Namespace name.
        name: Rc<str>,
        /// Namespace version.
        version: Rc<str>,
    },
}

impl Expr {
    /// Convenience constructor for a stmt-list chain from a non-empty `Vec`.
    pub fn stmt_list_from(mut exprs: Vec<Expr>) -> Expr {
        let last = exprs.pop().expect("at least one expression");
        exprs
            .into_iter()
            .rev()
            .fold(last, |acc, expr| Expr::StmtList(Rc::new(expr), Rc::new(acc)))
    }
}
