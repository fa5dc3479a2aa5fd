// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Symbol table (spec §3 "Scope", "Symbol"): an owned map, an optional parent
//! scope, and an optional resolver callback for symbols supplied by the host
//! (e.g. template parameters passed in at `expand` time).

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::ast::Expr;
use crate::error::{Error, ErrorKind};
use crate::value::Value;

/// A bound name: either a plain value or a user-defined function.
#[derive(Clone)]
pub enum Symbol {
    /// A value binding, the target of `SymbolRef`/`SymbolAssign`.
    Value(Value),
    /// A function binding, the target of `UserFnCall`.
    Function {
        /// Formal parameter names, bound positionally at call time.
        params: Rc<[Rc<str>]>,
        /// The function body, evaluated in a fresh child scope.
        body: Rc<Expr>,
    },
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Value(v) => write!(f, "Symbol::Value({v:?})"),
            Symbol::Function { params, .. } => write!(f, "Symbol::Function({} params)", params.len()),
        }
    }
}

/// A resolver callback: given a name not found anywhere in the scope chain,
/// produces a symbol to install at the originating scope, or `None`.
pub type Resolver = dyn Fn(&str) -> Option<Symbol>;

/// A lexical scope. Scopes are reference-counted and interior-mutable so a
/// child scope can share its parent without the caller threading `&mut`
/// through every evaluation call (spec §4.5 "evaluator holds a scope chain").
pub struct Scope {
    vars: RefCell<HashMap<Rc<str>, Symbol>>,
    parent: Option<Rc<Scope>>,
    resolver: Option<Rc<Resolver>>,
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("vars", &self.vars.borrow().keys().collect::<Vec<_>>())
            .field("has_parent", &self.parent.is_some())
            .field("has_resolver", &self.resolver.is_some())
            .finish()
    }
}

impl Scope {
    /// A root scope with no parent and no resolver.
    pub fn root() -> Rc<Self> {
        Rc::new(Self {
            vars: RefCell::new(HashMap::new()),
            parent: None,
            resolver: None,
        })
    }

    /// A root scope backed by a resolver for host-supplied symbols.
    pub fn root_with_resolver(resolver: Rc<Resolver>) -> Rc<Self> {
        Rc::new(Self {
            vars: RefCell::new(HashMap::new()),
            parent: None,
            resolver: Some(resolver),
        })
    }

    /// A child scope, e.g. entered for a `for` loop body or a function call.
    /// The child has no resolver of its own; lookups that reach the root
    /// still consult the root's resolver, per the "no-cycles" invariant this
    /// chain can never be anything but a straight line to a single root.
    pub fn child(parent: &Rc<Scope>) -> Rc<Self> {
        Rc::new(Self {
            vars: RefCell::new(HashMap::new()),
            parent: Some(Rc::clone(parent)),
            resolver: None,
        })
    }

    /// Looks up `name`: own map, then each ancestor in turn, then (if no
    /// ancestor had it) the root's resolver — installing a resolver hit back
    /// into *this* (the originating) scope so repeat lookups are O(1) and so
    /// an assignment to the same name shadows correctly from here down.
    pub fn get(self: &Rc<Self>, name: &str) -> Result<Symbol, Error> {
        if let Some(sym) = self.vars.borrow().get(name) {
            return Ok(sym.clone());
        }
        let mut cur = self.parent.clone();
        while let Some(scope) = cur {
            if let Some(sym) = scope.vars.borrow().get(name) {
                return Ok(sym.clone());
            }
            cur = scope.parent.clone();
        }
        if let Some(resolver) = self.root_resolver() {
            if let Some(sym) = resolver(name) {
                self.vars.borrow_mut().insert(Rc::from(name), sym.clone());
                return Ok(sym);
            }
        }
        Err(Error::new(
            ErrorKind::MissingSymbol,
            format!("no symbol named \"{name}\" in scope"),
        ))
    }

    /// Looks up `name` as a plain value, erroring with `NotAValue` if it is
    /// bound to a function instead.
    pub fn get_value(self: &Rc<Self>, name: &str) -> Result<Value, Error> {
        match self.get(name)? {
            Symbol::Value(v) => Ok(v),
            Symbol::Function { .. } => Err(Error::new(
                ErrorKind::NotAValue,
                format!("\"{name}\" is a function, not a value"),
            )),
        }
    }

    /// Looks up `name` as a function, erroring with `NotAFunction` otherwise.
    pub fn get_function(self: &Rc<Self>, name: &str) -> Result<(Rc<[Rc<str>]>, Rc<Expr>), Error> {
        match self.get(name)? {
            Symbol::Function { params, body } => Ok((params, body)),
            Symbol::Value(_) => Err(Error::new(
                ErrorKind::NotAFunction,
                format!("\"{name}\" is a value, not a function"),
            )),
        }
    }

    /// Assigns `name`: if already bound in this scope or an ancestor, updates
    /// that binding in place; otherwise defines a fresh local binding here.
    pub fn assign(self: &Rc<Self>, name: &str, value: Value) {
        if self.vars.borrow().contains_key(name) {
            self.vars.borrow_mut().insert(Rc::from(name), Symbol::Value(value));
            return;
        }
        let mut cur = self.parent.clone();
        while let Some(scope) = cur {
            if scope.vars.borrow().contains_key(name) {
                scope.vars.borrow_mut().insert(Rc::from(name), Symbol::Value(value));
                return;
            }
            cur = scope.parent.clone();
        }
        self.vars.borrow_mut().insert(Rc::from(name), Symbol::Value(value));
    }

    /// Defines `name` as a function in this scope, unconditionally local.
    pub fn define_function(&self, name: impl Into<Rc<str>>, params: Rc<[Rc<str>]>, body: Rc<Expr>) {
        self.vars
            .borrow_mut()
            .insert(name.into(), Symbol::Function { params, body });
    }

    /// Defines `name` as a value in this scope, unconditionally local (used
    /// to bind loop variables and function parameters).
    pub fn define_value(&self, name: impl Into<Rc<str>>, value: Value) {
        self.vars.borrow_mut().insert(name.into(), Symbol::Value(value));
    }

    fn root_resolver(&self) -> Option<Rc<Resolver>> {
        let mut cur: &Scope = self;
        loop {
            if let Some(resolver) = &cur.resolver {
                return Some(Rc::clone(resolver));
            }
            match &cur.parent {
                Some(parent) => cur = parent,
                None => return None,
            }
        }
    }
}
