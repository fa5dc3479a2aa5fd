// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Parses a source into a node tree and expands it against a scope (spec §3
//! "Template", §4.6 "Template expansion").

use std::io::Write;
use std::rc::Rc;

use crate::error::{Error, ErrorKind};
use crate::eval::{eval, EvalEnv};
use crate::iter_adapter::Iter;
use crate::lexer::Lexer;
use crate::locator::Locator;
use crate::node::{Condition, Node, Root};
use crate::parser::parse_template;
use crate::scope::Scope;

/// A parsed template: `{ locator, root_node?, has_parsed }` (spec §3).
/// Parses at most once; a second [`Template::parse`] call fails with
/// `InvalidState`.
pub struct Template {
    locator: Locator,
    root: Option<Root>,
    has_parsed: bool,
}

impl Template {
    /// A fresh, unparsed template resolving `include`s through `locator`.
    pub fn new(locator: Locator) -> Self {
        Self {
            locator,
            root: None,
            has_parsed: false,
        }
    }

    /// Parses `source` (named `name`, used for include-cycle bookkeeping and
    /// error messages) into the node tree. Callable exactly once.
    pub fn parse(&mut self, name: impl Into<String>, source: impl Into<Vec<u8>>) -> Result<(), Error> {
        if self.has_parsed {
            return Err(Error::new(
                ErrorKind::InvalidState,
                "template has already been parsed",
            ));
        }
        let mut lexer = Lexer::new(name, source, &self.locator);
        let root = parse_template(&mut lexer)?;
        self.root = Some(root);
        self.has_parsed = true;
        Ok(())
    }

    /// Expands the parsed tree under `scope` (or an empty root scope, if
    /// `None`), writing output bytes to `out`. Requires a prior successful
    /// [`Template::parse`]; otherwise fails with `InvalidState`.
    pub fn expand(
        &self,
        scope: Option<Rc<Scope>>,
        env: &mut EvalEnv,
        out: &mut dyn Write,
    ) -> Result<(), Error> {
        let root = self
            .root
            .as_ref()
            .ok_or_else(|| Error::new(ErrorKind::InvalidState, "template has not been parsed"))?;
        let base = scope.unwrap_or_else(Scope::root);
        let transient = Scope::child(&base);
        expand_nodes(&root.children, &transient, env, out)
    }
}

fn expand_nodes(nodes: &[Node], scope: &Rc<Scope>, env: &mut EvalEnv, out: &mut dyn Write) -> Result<(), Error> {
    for node in nodes {
        expand_node(node, scope, env, out)?;
    }
    Ok(())
}

fn expand_node(node: &Node, scope: &Rc<Scope>, env: &mut EvalEnv, out: &mut dyn Write) -> Result<(), Error> {
    match node {
        Node::Text(text) => write_bytes(out, text.as_bytes()),
        Node::Expr(ast) => {
            let value = eval(ast, scope, env)?;
            write_bytes(out, value.to_display_string().as_bytes())
        }
        Node::Branch { if_branch, else_chain } => {
            if let Some(cond) = select_branch(if_branch, else_chain, scope, env)? {
                expand_nodes(&cond.children, scope, env, out)
            } else {
                Ok(())
            }
        }
        Node::Condition(cond) => {
            if eval(&cond.ast, scope, env)?.is_truthy() {
                expand_nodes(&cond.children, scope, env, out)
            } else {
                Ok(())
            }
        }
        Node::Iter { ident, ast, children } => {
            let header = eval(ast, scope, env)?;
            if !header.is_truthy() {
                return Ok(());
            }
            let loop_scope = Scope::child(scope);
            let mut iter = Iter::from_value(&header);
            while iter.next() {
                loop_scope.define_value(Rc::clone(ident), iter.current());
                expand_nodes(children, &loop_scope, env, out)?;
            }
            Ok(())
        }
    }
}

/// Evaluates the `if` predicate; if truthy, returns it, else walks the
/// `else`/`else if` chain in order, returning the first truthy one.
fn select_branch<'a>(
    if_branch: &'a Condition,
    else_chain: &'a [Condition],
    scope: &Rc<Scope>,
    env: &mut EvalEnv,
) -> Result<Option<&'a Condition>, Error> {
    if eval(&if_branch.ast, scope, env)?.is_truthy() {
        return Ok(Some(if_branch));
    }
    for cond in else_chain {
        if eval(&cond.ast, scope, env)?.is_truthy() {
            return Ok(Some(cond));
        }
    }
    Ok(None)
}

fn write_bytes(out: &mut dyn Write, bytes: &[u8]) -> Result<(), Error> {
    out.write_all(bytes)
        .map_err(|e| Error::new(ErrorKind::RuntimeError, format!("output write failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::NoNamespaces;
    use crate::value::Value;

    fn expand_to_string(src: &str, scope: Option<Rc<Scope>>) -> Result<String, Error> {
        let mut tpl = Template::new(Locator::new());
        tpl.parse("test", src)?;
        let mut out = Vec::new();
        let mut sink = Vec::new();
        let mut env = EvalEnv::new(&mut sink, &NoNamespaces);
        tpl.expand(scope, &mut env, &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn s1_interpolates_a_scope_value() {
        let scope = Scope::root();
        scope.define_value("name", Value::String("world".into()));
        let out = expand_to_string("Hello, {{ name }}!", Some(scope)).unwrap();
        assert_eq!(out, "Hello, world!");
    }

    #[test]
    fn s2_if_else_selects_the_right_branch() {
        let scope = Scope::root();
        scope.define_value("n", Value::F64(2.0));
        let out = expand_to_string("{{ if n > 1 }}many{{ else }}one{{ end }}", Some(scope)).unwrap();
        assert_eq!(out, "many");

        let scope = Scope::root();
        scope.define_value("n", Value::F64(1.0));
        let out = expand_to_string("{{ if n > 1 }}many{{ else }}one{{ end }}", Some(scope)).unwrap();
        assert_eq!(out, "one");
    }

    #[test]
    fn s3_for_loop_over_string_with_method_call() {
        let scope = Scope::root();
        scope.define_value("word", Value::String("ab".into()));
        let out = expand_to_string("{{ for c in word }}{{ c.upper() }}{{ end }}", Some(scope)).unwrap();
        assert_eq!(out, "AB");
    }

    #[test]
    fn empty_template_yields_empty_output() {
        let out = expand_to_string("", None).unwrap();
        assert_eq!(out, "");
    }

    #[test]
    fn template_with_no_tags_round_trips_verbatim() {
        let out = expand_to_string("just plain text, no tags here", None).unwrap();
        assert_eq!(out, "just plain text, no tags here");
    }

    #[test]
    fn falsy_for_header_skips_the_body() {
        let scope = Scope::root();
        scope.define_value("xs", Value::Bool(false));
        let out = expand_to_string("{{ for x in xs }}body{{ end }}", Some(scope)).unwrap();
        assert_eq!(out, "");
    }

    #[test]
    fn empty_sequence_header_runs_body_zero_times_but_restores_outer_scope() {
        let scope = Scope::root();
        scope.define_value("word", Value::String(String::new()));
        let out = expand_to_string("before{{ for c in word }}body{{ end }}after", Some(scope)).unwrap();
        assert_eq!(out, "beforeafter");
    }

    #[test]
    fn second_parse_call_fails_with_invalid_state() {
        let mut tpl = Template::new(Locator::new());
        tpl.parse("test", "a").unwrap();
        let err = tpl.parse("test", "b").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidState);
    }

    #[test]
    fn expand_before_parse_fails_with_invalid_state() {
        let tpl = Template::new(Locator::new());
        let mut out = Vec::new();
        let mut sink = Vec::new();
        let mut env = EvalEnv::new(&mut sink, &NoNamespaces);
        let err = tpl.expand(None, &mut env, &mut out).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidState);
    }

    #[test]
    fn s4_circular_include_is_an_error_during_parse() {
        let mut locator = Locator::new();
        locator.add_path_root("");
        locator.insert_file("a", "{{ include \"a\" }}");
        let mut tpl = Template::new(locator);
        let err = tpl.parse("a", "{{ include \"a\" }}").unwrap_err();
        assert_eq!(err.kind, ErrorKind::CircularInclude);
    }
}
