// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Tree-walking expression evaluator with a fast-path dispatch table (spec
//! §4.5 "Evaluator").

use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;
use std::sync::OnceLock;

use crate::ast::{ArithOp, CompareOp, Expr, LogicalOp};
use crate::error::{Error, ErrorKind};
use crate::scope::Scope;
use crate::value::{Value, ValueTag};

/// Loads an external namespace for `require "name" "version"` (spec §4.5).
/// The default implementation always fails; hosts that support namespace
/// loading supply their own.
pub trait NamespaceLoader {
    /// Attempts to load `name`@`version`, returning the namespace handle value.
    fn load(&self, name: &str, version: &str) -> Result<Value, Error>;
}

/// A `NamespaceLoader` that always fails, for hosts with no namespace support.
#[derive(Debug, Default)]
pub struct NoNamespaces;

impl NamespaceLoader for NoNamespaces {
    fn load(&self, name: &str, version: &str) -> Result<Value, Error> {
        Err(Error::new(
            ErrorKind::ExternalNamespaceFailure,
            format!("no namespace loader configured for \"{name}\" \"{version}\""),
        ))
    }
}

/// Per-evaluation host capabilities: where `print` writes, and how `require`
/// resolves namespaces.
pub struct EvalEnv<'a> {
    /// Sink for the `print` builtin's `repr(value)\n` side effect.
    pub sink: &'a mut dyn Write,
    /// Resolves `require "name" "version"`.
    pub namespaces: &'a dyn NamespaceLoader,
}

impl<'a> EvalEnv<'a> {
    /// Builds an environment from a sink and namespace loader.
    pub fn new(sink: &'a mut dyn Write, namespaces: &'a dyn NamespaceLoader) -> Self {
        Self { sink, namespaces }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum OpTag {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

type DispatchFn = fn(&Value, &Value) -> Result<Value, Error>;
type DispatchKey = (OpTag, ValueTag, ValueTag);

static DISPATCH_TABLE: OnceLock<HashMap<DispatchKey, DispatchFn>> = OnceLock::new();

fn dispatch_table() -> &'static HashMap<DispatchKey, DispatchFn> {
    DISPATCH_TABLE.get_or_init(build_dispatch_table)
}

fn build_dispatch_table() -> HashMap<DispatchKey, DispatchFn> {
    let mut t: HashMap<DispatchKey, DispatchFn> = HashMap::new();

    t.insert((OpTag::Add, ValueTag::F64, ValueTag::F64), |a, b| {
        Ok(Value::F64(as_f64(a) + as_f64(b)))
    });
    t.insert((OpTag::Sub, ValueTag::F64, ValueTag::F64), |a, b| {
        Ok(Value::F64(as_f64(a) - as_f64(b)))
    });
    t.insert((OpTag::Mul, ValueTag::F64, ValueTag::F64), |a, b| {
        Ok(Value::F64(as_f64(a) * as_f64(b)))
    });
    t.insert((OpTag::Div, ValueTag::F64, ValueTag::F64), |a, b| {
        let divisor = as_f64(b);
        if divisor == 0.0 {
            return Err(Error::new(ErrorKind::DivideByZero, "division by zero"));
        }
        Ok(Value::F64(as_f64(a) / divisor))
    });

    for (tag, cmp) in [
        (OpTag::Eq, CompareOp::Eq),
        (OpTag::Ne, CompareOp::Ne),
        (OpTag::Lt, CompareOp::Lt),
        (OpTag::Le, CompareOp::Le),
        (OpTag::Gt, CompareOp::Gt),
        (OpTag::Ge, CompareOp::Ge),
    ] {
        t.insert((tag, ValueTag::F64, ValueTag::F64), compare_fn(cmp));
        t.insert((tag, ValueTag::U32, ValueTag::F64), compare_fn(cmp));
        t.insert((tag, ValueTag::F64, ValueTag::U32), compare_fn(cmp));
    }

    t.insert((OpTag::Add, ValueTag::String, ValueTag::String), |a, b| {
        Ok(Value::String(format!("{}{}", as_str(a), as_str(b))))
    });
    t.insert((OpTag::Mul, ValueTag::String, ValueTag::F64), |a, b| {
        Ok(Value::String(as_str(a).repeat(repeat_count(as_f64(b)))))
    });
    t.insert((OpTag::Mul, ValueTag::F64, ValueTag::String), |a, b| {
        Ok(Value::String(as_str(b).repeat(repeat_count(as_f64(a)))))
    });
    t.insert((OpTag::Eq, ValueTag::String, ValueTag::String), |a, b| {
        Ok(Value::Bool(as_str(a) == as_str(b)))
    });
    t.insert((OpTag::Ne, ValueTag::String, ValueTag::String), |a, b| {
        Ok(Value::Bool(as_str(a) != as_str(b)))
    });

    t
}

fn compare_fn(cmp: CompareOp) -> DispatchFn {
    match cmp {
        CompareOp::Eq => |a, b| Ok(Value::Bool(as_f64(a) == as_f64(b))),
        CompareOp::Ne => |a, b| Ok(Value::Bool(as_f64(a) != as_f64(b))),
        CompareOp::Lt => |a, b| Ok(Value::Bool(as_f64(a) < as_f64(b))),
        CompareOp::Le => |a, b| Ok(Value::Bool(as_f64(a) <= as_f64(b))),
        CompareOp::Gt => |a, b| Ok(Value::Bool(as_f64(a) > as_f64(b))),
        CompareOp::Ge => |a, b| Ok(Value::Bool(as_f64(a) >= as_f64(b))),
    }
}

fn as_f64(v: &Value) -> f64 {
    v.coerce_f64().unwrap_or(f64::NAN)
}

fn as_str(v: &Value) -> &str {
    match v {
        Value::String(s) => s.as_str(),
        _ => "",
    }
}

fn repeat_count(n: f64) -> usize {
    if n <= 0.0 {
        0
    } else {
        n.trunc() as usize
    }
}

fn op_str(tag: OpTag) -> &'static str {
    match tag {
        OpTag::Add => "+",
        OpTag::Sub => "-",
        OpTag::Mul => "*",
        OpTag::Div => "/",
        OpTag::Eq => "==",
        OpTag::Ne => "!=",
        OpTag::Lt => "<",
        OpTag::Le => "<=",
        OpTag::Gt => ">",
        OpTag::Ge => ">=",
    }
}

/// Evaluates `expr` in `scope`, using `env` for builtin/require side effects.
pub fn eval(expr: &Expr, scope: &Rc<Scope>, env: &mut EvalEnv) -> Result<Value, Error> {
    match expr {
        Expr::Number(n) => Ok(Value::F64(*n)),
        Expr::Str(s) => Ok(Value::String(s.to_string())),
        Expr::Bool(b) => Ok(Value::Bool(*b)),

        Expr::SymbolRef(name) => scope.get_value(name),

        Expr::SymbolAssign(name, value_expr) => {
            let value = eval(value_expr, scope, env)?;
            scope.assign(name, value.clone());
            Ok(value)
        }

        Expr::InvertBoolean(inner) => {
            let v = eval(inner, scope, env)?;
            Ok(Value::Bool(!v.is_truthy()))
        }

        Expr::UnaryMinus(inner) => {
            let v = eval(inner, scope, env)?;
            Ok(Value::F64(-v.coerce_f64()?))
        }

        Expr::Arith(op, left, right) => eval_binary(arith_tag(*op), left, right, scope, env),
        Expr::Compare(op, left, right) => eval_binary(compare_tag(*op), left, right, scope, env),

        Expr::Logical(op, left, right) => {
            let left_v = eval(left, scope, env)?;
            let left_truthy = left_v.is_truthy();
            match op {
                LogicalOp::And if !left_truthy => Ok(Value::Bool(false)),
                LogicalOp::Or if left_truthy => Ok(Value::Bool(true)),
                _ => {
                    let right_v = eval(right, scope, env)?;
                    Ok(Value::Bool(right_v.is_truthy()))
                }
            }
        }

        Expr::If {
            cond,
            then_branch,
            else_branch,
        } => {
            let cond_v = eval(cond, scope, env)?;
            if cond_v.is_truthy() {
                eval(then_branch, scope, env)
            } else if let Some(else_branch) = else_branch {
                eval(else_branch, scope, env)
            } else {
                Ok(Value::null())
            }
        }

        Expr::While { cond, body } => {
            let mut result = Value::null();
            while eval(cond, scope, env)?.is_truthy() {
                result = eval(body, scope, env)?;
            }
            Ok(result)
        }

        Expr::StmtList(left, right) => {
            eval(left, scope, env)?;
            eval(right, scope, env)
        }

        Expr::Getattr { receiver, name } => {
            let obj = eval(receiver, scope, env)?;
            get_property(&obj, name)
        }

        Expr::Setattr {
            receiver,
            name,
            value,
        } => {
            let obj = eval(receiver, scope, env)?;
            let value = eval(value, scope, env)?;
            set_property(&obj, name, value)
        }

        Expr::MethodCall {
            receiver,
            method,
            args,
        } => {
            let recv = eval(receiver, scope, env)?;
            let mut arg_values = Vec::with_capacity(args.len());
            for arg in args {
                arg_values.push(eval(arg, scope, env)?);
            }
            call_method(&recv, method, &arg_values)
        }

        Expr::BuiltinCall { name, arg } => {
            let value = eval(arg, scope, env)?;
            call_builtin(name, value, env.sink)
        }

        Expr::UserFnCall { name, args } => call_user_fn(name, args, scope, env),

        Expr::Require { name, version } => {
            let handle = match env.namespaces.load(name, version) {
                Ok(handle) => handle,
                Err(e) => {
                    tracing::warn!(name = %name, version = %version, error = %e, "namespace load failed");
                    return Err(e);
                }
            };
            scope.assign(name, handle.clone());
            Ok(handle)
        }
    }
}

fn arith_tag(op: ArithOp) -> OpTag {
    match op {
        ArithOp::Add => OpTag::Add,
        ArithOp::Sub => OpTag::Sub,
        ArithOp::Mul => OpTag::Mul,
        ArithOp::Div => OpTag::Div,
    }
}

fn compare_tag(op: CompareOp) -> OpTag {
    match op {
        CompareOp::Eq => OpTag::Eq,
        CompareOp::Ne => OpTag::Ne,
        CompareOp::Lt => OpTag::Lt,
        CompareOp::Le => OpTag::Le,
        CompareOp::Gt => OpTag::Gt,
        CompareOp::Ge => OpTag::Ge,
    }
}

fn eval_binary(
    tag: OpTag,
    left: &Expr,
    right: &Expr,
    scope: &Rc<Scope>,
    env: &mut EvalEnv,
) -> Result<Value, Error> {
    let left_v = eval(left, scope, env)?;
    let right_v = eval(right, scope, env)?;
    apply_op(tag, &left_v, &right_v)
}

fn apply_op(tag: OpTag, left: &Value, right: &Value) -> Result<Value, Error> {
    if let Some(f) = dispatch_table().get(&(tag, left.tag(), right.tag())) {
        return f(left, right);
    }
    if let Some(v) = slow_path(tag, left, right) {
        return Ok(v);
    }
    tracing::trace!(op = op_str(tag), left = left.type_name(), right = right.type_name(), "no dispatch entry");
    Err(Error::type_mismatch(
        op_str(tag),
        left.type_name(),
        Some(right.type_name()),
    ))
}

/// Cross-type combinations too rare to warrant a dispatch-table row: string
/// vs enum (in)equality by nick name (spec §4.5 "slow-path lookup").
fn slow_path(tag: OpTag, left: &Value, right: &Value) -> Option<Value> {
    let nick_eq = match (left, right) {
        (Value::String(s), Value::EnumHandle(_, _, nick)) => Some(s.as_str() == &**nick),
        (Value::EnumHandle(_, _, nick), Value::String(s)) => Some(&**nick == s.as_str()),
        _ => None,
    }?;
    match tag {
        OpTag::Eq => Some(Value::Bool(nick_eq)),
        OpTag::Ne => Some(Value::Bool(!nick_eq)),
        _ => None,
    }
}

fn get_property(obj: &Value, name: &str) -> Result<Value, Error> {
    if obj.is_null() {
        return Err(Error::new(
            ErrorKind::NullPointer,
            format!("cannot read property \"{name}\" of null"),
        ));
    }
    let Value::ObjectHandle(handle) = obj else {
        return Err(Error::new(
            ErrorKind::NotAnObject,
            format!("\"{}\" is not an object", obj.type_name()),
        ));
    };
    handle.get_property(name)?.ok_or_else(|| {
        Error::new(
            ErrorKind::NoSuchProperty,
            format!("no property named \"{name}\" on {}", handle.type_name()),
        )
    })
}

fn set_property(obj: &Value, name: &str, value: Value) -> Result<Value, Error> {
    if obj.is_null() {
        return Err(Error::new(
            ErrorKind::NullPointer,
            format!("cannot set property \"{name}\" of null"),
        ));
    }
    let Value::ObjectHandle(handle) = obj else {
        return Err(Error::new(
            ErrorKind::NotAnObject,
            format!("\"{}\" is not an object", obj.type_name()),
        ));
    };
    if handle.set_property(name, value.clone())? {
        Ok(value)
    } else {
        Err(Error::new(
            ErrorKind::NoSuchProperty,
            format!("no property named \"{name}\" on {}", handle.type_name()),
        ))
    }
}

fn call_method(recv: &Value, method: &str, args: &[Value]) -> Result<Value, Error> {
    match recv {
        Value::String(s) => call_string_method(s, method, args),
        Value::EnumHandle(_, _, nick) => {
            if method == "nick" {
                if !args.is_empty() {
                    return Err(Error::syntax("nick() takes no arguments"));
                }
                Ok(Value::String(nick.to_string()))
            } else {
                Err(Error::new(
                    ErrorKind::NoSuchProperty,
                    format!("enum has no method \"{method}\""),
                ))
            }
        }
        Value::ObjectHandle(handle) => handle.invoke_method(method, args)?.ok_or_else(|| {
            Error::new(
                ErrorKind::NoSuchProperty,
                format!("no method named \"{method}\" on {}", handle.type_name()),
            )
        }),
        other if other.is_null() => Err(Error::new(
            ErrorKind::NullPointer,
            format!("cannot call method \"{method}\" on null"),
        )),
        other => Err(Error::new(
            ErrorKind::NotAnObject,
            format!("\"{}\" has no methods", other.type_name()),
        )),
    }
}

fn call_string_method(s: &str, method: &str, args: &[Value]) -> Result<Value, Error> {
    if !args.is_empty() {
        return Err(Error::syntax(format!("{method}() takes no arguments")));
    }
    match method {
        "upper" => Ok(Value::String(s.to_uppercase())),
        "lower" => Ok(Value::String(s.to_lowercase())),
        "casefold" => Ok(Value::String(s.to_lowercase())),
        "reverse" => Ok(Value::String(s.chars().rev().collect())),
        "len" => Ok(Value::F64(s.chars().count() as f64)),
        "space" => Ok(Value::String(
            s.chars().map(String::from).collect::<Vec<_>>().join(" "),
        )),
        "title" => Ok(Value::String(title_case(s))),
        other => Err(Error::new(
            ErrorKind::NoSuchProperty,
            format!("string has no method \"{other}\""),
        )),
    }
}

fn title_case(s: &str) -> String {
    let lowered = s.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut start_of_run = true;
    for c in lowered.chars() {
        if c.is_alphanumeric() {
            if start_of_run {
                out.extend(c.to_uppercase());
                start_of_run = false;
            } else {
                out.push(c);
            }
        } else {
            out.push(c);
            start_of_run = true;
        }
    }
    out
}

fn call_builtin(name: &str, value: Value, sink: &mut dyn Write) -> Result<Value, Error> {
    match name {
        "abs" => Ok(Value::F64(value.coerce_f64()?.abs())),
        "ceil" => Ok(Value::F64(value.coerce_f64()?.ceil())),
        "floor" => Ok(Value::F64(value.coerce_f64()?.floor())),
        "sqrt" => Ok(Value::F64(value.coerce_f64()?.sqrt())),
        "log" => Ok(Value::F64(value.coerce_f64()?.ln())),
        "hex" => {
            let n = value.coerce_f64()?;
            let truncated = (n.trunc() as i64 as i32) as u32;
            Ok(Value::String(format!("0x{truncated:x}")))
        }
        "repr" => Ok(Value::String(value.repr())),
        "print" => {
            let _ = writeln!(sink, "{}", value.repr());
            Ok(value)
        }
        other => Err(Error::new(
            ErrorKind::InvalidOpCode,
            format!("unknown builtin \"{other}\""),
        )),
    }
}

fn call_user_fn(name: &str, args: &[Expr], scope: &Rc<Scope>, env: &mut EvalEnv) -> Result<Value, Error> {
    let (params, body) = scope.get_function(name)?;
    if args.len() != params.len() {
        return Err(Error::syntax(format!(
            "function \"{name}\" expects {} arguments, got {}",
            params.len(),
            args.len()
        )));
    }
    let mut arg_values = Vec::with_capacity(args.len());
    for arg in args {
        arg_values.push(eval(arg, scope, env)?);
    }
    let call_scope = Scope::child(scope);
    for (param, value) in params.iter().zip(arg_values) {
        call_scope.define_value(Rc::clone(param), value);
    }
    eval(&body, &call_scope, env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr_parser::parse_expression;

    fn eval_str(src: &str, scope: &Rc<Scope>) -> Result<Value, Error> {
        let expr = parse_expression(src).unwrap();
        let mut buf = Vec::new();
        let mut env = EvalEnv::new(&mut buf, &NoNamespaces);
        eval(&expr, scope, &mut env)
    }

    #[test]
    fn arithmetic_and_comparisons() {
        let scope = Scope::root();
        assert_eq!(eval_str("1 + 2 * 3", &scope).unwrap(), Value::F64(7.0));
        assert_eq!(eval_str("2 > 1", &scope).unwrap(), Value::Bool(true));
    }

    #[test]
    fn divide_by_zero_is_an_error() {
        let scope = Scope::root();
        let err = eval_str("1 / 0.0", &scope).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DivideByZero);
    }

    #[test]
    fn string_repetition_both_orders() {
        let scope = Scope::root();
        assert_eq!(
            eval_str("3 * \"ab\"", &scope).unwrap(),
            Value::String("ababab".into())
        );
        assert_eq!(
            eval_str("\"ab\" * 3", &scope).unwrap(),
            Value::String("ababab".into())
        );
    }

    #[test]
    fn logical_short_circuit_and() {
        let scope = Scope::root();
        scope.define_value("flag", Value::Bool(false));
        assert_eq!(
            eval_str("flag && bogus.explode()", &scope).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn logical_short_circuit_or() {
        let scope = Scope::root();
        scope.define_value("flag", Value::Bool(true));
        assert_eq!(
            eval_str("flag || bogus.explode()", &scope).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn stmt_list_evaluates_left_then_right_returns_right() {
        let scope = Scope::root();
        scope.define_value("a", Value::F64(0.0));
        assert_eq!(eval_str("{ a = 1; a = a + 1 }", &scope).unwrap(), Value::F64(2.0));
    }

    #[test]
    fn if_missing_else_subtree_yields_null() {
        let scope = Scope::root();
        let v = eval_str("if (false) { 1 }", &scope).unwrap();
        assert!(v.is_null());
    }

    #[test]
    fn while_accumulates_and_yields_last_body_value() {
        let scope = Scope::root();
        scope.define_value("i", Value::F64(0.0));
        let v = eval_str("while (i < 3) { i = i + 1 }", &scope).unwrap();
        assert_eq!(v, Value::F64(3.0));
    }

    #[test]
    fn string_methods_dispatch() {
        let scope = Scope::root();
        scope.define_value("s", Value::String("Hello World".into()));
        assert_eq!(
            eval_str("s.upper()", &scope).unwrap(),
            Value::String("HELLO WORLD".into())
        );
        assert_eq!(eval_str("s.len()", &scope).unwrap(), Value::F64(11.0));
        assert_eq!(
            eval_str("s.reverse()", &scope).unwrap(),
            Value::String("dlroW olleH".into())
        );
    }

    #[test]
    fn title_case_matches_spec_definition() {
        let scope = Scope::root();
        scope.define_value("s", Value::String("hello-world FOO".into()));
        assert_eq!(
            eval_str("s.title()", &scope).unwrap(),
            Value::String("Hello-World Foo".into())
        );
    }

    #[test]
    fn unknown_string_method_is_no_such_property() {
        let scope = Scope::root();
        scope.define_value("s", Value::String("x".into()));
        let err = eval_str("s.bogus()", &scope).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NoSuchProperty);
    }

    #[test]
    fn builtin_abs_is_implemented_for_f64() {
        let scope = Scope::root();
        assert_eq!(eval_str("abs(-4.5)", &scope).unwrap(), Value::F64(4.5));
    }

    #[test]
    fn builtin_hex_formats_truncated_integer() {
        let scope = Scope::root();
        assert_eq!(
            eval_str("hex(255.9)", &scope).unwrap(),
            Value::String("0xff".into())
        );
    }

    #[test]
    fn user_function_call_binds_params_in_child_scope() {
        let scope = Scope::root();
        scope.define_function(
            "double",
            Rc::from(vec![Rc::from("x")]),
            Rc::new(Expr::Arith(
                ArithOp::Mul,
                Rc::new(Expr::SymbolRef(Rc::from("x"))),
                Rc::new(Expr::Number(2.0)),
            )),
        );
        assert_eq!(eval_str("double(21)", &scope).unwrap(), Value::F64(42.0));
    }

    #[test]
    fn user_function_arity_mismatch_is_syntax_error() {
        let scope = Scope::root();
        scope.define_function("f", Rc::from(vec![Rc::from("a")]), Rc::new(Expr::Number(1.0)));
        let err = eval_str("f(1, 2)", &scope).unwrap_err();
        assert_eq!(err.kind, ErrorKind::SyntaxError);
    }

    #[test]
    fn getattr_on_null_is_null_pointer() {
        let scope = Scope::root();
        scope.define_value("x", Value::null());
        let err = eval_str("x.y", &scope).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NullPointer);
    }

    #[test]
    fn getattr_on_non_object_is_not_an_object() {
        let scope = Scope::root();
        scope.define_value("x", Value::F64(1.0));
        let err = eval_str("x.y", &scope).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotAnObject);
    }

    #[test]
    fn require_without_loader_fails_and_with_loader_binds_namespace() {
        let scope = Scope::root();
        let expr = parse_expression("require \"Gtk\" \"3.0\"").unwrap();
        let mut buf = Vec::new();
        let mut env = EvalEnv::new(&mut buf, &NoNamespaces);
        let err = eval(&expr, &scope, &mut env).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ExternalNamespaceFailure);

        struct StubLoader;
        impl NamespaceLoader for StubLoader {
            fn load(&self, name: &str, _version: &str) -> Result<Value, Error> {
                Ok(Value::TypelibHandle(std::sync::Arc::from(name)))
            }
        }
        let mut buf = Vec::new();
        let mut env = EvalEnv::new(&mut buf, &StubLoader);
        let v = eval(&expr, &scope, &mut env).unwrap();
        assert_eq!(v, Value::TypelibHandle(std::sync::Arc::from("Gtk")));
        assert_eq!(
            scope.get_value("Gtk").unwrap(),
            Value::TypelibHandle(std::sync::Arc::from("Gtk"))
        );
    }
}
