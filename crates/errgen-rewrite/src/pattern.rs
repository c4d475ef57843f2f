//! Syntactic patterns the tracer recognizes.
use errgen_core::{CompileUnit, Expr, NodeId, go_unquote, render_node};

use crate::imports::ImportTable;

/// Names conventionally bound to errors: `err`, `errRead`, `readErr`,
/// `dbErr`, ...
pub fn is_error_like(name: &str) -> bool {
    name.starts_with("err") || name.ends_with("err") || name.ends_with("Err")
}

/// Dotted callee chain of a call's function expression, e.g. `user.UpdateName`
/// or `s.repo.Save`. Calls inside the chain contribute their own callee, so
/// `db.Conn().Exec` yields `db.Conn.Exec`.
pub fn callee_chain(unit: &CompileUnit, func: NodeId) -> Option<String> {
    match unit.expr(func)? {
        Expr::Ident { name } => Some(name.clone()),
        Expr::Selector { operand, field } => {
            let base = callee_chain(unit, *operand)?;
            Some(format!("{}.{}", base, field))
        }
        Expr::Call { func, .. } => callee_chain(unit, *func),
        Expr::Other { children } if children.len() == 1 => {
            // parenthesized callee
            callee_chain(unit, children[0])
        }
        _ => None,
    }
}

/// Text of a string literal expression.
pub fn string_literal(unit: &CompileUnit, id: NodeId) -> Option<String> {
    let expr = unit.expr(id)?;
    match expr {
        Expr::Literal { raw, .. } if expr.is_string_literal() => go_unquote(raw),
        _ => None,
    }
}

/// A call that already looks like a generated wrapper constructor:
/// `New...Error(args..., reason, cause)`. The reason is usually a string
/// literal; any other expression is kept as its printed source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrapperCall {
    pub constructor: String,
    pub reason: String,
    pub cause: NodeId,
    pub arity: usize,
}

pub fn wrapper_call(unit: &CompileUnit, id: NodeId) -> Option<WrapperCall> {
    let Expr::Call { func, args, spread } = unit.expr(id)? else {
        return None;
    };
    let Some(Expr::Ident { name }) = unit.expr(*func) else {
        return None;
    };
    if *spread || !is_wrapper_constructor(name) || args.len() < 2 {
        return None;
    }
    let reason_arg = args[args.len() - 2];
    let reason = string_literal(unit, reason_arg).unwrap_or_else(|| render_node(unit, reason_arg));
    Some(WrapperCall {
        constructor: name.clone(),
        reason,
        cause: args[args.len() - 1],
        arity: args.len(),
    })
}

fn is_wrapper_constructor(name: &str) -> bool {
    name.len() > "NewError".len() && name.starts_with("New") && name.ends_with("Error")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlainConstructor {
    /// `errors.New(msg)`
    New,
    /// `fmt.Errorf(format, args...)`
    Errorf,
}

const CONSTRUCTOR_PACKAGES: &[(&str, &str, PlainConstructor)] = &[
    ("errors", "New", PlainConstructor::New),
    ("fmt", "Errorf", PlainConstructor::Errorf),
    ("github.com/pkg/errors", "New", PlainConstructor::New),
    ("github.com/pkg/errors", "Errorf", PlainConstructor::Errorf),
];

const JOIN_FUNCTIONS: &[(&str, &str)] = &[
    ("errors", "Join"),
    ("go.uber.org/multierr", "Combine"),
    ("go.uber.org/multierr", "Append"),
];

/// Import path and function name of a `pkg.Func(...)` call.
fn package_call<'u>(
    unit: &'u CompileUnit,
    imports: &'u ImportTable,
    id: NodeId,
) -> Option<(&'u str, &'u str)> {
    let Expr::Call { func, .. } = unit.expr(id)? else {
        return None;
    };
    let Expr::Selector { operand, field } = unit.expr(*func)? else {
        return None;
    };
    let Expr::Ident { name } = unit.expr(*operand)? else {
        return None;
    };
    Some((imports.resolve(name)?, field.as_str()))
}

/// Recognize a message-only or formatted-message error constructor.
pub fn plain_constructor(
    unit: &CompileUnit,
    imports: &ImportTable,
    id: NodeId,
) -> Option<PlainConstructor> {
    let (path, func) = package_call(unit, imports, id)?;
    CONSTRUCTOR_PACKAGES
        .iter()
        .find(|(p, f, _)| *p == path && *f == func)
        .map(|(_, _, kind)| *kind)
}

/// Multi-error combinators whose result says nothing about a single cause.
pub fn is_join_call(unit: &CompileUnit, imports: &ImportTable, id: NodeId) -> bool {
    package_call(unit, imports, id)
        .is_some_and(|(path, func)| JOIN_FUNCTIONS.iter().any(|(p, f)| *p == path && *f == func))
}
