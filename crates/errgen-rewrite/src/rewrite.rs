//! Return-site rewriting.
use errgen_core::{CompileUnit, Expr, LitKind, NodeId, NodeKind, go_quote};

/// Final argument of a rewritten constructor call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CauseExpr {
    /// An expression already in the unit, moved under the new call.
    Existing(NodeId),
    Nil,
    /// A package-level sentinel variable.
    Sentinel(String),
}

/// Replace `value` with `constructor(args..., "reason", cause)`. Returns the
/// new call node, or `None` when `value` has no parent to be replaced in.
pub fn rewrite_site(
    unit: &mut CompileUnit,
    value: NodeId,
    constructor: &str,
    args: &[String],
    reason: &str,
    cause: CauseExpr,
) -> Option<NodeId> {
    unit.replace_with(value, |unit, call| {
        let func = ident(unit, call, constructor);
        let mut call_args: Vec<NodeId> = args.iter().map(|arg| ident(unit, call, arg)).collect();
        call_args.push(unit.alloc(
            Some(call),
            NodeKind::Expr(Expr::Literal {
                kind: LitKind::Str,
                raw: go_quote(reason),
            }),
        ));
        call_args.push(match cause {
            CauseExpr::Existing(id) => {
                unit.adopt(id, call);
                id
            }
            CauseExpr::Nil => unit.alloc(Some(call), NodeKind::Expr(Expr::Nil)),
            CauseExpr::Sentinel(name) => ident(unit, call, &name),
        });
        NodeKind::Expr(Expr::Call {
            func,
            args: call_args,
            spread: false,
        })
    })
}

fn ident(unit: &mut CompileUnit, parent: NodeId, name: &str) -> NodeId {
    unit.alloc(
        Some(parent),
        NodeKind::Expr(Expr::Ident {
            name: name.to_string(),
        }),
    )
}
