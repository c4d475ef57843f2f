//! Function classifier: which functions return an error, and in which slot.
use errgen_core::{CompileUnit, NodeId, Stmt};

/// A function whose results include the predeclared `error` type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorFunction {
    pub id: NodeId,
    /// Zero-based index of the first `error` result.
    pub slot: usize,
}

/// Top-level functions and methods with a body and an `error` result, in
/// source order.
pub fn error_functions(unit: &CompileUnit) -> Vec<ErrorFunction> {
    unit.functions()
        .into_iter()
        .filter(|(_, func)| func.body.is_some())
        .filter_map(|(id, func)| {
            let slot = func.results.iter().position(|result| result.ty.is_error())?;
            Some(ErrorFunction { id, slot })
        })
        .collect()
}

/// Every return statement inside a function body, closures included.
pub fn return_sites(unit: &CompileUnit, func: NodeId) -> Vec<NodeId> {
    unit.descendants(func)
        .into_iter()
        .filter(|id| matches!(unit.node(*id).as_stmt(), Some(Stmt::Return { .. })))
        .collect()
}
