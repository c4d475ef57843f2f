//! Source-preserving printer.
//!
//! Parsed regions are copied byte-for-byte; synthesized nodes are rendered
//! over the region they replace and detached nodes are cut out, taking their
//! line with them when nothing else is on it.
use crate::context::CompileUnit;
use crate::ir::{Expr, NodeId, NodeKind, Origin, Span, Stmt};

/// Render the whole unit back to Go source.
pub fn render_unit(unit: &CompileUnit) -> String {
    render_node(unit, unit.root())
}

/// Render a single node, splicing in any rewrites below it.
pub fn render_node(unit: &CompileUnit, id: NodeId) -> String {
    match unit.node(id).base.origin {
        Origin::Source(span) => splice(unit, id, span),
        Origin::Synthetic { .. } => render_synthetic(unit, id),
    }
}

fn splice(unit: &CompileUnit, id: NodeId, span: Span) -> String {
    let source = unit.source();
    let mut edits: Vec<(Span, String)> = Vec::new();
    for child in unit.children(id) {
        collect_edits(unit, child, &mut edits);
    }
    for removed in unit.removed_spans() {
        let expanded = expand_to_lines(source, *removed);
        if span.contains(expanded) {
            edits.push((expanded, String::new()));
        } else if span.contains(*removed) {
            edits.push((*removed, String::new()));
        }
    }
    edits.sort_by(|a, b| a.0.start.cmp(&b.0.start).then(b.0.end.cmp(&a.0.end)));

    let mut out = String::with_capacity(span.len());
    let mut cursor = span.start;
    for (edit, replacement) in edits {
        // Edits nested in an earlier edit are already covered by it.
        if edit.start < cursor {
            continue;
        }
        out.push_str(source.get(cursor..edit.start).unwrap_or_default());
        out.push_str(&replacement);
        cursor = edit.end;
    }
    out.push_str(source.get(cursor..span.end).unwrap_or_default());
    out
}

fn collect_edits(unit: &CompileUnit, id: NodeId, edits: &mut Vec<(Span, String)>) {
    match unit.node(id).base.origin {
        Origin::Synthetic {
            replaces: Some(span),
        } => edits.push((span, render_synthetic(unit, id))),
        Origin::Synthetic { replaces: None } => {
            tracing::warn!(node = %id, "synthesized node has no source region to print over");
        }
        Origin::Source(_) => {
            for child in unit.children(id) {
                collect_edits(unit, child, edits);
            }
        }
    }
}

fn render_synthetic(unit: &CompileUnit, id: NodeId) -> String {
    let join = |ids: &[NodeId]| {
        ids.iter()
            .map(|id| render_node(unit, *id))
            .collect::<Vec<_>>()
            .join(", ")
    };
    match unit.kind(id) {
        NodeKind::Expr(expr) => match expr {
            Expr::Ident { name } => name.clone(),
            Expr::Nil => "nil".to_string(),
            Expr::Literal { raw, .. } => raw.clone(),
            Expr::Selector { operand, field } => {
                format!("{}.{}", render_node(unit, *operand), field)
            }
            Expr::Call { func, args, spread } => format!(
                "{}({}{})",
                render_node(unit, *func),
                join(args),
                if *spread { "..." } else { "" }
            ),
            Expr::FuncLit { .. } | Expr::Other { .. } => {
                tracing::warn!(node = %id, "cannot print synthesized expression");
                String::new()
            }
        },
        NodeKind::Stmt(Stmt::Return { results }) if results.is_empty() => "return".to_string(),
        NodeKind::Stmt(Stmt::Return { results }) => format!("return {}", join(results)),
        NodeKind::Stmt(Stmt::Expr { expr }) => render_node(unit, *expr),
        _ => {
            tracing::warn!(node = %id, "cannot print synthesized node");
            String::new()
        }
    }
}

/// Grow a deleted region to whole lines when it is alone on them, and drop
/// one of two blank lines left adjacent by the deletion.
fn expand_to_lines(source: &str, span: Span) -> Span {
    let (Some(before), Some(after)) = (source.get(..span.start), source.get(span.end..)) else {
        return span;
    };
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    let line_end = after.find('\n').map_or(source.len(), |i| span.end + i + 1);

    let lead = &before[line_start..];
    let trail = source.get(span.end..line_end).unwrap_or_default().trim();
    if !lead.trim().is_empty() || !(trail.is_empty() || trail.starts_with("//")) {
        return span;
    }

    let mut end = line_end;
    let previous_blank = before[..line_start].ends_with("\n\n");
    if previous_blank && source.get(end..).is_some_and(|rest| rest.starts_with('\n')) {
        end += 1;
    }
    Span::new(line_start, end)
}
