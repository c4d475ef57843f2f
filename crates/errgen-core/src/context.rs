//! Compile unit: one parsed Go file and its node arena.
use std::path::Path;

use errgen_error::Result;

use crate::file::File;
use crate::ir::{Expr, FuncDecl, ImportSpec, Node, NodeBase, NodeId, NodeKind, Origin, Span};
use crate::ir_builder::build_unit;
use crate::lang::LangGo;

#[derive(Debug, Clone)]
pub struct CompileUnit {
    file: File,
    nodes: Vec<Node>,
    root: NodeId,
    /// Source regions of detached nodes, deleted when printing.
    removed: Vec<Span>,
}

impl CompileUnit {
    pub(crate) fn new(file: File, nodes: Vec<Node>, root: NodeId) -> Self {
        Self {
            file,
            nodes,
            root,
            removed: Vec::new(),
        }
    }

    /// Parse and lower a file in one step.
    pub fn parse(file: File) -> Result<Self> {
        let tree = LangGo::parse(file.content()).map_err(|e| e.with_path(&file.path))?;
        Ok(build_unit(file, &tree))
    }

    pub fn from_source(path: impl AsRef<Path>, source: impl Into<String>) -> Result<Self> {
        Self::parse(File::new_source(path.as_ref(), source))
    }

    pub fn file(&self) -> &File {
        &self.file
    }

    pub fn path(&self) -> &Path {
        &self.file.path
    }

    pub fn source(&self) -> &str {
        self.file.content()
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn opt_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Get a node by id. Ids are only ever handed out by this unit.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    pub fn expr(&self, id: NodeId) -> Option<&Expr> {
        self.opt_node(id).and_then(Node::as_expr)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.opt_node(id).and_then(Node::parent)
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.opt_node(id)
            .map(|node| node.kind.children())
            .unwrap_or_default()
    }

    /// Ancestors from the direct parent up to the root.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            unit: self,
            next: self.parent(id),
        }
    }

    /// Walk up the parent chain to find the first ancestor matching `predicate`.
    pub fn find_ancestor<F>(&self, id: NodeId, predicate: F) -> Option<NodeId>
    where
        F: Fn(&Node) -> bool,
    {
        self.ancestors(id).find(|ancestor| predicate(self.node(*ancestor)))
    }

    /// Pre-order walk of the live subtree rooted at `id`, including `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            let children = self.children(current);
            stack.extend(children.into_iter().rev());
        }
        out
    }

    /// Original source text of a parsed node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.opt_node(id)?.base.origin {
            Origin::Source(span) => self.file.get_text(span.start, span.end),
            Origin::Synthetic { .. } => None,
        }
    }

    pub fn package_name(&self) -> &str {
        match self.kind(self.root) {
            NodeKind::File(file) => &file.package,
            _ => "",
        }
    }

    pub fn import_decls(&self) -> Vec<NodeId> {
        match self.kind(self.root) {
            NodeKind::File(file) => file.imports.clone(),
            _ => Vec::new(),
        }
    }

    pub fn import_specs(&self) -> Vec<(NodeId, &ImportSpec)> {
        self.import_decls()
            .into_iter()
            .flat_map(|decl| self.children(decl))
            .filter_map(|id| match self.kind(id) {
                NodeKind::ImportSpec(spec) => Some((id, spec)),
                _ => None,
            })
            .collect()
    }

    /// Top-level function and method declarations in source order.
    pub fn functions(&self) -> Vec<(NodeId, &FuncDecl)> {
        let decls = match self.kind(self.root) {
            NodeKind::File(file) => file.decls.clone(),
            _ => Vec::new(),
        };
        decls
            .into_iter()
            .filter_map(|id| self.node(id).as_func().map(|func| (id, func)))
            .collect()
    }

    /// Package names referenced by the live tree: selector operands plus the
    /// qualifiers recorded on each node.
    pub fn used_qualifiers(&self) -> Vec<String> {
        let mut used = Vec::new();
        for id in self.descendants(self.root) {
            let node = self.node(id);
            used.extend(node.base.qualifiers.iter().cloned());
            if let NodeKind::Expr(Expr::Selector { operand, .. }) = &node.kind {
                if let Some(Expr::Ident { name }) = self.expr(*operand) {
                    used.push(name.clone());
                }
            }
        }
        used.sort();
        used.dedup();
        used
    }

    /// Whether any rewrite touched this unit.
    pub fn is_modified(&self) -> bool {
        !self.removed.is_empty()
            || self
                .descendants(self.root)
                .iter()
                .any(|id| self.node(*id).base.is_synthetic())
    }

    pub fn removed_spans(&self) -> &[Span] {
        &self.removed
    }

    /// Allocate a synthesized node under `parent`.
    pub fn alloc(&mut self, parent: Option<NodeId>, kind: NodeKind) -> NodeId {
        self.push(parent, Origin::Synthetic { replaces: None }, kind)
    }

    /// Move an existing node under a new parent. The caller is responsible
    /// for listing it in the new parent's children.
    pub fn adopt(&mut self, child: NodeId, parent: NodeId) {
        if let Some(node) = self.nodes.get_mut(child.index()) {
            node.base.parent = Some(parent);
        }
    }

    /// Replace `old` with a node built by `build`, printed over `old`'s source
    /// region. `build` receives the new node's id so it can allocate or adopt
    /// children; `old` is already detached when `build` runs and may be
    /// adopted as one of them.
    pub fn replace_with<F>(&mut self, old: NodeId, build: F) -> Option<NodeId>
    where
        F: FnOnce(&mut CompileUnit, NodeId) -> NodeKind,
    {
        let parent = self.parent(old)?;
        let replaces = self.node(old).base.span();
        let new = self.push(
            Some(parent),
            Origin::Synthetic { replaces },
            NodeKind::Expr(Expr::Other {
                children: Vec::new(),
            }),
        );
        self.nodes[old.index()].base.parent = None;
        let kind = build(self, new);
        self.nodes[new.index()].kind = kind;
        self.nodes[parent.index()].kind.replace_child(old, new);
        Some(new)
    }

    /// Remove `id` from its parent. Parsed nodes have their source region
    /// deleted when the unit is printed.
    pub fn detach(&mut self, id: NodeId) -> bool {
        let Some(parent) = self.parent(id) else {
            return false;
        };
        if !self.nodes[parent.index()].kind.remove_child(id) {
            return false;
        }
        let node = &mut self.nodes[id.index()];
        node.base.parent = None;
        if let Origin::Source(span) = node.base.origin {
            self.removed.push(span);
        }
        true
    }

    fn push(&mut self, parent: Option<NodeId>, origin: Origin, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            base: NodeBase {
                id,
                parent,
                origin,
                qualifiers: Vec::new(),
            },
            kind,
        });
        id
    }
}

pub struct Ancestors<'a> {
    unit: &'a CompileUnit,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.unit.parent(current);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Stmt;

    const SOURCE: &str = "package svc

import (
\t\"errors\"
\t\"fmt\"
)

func F() error {
\treturn errors.New(\"x\")
}
";

    fn first_return_value(unit: &CompileUnit) -> NodeId {
        unit.descendants(unit.root())
            .into_iter()
            .find_map(|id| match unit.node(id).as_stmt() {
                Some(Stmt::Return { results }) => results.first().copied(),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn test_imports_and_functions() {
        let unit = CompileUnit::from_source("svc.go", SOURCE).unwrap();
        assert_eq!(unit.package_name(), "svc");
        let paths: Vec<&str> = unit.import_specs().iter().map(|(_, s)| s.path.as_str()).collect();
        assert_eq!(paths, vec!["errors", "fmt"]);
        assert_eq!(unit.functions()[0].1.name, "F");
        assert_eq!(unit.used_qualifiers(), vec!["errors".to_string()]);
    }

    #[test]
    fn test_ancestors_reach_function() {
        let unit = CompileUnit::from_source("svc.go", SOURCE).unwrap();
        let value = first_return_value(&unit);
        let func = unit.find_ancestor(value, |node| node.as_func().is_some());
        assert_eq!(func, Some(unit.functions()[0].0));
        assert_eq!(unit.ancestors(value).last(), Some(unit.root()));
    }

    #[test]
    fn test_replace_with_adopts_old_node() {
        let mut unit = CompileUnit::from_source("svc.go", SOURCE).unwrap();
        let value = first_return_value(&unit);
        let ret = unit.parent(value).unwrap();

        let new = unit
            .replace_with(value, |unit, new| {
                let func = unit.alloc(
                    Some(new),
                    NodeKind::Expr(Expr::Ident {
                        name: "wrap".into(),
                    }),
                );
                unit.adopt(value, new);
                NodeKind::Expr(Expr::Call {
                    func,
                    args: vec![value],
                    spread: false,
                })
            })
            .unwrap();

        assert_eq!(unit.children(ret), vec![new]);
        assert_eq!(unit.parent(value), Some(new));
        assert!(unit.is_modified());
    }

    #[test]
    fn test_detach_records_span() {
        let mut unit = CompileUnit::from_source("svc.go", SOURCE).unwrap();
        let (fmt_spec, _) = unit.import_specs()[1];
        assert!(unit.detach(fmt_spec));
        assert!(!unit.detach(fmt_spec));
        assert_eq!(unit.import_specs().len(), 1);
        assert_eq!(unit.removed_spans().len(), 1);
    }

    #[test]
    fn test_parse_error_carries_path() {
        let err = CompileUnit::from_source("broken.go", "package a\nfunc {").unwrap_err();
        assert_eq!(err.context_value("path"), Some("broken.go"));
    }
}
