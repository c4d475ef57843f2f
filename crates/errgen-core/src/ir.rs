//! Typed syntax model for Go compilation units.
//!
//! Nodes live in a per-unit arena and are addressed by [`NodeId`]. Every node
//! records its parent at construction time, so upward walks never need a
//! separate indexing pass.
use std::fmt;

use strum_macros::{Display, IntoStaticStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Half-open byte range into the unit's source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, other: Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// Where a node's text comes from when the unit is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Parsed from the source; printed verbatim.
    Source(Span),
    /// Built by a rewrite; `replaces` is the source region it is printed over.
    Synthetic { replaces: Option<Span> },
}

#[derive(Debug, Clone)]
pub struct NodeBase {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub origin: Origin,
    /// Package qualifiers referenced by syntax this node owns but does not
    /// model as child nodes (types, type arguments, unmodelled statements).
    pub qualifiers: Vec<String>,
}

impl NodeBase {
    pub fn span(&self) -> Option<Span> {
        match self.origin {
            Origin::Source(span) => Some(span),
            Origin::Synthetic { replaces } => replaces,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self.origin, Origin::Synthetic { .. })
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub base: NodeBase,
    pub kind: NodeKind,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.base.id
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.base.parent
    }

    pub fn as_stmt(&self) -> Option<&Stmt> {
        match &self.kind {
            NodeKind::Stmt(stmt) => Some(stmt),
            _ => None,
        }
    }

    pub fn as_expr(&self) -> Option<&Expr> {
        match &self.kind {
            NodeKind::Expr(expr) => Some(expr),
            _ => None,
        }
    }

    pub fn as_func(&self) -> Option<&FuncDecl> {
        match &self.kind {
            NodeKind::Func(func) => Some(func),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    File(FileNode),
    ImportDecl { specs: Vec<NodeId> },
    ImportSpec(ImportSpec),
    Func(FuncDecl),
    ValueSpec(ValueSpec),
    /// Type and const declarations; only their qualifiers matter here.
    Decl,
    Stmt(Stmt),
    Expr(Expr),
}

impl NodeKind {
    /// Direct children in source order.
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            NodeKind::File(file) => file.imports.iter().chain(&file.decls).copied().collect(),
            NodeKind::ImportDecl { specs } => specs.clone(),
            NodeKind::ImportSpec(_) | NodeKind::Decl => Vec::new(),
            NodeKind::Func(func) => func.body.into_iter().collect(),
            NodeKind::ValueSpec(spec) => spec.values.clone(),
            NodeKind::Stmt(stmt) => stmt.children(),
            NodeKind::Expr(expr) => expr.children(),
        }
    }

    /// Swap one child reference for another, keeping its slot.
    pub fn replace_child(&mut self, old: NodeId, new: NodeId) -> bool {
        let mut replaced = false;
        self.for_each_slot(|slot| {
            if *slot == old {
                *slot = new;
                replaced = true;
            }
        });
        replaced
    }

    /// Remove a child from a list-valued or optional slot.
    pub fn remove_child(&mut self, child: NodeId) -> bool {
        fn drop_from(list: &mut Vec<NodeId>, child: NodeId) -> bool {
            let before = list.len();
            list.retain(|id| *id != child);
            before != list.len()
        }

        match self {
            NodeKind::File(file) => {
                drop_from(&mut file.imports, child) || drop_from(&mut file.decls, child)
            }
            NodeKind::ImportDecl { specs } => drop_from(specs, child),
            NodeKind::ValueSpec(spec) => drop_from(&mut spec.values, child),
            NodeKind::Stmt(Stmt::Block { stmts }) => drop_from(stmts, child),
            NodeKind::Stmt(Stmt::Case { header, body }) => {
                drop_from(header, child) || drop_from(body, child)
            }
            NodeKind::Stmt(Stmt::VarDecl { specs }) => drop_from(specs, child),
            NodeKind::Expr(Expr::Other { children }) => drop_from(children, child),
            NodeKind::Expr(Expr::Call { args, .. }) => drop_from(args, child),
            NodeKind::Func(func) if func.body == Some(child) => {
                func.body = None;
                true
            }
            _ => false,
        }
    }

    fn for_each_slot(&mut self, mut f: impl FnMut(&mut NodeId)) {
        match self {
            NodeKind::File(file) => file.imports.iter_mut().chain(&mut file.decls).for_each(f),
            NodeKind::ImportDecl { specs } => specs.iter_mut().for_each(f),
            NodeKind::ImportSpec(_) | NodeKind::Decl => {}
            NodeKind::Func(func) => func.body.iter_mut().for_each(f),
            NodeKind::ValueSpec(spec) => spec.values.iter_mut().for_each(f),
            NodeKind::Stmt(stmt) => match stmt {
                Stmt::Block { stmts } => stmts.iter_mut().for_each(f),
                Stmt::Return { results } => results.iter_mut().for_each(f),
                Stmt::Assign { lhs, rhs, .. } => lhs.iter_mut().chain(rhs).for_each(f),
                Stmt::VarDecl { specs } => specs.iter_mut().for_each(f),
                Stmt::If {
                    init,
                    cond,
                    then,
                    alt,
                } => init
                    .iter_mut()
                    .chain(cond.iter_mut())
                    .chain(then.iter_mut())
                    .chain(alt.iter_mut())
                    .for_each(f),
                Stmt::Switch {
                    init,
                    header,
                    clauses,
                } => init
                    .iter_mut()
                    .chain(header.iter_mut())
                    .chain(clauses.iter_mut())
                    .for_each(f),
                Stmt::Case { header, body } => header.iter_mut().chain(body).for_each(f),
                Stmt::For { body } | Stmt::Labeled { body, .. } => body.iter_mut().for_each(f),
                Stmt::Go { call } | Stmt::Defer { call } => f(call),
                Stmt::Expr { expr } => f(expr),
                Stmt::Other => {}
            },
            NodeKind::Expr(expr) => match expr {
                Expr::Ident { .. } | Expr::Nil | Expr::Literal { .. } => {}
                Expr::Selector { operand, .. } => f(operand),
                Expr::Call { func, args, .. } => {
                    f(func);
                    args.iter_mut().for_each(f);
                }
                Expr::FuncLit { body } => body.iter_mut().for_each(f),
                Expr::Other { children } => children.iter_mut().for_each(f),
            },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FileNode {
    pub package: String,
    pub imports: Vec<NodeId>,
    pub decls: Vec<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpec {
    /// Explicit local name: an identifier, `_` or `.`.
    pub alias: Option<String>,
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct Receiver {
    pub name: Option<String>,
    /// Base type name with pointer and type arguments stripped.
    pub type_name: String,
    pub ty: TypeExpr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: Option<String>,
    pub ty: TypeExpr,
    pub variadic: bool,
}

#[derive(Debug, Clone)]
pub struct FuncDecl {
    pub name: String,
    pub receiver: Option<Receiver>,
    /// Type parameter names, including those bound by a generic receiver.
    pub type_params: Vec<String>,
    pub params: Vec<Param>,
    pub results: Vec<Param>,
    pub body: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub struct ValueSpec {
    pub names: Vec<String>,
    pub ty: Option<TypeExpr>,
    pub values: Vec<NodeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum AssignOp {
    /// `:=`
    Define,
    /// `=`
    Assign,
    /// `+=`, `|=`, ...
    Compound,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Block {
        stmts: Vec<NodeId>,
    },
    Return {
        results: Vec<NodeId>,
    },
    Assign {
        lhs: Vec<NodeId>,
        rhs: Vec<NodeId>,
        op: AssignOp,
    },
    VarDecl {
        specs: Vec<NodeId>,
    },
    If {
        init: Option<NodeId>,
        cond: Option<NodeId>,
        then: Option<NodeId>,
        alt: Option<NodeId>,
    },
    /// Expression switch, type switch and select.
    Switch {
        init: Option<NodeId>,
        header: Vec<NodeId>,
        clauses: Vec<NodeId>,
    },
    /// One clause of a switch or select.
    Case {
        header: Vec<NodeId>,
        body: Vec<NodeId>,
    },
    For {
        body: Option<NodeId>,
    },
    Labeled {
        label: String,
        body: Option<NodeId>,
    },
    Go {
        call: NodeId,
    },
    Defer {
        call: NodeId,
    },
    Expr {
        expr: NodeId,
    },
    Other,
}

impl Stmt {
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            Stmt::Block { stmts } => stmts.clone(),
            Stmt::Return { results } => results.clone(),
            Stmt::Assign { lhs, rhs, .. } => lhs.iter().chain(rhs).copied().collect(),
            Stmt::VarDecl { specs } => specs.clone(),
            Stmt::If {
                init,
                cond,
                then,
                alt,
            } => [*init, *cond, *then, *alt].into_iter().flatten().collect(),
            Stmt::Switch {
                init,
                header,
                clauses,
            } => init.iter().chain(header).chain(clauses).copied().collect(),
            Stmt::Case { header, body } => header.iter().chain(body).copied().collect(),
            Stmt::For { body } | Stmt::Labeled { body, .. } => body.iter().copied().collect(),
            Stmt::Go { call } | Stmt::Defer { call } => vec![*call],
            Stmt::Expr { expr } => vec![*expr],
            Stmt::Other => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum LitKind {
    Str,
    RawStr,
    Int,
    Float,
    Imaginary,
    Rune,
    Bool,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Ident {
        name: String,
    },
    Nil,
    Literal {
        kind: LitKind,
        raw: String,
    },
    Selector {
        operand: NodeId,
        field: String,
    },
    Call {
        func: NodeId,
        args: Vec<NodeId>,
        spread: bool,
    },
    FuncLit {
        body: Option<NodeId>,
    },
    /// Any other expression; sub-expressions are still lowered so closures
    /// and selectors nested inside stay reachable.
    Other {
        children: Vec<NodeId>,
    },
}

impl Expr {
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            Expr::Ident { .. } | Expr::Nil | Expr::Literal { .. } => Vec::new(),
            Expr::Selector { operand, .. } => vec![*operand],
            Expr::Call { func, args, .. } => std::iter::once(*func).chain(args.iter().copied()).collect(),
            Expr::FuncLit { body } => body.iter().copied().collect(),
            Expr::Other { children } => children.clone(),
        }
    }

    pub fn is_string_literal(&self) -> bool {
        matches!(
            self,
            Expr::Literal {
                kind: LitKind::Str | LitKind::RawStr,
                ..
            }
        )
    }
}

/// Go type expression, reduced to the shapes argument capture cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    Named {
        package: Option<String>,
        name: String,
        args: Vec<TypeExpr>,
    },
    Pointer(Box<TypeExpr>),
    Slice(Box<TypeExpr>),
    Array {
        len: String,
        elem: Box<TypeExpr>,
    },
    Map {
        key: Box<TypeExpr>,
        value: Box<TypeExpr>,
    },
    /// Function, channel, struct and interface types, kept as source text.
    Opaque {
        text: String,
        packages: Vec<String>,
    },
}

impl TypeExpr {
    pub fn named(name: impl Into<String>) -> Self {
        TypeExpr::Named {
            package: None,
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn qualified(package: impl Into<String>, name: impl Into<String>) -> Self {
        TypeExpr::Named {
            package: Some(package.into()),
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// True for the bare predeclared `error` type.
    pub fn is_error(&self) -> bool {
        matches!(self, TypeExpr::Named { package: None, name, args } if name == "error" && args.is_empty())
    }

    /// Every `(package, name)` pair for named types inside this type.
    pub fn named_types(&self) -> Vec<(Option<&str>, &str)> {
        let mut out = Vec::new();
        self.walk_named(&mut out);
        out
    }

    fn walk_named<'a>(&'a self, out: &mut Vec<(Option<&'a str>, &'a str)>) {
        match self {
            TypeExpr::Named {
                package,
                name,
                args,
            } => {
                out.push((package.as_deref(), name.as_str()));
                args.iter().for_each(|arg| arg.walk_named(out));
            }
            TypeExpr::Pointer(inner) | TypeExpr::Slice(inner) => inner.walk_named(out),
            TypeExpr::Array { elem, .. } => elem.walk_named(out),
            TypeExpr::Map { key, value } => {
                key.walk_named(out);
                value.walk_named(out);
            }
            TypeExpr::Opaque { .. } => {}
        }
    }

    /// Package qualifiers referenced anywhere in this type.
    pub fn packages(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        self.walk_packages(&mut out);
        out.sort_unstable();
        out.dedup();
        out
    }

    fn walk_packages<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            TypeExpr::Named { package, args, .. } => {
                out.extend(package.as_deref());
                args.iter().for_each(|arg| arg.walk_packages(out));
            }
            TypeExpr::Pointer(inner) | TypeExpr::Slice(inner) => inner.walk_packages(out),
            TypeExpr::Array { elem, .. } => elem.walk_packages(out),
            TypeExpr::Map { key, value } => {
                key.walk_packages(out);
                value.walk_packages(out);
            }
            TypeExpr::Opaque { packages, .. } => out.extend(packages.iter().map(String::as_str)),
        }
    }

    /// Whether any of `names` appears as an unqualified type or as a bare
    /// word inside opaque type text.
    pub fn mentions_any(&self, names: &[String]) -> bool {
        if names.is_empty() {
            return false;
        }
        match self {
            TypeExpr::Opaque { text, .. } => text
                .split(|c: char| !(c.is_alphanumeric() || c == '_'))
                .any(|word| names.iter().any(|name| name == word)),
            _ => {
                let opaque_hit = self.opaque_parts().iter().any(|part| part.mentions_any(names));
                opaque_hit
                    || self
                        .named_types()
                        .iter()
                        .any(|(pkg, name)| pkg.is_none() && names.iter().any(|n| n == name))
            }
        }
    }

    /// Whether any part of this type is kept as opaque source text.
    pub fn has_opaque(&self) -> bool {
        !self.opaque_parts().is_empty()
    }

    /// Replace package qualifiers of named types. Opaque text is left as is.
    pub fn rename_packages(&mut self, rename: &impl Fn(&str) -> Option<String>) {
        match self {
            TypeExpr::Named { package, args, .. } => {
                if let Some(renamed) = package.as_deref().and_then(rename) {
                    *package = Some(renamed);
                }
                args.iter_mut().for_each(|arg| arg.rename_packages(rename));
            }
            TypeExpr::Pointer(inner) | TypeExpr::Slice(inner) => inner.rename_packages(rename),
            TypeExpr::Array { elem, .. } => elem.rename_packages(rename),
            TypeExpr::Map { key, value } => {
                key.rename_packages(rename);
                value.rename_packages(rename);
            }
            TypeExpr::Opaque { .. } => {}
        }
    }

    fn opaque_parts(&self) -> Vec<&TypeExpr> {
        match self {
            TypeExpr::Opaque { .. } => vec![self],
            TypeExpr::Named { args, .. } => args.iter().flat_map(|a| a.opaque_parts()).collect(),
            TypeExpr::Pointer(inner) | TypeExpr::Slice(inner) => inner.opaque_parts(),
            TypeExpr::Array { elem, .. } => elem.opaque_parts(),
            TypeExpr::Map { key, value } => {
                let mut parts = key.opaque_parts();
                parts.extend(value.opaque_parts());
                parts
            }
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Named {
                package,
                name,
                args,
            } => {
                if let Some(package) = package {
                    write!(f, "{}.", package)?;
                }
                write!(f, "{}", name)?;
                if !args.is_empty() {
                    write!(f, "[")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", arg)?;
                    }
                    write!(f, "]")?;
                }
                Ok(())
            }
            TypeExpr::Pointer(inner) => write!(f, "*{}", inner),
            TypeExpr::Slice(inner) => write!(f, "[]{}", inner),
            TypeExpr::Array { len, elem } => write!(f, "[{}]{}", len, elem),
            TypeExpr::Map { key, value } => write!(f, "map[{}]{}", key, value),
            TypeExpr::Opaque { text, .. } => write!(f, "{}", text),
        }
    }
}
