//! IR Builder: lower tree-sitter Go parse trees into the typed arena model.
//!
//! Node ids are reserved before children are lowered, so every child is
//! created with its parent link already in place.
use tree_sitter::{Node as TsNode, Tree};

use crate::context::CompileUnit;
use crate::file::File;
use crate::ir::{
    AssignOp, Expr, FileNode, FuncDecl, ImportSpec, LitKind, Node, NodeBase, NodeId, NodeKind,
    Origin, Param, Receiver, Span, Stmt, TypeExpr, ValueSpec,
};
use crate::quote::go_unquote;

/// Build a compile unit from a parsed file.
pub fn build_unit(file: File, tree: &Tree) -> CompileUnit {
    let mut builder = UnitBuilder {
        source: file.content(),
        nodes: Vec::new(),
    };
    let root = builder.lower_file(tree.root_node());
    let nodes = builder.nodes;
    tracing::trace!(path = %file.path.display(), nodes = nodes.len(), "built unit");
    CompileUnit::new(file, nodes, root)
}

struct UnitBuilder<'src> {
    source: &'src str,
    nodes: Vec<Node>,
}

impl<'src> UnitBuilder<'src> {
    fn reserve(&mut self, parent: Option<NodeId>, span: Span) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            base: NodeBase {
                id,
                parent,
                origin: Origin::Source(span),
                qualifiers: Vec::new(),
            },
            kind: NodeKind::Decl,
        });
        id
    }

    fn finish(&mut self, id: NodeId, kind: NodeKind) -> NodeId {
        self.nodes[id.index()].kind = kind;
        id
    }

    fn finish_with(&mut self, id: NodeId, kind: NodeKind, mut qualifiers: Vec<String>) -> NodeId {
        qualifiers.sort();
        qualifiers.dedup();
        let node = &mut self.nodes[id.index()];
        node.kind = kind;
        node.base.qualifiers = qualifiers;
        id
    }

    fn text(&self, node: TsNode<'_>) -> &'src str {
        self.source.get(node.byte_range()).unwrap_or_default()
    }

    fn lower_file(&mut self, root: TsNode<'_>) -> NodeId {
        let id = self.reserve(None, Span::new(0, self.source.len()));
        let mut file = FileNode::default();

        for child in named_children(root) {
            match child.kind() {
                "package_clause" => {
                    if let Some(name) = named_children(child).into_iter().next() {
                        file.package = self.text(name).to_string();
                    }
                }
                "import_declaration" => file.imports.push(self.lower_import_decl(child, id)),
                "function_declaration" | "method_declaration" => {
                    file.decls.push(self.lower_func(child, id))
                }
                "var_declaration" => file.decls.push(self.lower_stmt(child, id)),
                _ => file.decls.push(self.lower_opaque_decl(child, id)),
            }
        }
        self.finish(id, NodeKind::File(file))
    }

    fn lower_import_decl(&mut self, node: TsNode<'_>, parent: NodeId) -> NodeId {
        let id = self.reserve(Some(parent), span_of(node));
        let mut specs = Vec::new();
        for child in named_children(node) {
            match child.kind() {
                "import_spec" => specs.push(self.lower_import_spec(child, id)),
                "import_spec_list" => {
                    for spec in named_children(child) {
                        if spec.kind() == "import_spec" {
                            specs.push(self.lower_import_spec(spec, id));
                        }
                    }
                }
                _ => {}
            }
        }
        self.finish(id, NodeKind::ImportDecl { specs })
    }

    fn lower_import_spec(&mut self, node: TsNode<'_>, parent: NodeId) -> NodeId {
        let id = self.reserve(Some(parent), span_of(node));
        let alias = node
            .child_by_field_name("name")
            .map(|name| self.text(name).to_string());
        let path = node
            .child_by_field_name("path")
            .and_then(|path| go_unquote(self.text(path)))
            .unwrap_or_default();
        self.finish(id, NodeKind::ImportSpec(ImportSpec { alias, path }))
    }

    fn lower_opaque_decl(&mut self, node: TsNode<'_>, parent: NodeId) -> NodeId {
        let id = self.reserve(Some(parent), span_of(node));
        let mut qualifiers = Vec::new();
        self.collect_qualifiers(node, &mut qualifiers);
        self.finish_with(id, NodeKind::Decl, qualifiers)
    }

    fn lower_func(&mut self, node: TsNode<'_>, parent: NodeId) -> NodeId {
        let id = self.reserve(Some(parent), span_of(node));
        let name = node
            .child_by_field_name("name")
            .map(|name| self.text(name).to_string())
            .unwrap_or_default();

        let mut qualifiers = Vec::new();
        for field in ["receiver", "type_parameters", "parameters", "result"] {
            if let Some(part) = node.child_by_field_name(field) {
                self.collect_qualifiers(part, &mut qualifiers);
            }
        }

        let mut type_params = node
            .child_by_field_name("type_parameters")
            .map(|list| self.type_param_names(list))
            .unwrap_or_default();

        let receiver = node
            .child_by_field_name("receiver")
            .and_then(|list| self.lower_params(list).into_iter().next())
            .map(|param| {
                let (type_name, bound) = receiver_base(&param.ty);
                type_params.extend(bound);
                Receiver {
                    name: param.name,
                    type_name,
                    ty: param.ty,
                }
            });

        let params = node
            .child_by_field_name("parameters")
            .map(|list| self.lower_params(list))
            .unwrap_or_default();
        let results = match node.child_by_field_name("result") {
            Some(list) if list.kind() == "parameter_list" => self.lower_params(list),
            Some(ty) => vec![Param {
                name: None,
                ty: self.lower_type(ty),
                variadic: false,
            }],
            None => Vec::new(),
        };
        let body = node
            .child_by_field_name("body")
            .map(|body| self.lower_block(body, id));

        let func = FuncDecl {
            name,
            receiver,
            type_params,
            params,
            results,
            body,
        };
        self.finish_with(id, NodeKind::Func(func), qualifiers)
    }

    fn type_param_names(&self, list: TsNode<'_>) -> Vec<String> {
        let mut names = Vec::new();
        for decl in named_children(list) {
            if decl.kind() != "type_parameter_declaration" {
                continue;
            }
            let mut cursor = decl.walk();
            for name in decl.children_by_field_name("name", &mut cursor) {
                names.push(self.text(name).to_string());
            }
        }
        names
    }

    fn lower_params(&self, list: TsNode<'_>) -> Vec<Param> {
        let mut params = Vec::new();
        for decl in named_children(list) {
            let variadic = match decl.kind() {
                "parameter_declaration" => false,
                "variadic_parameter_declaration" => true,
                _ => continue,
            };
            let Some(ty) = decl.child_by_field_name("type") else {
                continue;
            };
            let ty = self.lower_type(ty);
            let mut cursor = decl.walk();
            let names: Vec<String> = decl
                .children_by_field_name("name", &mut cursor)
                .map(|name| self.text(name).to_string())
                .collect();
            if names.is_empty() {
                params.push(Param {
                    name: None,
                    ty,
                    variadic,
                });
            } else {
                for name in names {
                    params.push(Param {
                        name: Some(name),
                        ty: ty.clone(),
                        variadic,
                    });
                }
            }
        }
        params
    }

    fn lower_type(&self, node: TsNode<'_>) -> TypeExpr {
        match node.kind() {
            "type_identifier" => TypeExpr::named(self.text(node)),
            "qualified_type" => {
                let package = node.child_by_field_name("package");
                let name = node.child_by_field_name("name");
                match (package, name) {
                    (Some(package), Some(name)) => {
                        TypeExpr::qualified(self.text(package), self.text(name))
                    }
                    _ => self.opaque_type(node),
                }
            }
            "generic_type" => {
                let base = node.child_by_field_name("type").map(|ty| self.lower_type(ty));
                let args: Vec<TypeExpr> = node
                    .child_by_field_name("type_arguments")
                    .map(|list| {
                        named_children(list)
                            .into_iter()
                            .map(|arg| match arg.kind() {
                                "type_elem" => match named_children(arg).as_slice() {
                                    [single] => self.lower_type(*single),
                                    _ => self.opaque_type(arg),
                                },
                                _ => self.lower_type(arg),
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                match base {
                    Some(TypeExpr::Named { package, name, .. }) => TypeExpr::Named {
                        package,
                        name,
                        args,
                    },
                    _ => self.opaque_type(node),
                }
            }
            "pointer_type" => match named_children(node).first() {
                Some(inner) => TypeExpr::Pointer(Box::new(self.lower_type(*inner))),
                None => self.opaque_type(node),
            },
            "slice_type" => match node.child_by_field_name("element") {
                Some(elem) => TypeExpr::Slice(Box::new(self.lower_type(elem))),
                None => self.opaque_type(node),
            },
            "array_type" => {
                let len = node.child_by_field_name("length");
                let elem = node.child_by_field_name("element");
                match (len, elem) {
                    (Some(len), Some(elem)) if len.kind() == "int_literal" => TypeExpr::Array {
                        len: self.text(len).to_string(),
                        elem: Box::new(self.lower_type(elem)),
                    },
                    _ => self.opaque_type(node),
                }
            }
            "map_type" => {
                let key = node.child_by_field_name("key");
                let value = node.child_by_field_name("value");
                match (key, value) {
                    (Some(key), Some(value)) => TypeExpr::Map {
                        key: Box::new(self.lower_type(key)),
                        value: Box::new(self.lower_type(value)),
                    },
                    _ => self.opaque_type(node),
                }
            }
            "parenthesized_type" => match named_children(node).first() {
                Some(inner) => self.lower_type(*inner),
                None => self.opaque_type(node),
            },
            _ => self.opaque_type(node),
        }
    }

    fn opaque_type(&self, node: TsNode<'_>) -> TypeExpr {
        let mut packages = Vec::new();
        self.collect_qualifiers(node, &mut packages);
        packages.sort();
        packages.dedup();
        TypeExpr::Opaque {
            text: self.text(node).to_string(),
            packages,
        }
    }

    /// Collect package qualifiers from a subtree that is not lowered into
    /// child nodes.
    fn collect_qualifiers(&self, node: TsNode<'_>, out: &mut Vec<String>) {
        match node.kind() {
            "qualified_type" => {
                if let Some(package) = node.child_by_field_name("package") {
                    out.push(self.text(package).to_string());
                }
            }
            "selector_expression" => {
                if let Some(operand) = node.child_by_field_name("operand") {
                    if operand.kind() == "identifier" {
                        out.push(self.text(operand).to_string());
                    }
                }
            }
            _ => {}
        }
        for child in named_children(node) {
            self.collect_qualifiers(child, out);
        }
    }

    fn lower_block(&mut self, node: TsNode<'_>, parent: NodeId) -> NodeId {
        let id = self.reserve(Some(parent), span_of(node));
        let stmts = self.lower_stmt_list(named_children(node), id);
        self.finish(id, NodeKind::Stmt(Stmt::Block { stmts }))
    }

    fn lower_stmt_list(&mut self, nodes: Vec<TsNode<'_>>, parent: NodeId) -> Vec<NodeId> {
        let mut stmts = Vec::new();
        for node in nodes {
            if node.kind() == "statement_list" {
                for stmt in named_children(node) {
                    stmts.push(self.lower_stmt(stmt, parent));
                }
            } else {
                stmts.push(self.lower_stmt(node, parent));
            }
        }
        stmts
    }

    fn lower_stmt(&mut self, node: TsNode<'_>, parent: NodeId) -> NodeId {
        match node.kind() {
            "block" => return self.lower_block(node, parent),
            "empty_statement" => return self.lower_other_stmt(node, parent),
            _ => {}
        }

        let id = self.reserve(Some(parent), span_of(node));
        let stmt = match node.kind() {
            "return_statement" => {
                let lists = named_children(node);
                let mut results = Vec::new();
                for list in lists {
                    results.extend(self.lower_expr_list(Some(list), id));
                }
                Stmt::Return { results }
            }
            "receive_statement" => {
                let lhs = self.lower_expr_list(node.child_by_field_name("left"), id);
                let rhs: Vec<NodeId> = node
                    .child_by_field_name("right")
                    .map(|right| self.lower_expr(right, id))
                    .into_iter()
                    .collect();
                if lhs.is_empty() {
                    match rhs.first() {
                        Some(expr) => Stmt::Expr { expr: *expr },
                        None => Stmt::Other,
                    }
                } else {
                    let mut cursor = node.walk();
                    let define = node.children(&mut cursor).any(|child| child.kind() == ":=");
                    let op = if define { AssignOp::Define } else { AssignOp::Assign };
                    Stmt::Assign { lhs, rhs, op }
                }
            }
            "short_var_declaration" | "assignment_statement" => {
                let op = match node.kind() {
                    "short_var_declaration" => AssignOp::Define,
                    _ => match node.child_by_field_name("operator").map(|op| self.text(op)) {
                        Some("=") | None => AssignOp::Assign,
                        Some(_) => AssignOp::Compound,
                    },
                };
                let lhs = self.lower_expr_list(node.child_by_field_name("left"), id);
                let rhs = self.lower_expr_list(node.child_by_field_name("right"), id);
                Stmt::Assign { lhs, rhs, op }
            }
            "var_declaration" => {
                let mut specs = Vec::new();
                for child in named_children(node) {
                    match child.kind() {
                        "var_spec" => specs.push(self.lower_value_spec(child, id)),
                        "var_spec_list" => {
                            for spec in named_children(child) {
                                if spec.kind() == "var_spec" {
                                    specs.push(self.lower_value_spec(spec, id));
                                }
                            }
                        }
                        _ => {}
                    }
                }
                Stmt::VarDecl { specs }
            }
            "if_statement" => {
                let init = node
                    .child_by_field_name("initializer")
                    .map(|init| self.lower_stmt(init, id));
                let cond = node
                    .child_by_field_name("condition")
                    .map(|cond| self.lower_expr(cond, id));
                let then = node
                    .child_by_field_name("consequence")
                    .map(|then| self.lower_block(then, id));
                let alt = node
                    .child_by_field_name("alternative")
                    .map(|alt| self.lower_stmt(alt, id));
                Stmt::If {
                    init,
                    cond,
                    then,
                    alt,
                }
            }
            "for_statement" => {
                let body_node = node.child_by_field_name("body");
                let mut qualifiers = Vec::new();
                for child in named_children(node) {
                    if Some(child) != body_node {
                        self.collect_qualifiers(child, &mut qualifiers);
                    }
                }
                let body = body_node.map(|body| self.lower_block(body, id));
                return self.finish_with(id, NodeKind::Stmt(Stmt::For { body }), qualifiers);
            }
            "expression_switch_statement" | "type_switch_statement" | "select_statement" => {
                let init = node
                    .child_by_field_name("initializer")
                    .map(|init| self.lower_stmt(init, id));
                let header = node
                    .child_by_field_name("value")
                    .map(|value| vec![self.lower_expr(value, id)])
                    .unwrap_or_default();
                let mut clauses = Vec::new();
                for child in named_children(node) {
                    if matches!(
                        child.kind(),
                        "expression_case" | "type_case" | "communication_case" | "default_case"
                    ) {
                        clauses.push(self.lower_case(child, id));
                    }
                }
                Stmt::Switch {
                    init,
                    header,
                    clauses,
                }
            }
            "labeled_statement" => {
                let label_node = node.child_by_field_name("label");
                let label = label_node
                    .map(|label| self.text(label).to_string())
                    .unwrap_or_default();
                let body = named_children(node)
                    .into_iter()
                    .find(|child| Some(*child) != label_node)
                    .map(|stmt| self.lower_stmt(stmt, id));
                Stmt::Labeled { label, body }
            }
            "go_statement" | "defer_statement" | "expression_statement" => {
                match named_children(node).first() {
                    Some(expr) => {
                        let expr = self.lower_expr(*expr, id);
                        match node.kind() {
                            "go_statement" => Stmt::Go { call: expr },
                            "defer_statement" => Stmt::Defer { call: expr },
                            _ => Stmt::Expr { expr },
                        }
                    }
                    None => Stmt::Other,
                }
            }
            _ => {
                let mut qualifiers = Vec::new();
                self.collect_qualifiers(node, &mut qualifiers);
                return self.finish_with(id, NodeKind::Stmt(Stmt::Other), qualifiers);
            }
        };
        self.finish(id, NodeKind::Stmt(stmt))
    }

    fn lower_other_stmt(&mut self, node: TsNode<'_>, parent: NodeId) -> NodeId {
        let id = self.reserve(Some(parent), span_of(node));
        self.finish(id, NodeKind::Stmt(Stmt::Other))
    }

    fn lower_case(&mut self, node: TsNode<'_>, parent: NodeId) -> NodeId {
        let id = self.reserve(Some(parent), span_of(node));
        let mut qualifiers = Vec::new();
        let mut header = Vec::new();
        match node.kind() {
            "expression_case" => {
                header = self.lower_expr_list(node.child_by_field_name("value"), id);
            }
            "communication_case" => {
                if let Some(comm) = node.child_by_field_name("communication") {
                    header.push(self.lower_stmt(comm, id));
                }
            }
            "type_case" => {
                let mut cursor = node.walk();
                let types: Vec<TsNode<'_>> =
                    node.children_by_field_name("type", &mut cursor).collect();
                for ty in types {
                    self.collect_qualifiers(ty, &mut qualifiers);
                }
            }
            _ => {}
        }

        // Statements follow the clause's `:` token.
        let mut body_nodes = Vec::new();
        let mut after_colon = false;
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if !after_colon {
                after_colon = child.kind() == ":";
                continue;
            }
            if child.is_named() && child.kind() != "comment" {
                body_nodes.push(child);
            }
        }
        let body = self.lower_stmt_list(body_nodes, id);
        self.finish_with(id, NodeKind::Stmt(Stmt::Case { header, body }), qualifiers)
    }

    fn lower_value_spec(&mut self, node: TsNode<'_>, parent: NodeId) -> NodeId {
        let id = self.reserve(Some(parent), span_of(node));
        let mut cursor = node.walk();
        let names: Vec<String> = node
            .children_by_field_name("name", &mut cursor)
            .map(|name| self.text(name).to_string())
            .collect();
        let mut qualifiers = Vec::new();
        let ty = node.child_by_field_name("type").map(|ty| {
            self.collect_qualifiers(ty, &mut qualifiers);
            self.lower_type(ty)
        });
        let values = self.lower_expr_list(node.child_by_field_name("value"), id);
        let spec = ValueSpec { names, ty, values };
        self.finish_with(id, NodeKind::ValueSpec(spec), qualifiers)
    }

    fn lower_expr_list(&mut self, node: Option<TsNode<'_>>, parent: NodeId) -> Vec<NodeId> {
        let Some(node) = node else {
            return Vec::new();
        };
        if node.kind() == "expression_list" {
            named_children(node)
                .into_iter()
                .map(|expr| self.lower_expr(expr, parent))
                .collect()
        } else {
            vec![self.lower_expr(node, parent)]
        }
    }

    fn lower_expr(&mut self, node: TsNode<'_>, parent: NodeId) -> NodeId {
        let id = self.reserve(Some(parent), span_of(node));
        let literal = |kind: LitKind, builder: &Self| Expr::Literal {
            kind,
            raw: builder.text(node).to_string(),
        };
        let expr = match node.kind() {
            "identifier" => Expr::Ident {
                name: self.text(node).to_string(),
            },
            "nil" => Expr::Nil,
            "true" | "false" => literal(LitKind::Bool, self),
            "interpreted_string_literal" => literal(LitKind::Str, self),
            "raw_string_literal" => literal(LitKind::RawStr, self),
            "int_literal" => literal(LitKind::Int, self),
            "float_literal" => literal(LitKind::Float, self),
            "imaginary_literal" => literal(LitKind::Imaginary, self),
            "rune_literal" => literal(LitKind::Rune, self),
            "selector_expression" => {
                match (
                    node.child_by_field_name("operand"),
                    node.child_by_field_name("field"),
                ) {
                    (Some(operand), Some(field)) => Expr::Selector {
                        operand: self.lower_expr(operand, id),
                        field: self.text(field).to_string(),
                    },
                    _ => return self.lower_other_expr(id, node),
                }
            }
            "call_expression" => {
                let Some(func_node) = node.child_by_field_name("function") else {
                    return self.lower_other_expr(id, node);
                };
                let mut qualifiers = Vec::new();
                if let Some(type_args) = node.child_by_field_name("type_arguments") {
                    self.collect_qualifiers(type_args, &mut qualifiers);
                }
                let func = self.lower_expr(func_node, id);
                let mut args = Vec::new();
                let mut spread = false;
                if let Some(list) = node.child_by_field_name("arguments") {
                    let mut cursor = list.walk();
                    let children: Vec<TsNode<'_>> = list.children(&mut cursor).collect();
                    for arg in children {
                        match arg.kind() {
                            "..." => spread = true,
                            "variadic_argument" => {
                                spread = true;
                                if let Some(inner) = named_children(arg).first() {
                                    args.push(self.lower_expr(*inner, id));
                                }
                            }
                            "comment" => {}
                            _ if arg.is_named() => args.push(self.lower_expr(arg, id)),
                            _ => {}
                        }
                    }
                }
                let call = Expr::Call { func, args, spread };
                return self.finish_with(id, NodeKind::Expr(call), qualifiers);
            }
            "func_literal" => {
                let mut qualifiers = Vec::new();
                for field in ["parameters", "result"] {
                    if let Some(part) = node.child_by_field_name(field) {
                        self.collect_qualifiers(part, &mut qualifiers);
                    }
                }
                let body = node
                    .child_by_field_name("body")
                    .map(|body| self.lower_block(body, id));
                return self.finish_with(id, NodeKind::Expr(Expr::FuncLit { body }), qualifiers);
            }
            _ => return self.lower_other_expr(id, node),
        };
        self.finish(id, NodeKind::Expr(expr))
    }

    /// Lower an unmodelled expression: expression children become child
    /// nodes, everything else contributes qualifiers only.
    fn lower_other_expr(&mut self, id: NodeId, node: TsNode<'_>) -> NodeId {
        let mut qualifiers = Vec::new();
        let mut children = Vec::new();
        if is_expr_kind(node.kind()) {
            for child in named_children(node) {
                if is_expr_kind(child.kind()) {
                    children.push(self.lower_expr(child, id));
                } else {
                    self.collect_qualifiers(child, &mut qualifiers);
                }
            }
        } else {
            self.collect_qualifiers(node, &mut qualifiers);
        }
        self.finish_with(id, NodeKind::Expr(Expr::Other { children }), qualifiers)
    }
}

fn span_of(node: TsNode<'_>) -> Span {
    Span::new(node.start_byte(), node.end_byte())
}

/// Named children with comments filtered out.
fn named_children(node: TsNode<'_>) -> Vec<TsNode<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect()
}

/// Receiver base type name plus the type parameters it binds, e.g.
/// `*Stack[T]` yields `("Stack", ["T"])`.
fn receiver_base(ty: &TypeExpr) -> (String, Vec<String>) {
    match ty {
        TypeExpr::Pointer(inner) => receiver_base(inner),
        TypeExpr::Named { name, args, .. } => {
            let bound = args
                .iter()
                .filter_map(|arg| match arg {
                    TypeExpr::Named {
                        package: None,
                        name,
                        args,
                    } if args.is_empty() => Some(name.clone()),
                    _ => None,
                })
                .collect();
            (name.clone(), bound)
        }
        other => (other.to_string(), Vec::new()),
    }
}

fn is_expr_kind(kind: &str) -> bool {
    matches!(
        kind,
        "identifier"
            | "nil"
            | "true"
            | "false"
            | "iota"
            | "int_literal"
            | "float_literal"
            | "imaginary_literal"
            | "rune_literal"
            | "interpreted_string_literal"
            | "raw_string_literal"
            | "selector_expression"
            | "call_expression"
            | "func_literal"
            | "parenthesized_expression"
            | "unary_expression"
            | "binary_expression"
            | "index_expression"
            | "slice_expression"
            | "type_assertion_expression"
            | "type_conversion_expression"
            | "type_instantiation_expression"
            | "composite_literal"
            | "literal_value"
            | "literal_element"
            | "keyed_element"
            | "element"
            | "expression_list"
            | "variadic_argument"
    )
}
