pub mod context;
pub mod file;
pub mod ir;
pub mod ir_builder;
pub mod lang;
pub mod printer;
pub mod quote;

pub use context::CompileUnit;
pub use file::File;
pub use ir::{
    AssignOp, Expr, FileNode, FuncDecl, ImportSpec, LitKind, Node, NodeBase, NodeId, NodeKind,
    Origin, Param, Receiver, Span, Stmt, TypeExpr, ValueSpec,
};
pub use ir_builder::build_unit;
pub use lang::LangGo;
pub use printer::{render_node, render_unit};
pub use quote::{go_quote, go_unquote};
pub use tree_sitter::{Node as TsNode, Parser, Point, Tree};
