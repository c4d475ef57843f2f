//! Go language binding for tree-sitter.
use errgen_error::{Error, ErrorKind, Result};
use tree_sitter::{Node, Parser, Tree};

pub struct LangGo;

impl LangGo {
    pub const NAME: &'static str = "go";

    pub fn supported_extensions() -> &'static [&'static str] {
        &["go"]
    }

    pub fn parser() -> Result<Parser> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_go::LANGUAGE.into())
            .map_err(|e| {
                Error::new(ErrorKind::GrammarError, e.to_string())
                    .with_operation("go::parser")
                    .set_source(e)
            })?;
        Ok(parser)
    }

    /// Parse Go source text. Trees containing syntax errors are rejected
    /// with the position of the first offending node.
    pub fn parse(text: impl AsRef<[u8]>) -> Result<Tree> {
        let mut parser = Self::parser()?;
        let tree = parser
            .parse(text.as_ref(), None)
            .ok_or_else(|| Error::parse_failed("parser produced no tree").with_operation("go::parse"))?;

        let root = tree.root_node();
        if root.has_error() {
            let bad = first_error(root).unwrap_or(root);
            let position = bad.start_position();
            let message = if bad.is_missing() {
                format!("missing {}", bad.kind())
            } else {
                "unexpected syntax".to_string()
            };
            return Err(Error::syntax_error(message, position.row + 1, position.column + 1)
                .with_operation("go::parse"));
        }
        Ok(tree)
    }
}

fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|child| child.has_error())
        .find_map(first_error)
}
