//! Wrapper synthesizer: renders the per-module file of wrapper types.
use std::collections::BTreeMap;

use errgen_core::go_quote;

use crate::args::ArgInfo;

/// First line of every file this tool writes.
pub const GENERATED_HEADER: &str = "// Code generated by errgen. DO NOT EDIT.";

/// Packages the wrapper file may import for its own use.
pub const WRAPPER_IMPORTS: &[&str] = &["errors", "fmt", "strconv"];

/// One generated wrapper type, describing a single function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorWrapperSpec {
    /// Go type name, e.g. `UpdateNameError`.
    pub type_name: String,
    pub function: String,
    pub receiver: Option<String>,
    /// Message prefix naming where the function lives, e.g. `store/pg.Repo`.
    pub qualifier: String,
    pub args: Vec<ArgInfo>,
    /// Import path to alias for the packages the argument types refer to.
    pub imports: BTreeMap<String, Option<String>>,
}

impl ErrorWrapperSpec {
    pub fn constructor(&self) -> String {
        format!("New{}", self.type_name)
    }

    /// Arguments the constructor takes: captured args, reason, cause.
    pub fn arity(&self) -> usize {
        self.args.len() + 2
    }

    /// Names passed at a rewritten call site, in constructor order.
    pub fn call_args(&self) -> Vec<String> {
        self.args.iter().map(|arg| arg.name.clone()).collect()
    }
}

/// Render the wrapper file for one package.
pub fn render_wrappers(package: &str, specs: &[ErrorWrapperSpec]) -> String {
    let mut out = format!("{GENERATED_HEADER}\n\npackage {package}\n");
    out.push_str(&render_imports(specs));
    for spec in specs {
        out.push('\n');
        render_spec(&mut out, spec);
    }
    out
}

fn render_imports(specs: &[ErrorWrapperSpec]) -> String {
    let mut imports: BTreeMap<String, Option<String>> = BTreeMap::new();
    imports.insert("errors".to_string(), None);
    for spec in specs {
        for arg in &spec.args {
            if let Some(path) = arg.category.import() {
                imports.insert(path.to_string(), None);
            }
        }
        for (path, alias) in &spec.imports {
            imports.entry(path.clone()).or_insert_with(|| alias.clone());
        }
    }

    if imports.len() == 1 {
        let line = imports
            .iter()
            .map(|(path, alias)| import_line(path, alias.as_deref()))
            .collect::<String>();
        return format!("\nimport {line}\n");
    }

    let (std, others): (Vec<_>, Vec<_>) = imports
        .iter()
        .partition(|(path, _)| is_std_path(path));
    let mut out = String::from("\nimport (\n");
    for (path, alias) in &std {
        out.push_str(&format!("\t{}\n", import_line(path, alias.as_deref())));
    }
    if !std.is_empty() && !others.is_empty() {
        out.push('\n');
    }
    for (path, alias) in &others {
        out.push_str(&format!("\t{}\n", import_line(path, alias.as_deref())));
    }
    out.push_str(")\n");
    out
}

fn import_line(path: &str, alias: Option<&str>) -> String {
    match alias {
        Some(alias) => format!("{alias} {}", go_quote(path)),
        None => go_quote(path),
    }
}

/// Standard-library paths have no dot in their first element.
fn is_std_path(path: &str) -> bool {
    path.split('/').next().is_some_and(|first| !first.contains('.'))
}

fn render_spec(out: &mut String, spec: &ErrorWrapperSpec) {
    let name = &spec.type_name;
    let mut fields: Vec<(String, String)> = spec
        .args
        .iter()
        .map(|arg| (arg.field.clone(), arg.ty.to_string()))
        .collect();
    fields.push(("reason".to_string(), "string".to_string()));
    fields.push(("err".to_string(), "error".to_string()));
    let width = fields.iter().map(|(field, _)| field.len()).max().unwrap_or(0);

    out.push_str(&format!("type {name} struct {{\n"));
    for (field, ty) in &fields {
        out.push_str(&format!("\t{field:<width$} {ty}\n"));
    }
    out.push_str("}\n\n");

    let params = fields
        .iter()
        .map(|(field, ty)| format!("{field} {ty}"))
        .collect::<Vec<_>>()
        .join(", ");
    out.push_str(&format!(
        "func {}({params}) *{name} {{\n\treturn &{name}{{\n",
        spec.constructor()
    ));
    for (field, _) in &fields {
        let key = format!("{field}:");
        out.push_str(&format!("\t\t{key:<key_width$} {field},\n", key_width = width + 1));
    }
    out.push_str("\t}\n}\n\n");

    out.push_str(&format!("func (e *{name}) Error() string {{\n"));
    out.push_str(&format!(
        "\tmsg := {} + e.reason",
        go_quote(&format!("[{}] - {} - ", spec.qualifier, spec.function))
    ));
    for (index, arg) in spec.args.iter().enumerate() {
        let label = if index == 0 {
            format!(" - args: {{{}: ", arg.name)
        } else {
            format!(", {}: ", arg.name)
        };
        let value = arg.category.format(&format!("e.{}", arg.field));
        out.push_str(&format!(" +\n\t\t{} + {}", go_quote(&label), value));
    }
    if !spec.args.is_empty() {
        out.push_str(" +\n\t\t\"}\"");
    }
    out.push_str("\n\tif e.err == nil {\n\t\treturn msg\n\t}\n");
    out.push_str("\treturn msg + \"\\n\" + e.err.Error()\n}\n\n");

    out.push_str(&format!(
        "func (e *{name}) Unwrap() error {{\n\treturn e.err\n}}\n\n"
    ));
    out.push_str(&format!(
        "func (e *{name}) Is(target error) bool {{\n\tif _, ok := target.(*{name}); ok {{\n\t\treturn true\n\t}}\n\treturn errors.Is(e.err, target)\n}}\n"
    ));
}
