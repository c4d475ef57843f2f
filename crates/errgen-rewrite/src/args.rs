//! Argument capture for wrapper types.
use errgen_core::{FuncDecl, TypeExpr};
use strum_macros::{Display, IntoStaticStr};

use crate::imports::ImportTable;
use crate::skip::SkipRules;

/// How a captured argument is rendered in the wrapper's message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ArgCategory {
    Text,
    Int,
    Int64,
    SignedInt,
    Uint64,
    Unsigned,
    Float64,
    Float32,
    Bool,
    Structured,
}

impl ArgCategory {
    pub fn of(ty: &TypeExpr) -> Self {
        let TypeExpr::Named {
            package: None,
            name,
            args,
        } = ty
        else {
            return ArgCategory::Structured;
        };
        if !args.is_empty() {
            return ArgCategory::Structured;
        }
        match name.as_str() {
            "string" => ArgCategory::Text,
            "int" => ArgCategory::Int,
            "int64" => ArgCategory::Int64,
            "int8" | "int16" | "int32" | "rune" => ArgCategory::SignedInt,
            "uint64" => ArgCategory::Uint64,
            "uint" | "uint8" | "uint16" | "uint32" | "byte" | "uintptr" => ArgCategory::Unsigned,
            "float64" => ArgCategory::Float64,
            "float32" => ArgCategory::Float32,
            "bool" => ArgCategory::Bool,
            _ => ArgCategory::Structured,
        }
    }

    /// Go expression turning `value` into a string.
    pub fn format(&self, value: &str) -> String {
        match self {
            ArgCategory::Text => value.to_string(),
            ArgCategory::Int => format!("strconv.Itoa({value})"),
            ArgCategory::Int64 => format!("strconv.FormatInt({value}, 10)"),
            ArgCategory::SignedInt => format!("strconv.FormatInt(int64({value}), 10)"),
            ArgCategory::Uint64 => format!("strconv.FormatUint({value}, 10)"),
            ArgCategory::Unsigned => format!("strconv.FormatUint(uint64({value}), 10)"),
            ArgCategory::Float64 => format!("strconv.FormatFloat({value}, 'f', -1, 64)"),
            ArgCategory::Float32 => format!("strconv.FormatFloat(float64({value}), 'f', -1, 32)"),
            ArgCategory::Bool => format!("strconv.FormatBool({value})"),
            ArgCategory::Structured => format!("fmt.Sprintf(\"%#v\", {value})"),
        }
    }

    /// Standard-library package the formatting needs.
    pub fn import(&self) -> Option<&'static str> {
        match self {
            ArgCategory::Text => None,
            ArgCategory::Structured => Some("fmt"),
            _ => Some("strconv"),
        }
    }
}

/// One function argument captured into a wrapper type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgInfo {
    /// Parameter name in the original function.
    pub name: String,
    /// Field and constructor parameter name in the wrapper.
    pub field: String,
    pub ty: TypeExpr,
    pub category: ArgCategory,
}

/// Wrapper fields the generated type always has.
const RESERVED_FIELDS: &[&str] = &["reason", "err"];

const PREDECLARED_TYPES: &[&str] = &[
    "any", "bool", "byte", "comparable", "complex64", "complex128", "error", "float32", "float64",
    "int", "int8", "int16", "int32", "int64", "rune", "string", "uint", "uint8", "uint16",
    "uint32", "uint64", "uintptr",
];

/// Collect the parameters of `func` that the wrapper captures. Unnamed and
/// blank parameters are dropped, as is anything whose type the skip rules
/// reject or whose package cannot be resolved in this file. In a file with
/// dot imports, unqualified types other than predeclared ones and type
/// parameters may come from the imported package and are dropped too.
pub fn capture_args(
    func: &FuncDecl,
    skip: &dyn SkipRules,
    imports: &ImportTable,
    module_path: &str,
) -> Vec<ArgInfo> {
    let mut args = Vec::new();
    for param in &func.params {
        let Some(name) = param.name.as_deref() else {
            continue;
        };
        if name == "_" {
            continue;
        }

        let skipped = param.ty.named_types().into_iter().find(|(package, type_name)| {
            // Type parameters have no declaration to check.
            if package.is_none() && func.type_params.iter().any(|tp| tp == type_name) {
                return false;
            }
            match package {
                Some(package) => imports
                    .resolve(package)
                    .is_none_or(|path| skip.skip_argument(type_name, path)),
                None => skip.skip_argument(type_name, module_path),
            }
        });
        if let Some((package, type_name)) = skipped {
            tracing::trace!(
                func = %func.name,
                arg = name,
                package = package.unwrap_or(module_path),
                type_name,
                "argument not captured"
            );
            continue;
        }
        if imports.has_dot_imports() && may_name_dot_import(&param.ty, &func.type_params) {
            tracing::trace!(func = %func.name, arg = name, "argument type may come from a dot import");
            continue;
        }
        if let TypeExpr::Opaque { packages, .. } = &param.ty {
            if packages.iter().any(|package| imports.resolve(package).is_none()) {
                tracing::trace!(func = %func.name, arg = name, "argument type has unresolved package");
                continue;
            }
        }

        let mut ty = if param.ty.mentions_any(&func.type_params) {
            TypeExpr::named("any")
        } else {
            param.ty.clone()
        };
        if param.variadic {
            ty = TypeExpr::Slice(Box::new(ty));
        }

        let field = if RESERVED_FIELDS.contains(&name) {
            format!("{name}Arg")
        } else {
            name.to_string()
        };
        args.push(ArgInfo {
            name: name.to_string(),
            field,
            category: ArgCategory::of(&ty),
            ty,
        });
    }
    args
}

fn may_name_dot_import(ty: &TypeExpr, type_params: &[String]) -> bool {
    ty.has_opaque()
        || ty.named_types().iter().any(|(package, name)| {
            package.is_none()
                && !PREDECLARED_TYPES.contains(name)
                && !type_params.iter().any(|tp| tp == name)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skip::NoSkip;
    use errgen_core::CompileUnit;
    use std::path::Path;

    struct SkipMutex;

    impl SkipRules for SkipMutex {
        fn skip_argument(&self, type_name: &str, module_path: &str) -> bool {
            module_path == "sync" && type_name == "Mutex"
        }

        fn skip_file(&self, _path: &Path) -> bool {
            false
        }
    }

    fn capture(source: &str, skip: &dyn SkipRules) -> Vec<ArgInfo> {
        let unit = CompileUnit::from_source("p.go", source).unwrap();
        let imports = ImportTable::from_unit(&unit);
        let (_, func) = unit.functions().into_iter().next().unwrap();
        capture_args(func, skip, &imports, "example.com/p")
    }

    #[test]
    fn test_categories() {
        assert_eq!(ArgCategory::of(&TypeExpr::named("string")), ArgCategory::Text);
        assert_eq!(ArgCategory::of(&TypeExpr::named("rune")), ArgCategory::SignedInt);
        assert_eq!(ArgCategory::of(&TypeExpr::named("byte")), ArgCategory::Unsigned);
        assert_eq!(ArgCategory::of(&TypeExpr::named("User")), ArgCategory::Structured);
        assert_eq!(
            ArgCategory::of(&TypeExpr::Slice(Box::new(TypeExpr::named("int")))),
            ArgCategory::Structured
        );
        assert_eq!(ArgCategory::Float32.format("e.x"), "strconv.FormatFloat(float64(e.x), 'f', -1, 32)");
        assert_eq!(ArgCategory::Text.import(), None);
    }

    #[test]
    fn test_skip_rules_drop_mutex() {
        let args = capture(
            "package p\n\nimport \"sync\"\n\nfunc F(mu *sync.Mutex, id int) error { return nil }\n",
            &SkipMutex,
        );
        let names: Vec<&str> = args.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["id"]);
    }

    #[test]
    fn test_reserved_names_and_blank_params() {
        let args = capture(
            "package p\n\nfunc F(reason string, err error, _ int, ok bool) error { return nil }\n",
            &NoSkip,
        );
        let fields: Vec<&str> = args.iter().map(|a| a.field.as_str()).collect();
        assert_eq!(fields, vec!["reasonArg", "errArg", "ok"]);
        assert_eq!(args[0].name, "reason");
    }

    #[test]
    fn test_generic_and_variadic_types() {
        let args = capture(
            "package p\n\nfunc F[T any](v T, items []T, tags ...string) error { return nil }\n",
            &NoSkip,
        );
        let types: Vec<String> = args.iter().map(|a| a.ty.to_string()).collect();
        assert_eq!(types, vec!["any", "any", "[]string"]);
        assert_eq!(args[2].category, ArgCategory::Structured);
    }

    #[test]
    fn test_unresolved_package_is_not_captured() {
        let args = capture(
            "package p\n\nfunc F(c pgx.Conn, n int64) error { return nil }\n",
            &NoSkip,
        );
        assert_eq!(args.len(), 1);
        assert_eq!(args[0].category, ArgCategory::Int64);
    }

    #[test]
    fn test_dot_import_drops_unqualified_types() {
        let args = capture(
            "package p\n\nimport . \"example.com/shapes\"\n\nfunc F(c Circle, r float64, m map[string]int) error { return nil }\n",
            &NoSkip,
        );
        let names: Vec<&str> = args.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["r", "m"]);
    }
}
