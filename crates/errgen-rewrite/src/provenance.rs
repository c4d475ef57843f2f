//! Provenance tracer: for one return site, find a human-readable reason and
//! the existing error expression to keep as the wrapped cause.
//!
//! Resolution order for the error-slot expression:
//!
//! 1. `nil` is left alone.
//! 2. Sites inside a function literal are left alone; closures do not share
//!    the enclosing function's wrapper type.
//! 3. A call that already looks like a wrapper constructor is either our own
//!    constructor (nothing to do) or has its cause hoisted and its reason
//!    reused.
//! 4. A plain `errors.New` / `fmt.Errorf` constructor provides the reason
//!    directly.
//! 5. Any other call is its own cause, described by its callee chain.
//! 6. Otherwise the enclosing statements are searched for the assignment
//!    that produced the returned error.
//! 7. Failing all that, the reason is `unknown error in <func>`.
use errgen_core::{AssignOp, CompileUnit, Expr, NodeId, NodeKind, Stmt};
use strum_macros::{Display, IntoStaticStr};

use crate::imports::ImportTable;
use crate::pattern::{
    PlainConstructor, callee_chain, is_error_like, is_join_call, plain_constructor,
    string_literal, wrapper_call,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvenanceResult {
    pub reason: String,
    /// Existing expression preserved as the wrapped cause.
    pub cause: Option<NodeId>,
    /// The original was a static message; its text became the reason and
    /// there is nothing to wrap.
    pub suppress_capture: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum SkipReason {
    /// The error slot is `nil`.
    Nil,
    /// The site is inside a function literal.
    Closure,
    /// The site already constructs this function's wrapper.
    AlreadyWrapped,
    /// The return does not list a value for the error slot.
    Arity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trace {
    Skip(SkipReason),
    Rewrite {
        /// The error-slot expression to replace.
        value: NodeId,
        result: ProvenanceResult,
    },
}

/// Traces return sites of one function.
pub struct Tracer<'a> {
    unit: &'a CompileUnit,
    imports: &'a ImportTable,
    func: NodeId,
    func_name: &'a str,
    slot: usize,
    constructor: &'a str,
    arity: usize,
}

impl<'a> Tracer<'a> {
    /// `constructor` and `arity` describe the wrapper constructor this
    /// function's sites are rewritten to.
    pub fn new(
        unit: &'a CompileUnit,
        imports: &'a ImportTable,
        func: NodeId,
        slot: usize,
        constructor: &'a str,
        arity: usize,
    ) -> Self {
        let func_name = unit
            .node(func)
            .as_func()
            .map(|decl| decl.name.as_str())
            .unwrap_or_default();
        Self {
            unit,
            imports,
            func,
            func_name,
            slot,
            constructor,
            arity,
        }
    }

    pub fn trace(&self, ret: NodeId) -> Trace {
        let Some(Stmt::Return { results }) = self.unit.node(ret).as_stmt() else {
            return Trace::Skip(SkipReason::Arity);
        };
        let Some(&value) = results.get(self.slot) else {
            return Trace::Skip(SkipReason::Arity);
        };
        if matches!(self.unit.expr(value), Some(Expr::Nil)) {
            return Trace::Skip(SkipReason::Nil);
        }
        if self.inside_closure(ret) {
            return Trace::Skip(SkipReason::Closure);
        }

        if let Some(call) = wrapper_call(self.unit, value) {
            if call.constructor == self.constructor && call.arity == self.arity {
                return Trace::Skip(SkipReason::AlreadyWrapped);
            }
            let cause = match self.unit.expr(call.cause) {
                Some(Expr::Nil) => None,
                _ => Some(call.cause),
            };
            let reason = self.or_default(call.reason);
            return Trace::Rewrite {
                value,
                result: ProvenanceResult {
                    reason,
                    cause,
                    suppress_capture: false,
                },
            };
        }

        let result = self
            .direct(value)
            .or_else(|| self.from_call(value))
            .or_else(|| self.from_enclosing(ret, value))
            .unwrap_or_else(|| ProvenanceResult {
                reason: self.default_reason(),
                cause: Some(value),
                suppress_capture: false,
            });
        Trace::Rewrite { value, result }
    }

    /// Any function literal between the site and the function declaration.
    fn inside_closure(&self, ret: NodeId) -> bool {
        self.unit
            .ancestors(ret)
            .take_while(|id| *id != self.func)
            .any(|id| matches!(self.unit.expr(id), Some(Expr::FuncLit { .. })))
    }

    /// `errors.New("msg")`, `fmt.Errorf("msg")`, `fmt.Errorf("msg %w", err)`.
    fn direct(&self, value: NodeId) -> Option<ProvenanceResult> {
        let kind = plain_constructor(self.unit, self.imports, value)?;
        let Some(Expr::Call { args, .. }) = self.unit.expr(value) else {
            return None;
        };
        let first = *args.first()?;

        let Some(text) = string_literal(self.unit, first) else {
            let printed = errgen_core::render_node(self.unit, first);
            return Some(ProvenanceResult {
                reason: self.or_default(printed),
                cause: Some(value),
                suppress_capture: false,
            });
        };

        let is_static = args.len() == 1 && (kind == PlainConstructor::New || !text.contains('%'));
        if is_static {
            Some(ProvenanceResult {
                reason: self.or_default(text),
                cause: None,
                suppress_capture: true,
            })
        } else {
            Some(ProvenanceResult {
                reason: self.or_default(text),
                cause: Some(value),
                suppress_capture: false,
            })
        }
    }

    /// The returned value is itself a call: it is the cause.
    fn from_call(&self, value: NodeId) -> Option<ProvenanceResult> {
        let Some(Expr::Call { func, .. }) = self.unit.expr(value) else {
            return None;
        };
        let reason = callee_chain(self.unit, *func).unwrap_or_else(|| self.default_reason());
        Some(ProvenanceResult {
            reason,
            cause: Some(value),
            suppress_capture: false,
        })
    }

    /// Walk outward through the enclosing statements looking for the
    /// assignment that produced the returned error.
    fn from_enclosing(&self, ret: NodeId, value: NodeId) -> Option<ProvenanceResult> {
        let target = match self.unit.expr(value) {
            Some(Expr::Ident { name }) => Some(name.as_str()),
            _ => None,
        };

        let mut child = ret;
        for ancestor in self.unit.ancestors(ret) {
            if ancestor == self.func {
                break;
            }
            let source = match self.unit.kind(ancestor) {
                NodeKind::Stmt(Stmt::If { init, .. }) | NodeKind::Stmt(Stmt::Switch { init, .. }) => {
                    init.filter(|init| *init != child)
                        .and_then(|init| self.assignment_source(init, target))
                }
                NodeKind::Stmt(Stmt::Block { stmts }) => self.preceding_source(stmts, child, target),
                NodeKind::Stmt(Stmt::Case { header, body }) => self
                    .preceding_source(body, child, target)
                    .or_else(|| header.iter().find_map(|stmt| self.assignment_source(*stmt, target))),
                _ => None,
            };
            if let Some(source) = source {
                tracing::trace!(site = %ret, source = %source, "found error origin");
                return Some(ProvenanceResult {
                    reason: self.describe(source),
                    cause: Some(value),
                    suppress_capture: false,
                });
            }
            child = ancestor;
        }
        None
    }

    /// Search the statements before `child`, nearest first. Join calls are
    /// passed over since they describe no single origin.
    fn preceding_source(&self, stmts: &[NodeId], child: NodeId, target: Option<&str>) -> Option<NodeId> {
        let position = stmts.iter().position(|id| *id == child)?;
        stmts[..position]
            .iter()
            .rev()
            .filter_map(|stmt| self.assignment_source(*stmt, target))
            .find(|source| !is_join_call(self.unit, self.imports, *source))
    }

    /// Right-hand side paired with the target identifier in an assignment or
    /// `var` declaration. Without a target any error-like name qualifies.
    fn assignment_source(&self, stmt: NodeId, target: Option<&str>) -> Option<NodeId> {
        let matches = |name: &str| match target {
            Some(target) => name == target,
            None => is_error_like(name),
        };
        match self.unit.kind(stmt) {
            NodeKind::Stmt(Stmt::Assign { lhs, rhs, op }) if *op != AssignOp::Compound => {
                let index = lhs.iter().position(|id| {
                    matches!(self.unit.expr(*id), Some(Expr::Ident { name }) if matches(name))
                })?;
                pair(rhs, lhs.len(), index)
            }
            NodeKind::Stmt(Stmt::VarDecl { specs }) => specs.iter().find_map(|spec| {
                let NodeKind::ValueSpec(spec) = self.unit.kind(*spec) else {
                    return None;
                };
                let index = spec.names.iter().position(|name| matches(name))?;
                pair(&spec.values, spec.names.len(), index)
            }),
            _ => None,
        }
    }

    fn describe(&self, source: NodeId) -> String {
        match self.unit.expr(source) {
            Some(Expr::Call { func, args, .. }) => {
                let literal = plain_constructor(self.unit, self.imports, source)
                    .and_then(|_| args.first())
                    .and_then(|first| string_literal(self.unit, *first));
                literal
                    .or_else(|| callee_chain(self.unit, *func))
                    .map_or_else(|| self.default_reason(), |reason| self.or_default(reason))
            }
            Some(Expr::Ident { name }) => self.or_default(name.clone()),
            // `<-errs`, `(call())`
            Some(Expr::Other { children }) if children.len() == 1 => self.describe(children[0]),
            _ => self.default_reason(),
        }
    }

    fn or_default(&self, reason: String) -> String {
        if reason.trim().is_empty() {
            self.default_reason()
        } else {
            reason
        }
    }

    fn default_reason(&self) -> String {
        format!("unknown error in {}", self.func_name)
    }
}

/// `a, err := f()` pairs every name with the single call; otherwise names and
/// values pair positionally.
fn pair(values: &[NodeId], names: usize, index: usize) -> Option<NodeId> {
    if values.len() == names {
        values.get(index).copied()
    } else if values.len() == 1 {
        values.first().copied()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{error_functions, return_sites};

    /// Trace every return site of the first error function, pairing each
    /// result with the source text of its cause.
    fn trace_all(source: &str, constructor: &str, arity: usize) -> Vec<(Trace, Option<String>)> {
        let unit = CompileUnit::from_source("p.go", textwrap::dedent(source)).unwrap();
        let imports = ImportTable::from_unit(&unit);
        let func = error_functions(&unit)[0];
        let tracer = Tracer::new(&unit, &imports, func.id, func.slot, constructor, arity);
        return_sites(&unit, func.id)
            .into_iter()
            .map(|ret| {
                let trace = tracer.trace(ret);
                let cause = match &trace {
                    Trace::Rewrite { result, .. } => {
                        result.cause.and_then(|c| unit.text(c)).map(str::to_string)
                    }
                    Trace::Skip(_) => None,
                };
                (trace, cause)
            })
            .collect()
    }

    fn reason(trace: &Trace) -> &str {
        match trace {
            Trace::Rewrite { result, .. } => &result.reason,
            Trace::Skip(reason) => (*reason).into(),
        }
    }

    #[test]
    fn test_static_message_has_no_cause() {
        let traces = trace_all(
            r#"
            package p

            import "errors"

            func UpdateName(newName string) error {
                if newName == "" {
                    return errors.New("name cannot be empty")
                }
                return nil
            }
            "#,
            "NewUpdateNameError",
            3,
        );
        assert_eq!(reason(&traces[0].0), "name cannot be empty");
        assert_eq!(traces[0].1, None);
        assert!(matches!(
            &traces[0].0,
            Trace::Rewrite { result, .. } if result.suppress_capture
        ));
        assert_eq!(traces[1].0, Trace::Skip(SkipReason::Nil));
    }

    #[test]
    fn test_formatted_message_keeps_call_as_cause() {
        let traces = trace_all(
            r#"
            package p

            import "fmt"

            func Load(id int) error {
                if id < 0 {
                    return fmt.Errorf("bad id %d", id)
                }
                return fmt.Errorf("plain")
            }
            "#,
            "NewLoadError",
            3,
        );
        assert_eq!(reason(&traces[0].0), "bad id %d");
        assert_eq!(traces[0].1.as_deref(), Some("fmt.Errorf(\"bad id %d\", id)"));
        assert_eq!(reason(&traces[1].0), "plain");
        assert_eq!(traces[1].1, None);
    }

    #[test]
    fn test_if_initializer_assignment() {
        let traces = trace_all(
            r#"
            package p

            func ProcessUser(user *User, count int) error {
                if err := user.UpdateName("New"); err != nil {
                    return err
                }
                return nil
            }
            "#,
            "NewProcessUserError",
            4,
        );
        assert_eq!(reason(&traces[0].0), "user.UpdateName");
        assert_eq!(traces[0].1.as_deref(), Some("err"));
    }

    #[test]
    fn test_preceding_assignment_skips_join() {
        let traces = trace_all(
            r#"
            package p

            import "errors"

            func Close(a, b Closer) error {
                err := a.Close()
                err = errors.Join(err, b.Close())
                if err != nil {
                    return err
                }
                return nil
            }
            "#,
            "NewCloseError",
            4,
        );
        assert_eq!(reason(&traces[0].0), "a.Close");
    }

    #[test]
    fn test_multi_value_assignment_and_var_decl() {
        let traces = trace_all(
            r#"
            package p

            func Read(path string) (int, error) {
                n, readErr := os.ReadFile(path)
                if readErr != nil {
                    return 0, readErr
                }
                var err = validate(n)
                if err != nil {
                    return 0, err
                }
                return len(n), nil
            }
            "#,
            "NewReadError",
            3,
        );
        assert_eq!(reason(&traces[0].0), "os.ReadFile");
        assert_eq!(reason(&traces[1].0), "validate");
        assert_eq!(traces[2].0, Trace::Skip(SkipReason::Nil));
    }

    #[test]
    fn test_direct_call_is_cause() {
        let traces = trace_all(
            r#"
            package p

            func (s *Service) Save(u *User) error {
                return s.repo.Save(u)
            }
            "#,
            "NewSaveError",
            3,
        );
        assert_eq!(reason(&traces[0].0), "s.repo.Save");
        assert_eq!(traces[0].1.as_deref(), Some("s.repo.Save(u)"));
    }

    #[test]
    fn test_closure_sites_are_skipped() {
        let traces = trace_all(
            r#"
            package p

            import "errors"

            func Run() error {
                fn := func() error {
                    return errors.New("inner")
                }
                return fn()
            }
            "#,
            "NewRunError",
            2,
        );
        assert_eq!(traces[0].0, Trace::Skip(SkipReason::Closure));
        assert_eq!(reason(&traces[1].0), "fn");
    }

    #[test]
    fn test_own_wrapper_is_left_alone() {
        let traces = trace_all(
            r#"
            package p

            func Get(id int) error {
                if id == 0 {
                    return NewGetError(id, "zero", nil)
                }
                return NewGetError("stale", err)
            }
            "#,
            "NewGetError",
            3,
        );
        assert_eq!(traces[0].0, Trace::Skip(SkipReason::AlreadyWrapped));
        assert_eq!(reason(&traces[1].0), "stale");
        assert_eq!(traces[1].1.as_deref(), Some("err"));
    }

    #[test]
    fn test_foreign_wrapper_with_nil_cause() {
        let traces = trace_all(
            r#"
            package p

            func Get(id int) error {
                return NewFetchError(id, "not found", nil)
            }
            "#,
            "NewGetError",
            3,
        );
        assert_eq!(reason(&traces[0].0), "not found");
        assert_eq!(traces[0].1, None);
    }

    #[test]
    fn test_unknown_origin_uses_default_reason() {
        let traces = trace_all(
            r#"
            package p

            func Wait(ch chan error) error {
                return <-ch
            }
            "#,
            "NewWaitError",
            3,
        );
        assert_eq!(reason(&traces[0].0), "unknown error in Wait");
        assert_eq!(traces[0].1.as_deref(), Some("<-ch"));
    }

    #[test]
    fn test_naked_return_is_arity_skip() {
        let traces = trace_all(
            r#"
            package p

            func Named() (err error) {
                return
            }
            "#,
            "NewNamedError",
            2,
        );
        assert_eq!(traces[0].0, Trace::Skip(SkipReason::Arity));
    }
}
