use std::path::Path;

use errgen_core::{CompileUnit, File, render_unit};
use errgen_rewrite::{LiteralPolicy, NoSkip, RunContext, RunOptions, SkipRules, UnitReport};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

/// A throwaway Go package on disk, run through the engine the way the CLI does:
/// files in sorted order, modified units written back, generated files
/// written or deleted after the flush.
struct Project {
    dir: TempDir,
}

impl Project {
    fn new(files: &[(&str, &str)]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        for (name, source) in files {
            std::fs::write(dir.path().join(name), textwrap::dedent(source).trim_start()).unwrap();
        }
        Self { dir }
    }

    fn run(&self, options: RunOptions, skip: &dyn SkipRules) -> Vec<UnitReport> {
        let mut ctx = RunContext::new(self.dir.path(), options, skip);
        let generated = ctx.generated_file_names();
        let mut paths: Vec<_> = std::fs::read_dir(self.dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "go"))
            .filter(|path| {
                let name = path.file_name().unwrap().to_str().unwrap();
                !generated.iter().any(|g| g == name)
            })
            .collect();
        paths.sort();

        let mut reports = Vec::new();
        for path in paths {
            let mut unit = CompileUnit::parse(File::new_file(&path).unwrap()).unwrap();
            reports.push(ctx.process_unit(&mut unit).unwrap());
            if unit.is_modified() {
                std::fs::write(&path, render_unit(&unit)).unwrap();
            }
        }
        for file in ctx.flush().unwrap() {
            match file.contents {
                Some(contents) => std::fs::write(&file.path, contents).unwrap(),
                None => std::fs::remove_file(&file.path).unwrap(),
            }
        }
        reports
    }

    fn read(&self, name: &str) -> String {
        std::fs::read_to_string(self.dir.path().join(name)).unwrap()
    }

    fn exists(&self, name: &str) -> bool {
        self.dir.path().join(name).exists()
    }
}

fn sentinel_options() -> RunOptions {
    RunOptions {
        literal_policy: LiteralPolicy::Sentinel,
        ..RunOptions::default()
    }
}

/// Skips every type from `sync`.
struct SkipSync;

impl SkipRules for SkipSync {
    fn skip_argument(&self, _type_name: &str, module_path: &str) -> bool {
        module_path == "sync"
    }

    fn skip_file(&self, _path: &Path) -> bool {
        false
    }
}

const USER_GO: &str = r#"
    package example

    import "errors"

    type User struct {
        Name string
        Age  int
    }

    func (u *User) UpdateName(newName string) error {
        if newName == "" {
            return errors.New("name cannot be empty")
        }
        u.Name = newName
        return nil
    }

    func ProcessUser(user *User, count int) error {
        if err := user.UpdateName("New"); err != nil {
            return err
        }
        return nil
    }
"#;

#[test]
fn literal_message_becomes_reason_with_nil_cause() {
    let project = Project::new(&[("user.go", USER_GO)]);
    let reports = project.run(RunOptions::default(), &NoSkip);
    assert_eq!(reports[0].rewritten, 2);

    let user = project.read("user.go");
    assert!(user.contains("return NewUpdateNameError(newName, \"name cannot be empty\", nil)\n"));
    assert!(!user.contains("import \"errors\""));
}

#[test]
fn assigned_call_result_is_preserved_as_cause() {
    let project = Project::new(&[("user.go", USER_GO)]);
    project.run(RunOptions::default(), &NoSkip);

    let user = project.read("user.go");
    assert!(user.contains("return NewProcessUserError(user, count, \"user.UpdateName\", err)\n"));

    let wrappers = project.read("errgen_wrappers.go");
    assert!(wrappers.contains("func NewProcessUserError(user *User, count int, reason string, err error) *ProcessUserError {"));
    assert!(wrappers.contains("\"[example.User] - UpdateName - \""));
    assert!(wrappers.contains("\", count: \" + strconv.Itoa(e.count) +"));
    assert!(wrappers.contains("func (e *ProcessUserError) Unwrap() error {\n\treturn e.err\n}"));
}

#[test]
fn second_run_is_byte_identical() {
    let project = Project::new(&[("user.go", USER_GO)]);
    project.run(RunOptions::default(), &NoSkip);
    let user = project.read("user.go");
    let wrappers = project.read("errgen_wrappers.go");

    let reports = project.run(RunOptions::default(), &NoSkip);
    assert_eq!(reports[0].rewritten, 0);
    assert_eq!(reports[0].already_wrapped, 2);
    assert_eq!(project.read("user.go"), user);
    assert_eq!(project.read("errgen_wrappers.go"), wrappers);
}

#[test]
fn repeated_literal_shares_one_sentinel() {
    let project = Project::new(&[(
        "module.go",
        r#"
        package module

        import "errors"

        func First() error {
            return errors.New("boom")
        }

        func Second() error {
            return errors.New("boom")
        }
        "#,
    )]);
    project.run(sentinel_options(), &NoSkip);

    let module = project.read("module.go");
    assert!(module.contains("return NewFirstError(\"boom\", ErrModule1)"));
    assert!(module.contains("return NewSecondError(\"boom\", ErrModule1)"));
    assert!(!module.contains("ErrModule2"));
    assert_eq!(
        project.read("errgen_sentinels.go"),
        "// Code generated by errgen. DO NOT EDIT.\n\npackage module\n\nimport \"errors\"\n\nvar (\n\tErrModule1 = errors.New(\"boom\")\n)\n"
    );
}

#[test]
fn sentinel_names_survive_regeneration() {
    let project = Project::new(&[(
        "module.go",
        r#"
        package module

        import "errors"

        func First() error {
            return errors.New("boom")
        }
        "#,
    )]);
    project.run(sentinel_options(), &NoSkip);
    let sentinels = project.read("errgen_sentinels.go");

    // Rerunning on rewritten code leaves the table alone.
    project.run(sentinel_options(), &NoSkip);
    assert_eq!(project.read("errgen_sentinels.go"), sentinels);

    // A new message seen before the old one does not steal its name.
    std::fs::write(
        project.dir.path().join("other.go"),
        "package module\n\nimport \"errors\"\n\nfunc Early() error {\n\treturn errors.New(\"bang\")\n}\n\nfunc Late() error {\n\treturn errors.New(\"boom\")\n}\n",
    )
    .unwrap();
    project.run(sentinel_options(), &NoSkip);
    let other = project.read("other.go");
    assert!(other.contains("NewEarlyError(\"bang\", ErrModule2)"));
    assert!(other.contains("NewLateError(\"boom\", ErrModule1)"));
}

#[test]
fn excluded_argument_types_are_not_captured() {
    let project = Project::new(&[(
        "cache.go",
        r#"
        package cache

        import (
            "fmt"
            "sync"
        )

        func Store(mu *sync.Mutex, key string) error {
            mu.Lock()
            defer mu.Unlock()
            return fmt.Errorf("store %s", key)
        }
        "#,
    )]);
    project.run(RunOptions::default(), &SkipSync);

    let cache = project.read("cache.go");
    assert!(cache.contains("return NewStoreError(key, \"store %s\", fmt.Errorf(\"store %s\", key))"));
    assert!(cache.contains("\"sync\""));

    let wrappers = project.read("errgen_wrappers.go");
    assert!(wrappers.contains("func NewStoreError(key string, reason string, err error) *StoreError {"));
    assert!(!wrappers.contains("sync"));
}

#[test]
fn closure_returns_are_never_rewritten() {
    let project = Project::new(&[(
        "run.go",
        r#"
        package run

        import "errors"

        func Run(tasks []func() error) error {
            check := func() error {
                return errors.New("inside")
            }
            if err := check(); err != nil {
                return err
            }
            return nil
        }
        "#,
    )]);
    project.run(RunOptions::default(), &NoSkip);

    let run = project.read("run.go");
    assert!(run.contains("return errors.New(\"inside\")\n"));
    assert!(run.contains("return NewRunError(tasks, \"check\", err)\n"));
    assert!(run.contains("import \"errors\""));
}

#[test]
fn wrapper_file_removed_when_nothing_needs_it() {
    let project = Project::new(&[("user.go", USER_GO)]);
    project.run(RunOptions::default(), &NoSkip);
    assert!(project.exists("errgen_wrappers.go"));

    std::fs::write(
        project.dir.path().join("user.go"),
        "package example\n\nfunc Nothing() error {\n\treturn nil\n}\n",
    )
    .unwrap();
    project.run(RunOptions::default(), &NoSkip);
    assert!(!project.exists("errgen_wrappers.go"));
}

#[test]
fn wrapper_calls_with_computed_reasons_are_recognized() {
    let project = Project::new(&[(
        "api.go",
        r#"
        package api

        func Get(id int) error {
            why := explain(id)
            return NewGetError(id, why, lookup(id))
        }

        func Put(id int) error {
            return NewGetError(id, explain(id), lookup(id))
        }

        func explain(id int) string {
            return "missing"
        }

        func lookup(id int) error {
            return nil
        }
        "#,
    )]);
    let reports = project.run(RunOptions::default(), &NoSkip);
    assert_eq!(reports[0].already_wrapped, 1);
    assert_eq!(reports[0].rewritten, 1);

    let api = project.read("api.go");
    assert!(api.contains("return NewGetError(id, why, lookup(id))\n"));
    assert!(api.contains("return NewPutError(id, \"explain(id)\", lookup(id))\n"));
    assert!(!api.contains("NewGetError(id, why, \"NewGetError\""));
}

const FLOW_GO: &str = r#"
    package flow

    import (
        "errors"
        "os"
        "strconv"
    )

    func Parse(raw string) (int, error) {
        switch n, err := strconv.Atoi(raw); {
        case err != nil:
            return 0, err
        default:
            return n, nil
        }
    }

    func Load(path string) ([]byte, error) {
        switch path {
        case "":
            return nil, errors.New("empty path")
        default:
            data, err := os.ReadFile(path)
            if err != nil {
                return nil, err
            }
            return data, nil
        }
    }

    func Wait(done chan struct{}, errs chan error) error {
        select {
        case err := <-errs:
            return err
        case <-done:
            return nil
        }
    }

    func Open(name string) error {
        var err error = connect(name)
        if err != nil {
            return err
        }
        return nil
    }

    func connect(name string) error {
        return nil
    }
"#;

#[test]
fn switch_initializer_names_the_origin() {
    let project = Project::new(&[("flow.go", FLOW_GO)]);
    project.run(RunOptions::default(), &NoSkip);
    assert!(project.read("flow.go").contains("return 0, NewParseError(raw, \"strconv.Atoi\", err)\n"));
}

#[test]
fn assignment_earlier_in_case_body_names_the_origin() {
    let project = Project::new(&[("flow.go", FLOW_GO)]);
    project.run(RunOptions::default(), &NoSkip);

    let flow = project.read("flow.go");
    assert!(flow.contains("return nil, NewLoadError(path, \"empty path\", nil)\n"));
    assert!(flow.contains("return nil, NewLoadError(path, \"os.ReadFile\", err)\n"));
    // errors.New was the only use of the package.
    assert!(!flow.contains("\"errors\""));
    assert!(flow.contains("\"os\""));
}

#[test]
fn select_receive_names_the_channel() {
    let project = Project::new(&[("flow.go", FLOW_GO)]);
    project.run(RunOptions::default(), &NoSkip);
    assert!(project.read("flow.go").contains("return NewWaitError(done, errs, \"errs\", err)\n"));
}

#[test]
fn var_declaration_in_enclosing_block_names_the_origin() {
    let project = Project::new(&[("flow.go", FLOW_GO)]);
    let reports = project.run(RunOptions::default(), &NoSkip);
    assert!(project.read("flow.go").contains("return NewOpenError(name, \"connect\", err)\n"));
    // Parse, Load (twice), Wait and Open.
    assert_eq!(reports[0].rewritten, 5);
}

#[test]
fn clashing_import_names_are_aliased_in_wrapper_file() {
    let project = Project::new(&[
        (
            "a.go",
            r#"
            package audit

            import (
                "errors"

                "example.com/app/log"
            )

            func Record(l *log.Logger) error {
                return errors.New("closed")
            }
            "#,
        ),
        (
            "b.go",
            r#"
            package audit

            import (
                "errors"

                "example.com/vendor/log"
            )

            func Replay(l *log.Logger) error {
                return errors.New("empty")
            }
            "#,
        ),
    ]);
    project.run(RunOptions::default(), &NoSkip);

    let wrappers = project.read("errgen_wrappers.go");
    assert!(wrappers.contains("\t\"example.com/app/log\"\n\tlog2 \"example.com/vendor/log\"\n"));
    assert!(wrappers.contains("func NewRecordError(l *log.Logger, reason string, err error) *RecordError {"));
    assert!(wrappers.contains("func NewReplayError(l *log2.Logger, reason string, err error) *ReplayError {"));
    // Call sites are untouched by the alias.
    assert!(project.read("b.go").contains("return NewReplayError(l, \"empty\", nil)"));
}
