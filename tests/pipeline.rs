//! Library-level walk tests
//!
//! These drive the descent, dispatch, tasks and store together. The full
//! C pipeline needs a `cpp` on PATH; that test skips itself without one.

use std::fs;
use std::path::{Path, PathBuf};

use depwalk::storage::{Config, SharedStore, SymbolStore, Workspace};
use depwalk::tasks::CommandKind;
use depwalk::tree::{SourceRule, SourceVisitor, TreeDescent, WalkSummary};
use depwalk::{ResolvedSymbol, SymbolRef, UnresolvedSymbol};
use std::collections::HashMap;
use tempfile::TempDir;

struct Tree {
    _dir: TempDir,
    src: PathBuf,
    working: PathBuf,
}

fn tree(files: &[(&str, &str)]) -> Tree {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("src");
    let working = dir.path().join("working");
    fs::create_dir_all(&working).unwrap();
    for (name, content) in files {
        let path = src.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    Tree {
        src: src.canonicalize().unwrap(),
        working: working.canonicalize().unwrap(),
        _dir: dir,
    }
}

fn walk(tree: &Tree, rules: Vec<SourceRule>, store: &SharedStore) -> WalkSummary {
    let flags = HashMap::from([(
        CommandKind::CPreProcessor,
        vec!["-I".to_string(), tree.src.display().to_string()],
    )]);
    let mut visitor = SourceVisitor::new(rules, store.clone(), &tree.working).with_flags(flags);
    TreeDescent::new(&tree.src)
        .exclude(&tree.working)
        .descend(&mut visitor)
        .unwrap();
    visitor.into_summary()
}

fn default_rules() -> Vec<SourceRule> {
    Config::default().source_rules().unwrap()
}

fn memory_store() -> SharedStore {
    SymbolStore::open_in_memory(63).unwrap().into_shared()
}

fn snapshot(store: &SharedStore) -> String {
    store
        .lock()
        .records()
        .unwrap()
        .iter()
        .map(|record| record.snapshot_line() + "\n")
        .collect()
}

const SHAPES_I: &str = "\
#pragma depwalk begin_library_include
extern double sqrt(double);
#pragma depwalk end_library_include
#pragma depwalk begin_project_include
double square(double);
extern int shape_count;
#pragma depwalk end_project_include
int shape_count = 0;
double hypotenuse(double a, double b) { shape_count++; return sqrt(square(a) + square(b)); }
";

const MATHS_I: &str = "\
#pragma depwalk begin_project_include
double square(double);
#pragma depwalk end_project_include
double square(double x) { return x * x; }
static double unused_cube(double x) { return x * x * x; }
";

#[test]
fn preprocessed_tree_is_recorded() {
    let tree = tree(&[("shapes.i", SHAPES_I), ("lib/maths.i", MATHS_I)]);
    let store = memory_store();

    let summary = walk(&tree, default_rules(), &store);
    assert_eq!(summary.visited, 2);
    assert_eq!(summary.tasks, 2);
    assert!(summary.is_success());

    let shapes = tree.src.join("shapes.i");
    let maths = tree.src.join("lib/maths.i");
    let store = store.lock();

    let hypotenuse = store.get_symbol("hypotenuse").unwrap();
    assert_eq!(hypotenuse.len(), 1);
    assert_eq!(hypotenuse[0].symbol.file(), shapes.as_path());
    assert_eq!(hypotenuse[0].prerequisites, vec!["square"]);

    assert_eq!(
        store.depends_on("hypotenuse", &shapes).unwrap(),
        vec![SymbolRef::Resolved(ResolvedSymbol::new("square", &maths))]
    );
    assert!(store.get_symbol("sqrt").is_err());
    assert!(store.get_symbol("unused_cube").is_err());
    assert_eq!(store.get_symbol("shape_count").unwrap()[0].symbol.file(), shapes.as_path());
}

#[test]
fn unresolved_prerequisites_stay_by_name() {
    let tree = tree(&[("shapes.i", SHAPES_I)]);
    let store = memory_store();

    walk(&tree, default_rules(), &store);

    let shapes = tree.src.join("shapes.i");
    assert_eq!(
        store.lock().depends_on("hypotenuse", &shapes).unwrap(),
        vec![SymbolRef::Unresolved(UnresolvedSymbol::new("square"))]
    );
}

#[test]
fn rewalking_gives_an_identical_snapshot() {
    let tree = tree(&[("shapes.i", SHAPES_I), ("lib/maths.i", MATHS_I)]);
    let config = Config::default();
    let workspace = Workspace::open(&tree.working, &config).unwrap();

    let first = {
        let store = workspace.open_store().unwrap().into_shared();
        walk(&tree, default_rules(), &store);
        snapshot(&store)
    };
    let second = {
        let store = workspace.open_store().unwrap().into_shared();
        walk(&tree, default_rules(), &store);
        snapshot(&store)
    };

    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn changed_file_replaces_only_its_records() {
    let tree = tree(&[("shapes.i", SHAPES_I), ("lib/maths.i", MATHS_I)]);
    let store = memory_store();
    walk(&tree, default_rules(), &store);

    fs::write(
        tree.src.join("lib/maths.i"),
        "double cube(double x) { return x * x * x; }\n",
    )
    .unwrap();
    walk(&tree, default_rules(), &store);

    let store = store.lock();
    assert!(store.get_symbol("square").is_err());
    assert_eq!(store.get_symbol("cube").unwrap().len(), 1);
    assert_eq!(store.get_symbol("hypotenuse").unwrap().len(), 1);
}

#[test]
fn products_re_enter_the_walk() {
    // Mark sources, then analyse the marked copies directly
    let tree = tree(&[(
        "a.c",
        "#include <stdio.h>\n#include \"b.h\"\nint helper(int);\nint main(void) { return helper(0); }\n",
    )]);
    let rules = vec![
        SourceRule::new(r".*\.c$", "c-pragma-injector").unwrap(),
        SourceRule::new(r".*\.prag\.c$", "c-analyser").unwrap(),
    ];
    let store = memory_store();

    let summary = walk(&tree, rules, &store);

    assert_eq!(summary.visited, 2);
    assert_eq!(summary.tasks, 2);
    assert_eq!(summary.products, 1);

    let marked = tree.working.join("a.prag.c");
    let text = fs::read_to_string(&marked).unwrap();
    assert_eq!(text.lines().count(), 8);

    let main = store.lock().get_symbol("main").unwrap();
    assert_eq!(main[0].symbol.file(), marked.as_path());
    assert_eq!(main[0].prerequisites, vec!["helper"]);
}

#[test]
fn malformed_include_fails_one_file_only() {
    let tree = tree(&[
        ("bad.c", "#include HEADER\nint bad(void) { return 0; }\n"),
        ("good.c", "int good(void) { return 1; }\n"),
    ]);
    let rules = vec![
        SourceRule::new(r".*\.c$", "c-pragma-injector").unwrap(),
        SourceRule::new(r".*\.prag\.c$", "c-analyser").unwrap(),
    ];
    let store = memory_store();

    let summary = walk(&tree, rules, &store);

    assert_eq!(summary.failures.len(), 1);
    assert!(summary.failures[0].file.ends_with("bad.c"));
    assert!(store.lock().get_symbol("good").is_ok());
    assert!(store.lock().get_symbol("bad").is_err());
}

fn have_cpp() -> bool {
    std::process::Command::new("cpp")
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

#[test]
fn full_c_pipeline_with_preprocessor() {
    if !have_cpp() {
        eprintln!("skipping: no cpp on PATH");
        return;
    }

    let tree = tree(&[
        (
            "a.c",
            "#include \"b.h\"\n#include <stdio.h>\n\nint main(void) {\n    printf(\"%d\\n\", helper(2));\n    return 0;\n}\n",
        ),
        ("b.h", "int helper(int value);\n"),
    ]);
    let store = memory_store();

    let summary = walk(&tree, default_rules(), &store);
    assert!(summary.is_success(), "failures: {:?}", summary.failures);
    assert_eq!(summary.tasks, 3);

    let analysed = tree.working.join("a.prag.i");
    assert!(analysed.exists());

    let store = store.lock();
    let main = store.get_symbol("main").unwrap();
    assert_eq!(main.len(), 1);
    assert_eq!(main[0].symbol.file(), analysed.as_path());
    assert_eq!(main[0].prerequisites, vec!["helper"]);
    assert!(store.get_symbol("printf").is_err());

    let records = store.records().unwrap();
    assert!(records.iter().all(|r| !r.prerequisites.contains(&"printf".to_string())));
}

#[test]
fn full_c_pipeline_reruns_to_an_identical_snapshot() {
    if !have_cpp() {
        eprintln!("skipping: no cpp on PATH");
        return;
    }

    let tree = tree(&[
        (
            "a.c",
            "#include \"b.h\"\n#include <stdlib.h>\n\nint main(void) { return helper(abs(-2)); }\n",
        ),
        ("b.h", "int helper(int value);\n"),
        ("b.c", "#include \"b.h\"\nint helper(int value) { return value + 1; }\n"),
    ]);
    let store = memory_store();

    let first = walk(&tree, default_rules(), &store);
    assert!(first.is_success(), "failures: {:?}", first.failures);
    let before = snapshot(&store);

    let second = walk(&tree, default_rules(), &store);
    assert!(second.is_success(), "failures: {:?}", second.failures);

    assert!(before.contains("main\t"));
    assert!(before.contains("helper\t"));
    assert_eq!(before, snapshot(&store));
}

#[test]
fn nested_sources_find_their_local_headers() {
    if !have_cpp() {
        eprintln!("skipping: no cpp on PATH");
        return;
    }

    let tree = tree(&[
        ("sub/a.c", "#include \"b.h\"\nint run(void) { return helper(1); }\n"),
        ("sub/b.h", "int helper(int value);\n"),
    ]);
    let store = memory_store();

    let summary = walk(&tree, default_rules(), &store);
    assert!(summary.is_success(), "failures: {:?}", summary.failures);

    let run = store.lock().get_symbol("run").unwrap();
    assert_eq!(run[0].symbol.file(), tree.working.join("a.prag.i").as_path());
    assert_eq!(run[0].prerequisites, vec!["helper"]);
}

#[test]
fn same_named_sources_are_reported_as_shadowed() {
    let tree = tree(&[("x/a.c", "int from_x;\n"), ("y/a.c", "int from_y;\n")]);
    let rules = vec![
        SourceRule::new(r".*\.c$", "c-pragma-injector").unwrap(),
        SourceRule::new(r".*\.prag\.c$", "c-analyser").unwrap(),
    ];
    let store = memory_store();

    let summary = walk(&tree, rules, &store);

    assert!(summary.is_success());
    assert_eq!(summary.shadowed, vec![tree.working.join("a.prag.c")]);
    let store = store.lock();
    assert!(store.get_symbol("from_x").is_err());
    assert_eq!(store.get_symbol("from_y").unwrap().len(), 1);
}

#[test]
fn file_identity_is_absolute() {
    let tree = tree(&[("shapes.i", SHAPES_I)]);
    let store = memory_store();
    walk(&tree, default_rules(), &store);

    let files = store.lock().files().unwrap();
    assert_eq!(files.len(), 1);
    assert!(Path::new(&files[0]).is_absolute());
}
