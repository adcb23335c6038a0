//! End-to-end analysis: staged diff text in, commit proposals out.

use gitmind_core::{parse_diff, ChangeExtractor, MultiCommitConfig, Splitter};

const AUTH: &str = "\
diff --git a/auth.go b/auth.go
new file mode 100644
index 0000000..1111111
--- /dev/null
+++ b/auth.go
@@ -0,0 +1,2 @@
+// Login is covered by TestLogin
+func Login() {
";

const LOGIN_TEST: &str = "\
diff --git a/login_test.go b/login_test.go
new file mode 100644
index 0000000..2222222
--- /dev/null
+++ b/login_test.go
@@ -0,0 +1,2 @@
+func TestLogin() {
+\t// covered: Login()
";

const README: &str = "\
diff --git a/README.md b/README.md
index 3333333..4444444 100644
--- a/README.md
+++ b/README.md
@@ -1 +1 @@
-old readme
+Project documentation overview
";

fn config(threshold: f64) -> MultiCommitConfig {
    MultiCommitConfig::default().with_threshold(threshold)
}

#[test]
fn login_and_its_test_cluster_together() {
    let diff = format!("{AUTH}{LOGIN_TEST}{README}");
    let plan = Splitter::new(config(0.5)).plan(&diff).unwrap();

    assert_eq!(plan.change_count, 3);
    assert_eq!(plan.proposals.len(), 2);
    assert!(plan.is_splittable());

    let first = &plan.proposals[0];
    assert_eq!(first.files, vec!["auth.go", "login_test.go"]);
    assert_eq!(
        first.message,
        "Update Login, TestLogin functions (1/2)\n\nModified functions: Login, TestLogin"
    );

    let second = &plan.proposals[1];
    assert_eq!(second.files, vec!["README.md"]);
    assert_eq!(second.message, "Update README.md (2/2)");
}

#[test]
fn unrelated_readme_stays_apart_at_high_threshold() {
    let diff = format!("{AUTH}{README}");
    let plan = Splitter::new(config(0.7)).plan(&diff).unwrap();
    assert_eq!(plan.proposals.len(), 2);
    assert_eq!(plan.proposals[0].files, vec!["auth.go"]);
    assert_eq!(plan.proposals[1].files, vec!["README.md"]);
}

#[test]
fn disabled_config_yields_single_proposal() {
    let diff = format!("{AUTH}{LOGIN_TEST}{README}");
    let cfg = MultiCommitConfig {
        enabled: false,
        ..MultiCommitConfig::default()
    };
    let plan = Splitter::new(cfg).plan(&diff).unwrap();
    assert_eq!(plan.proposals.len(), 1);
    assert_eq!(plan.proposals[0].files.len(), 3);
    assert!(!plan.is_splittable());
}

#[test]
fn binary_files_go_to_trailing_proposal() {
    let binary = "\
diff --git a/assets/logo.png b/assets/logo.png
new file mode 100644
index 0000000..5555555
Binary files /dev/null and b/assets/logo.png differ
diff --git a/run.sh b/run.sh
old mode 100644
new mode 100755
";
    let diff = format!("{AUTH}{binary}{README}");
    let plan = Splitter::new(config(0.9)).plan(&diff).unwrap();

    assert_eq!(plan.change_count, 2);
    assert_eq!(plan.proposals.len(), 3);
    let last = plan.proposals.last().unwrap();
    assert_eq!(last.files, vec!["assets/logo.png", "run.sh"]);
    assert_eq!(last.message, "Update 2 binary or metadata-only files (3/3)");

    let all: Vec<&String> = plan.proposals.iter().flat_map(|p| p.files.iter()).collect();
    assert_eq!(all.len(), 4);
}

#[test]
fn parsed_hunks_reconstruct_changed_lines() {
    let diff = "\
diff --git a/src/lib.rs b/src/lib.rs
index 1..2 100644
--- a/src/lib.rs
+++ b/src/lib.rs
@@ -1,4 +1,5 @@
 use std::io;
-fn old() {}
+fn new_one() {}
+fn new_two() {}

 fn keep() {}
@@ -20,2 +21,2 @@ impl Foo {
-    let x = 1;
+    let x = 2;
     x
diff --git a/docs/a.md b/docs/a.md
--- a/docs/a.md
+++ b/docs/a.md
@@ -3,0 +4 @@
+appended
";
    let expected: Vec<&str> = diff
        .lines()
        .filter(|l| {
            (l.starts_with('+') || l.starts_with('-'))
                && !l.starts_with("+++ ")
                && !l.starts_with("--- ")
        })
        .collect();

    let parsed = parse_diff(diff);
    assert!(parsed.warnings.is_empty());
    assert_eq!(parsed.hunks.len(), 3);
    let actual: Vec<&str> = parsed.hunks.iter().flat_map(|h| h.changed_lines()).collect();
    assert_eq!(actual, expected);

    let changes = ChangeExtractor::default().extract(&parsed.hunks);
    assert_eq!(changes.len(), 2);
    assert_eq!(changes[0].symbols, vec!["old", "new_one", "new_two"]);
}

#[test]
fn malformed_input_degrades_without_failing() {
    let diff = "this is not a diff\n@@ nonsense\n+stray\n";
    let plan = Splitter::new(MultiCommitConfig::default())
        .plan(diff)
        .unwrap();
    assert!(plan.is_empty());
    assert_eq!(plan.warnings.len(), 1);
}
