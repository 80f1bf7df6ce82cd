// Fragment store commands against a private store file.

mod util;

use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use predicates::prelude::*;
use serde_json::Value;

use util::{frag, make_fixture};

/// Add `loop` with for/range keywords
fn add_loop(tmp: &assert_fs::TempDir)
{
    frag(tmp)
        .args(["add", "loop", "--body", "for i in range({0:n}):", "--keywords", "for,range", "--tags", "basics"])
        .assert()
        .success();
}

fn stored(tmp: &assert_fs::TempDir) -> Value
{
    let text = std::fs::read_to_string(tmp.path().join("store.json")).expect("store file");
    serde_json::from_str(&text).expect("store json")
}

#[test]
fn add_show_list_delete_cycle()
{
    let tmp = make_fixture();
    add_loop(&tmp);

    // The store file carries the fragment with the default scope
    let v = stored(&tmp);
    assert_eq!(v["version"], 1);
    assert_eq!(v["fragments"][0]["label"], "loop");
    assert_eq!(v["fragments"][0]["scope"], "python");

    frag(&tmp)
        .args(["show", "loop"])
        .assert()
        .success()
        .stdout(predicate::str::contains("keywords: for,range"))
        .stdout(predicate::str::contains("for i in range({0:n}):"));

    frag(&tmp)
        .args(["list", "-f", "keyword:range"])
        .assert()
        .success()
        .stdout(predicate::str::contains("loop"));

    frag(&tmp)
        .args(["delete", "loop"])
        .assert()
        .success();

    let v = stored(&tmp);
    assert_eq!(v["fragments"].as_array().map(Vec::len), Some(0));
}

#[test]
fn duplicate_label_is_rejected()
{
    let tmp = make_fixture();
    add_loop(&tmp);

    frag(&tmp)
        .args(["add", "loop", "--body", "pass"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn unknown_filter_key_fails()
{
    let tmp = make_fixture();
    add_loop(&tmp);

    frag(&tmp)
        .args(["list", "--filter", "color:red"])
        .assert()
        .failure();
}

#[test]
fn add_from_selection_parametrizes_body()
{
    let tmp = make_fixture();

    frag(&tmp)
        .args(["add", "call", "--from", "demo.py:5", "--parametrize", "--no-probe"])
        .assert()
        .success();

    let out = frag(&tmp)
        .args(["show", "call", "--json"])
        .output()
        .expect("run frag");
    assert!(out.status.success());

    let f: Value = serde_json::from_slice(&out.stdout).expect("json");
    assert_eq!(f["body"], "{0:f}({1:x})");
    assert_eq!(f["placeholders"], "{0:f}, {1:x}");
}

#[test]
fn add_from_selection_keeps_raw_text()
{
    let tmp = make_fixture();

    frag(&tmp)
        .args(["add", "raw", "--from", "demo.py:1-2"])
        .assert()
        .success();

    let v = stored(&tmp);
    assert_eq!(v["fragments"][0]["body"], "def f(x):\n    x + 1");
}

#[test]
fn edit_updates_fields_and_tags()
{
    let tmp = make_fixture();
    add_loop(&tmp);

    frag(&tmp)
        .args(["edit", "loop", "--domain", "iteration", "--add-tag", "core", "--remove-tag", "basics"])
        .assert()
        .success();

    let v = stored(&tmp);
    assert_eq!(v["fragments"][0]["domain"], "iteration");
    assert_eq!(v["fragments"][0]["tags"], "core");
}

#[test]
fn dry_run_leaves_store_untouched()
{
    let tmp = make_fixture();

    frag(&tmp)
        .args(["--dry-run", "add", "ghost", "--body", "pass"])
        .assert()
        .success()
        .stdout(predicate::str::contains("dry run"));

    tmp.child("store.json")
        .assert(predicate::path::missing());
}

#[test]
fn parallel_adds_all_land_in_the_store()
{
    let tmp = make_fixture();

    let children: Vec<_> = (0..6)
        .map(|i| {
            frag(&tmp)
                .args(["add", &format!("frag{i}"), "--body", "pass"])
                .spawn()
                .expect("spawn frag")
        })
        .collect();
    for child in children
    {
        assert!(child.wait_with_output().expect("wait frag").status.success());
    }

    let v = stored(&tmp);
    assert_eq!(v["fragments"].as_array().map(Vec::len), Some(6));
}

#[test]
fn folders_render_as_tree()
{
    let tmp = make_fixture();
    add_loop(&tmp);

    frag(&tmp)
        .args(["folder", "add", "basics"])
        .assert()
        .success();
    frag(&tmp)
        .args(["folder", "set-children", "basics", "loop"])
        .assert()
        .success();

    frag(&tmp)
        .args(["folder", "tree"])
        .assert()
        .success()
        .stdout(predicate::str::contains("basics/"))
        .stdout(predicate::str::contains("loop"));

    // A folder cannot contain itself
    frag(&tmp)
        .args(["folder", "set-children", "basics", "basics"])
        .assert()
        .failure();
}

#[test]
fn synthesize_replaces_matching_lines()
{
    let tmp = make_fixture();
    add_loop(&tmp);
    tmp.child("draft.py")
        .write_str("for k in range(3):\n    pass\n")
        .expect("write");

    frag(&tmp)
        .args(["synthesize", "draft.py"])
        .assert()
        .success()
        .stdout(predicate::str::diff("for i in range({0:n}):\n    pass\n"))
        .stderr(predicate::str::contains("line 1: loop (score 2)"));
}

#[test]
fn synthesize_json_reports_matches()
{
    let tmp = make_fixture();
    add_loop(&tmp);
    tmp.child("draft.py")
        .write_str("for k in range(3):\n")
        .expect("write");

    let out = frag(&tmp)
        .args(["synthesize", "draft.py", "--json"])
        .output()
        .expect("run frag");
    assert!(out.status.success());

    let v: Value = serde_json::from_slice(&out.stdout).expect("json");
    assert_eq!(v["keywords"], "for,range");
    assert_eq!(v["matches"][0]["label"], "loop");
    assert_eq!(v["matches"][0]["score"], 2);
}

#[test]
fn init_dry_run_prints_default_config()
{
    let tmp = make_fixture();

    frag(&tmp)
        .args(["init", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[probe]"));

    tmp.child("fragforge.toml")
        .assert(predicate::path::missing());
}

#[test]
fn completions_print_or_install()
{
    let tmp = make_fixture();

    frag(&tmp)
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("#compdef frag"));

    frag(&tmp)
        .args(["completions", "bash", "--out-dir", "comp"])
        .assert()
        .success();

    tmp.child("comp/frag.bash")
        .assert(predicate::str::contains("synthesize"));
}
